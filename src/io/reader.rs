//! PDF reading and page geometry.

use lopdf::{Dictionary, Document, Object, ObjectId};
use std::path::Path;

use crate::error::{MergeBotError, Result};

/// Maximum number of parent hops when resolving inherited page attributes.
const MAX_TREE_DEPTH: usize = 64;

/// Width and height of a page in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// Page width in points.
    pub width: f32,
    /// Page height in points.
    pub height: f32,
}

impl PageGeometry {
    /// ISO A4 portrait.
    pub const A4: Self = Self {
        width: 595.0,
        height: 842.0,
    };

    /// Create a geometry from width and height.
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Length of the shorter side.
    pub fn min_side(&self) -> f32 {
        self.width.min(self.height)
    }
}

/// Stateless PDF reader.
pub struct PdfReader;

impl PdfReader {
    /// Load a PDF document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`MergeBotError::FailedToLoadPdf`] if the file cannot be parsed.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Document> {
        let path = path.as_ref();
        Document::load(path)
            .map_err(|err| MergeBotError::failed_to_load_pdf(path.to_path_buf(), err.to_string()))
    }

    /// Whether `path` is a regular file with a non-zero length.
    pub fn is_usable<P: AsRef<Path>>(path: P) -> bool {
        std::fs::metadata(path)
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false)
    }

    /// Read the size of the first page of `doc`.
    ///
    /// The MediaBox is looked up on the page itself and then up the page tree,
    /// since it is an inheritable attribute.
    ///
    /// # Errors
    ///
    /// Returns [`MergeBotError::MergeFailed`] if the document has no pages or
    /// the first page has no usable MediaBox.
    pub fn first_page_geometry(doc: &Document) -> Result<PageGeometry> {
        let (_, page_id) = doc
            .get_pages()
            .into_iter()
            .next()
            .ok_or_else(|| MergeBotError::merge_failed("Document has no pages"))?;

        let mediabox = inherited_attribute(doc, page_id, b"MediaBox")
            .ok_or_else(|| MergeBotError::merge_failed("First page has no MediaBox"))?;

        let values = resolve(doc, &mediabox)
            .as_array()
            .map_err(|_| MergeBotError::merge_failed("MediaBox is not an array"))?;

        if values.len() < 4 {
            return Err(MergeBotError::merge_failed("MediaBox has fewer than 4 entries"));
        }

        let mut coords = [0.0f32; 4];
        for (slot, value) in coords.iter_mut().zip(values) {
            *slot = resolve(doc, value)
                .as_float()
                .map_err(|_| MergeBotError::merge_failed("MediaBox entry is not a number"))?;
        }

        let width = (coords[2] - coords[0]).abs();
        let height = (coords[3] - coords[1]).abs();
        if width == 0.0 || height == 0.0 {
            return Err(MergeBotError::merge_failed("First page has an empty MediaBox"));
        }

        Ok(PageGeometry::new(width, height))
    }
}

/// Look up `key` on a page dictionary, walking `Parent` links if needed.
pub(crate) fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current: &Dictionary = doc.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value.clone());
        }
        let parent_id = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent_id).ok()?;
    }

    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}
