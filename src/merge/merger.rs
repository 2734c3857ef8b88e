use lopdf::{Document, Object, ObjectId};
use std::path::{Path, PathBuf};

use crate::error::{MergeBotError, Result};
use crate::io::reader::inherited_attribute;
use crate::io::{PageGeometry, PdfReader, PdfWriter};
use crate::merge::TrailerGenerator;

/// Page attributes a page may inherit from its ancestors in the page tree.
///
/// Pages are re-parented under the merged document's root, so these have to be
/// copied onto the page itself first.
const INHERITABLE_ATTRIBUTES: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Summary of a completed merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Number of input documents that made it into the output.
    pub files_merged: usize,
    /// Page count of the written output, trailer included.
    pub total_pages: usize,
    /// Whether the trailer page was appended.
    pub trailer_appended: bool,
    /// Page size of the first input document.
    pub geometry: PageGeometry,
}

/// Concatenates queued documents and appends the generated trailer page.
#[derive(Debug, Clone, Default)]
pub struct Merger {
    trailer: TrailerGenerator,
}

impl Merger {
    pub fn new(trailer: TrailerGenerator) -> Self {
        Self { trailer }
    }

    /// Merges `inputs` in order into a single document written to `output`.
    ///
    /// Inputs that are missing or empty are skipped. The trailer page is
    /// rendered to `trailer_path` at the size of the first page of the first
    /// valid input and appended last. A trailer that cannot be produced is
    /// logged and left out; it never fails the merge.
    ///
    /// # Errors
    ///
    /// Returns [`MergeBotError::NoValidDocuments`] if no input is usable, and
    /// a load, structure or write error if any valid input cannot be merged.
    pub fn merge(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        trailer_path: &Path,
    ) -> Result<MergeOutcome> {
        let valid: Vec<&PathBuf> = inputs
            .iter()
            .filter(|path| {
                let usable = PdfReader::is_usable(path);
                if !usable {
                    tracing::debug!(file = %path.display(), "skipping missing or empty input");
                }
                usable
            })
            .collect();

        if valid.is_empty() {
            return Err(MergeBotError::NoValidDocuments);
        }

        let mut documents = Vec::with_capacity(valid.len() + 1);
        for path in &valid {
            let doc = PdfReader::read(path)?;
            tracing::debug!(
                file = %path.display(),
                pages = doc.get_pages().len(),
                version = %doc.version,
                "loaded input"
            );
            documents.push(doc);
        }

        let geometry = PdfReader::first_page_geometry(&documents[0])?;

        let trailer_appended = match self.load_trailer(trailer_path, geometry) {
            Some(trailer) => {
                documents.push(trailer);
                true
            }
            None => false,
        };

        let mut merged = Self::concatenate(documents)?;
        let total_pages = merged.get_pages().len();

        PdfWriter::write(&mut merged, output)?;

        Ok(MergeOutcome {
            files_merged: valid.len(),
            total_pages,
            trailer_appended,
            geometry,
        })
    }

    fn load_trailer(&self, path: &Path, geometry: PageGeometry) -> Option<Document> {
        if let Err(err) = self.trailer.generate(path, geometry) {
            tracing::warn!(file = %path.display(), error = %err, "trailer page not generated");
            return None;
        }

        if !PdfReader::is_usable(path) {
            return None;
        }

        PdfReader::read(path)
            .inspect_err(|err| tracing::warn!(error = %err, "trailer page unreadable"))
            .ok()
    }

    /// Joins `documents` into the first one, in order.
    fn concatenate(mut documents: Vec<Document>) -> Result<Document> {
        if documents.is_empty() {
            return Err(MergeBotError::NoValidDocuments);
        }

        let mut merged = documents.remove(0);
        let root_pages_id = merged.catalog()?.get(b"Pages")?.as_reference()?;
        let mut max_id = merged.max_id;

        // The root becomes the parent of every appended page, so nothing may
        // be left on it for them to inherit.
        let own_pages: Vec<ObjectId> = merged.get_pages().into_values().collect();
        for &page_id in &own_pages {
            Self::flatten_inherited(&mut merged, page_id);
        }
        if let Ok(root) = merged.get_object_mut(root_pages_id).and_then(Object::as_dict_mut) {
            for key in INHERITABLE_ATTRIBUTES {
                root.remove(key);
            }
        }

        for mut doc in documents {
            // Avoid object id collisions by renumbering the incoming document
            doc.renumber_objects_with(max_id + 1);
            max_id = doc.max_id;

            let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
            for &page_id in &page_ids {
                Self::flatten_inherited(&mut doc, page_id);
            }

            merged.objects.extend(doc.objects);

            for &page_id in &page_ids {
                if let Ok(page) = merged.get_object_mut(page_id).and_then(Object::as_dict_mut) {
                    page.set("Parent", root_pages_id);
                }
            }

            Self::append_pages_to_page_tree(&mut merged, root_pages_id, &page_ids)?;
        }

        merged.max_id = max_id;
        merged.prune_objects();
        merged.renumber_objects();
        merged.compress();

        Ok(merged)
    }

    /// Copies inherited attributes onto the page dictionary itself.
    fn flatten_inherited(doc: &mut Document, page_id: ObjectId) {
        let missing: Vec<(&[u8], Object)> = INHERITABLE_ATTRIBUTES
            .iter()
            .filter(|key| {
                doc.get_dictionary(page_id)
                    .map(|page| !page.has(key))
                    .unwrap_or(false)
            })
            .filter_map(|key| inherited_attribute(doc, page_id, key).map(|value| (*key, value)))
            .collect();

        if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            for (key, value) in missing {
                page.set(key, value);
            }
        }
    }

    /// Appends the given page references to the merged document's root Pages dictionary.
    fn append_pages_to_page_tree(
        merged: &mut Document,
        pages_id: ObjectId,
        page_ids: &[ObjectId],
    ) -> Result<()> {
        let pages_dict = merged.get_object_mut(pages_id)?.as_dict_mut()?;

        // Extend Kids[] array with new page references
        let kids_array = pages_dict.get_mut(b"Kids")?.as_array_mut()?;
        kids_array.extend(page_ids.iter().map(|&id| Object::Reference(id)));

        // Patch Count
        let current_count = pages_dict.get(b"Count")?.as_i64()?;
        pages_dict.set("Count", Object::Integer(current_count + page_ids.len() as i64));

        Ok(())
    }
}
