//! Generated trailer page appended after the merged documents.
//!
//! The page is drawn with the standard Type1 Helvetica fonts, so no font data
//! has to be embedded. Text is centered using the fonts' published advance
//! widths.

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use crate::error::Result;
use crate::io::{PageGeometry, PdfWriter};

/// Advance widths of Helvetica for ASCII 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 222, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    222, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Advance widths of Helvetica-Bold for ASCII 32..=126, in 1/1000 em.
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 278, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // '0'..'?'
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 'P'..'_'
    278, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // '`'..'o'
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 'p'..'~'
];

/// Width used for characters outside the tables.
const FALLBACK_WIDTH: u16 = 556;

type Rgb = (f32, f32, f32);

const BACKGROUND: Rgb = (0.99, 0.98, 0.95);
const NAVY: Rgb = (0.1, 0.2, 0.4);
const GOLD: Rgb = (0.7, 0.5, 0.2);
const CHARCOAL: Rgb = (0.2, 0.2, 0.2);
const ACCENT: Rgb = (0.0, 0.4, 0.7);
const GREY: Rgb = (0.4, 0.4, 0.4);

const OUTER_BORDER_PAD: f32 = 20.0;
const OUTER_BORDER_WIDTH: f32 = 10.0;
const INNER_BORDER_PAD: f32 = 35.0;
const INNER_BORDER_WIDTH: f32 = 3.0;

/// One of the two base fonts registered on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Face {
    Regular,
    Bold,
}

impl Face {
    fn resource_name(self) -> &'static str {
        match self {
            Face::Regular => "F1",
            Face::Bold => "F2",
        }
    }

    /// Width of `text` at `size` points.
    fn text_width(self, text: &str, size: f32) -> f32 {
        let table = match self {
            Face::Regular => &HELVETICA_WIDTHS,
            Face::Bold => &HELVETICA_BOLD_WIDTHS,
        };
        let units: u32 = text
            .chars()
            .map(|c| {
                (c as usize)
                    .checked_sub(32)
                    .and_then(|idx| table.get(idx))
                    .copied()
                    .unwrap_or(FALLBACK_WIDTH) as u32
            })
            .sum();
        units as f32 * size / 1000.0
    }
}

/// Text printed on the trailer page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailerContent {
    /// Two short lines above the title.
    pub heading: [String; 2],
    /// Large title in the middle of the page.
    pub title: String,
    /// Line below the title.
    pub subtitle: String,
    /// Small print at the bottom.
    pub footer: String,
}

impl Default for TrailerContent {
    fn default() -> Self {
        Self {
            heading: ["PROFESSIONALLY".into(), "MERGED DOCUMENT".into()],
            title: "PDFMERGE".into(),
            subtitle: "PRO MERGER SYSTEM".into(),
            footer: "Generated by pdfmerge | Secure & Verified".into(),
        }
    }
}

/// Renders the trailer page.
#[derive(Debug, Clone, Default)]
pub struct TrailerGenerator {
    content: TrailerContent,
}

impl TrailerGenerator {
    pub fn new(content: TrailerContent) -> Self {
        Self { content }
    }

    /// Write a one-page PDF of exactly `geometry` to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the content stream cannot be encoded or the file
    /// cannot be written.
    pub fn generate<P: AsRef<Path>>(&self, path: P, geometry: PageGeometry) -> Result<()> {
        let mut doc = self.build(geometry)?;
        PdfWriter::write(&mut doc, path)
    }

    /// Build the trailer document in memory.
    pub fn build(&self, geometry: PageGeometry) -> Result<Document> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let regular_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let bold_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                Face::Regular.resource_name() => regular_id,
                Face::Bold.resource_name() => bold_id,
            },
        });

        let content = Content {
            operations: self.operations(geometry),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => Object::Array(vec![
                0.into(),
                0.into(),
                geometry.width.into(),
                geometry.height.into(),
            ]),
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => Object::Array(vec![page_id.into()]),
                "Count" => 1,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        Ok(doc)
    }

    fn operations(&self, geometry: PageGeometry) -> Vec<Operation> {
        let PageGeometry {
            width: w,
            height: h,
        } = geometry;
        let big = geometry.min_side() * 0.22;
        let medium = geometry.min_side() * 0.05;
        let small = geometry.min_side() * 0.03;

        let y_top = h * 0.78;
        let y_mid = h * 0.5;
        let y_sub = h * 0.35;
        let y_foot = h * 0.1;

        let mut ops = Vec::with_capacity(64);

        fill_color(&mut ops, BACKGROUND);
        ops.push(rect_op(0.0, 0.0, w, h));
        ops.push(Operation::new("f", vec![]));

        stroke_rect(&mut ops, OUTER_BORDER_PAD, OUTER_BORDER_WIDTH, NAVY, w, h);
        stroke_rect(&mut ops, INNER_BORDER_PAD, INNER_BORDER_WIDTH, GOLD, w, h);

        let [first, second] = &self.content.heading;
        fill_color(&mut ops, CHARCOAL);
        centered_text(&mut ops, Face::Regular, medium, w / 2.0, y_top, first);
        centered_text(&mut ops, Face::Regular, medium, w / 2.0, y_top - medium * 1.2, second);

        // Drop shadow, then the title itself.
        fill_color(&mut ops, NAVY);
        centered_text(&mut ops, Face::Bold, big, w / 2.0 + 4.0, y_mid - 4.0, &self.content.title);
        centered_text(&mut ops, Face::Bold, big, w / 2.0, y_mid, &self.content.title);

        fill_color(&mut ops, ACCENT);
        centered_text(&mut ops, Face::Bold, medium, w / 2.0, y_sub, &self.content.subtitle);

        fill_color(&mut ops, GREY);
        centered_text(&mut ops, Face::Regular, small, w / 2.0, y_foot, &self.content.footer);

        let y_rule = y_mid - big * 0.2;
        stroke_color(&mut ops, GOLD);
        ops.push(Operation::new("w", vec![2.into()]));
        ops.push(Operation::new("m", vec![(w * 0.3).into(), y_rule.into()]));
        ops.push(Operation::new("l", vec![(w * 0.7).into(), y_rule.into()]));
        ops.push(Operation::new("S", vec![]));

        ops
    }
}

fn fill_color(ops: &mut Vec<Operation>, (r, g, b): Rgb) {
    ops.push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
}

fn stroke_color(ops: &mut Vec<Operation>, (r, g, b): Rgb) {
    ops.push(Operation::new("RG", vec![r.into(), g.into(), b.into()]));
}

fn rect_op(x: f32, y: f32, w: f32, h: f32) -> Operation {
    Operation::new("re", vec![x.into(), y.into(), w.into(), h.into()])
}

fn stroke_rect(ops: &mut Vec<Operation>, pad: f32, line_width: f32, color: Rgb, w: f32, h: f32) {
    stroke_color(ops, color);
    ops.push(Operation::new("w", vec![line_width.into()]));
    ops.push(rect_op(pad, pad, w - pad * 2.0, h - pad * 2.0));
    ops.push(Operation::new("S", vec![]));
}

fn centered_text(ops: &mut Vec<Operation>, face: Face, size: f32, cx: f32, y: f32, text: &str) {
    let x = cx - face.text_width(text, size) / 2.0;
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec![Object::Name(face.resource_name().as_bytes().to_vec()), size.into()],
    ));
    ops.push(Operation::new("Td", vec![x.into(), y.into()]));
    ops.push(Operation::new("Tj", vec![Object::string_literal(text)]));
    ops.push(Operation::new("ET", vec![]));
}
