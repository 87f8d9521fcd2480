//! Single-document transform operations
//!
//! Each operation takes a loaded document and returns the document to be
//! serialized. Split builds a new document; the others mutate and return
//! their input.

use crate::document::{self, DrawTextOptions, Rgb, TextRotation};
use crate::error::PdfError;
use lopdf::Document;
use tracing::debug;

pub const DEFAULT_PAGES: [i64; 1] = [1];
pub const DEFAULT_WATERMARK_TEXT: &str = "RevisePDF";
pub const DEFAULT_ROTATION_ANGLE: f64 = 90.0;

const WATERMARK_FONT: &str = "Helvetica";
const WATERMARK_FONT_SIZE: f32 = 50.0;
const WATERMARK_COLOR: Rgb = Rgb(0.8, 0.8, 0.8);
const WATERMARK_OPACITY: f32 = 0.3;
const WATERMARK_ANGLE: f32 = 45.0;
/// Approximate glyph advance used to offset the watermark from the page centre
const WATERMARK_CHAR_WIDTH: f32 = 8.0;

/// Build a new document holding the requested pages (1-based) in the given order.
///
/// Page numbers outside `1..=page_count` are skipped; repeated numbers
/// repeat the page.
pub fn split_pdf(doc: &Document, page_numbers: &[i64]) -> Result<Document, PdfError> {
    let total = i64::from(document::page_count(doc));

    let indices: Vec<u32> = page_numbers
        .iter()
        .filter(|&&n| n > 0 && n <= total)
        .map(|&n| (n - 1) as u32)
        .collect();

    if indices.len() < page_numbers.len() {
        debug!(
            "Skipped {} out-of-range page numbers (document has {} pages)",
            page_numbers.len() - indices.len(),
            total
        );
    }

    let mut split = document::create();
    for page_id in document::copy_pages(&mut split, doc, &indices)? {
        document::add_page(&mut split, page_id)?;
    }
    Ok(split)
}

/// Stamp `text` diagonally across every page
pub fn add_watermark(mut doc: Document, text: &str) -> Result<Document, PdfError> {
    let font = document::embed_standard_font(&mut doc, WATERMARK_FONT);
    // Width heuristic counts UTF-16 code units
    let text_len = text.encode_utf16().count() as f32;

    for page_id in document::page_ids(&doc) {
        let size = document::page_size(&doc, page_id)?;
        let center_x = size.width / 2.0;
        let center_y = size.height / 2.0;

        let options = DrawTextOptions {
            x: center_x - text_len * WATERMARK_CHAR_WIDTH,
            y: center_y,
            size: WATERMARK_FONT_SIZE,
            font: &font,
            color: WATERMARK_COLOR,
            opacity: WATERMARK_OPACITY,
            rotate: Some(TextRotation {
                degrees: WATERMARK_ANGLE,
                origin_x: center_x,
                origin_y: center_y,
            }),
        };
        document::draw_text(&mut doc, page_id, text, &options)?;
    }

    Ok(doc)
}

/// Set the absolute rotation of every page.
///
/// `angle` must be a multiple of 90; it is stored normalized to 0..360.
pub fn rotate_pdf(mut doc: Document, angle: f64) -> Result<Document, PdfError> {
    if !angle.is_finite() || angle % 90.0 != 0.0 {
        return Err(PdfError::InvalidRotation(angle));
    }
    let degrees = (angle.rem_euclid(360.0)) as i64;

    for page_id in document::page_ids(&doc) {
        document::set_rotation(&mut doc, page_id, degrees)?;
    }
    Ok(doc)
}

/// Identity transform; size reduction comes only from re-serialization
pub fn compress_pdf(doc: Document) -> Document {
    doc
}
