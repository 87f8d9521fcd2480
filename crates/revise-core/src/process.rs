//! Processing dispatcher
//!
//! Loads a document, applies the operation named by the request and
//! serializes the result into a [`ProcessingResult`].

use crate::command::{OperationType, ProcessingOptions, ProcessingResult};
use crate::document;
use crate::error::PdfError;
use crate::operations::{
    add_watermark, compress_pdf, rotate_pdf, split_pdf, DEFAULT_PAGES, DEFAULT_ROTATION_ANGLE,
    DEFAULT_WATERMARK_TEXT,
};
use tracing::{info, warn};

/// Run one operation over a single document.
///
/// Load, operation and save failures are reported as `success: false`.
/// `Merge` and `Unknown` pass the loaded document through unchanged; use
/// [`crate::merge_pdfs`] to combine several inputs.
pub fn process_pdf(bytes: &[u8], options: &ProcessingOptions) -> ProcessingResult {
    match run(bytes, options) {
        Ok(data) => {
            info!(
                "Processed {} ({} -> {} bytes)",
                options.operation.as_str(),
                bytes.len(),
                data.len()
            );
            ProcessingResult::success(data, bytes.len())
        }
        Err(e) => {
            warn!("Processing {} failed: {}", options.operation.as_str(), e);
            ProcessingResult::failure(e.to_string())
        }
    }
}

fn run(bytes: &[u8], options: &ProcessingOptions) -> Result<Vec<u8>, PdfError> {
    let doc = document::load(bytes)?;

    let mut processed = match options.operation {
        OperationType::Split => {
            let pages = options.pages.as_deref().unwrap_or(&DEFAULT_PAGES[..]);
            split_pdf(&doc, pages)?
        }
        OperationType::Watermark => {
            let text = options
                .watermark_text
                .as_deref()
                .filter(|text| !text.is_empty())
                .unwrap_or(DEFAULT_WATERMARK_TEXT);
            add_watermark(doc, text)?
        }
        OperationType::Rotate => {
            let angle = options
                .rotation_angle
                .filter(|angle| *angle != 0.0)
                .unwrap_or(DEFAULT_ROTATION_ANGLE);
            rotate_pdf(doc, angle)?
        }
        OperationType::Compress => compress_pdf(doc),
        OperationType::Merge | OperationType::Unknown => doc,
    };

    document::save(&mut processed)
}
