//! Batch merge
//!
//! Concatenates the pages of several documents, in input order, into one.

use crate::command::ProcessingResult;
use crate::document;
use crate::error::PdfError;
use tracing::{debug, warn};

/// Merge documents into a single PDF.
///
/// Pages keep their original order within each input; inputs keep the order
/// given. `original_size` is the sum of all input lengths. An empty input
/// produces a valid document with no pages.
pub fn merge_pdfs<B: AsRef<[u8]>>(buffers: &[B]) -> ProcessingResult {
    let original_size: usize = buffers.iter().map(|b| b.as_ref().len()).sum();

    match merge_documents(buffers) {
        Ok(data) => ProcessingResult::success(data, original_size),
        Err(e) => {
            warn!("Merge failed: {}", e);
            ProcessingResult::failure(e.to_string())
        }
    }
}

fn merge_documents<B: AsRef<[u8]>>(buffers: &[B]) -> Result<Vec<u8>, PdfError> {
    let mut merged = document::create();

    for (i, bytes) in buffers.iter().enumerate() {
        let source = document::load(bytes.as_ref()).map_err(|e| {
            PdfError::ParseError(format!("Failed to load document {}: {}", i, e))
        })?;

        let indices: Vec<u32> = (0..document::page_count(&source)).collect();
        debug!("Merging document {} ({} pages)", i, indices.len());

        for page_id in document::copy_pages(&mut merged, &source, &indices)? {
            document::add_page(&mut merged, page_id)?;
        }
    }

    document::save(&mut merged)
}
