//! PDF transformation pipeline
//!
//! Server-side document processing on top of lopdf:
//! - [`process_pdf`]: single-document dispatcher (split, watermark, rotate, compress)
//! - [`merge_pdfs`]: concatenate several documents in input order
//! - [`get_pdf_metadata`] / [`validate_pdf`]: read-only inspection
//!
//! Every entry point is synchronous and CPU-bound; callers on an async
//! runtime should move them onto a blocking thread.

pub mod command;
pub mod document;
pub mod error;
pub mod merge;
pub mod metadata;
pub mod operations;
pub mod process;

#[cfg(test)]
pub(crate) mod test_support;

pub use command::{
    processing_type_display_name, OperationType, ProcessingOptions, ProcessingResult,
};
pub use error::PdfError;
pub use merge::merge_pdfs;
pub use metadata::{
    get_pdf_metadata, page_count, validate_pdf, PageDimensions, PdfMetadata, PdfValidation,
};
pub use process::process_pdf;

/// Parse a page list such as `"3, 1, 2"` into page numbers, keeping order and
/// duplicates.
///
/// Values are not range-checked; split skips pages the document lacks.
pub fn parse_page_list(input: &str) -> Result<Vec<i64>, PdfError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|_| PdfError::OperationError(format!("Invalid page: {}", part)))
        })
        .collect()
}
