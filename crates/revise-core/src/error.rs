use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Failed to read PDF metadata: {0}")]
    Metadata(String),

    #[error("PDF has no pages")]
    NoPages,

    #[error("Rotation must be a multiple of 90 degrees, got {0}")]
    InvalidRotation(f64),

    #[error("Watermark text cannot be encoded: {0:?}")]
    Encoding(char),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}
