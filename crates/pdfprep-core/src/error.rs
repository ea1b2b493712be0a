use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfPrepError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("Invalid option: {0}")]
    InvalidConfig(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Image processing failed: {0}")]
    ImageError(String),
}
