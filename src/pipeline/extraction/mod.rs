pub mod types;
pub mod sanitize;
pub mod pdf;
pub mod docx;
pub mod orchestrator;

pub use types::*;
pub use sanitize::*;
pub use pdf::*;
pub use docx::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Document {name} is {size} bytes, over the {limit}-byte limit")]
    SizeLimitExceeded { name: String, size: u64, limit: u64 },

    #[error("Document {0} contains no readable text")]
    EmptyDocument(String),

    #[error("Unsupported format for extraction: {0:?}")]
    UnsupportedFormat(String),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("DOCX parsing failed: {0}")]
    DocxParsing(String),
}
