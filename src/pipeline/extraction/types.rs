use serde::Serialize;

use super::ExtractionError;

/// Text recovered from one PDF page.
#[derive(Debug, Clone, Serialize)]
pub struct PageExtraction {
    pub page_number: u32,
    pub text: String,
    /// Set when the page could not be read and contributes empty text.
    pub warning: Option<String>,
}

/// PDF text extraction abstraction (allows mocking for tests)
pub trait PdfExtractor {
    /// Extract up to `max_pages` pages in document order. A page that fails
    /// to extract yields empty text; only an unloadable document is an error.
    fn extract_pages(
        &self,
        pdf_bytes: &[u8],
        max_pages: usize,
    ) -> Result<Vec<PageExtraction>, ExtractionError>;
}

/// DOCX body-text extraction abstraction
pub trait DocxExtractor {
    fn extract_body(&self, docx_bytes: &[u8]) -> Result<String, ExtractionError>;
}
