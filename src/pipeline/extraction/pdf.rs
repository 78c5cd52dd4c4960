use lopdf::Document;

use super::types::{PageExtraction, PdfExtractor};
use super::ExtractionError;

/// PDF text extractor over the lopdf object model.
/// Handles digital PDFs with embedded text layers; scanned pages come back empty.
pub struct PdfTextExtractor;

impl PdfExtractor for PdfTextExtractor {
    fn extract_pages(
        &self,
        pdf_bytes: &[u8],
        max_pages: usize,
    ) -> Result<Vec<PageExtraction>, ExtractionError> {
        let doc = Document::load_mem(pdf_bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        if page_numbers.len() > max_pages {
            tracing::warn!(
                total_pages = page_numbers.len(),
                max_pages,
                "PDF exceeds page limit, extracting leading pages only"
            );
        }

        let pages = page_numbers
            .into_iter()
            .take(max_pages)
            .map(|page_number| match doc.extract_text(&[page_number]) {
                Ok(text) => PageExtraction {
                    page_number,
                    text,
                    warning: None,
                },
                Err(e) => {
                    tracing::warn!(page = page_number, error = %e, "Page extraction failed, continuing");
                    PageExtraction {
                        page_number,
                        text: String::new(),
                        warning: Some(e.to_string()),
                    }
                }
            })
            .collect();

        Ok(pages)
    }
}
