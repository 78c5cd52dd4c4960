use regex::Regex;

use super::docx::DocxTextExtractor;
use super::pdf::PdfTextExtractor;
use super::sanitize::{compile_boilerplate, sanitize_extracted_text};
use super::types::{DocxExtractor, PdfExtractor};
use super::ExtractionError;
use crate::config::{AnalyzerConfig, ConfigError};
use crate::models::{DocumentKind, NormalizedText, SourceDocument};

/// Turns raw uploaded documents into clean plain text.
/// Uses trait objects for PDF and DOCX extraction, enabling dependency injection.
pub struct DocumentNormalizer {
    pdf_extractor: Box<dyn PdfExtractor + Send + Sync>,
    docx_extractor: Box<dyn DocxExtractor + Send + Sync>,
    max_pdf_pages: usize,
    boilerplate: Vec<Regex>,
}

impl DocumentNormalizer {
    pub fn new(
        pdf_extractor: Box<dyn PdfExtractor + Send + Sync>,
        docx_extractor: Box<dyn DocxExtractor + Send + Sync>,
        max_pdf_pages: usize,
        boilerplate: Vec<Regex>,
    ) -> Self {
        Self {
            pdf_extractor,
            docx_extractor,
            max_pdf_pages,
            boilerplate,
        }
    }

    /// Normalizer backed by the lopdf and zip/quick-xml extractors.
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self, ConfigError> {
        let boilerplate = compile_boilerplate(&config.boilerplate_patterns)
            .map_err(|e| ConfigError::Invalid(format!("boilerplate pattern: {e}")))?;
        Ok(Self::new(
            Box::new(PdfTextExtractor),
            Box::new(DocxTextExtractor),
            config.max_pdf_pages,
            boilerplate,
        ))
    }

    /// Extract, clean and validate the text of one document.
    pub fn normalize(
        &self,
        document: &SourceDocument,
        max_size_bytes: u64,
    ) -> Result<NormalizedText, ExtractionError> {
        let name = document.name();

        if document.size() > max_size_bytes {
            return Err(ExtractionError::SizeLimitExceeded {
                name: name.to_string(),
                size: document.size(),
                limit: max_size_bytes,
            });
        }

        tracing::debug!(
            document = %name,
            kind = document.kind().as_str(),
            bytes = document.size(),
            "Starting text extraction"
        );

        let raw = match document.kind() {
            DocumentKind::Pdf => {
                let pages = self
                    .pdf_extractor
                    .extract_pages(document.bytes(), self.max_pdf_pages)?;
                let failed = pages.iter().filter(|p| p.warning.is_some()).count();
                if failed > 0 {
                    tracing::warn!(
                        document = %name,
                        failed_pages = failed,
                        total_pages = pages.len(),
                        "Partial PDF extraction"
                    );
                }
                pages
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            DocumentKind::Docx => self.docx_extractor.extract_body(document.bytes())?,
            DocumentKind::Other(ext) => {
                return Err(ExtractionError::UnsupportedFormat(ext.clone()));
            }
        };

        let clean = sanitize_extracted_text(&raw, &self.boilerplate);
        if clean.trim().is_empty() {
            return Err(ExtractionError::EmptyDocument(name.to_string()));
        }

        tracing::debug!(document = %name, chars = clean.chars().count(), "Document normalized");
        Ok(NormalizedText::new(clean, name))
    }
}
