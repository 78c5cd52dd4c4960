//! Report rendering: one paginated PDF per analyzed candidate.
//!
//! PDF generation via `printpdf` builtin fonts, which only cover Latin-1,
//! so analysis text is transliterated before layout.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use printpdf::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("PDF generation failed: {0}")]
    Pdf(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Renders an analysis text into a paginated document.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, candidate_name: &str, analysis_text: &str) -> Result<Vec<u8>, ReportError>;
}

const PAGE_WIDTH: Mm = Mm(210.0);
const PAGE_HEIGHT: Mm = Mm(297.0);
const MARGIN_LEFT: Mm = Mm(20.0);
const TOP: f32 = 280.0;
const BOTTOM: f32 = 22.0;
const LINE_HEIGHT: f32 = 5.0;
const WRAP_CHARS: usize = 95;
const MAX_NAME_SUFFIX: u32 = 1000;

/// A4 report in Helvetica with a title header and "Page N" footers.
pub struct PdfReportRenderer {
    title: String,
    critical_marker: String,
}

impl PdfReportRenderer {
    pub fn new(critical_marker: &str) -> Self {
        Self {
            title: "Proposal Analysis Report".into(),
            critical_marker: critical_marker.to_string(),
        }
    }
}

impl ReportRenderer for PdfReportRenderer {
    fn render(&self, candidate_name: &str, analysis_text: &str) -> Result<Vec<u8>, ReportError> {
        let (doc, page1, layer1) = PdfDocument::new(self.title.as_str(), PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ReportError::Pdf(format!("font error: {e}")))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ReportError::Pdf(format!("font error: {e}")))?;
        let italic = doc
            .add_builtin_font(BuiltinFont::HelveticaOblique)
            .map_err(|e| ReportError::Pdf(format!("font error: {e}")))?;

        let mut page_no = 1;
        let mut layer = doc.get_page(page1).get_layer(layer1);
        let mut y = TOP;

        layer.use_text(&self.title, 12.0, MARGIN_LEFT, Mm(y), &bold);
        y -= 10.0;
        let heading = format!("Proposal: {}", latin1(candidate_name, &self.critical_marker));
        for line in wrap_text(&heading, WRAP_CHARS - 10) {
            layer.use_text(&line, 11.0, MARGIN_LEFT, Mm(y), &bold);
            y -= 6.0;
        }
        y -= 2.0;

        let body = latin1(analysis_text, &self.critical_marker);
        for paragraph in body.lines() {
            for line in wrap_text(paragraph, WRAP_CHARS) {
                if y < BOTTOM {
                    footer(&layer, page_no, &italic);
                    let (page, page_layer) = doc.add_page(PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
                    layer = doc.get_page(page).get_layer(page_layer);
                    page_no += 1;
                    y = TOP;
                }
                layer.use_text(&line, 10.0, MARGIN_LEFT, Mm(y), &font);
                y -= LINE_HEIGHT;
            }
        }
        footer(&layer, page_no, &italic);

        let mut buf = BufWriter::new(Vec::new());
        doc.save(&mut buf)
            .map_err(|e| ReportError::Pdf(format!("save error: {e}")))?;
        buf.into_inner()
            .map_err(|e| ReportError::Pdf(format!("buffer error: {e}")))
    }
}

fn footer(layer: &PdfLayerReference, page_no: usize, font: &IndirectFontRef) {
    layer.use_text(format!("Page {page_no}"), 8.0, Mm(100.0), Mm(10.0), font);
}

/// Map text onto what the builtin fonts can show. The critical marker
/// becomes `[!]`; typographic punctuation gets ASCII stand-ins.
fn latin1(text: &str, critical_marker: &str) -> String {
    let text = if critical_marker.is_empty() {
        text.to_string()
    } else {
        text.replace(critical_marker, "[!]")
    };
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2013}' | '\u{2014}' | '\u{2212}' => out.push('-'),
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2022}' => out.push('*'),
            '\u{2026}' => out.push_str("..."),
            '\u{FE0F}' | '\u{200D}' => {}
            c if (c as u32) <= 0xFF => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// Simple word-wrap helper for PDF text rendering.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len + word_len + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// `report_<candidate name, spaces as underscores>.pdf`, safe as a file name.
pub fn report_file_name(candidate_name: &str) -> String {
    let stem: String = candidate_name
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect();
    format!("report_{stem}.pdf")
}

/// Renders reports and writes them under a fixed directory.
pub struct ReportOutput {
    renderer: Box<dyn ReportRenderer>,
    dir: PathBuf,
}

impl ReportOutput {
    pub fn new(renderer: Box<dyn ReportRenderer>, dir: &Path) -> Self {
        Self {
            renderer,
            dir: dir.to_path_buf(),
        }
    }

    /// Render and write a report. An existing report is never overwritten:
    /// later ones for the same name get `_2`, `_3`, ... suffixes.
    pub fn write(&self, candidate_name: &str, analysis_text: &str) -> Result<PathBuf, ReportError> {
        let bytes = self.renderer.render(candidate_name, analysis_text)?;
        std::fs::create_dir_all(&self.dir)?;
        let (mut file, path) = self.create_unique(candidate_name)?;
        file.write_all(&bytes)?;
        tracing::debug!(path = %path.display(), "Report written");
        Ok(path)
    }

    fn create_unique(&self, candidate_name: &str) -> Result<(File, PathBuf), ReportError> {
        let file_name = report_file_name(candidate_name);
        let stem = file_name.strip_suffix(".pdf").unwrap_or(&file_name);

        for n in 1..=MAX_NAME_SUFFIX {
            let path = if n == 1 {
                self.dir.join(&file_name)
            } else {
                self.dir.join(format!("{stem}_{n}.pdf"))
            };
            // create_new is atomic, so concurrent candidates cannot claim the same path.
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((file, path)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ReportError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("too many reports named {file_name}"),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(text: &str) -> Vec<u8> {
        PdfReportRenderer::new("🔴").render("Proposal A.pdf", text).unwrap()
    }

    #[test]
    fn renders_pdf_bytes() {
        let bytes = render("Overall conformance: 62%.\n🔴 Late delivery risk.\nRecommendation: Revise.");
        assert!(!bytes.is_empty());
        assert_eq!(&bytes[0..4], b"%PDF");
    }

    #[test]
    fn long_text_spans_multiple_pages() {
        let text = "Unmet item: delivery schedule exceeds the tender limit.\n".repeat(200);
        let bytes = render(&text);
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() > 1);
    }

    #[test]
    fn short_text_is_single_page() {
        let doc = lopdf::Document::load_mem(&render("Overall conformance: 90%")).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn transliterates_outside_latin1() {
        let out = latin1("🔴 Prazo — “atraso” de 15 dias… ✓", "🔴");
        assert_eq!(out, "[!] Prazo - \"atraso\" de 15 dias... ?");
    }

    #[test]
    fn keeps_latin1_accents() {
        assert_eq!(latin1("Licitação pública", "🔴"), "Licitação pública");
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let lines = wrap_text("one two three four five", 9);
        assert_eq!(lines, vec!["one two", "three", "four five"]);
        assert_eq!(wrap_text("", 10), vec![String::new()]);
    }

    #[test]
    fn file_name_replaces_spaces() {
        assert_eq!(report_file_name("Proposta Acme Ltda.pdf"), "report_Proposta_Acme_Ltda.pdf.pdf");
        assert_eq!(report_file_name("../etc/x"), "report_.._etc_x.pdf");
    }

    #[test]
    fn output_writes_into_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let out = ReportOutput::new(Box::new(PdfReportRenderer::new("🔴")), &tmp.path().join("reports"));
        let path = out.write("Acme Bid", "Recommendation: Approve").unwrap();

        assert!(path.exists());
        assert!(path.ends_with("report_Acme_Bid.pdf"));
        assert_eq!(&std::fs::read(&path).unwrap()[0..4], b"%PDF");
    }

    #[test]
    fn same_name_does_not_overwrite_earlier_report() {
        let tmp = tempfile::tempdir().unwrap();
        let out = ReportOutput::new(Box::new(PdfReportRenderer::new("🔴")), tmp.path());

        let first = out.write("Acme Bid", "Recommendation: Approve").unwrap();
        let second = out.write("Acme Bid", "Recommendation: Reject").unwrap();
        let third = out.write("Acme Bid", "Recommendation: Revise").unwrap();

        assert!(first.ends_with("report_Acme_Bid.pdf"));
        assert!(second.ends_with("report_Acme_Bid_2.pdf"));
        assert!(third.ends_with("report_Acme_Bid_3.pdf"));
        assert_ne!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());
    }
}
