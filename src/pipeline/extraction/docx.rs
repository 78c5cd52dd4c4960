//! DOCX body text via the WordprocessingML part of the zip container.
//!
//! Only `word/document.xml` is read. Paragraph ends become newlines,
//! `w:tab` a tab and `w:br` a line break; everything else is markup.

use std::io::{Cursor, Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use super::types::DocxExtractor;
use super::ExtractionError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Ceiling on the decompressed document part, against zip bombs.
const MAX_DOCUMENT_PART_BYTES: u64 = 64 * 1024 * 1024;

pub struct DocxTextExtractor;

impl DocxExtractor for DocxTextExtractor {
    fn extract_body(&self, docx_bytes: &[u8]) -> Result<String, ExtractionError> {
        let mut archive = ZipArchive::new(Cursor::new(docx_bytes))
            .map_err(|e| ExtractionError::DocxParsing(format!("Not a DOCX container: {e}")))?;
        let xml = read_document_part(&mut archive, MAX_DOCUMENT_PART_BYTES)?;
        body_text_from_xml(&xml)
    }
}

/// Decompress `word/document.xml`, refusing parts larger than `limit` bytes.
fn read_document_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    limit: u64,
) -> Result<String, ExtractionError> {
    let part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| ExtractionError::DocxParsing(format!("Missing {DOCUMENT_PART}: {e}")))?;

    let mut bytes = Vec::new();
    part.take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|e| ExtractionError::DocxParsing(e.to_string()))?;
    if bytes.len() as u64 > limit {
        return Err(ExtractionError::DocxParsing(format!(
            "{DOCUMENT_PART} exceeds {limit} bytes when decompressed"
        )));
    }

    String::from_utf8(bytes)
        .map_err(|e| ExtractionError::DocxParsing(format!("{DOCUMENT_PART} is not UTF-8: {e}")))
}

/// Walk the document XML once, collecting the text of `w:t` runs.
fn body_text_from_xml(xml: &str) -> Result<String, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut text = String::new();
    let mut in_text_run = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text_run = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text_run => {
                let unescaped = t
                    .unescape()
                    .map_err(|e| ExtractionError::DocxParsing(format!("Bad text run: {e}")))?;
                text.push_str(&unescaped);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractionError::DocxParsing(format!(
                    "Malformed XML at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}
