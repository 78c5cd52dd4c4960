use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Declared format of an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Docx,
    /// Anything else, carrying the extension (or mime hint) it arrived with.
    Other(String),
}

impl DocumentKind {
    /// Infer the kind from a file name's extension (case-insensitive).
    pub fn from_file_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            _ => Self::Other(ext),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Other(ext) => ext,
        }
    }
}

/// A raw uploaded document. Immutable; discarded once normalized.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    kind: DocumentKind,
    name: String,
    declared_size: u64,
    bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(kind: DocumentKind, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let declared_size = bytes.len() as u64;
        Self {
            kind,
            name: name.into(),
            declared_size,
            bytes,
        }
    }

    /// Build a document whose upload surface reported a size separately
    /// from the bytes it handed over.
    pub fn with_declared_size(mut self, declared_size: u64) -> Self {
        self.declared_size = declared_size;
        self
    }

    /// Read a document from disk, inferring its kind from the extension.
    ///
    /// Files larger than `max_bytes` are not loaded: the document keeps
    /// only their on-disk size, so the normalizer rejects them by size.
    pub fn from_path(path: &Path, max_bytes: u64) -> std::io::Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let kind = DocumentKind::from_file_name(&name);

        let on_disk = std::fs::metadata(path)?.len();
        if on_disk > max_bytes {
            return Ok(Self::new(kind, name, Vec::new()).with_declared_size(on_disk));
        }

        // The file may grow between stat and read; never take more than limit + 1.
        let mut bytes = Vec::new();
        File::open(path)?
            .take(max_bytes.saturating_add(1))
            .read_to_end(&mut bytes)?;
        Ok(Self::new(kind, name, bytes).with_declared_size(on_disk))
    }

    pub fn kind(&self) -> &DocumentKind {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Effective size for limit checks: the larger of declared and actual.
    pub fn size(&self) -> u64 {
        self.declared_size.max(self.bytes.len() as u64)
    }
}

/// Clean plain text produced by the normalizer.
///
/// Non-empty after trimming; only the normalizer constructs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedText {
    text: String,
    origin: String,
}

impl NormalizedText {
    pub(crate) fn new(text: String, origin: impl Into<String>) -> Self {
        Self {
            text,
            origin: origin.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}
