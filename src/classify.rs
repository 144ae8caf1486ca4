//! Content type classification
//!
//! Maps a document name, optionally together with its bytes, to a MIME type
//! and decides whether that type counts as text. Names go through
//! `mime_guess`; bytes go through `infer`'s magic-number matchers.

use std::fmt;

/// MIME type string such as `text/plain`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MimeType(String);

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Non-`text/*` types that still hold text
const TEXT_APPLICATION_TYPES: &[&str] = &[
    "application/json",
    "application/javascript",
    "application/xml",
    "application/toml",
    "application/x-yaml",
    "application/yaml",
    "application/x-sh",
    "application/sql",
];

impl MimeType {
    pub fn new(mime: impl Into<String>) -> Self {
        MimeType(mime.into())
    }

    pub fn octet_stream() -> Self {
        MimeType(OCTET_STREAM.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_text(&self) -> bool {
        self.0.starts_with("text/")
            || self.0.ends_with("+xml")
            || self.0.ends_with("+json")
            || TEXT_APPLICATION_TYPES.contains(&self.0.as_str())
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classifier interface
pub trait Classifier: Send + Sync {
    /// Classify from the name alone
    fn detect_by_name(&self, name: &str) -> MimeType;

    /// Classify from the name and the bytes; content evidence wins over the name
    fn detect_by_content(&self, name: &str, bytes: &[u8]) -> MimeType;

    fn is_text_type(&self, mime_type: &MimeType) -> bool {
        mime_type.is_text()
    }
}

/// Classifier driven by the file extension and the leading bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionClassifier;

impl ExtensionClassifier {
    pub fn new() -> Self {
        Self
    }

    fn sniff_magic(bytes: &[u8]) -> Option<MimeType> {
        infer::get(bytes).map(|kind| MimeType::new(kind.mime_type()))
    }

    fn looks_like_text(bytes: &[u8]) -> bool {
        !bytes.contains(&0) && std::str::from_utf8(bytes).is_ok()
    }
}

impl Classifier for ExtensionClassifier {
    fn detect_by_name(&self, name: &str) -> MimeType {
        mime_guess::from_path(name)
            .first()
            .map(|mime| MimeType::new(mime.essence_str()))
            .unwrap_or_else(MimeType::octet_stream)
    }

    fn detect_by_content(&self, name: &str, bytes: &[u8]) -> MimeType {
        if let Some(mime) = Self::sniff_magic(bytes) {
            return mime;
        }
        let by_name = self.detect_by_name(name);
        if bytes.is_empty() {
            return by_name;
        }
        let text = Self::looks_like_text(bytes);
        match (by_name.is_text(), text) {
            (true, false) => MimeType::octet_stream(),
            (false, true) if by_name.as_str() == OCTET_STREAM => MimeType::new("text/plain"),
            _ => by_name,
        }
    }
}
