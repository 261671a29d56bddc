//! Plain text extraction, dispatched on file extension.
//!
//! [`extract`] only fails when the file cannot be read. Unsupported
//! extensions and broken files produce empty text so the file is still
//! indexed by name and path.

use std::{
    io::{self, Cursor},
    path::Path,
};

use tracing::{debug, warn};

use crate::document::extension_of;

pub mod email;
pub mod office;
pub mod pdf;

pub use office::OfficeFormat;

/// Extensions picked up by the startup scan and the watcher.
pub const SUPPORTED_EXTENSIONS: &[&str] =
    &["docx", "pptx", "xlsx", "pdf", "md", "txt", "eml"];

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] xml::reader::Error),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("mail parse error: {0}")]
    Mail(#[from] mailparse::MailParseError),

    #[error("unsupported format: {0}")]
    Unsupported(String),
}

/// How a file's bytes are turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    PlainText,
    Pdf,
    Office(OfficeFormat),
    Email,
}

impl Strategy {
    /// Pick the strategy for a lowercase extension (without the dot).
    pub fn for_extension(ext: &str) -> Option<Self> {
        match ext {
            "txt" | "md" => Some(Strategy::PlainText),
            "pdf" => Some(Strategy::Pdf),
            "eml" => Some(Strategy::Email),
            other => OfficeFormat::from_extension(other).map(Strategy::Office),
        }
    }
}

/// Text extracted from one file. `ok` is false when the extension is
/// unsupported or extraction failed, in which case `text` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    pub ok: bool,
}

impl Extracted {
    fn failed() -> Self {
        Self::default()
    }
}

/// Whether `path` has an extension the scanner and watcher care about.
pub fn is_supported(path: &Path) -> bool {
    extension_of(path)
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Extract the text of the file at `path`.
///
/// Read errors are returned so a file that is locked or unreadable right
/// now does not replace what is already indexed for it. Format errors
/// degrade to empty text.
pub fn extract(path: &Path) -> io::Result<Extracted> {
    let Some(strategy) =
        extension_of(path).and_then(|ext| Strategy::for_extension(&ext))
    else {
        debug!(path = %path.display(), "no extractor for extension");
        return Ok(Extracted::failed());
    };

    let bytes = std::fs::read(path)?;
    Ok(match extract_bytes(strategy, &bytes) {
        Ok(text) => Extracted { text, ok: true },
        Err(ExtractError::Unsupported(what)) => {
            debug!(path = %path.display(), "skipping content: {what}");
            Extracted::failed()
        }
        Err(e) => {
            warn!(path = %path.display(), "text extraction failed: {e}");
            Extracted::failed()
        }
    })
}

/// Extract text from an in-memory file. Used for whole files and for
/// email attachments alike.
pub fn extract_bytes(
    strategy: Strategy,
    bytes: &[u8],
) -> Result<String, ExtractError> {
    match strategy {
        Strategy::PlainText => Ok(decode_text(bytes)),
        Strategy::Pdf => pdf::extract_pdf(bytes),
        Strategy::Office(format) => {
            office::extract_office(format, Cursor::new(bytes))
        }
        Strategy::Email => email::extract_email(bytes),
    }
}

/// Decode text files as UTF-8, replacing invalid sequences and dropping
/// a leading byte order mark.
fn decode_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
}
