use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::Result;

/// Storage format of the `modified` field: UTC, millisecond resolution.
const MODIFIED_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// One indexed file. `path` is the primary key of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedDocument {
    /// Absolute filesystem path.
    pub path: String,
    /// Base name, searchable on its own.
    pub filename: String,
    /// Lowercase extension without the leading dot; empty when the file
    /// has none.
    pub extension: String,
    /// Last write time, truncated to milliseconds.
    pub modified_at: DateTime<Utc>,
    /// Extracted plain text. Empty when extraction failed.
    pub content: String,
}

impl IndexedDocument {
    /// Build the record for `path` from its filesystem metadata and the
    /// extracted `content`.
    ///
    /// Metadata is read independently of extraction, so a file whose
    /// content could not be extracted is still indexed by name.
    pub fn build(path: &Path, content: String) -> Result<Self> {
        let absolute = std::path::absolute(path)?;
        let modified = std::fs::metadata(&absolute)?.modified()?;

        Ok(Self {
            path: absolute.to_string_lossy().into_owned(),
            filename: absolute
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            extension: extension_of(&absolute).unwrap_or_default(),
            modified_at: truncate_to_millis(DateTime::<Utc>::from(modified)),
            content,
        })
    }

    /// Milliseconds since the Unix epoch.
    pub fn modified_ms(&self) -> i64 {
        self.modified_at.timestamp_millis()
    }

    /// The string-encoded timestamp stored in the `modified` field.
    pub fn modified_string(&self) -> String {
        self.modified_at.format(MODIFIED_FORMAT).to_string()
    }
}

/// Lowercased extension of `path`, without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Rebuild a timestamp from its stored millisecond value.
pub fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    from_millis(ts.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_reads_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("Report.PDF");
        std::fs::write(&file, "not really a pdf").unwrap();

        let doc = IndexedDocument::build(&file, String::new()).unwrap();
        assert_eq!(doc.filename, "Report.PDF");
        assert_eq!(doc.extension, "pdf");
        assert_eq!(doc.path, file.to_string_lossy());
        assert!(doc.content.is_empty());
        assert!(doc.modified_ms() > 0);
    }

    #[test]
    fn build_missing_file_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = IndexedDocument::build(&tmp.path().join("gone.txt"), "x".into())
            .unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
    }

    #[test]
    fn build_is_stable_for_unchanged_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("a.txt");
        std::fs::write(&file, "same").unwrap();

        let first = IndexedDocument::build(&file, "same".into()).unwrap();
        let second = IndexedDocument::build(&file, "same".into()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn modified_string_has_millisecond_resolution() {
        let doc = IndexedDocument {
            path: "/x/a.txt".into(),
            filename: "a.txt".into(),
            extension: "txt".into(),
            modified_at: from_millis(1_704_067_200_123),
            content: String::new(),
        };
        assert_eq!(doc.modified_string(), "20240101000000123");
        assert_eq!(doc.modified_ms(), 1_704_067_200_123);
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension_of(Path::new("a/B.DocX")).as_deref(), Some("docx"));
        assert_eq!(extension_of(Path::new("Makefile")), None);
    }
}
