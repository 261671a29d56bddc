use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("invalid query '{query}': {message}")]
    QuerySyntax { query: String, message: String },

    #[error("index at {0} is locked by another writer")]
    IndexLocked(PathBuf),

    #[error("index has been closed")]
    IndexClosed,

    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),
}

impl Error {
    /// Whether this error came from mutating or committing the index.
    ///
    /// Write failures are the only class that may stop the monitor;
    /// everything else is contained per file.
    pub fn is_index_write(&self) -> bool {
        matches!(
            self,
            Error::Tantivy(_) | Error::IndexLocked(_) | Error::IndexClosed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_failures_are_classified() {
        assert!(Error::IndexClosed.is_index_write());
        assert!(Error::IndexLocked(PathBuf::from("/tmp/idx")).is_index_write());
        assert!(
            !Error::QuerySyntax {
                query: "a:".into(),
                message: "bad".into(),
            }
            .is_index_write()
        );
        assert!(!Error::Config("nope".into()).is_index_write());
    }

    #[test]
    fn query_syntax_message_names_query() {
        let err = Error::QuerySyntax {
            query: "foo AND".into(),
            message: "syntax error".into(),
        };
        assert_eq!(err.to_string(), "invalid query 'foo AND': syntax error");
    }
}
