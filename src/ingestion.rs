use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::{
    document::IndexedDocument,
    error::Result,
    extract,
    tantivy_index::IndexService,
};

/// Outcome of ingesting a batch of files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Files upserted into the index.
    pub indexed: usize,
    /// Files skipped because they could not be read.
    pub skipped: usize,
}

/// Extract the text of `path` and build its index record.
///
/// Format failures degrade to empty content. A file that is gone,
/// locked or unreadable is an error, so its existing entry stays as is.
pub fn load_document(path: &Path) -> Result<IndexedDocument> {
    let extracted = extract::extract(path)?;
    IndexedDocument::build(path, extracted.text)
}

/// Re-index a single file and commit.
///
/// Errors from reading the file and errors from the index writer are
/// both returned; callers tell them apart with
/// [`Error::is_index_write`](crate::error::Error::is_index_write).
pub fn index_file(
    service: &IndexService,
    path: &Path,
) -> Result<IndexedDocument> {
    let doc = load_document(path)?;
    service.upsert(&doc)?;
    service.commit()?;
    info!(path = %doc.path, "indexed");
    Ok(doc)
}

/// Ingest a batch of discovered files into the index.
///
/// Files are extracted in parallel, then upserted sequentially through
/// the single writer and committed once at the end. A file that cannot
/// be read is logged and counted as skipped; a writer failure aborts the
/// batch.
pub fn ingest_files(
    service: &IndexService,
    files: &[PathBuf],
) -> Result<IngestReport> {
    // Extract in parallel, then index sequentially (one writer).
    let loaded: Vec<_> = files
        .par_iter()
        .map(|path| (path, load_document(path)))
        .collect();

    let mut report = IngestReport::default();
    for (path, result) in loaded {
        match result {
            Ok(doc) => {
                service.upsert(&doc)?;
                info!(path = %doc.path, "indexed");
                report.indexed += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), "skipping file: {e}");
                report.skipped += 1;
            }
        }
    }

    service.commit()?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tantivy_index::tests::test_options;

    fn service() -> IndexService {
        IndexService::open_in_ram(&test_options()).unwrap()
    }

    #[test]
    fn load_document_reads_text_and_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("Notes.MD");
        std::fs::write(&path, "# Title\nbody").unwrap();

        let doc = load_document(&path).unwrap();
        assert_eq!(doc.filename, "Notes.MD");
        assert_eq!(doc.extension, "md");
        assert_eq!(doc.content, "# Title\nbody");
    }

    #[test]
    fn corrupt_file_is_indexed_with_empty_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.docx");
        std::fs::write(&path, "not a zip archive").unwrap();

        let doc = load_document(&path).unwrap();
        assert_eq!(doc.filename, "broken.docx");
        assert!(doc.content.is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_document(&tmp.path().join("gone.txt")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_keeps_indexed_content() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, "invoice 2024 total").unwrap();

        let service = service();
        let doc = index_file(&service, &path).unwrap();

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o000))
            .unwrap();
        if std::fs::read(&path).is_ok() {
            // Running as root, permissions are not enforced.
            return;
        }

        let err = index_file(&service, &path).unwrap_err();
        assert!(!err.is_index_write());
        let report = ingest_files(&service, std::slice::from_ref(&path)).unwrap();
        assert_eq!(report, IngestReport { indexed: 0, skipped: 1 });

        let stored = service.open_reader().unwrap().get(&doc.path).unwrap();
        assert_eq!(stored.unwrap().content, "invoice 2024 total");
    }

    #[test]
    fn directory_with_document_name_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("archive.txt");
        std::fs::create_dir(&dir).unwrap();

        let service = service();
        assert!(index_file(&service, &dir).is_err());
        assert_eq!(service.open_reader().unwrap().doc_count(), 0);
    }

    #[test]
    fn index_file_commits() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, "invoice 2024 total").unwrap();

        let service = service();
        let doc = index_file(&service, &path).unwrap();

        let snapshot = service.open_reader().unwrap();
        assert_eq!(snapshot.get(&doc.path).unwrap(), Some(doc));
    }

    #[test]
    fn index_file_twice_keeps_one_document() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, "same text").unwrap();

        let service = service();
        let first = index_file(&service, &path).unwrap();
        let second = index_file(&service, &path).unwrap();
        assert_eq!(first, second);

        let snapshot = service.open_reader().unwrap();
        assert_eq!(snapshot.count_path(&first.path).unwrap(), 1);
        assert_eq!(snapshot.doc_count(), 1);
    }

    #[test]
    fn ingest_files_skips_unreadable_and_commits_rest() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.txt");
        let b = tmp.path().join("b.md");
        std::fs::write(&a, "alpha").unwrap();
        std::fs::write(&b, "beta").unwrap();
        let missing = tmp.path().join("missing.txt");

        let service = service();
        let report =
            ingest_files(&service, &[a.clone(), missing, b.clone()]).unwrap();
        assert_eq!(report, IngestReport { indexed: 2, skipped: 1 });

        let snapshot = service.open_reader().unwrap();
        assert_eq!(snapshot.doc_count(), 2);
    }

    #[test]
    fn ingest_into_closed_service_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.txt");
        std::fs::write(&a, "alpha").unwrap();

        let service = service();
        service.close().unwrap();
        let err = ingest_files(&service, &[a]).unwrap_err();
        assert!(err.is_index_write());
    }
}
