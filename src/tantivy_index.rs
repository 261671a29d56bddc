use std::{
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use tantivy::{
    DocAddress,
    Index,
    IndexReader,
    IndexWriter,
    ReloadPolicy,
    Searcher,
    TantivyDocument,
    TantivyError,
    Term,
    collector::{Count, TopDocs},
    doc,
    query::TermQuery,
    schema::*,
};

use crate::{
    analyzer::{self, ANALYZER_NAME, AnalyzerKind},
    config::DEFAULT_WRITER_MEMORY,
    document::{IndexedDocument, from_millis},
    error::{Error, Result},
};

/// Field names used in the schema.
pub mod fields {
    pub const PATH: &str = "path";
    pub const FILENAME: &str = "filename";
    pub const EXTENSION: &str = "extension";
    pub const MODIFIED: &str = "modified";
    pub const MODIFIED_MS: &str = "modified_ms";
    pub const CONTENT: &str = "content";
}

/// Resolved field handles for the schema.
#[derive(Debug, Clone, Copy)]
pub struct SchemaFields {
    pub path: Field,
    pub filename: Field,
    pub extension: Field,
    pub modified: Field,
    pub modified_ms: Field,
    pub content: Field,
}

#[derive(Debug, Clone, Copy)]
pub struct IndexOptions {
    pub analyzer: AnalyzerKind,
    /// Writer memory budget in bytes.
    pub writer_memory: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerKind::default(),
            writer_memory: DEFAULT_WRITER_MEMORY,
        }
    }
}

fn open_or_create(dir: &Path) -> Result<Index> {
    std::fs::create_dir_all(dir)?;

    let mmap_dir = tantivy::directory::MmapDirectory::open(dir)
        .map_err(|e| TantivyError::SystemError(e.to_string()))?;
    let index = if Index::exists(&mmap_dir)
        .map_err(|e| TantivyError::SystemError(e.to_string()))?
    {
        Index::open(mmap_dir)?
    } else {
        Index::create(
            mmap_dir,
            build_schema(),
            tantivy::IndexSettings::default(),
        )?
    };
    Ok(index)
}

fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    builder.add_text_field(fields::PATH, STRING | STORED);

    let analyzed = TextFieldIndexing::default()
        .set_tokenizer(ANALYZER_NAME)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let analyzed_stored = TextOptions::default()
        .set_indexing_options(analyzed)
        .set_stored();

    builder.add_text_field(fields::FILENAME, analyzed_stored.clone());
    builder.add_text_field(fields::EXTENSION, STRING | STORED);
    builder.add_text_field(fields::MODIFIED, STRING | STORED);
    builder.add_i64_field(fields::MODIFIED_MS, STORED | FAST);
    builder.add_text_field(fields::CONTENT, analyzed_stored);

    builder.build()
}

fn resolve_fields(schema: &Schema) -> Result<SchemaFields> {
    Ok(SchemaFields {
        path: schema.get_field(fields::PATH)?,
        filename: schema.get_field(fields::FILENAME)?,
        extension: schema.get_field(fields::EXTENSION)?,
        modified: schema.get_field(fields::MODIFIED)?,
        modified_ms: schema.get_field(fields::MODIFIED_MS)?,
        content: schema.get_field(fields::CONTENT)?,
    })
}

/// Owns the inverted index and its single writer.
///
/// All mutations go through the one writer held here, so concurrent
/// upserts for the same path are serialized. Mutations become visible
/// to readers only after [`commit`](Self::commit).
pub struct IndexService {
    index: Index,
    reader: IndexReader,
    writer: Mutex<Option<IndexWriter>>,
    fields: SchemaFields,
    location: Option<PathBuf>,
}

impl IndexService {
    /// Open or create the index at the given directory and take the
    /// writer lock.
    pub fn open(dir: &Path, options: &IndexOptions) -> Result<Self> {
        let index = open_or_create(dir)?;
        Self::from_index(index, options, Some(dir.to_path_buf()), true)
    }

    /// Open the index at the given directory for searching only.
    ///
    /// The writer lock is left alone, so this works while another
    /// process is watching the same data directory. Mutations fail with
    /// [`Error::IndexClosed`].
    pub fn open_read_only(dir: &Path, options: &IndexOptions) -> Result<Self> {
        let index = open_or_create(dir)?;
        Self::from_index(index, options, Some(dir.to_path_buf()), false)
    }

    /// Create an in-memory index (for testing).
    pub fn open_in_ram(options: &IndexOptions) -> Result<Self> {
        let index = Index::create_in_ram(build_schema());
        Self::from_index(index, options, None, true)
    }

    fn from_index(
        index: Index,
        options: &IndexOptions,
        location: Option<PathBuf>,
        writable: bool,
    ) -> Result<Self> {
        analyzer::register(&index, options.analyzer);
        let fields = resolve_fields(&index.schema())?;

        let writer = if writable {
            match index.writer(options.writer_memory) {
                Ok(writer) => Some(writer),
                Err(TantivyError::LockFailure(..)) => {
                    return Err(Error::IndexLocked(
                        location.unwrap_or_else(|| PathBuf::from("<memory>")),
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            None
        };
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            fields,
            location,
        })
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn fields(&self) -> SchemaFields {
        self.fields
    }

    fn lock_writer(&self) -> MutexGuard<'_, Option<IndexWriter>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_writer<T>(
        &self,
        f: impl FnOnce(&mut IndexWriter) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.lock_writer();
        let writer = guard.as_mut().ok_or(Error::IndexClosed)?;
        f(writer)
    }

    /// Replace whatever is indexed for `doc.path` with `doc`.
    ///
    /// The delete and the insert land in the same commit, so readers see
    /// either the old document or the new one, never both or neither.
    pub fn upsert(&self, doc: &IndexedDocument) -> Result<()> {
        let f = self.fields;
        self.with_writer(|writer| {
            writer.delete_term(Term::from_field_text(f.path, &doc.path));
            writer.add_document(doc!(
                f.path => doc.path.as_str(),
                f.filename => doc.filename.as_str(),
                f.extension => doc.extension.as_str(),
                f.modified => doc.modified_string(),
                f.modified_ms => doc.modified_ms(),
                f.content => doc.content.as_str(),
            ))?;
            Ok(())
        })
    }

    /// Remove every document indexed under `path`. No-op when absent.
    pub fn delete(&self, path: &str) -> Result<()> {
        let f = self.fields;
        self.with_writer(|writer| {
            writer.delete_term(Term::from_field_text(f.path, path));
            Ok(())
        })
    }

    /// Persist all pending mutations and make them visible to readers
    /// opened afterwards.
    ///
    /// On failure the pending operations stay queued and a later commit
    /// retries them.
    pub fn commit(&self) -> Result<()> {
        self.with_writer(|writer| {
            writer.commit()?;
            Ok(())
        })
    }

    /// A view of the last committed state.
    ///
    /// The snapshot is fixed at the time it is opened; open a new one to
    /// observe later commits.
    pub fn open_reader(&self) -> Result<Snapshot> {
        self.reader.reload()?;
        Ok(Snapshot {
            searcher: self.reader.searcher(),
            fields: self.fields,
        })
    }

    /// Commit outstanding changes and release the writer lock.
    ///
    /// Later mutations fail with [`Error::IndexClosed`]; readers keep
    /// working. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let Some(mut writer) = self.lock_writer().take() else {
            return Ok(());
        };
        writer.commit()?;
        writer.wait_merging_threads()?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.lock_writer().is_none()
    }
}

impl std::fmt::Debug for IndexService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexService")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// A point-in-time reader over the committed index.
#[derive(Clone)]
pub struct Snapshot {
    searcher: Searcher,
    fields: SchemaFields,
}

impl Snapshot {
    pub fn searcher(&self) -> &Searcher {
        &self.searcher
    }

    /// Number of live documents.
    pub fn doc_count(&self) -> u64 {
        self.searcher.num_docs()
    }

    /// Number of documents indexed under `path`.
    pub fn count_path(&self, path: &str) -> Result<usize> {
        let query = TermQuery::new(
            Term::from_field_text(self.fields.path, path),
            IndexRecordOption::Basic,
        );
        Ok(self.searcher.search(&query, &Count)?)
    }

    /// The stored document for `path`, if indexed.
    pub fn get(&self, path: &str) -> Result<Option<IndexedDocument>> {
        let query = TermQuery::new(
            Term::from_field_text(self.fields.path, path),
            IndexRecordOption::Basic,
        );
        let hits = self.searcher.search(&query, &TopDocs::with_limit(1))?;
        hits.first()
            .map(|&(_, address)| self.load(address))
            .transpose()
    }

    /// Load the stored fields of a hit.
    pub fn load(&self, address: DocAddress) -> Result<IndexedDocument> {
        let doc: TantivyDocument = self.searcher.doc(address)?;
        let f = self.fields;
        Ok(IndexedDocument {
            path: extract_text(&doc, f.path),
            filename: extract_text(&doc, f.filename),
            extension: extract_text(&doc, f.extension),
            modified_at: from_millis(extract_i64(&doc, f.modified_ms)),
            content: extract_text(&doc, f.content),
        })
    }
}

fn extract_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn extract_i64(doc: &TantivyDocument, field: Field) -> i64 {
    doc.get_first(field).and_then(|v| v.as_i64()).unwrap_or(0)
}
