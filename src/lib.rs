//! docwatch - keep a full-text index of document folders up to date.
//!
//! docwatch extracts plain text from Office files, PDFs, email messages
//! and text files, indexes it with
//! [Tantivy](https://github.com/quickwit-oss/tantivy) keyed by file path,
//! and re-indexes files as they change on disk.
//!
//! # Quick start
//!
//! ```no_run
//! use std::{path::PathBuf, sync::Arc};
//!
//! use docwatch::{DataDir, IndexService, Monitor};
//! use docwatch::monitor::MonitorOptions;
//! use docwatch::search::{self, DEFAULT_FIELDS};
//! use docwatch::tantivy_index::IndexOptions;
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let service = Arc::new(
//!     IndexService::open(&data_dir.index_dir().unwrap(), &IndexOptions::default())
//!         .unwrap(),
//! );
//!
//! let folders = vec![PathBuf::from("/home/me/Documents/Monitor")];
//! let mut monitor =
//!     Monitor::start(service.clone(), &folders, MonitorOptions::default()).unwrap();
//!
//! let results = search::search(&service, "invoice", DEFAULT_FIELDS, 20).unwrap();
//! print!("{}", search::format_results(&results));
//!
//! monitor.stop().unwrap();
//! service.close().unwrap();
//! ```

pub mod analyzer;
pub mod config;
pub mod console;
pub mod data_dir;
pub mod debounce;
pub mod document;
pub mod error;
pub mod extract;
pub mod html;
pub mod ingestion;
pub mod monitor;
pub mod search;
pub mod tantivy_index;
pub mod walker;

pub use config::Config;
pub use data_dir::DataDir;
pub use document::IndexedDocument;
pub use error::{Error, Result};
pub use monitor::Monitor;
pub use search::ScoredResult;
pub use tantivy_index::IndexService;
