//! `idquery` - In-memory user ID lookup over tuple-per-line record dumps
//!
//! This library decodes SQL-style tuple lines into user records, ingests
//! them from data files into an atomically swappable snapshot, and answers
//! lookups with similar-ID suggestions on a miss.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod decoder;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod lookup;
pub mod record;
pub mod source;
pub mod store;
pub mod terminal;

pub use config::Config;
pub use decoder::decode_line;
pub use error::{Error, Result};
pub use ingest::{IngestReport, Ingestor};
pub use logging::init_logging;
pub use lookup::{LookupOutcome, LookupResponse, LookupService};
pub use record::UserRecord;
pub use source::{FileSource, RecordSource};
pub use store::{RecordStore, Snapshot, StoreStats};
pub use terminal::Terminal;
