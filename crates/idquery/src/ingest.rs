//! Batch ingestion of record sources into a snapshot.
//!
//! Sources are read and decoded concurrently, then merged in the order they
//! were given, so "last write wins" across sources is deterministic: a record
//! in a later source replaces one with the same ID from an earlier source.
//!
//! Each source succeeds or fails on its own. A failed read is logged and
//! reported; it never aborts the pass.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::decoder::{classify_line, LineOutcome};
use crate::error::Result;
use crate::record::UserRecord;
use crate::source::{discover, FileSource, RecordSource};
use crate::store::{RecordStore, Snapshot, SnapshotBuilder};

/// Number of records echoed at debug level after a pass.
const SAMPLE_LOG_COUNT: usize = 3;

/// Per-source ingestion counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    /// Source display name.
    pub name: String,
    /// Lines read, blank lines included.
    pub lines: usize,
    /// Lines that produced a record.
    pub loaded: usize,
    /// Non-blank lines that produced no record.
    pub rejected: usize,
    /// Decoded lines whose tuple ended inside a quoted field.
    pub unterminated_quotes: usize,
    /// Decoded lines whose brackets did not balance.
    pub unbalanced_brackets: usize,
    /// Decoded lines whose email field could not be decoded and was kept raw.
    pub raw_emails: usize,
    /// Why the source could not be read, if it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Check whether the source was read successfully.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of one ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Per-source counters, in source order.
    pub sources: Vec<SourceReport>,
    /// Records decoded across all sources, duplicates included.
    pub records_parsed: usize,
    /// Unique user IDs in the resulting snapshot.
    pub unique_users: usize,
    /// Wall time of the pass in milliseconds.
    pub elapsed_ms: u64,
}

impl IngestReport {
    /// Number of sources read successfully.
    #[must_use]
    pub fn sources_ok(&self) -> usize {
        self.sources.iter().filter(|s| s.is_ok()).count()
    }

    /// Number of sources that failed.
    #[must_use]
    pub fn sources_failed(&self) -> usize {
        self.sources.len() - self.sources_ok()
    }

    /// Lines rejected across all sources.
    #[must_use]
    pub fn lines_rejected(&self) -> usize {
        self.sources.iter().map(|s| s.rejected).sum()
    }
}

/// Decoded records of one source plus its counters.
#[derive(Debug)]
struct ParsedSource {
    records: Vec<UserRecord>,
    report: SourceReport,
}

/// Drives ingestion over a fixed list of sources.
#[derive(Debug, Clone)]
pub struct Ingestor {
    sources: Vec<Arc<dyn RecordSource>>,
}

impl Ingestor {
    /// Create an ingestor over `sources`, merged in the given order.
    #[must_use]
    pub fn new(sources: Vec<Arc<dyn RecordSource>>) -> Self {
        Self { sources }
    }

    /// Create an ingestor over local files.
    #[must_use]
    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self::new(
            paths
                .into_iter()
                .map(|p| Arc::new(FileSource::new(p)) as Arc<dyn RecordSource>)
                .collect(),
        )
    }

    /// Create an ingestor over the files configured or discovered by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the fallback pattern is invalid or no data file
    /// can be found.
    pub fn from_config(config: &Config) -> Result<Self> {
        let fallback = config.fallback_regex()?;
        let paths = discover(&config.data, &fallback)?;
        Ok(Self::from_paths(paths))
    }

    /// Names of the sources, in merge order.
    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.name())
    }

    /// Read and decode every source and build a fresh snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error only if a worker task panics; source read failures
    /// are recorded in the report instead.
    pub async fn run(&self) -> Result<(Snapshot, IngestReport)> {
        let started = Instant::now();

        let handles: Vec<_> = self
            .sources
            .iter()
            .map(|source| {
                let source = Arc::clone(source);
                tokio::spawn(async move { load_source(source.as_ref()).await })
            })
            .collect();

        let mut builder = Snapshot::builder();
        let mut report = IngestReport::default();
        for handle in handles {
            let parsed = handle.await??;
            for record in parsed.records {
                builder.insert(record);
            }
            report.records_parsed += parsed.report.loaded;
            report.sources.push(parsed.report);
        }

        let snapshot = builder.build();
        report.unique_users = snapshot.len();
        report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            users = report.unique_users,
            parsed = report.records_parsed,
            sources_ok = report.sources_ok(),
            sources_failed = report.sources_failed(),
            elapsed_ms = report.elapsed_ms,
            "ingestion complete"
        );
        for record in snapshot.iter().take(SAMPLE_LOG_COUNT) {
            debug!(user_id = %record.user_id, email = %record.email, ip = %record.ip, "sample record");
        }

        Ok((snapshot, report))
    }

    /// Run a pass and publish the result to `store`.
    ///
    /// If every source failed the current snapshot is kept, so a transient
    /// outage does not empty a populated store.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker task panics.
    pub async fn refresh(&self, store: &RecordStore) -> Result<IngestReport> {
        let (snapshot, report) = self.run().await?;
        if report.sources_ok() == 0 && !self.sources.is_empty() {
            warn!("all sources failed, keeping current snapshot");
        } else {
            store.replace(snapshot);
        }
        Ok(report)
    }
}

/// Read one source and decode it off the async workers.
async fn load_source(source: &dyn RecordSource) -> Result<ParsedSource> {
    let name = source.name().to_string();
    match source.read_text().await {
        Ok(text) => {
            let parsed = tokio::task::spawn_blocking(move || parse_text(&name, &text)).await?;
            info!(
                source = %parsed.report.name,
                lines = parsed.report.lines,
                loaded = parsed.report.loaded,
                rejected = parsed.report.rejected,
                "source loaded"
            );
            Ok(parsed)
        }
        Err(e) => {
            warn!(source = %name, error = %e, "skipping source");
            let mut report = SourceReport::new(&name);
            report.error = Some(e.to_string());
            Ok(ParsedSource {
                records: Vec::new(),
                report,
            })
        }
    }
}

/// Decode every line of `text`.
fn parse_text(name: &str, text: &str) -> ParsedSource {
    let mut report = SourceReport::new(name);
    let mut records = Vec::new();

    for (index, line) in text.lines().enumerate() {
        report.lines += 1;
        match classify_line(line) {
            LineOutcome::Blank => {}
            LineOutcome::Rejected(reason) => {
                report.rejected += 1;
                trace!(source = name, line = index + 1, %reason, "line rejected");
            }
            LineOutcome::Decoded {
                record,
                unterminated_quote,
                unbalanced_brackets,
            } => {
                if unterminated_quote {
                    report.unterminated_quotes += 1;
                    debug!(
                        source = name,
                        line = index + 1,
                        "tuple ends inside a quoted field; trailing fields were merged"
                    );
                }
                if unbalanced_brackets {
                    report.unbalanced_brackets += 1;
                    debug!(source = name, line = index + 1, "unbalanced brackets in tuple");
                }
                if record.email_is_raw() {
                    report.raw_emails += 1;
                    trace!(source = name, line = index + 1, "email kept undecoded");
                }
                report.loaded += 1;
                records.push(record);
            }
        }
    }

    ParsedSource { records, report }
}

/// Build a snapshot from lines directly, without sources or tasks.
pub fn snapshot_from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Snapshot {
    let mut builder = SnapshotBuilder::new();
    for record in lines.into_iter().filter_map(crate::decoder::decode_line) {
        builder.insert(record);
    }
    builder.build()
}
