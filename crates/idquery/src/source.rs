//! Record sources and data file discovery.
//!
//! A source is one unit of ingestion: it either yields its whole text or
//! fails on its own without affecting the others.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use crate::config::DataConfig;
use crate::error::{Error, Result};

/// Extension of numbered part files.
const PART_EXTENSION: &str = "txt";

/// A provider of record text.
#[async_trait]
pub trait RecordSource: Send + Sync + fmt::Debug {
    /// Display name used in logs and reports.
    fn name(&self) -> &str;

    /// Read the full text of the source.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read.
    async fn read_text(&self) -> Result<String>;
}

/// A local file source.
///
/// Invalid UTF-8 bytes are dropped rather than failing the whole file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    path: PathBuf,
    name: String,
}

impl FileSource {
    /// Create a source for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }

    /// Path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_text(&self) -> Result<String> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| Error::source_read(&self.name, e))?;
        debug!(source = %self.name, bytes = bytes.len(), "read source");
        Ok(utf8_ignoring_invalid(&bytes))
    }
}

/// An in-memory source, handy for piping text in and for tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSource {
    name: String,
    text: String,
}

impl TextSource {
    /// Create a named in-memory source.
    #[must_use]
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

#[async_trait]
impl RecordSource for TextSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_text(&self) -> Result<String> {
        Ok(self.text.clone())
    }
}

/// Decode UTF-8, skipping invalid byte sequences.
#[must_use]
pub fn utf8_ignoring_invalid(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match e.error_len() {
                    Some(len) => bytes = &rest[len..],
                    // Truncated sequence at the end of input.
                    None => return out,
                }
            }
        }
    }
}

/// Resolve the list of data files to ingest.
///
/// An explicit `files` list is returned as-is. Otherwise numbered part files
/// `<part_prefix>1.txt ..= <part_prefix><part_count>.txt` are looked up in
/// each search directory in order, first hit wins. When no part file exists
/// anywhere, every file in the search directories whose name matches
/// `fallback` is used instead, sorted by name within each directory.
///
/// # Errors
///
/// Returns [`Error::NoSources`] if nothing was found, or
/// [`Error::DirectoryRead`] if an existing search directory can't be listed.
pub fn discover(config: &DataConfig, fallback: &Regex) -> Result<Vec<PathBuf>> {
    if !config.files.is_empty() {
        return Ok(config.files.clone());
    }

    let mut found = Vec::new();
    for n in 1..=config.part_count {
        let file_name = format!("{}{n}.{PART_EXTENSION}", config.part_prefix);
        match config
            .search_dirs
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.is_file())
        {
            Some(path) => {
                info!(path = %path.display(), "found data file");
                found.push(path);
            }
            None => debug!(file = %file_name, "part file not found"),
        }
    }

    if found.is_empty() {
        debug!("no part files found, scanning for fallback data files");
        for dir in &config.search_dirs {
            for path in matching_files(dir, fallback)? {
                if !found.contains(&path) {
                    info!(path = %path.display(), "using fallback data file");
                    found.push(path);
                }
            }
        }
    }

    if found.is_empty() {
        return Err(Error::NoSources {
            searched: config.search_dirs.clone(),
        });
    }
    Ok(found)
}

/// Files directly inside `dir` whose name matches `pattern`, sorted.
/// A missing directory yields nothing.
fn matching_files(dir: &Path, pattern: &Regex) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(dir).map_err(|source| Error::DirectoryRead {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| pattern.is_match(name))
        })
        .collect();
    files.sort();
    Ok(files)
}
