//! Error types for idquery.
//!
//! Line-level decoding never fails; problems there degrade to "no record"
//! or a raw fallback. The errors here cover everything around the decoder:
//! reading sources, configuration, and I/O.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for idquery operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Source Errors ===
    /// A record source could not be read.
    #[error("failed to read source '{name}': {source}")]
    SourceRead {
        /// Display name of the source.
        name: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// No data sources were configured or discovered.
    #[error("no data sources found (searched: {})", format_paths(.searched))]
    NoSources {
        /// Directories that were searched.
        searched: Vec<PathBuf>,
    },

    /// A directory could not be listed during discovery.
    #[error("failed to read directory {path}: {source}")]
    DirectoryRead {
        /// Directory that couldn't be listed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system or terminal operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Runtime Errors ===
    /// A background ingestion task panicked or was cancelled.
    #[error("ingestion task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// A specialized Result type for idquery operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

fn format_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "nothing".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Create a new source read error.
    #[must_use]
    pub fn source_read(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::SourceRead {
            name: name.into(),
            source,
        }
    }

    /// Create a new configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Check if this error means there was nothing to ingest.
    #[must_use]
    pub fn is_no_sources(&self) -> bool {
        matches!(self, Self::NoSources { .. })
    }

    /// Check if this error came from reading a single source.
    #[must_use]
    pub fn is_source_error(&self) -> bool {
        matches!(self, Self::SourceRead { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_read_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::source_read("data_part1.txt", io_err);
        let msg = err.to_string();
        assert!(msg.contains("data_part1.txt"));
        assert!(msg.contains("file not found"));
        assert!(err.is_source_error());
    }

    #[test]
    fn test_no_sources_display() {
        let err = Error::NoSources {
            searched: vec![PathBuf::from("/data"), PathBuf::from(".")],
        };
        let msg = err.to_string();
        assert!(msg.contains("/data"));
        assert!(msg.contains(", ."));
        assert!(err.is_no_sources());
        assert!(!err.is_source_error());
    }

    #[test]
    fn test_no_sources_empty_search_list() {
        let err = Error::NoSources { searched: vec![] };
        assert!(err.to_string().contains("nothing"));
    }

    #[test]
    fn test_config_validation_display() {
        let err = Error::config_validation("part_count must be greater than 0");
        assert_eq!(
            err.to_string(),
            "invalid configuration: part_count must be greater than 0"
        );
    }

    #[test]
    fn test_directory_read_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryRead {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }
}
