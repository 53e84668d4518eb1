//! Lookup service over the current record snapshot.
//!
//! An exact match on the trimmed user ID returns its record. On a miss the
//! service suggests up to `similar_limit` other IDs that either contain the
//! query or share its first `prefix_len` characters, taken in snapshot order.
//! The scan is linear; there is no secondary index.

use serde::Serialize;

use crate::config::LookupConfig;
use crate::record::UserRecord;
use crate::store::{RecordStore, Snapshot, StoreStats};

/// Message attached to a miss in [`LookupResponse`].
pub const NOT_FOUND_MESSAGE: &str = "User ID not found in database";

/// Result of one lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// The query was empty after trimming; nothing was searched.
    EmptyQuery,
    /// Exact match.
    Found(UserRecord),
    /// No exact match, with suggestions in snapshot order.
    NotFound {
        /// Similar user IDs.
        similar: Vec<String>,
    },
}

impl LookupOutcome {
    /// Check whether the lookup hit.
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Serializable lookup result, one per query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupResponse {
    /// Whether an exact match was found.
    pub found: bool,
    /// The trimmed query.
    pub user_id: String,
    /// Email of the match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// IP of the match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Raw email field of the match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoded: Option<String>,
    /// Explanation on a miss.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Suggestions on a miss.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub similar: Vec<String>,
}

impl LookupResponse {
    /// Build a response for `query` from its outcome.
    #[must_use]
    pub fn new(query: &str, outcome: LookupOutcome) -> Self {
        let user_id = query.trim().to_string();
        match outcome {
            LookupOutcome::Found(record) => Self {
                found: true,
                user_id,
                email: Some(record.email),
                ip: Some(record.ip),
                encoded: Some(record.encoded),
                message: None,
                similar: Vec::new(),
            },
            LookupOutcome::NotFound { similar } => Self {
                found: false,
                user_id,
                email: None,
                ip: None,
                encoded: None,
                message: Some(NOT_FOUND_MESSAGE.to_string()),
                similar,
            },
            LookupOutcome::EmptyQuery => Self {
                found: false,
                user_id,
                email: None,
                ip: None,
                encoded: None,
                message: Some("empty user ID".to_string()),
                similar: Vec::new(),
            },
        }
    }
}

/// Lookup front end over a [`RecordStore`].
#[derive(Debug, Clone)]
pub struct LookupService {
    store: RecordStore,
    config: LookupConfig,
}

impl LookupService {
    /// Create a service reading from `store`.
    #[must_use]
    pub fn new(store: RecordStore, config: LookupConfig) -> Self {
        Self { store, config }
    }

    /// The store this service reads from.
    #[must_use]
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Look up a user ID, falling back to similar IDs on a miss.
    #[must_use]
    pub fn lookup(&self, query: &str) -> LookupOutcome {
        let query = query.trim();
        if query.is_empty() {
            return LookupOutcome::EmptyQuery;
        }

        let snapshot = self.store.load();
        match snapshot.get(query) {
            Some(record) => LookupOutcome::Found(record.clone()),
            None => LookupOutcome::NotFound {
                similar: find_similar(
                    &snapshot,
                    query,
                    self.config.similar_limit,
                    self.config.prefix_len,
                ),
            },
        }
    }

    /// Look up a user ID and shape the result for serialization.
    #[must_use]
    pub fn respond(&self, query: &str) -> LookupResponse {
        LookupResponse::new(query, self.lookup(query))
    }

    /// The first `n` user IDs in snapshot order.
    #[must_use]
    pub fn sample_ids(&self, n: usize) -> Vec<String> {
        self.store.load().ids().take(n).map(String::from).collect()
    }

    /// The first `sample_size` user IDs, as configured.
    #[must_use]
    pub fn default_sample(&self) -> Vec<String> {
        self.sample_ids(self.config.sample_size)
    }

    /// Statistics for the current snapshot.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }
}

/// Collect up to `limit` IDs that contain `query` or start with its first
/// `prefix_len` characters, in snapshot order.
#[must_use]
pub fn find_similar(
    snapshot: &Snapshot,
    query: &str,
    limit: usize,
    prefix_len: usize,
) -> Vec<String> {
    let prefix = char_prefix(query, prefix_len);
    snapshot
        .ids()
        .filter(|id| *id != query && (id.contains(query) || id.starts_with(prefix)))
        .take(limit)
        .map(String::from)
        .collect()
}

/// The first `n` characters of `s` (all of it when shorter).
fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}
