//! In-memory record store for idquery.
//!
//! An ingestion pass builds an immutable [`Snapshot`]. The [`RecordStore`]
//! handle publishes it with a single atomic pointer swap, so readers see
//! either the previous snapshot or the new one, never a partial mapping.
//!
//! Snapshot iteration order is the order in which each user ID was first
//! seen. A duplicate ID replaces the earlier record in place (last write
//! wins) without moving it.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::record::UserRecord;

/// Immutable mapping from user ID to record.
#[derive(Debug, Clone)]
pub struct Snapshot {
    records: Vec<UserRecord>,
    index: HashMap<String, usize>,
    records_parsed: usize,
    loaded_at: DateTime<Utc>,
}

impl Snapshot {
    /// Create an empty snapshot.
    #[must_use]
    pub fn empty() -> Self {
        SnapshotBuilder::new().build()
    }

    /// Start building a snapshot.
    #[must_use]
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::new()
    }

    /// Look up a record by exact user ID.
    #[must_use]
    pub fn get(&self, user_id: &str) -> Option<&UserRecord> {
        self.index.get(user_id).map(|&i| &self.records[i])
    }

    /// Check whether a user ID is present.
    #[must_use]
    pub fn contains(&self, user_id: &str) -> bool {
        self.index.contains_key(user_id)
    }

    /// Number of unique user IDs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check whether the snapshot holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records inserted while building, duplicates included.
    #[must_use]
    pub fn records_parsed(&self) -> usize {
        self.records_parsed
    }

    /// When this snapshot was built.
    #[must_use]
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Iterate over records in snapshot order.
    pub fn iter(&self) -> impl Iterator<Item = &UserRecord> {
        self.records.iter()
    }

    /// Iterate over user IDs in snapshot order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.user_id.as_str())
    }

    /// Statistics for this snapshot.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            unique_users: self.len(),
            records_parsed: self.records_parsed,
            with_email: self.records.iter().filter(|r| r.has_email()).count(),
            with_ip: self.records.iter().filter(|r| r.has_ip()).count(),
            loaded_at: self.loaded_at,
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl FromIterator<UserRecord> for Snapshot {
    fn from_iter<I: IntoIterator<Item = UserRecord>>(iter: I) -> Self {
        let mut builder = SnapshotBuilder::new();
        for record in iter {
            builder.insert(record);
        }
        builder.build()
    }
}

/// Accumulates records for a [`Snapshot`].
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    records: Vec<UserRecord>,
    index: HashMap<String, usize>,
    records_parsed: usize,
}

impl SnapshotBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any earlier record with the same ID.
    ///
    /// Returns `true` if an earlier record was replaced.
    pub fn insert(&mut self, record: UserRecord) -> bool {
        self.records_parsed += 1;
        if let Some(&i) = self.index.get(&record.user_id) {
            self.records[i] = record;
            true
        } else {
            self.index.insert(record.user_id.clone(), self.records.len());
            self.records.push(record);
            false
        }
    }

    /// Number of unique IDs so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check whether nothing has been inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Freeze the builder into a snapshot stamped with the current time.
    #[must_use]
    pub fn build(self) -> Snapshot {
        Snapshot {
            records: self.records,
            index: self.index,
            records_parsed: self.records_parsed,
            loaded_at: Utc::now(),
        }
    }
}

/// Statistics about the current snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Number of unique user IDs.
    pub unique_users: usize,
    /// Records parsed during the ingestion pass, duplicates included.
    pub records_parsed: usize,
    /// Unique users with an email on record.
    pub with_email: usize,
    /// Unique users with an IP on record.
    pub with_ip: usize,
    /// When the snapshot was built.
    pub loaded_at: DateTime<Utc>,
}

/// Shared, atomically swappable handle to the current snapshot.
///
/// Cloning the handle shares the underlying slot; a [`RecordStore::replace`]
/// through any clone is visible to all of them.
#[derive(Debug, Clone)]
pub struct RecordStore {
    inner: Arc<ArcSwap<Snapshot>>,
}

impl RecordStore {
    /// Create a store seeded with `snapshot`.
    #[must_use]
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(snapshot)),
        }
    }

    /// Create a store holding an empty snapshot.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Snapshot::empty())
    }

    /// Borrow the current snapshot. Lock-free.
    #[must_use]
    pub fn load(&self) -> Guard<Arc<Snapshot>> {
        self.inner.load()
    }

    /// Return a clone of the current `Arc<Snapshot>`.
    #[must_use]
    pub fn load_full(&self) -> Arc<Snapshot> {
        self.inner.load_full()
    }

    /// Publish a new snapshot, returning the one it replaced.
    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let users = snapshot.len();
        let previous = self.inner.swap(Arc::new(snapshot));
        debug!(
            previous_users = previous.len(),
            users, "record snapshot replaced"
        );
        previous
    }

    /// Statistics for the current snapshot.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.inner.load().stats()
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::empty()
    }
}
