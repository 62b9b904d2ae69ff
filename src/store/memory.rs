//! In-process persistence service
//!
//! Committed records sit behind an `RwLock`, so fetches run concurrently with
//! a writer that is still staging and only ever see committed state. Writers
//! are serialized by a separate `Mutex`. For tests the store counts commits
//! and can be told to fail.

use super::records::{Entity, EntityKind, Query, RecordKey};
use super::staging::{apply_changes, select, stage, RecordTable};
use super::{PersistenceService, Transaction, TxOutcome};
use crate::collections::HashMapExt;
use crate::error::{ArchiveError, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, warn};
use uuid::Uuid;

/// Store that keeps everything in memory
pub struct MemoryStore {
    records: RwLock<RecordTable>,
    writer: Mutex<()>,
    commits: AtomicUsize,
    unavailable: AtomicBool,
    failing_commits: AtomicUsize,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("records", &self.records.read().len())
            .field("commits", &self.commit_count())
            .field("unavailable", &self.unavailable.load(Ordering::SeqCst))
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self {
            records: RwLock::new(RecordTable::new()),
            writer: Mutex::new(()),
            commits: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
            failing_commits: AtomicUsize::new(0),
        }
    }

    /// Number of committed transactions so far
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of committed records
    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    /// Make every call fail with `StoreUnavailable` until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail the next `n` commits after their body has run
    pub fn fail_next_commits(&self, n: usize) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ArchiveError::store("memory store is offline"));
        }
        Ok(())
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl PersistenceService for MemoryStore {
    fn fetch_one(&self, kind: EntityKind, id: Uuid) -> Result<Option<Entity>> {
        self.check_available()?;
        Ok(self.records.read().get(&RecordKey::new(kind, id)).cloned())
    }

    fn fetch_many(&self, query: &Query) -> Result<Vec<Entity>> {
        self.check_available()?;
        Ok(select(&self.records.read(), query))
    }

    fn transactional_update(
        &self,
        body: &mut dyn FnMut(&mut dyn Transaction) -> Result<()>,
    ) -> Result<TxOutcome> {
        let _writer = self.writer.lock();
        self.check_available()?;

        let changes = stage(&self.records.read(), body)?;
        if changes.is_empty() {
            return Ok(TxOutcome::Unchanged);
        }
        if self.take_injected_failure() {
            warn!("Injected commit failure, dropping {} changes", changes.len());
            return Err(ArchiveError::store("injected commit failure"));
        }

        let count = changes.len();
        apply_changes(&mut self.records.write(), changes);
        self.commits.fetch_add(1, Ordering::SeqCst);
        debug!("Committed {} changes", count);
        Ok(TxOutcome::Committed)
    }
}
