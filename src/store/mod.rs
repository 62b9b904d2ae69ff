//! Persistence services
//!
//! The archive talks to durable storage only through [`PersistenceService`]:
//! keyed fetches and an all-or-nothing [`transactional_update`]. The body of a
//! transaction gets exclusive write access through a [`Transaction`] handle;
//! if it returns an error nothing is written, and if it changed nothing the
//! service reports [`TxOutcome::Unchanged`] without committing.
//!
//! Two services ship with the crate:
//!
//! - [`MemoryStore`]: in-process, with commit counting and failure injection
//! - [`FileStore`]: the whole record set in one file, replaced atomically on
//!   every commit
//!
//! [`transactional_update`]: PersistenceService::transactional_update

pub mod file;
pub mod memory;
pub mod records;
pub mod staging;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use records::{
    AudioRecord, ComponentData, ComponentRecord, DirectoryRecord, Entity, EntityKind, PageRecord,
    Query, RecordKey, RowRecord, SnapshotRecord, TableRecord,
};

use crate::error::{ArchiveError, Result};
use uuid::Uuid;

/// What a transaction did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// Changes were committed
    Committed,
    /// The body changed nothing; no commit happened
    Unchanged,
}

/// Exclusive write handle passed to a transaction body
///
/// Reads observe the body's own earlier writes.
pub trait Transaction {
    /// Record by key
    fn get(&self, key: RecordKey) -> Option<&Entity>;
    /// Record by key, for in-place edits
    fn get_mut(&mut self, key: RecordKey) -> Option<&mut Entity>;
    /// Insert or overwrite a record
    fn put(&mut self, entity: Entity);
    /// Delete a record; `false` if it did not exist
    fn delete(&mut self, key: RecordKey) -> bool;
    /// Records matching a query
    fn children(&self, query: &Query) -> Vec<Entity>;
}

impl dyn Transaction + '_ {
    /// Component record, mutable
    pub fn component_mut(&mut self, id: Uuid) -> Result<&mut ComponentRecord> {
        match self.get_mut(RecordKey::new(EntityKind::Component, id)) {
            Some(Entity::Component(record)) => Ok(record),
            _ => Err(ArchiveError::RecordNotFound {
                kind: EntityKind::Component,
                id,
            }),
        }
    }

    /// Directory record, mutable
    pub fn directory_mut(&mut self, id: Uuid) -> Result<&mut DirectoryRecord> {
        match self.get_mut(RecordKey::new(EntityKind::Directory, id)) {
            Some(Entity::Directory(record)) => Ok(record),
            _ => Err(ArchiveError::RecordNotFound {
                kind: EntityKind::Directory,
                id,
            }),
        }
    }

    /// Whether a record exists
    pub fn contains(&self, kind: EntityKind, id: Uuid) -> bool {
        self.get(RecordKey::new(kind, id)).is_some()
    }

    /// Delete a component record together with its snapshots
    pub fn delete_component(&mut self, id: Uuid) {
        for snapshot in self.children(&Query::owned_by(EntityKind::Snapshot, id)) {
            self.delete(snapshot.key());
        }
        self.delete(RecordKey::new(EntityKind::Component, id));
    }
}

/// Durable store contract
pub trait PersistenceService: Send + Sync {
    /// One record by kind and id
    fn fetch_one(&self, kind: EntityKind, id: Uuid) -> Result<Option<Entity>>;

    /// Every committed record matching a query
    fn fetch_many(&self, query: &Query) -> Result<Vec<Entity>>;

    /// Run `body` with exclusive write access
    ///
    /// Commits if the body changed anything; rolls back and returns the error
    /// if the body fails.
    fn transactional_update(
        &self,
        body: &mut dyn FnMut(&mut dyn Transaction) -> Result<()>,
    ) -> Result<TxOutcome>;
}
