//! Staged writes shared by the concrete stores
//!
//! A [`StagedTransaction`] reads through to the committed table and buffers
//! every write. Nothing reaches the committed table until the store applies
//! [`StagedTransaction::into_changes`]; dropping the transaction is a
//! rollback. Writes that end up identical to the committed record are
//! discarded, so a body that only looked (or wrote back the same value)
//! commits nothing.

use super::records::{Entity, Query, RecordKey};
use super::Transaction;
use crate::collections::{HashMap, HashMapExt};
use crate::error::Result;
use tracing::trace;

/// Committed records keyed by kind and id
pub type RecordTable = HashMap<RecordKey, Entity>;

/// One staged change: `Some` writes the record, `None` deletes it
pub type Change = (RecordKey, Option<Entity>);

/// Write buffer over a committed table
pub struct StagedTransaction<'a> {
    base: &'a RecordTable,
    writes: HashMap<RecordKey, Option<Entity>>,
}

impl<'a> StagedTransaction<'a> {
    /// Start staging against `base`
    pub fn new(base: &'a RecordTable) -> Self {
        Self {
            base,
            writes: HashMap::new(),
        }
    }

    /// Staged changes that actually differ from the committed table
    pub fn into_changes(self) -> Vec<Change> {
        let base = self.base;
        let mut changes: Vec<Change> = self
            .writes
            .into_iter()
            .filter(|(key, staged)| base.get(key) != staged.as_ref())
            .collect();
        changes.sort_by_key(|(key, _)| *key);
        trace!("Transaction staged {} effective changes", changes.len());
        changes
    }
}

impl Transaction for StagedTransaction<'_> {
    fn get(&self, key: RecordKey) -> Option<&Entity> {
        match self.writes.get(&key) {
            Some(staged) => staged.as_ref(),
            None => self.base.get(&key),
        }
    }

    fn get_mut(&mut self, key: RecordKey) -> Option<&mut Entity> {
        if !self.writes.contains_key(&key) {
            let current = self.base.get(&key)?.clone();
            self.writes.insert(key, Some(current));
        }
        self.writes.get_mut(&key).and_then(Option::as_mut)
    }

    fn put(&mut self, entity: Entity) {
        self.writes.insert(entity.key(), Some(entity));
    }

    fn delete(&mut self, key: RecordKey) -> bool {
        let existed = self.get(key).is_some();
        if existed {
            self.writes.insert(key, None);
        }
        existed
    }

    fn children(&self, query: &Query) -> Vec<Entity> {
        let mut found: Vec<Entity> = self
            .base
            .iter()
            .filter(|(key, _)| !self.writes.contains_key(key))
            .map(|(_, entity)| entity)
            .chain(self.writes.values().flatten())
            .filter(|entity| query.matches(entity))
            .cloned()
            .collect();
        found.sort_by_key(Entity::key);
        found
    }
}

/// Apply committed changes to a table
pub fn apply_changes(table: &mut RecordTable, changes: Vec<Change>) {
    for (key, staged) in changes {
        match staged {
            Some(entity) => {
                table.insert(key, entity);
            }
            None => {
                table.remove(&key);
            }
        }
    }
}

/// Records matching a query from a committed table, in key order
pub fn select(table: &RecordTable, query: &Query) -> Vec<Entity> {
    let mut found: Vec<Entity> = table.values().filter(|e| query.matches(e)).cloned().collect();
    found.sort_by_key(Entity::key);
    found
}

/// Run a body against a fresh staging buffer and collect its changes
///
/// An error from the body discards everything it staged.
pub fn stage(
    base: &RecordTable,
    body: &mut dyn FnMut(&mut dyn Transaction) -> Result<()>,
) -> Result<Vec<Change>> {
    let mut tx = StagedTransaction::new(base);
    body(&mut tx)?;
    Ok(tx.into_changes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::Page;
    use crate::store::records::{EntityKind, PageRecord};
    use uuid::Uuid;

    fn page_entity(name: &str) -> Entity {
        Entity::Page(PageRecord::from(&Page::new(name, Uuid::new_v4(), false)))
    }

    #[test]
    fn test_reads_see_staged_writes() {
        let existing = page_entity("old");
        let key = existing.key();
        let mut base = RecordTable::new();
        base.insert(key, existing);

        let mut tx = StagedTransaction::new(&base);
        if let Some(Entity::Page(p)) = tx.get_mut(key) {
            p.name = "new".to_string();
        }
        assert!(matches!(tx.get(key), Some(Entity::Page(p)) if p.name == "new"));
        assert!(matches!(base.get(&key), Some(Entity::Page(p)) if p.name == "old"));

        assert!(tx.delete(key));
        assert!(tx.get(key).is_none());
        assert!(tx.children(&Query::all(EntityKind::Page)).is_empty());
    }

    #[test]
    fn test_no_op_writes_are_dropped() {
        let existing = page_entity("same");
        let key = existing.key();
        let mut base = RecordTable::new();
        base.insert(key, existing.clone());

        let mut tx = StagedTransaction::new(&base);
        tx.get_mut(key);
        tx.put(existing);
        assert!(tx.into_changes().is_empty());
    }

    #[test]
    fn test_failed_body_stages_nothing() {
        let base = RecordTable::new();
        let result = stage(&base, &mut |tx| {
            tx.put(page_entity("p"));
            Err(crate::error::ArchiveError::store("boom"))
        });
        assert!(result.is_err());
    }
}
