//! Single-file persistence service
//!
//! The whole record set is kept in memory and written to one file on every
//! commit. The new file is written next to the old one and renamed over it,
//! so a crash leaves either the previous or the new state on disk. If the
//! write fails the commit is abandoned and the in-memory table keeps its
//! previous contents.

use super::records::{Entity, EntityKind, Query, RecordKey};
use super::staging::{apply_changes, select, stage, RecordTable};
use super::{PersistenceService, Transaction, TxOutcome};
use crate::collections::HashMapExt;
use crate::config::StoreFormat;
use crate::error::{ArchiveError, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const FILE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    records: Vec<Entity>,
}

/// Store backed by one file
pub struct FileStore {
    path: PathBuf,
    format: StoreFormat,
    records: RwLock<RecordTable>,
    writer: Mutex<()>,
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("records", &self.records.read().len())
            .finish()
    }
}

impl FileStore {
    /// Open the store file, starting empty if it does not exist yet
    #[instrument]
    pub fn open(path: PathBuf, format: StoreFormat) -> Result<Self> {
        let records = if path.exists() {
            let bytes = fs::read(&path)?;
            let file = decode(&bytes, format)?;
            if file.version != FILE_VERSION {
                return Err(ArchiveError::store(format!(
                    "unsupported store file version {}",
                    file.version
                )));
            }
            let mut table = RecordTable::with_capacity(file.records.len());
            for entity in file.records {
                table.insert(entity.key(), entity);
            }
            table
        } else {
            RecordTable::new()
        };
        info!("Opened store {:?} with {} records", path, records.len());
        Ok(Self {
            path,
            format,
            records: RwLock::new(records),
            writer: Mutex::new(()),
        })
    }

    /// Store file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encoding in use
    pub fn format(&self) -> StoreFormat {
        self.format
    }

    /// Number of committed records
    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    fn flush(&self, table: &RecordTable) -> Result<()> {
        let mut records: Vec<Entity> = table.values().cloned().collect();
        records.sort_by_key(Entity::key);
        let bytes = encode(
            &StoreFile {
                version: FILE_VERSION,
                records,
            },
            self.format,
        )?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        debug!("Wrote {} bytes to {:?}", bytes.len(), self.path);
        Ok(())
    }
}

fn encode(file: &StoreFile, format: StoreFormat) -> Result<Vec<u8>> {
    match format {
        StoreFormat::Json => Ok(serde_json::to_vec_pretty(file)?),
        StoreFormat::Bincode => Ok(bincode::serde::encode_to_vec(
            file,
            bincode::config::standard(),
        )?),
    }
}

fn decode(bytes: &[u8], format: StoreFormat) -> Result<StoreFile> {
    match format {
        StoreFormat::Json => Ok(serde_json::from_slice(bytes)?),
        StoreFormat::Bincode => {
            let (file, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
            Ok(file)
        }
    }
}

impl PersistenceService for FileStore {
    fn fetch_one(&self, kind: EntityKind, id: Uuid) -> Result<Option<Entity>> {
        Ok(self.records.read().get(&RecordKey::new(kind, id)).cloned())
    }

    fn fetch_many(&self, query: &Query) -> Result<Vec<Entity>> {
        Ok(select(&self.records.read(), query))
    }

    fn transactional_update(
        &self,
        body: &mut dyn FnMut(&mut dyn Transaction) -> Result<()>,
    ) -> Result<TxOutcome> {
        let _writer = self.writer.lock();

        let changes = stage(&self.records.read(), body)?;
        if changes.is_empty() {
            return Ok(TxOutcome::Unchanged);
        }

        let mut next = self.records.read().clone();
        apply_changes(&mut next, changes);
        if let Err(e) = self.flush(&next) {
            warn!("Commit to {:?} failed: {}", self.path, e);
            return Err(ArchiveError::store(format!(
                "could not write {}: {}",
                self.path.display(),
                e
            )));
        }
        *self.records.write() = next;
        Ok(TxOutcome::Committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::Page;
    use crate::store::records::PageRecord;
    use tempfile::TempDir;

    fn page(name: &str) -> Entity {
        Entity::Page(PageRecord::from(&Page::new(name, Uuid::new_v4(), false)))
    }

    fn reopen_round_trip(format: StoreFormat) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(format.default_file_name());
        let entity = page("persisted");
        let id = entity.id();

        {
            let store = FileStore::open(path.clone(), format).unwrap();
            store
                .transactional_update(&mut |tx| {
                    tx.put(entity.clone());
                    Ok(())
                })
                .unwrap();
        }

        let store = FileStore::open(path, format).unwrap();
        assert_eq!(store.fetch_one(EntityKind::Page, id).unwrap(), Some(entity));
    }

    #[test]
    fn test_reopen_json() {
        reopen_round_trip(StoreFormat::Json);
    }

    #[test]
    fn test_reopen_bincode() {
        reopen_round_trip(StoreFormat::Bincode);
    }

    #[test]
    fn test_failed_flush_keeps_previous_state() {
        let dir = TempDir::new().unwrap();
        // a directory where the file should be makes the final rename fail
        let path = dir.path().join("blocked");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"x").unwrap();

        let store = FileStore {
            path: path.clone(),
            format: StoreFormat::Json,
            records: RwLock::new(RecordTable::new()),
            writer: Mutex::new(()),
        };
        let result = store.transactional_update(&mut |tx| {
            tx.put(page("lost"));
            Ok(())
        });
        assert!(matches!(result, Err(ArchiveError::StoreUnavailable(_))));
        assert_eq!(store.record_count(), 0);
    }
}
