//! Chaos testing for Folio
//!
//! Drives random edit sequences against a store that fails at random and
//! checks that retrying always converges: once every write eventually
//! commits, the store holds exactly what memory holds.

use ::folio::store::{ComponentData, EntityKind, Query};
use ::folio::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_test::traced_test;
use uuid::Uuid;

/// Random edit source for one table component
pub struct ChaosEngine {
    rng: StdRng,
}

impl ChaosEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Apply one random edit to a table component
    pub fn edit_table(&mut self, table: &mut Component) {
        let content = table.table().unwrap().content().clone();
        let columns = content.columns().to_vec();
        let rows = content.rows().to_vec();
        match self.rng.random_range(0..6) {
            0 => {
                table.append_row().unwrap();
            }
            1 => {
                let title = format!("col{}", self.rng.random_range(0..100));
                table.append_column(title).unwrap();
            }
            2 if !rows.is_empty() => {
                let row = &rows[self.rng.random_range(0..rows.len())];
                table.remove_row(row.id).unwrap();
            }
            3 if columns.len() > 1 => {
                // drop one column and rotate the rest
                let mut kept = columns.clone();
                kept.remove(self.rng.random_range(0..kept.len()));
                kept.rotate_left(1);
                table.edit_columns(kept).unwrap();
            }
            _ if !rows.is_empty() && !columns.is_empty() => {
                let row = &rows[self.rng.random_range(0..rows.len())];
                let column = &columns[self.rng.random_range(0..columns.len())];
                let value = format!("v{}", self.rng.random_range(0..1000));
                table.edit_cell(row.id, column.id, value).unwrap();
            }
            _ => {
                table.append_row().unwrap();
            }
        }
    }

    /// Whether the next commit should fail
    pub fn should_fail(&mut self) -> bool {
        self.rng.random_bool(0.3)
    }
}

async fn setup() -> (Arc<MemoryStore>, Synchronizer) {
    let store = Arc::new(MemoryStore::new());
    let sync = Synchronizer::spawn(store.clone());
    (store, sync)
}

/// Sync until the log drains, counting failed attempts
async fn sync_with_retries(sync: &Synchronizer, component: &mut Component) -> usize {
    let mut failures = 0;
    loop {
        match sync.sync_component(component).await {
            Ok(_) if component.log().is_empty() => return failures,
            Ok(_) => {}
            Err(e) => {
                assert!(e.is_recoverable(), "unexpected error: {}", e);
                failures += 1;
            }
        }
    }
}

#[tokio::test]
#[traced_test]
async fn test_random_failures_converge() {
    let (store, sync) = setup().await;
    let mut engine = ChaosEngine::new(42);
    let mut table = Component::new("chaos", TableContent::with_columns(["a", "b", "c"]));
    sync.add_component(Uuid::new_v4(), &mut table).await.unwrap();

    let mut failures = 0;
    for round in 0..40 {
        for _ in 0..engine.rng.random_range(1..4) {
            engine.edit_table(&mut table);
        }
        if engine.should_fail() {
            store.fail_next_commits(1);
        }
        failures += sync_with_retries(&sync, &mut table).await;
        if round % 10 == 0 {
            info!("Round {}: {} failures so far", round, failures);
        }
    }
    info!("Converged after {} injected failures", failures);

    let record = sync.fetch_component(table.id).unwrap().unwrap();
    let expected = ComponentData::from(&table.content());
    assert_eq!(record.data, expected);
    assert_eq!(record.capture_state, CaptureState::NeedsCapture);
    assert!(logs_contain("Converged after"));
}

#[tokio::test]
#[traced_test]
async fn test_offline_store_keeps_everything_pending() {
    let (store, sync) = setup().await;
    let mut notes: Vec<Component> = (0..3)
        .map(|i| Component::empty(format!("n{}", i), ComponentKind::Text))
        .collect();
    for note in notes.iter_mut() {
        sync.add_component(Uuid::new_v4(), note).await.unwrap();
        note.set_text("offline edit").unwrap();
    }

    store.set_unavailable(true);
    for note in notes.iter_mut() {
        let err = sync.sync_content_change(note).await.unwrap_err();
        assert!(matches!(err, ArchiveError::StoreUnavailable(_)));
        assert_eq!(note.log().len(), 1);
    }
    assert!(sync.capture_all_pending(notes.iter_mut()).await.is_err());
    assert!(notes.iter().all(|n| n.snapshot_infos().is_empty() && n.needs_capture()));

    store.set_unavailable(false);
    warn!("Store back online");
    let report = sync.capture_all_pending(notes.iter_mut()).await.unwrap();
    assert_eq!(report.captured, 3);
    assert!(notes.iter().all(|n| n.log().is_empty() && !n.needs_capture()));
    assert_eq!(store.fetch_many(&Query::all(EntityKind::Snapshot)).unwrap().len(), 3);
}

#[tokio::test]
#[traced_test]
async fn test_concurrent_callers_are_serialized() {
    let (store, sync) = setup().await;
    let mut handles = Vec::new();
    for worker in 0..8 {
        let sync = sync.clone();
        handles.push(tokio::spawn(async move {
            let mut note = Component::empty(format!("w{}", worker), ComponentKind::Text);
            sync.add_component(Uuid::new_v4(), &mut note).await?;
            for i in 0..10 {
                note.set_text(format!("{}-{}", worker, i))?;
                sync.sync_content_change(&mut note).await?;
            }
            sync.capture_snapshot(&mut note, "final", SaveMode::Manual).await?;
            Ok::<Component, ArchiveError>(note)
        }));
    }

    for handle in handles {
        let note = handle.await.unwrap().unwrap();
        let record = sync.fetch_component(note.id).unwrap().unwrap();
        assert_eq!(record.data, ComponentData::from(&note.content()));
        assert_eq!(record.capture_state, CaptureState::Captured);
    }
    assert_eq!(store.fetch_many(&Query::all(EntityKind::Component)).unwrap().len(), 8);
}

#[tokio::test]
#[traced_test]
async fn test_file_store_failure_is_recoverable() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("archive.json");
    let store = Arc::new(FileStore::open(path.clone(), StoreFormat::Json).unwrap());
    let sync = Synchronizer::spawn(store.clone());
    let mut note = Component::empty("n", ComponentKind::Text);
    sync.add_component(Uuid::new_v4(), &mut note).await.unwrap();

    // a directory in place of the store file makes the atomic rename fail
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir(&path).unwrap();
    note.set_text("blocked").unwrap();
    assert!(sync.sync_content_change(&mut note).await.is_err());
    assert_eq!(note.log().len(), 1);
    warn!("Unblocking store file");

    std::fs::remove_dir(&path).unwrap();
    assert!(logs_contain("Unblocking"));
    sync.sync_content_change(&mut note).await.unwrap();
    let reopened = FileStore::open(path, StoreFormat::Json).unwrap();
    match reopened.fetch_one(EntityKind::Component, note.id).unwrap() {
        Some(store::Entity::Component(record)) => {
            assert_eq!(record.data, ComponentData::Text("blocked".to_string()));
        }
        other => panic!("expected component record, got {:?}", other),
    }
}
