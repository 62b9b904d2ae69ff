//! Integration tests for Folio
//!
//! Complete workflows against a file-backed store: every scenario edits an
//! archive through the synchronizer, then reopens the store file and checks
//! that the reloaded archive matches memory.

use ::folio::media::{import_bundle, FileMetadata, TrackFile};
use ::folio::*;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::info;
use uuid::Uuid;

/// Test harness owning an archive directory, its store and worker
pub struct ArchiveHarness {
    pub dir: TempDir,
    pub config: ArchiveConfig,
    pub archive: Archive,
    pub sync: Synchronizer,
}

impl ArchiveHarness {
    /// Fresh archive in a temporary directory
    pub fn new(format: StoreFormat) -> Self {
        let dir = TempDir::new().unwrap();
        let config = ArchiveBuilder::new()
            .store_format(format)
            .auto_capture_description("autosave")
            .build(dir.path())
            .unwrap();
        let store = Arc::new(FileStore::open(config.store_file(dir.path()), format).unwrap());
        let archive = hydrate::open_archive(store.as_ref(), &config).unwrap();
        let sync = Synchronizer::spawn(store).with_auto_description(config.auto_capture_description.clone());
        Self {
            dir,
            config,
            archive,
            sync,
        }
    }

    /// Load the archive again from the store file
    pub fn reload(&self) -> Archive {
        let store = FileStore::open(
            self.config.store_file(self.dir.path()),
            self.config.store_format,
        )
        .unwrap();
        hydrate::open_archive(&store, &self.config).unwrap()
    }

    /// Create a page under the main directory
    pub async fn page(&mut self, name: &str) -> Uuid {
        let (id, _) = self
            .archive
            .create_page(self.config.system.main, name, false)
            .unwrap();
        self.sync.create_item(&self.archive, id).await.unwrap();
        id
    }

    /// Add a component to a page and persist it
    pub async fn add(&mut self, page: Uuid, component: Component) -> Uuid {
        let id = component.id;
        self.archive.page_mut(page).unwrap().add_component(component).unwrap();
        let component = self.archive.component_mut(page, id).unwrap();
        self.sync.add_component(page, component).await.unwrap();
        id
    }

    /// Mutable access to a component
    pub fn component(&mut self, page: Uuid, id: Uuid) -> &mut Component {
        self.archive.component_mut(page, id).unwrap()
    }
}

struct BundleLibrary;

impl AudioLibrary for BundleLibrary {
    fn extract_tracks(&self, bundle: &Path) -> Result<Vec<TrackFile>> {
        Ok(["delta.mp3", "alpha.mp3", "charlie.m4a"]
            .iter()
            .map(|name| TrackFile::new(bundle.join(name)))
            .collect())
    }

    fn read_metadata(&self, file: &TrackFile) -> Result<FileMetadata> {
        Ok(FileMetadata {
            title: None,
            artist: Some(format!("artist of {}", file.stem())),
            thumbnail: None,
        })
    }

    fn write_metadata(&self, _track: &Track) -> Result<()> {
        Ok(())
    }

    fn remove_file(&self, _track: &Track) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_table_workflow_survives_reload() {
    let mut h = ArchiveHarness::new(StoreFormat::Bincode);
    let page = h.page("Budget").await;
    let table = h
        .add(page, Component::new("Costs", TableContent::with_columns(["Item", "Qty", "Price"])))
        .await;

    let (rows, columns) = {
        let component = h.component(page, table);
        let columns = component.table().unwrap().content().columns().to_vec();
        let mut rows = Vec::new();
        for item in ["apples", "pears", "plums"] {
            let row = component.append_row().unwrap();
            component.edit_cell(row.id, columns[0].id, item).unwrap();
            component.edit_cell(row.id, columns[1].id, "3").unwrap();
            component.edit_cell(row.id, columns[2].id, "1.50").unwrap();
            rows.push(row.id);
        }
        component.remove_row(rows[1]).unwrap();

        // drop Qty, move Price first and rename it
        let mut price = columns[2].clone();
        price.title = "Cost".to_string();
        component.edit_columns(vec![price, columns[0].clone()]).unwrap();
        (rows, columns)
    };
    let sync = h.sync.clone();
    let written = sync
        .sync_content_change(h.component(page, table))
        .await
        .unwrap();
    info!("Wrote {} table edits", written);
    assert!(h.component(page, table).log().is_empty());

    let reloaded = h.reload();
    let loaded = reloaded.page(page).unwrap().component(table).unwrap();
    let content = loaded.table().unwrap().content();
    let titles: Vec<&str> = content.columns().iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, ["Cost", "Item"]);
    assert_eq!(content.rows().len(), 2);
    assert_eq!(content.cell(rows[0], columns[0].id), Some("apples"));
    assert_eq!(content.cell(rows[2], columns[2].id), Some("1.50"));
    assert_eq!(content.cell(rows[0], columns[1].id), None);
    assert_eq!(loaded.capture_state(), Some(CaptureState::NeedsCapture));
}

#[tokio::test]
async fn test_audio_import_survives_reload() {
    let mut h = ArchiveHarness::new(StoreFormat::Json);
    let page = h.page("Mixtape").await;
    let mut playlist = Component::new("Side A", AudioContent::new(TrackSort::Name));
    playlist.log_mut().clear();
    let audio = h.add(page, playlist).await;

    let sync = h.sync.clone();
    let component = h.component(page, audio);
    let indices = import_bundle(&BundleLibrary, component, Path::new("/bundles/a")).unwrap();
    assert_eq!(indices, vec![0, 1, 2]);
    sync.sync_audio_change(component).await.unwrap();

    component.move_track(2, 0).unwrap();
    sync.sync_audio_change(component).await.unwrap();
    let memory: Vec<String> = component
        .audio()
        .unwrap()
        .tracks()
        .iter()
        .map(|t| t.title.clone())
        .collect();
    assert_eq!(memory, ["delta", "alpha", "charlie"]);

    let reloaded = h.reload();
    let loaded = reloaded.page(page).unwrap().component(audio).unwrap();
    let stored = loaded.audio().unwrap();
    let titles: Vec<&str> = stored.tracks().iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, ["delta", "alpha", "charlie"]);
    assert_eq!(stored.sort_by(), TrackSort::Manual);
    assert_eq!(stored.tracks()[1].artist, "artist of alpha");
    assert_eq!(loaded.capture_state(), None);
}

#[tokio::test]
async fn test_snapshot_removal_retargets_viewer() {
    let mut h = ArchiveHarness::new(StoreFormat::Json);
    let page = h.page("Journal").await;
    let note = h.add(page, Component::empty("Entry", ComponentKind::Text)).await;

    let sync = h.sync.clone();
    let component = h.component(page, note);
    let mut ids = Vec::new();
    for i in 0..5 {
        component.set_text(format!("v{}", i)).unwrap();
        ids.push(
            sync.capture_snapshot(component, &format!("s{}", i), SaveMode::Manual)
                .await
                .unwrap(),
        );
    }
    // newest first: ids[4] sits at index 0
    let newest = component.snapshot_infos()[0].id;
    assert_eq!(newest, ids[4]);

    let removal = sync.remove_snapshot(component, ids[4]).await.unwrap();
    assert_eq!(removal.removed_index, 0);
    assert_eq!(removal.next_viewed_index, Some(0));

    let removal = sync.remove_snapshot(component, ids[0]).await.unwrap();
    assert_eq!(removal.removed_index, 3);
    assert_eq!(removal.next_viewed_index, Some(2));

    let stale = component.ensure_viewed(0, ids[4]);
    assert!(matches!(stale, Err(ArchiveError::SnapshotIdentityMismatch { .. })));

    let reloaded = h.reload();
    let history: Vec<Uuid> = reloaded
        .page(page)
        .unwrap()
        .component(note)
        .unwrap()
        .snapshot_infos()
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(history, vec![ids[3], ids[2], ids[1]]);
}

#[tokio::test]
async fn test_capture_all_pending_on_exit() {
    let mut h = ArchiveHarness::new(StoreFormat::Bincode);
    let page = h.page("Notes").await;
    let a = h.add(page, Component::empty("a", ComponentKind::Text)).await;
    let b = h.add(page, Component::empty("b", ComponentKind::Table)).await;
    h.add(page, Component::empty("c", ComponentKind::Audio)).await;

    let sync = h.sync.clone();
    h.component(page, a).set_text("draft").unwrap();
    sync.sync_content_change(h.component(page, a)).await.unwrap();
    h.component(page, b).append_column("x").unwrap();
    sync.sync_content_change(h.component(page, b)).await.unwrap();

    let report = sync.capture_all_pending(h.archive.components_mut()).await.unwrap();
    assert_eq!(report.captured, 2);
    let report = sync.capture_all_pending(h.archive.components_mut()).await.unwrap();
    assert_eq!(report.captured, 0);

    let reloaded = h.reload();
    let loaded = reloaded.page(page).unwrap().component(a).unwrap();
    assert_eq!(loaded.capture_state(), Some(CaptureState::Captured));
    assert!(loaded.is_in_sync());
    let history = loaded.snapshot_infos();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].description, "autosave");
    assert_eq!(history[0].save_mode, SaveMode::Automatic);
}

#[tokio::test]
async fn test_sort_order_survives_reload() {
    let mut h = ArchiveHarness::new(StoreFormat::Json);
    let main = h.config.system.main;
    for name in ["b", "c", "a"] {
        h.page(name).await;
    }
    let moves = h.archive.toggle_ascending(main).unwrap();
    assert_eq!(moves.len(), 3);
    h.sync.save_sort_order(&h.archive, main).await.unwrap();

    let reloaded = h.reload();
    let dir = reloaded.directory(main).unwrap();
    assert!(!dir.sort_order().ascending);
    let names: Vec<&str> = dir.children().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["c", "b", "a"]);
}
