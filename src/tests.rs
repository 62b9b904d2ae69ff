//! Integration tests for Folio
//!
//! End-to-end scenarios that drive the hierarchy, components and the
//! synchronizer together and check what a fresh load from the store sees.

#[cfg(test)]
mod integration_tests {
    use crate::store::{ComponentData, EntityKind, Query};
    use crate::*;
    use std::sync::Arc;
    use tempfile::TempDir;
    use uuid::Uuid;

    async fn add_text(
        archive: &mut Archive,
        sync: &Synchronizer,
        page: Uuid,
        title: &str,
    ) -> Uuid {
        let component = Component::empty(title, ComponentKind::Text);
        let id = component.id;
        archive.page_mut(page).unwrap().add_component(component).unwrap();
        sync.add_component(page, archive.component_mut(page, id).unwrap())
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_basic_workflow() {
        let dir = TempDir::new().unwrap();
        let config = ArchiveBuilder::new().build(dir.path()).unwrap();
        let store = Arc::new(FileStore::open(config.store_file(dir.path()), config.store_format).unwrap());
        let mut archive = hydrate::open_archive(store.as_ref(), &config).unwrap();
        let sync = Synchronizer::spawn(store.clone());

        // Directory with a page holding one note
        let (projects, _) = archive.create_directory(config.system.main, "Projects").unwrap();
        sync.create_item(&archive, projects).await.unwrap();
        let (page, _) = archive.create_page(projects, "Plan", false).unwrap();
        sync.create_item(&archive, page).await.unwrap();
        let note = add_text(&mut archive, &sync, page, "Goals").await;

        // Edit and capture
        let component = archive.component_mut(page, note).unwrap();
        component.set_text("ship it").unwrap();
        let snapshot = sync
            .capture_snapshot(component, "first", SaveMode::Manual)
            .await
            .unwrap();
        component.set_text("ship it twice").unwrap();
        sync.sync_content_change(component).await.unwrap();
        drop(sync);

        // Reload from disk
        let store = FileStore::open(config.store_file(dir.path()), config.store_format).unwrap();
        let reloaded = hydrate::open_archive(&store, &config).unwrap();
        assert_eq!(reloaded.resolve_path("Main/Projects/Plan"), Some(page));
        let component = reloaded.page(page).unwrap().component(note).unwrap();
        assert_eq!(component.text().unwrap().content().text, "ship it twice");
        assert_eq!(component.capture_state(), Some(CaptureState::NeedsCapture));
        let history = component.snapshot_infos();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, snapshot);
        assert_eq!(history[0].description, "first");
    }

    #[tokio::test]
    async fn test_sorted_directory_scenario() {
        let config = ArchiveConfig::default();
        let store = Arc::new(MemoryStore::new());
        let mut archive = hydrate::open_archive(store.as_ref(), &config).unwrap();
        let sync = Synchronizer::spawn(store.clone());
        let main = config.system.main;

        let mut ids = Vec::new();
        for name in ["B", "A", "C"] {
            let (id, _) = archive.create_page(main, name, false).unwrap();
            sync.create_item(&archive, id).await.unwrap();
            ids.push(id);
        }
        let names = |archive: &Archive| -> Vec<String> {
            archive
                .directory(main)
                .unwrap()
                .children()
                .iter()
                .map(|c| c.name.clone())
                .collect()
        };
        assert_eq!(names(&archive), ["A", "B", "C"]);

        let index = archive.rename(ids[1], "Z").unwrap();
        sync.rename_item(&archive, ids[1]).await.unwrap();
        assert_eq!(index, Some(2));
        assert_eq!(names(&archive), ["B", "C", "Z"]);

        let reloaded = hydrate::open_archive(store.as_ref(), &config).unwrap();
        assert_eq!(names(&reloaded), ["B", "C", "Z"]);
    }

    #[tokio::test]
    async fn test_revert_round_trip() {
        let config = ArchiveConfig::default();
        let store = Arc::new(MemoryStore::new());
        let mut archive = hydrate::open_archive(store.as_ref(), &config).unwrap();
        let sync = Synchronizer::spawn(store.clone());
        let (page, _) = archive.create_page(config.system.main, "P", false).unwrap();
        sync.create_item(&archive, page).await.unwrap();
        let note = add_text(&mut archive, &sync, page, "N").await;

        let component = archive.component_mut(page, note).unwrap();
        component.set_text("X").unwrap();
        let s1 = sync
            .capture_snapshot(component, "x", SaveMode::Manual)
            .await
            .unwrap();
        component.set_text("Y").unwrap();
        sync.sync_content_change(component).await.unwrap();

        component.revert_to_snapshot(s1).unwrap();
        sync.sync_content_change(component).await.unwrap();

        assert_eq!(component.text().unwrap().content().text, "X");
        assert!(component.needs_capture());
        assert!(component.has_snapshot(s1));
        let record = sync.fetch_component(note).unwrap().unwrap();
        assert_eq!(record.data, ComponentData::Text("X".to_string()));
        assert_eq!(record.capture_state, CaptureState::NeedsCapture);
        assert_eq!(sync.fetch_snapshots(note).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_subtree_removal_leaves_no_orphans() {
        let config = ArchiveConfig::default();
        let store = Arc::new(MemoryStore::new());
        let mut archive = hydrate::open_archive(store.as_ref(), &config).unwrap();
        let sync = Synchronizer::spawn(store.clone());

        let (outer, _) = archive.create_directory(config.system.main, "outer").unwrap();
        sync.create_item(&archive, outer).await.unwrap();
        let (inner, _) = archive.create_directory(outer, "inner").unwrap();
        sync.create_item(&archive, inner).await.unwrap();
        let (page, _) = archive.create_page(inner, "deep", false).unwrap();
        sync.create_item(&archive, page).await.unwrap();
        let note = add_text(&mut archive, &sync, page, "n").await;
        let component = archive.component_mut(page, note).unwrap();
        component.set_text("keep?").unwrap();
        sync.capture_snapshot(component, "", SaveMode::Automatic)
            .await
            .unwrap();

        let removal = archive.remove_item(outer).unwrap();
        assert_eq!(
            removal.items,
            vec![(ItemKind::Page, page), (ItemKind::Directory, inner), (ItemKind::Directory, outer)]
        );
        sync.remove_items(&removal).await.unwrap();

        for kind in [EntityKind::Page, EntityKind::Component, EntityKind::Snapshot] {
            assert!(store.fetch_many(&Query::all(kind)).unwrap().is_empty());
        }
        // only the two system directories remain
        assert_eq!(store.fetch_many(&Query::all(EntityKind::Directory)).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_component_order_survives_reload() {
        let config = ArchiveConfig::default();
        let store = Arc::new(MemoryStore::new());
        let mut archive = hydrate::open_archive(store.as_ref(), &config).unwrap();
        let sync = Synchronizer::spawn(store.clone());
        let (page, _) = archive.create_page(config.system.main, "P", false).unwrap();
        sync.create_item(&archive, page).await.unwrap();
        for title in ["one", "two", "three"] {
            add_text(&mut archive, &sync, page, title).await;
        }

        archive.page_mut(page).unwrap().change_component_order(2, 0).unwrap();
        sync.save_component_order(archive.page(page).unwrap()).await.unwrap();

        let reloaded = hydrate::open_archive(store.as_ref(), &config).unwrap();
        let order: Vec<(&str, usize)> = reloaded
            .page(page)
            .unwrap()
            .components()
            .iter()
            .map(|c| (c.title.as_str(), c.rendering_order))
            .collect();
        assert_eq!(order, [("three", 0), ("one", 1), ("two", 2)]);
    }

    #[tokio::test]
    async fn test_trash_and_system_directories() {
        let config = ArchiveConfig::default();
        let store = Arc::new(MemoryStore::new());
        let mut archive = hydrate::open_archive(store.as_ref(), &config).unwrap();
        let sync = Synchronizer::spawn(store.clone());
        let (page, _) = archive.create_page(config.system.main, "old", false).unwrap();
        sync.create_item(&archive, page).await.unwrap();

        archive.move_to_trash(page).unwrap();
        sync.move_item(&archive, page).await.unwrap();
        assert!(matches!(
            archive.move_item(config.system.trash, config.system.main),
            Err(ArchiveError::InvalidMove(_))
        ));
        assert!(matches!(
            archive.remove_item(config.system.main),
            Err(ArchiveError::InvalidMove(_))
        ));

        let reloaded = hydrate::open_archive(store.as_ref(), &config).unwrap();
        assert_eq!(reloaded.path(page).unwrap(), "Trash/old");
    }
}
