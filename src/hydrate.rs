//! Loading the archive tree from a store
//!
//! [`open_archive`] rebuilds the in-memory [`Archive`] from the committed
//! records. Directories are attached parents first, so every child lands in
//! an already sorted container. Components come back in rendering order and
//! snapshots newest first. Records whose owner no longer exists are skipped
//! with a warning.
//!
//! If the configured system directories are missing from the store, they are
//! created first in one transaction.

use crate::collections::{HashMap, HashMapExt};
use crate::component::{Component, ComponentBody};
use crate::config::ArchiveConfig;
use crate::content::{ComponentContent, TableContent, TextContent};
use crate::error::Result;
use crate::hierarchy::{Archive, Directory, Page, StorageItem};
use crate::snapshot::{Snapshot, Versioned};
use crate::store::{
    ComponentData, ComponentRecord, DirectoryRecord, Entity, EntityKind, PersistenceService,
    Query, SnapshotRecord,
};
use std::collections::VecDeque;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Create the system directories if the store lacks them
///
/// Returns `true` if anything was written.
pub fn bootstrap(store: &dyn PersistenceService, config: &ArchiveConfig) -> Result<bool> {
    let system = &config.system;
    let mut missing = Vec::new();
    for (id, name) in [(system.main, &system.main_name), (system.trash, &system.trash_name)] {
        if store.fetch_one(EntityKind::Directory, id)?.is_none() {
            let root = Directory::with_id(id, name.clone(), chrono::Utc::now(), None, config.default_sort);
            missing.push(DirectoryRecord::from(&root));
        }
    }
    if missing.is_empty() {
        return Ok(false);
    }
    info!("Bootstrapping {} system directories", missing.len());
    store.transactional_update(&mut |tx| {
        for record in &missing {
            tx.put(Entity::Directory(record.clone()));
        }
        Ok(())
    })?;
    Ok(true)
}

/// Rebuild the archive from the store
#[instrument(skip(store, config))]
pub fn open_archive(store: &dyn PersistenceService, config: &ArchiveConfig) -> Result<Archive> {
    bootstrap(store, config)?;

    let mut directories = Vec::new();
    let mut pages = Vec::new();
    let mut components: HashMap<Uuid, Vec<ComponentRecord>> = HashMap::new();
    let mut snapshots: HashMap<Uuid, Vec<SnapshotRecord>> = HashMap::new();

    for kind in [
        EntityKind::Directory,
        EntityKind::Page,
        EntityKind::Component,
        EntityKind::Snapshot,
    ] {
        for entity in store.fetch_many(&Query::all(kind))? {
            match entity {
                Entity::Directory(d) => directories.push(d),
                Entity::Page(p) => pages.push(p),
                Entity::Component(c) => components.entry(c.page).or_default().push(c),
                Entity::Snapshot(s) => snapshots.entry(s.component).or_default().push(s),
            }
        }
    }

    let mut archive = Archive::empty(config.system.clone(), config.default_sort);

    // parents before children
    let mut pending: VecDeque<DirectoryRecord> = directories.into();
    let mut stalled = 0;
    while let Some(record) = pending.pop_front() {
        let ready = match record.parent {
            None => true,
            Some(parent) => archive.directory(parent).is_ok(),
        };
        if ready {
            let id = record.id;
            let directory = Directory::with_id(
                record.id,
                record.name,
                record.creation_date,
                record.parent,
                record.sort,
            );
            if let Err(e) = archive.attach(StorageItem::Directory(directory)) {
                warn!("Skipping directory {}: {}", id, e);
            }
            stalled = 0;
        } else {
            pending.push_back(record);
            stalled += 1;
            if stalled > pending.len() {
                break;
            }
        }
    }
    for orphan in pending {
        warn!("Skipping directory {} with missing parent {:?}", orphan.id, orphan.parent);
    }

    for record in pages {
        if archive.directory(record.parent).is_err() {
            warn!("Skipping page {} with missing parent {}", record.id, record.parent);
            continue;
        }
        let mut page = Page::with_id(
            record.id,
            record.name,
            record.creation_date,
            record.parent,
            record.is_single_component_page,
        );
        let loaded: Vec<Component> = components
            .remove(&record.id)
            .unwrap_or_default()
            .into_iter()
            .map(|c| {
                let history = snapshots.remove(&c.id).unwrap_or_default();
                rebuild_component(c, history)
            })
            .collect();
        if page.load_components(loaded) {
            warn!("Repaired rendering order gaps on page {}", page.id);
        }
        let id = page.id;
        if let Err(e) = archive.attach(StorageItem::Page(page)) {
            warn!("Skipping page {}: {}", id, e);
        }
    }
    for page in components.keys() {
        warn!("Skipping components of missing page {}", page);
    }

    info!("Hydrated archive with {} items", archive.len());
    Ok(archive)
}

fn rebuild_component(record: ComponentRecord, mut history: Vec<SnapshotRecord>) -> Component {
    history.sort_by(SnapshotRecord::newest_first);
    let body = match record.data {
        ComponentData::Text(text) => ComponentBody::Text(Versioned::from_parts(
            TextContent::new(text),
            typed_snapshots(history, |c| match c {
                ComponentContent::Text(t) => Some(t),
                _ => None,
            }),
            record.capture_state,
        )),
        ComponentData::Table(table) => ComponentBody::Table(Versioned::from_parts(
            TableContent::from(table),
            typed_snapshots(history, |c| match c {
                ComponentContent::Table(t) => Some(t),
                _ => None,
            }),
            record.capture_state,
        )),
        data @ ComponentData::Audio(_) => ComponentBody::new(ComponentContent::from(data)),
    };
    debug!("Rebuilt component {} ({})", record.id, body.kind());
    Component::from_parts(
        record.id,
        record.creation_date,
        record.title,
        record.rendering_order,
        record.is_minimum_height,
        body,
    )
}

fn typed_snapshots<C>(
    records: Vec<SnapshotRecord>,
    extract: impl Fn(ComponentContent) -> Option<C>,
) -> Vec<Snapshot<C>> {
    records
        .into_iter()
        .filter_map(|r| {
            let id = r.id;
            match extract(r.content) {
                Some(content) => Some(Snapshot {
                    id,
                    making_date: r.making_date,
                    description: r.description,
                    save_mode: r.save_mode,
                    content,
                    digest: r.digest,
                }),
                None => {
                    warn!("Skipping snapshot {} of the wrong kind", id);
                    None
                }
            }
        })
        .collect()
}
