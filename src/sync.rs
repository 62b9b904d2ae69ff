//! Persistence synchronizer
//!
//! The [`Synchronizer`] turns in-memory edits into the smallest store write
//! that reflects them. Each pending [`Action`] of a component becomes one
//! [`PlannedWrite`], a plain value computed from the action and the component,
//! which is applied to the component's record inside a single transaction.
//!
//! All writes go through one background worker. Jobs are queued on a channel
//! and run one at a time on the blocking pool, so writes reach the store in the
//! order they were issued; reads go straight to the store and only ever see
//! committed state. A caller that stops waiting does not cancel its write.
//!
//! Every planned write is idempotent against the record, so an entry whose
//! commit succeeded but whose caller never saw the result can be safely
//! applied again.
//!
//! ```rust,no_run
//! use folio::component::Component;
//! use folio::content::TableContent;
//! use folio::store::MemoryStore;
//! use folio::sync::Synchronizer;
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! # async fn demo() -> folio::Result<()> {
//! let sync = Synchronizer::spawn(Arc::new(MemoryStore::new()));
//! let mut table = Component::new("Budget", TableContent::with_columns(["Item", "Cost"]));
//! sync.add_component(Uuid::new_v4(), &mut table).await?;
//!
//! table.append_row()?;
//! sync.sync_content_change(&mut table).await?;
//! # Ok(())
//! # }
//! ```

use crate::action_log::Action;
use crate::component::Component;
use crate::content::{Column, ComponentKind, Row, TableSortBy, Track, TrackMetadata, TrackSort};
use crate::error::{ArchiveError, Result};
use crate::hierarchy::{Archive, Page, Removal, StorageItem};
use crate::snapshot::{CaptureState, SaveMode, SnapshotRemoval};
use crate::store::{
    AudioRecord, ComponentData, ComponentRecord, DirectoryRecord, Entity, EntityKind, PageRecord,
    PersistenceService, Query, RecordKey, RowRecord, SnapshotRecord, TableRecord, Transaction,
    TxOutcome,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

/// Store-level operation for one component record
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Overwrite the text field
    SetText(String),
    /// Add a row with an empty cell for every column
    InsertRow(Row),
    /// Add a column with an empty cell in every row
    InsertColumn(Column),
    /// Delete a row
    DeleteRow(Uuid),
    /// Move, rename and prune columns in one pass
    ReorderColumns(Vec<Column>),
    /// Set one cell
    UpdateCell {
        /// Row of the cell
        row_id: Uuid,
        /// Column of the cell
        column_id: Uuid,
        /// New value
        value: String,
        /// Row modification time to record
        modified_at: Option<DateTime<Utc>>,
    },
    /// Set a run of consecutive cells in one row
    InsertCellRange {
        /// Row of the cells
        row_id: Uuid,
        /// Column of the first value
        first_column: Uuid,
        /// Values in column order
        values: Vec<String>,
        /// Row modification time to record
        modified_at: Option<DateTime<Utc>>,
    },
    /// Insert a range of tracks at their final positions
    InsertTracks {
        /// Positions, ascending
        indices: Vec<usize>,
        /// Tracks in the same order as `indices`
        tracks: Vec<Track>,
    },
    /// Delete a track
    DeleteTrack(Uuid),
    /// Update a track's metadata and position
    UpdateTrack {
        /// Edited track
        track_id: Uuid,
        /// Changed fields
        fields: TrackMetadata,
        /// Position after the edit
        new_index: usize,
    },
    /// Write a fully resolved track order
    WriteTrackOrder {
        /// Sort mode
        sort_by: TrackSort,
        /// Track ids in order
        order: Vec<Uuid>,
    },
    /// Put one track at a position and switch to manual order
    MoveTrack {
        /// Moved track
        track_id: Uuid,
        /// Destination position
        dst: usize,
    },
    /// Replace the whole payload
    ReplaceContent(ComponentData),
}

/// One targeted write against a component record
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedWrite {
    /// Target component
    pub component: Uuid,
    /// Capture state to record alongside; `None` for audio
    pub capture_state: Option<CaptureState>,
    /// The operation
    pub op: WriteOp,
}

impl PlannedWrite {
    /// Plan the write for one pending action of `component`
    pub fn plan(component: &Component, action: &Action) -> Result<Self> {
        let op = match action {
            Action::ReplaceText(text) => WriteOp::SetText(text.clone()),
            Action::AppendRow(row) => WriteOp::InsertRow(row.clone()),
            Action::AppendColumn(column) => WriteOp::InsertColumn(column.clone()),
            Action::RemoveRow(id) => WriteOp::DeleteRow(*id),
            Action::EditColumns(columns) => WriteOp::ReorderColumns(columns.clone()),
            Action::EditCell {
                row_id,
                column_id,
                value,
            } => WriteOp::UpdateCell {
                row_id: *row_id,
                column_id: *column_id,
                value: value.clone(),
                modified_at: row_modified_at(component, *row_id),
            },
            Action::InsertCells {
                row_id,
                first_column,
                values,
            } => WriteOp::InsertCellRange {
                row_id: *row_id,
                first_column: *first_column,
                values: values.clone(),
                modified_at: row_modified_at(component, *row_id),
            },
            Action::AppendTracks { indices, tracks } => WriteOp::InsertTracks {
                indices: indices.clone(),
                tracks: tracks.clone(),
            },
            Action::RemoveTrack(id) => WriteOp::DeleteTrack(*id),
            Action::EditTrackMetadata {
                id,
                fields,
                new_index,
            } => WriteOp::UpdateTrack {
                track_id: *id,
                fields: fields.clone(),
                new_index: *new_index,
            },
            Action::SortTracks { mode, order } => WriteOp::WriteTrackOrder {
                sort_by: *mode,
                order: order.clone(),
            },
            Action::MoveTrack { dst, track_id, .. } => WriteOp::MoveTrack {
                track_id: *track_id,
                dst: *dst,
            },
            Action::Restore(content) => WriteOp::ReplaceContent(ComponentData::from(content)),
        };
        Ok(Self {
            component: component.id,
            capture_state: component.capture_state(),
            op,
        })
    }

    /// Apply the write inside a transaction
    pub fn apply(&self, tx: &mut dyn Transaction) -> Result<()> {
        let record = tx.component_mut(self.component)?;
        if let Some(state) = self.capture_state {
            record.capture_state = state;
        }
        apply_op(&mut record.data, &self.op)
    }
}

fn row_modified_at(component: &Component, row_id: Uuid) -> Option<DateTime<Utc>> {
    component.table().ok().and_then(|t| {
        t.content()
            .rows()
            .iter()
            .find(|r| r.id == row_id)
            .map(|r| r.modified_at)
    })
}

fn apply_op(data: &mut ComponentData, op: &WriteOp) -> Result<()> {
    match op {
        WriteOp::SetText(text) => match data {
            ComponentData::Text(current) => {
                current.clone_from(text);
                Ok(())
            }
            other => Err(data_mismatch(ComponentKind::Text, other)),
        },
        WriteOp::ReplaceContent(new_data) => {
            if new_data.kind() != data.kind() {
                return Err(data_mismatch(new_data.kind(), data));
            }
            *data = new_data.clone();
            Ok(())
        }
        WriteOp::InsertRow(row) => {
            let table = table_data(data)?;
            if table.row_mut(row.id).is_none() {
                let cells = vec![String::new(); table.columns.len()];
                table.rows.push(RowRecord {
                    row: row.clone(),
                    cells,
                });
            }
            Ok(())
        }
        WriteOp::InsertColumn(column) => {
            let table = table_data(data)?;
            if table.column_position(column.id).is_none() {
                table.columns.push(column.clone());
                for row in &mut table.rows {
                    row.cells.push(String::new());
                }
            }
            Ok(())
        }
        WriteOp::DeleteRow(id) => {
            table_data(data)?.rows.retain(|r| r.row.id != *id);
            Ok(())
        }
        WriteOp::ReorderColumns(columns) => reorder_columns(table_data(data)?, columns),
        WriteOp::UpdateCell {
            row_id,
            column_id,
            value,
            modified_at,
        } => {
            let table = table_data(data)?;
            let position = table
                .column_position(*column_id)
                .ok_or(ArchiveError::ColumnNotFound(*column_id))?;
            let width = table.columns.len();
            let row = table.row_mut(*row_id).ok_or(ArchiveError::RowNotFound(*row_id))?;
            row.cells.resize(width, String::new());
            row.cells[position].clone_from(value);
            if let Some(at) = modified_at {
                row.row.modified_at = *at;
            }
            Ok(())
        }
        WriteOp::InsertCellRange {
            row_id,
            first_column,
            values,
            modified_at,
        } => {
            let table = table_data(data)?;
            let start = table
                .column_position(*first_column)
                .ok_or(ArchiveError::ColumnNotFound(*first_column))?;
            let width = table.columns.len();
            if start + values.len() > width {
                return Err(ArchiveError::InvalidEdit(format!(
                    "cell range of {} overflows {} stored columns",
                    values.len(),
                    width
                )));
            }
            let row = table.row_mut(*row_id).ok_or(ArchiveError::RowNotFound(*row_id))?;
            row.cells.resize(width, String::new());
            row.cells[start..start + values.len()].clone_from_slice(values);
            if let Some(at) = modified_at {
                row.row.modified_at = *at;
            }
            Ok(())
        }
        WriteOp::InsertTracks { indices, tracks } => {
            let audio = audio_data(data)?;
            for (index, track) in indices.iter().zip(tracks) {
                if audio.position_of(track.id).is_none() {
                    let at = (*index).min(audio.tracks.len());
                    audio.tracks.insert(at, track.clone());
                }
            }
            Ok(())
        }
        WriteOp::DeleteTrack(id) => {
            audio_data(data)?.tracks.retain(|t| t.id != *id);
            Ok(())
        }
        WriteOp::UpdateTrack {
            track_id,
            fields,
            new_index,
        } => {
            let audio = audio_data(data)?;
            let index = audio
                .position_of(*track_id)
                .ok_or(ArchiveError::TrackNotFound(*track_id))?;
            let mut track = audio.tracks.remove(index);
            fields.apply_to(&mut track);
            let at = (*new_index).min(audio.tracks.len());
            audio.tracks.insert(at, track);
            Ok(())
        }
        WriteOp::WriteTrackOrder { sort_by, order } => {
            let audio = audio_data(data)?;
            let mut remaining = std::mem::take(&mut audio.tracks);
            let mut ordered = Vec::with_capacity(remaining.len());
            for id in order {
                if let Some(pos) = remaining.iter().position(|t| t.id == *id) {
                    ordered.push(remaining.remove(pos));
                }
            }
            ordered.extend(remaining);
            audio.tracks = ordered;
            audio.sort_by = *sort_by;
            Ok(())
        }
        WriteOp::MoveTrack { track_id, dst } => {
            let audio = audio_data(data)?;
            let index = audio
                .position_of(*track_id)
                .ok_or(ArchiveError::TrackNotFound(*track_id))?;
            let track = audio.tracks.remove(index);
            let at = (*dst).min(audio.tracks.len());
            audio.tracks.insert(at, track);
            audio.sort_by = TrackSort::Manual;
            Ok(())
        }
    }
}

/// Move, rename and prune a positional table's columns in one pass
///
/// `columns` is the new ordered list. Each row's cells are rebuilt from the
/// old positions of the surviving columns, which drops the cells of removed
/// columns from the tail. Applying the same list twice is a no-op.
pub fn reorder_columns(table: &mut TableRecord, columns: &[Column]) -> Result<()> {
    let sources = columns
        .iter()
        .map(|c| table.column_position(c.id).ok_or(ArchiveError::ColumnNotFound(c.id)))
        .collect::<Result<Vec<usize>>>()?;

    for row in &mut table.rows {
        let old = std::mem::take(&mut row.cells);
        row.cells = sources
            .iter()
            .map(|&p| old.get(p).cloned().unwrap_or_default())
            .collect();
    }
    table.columns = columns.to_vec();
    if table.columns.is_empty() {
        table.rows.clear();
    }
    if let TableSortBy::Column { column_id, .. } = table.sort_by {
        if table.column_position(column_id).is_none() {
            table.sort_by = TableSortBy::Manual;
        }
    }
    Ok(())
}

fn table_data(data: &mut ComponentData) -> Result<&mut TableRecord> {
    match data {
        ComponentData::Table(table) => Ok(table),
        other => Err(data_mismatch(ComponentKind::Table, other)),
    }
}

fn audio_data(data: &mut ComponentData) -> Result<&mut AudioRecord> {
    match data {
        ComponentData::Audio(audio) => Ok(audio),
        other => Err(data_mismatch(ComponentKind::Audio, other)),
    }
}

fn data_mismatch(expected: ComponentKind, found: &ComponentData) -> ArchiveError {
    ArchiveError::KindMismatch {
        expected: expected.as_str(),
        actual: found.kind().as_str(),
    }
}

/// Outcome of a bulk capture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureReport {
    /// Components that got a new snapshot
    pub captured: usize,
    /// Components already captured (or not versioned)
    pub skipped: usize,
}

type Job = Box<dyn FnOnce(&dyn PersistenceService) + Send>;

/// Serialized writer in front of a persistence service
#[derive(Clone)]
pub struct Synchronizer {
    store: Arc<dyn PersistenceService>,
    jobs: mpsc::UnboundedSender<Job>,
    auto_description: String,
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("worker_alive", &!self.jobs.is_closed())
            .field("auto_description", &self.auto_description)
            .finish()
    }
}

impl Synchronizer {
    /// Start the write worker; must be called inside a Tokio runtime
    pub fn spawn(store: Arc<dyn PersistenceService>) -> Self {
        let (jobs, queue) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(Arc::clone(&store), queue));
        Self {
            store,
            jobs,
            auto_description: String::new(),
        }
    }

    /// Description used for automatic captures
    pub fn with_auto_description(mut self, description: impl Into<String>) -> Self {
        self.auto_description = description.into();
        self
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<dyn PersistenceService> {
        &self.store
    }

    async fn submit<R, F>(&self, job: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&dyn PersistenceService) -> Result<R> + Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        self.jobs
            .send(Box::new(move |store: &dyn PersistenceService| {
                // the caller may have stopped waiting; the write still happened
                let _ = reply.send(job(store));
            }))
            .map_err(|_| ArchiveError::SyncWorkerStopped)?;
        result.await.map_err(|_| ArchiveError::SyncWorkerStopped)?
    }

    async fn write<F>(&self, mut body: F) -> Result<TxOutcome>
    where
        F: FnMut(&mut dyn Transaction) -> Result<()> + Send + 'static,
    {
        self.submit(move |store| store.transactional_update(&mut body)).await
    }

    // Content

    /// Persist every pending edit of a text or table component
    ///
    /// Entries are written in order, one transaction each, and popped only
    /// once committed. Stops at the first failure, leaving that entry and the
    /// ones behind it queued. Returns the number of entries written.
    #[instrument(skip(self, component), fields(component = %component.id))]
    pub async fn sync_content_change(&self, component: &mut Component) -> Result<usize> {
        if !component.kind().is_versioned() {
            return Err(ArchiveError::KindMismatch {
                expected: "text or table",
                actual: component.kind().as_str(),
            });
        }
        self.drain(component).await
    }

    /// Persist every pending edit of an audio component
    #[instrument(skip(self, component), fields(component = %component.id))]
    pub async fn sync_audio_change(&self, component: &mut Component) -> Result<usize> {
        if component.kind() != ComponentKind::Audio {
            return Err(ArchiveError::KindMismatch {
                expected: ComponentKind::Audio.as_str(),
                actual: component.kind().as_str(),
            });
        }
        self.drain(component).await
    }

    /// Persist pending edits of any component kind
    pub async fn sync_component(&self, component: &mut Component) -> Result<usize> {
        self.drain(component).await
    }

    async fn drain(&self, component: &mut Component) -> Result<usize> {
        let mut written = 0;
        while let Some(action) = component.log().front() {
            let plan = PlannedWrite::plan(component, action)?;
            debug!("Writing {} for {}", action.label(), component.id);
            self.write(move |tx| plan.apply(tx)).await?;
            component.log_mut().pop_front();
            written += 1;
        }
        Ok(written)
    }

    /// Capture a snapshot durably
    ///
    /// Pending edits are flushed first. The snapshot record and the
    /// component's capture state are written in one transaction; only after
    /// that commits is the snapshot added to the in-memory history.
    #[instrument(skip(self, component), fields(component = %component.id))]
    pub async fn capture_snapshot(
        &self,
        component: &mut Component,
        description: &str,
        save_mode: SaveMode,
    ) -> Result<Uuid> {
        self.sync_content_change(component).await?;

        let prepared = component.prepare_capture(description, save_mode)?;
        let record = SnapshotRecord::from_prepared(component.id, &prepared);
        let component_id = component.id;
        self.write(move |tx| {
            let mut record = record.clone();
            record.sequence = next_snapshot_sequence(tx, component_id);
            tx.put(Entity::Snapshot(record));
            tx.component_mut(component_id)?.capture_state = CaptureState::Captured;
            Ok(())
        })
        .await?;

        let snapshot_id = prepared.id();
        component.commit_capture(prepared)?;
        info!("Captured snapshot {} of {}", snapshot_id, component_id);
        Ok(snapshot_id)
    }

    /// Capture every component that needs it, automatically
    ///
    /// Captured and audio components are skipped, so calling this twice in a
    /// row writes nothing the second time. Stops at the first failure.
    pub async fn capture_all_pending<'a, I>(&self, components: I) -> Result<CaptureReport>
    where
        I: IntoIterator<Item = &'a mut Component>,
    {
        let mut report = CaptureReport::default();
        for component in components {
            if !component.needs_capture() {
                report.skipped += 1;
                continue;
            }
            self.capture_snapshot(component, &self.auto_description, SaveMode::Automatic)
                .await?;
            report.captured += 1;
        }
        if report.captured > 0 {
            info!("Captured {} components, skipped {}", report.captured, report.skipped);
        }
        Ok(report)
    }

    /// Delete a snapshot durably, then from the in-memory history
    pub async fn remove_snapshot(
        &self,
        component: &mut Component,
        snapshot_id: Uuid,
    ) -> Result<SnapshotRemoval> {
        if !component.kind().is_versioned() {
            return Err(ArchiveError::KindMismatch {
                expected: "text or table",
                actual: component.kind().as_str(),
            });
        }
        if !component.has_snapshot(snapshot_id) {
            return Err(ArchiveError::SnapshotNotFound(snapshot_id));
        }
        self.write(move |tx| {
            tx.delete(RecordKey::new(EntityKind::Snapshot, snapshot_id));
            Ok(())
        })
        .await?;
        component.remove_snapshot(snapshot_id)
    }

    // Hierarchy

    async fn put_item(&self, archive: &Archive, id: Uuid) -> Result<TxOutcome> {
        let entity = match archive.get(id).ok_or(ArchiveError::ItemNotFound(id))? {
            StorageItem::Directory(d) => Entity::Directory(DirectoryRecord::from(d)),
            StorageItem::Page(p) => Entity::Page(PageRecord::from(p)),
        };
        self.write(move |tx| {
            tx.put(entity.clone());
            Ok(())
        })
        .await
    }

    /// Persist a newly created directory or page
    pub async fn create_item(&self, archive: &Archive, id: Uuid) -> Result<()> {
        self.put_item(archive, id).await?;
        trace!("Created record for {}", id);
        Ok(())
    }

    /// Persist an item's new name
    pub async fn rename_item(&self, archive: &Archive, id: Uuid) -> Result<()> {
        self.put_item(archive, id).await.map(|_| ())
    }

    /// Persist an item's new parent
    pub async fn move_item(&self, archive: &Archive, id: Uuid) -> Result<()> {
        self.put_item(archive, id).await.map(|_| ())
    }

    /// Delete everything a hierarchy removal took out, descendants first
    #[instrument(skip(self, removal))]
    pub async fn remove_items(&self, removal: &Removal) -> Result<()> {
        let removal = removal.clone();
        self.write(move |tx| {
            for component in &removal.components {
                tx.delete_component(*component);
            }
            for (kind, id) in &removal.items {
                tx.delete(RecordKey::new((*kind).into(), *id));
            }
            Ok(())
        })
        .await?;
        Ok(())
    }

    /// Persist a directory's sort criterion
    pub async fn save_sort_order(&self, archive: &Archive, directory: Uuid) -> Result<()> {
        let sort = archive.directory(directory)?.sort_order();
        self.write(move |tx| {
            tx.directory_mut(directory)?.sort = sort;
            Ok(())
        })
        .await?;
        Ok(())
    }

    /// Persist a new component with its full content
    ///
    /// The record already reflects every pending edit, so the log is cleared.
    pub async fn add_component(&self, page: Uuid, component: &mut Component) -> Result<()> {
        let record = ComponentRecord::from_component(page, component);
        let snapshots = SnapshotRecord::all_for(component);
        self.write(move |tx| {
            tx.put(Entity::Component(record.clone()));
            for snapshot in &snapshots {
                tx.put(Entity::Snapshot(snapshot.clone()));
            }
            Ok(())
        })
        .await?;
        component.log_mut().clear();
        Ok(())
    }

    /// Delete a component record and its snapshots
    pub async fn remove_component(&self, component: Uuid) -> Result<()> {
        self.write(move |tx| {
            tx.delete_component(component);
            Ok(())
        })
        .await?;
        Ok(())
    }

    /// Persist the rendering order of every component on a page
    pub async fn save_component_order(&self, page: &Page) -> Result<()> {
        let orders: Vec<(Uuid, usize)> = page
            .components()
            .iter()
            .map(|c| (c.id, c.rendering_order))
            .collect();
        self.write(move |tx| {
            for (id, order) in &orders {
                tx.component_mut(*id)?.rendering_order = *order;
            }
            Ok(())
        })
        .await?;
        Ok(())
    }

    /// Persist a component's title and display flag
    pub async fn save_component_title(&self, component: &Component) -> Result<()> {
        let (id, title, minimum) = (component.id, component.title.clone(), component.is_minimum_height);
        self.write(move |tx| {
            let record = tx.component_mut(id)?;
            record.title.clone_from(&title);
            record.is_minimum_height = minimum;
            Ok(())
        })
        .await?;
        Ok(())
    }

    // Reads

    /// Committed record of a component
    pub fn fetch_component(&self, id: Uuid) -> Result<Option<ComponentRecord>> {
        match self.store.fetch_one(EntityKind::Component, id)? {
            Some(Entity::Component(record)) => Ok(Some(record)),
            Some(_) | None => Ok(None),
        }
    }

    /// Committed snapshots of a component, newest first
    pub fn fetch_snapshots(&self, component: Uuid) -> Result<Vec<SnapshotRecord>> {
        let mut snapshots: Vec<SnapshotRecord> = self
            .store
            .fetch_many(&Query::owned_by(EntityKind::Snapshot, component))?
            .into_iter()
            .filter_map(|e| match e {
                Entity::Snapshot(s) => Some(s),
                _ => None,
            })
            .collect();
        snapshots.sort_by(SnapshotRecord::newest_first);
        Ok(snapshots)
    }
}

fn next_snapshot_sequence(tx: &dyn Transaction, component: Uuid) -> u64 {
    tx.children(&Query::owned_by(EntityKind::Snapshot, component))
        .iter()
        .filter_map(|e| match e {
            Entity::Snapshot(s) => Some(s.sequence + 1),
            _ => None,
        })
        .max()
        .unwrap_or(0)
}

async fn run_worker(store: Arc<dyn PersistenceService>, mut queue: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = queue.recv().await {
        let store = Arc::clone(&store);
        if let Err(e) = tokio::task::spawn_blocking(move || job(store.as_ref())).await {
            warn!("Sync job aborted: {}", e);
        }
    }
    debug!("Sync worker stopped");
}
