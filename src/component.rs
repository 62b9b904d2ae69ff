//! Page components
//!
//! A [`Component`] is one typed content unit on a page. Its payload is the
//! closed enum [`ComponentBody`]: text and tables carry a snapshot history
//! ([`Versioned`]), audio playlists do not.
//!
//! Every edit method mutates the live content and pushes one [`Action`] onto
//! the component's [`ActionLog`]; persisting those entries is the
//! synchronizer's job.

use crate::action_log::{Action, ActionLog};
use crate::content::{
    AudioContent, Column, ColumnEdit, ComponentContent, ComponentKind, Row, TableContent,
    TextContent, Track, TrackMetadata, TrackSort,
};
use crate::error::{ArchiveError, Result};
use crate::snapshot::{CaptureState, SaveMode, Snapshot, SnapshotRemoval, Versioned};
use crate::sort::IndexMove;
use chrono::{DateTime, Utc};
use tracing::trace;
use uuid::Uuid;

/// Kind-specific payload of a component
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentBody {
    /// Versioned text
    Text(Versioned<TextContent>),
    /// Versioned table
    Table(Versioned<TableContent>),
    /// Playlist, not versioned
    Audio(AudioContent),
}

impl ComponentBody {
    /// Fresh body holding `content`
    pub fn new(content: ComponentContent) -> Self {
        match content {
            ComponentContent::Text(text) => ComponentBody::Text(Versioned::new(text)),
            ComponentContent::Table(table) => ComponentBody::Table(Versioned::new(table)),
            ComponentContent::Audio(audio) => ComponentBody::Audio(audio),
        }
    }

    /// Kind of this body
    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentBody::Text(_) => ComponentKind::Text,
            ComponentBody::Table(_) => ComponentKind::Table,
            ComponentBody::Audio(_) => ComponentKind::Audio,
        }
    }

    /// Copy of the live content
    pub fn content(&self) -> ComponentContent {
        match self {
            ComponentBody::Text(v) => ComponentContent::Text(v.content().clone()),
            ComponentBody::Table(v) => ComponentContent::Table(v.content().clone()),
            ComponentBody::Audio(a) => ComponentContent::Audio(a.clone()),
        }
    }
}

/// A snapshot built but not yet recorded in the history
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedSnapshot {
    /// Of a text component
    Text(Snapshot<TextContent>),
    /// Of a table component
    Table(Snapshot<TableContent>),
}

impl PreparedSnapshot {
    /// Snapshot id
    pub fn id(&self) -> Uuid {
        match self {
            PreparedSnapshot::Text(s) => s.id,
            PreparedSnapshot::Table(s) => s.id,
        }
    }
}

/// Kind-independent view of one snapshot, for listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    /// Snapshot id
    pub id: Uuid,
    /// Capture time
    pub making_date: DateTime<Utc>,
    /// Description
    pub description: String,
    /// Automatic or manual
    pub save_mode: SaveMode,
    /// Content digest
    pub digest: String,
}

impl<C> From<&Snapshot<C>> for SnapshotInfo {
    fn from(s: &Snapshot<C>) -> Self {
        Self {
            id: s.id,
            making_date: s.making_date,
            description: s.description.clone(),
            save_mode: s.save_mode,
            digest: s.digest.clone(),
        }
    }
}

/// Typed content unit on a page
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// Component id
    pub id: Uuid,
    /// Creation time
    pub creation_date: DateTime<Utc>,
    /// Title shown above the content
    pub title: String,
    /// Position on the page, 0-based and contiguous
    pub rendering_order: usize,
    /// Collapsed display flag
    pub is_minimum_height: bool,
    body: ComponentBody,
    log: ActionLog,
}

impl Component {
    /// New component with the given content
    pub fn new(title: impl Into<String>, content: impl Into<ComponentContent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            creation_date: Utc::now(),
            title: title.into(),
            rendering_order: 0,
            is_minimum_height: false,
            body: ComponentBody::new(content.into()),
            log: ActionLog::new(),
        }
    }

    /// Empty component of a kind
    pub fn empty(title: impl Into<String>, kind: ComponentKind) -> Self {
        Self::new(title, ComponentContent::empty(kind))
    }

    /// Reassemble a component loaded from the store
    pub fn from_parts(
        id: Uuid,
        creation_date: DateTime<Utc>,
        title: String,
        rendering_order: usize,
        is_minimum_height: bool,
        body: ComponentBody,
    ) -> Self {
        Self {
            id,
            creation_date,
            title,
            rendering_order,
            is_minimum_height,
            body,
            log: ActionLog::new(),
        }
    }

    /// Component kind
    pub fn kind(&self) -> ComponentKind {
        self.body.kind()
    }

    /// Payload
    pub fn body(&self) -> &ComponentBody {
        &self.body
    }

    /// Copy of the live content
    pub fn content(&self) -> ComponentContent {
        self.body.content()
    }

    /// Pending edits
    pub fn log(&self) -> &ActionLog {
        &self.log
    }

    /// Pending edits, mutable (consumed by the synchronizer)
    pub fn log_mut(&mut self) -> &mut ActionLog {
        &mut self.log
    }

    /// Capture state; audio components have none
    pub fn capture_state(&self) -> Option<CaptureState> {
        match &self.body {
            ComponentBody::Text(v) => Some(v.capture_state()),
            ComponentBody::Table(v) => Some(v.capture_state()),
            ComponentBody::Audio(_) => None,
        }
    }

    /// Whether a capture is pending
    pub fn needs_capture(&self) -> bool {
        self.capture_state() == Some(CaptureState::NeedsCapture)
    }

    /// Text history
    pub fn text(&self) -> Result<&Versioned<TextContent>> {
        match &self.body {
            ComponentBody::Text(v) => Ok(v),
            other => Err(mismatch(ComponentKind::Text, other.kind())),
        }
    }

    /// Table history
    pub fn table(&self) -> Result<&Versioned<TableContent>> {
        match &self.body {
            ComponentBody::Table(v) => Ok(v),
            other => Err(mismatch(ComponentKind::Table, other.kind())),
        }
    }

    /// Playlist
    pub fn audio(&self) -> Result<&AudioContent> {
        match &self.body {
            ComponentBody::Audio(a) => Ok(a),
            other => Err(mismatch(ComponentKind::Audio, other.kind())),
        }
    }

    fn text_mut(&mut self) -> Result<&mut Versioned<TextContent>> {
        match &mut self.body {
            ComponentBody::Text(v) => Ok(v),
            other => Err(mismatch(ComponentKind::Text, other.kind())),
        }
    }

    fn table_mut(&mut self) -> Result<&mut Versioned<TableContent>> {
        match &mut self.body {
            ComponentBody::Table(v) => Ok(v),
            other => Err(mismatch(ComponentKind::Table, other.kind())),
        }
    }

    fn audio_mut(&mut self) -> Result<&mut AudioContent> {
        match &mut self.body {
            ComponentBody::Audio(a) => Ok(a),
            other => Err(mismatch(ComponentKind::Audio, other.kind())),
        }
    }

    fn record(&mut self, action: Action) {
        trace!("Component {} logged {}", self.id, action.label());
        self.log.push(action);
    }

    // Text

    /// Replace the text
    pub fn set_text(&mut self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.text_mut()?.modify(|c| c.set_text(text.clone()));
        self.record(Action::ReplaceText(text));
        Ok(())
    }

    // Table

    /// Append an empty row
    pub fn append_row(&mut self) -> Result<Row> {
        let row = self.table_mut()?.modify(TableContent::append_row);
        self.record(Action::AppendRow(row.clone()));
        Ok(row)
    }

    /// Append an empty column
    pub fn append_column(&mut self, title: impl Into<String>) -> Result<Column> {
        let title = title.into();
        let column = self.table_mut()?.modify(|t| t.append_column(title));
        self.record(Action::AppendColumn(column.clone()));
        Ok(column)
    }

    /// Remove a row
    pub fn remove_row(&mut self, row_id: Uuid) -> Result<Row> {
        let table = self.table_mut()?;
        if table.content().row_position(row_id).is_none() {
            return Err(ArchiveError::RowNotFound(row_id));
        }
        let row = table.modify(|t| t.remove_row(row_id))?;
        self.record(Action::RemoveRow(row_id));
        Ok(row)
    }

    /// Reorder, rename and prune columns
    pub fn edit_columns(&mut self, columns: Vec<Column>) -> Result<ColumnEdit> {
        let table = self.table_mut()?;
        // validate on a scratch copy so a rejected edit never flags capture
        let mut scratch = table.content().clone();
        scratch.edit_columns(columns.clone())?;
        let edit = table.modify(|t| t.edit_columns(columns.clone()))?;
        self.record(Action::EditColumns(columns));
        Ok(edit)
    }

    /// Drop one column, persisted as a prune of the column list
    pub fn remove_column(&mut self, column_id: Uuid) -> Result<Column> {
        let (removed, remaining): (Vec<Column>, Vec<Column>) = self
            .table()?
            .content()
            .columns()
            .iter()
            .cloned()
            .partition(|c| c.id == column_id);
        let column = removed
            .into_iter()
            .next()
            .ok_or(ArchiveError::ColumnNotFound(column_id))?;
        self.edit_columns(remaining)?;
        Ok(column)
    }

    /// Set one cell
    pub fn edit_cell(&mut self, row_id: Uuid, column_id: Uuid, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        let table = self.table_mut()?;
        if table.content().column_position(column_id).is_none() {
            return Err(ArchiveError::ColumnNotFound(column_id));
        }
        if table.content().row_position(row_id).is_none() {
            return Err(ArchiveError::RowNotFound(row_id));
        }
        table.modify(|t| t.edit_cell(row_id, column_id, value.clone()))?;
        self.record(Action::EditCell {
            row_id,
            column_id,
            value,
        });
        Ok(())
    }

    /// Paste a block of values into one row, starting at `first_column`
    pub fn insert_cells(&mut self, row_id: Uuid, first_column: Uuid, values: Vec<String>) -> Result<()> {
        let table = self.table_mut()?;
        let mut scratch = table.content().clone();
        scratch.insert_cells(row_id, first_column, values.clone())?;
        table.modify(|t| t.insert_cells(row_id, first_column, values.clone()))?;
        self.record(Action::InsertCells {
            row_id,
            first_column,
            values,
        });
        Ok(())
    }

    // Audio

    /// Add tracks; returns their final positions
    pub fn append_tracks(&mut self, tracks: Vec<Track>) -> Result<Vec<usize>> {
        let audio = self.audio_mut()?;
        let indices = audio.append_tracks(tracks);
        let placed = indices.iter().map(|i| audio.tracks()[*i].clone()).collect();
        self.record(Action::AppendTracks {
            indices: indices.clone(),
            tracks: placed,
        });
        Ok(indices)
    }

    /// Remove a track; returns its former position
    pub fn remove_track(&mut self, id: Uuid) -> Result<usize> {
        let (index, _) = self.audio_mut()?.remove_track(id)?;
        self.record(Action::RemoveTrack(id));
        Ok(index)
    }

    /// Update track metadata; returns the track's position afterwards
    pub fn edit_track_metadata(&mut self, id: Uuid, fields: TrackMetadata) -> Result<usize> {
        let new_index = self.audio_mut()?.edit_track_metadata(id, &fields)?;
        self.record(Action::EditTrackMetadata {
            id,
            fields,
            new_index,
        });
        Ok(new_index)
    }

    /// Re-sort the playlist
    pub fn sort_tracks(&mut self, mode: TrackSort) -> Result<Vec<IndexMove>> {
        let audio = self.audio_mut()?;
        let moves = audio.sort_tracks(mode);
        let order = audio.tracks().iter().map(|t| t.id).collect();
        self.record(Action::SortTracks { mode, order });
        Ok(moves)
    }

    /// Move a track by hand
    pub fn move_track(&mut self, src: usize, dst: usize) -> Result<()> {
        let audio = self.audio_mut()?;
        audio.move_track(src, dst)?;
        let track_id = audio.tracks()[dst].id;
        self.record(Action::MoveTrack { src, dst, track_id });
        Ok(())
    }

    // History

    /// Snapshot listing, newest first; empty for audio
    pub fn snapshot_infos(&self) -> Vec<SnapshotInfo> {
        match &self.body {
            ComponentBody::Text(v) => v.snapshots().iter().map(SnapshotInfo::from).collect(),
            ComponentBody::Table(v) => v.snapshots().iter().map(SnapshotInfo::from).collect(),
            ComponentBody::Audio(_) => Vec::new(),
        }
    }

    /// Build a snapshot of the live content without recording it
    pub fn prepare_capture(&self, description: &str, save_mode: SaveMode) -> Result<PreparedSnapshot> {
        match &self.body {
            ComponentBody::Text(v) => Ok(PreparedSnapshot::Text(v.prepare_snapshot(description, save_mode))),
            ComponentBody::Table(v) => Ok(PreparedSnapshot::Table(v.prepare_snapshot(description, save_mode))),
            ComponentBody::Audio(_) => Err(not_versioned()),
        }
    }

    /// Record a durably persisted snapshot and mark the component captured
    pub fn commit_capture(&mut self, prepared: PreparedSnapshot) -> Result<()> {
        match (&mut self.body, prepared) {
            (ComponentBody::Text(v), PreparedSnapshot::Text(s)) => {
                v.commit_snapshot(s);
            }
            (ComponentBody::Table(v), PreparedSnapshot::Table(s)) => {
                v.commit_snapshot(s);
            }
            (body, PreparedSnapshot::Text(_)) => return Err(mismatch(ComponentKind::Text, body.kind())),
            (body, PreparedSnapshot::Table(_)) => return Err(mismatch(ComponentKind::Table, body.kind())),
        }
        Ok(())
    }

    /// In-memory capture; the capture state is left alone
    pub fn make_snapshot(&mut self, description: &str, save_mode: SaveMode) -> Result<Uuid> {
        match &mut self.body {
            ComponentBody::Text(v) => Ok(v.make_snapshot(description, save_mode).id),
            ComponentBody::Table(v) => Ok(v.make_snapshot(description, save_mode).id),
            ComponentBody::Audio(_) => Err(not_versioned()),
        }
    }

    /// Overwrite content from a snapshot and log the restore
    pub fn revert_to_snapshot(&mut self, snapshot_id: Uuid) -> Result<()> {
        match &mut self.body {
            ComponentBody::Text(v) => v.revert_to_snapshot(snapshot_id)?,
            ComponentBody::Table(v) => v.revert_to_snapshot(snapshot_id)?,
            ComponentBody::Audio(_) => return Err(not_versioned()),
        }
        let content = self.content();
        self.record(Action::Restore(content));
        Ok(())
    }

    /// Revert to the snapshot a viewer is showing, if it is still there
    pub fn revert_viewed(&mut self, index: usize, expected_id: Uuid) -> Result<()> {
        self.ensure_viewed(index, expected_id)?;
        self.revert_to_snapshot(expected_id)
    }

    /// Fail with `SnapshotIdentityMismatch` if `expected_id` is not at `index`
    pub fn ensure_viewed(&self, index: usize, expected_id: Uuid) -> Result<()> {
        match &self.body {
            ComponentBody::Text(v) => v.viewed_snapshot(index, expected_id).map(|_| ()),
            ComponentBody::Table(v) => v.viewed_snapshot(index, expected_id).map(|_| ()),
            ComponentBody::Audio(_) => Err(not_versioned()),
        }
    }

    /// Whether a snapshot with this id is in the history
    pub fn has_snapshot(&self, snapshot_id: Uuid) -> bool {
        match &self.body {
            ComponentBody::Text(v) => v.snapshot(snapshot_id).is_some(),
            ComponentBody::Table(v) => v.snapshot(snapshot_id).is_some(),
            ComponentBody::Audio(_) => false,
        }
    }

    /// Drop a snapshot from the history
    pub fn remove_snapshot(&mut self, snapshot_id: Uuid) -> Result<SnapshotRemoval> {
        match &mut self.body {
            ComponentBody::Text(v) => v.remove_snapshot(snapshot_id),
            ComponentBody::Table(v) => v.remove_snapshot(snapshot_id),
            ComponentBody::Audio(_) => Err(not_versioned()),
        }
    }

    /// Whether the newest snapshot matches the live content
    pub fn is_in_sync(&self) -> bool {
        match &self.body {
            ComponentBody::Text(v) => v.is_in_sync(),
            ComponentBody::Table(v) => v.is_in_sync(),
            ComponentBody::Audio(_) => false,
        }
    }
}

fn mismatch(expected: ComponentKind, actual: ComponentKind) -> ArchiveError {
    ArchiveError::KindMismatch {
        expected: expected.as_str(),
        actual: actual.as_str(),
    }
}

fn not_versioned() -> ArchiveError {
    ArchiveError::KindMismatch {
        expected: "text or table",
        actual: ComponentKind::Audio.as_str(),
    }
}
