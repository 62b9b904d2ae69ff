//! Persisted record shapes
//!
//! Records are what the persistence service stores; they are plain serde
//! structs joined to in-memory entities by id. Table rows keep their cells as
//! a list aligned with the column list, so a column edit on a record is a
//! permutation of every row's cell list.

use crate::component::{Component, ComponentBody, PreparedSnapshot};
use crate::content::{
    AudioContent, Column, ComponentContent, ComponentKind, Row, TableContent, TableSortBy,
    TextContent, Track, TrackSort,
};
use crate::hierarchy::{Directory, ItemKind, Page};
use crate::snapshot::{CaptureState, SaveMode, Snapshot};
use crate::sort::SortOrder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Kind of a persisted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    /// [`DirectoryRecord`]
    Directory,
    /// [`PageRecord`]
    Page,
    /// [`ComponentRecord`]
    Component,
    /// [`SnapshotRecord`]
    Snapshot,
}

impl From<ItemKind> for EntityKind {
    fn from(kind: ItemKind) -> Self {
        match kind {
            ItemKind::Directory => EntityKind::Directory,
            ItemKind::Page => EntityKind::Page,
        }
    }
}

/// Stored directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    /// Directory id
    pub id: Uuid,
    /// Name
    pub name: String,
    /// Creation time
    pub creation_date: DateTime<Utc>,
    /// Parent directory; `None` for roots
    pub parent: Option<Uuid>,
    /// Child sort criterion
    pub sort: SortOrder,
}

impl From<&Directory> for DirectoryRecord {
    fn from(d: &Directory) -> Self {
        Self {
            id: d.id,
            name: d.name.clone(),
            creation_date: d.creation_date,
            parent: d.parent,
            sort: d.sort_order(),
        }
    }
}

/// Stored page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Page id
    pub id: Uuid,
    /// Name
    pub name: String,
    /// Creation time
    pub creation_date: DateTime<Utc>,
    /// Owning directory
    pub parent: Uuid,
    /// Single-component flag
    pub is_single_component_page: bool,
}

impl From<&Page> for PageRecord {
    fn from(p: &Page) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            creation_date: p.creation_date,
            parent: p.parent,
            is_single_component_page: p.is_single_component_page,
        }
    }
}

/// Stored table row: metadata plus cells aligned with the column list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRecord {
    /// Row metadata
    pub row: Row,
    /// One value per column, in column order
    pub cells: Vec<String>,
}

/// Stored table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    /// Columns in order
    pub columns: Vec<Column>,
    /// Rows in insertion order
    pub rows: Vec<RowRecord>,
    /// Row presentation order
    pub sort_by: TableSortBy,
}

impl TableRecord {
    /// Position of a column
    pub fn column_position(&self, id: Uuid) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    /// Row by id, mutable
    pub fn row_mut(&mut self, id: Uuid) -> Option<&mut RowRecord> {
        self.rows.iter_mut().find(|r| r.row.id == id)
    }
}

impl From<&TableContent> for TableRecord {
    fn from(table: &TableContent) -> Self {
        Self {
            columns: table.columns().to_vec(),
            rows: table
                .rows()
                .iter()
                .map(|row| RowRecord {
                    row: row.clone(),
                    cells: table.row_values(row.id).unwrap_or_default(),
                })
                .collect(),
            sort_by: table.sort_by(),
        }
    }
}

impl From<TableRecord> for TableContent {
    fn from(record: TableRecord) -> Self {
        TableContent::from_positional(
            record.columns,
            record.rows.into_iter().map(|r| (r.row, r.cells)).collect(),
            record.sort_by,
        )
    }
}

/// Stored playlist
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioRecord {
    /// Tracks in authoritative order
    pub tracks: Vec<Track>,
    /// Sort mode
    pub sort_by: TrackSort,
}

impl AudioRecord {
    /// Position of a track
    pub fn position_of(&self, id: Uuid) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }
}

/// Kind-specific stored payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComponentData {
    /// Text field
    Text(String),
    /// Positional table
    Table(TableRecord),
    /// Track list
    Audio(AudioRecord),
}

impl ComponentData {
    /// Kind of this payload
    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentData::Text(_) => ComponentKind::Text,
            ComponentData::Table(_) => ComponentKind::Table,
            ComponentData::Audio(_) => ComponentKind::Audio,
        }
    }
}

impl From<&ComponentContent> for ComponentData {
    fn from(content: &ComponentContent) -> Self {
        match content {
            ComponentContent::Text(t) => ComponentData::Text(t.text.clone()),
            ComponentContent::Table(t) => ComponentData::Table(TableRecord::from(t)),
            ComponentContent::Audio(a) => ComponentData::Audio(AudioRecord {
                tracks: a.tracks().to_vec(),
                sort_by: a.sort_by(),
            }),
        }
    }
}

impl From<ComponentData> for ComponentContent {
    fn from(data: ComponentData) -> Self {
        match data {
            ComponentData::Text(text) => ComponentContent::Text(TextContent::new(text)),
            ComponentData::Table(table) => ComponentContent::Table(table.into()),
            ComponentData::Audio(audio) => {
                ComponentContent::Audio(AudioContent::from_parts(audio.tracks, audio.sort_by))
            }
        }
    }
}

/// Stored component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// Component id
    pub id: Uuid,
    /// Owning page
    pub page: Uuid,
    /// Title
    pub title: String,
    /// Creation time
    pub creation_date: DateTime<Utc>,
    /// Position on the page
    pub rendering_order: usize,
    /// Collapsed display flag
    pub is_minimum_height: bool,
    /// Capture state (always captured for audio)
    pub capture_state: CaptureState,
    /// Payload
    pub data: ComponentData,
}

impl ComponentRecord {
    /// Record for a component on `page`
    pub fn from_component(page: Uuid, component: &Component) -> Self {
        Self {
            id: component.id,
            page,
            title: component.title.clone(),
            creation_date: component.creation_date,
            rendering_order: component.rendering_order,
            is_minimum_height: component.is_minimum_height,
            capture_state: component.capture_state().unwrap_or(CaptureState::Captured),
            data: ComponentData::from(&component.content()),
        }
    }
}

/// Stored snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Snapshot id
    pub id: Uuid,
    /// Owning component
    pub component: Uuid,
    /// Capture time
    pub making_date: DateTime<Utc>,
    /// Description
    pub description: String,
    /// Automatic or manual
    pub save_mode: SaveMode,
    /// Captured content
    pub content: ComponentContent,
    /// Digest of the content
    pub digest: String,
    /// Capture order within the component; breaks ties between equal dates
    #[serde(default)]
    pub sequence: u64,
}

impl SnapshotRecord {
    fn from_snapshot<C: Clone + Into<ComponentContent>>(
        component: Uuid,
        s: &Snapshot<C>,
        sequence: u64,
    ) -> Self {
        Self {
            id: s.id,
            component,
            making_date: s.making_date,
            description: s.description.clone(),
            save_mode: s.save_mode,
            content: s.content.clone().into(),
            digest: s.digest.clone(),
            sequence,
        }
    }

    /// Record for a prepared capture of `component`
    ///
    /// The sequence is assigned when the record is written.
    pub fn from_prepared(component: Uuid, prepared: &PreparedSnapshot) -> Self {
        match prepared {
            PreparedSnapshot::Text(s) => Self::from_snapshot(component, s, 0),
            PreparedSnapshot::Table(s) => Self::from_snapshot(component, s, 0),
        }
    }

    /// Every snapshot record held by an in-memory component
    pub fn all_for(component: &Component) -> Vec<Self> {
        match component.body() {
            ComponentBody::Text(v) => Self::numbered(component.id, v.snapshots()),
            ComponentBody::Table(v) => Self::numbered(component.id, v.snapshots()),
            ComponentBody::Audio(_) => Vec::new(),
        }
    }

    // newest first in memory, so the oldest gets sequence 0
    fn numbered<C: Clone + Into<ComponentContent>>(component: Uuid, snapshots: &[Snapshot<C>]) -> Vec<Self> {
        let count = snapshots.len() as u64;
        snapshots
            .iter()
            .zip((0..count).rev())
            .map(|(s, sequence)| Self::from_snapshot(component, s, sequence))
            .collect()
    }

    /// Newest-first ordering: later capture date, then higher sequence
    pub fn newest_first(a: &Self, b: &Self) -> Ordering {
        b.making_date
            .cmp(&a.making_date)
            .then_with(|| b.sequence.cmp(&a.sequence))
    }
}

/// Any persisted record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entity {
    /// Directory record
    Directory(DirectoryRecord),
    /// Page record
    Page(PageRecord),
    /// Component record
    Component(ComponentRecord),
    /// Snapshot record
    Snapshot(SnapshotRecord),
}

impl Entity {
    /// Record id
    pub fn id(&self) -> Uuid {
        match self {
            Entity::Directory(r) => r.id,
            Entity::Page(r) => r.id,
            Entity::Component(r) => r.id,
            Entity::Snapshot(r) => r.id,
        }
    }

    /// Record kind
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Directory(_) => EntityKind::Directory,
            Entity::Page(_) => EntityKind::Page,
            Entity::Component(_) => EntityKind::Component,
            Entity::Snapshot(_) => EntityKind::Snapshot,
        }
    }

    /// Owning record: parent directory, page or component
    pub fn owner(&self) -> Option<Uuid> {
        match self {
            Entity::Directory(r) => r.parent,
            Entity::Page(r) => Some(r.parent),
            Entity::Component(r) => Some(r.page),
            Entity::Snapshot(r) => Some(r.component),
        }
    }

    /// Storage key
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.kind(), self.id())
    }
}

/// Kind-qualified record id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    /// Record kind
    pub kind: EntityKind,
    /// Record id
    pub id: Uuid,
}

impl RecordKey {
    /// Key for `kind`/`id`
    pub fn new(kind: EntityKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

/// Selection of records by kind and owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query {
    /// Kind to select
    pub kind: EntityKind,
    /// Required owner, if any
    pub owner: Option<Uuid>,
}

impl Query {
    /// Every record of a kind
    pub fn all(kind: EntityKind) -> Self {
        Self { kind, owner: None }
    }

    /// Records of a kind owned by `owner`
    pub fn owned_by(kind: EntityKind, owner: Uuid) -> Self {
        Self {
            kind,
            owner: Some(owner),
        }
    }

    /// Whether a record matches
    pub fn matches(&self, entity: &Entity) -> bool {
        entity.kind() == self.kind && self.owner.is_none_or(|owner| entity.owner() == Some(owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_dates_order_by_sequence() {
        let mut note = Component::new("n", TextContent::default());
        for i in 0..3 {
            note.set_text(format!("v{}", i)).unwrap();
            note.make_snapshot("", SaveMode::Manual).unwrap();
        }
        let mut records = SnapshotRecord::all_for(&note);
        let newest = records[0].id;
        let stamp = records[0].making_date;
        for r in records.iter_mut() {
            r.making_date = stamp;
        }
        records.reverse();
        records.sort_by(SnapshotRecord::newest_first);

        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let memory: Vec<Uuid> = note.snapshot_infos().iter().map(|s| s.id).collect();
        assert_eq!(ids, memory);
        assert_eq!(ids[0], newest);
        assert_eq!(records[0].sequence, 2);
    }

    #[test]
    fn test_table_record_is_positional() {
        let mut table = TableContent::with_columns(["A", "B"]);
        let row = table.append_row();
        let b = table.columns()[1].id;
        table.edit_cell(row.id, b, "bee").unwrap();

        let record = TableRecord::from(&table);
        assert_eq!(record.rows[0].cells, vec!["", "bee"]);

        let back: TableContent = record.into();
        assert_eq!(back.cell(row.id, b), Some("bee"));
        assert!(back.is_consistent());
    }

    #[test]
    fn test_query_matching() {
        let page = Uuid::new_v4();
        let component = Component::empty("c", ComponentKind::Text);
        let entity = Entity::Component(ComponentRecord::from_component(page, &component));

        assert!(Query::all(EntityKind::Component).matches(&entity));
        assert!(Query::owned_by(EntityKind::Component, page).matches(&entity));
        assert!(!Query::owned_by(EntityKind::Component, Uuid::new_v4()).matches(&entity));
        assert!(!Query::all(EntityKind::Page).matches(&entity));
        assert_eq!(entity.key(), RecordKey::new(EntityKind::Component, component.id));
    }
}
