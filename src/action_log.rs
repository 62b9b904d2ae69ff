//! Per-component log of semantic edits awaiting persistence
//!
//! Every edit made through [`Component`](crate::component::Component) pushes
//! one [`Action`] describing what changed. The synchronizer drains the log
//! front to back, turning each entry into one targeted store write, and pops
//! an entry only once its write has committed. A failed write leaves the entry
//! (and everything queued behind it) in place for a retry.
//!
//! The in-memory content stays the source of truth for reads; the log only
//! spares the synchronizer from diffing against the persisted record.

use crate::content::{Column, ComponentContent, Row, Track, TrackMetadata, TrackSort};
use std::collections::VecDeque;
use uuid::Uuid;

/// One semantic edit
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Text replaced wholesale
    ReplaceText(String),
    /// Empty row appended to a table
    AppendRow(Row),
    /// Empty column appended to a table
    AppendColumn(Column),
    /// Table row removed
    RemoveRow(Uuid),
    /// Columns reordered, renamed and pruned; the new ordered list
    EditColumns(Vec<Column>),
    /// One cell changed
    EditCell {
        /// Row of the cell
        row_id: Uuid,
        /// Column of the cell
        column_id: Uuid,
        /// New value
        value: String,
    },
    /// Block of cells pasted into one row
    InsertCells {
        /// Target row
        row_id: Uuid,
        /// Column of the first value; the rest follow in display order
        first_column: Uuid,
        /// Pasted values
        values: Vec<String>,
    },
    /// Tracks added; `indices` are their positions after the insert
    AppendTracks {
        /// Final positions, ascending
        indices: Vec<usize>,
        /// Added tracks
        tracks: Vec<Track>,
    },
    /// Track removed
    RemoveTrack(Uuid),
    /// Track metadata changed
    EditTrackMetadata {
        /// Edited track
        id: Uuid,
        /// Fields that changed
        fields: TrackMetadata,
        /// Track position after the edit
        new_index: usize,
    },
    /// Playlist re-sorted; carries the resolved order
    SortTracks {
        /// New sort mode
        mode: TrackSort,
        /// Track ids in their final order
        order: Vec<Uuid>,
    },
    /// Track moved by hand
    MoveTrack {
        /// Source position
        src: usize,
        /// Destination position
        dst: usize,
        /// Moved track
        track_id: Uuid,
    },
    /// Content overwritten from a snapshot
    Restore(ComponentContent),
}

impl Action {
    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            Action::ReplaceText(_) => "replace-text",
            Action::AppendRow(_) => "append-row",
            Action::AppendColumn(_) => "append-column",
            Action::RemoveRow(_) => "remove-row",
            Action::EditColumns(_) => "edit-columns",
            Action::EditCell { .. } => "edit-cell",
            Action::InsertCells { .. } => "insert-cells",
            Action::AppendTracks { .. } => "append-tracks",
            Action::RemoveTrack(_) => "remove-track",
            Action::EditTrackMetadata { .. } => "edit-track-metadata",
            Action::SortTracks { .. } => "sort-tracks",
            Action::MoveTrack { .. } => "move-track",
            Action::Restore(_) => "restore",
        }
    }
}

/// Ordered queue of edits not yet persisted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionLog {
    pending: VecDeque<Action>,
}

impl ActionLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an edit
    pub fn push(&mut self, action: Action) {
        self.pending.push_back(action);
    }

    /// Oldest unsynced edit
    pub fn front(&self) -> Option<&Action> {
        self.pending.front()
    }

    /// Newest edit
    pub fn back(&self) -> Option<&Action> {
        self.pending.back()
    }

    /// Consume the oldest edit once it is durable
    pub fn pop_front(&mut self) -> Option<Action> {
        self.pending.pop_front()
    }

    /// Pending edits, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.pending.iter()
    }

    /// Number of pending edits
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether everything has been persisted
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop all pending edits
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_keeps_order() {
        let mut log = ActionLog::new();
        let row = Row::new();
        log.push(Action::AppendRow(row.clone()));
        log.push(Action::RemoveRow(row.id));

        assert_eq!(log.len(), 2);
        assert_eq!(log.front().map(Action::label), Some("append-row"));
        assert_eq!(log.back().map(Action::label), Some("remove-row"));

        assert_eq!(log.pop_front(), Some(Action::AppendRow(row)));
        assert_eq!(log.len(), 1);
        log.clear();
        assert!(log.is_empty());
    }
}
