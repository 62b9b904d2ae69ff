//! Snapshot history for versioned components
//!
//! A [`Versioned<C>`] pairs live content with an ordered list of immutable
//! [`Snapshot`]s, newest first, and a [`CaptureState`]:
//!
//! ```text
//!             mutation / revert
//!   Captured ──────────────────▶ NeedsCapture
//!       ▲                            │
//!       └────── durable capture ─────┘
//! ```
//!
//! Capturing is split in two so persistence can sit in between:
//! [`Versioned::prepare_snapshot`] builds the snapshot value without touching
//! the history, and [`Versioned::commit_snapshot`] inserts it at the front and
//! marks the component captured once the write is durable.
//! [`Versioned::make_snapshot`] does the in-memory half only and leaves the
//! capture state alone.

use crate::content::{TableContent, TextContent};
use crate::error::{ArchiveError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, trace};
use uuid::Uuid;

/// How a snapshot was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SaveMode {
    /// Taken by a background/exit save
    Automatic,
    /// Taken on explicit user request
    Manual,
}

/// Whether live content has an up-to-date snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureState {
    /// Content changed since the last durable capture
    NeedsCapture,
    /// Newest snapshot holds the live content
    Captured,
}

/// Content that can be versioned
pub trait VersionedContent: Clone + Serialize {
    /// Whether a mutation that produced this content should flag the
    /// component for capture
    fn flags_capture(&self) -> bool;
}

impl VersionedContent for TextContent {
    /// An accidental full erase is not worth a snapshot
    fn flags_capture(&self) -> bool {
        !self.is_empty()
    }
}

impl VersionedContent for TableContent {
    fn flags_capture(&self) -> bool {
        true
    }
}

/// SHA-256 of the JSON form of some content, hex encoded
pub fn content_digest<C: Serialize>(content: &C) -> String {
    let mut hasher = Sha256::new();
    if let Ok(bytes) = serde_json::to_vec(content) {
        hasher.update(&bytes);
    }
    hex::encode(hasher.finalize())
}

/// Immutable capture of content plus metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<C> {
    /// Snapshot id
    pub id: Uuid,
    /// Capture time
    pub making_date: DateTime<Utc>,
    /// Free-text description
    pub description: String,
    /// Automatic or manual
    pub save_mode: SaveMode,
    /// Content at capture time
    pub content: C,
    /// Digest of `content`
    pub digest: String,
}

impl<C: Serialize> Snapshot<C> {
    /// Capture `content` now
    pub fn new(content: C, description: impl Into<String>, save_mode: SaveMode) -> Self {
        let digest = content_digest(&content);
        Self {
            id: Uuid::new_v4(),
            making_date: Utc::now(),
            description: description.into(),
            save_mode,
            content,
            digest,
        }
    }

    /// First 8 characters of the id
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }

    /// One-line description for listings
    pub fn display_format(&self) -> String {
        let mode = match self.save_mode {
            SaveMode::Automatic => "auto",
            SaveMode::Manual => "manual",
        };
        format!(
            "[{}] {} ({}){}",
            self.short_id(),
            self.making_date.format("%Y-%m-%d %H:%M:%S"),
            mode,
            if self.description.is_empty() {
                String::new()
            } else {
                format!(" - {}", self.description)
            }
        )
    }
}

/// Result of removing a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotRemoval {
    /// Where a viewer of the removed snapshot should look next
    pub next_viewed_index: Option<usize>,
    /// Position the snapshot occupied
    pub removed_index: usize,
}

/// Live content with snapshot history
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<C> {
    content: C,
    snapshots: Vec<Snapshot<C>>,
    capture_state: CaptureState,
}

impl<C: VersionedContent> Versioned<C> {
    /// Fresh history; nothing to capture until the first mutation
    pub fn new(content: C) -> Self {
        Self {
            content,
            snapshots: Vec::new(),
            capture_state: CaptureState::Captured,
        }
    }

    /// Rebuild from persisted parts; `snapshots` must be newest first
    pub fn from_parts(content: C, snapshots: Vec<Snapshot<C>>, capture_state: CaptureState) -> Self {
        Self {
            content,
            snapshots,
            capture_state,
        }
    }

    /// Live content
    pub fn content(&self) -> &C {
        &self.content
    }

    /// History, newest first
    pub fn snapshots(&self) -> &[Snapshot<C>] {
        &self.snapshots
    }

    /// Current capture state
    pub fn capture_state(&self) -> CaptureState {
        self.capture_state
    }

    /// Whether a capture is pending
    pub fn needs_capture(&self) -> bool {
        self.capture_state == CaptureState::NeedsCapture
    }

    /// Mutate the live content
    ///
    /// The component is flagged for capture when the resulting content says
    /// so (see [`VersionedContent::flags_capture`]).
    pub fn modify<R>(&mut self, f: impl FnOnce(&mut C) -> R) -> R {
        let result = f(&mut self.content);
        if self.content.flags_capture() {
            self.capture_state = CaptureState::NeedsCapture;
        }
        result
    }

    /// Build a snapshot of the live content without recording it
    pub fn prepare_snapshot(&self, description: impl Into<String>, save_mode: SaveMode) -> Snapshot<C> {
        Snapshot::new(self.content.clone(), description, save_mode)
    }

    /// Record a snapshot at the front of the history
    pub fn insert_snapshot(&mut self, snapshot: Snapshot<C>) -> &Snapshot<C> {
        trace!("Inserting snapshot {} at front", snapshot.id);
        self.snapshots.insert(0, snapshot);
        &self.snapshots[0]
    }

    /// Capture the live content into the history (capture state unchanged)
    pub fn make_snapshot(&mut self, description: impl Into<String>, save_mode: SaveMode) -> &Snapshot<C> {
        let snapshot = self.prepare_snapshot(description, save_mode);
        self.insert_snapshot(snapshot)
    }

    /// Record a durably persisted snapshot and mark the content captured
    pub fn commit_snapshot(&mut self, snapshot: Snapshot<C>) -> &Snapshot<C> {
        self.capture_state = CaptureState::Captured;
        self.insert_snapshot(snapshot)
    }

    /// Mark the content captured
    pub fn mark_captured(&mut self) {
        self.capture_state = CaptureState::Captured;
    }

    /// Snapshot by id
    pub fn snapshot(&self, id: Uuid) -> Option<&Snapshot<C>> {
        self.snapshots.iter().find(|s| s.id == id)
    }

    /// Position of a snapshot
    pub fn snapshot_index(&self, id: Uuid) -> Option<usize> {
        self.snapshots.iter().position(|s| s.id == id)
    }

    /// Overwrite live content with a snapshot's content
    ///
    /// The snapshot stays in the history; the component needs capture again.
    pub fn revert_to_snapshot(&mut self, id: Uuid) -> Result<()> {
        let snapshot = self.snapshot(id).ok_or(ArchiveError::SnapshotNotFound(id))?;
        self.content = snapshot.content.clone();
        self.capture_state = CaptureState::NeedsCapture;
        debug!("Reverted to snapshot {}", id);
        Ok(())
    }

    /// Remove a snapshot and tell a viewer where to look next
    pub fn remove_snapshot(&mut self, id: Uuid) -> Result<SnapshotRemoval> {
        let removed_index = self
            .snapshot_index(id)
            .ok_or(ArchiveError::SnapshotNotFound(id))?;
        self.snapshots.remove(removed_index);

        let remaining = self.snapshots.len();
        let next_viewed_index = if remaining == 0 {
            None
        } else if removed_index < remaining {
            Some(removed_index)
        } else {
            Some(remaining - 1)
        };
        debug!(
            "Removed snapshot {} at {}, next viewed {:?}",
            id, removed_index, next_viewed_index
        );
        Ok(SnapshotRemoval {
            next_viewed_index,
            removed_index,
        })
    }

    /// Snapshot at `index`, provided it is still the one the caller expects
    pub fn viewed_snapshot(&self, index: usize, expected_id: Uuid) -> Result<&Snapshot<C>> {
        match self.snapshots.get(index) {
            Some(snapshot) if snapshot.id == expected_id => Ok(snapshot),
            other => Err(ArchiveError::SnapshotIdentityMismatch {
                expected: expected_id,
                actual: other.map(|s| s.id),
            }),
        }
    }

    /// Revert to the snapshot a viewer is looking at, guarding against stale views
    pub fn revert_viewed(&mut self, index: usize, expected_id: Uuid) -> Result<()> {
        self.viewed_snapshot(index, expected_id)?;
        self.revert_to_snapshot(expected_id)
    }

    /// Whether the newest snapshot's digest matches the live content
    pub fn is_in_sync(&self) -> bool {
        self.snapshots
            .first()
            .is_some_and(|s| s.digest == content_digest(&self.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> TextContent {
        TextContent::new(s)
    }

    fn history(n: usize) -> (Versioned<TextContent>, Vec<Uuid>) {
        let mut v = Versioned::new(text("start"));
        let mut ids = Vec::new();
        for i in 0..n {
            v.modify(|c| c.set_text(format!("v{}", i)));
            ids.push(v.make_snapshot(format!("s{}", i), SaveMode::Manual).id);
        }
        ids.reverse();
        (v, ids)
    }

    #[test]
    fn test_make_snapshot_inserts_at_front() {
        let (v, ids) = history(3);
        assert_eq!(v.snapshots().len(), 3);
        assert_eq!(v.snapshots()[0].id, ids[0]);
        assert_eq!(v.snapshots()[0].content.text, "v2");
        // make_snapshot alone does not flip the state
        assert!(v.needs_capture());
    }

    #[test]
    fn test_text_erase_does_not_flag() {
        let mut v = Versioned::new(text("hello"));
        v.modify(|c| c.set_text(""));
        assert_eq!(v.capture_state(), CaptureState::Captured);
        v.modify(|c| c.set_text("again"));
        assert!(v.needs_capture());
    }

    #[test]
    fn test_table_always_flags() {
        let mut v = Versioned::new(TableContent::with_columns(["A"]));
        v.modify(|t| {
            t.edit_columns(Vec::new()).unwrap();
        });
        assert!(v.needs_capture());
    }

    #[test]
    fn test_revert_round_trip() {
        let mut v = Versioned::new(text("X"));
        let s1 = v.prepare_snapshot("first", SaveMode::Manual);
        let s1_id = s1.id;
        v.commit_snapshot(s1);
        assert!(v.is_in_sync());

        v.modify(|c| c.set_text("Y"));
        v.revert_to_snapshot(s1_id).unwrap();

        assert_eq!(v.content().text, "X");
        assert!(v.needs_capture());
        assert_eq!(v.snapshot(s1_id).unwrap().content.text, "X");
    }

    #[test]
    fn test_revert_missing_snapshot() {
        let (mut v, _) = history(1);
        let missing = Uuid::new_v4();
        let before = v.content().clone();
        assert!(matches!(
            v.revert_to_snapshot(missing),
            Err(ArchiveError::SnapshotNotFound(id)) if id == missing
        ));
        assert_eq!(v.content(), &before);
    }

    #[test]
    fn test_remove_snapshot_retargeting() {
        let (mut v, ids) = history(5);
        let r = v.remove_snapshot(ids[0]).unwrap();
        assert_eq!(r, SnapshotRemoval { next_viewed_index: Some(0), removed_index: 0 });

        let (mut v, ids) = history(5);
        let r = v.remove_snapshot(ids[4]).unwrap();
        assert_eq!(r, SnapshotRemoval { next_viewed_index: Some(3), removed_index: 4 });

        let (mut v, ids) = history(1);
        let r = v.remove_snapshot(ids[0]).unwrap();
        assert_eq!(r.next_viewed_index, None);
        assert!(matches!(
            v.remove_snapshot(ids[0]),
            Err(ArchiveError::SnapshotNotFound(_))
        ));
    }

    #[test]
    fn test_viewed_snapshot_identity() {
        let (mut v, ids) = history(2);
        assert!(v.viewed_snapshot(1, ids[1]).is_ok());
        v.remove_snapshot(ids[0]).unwrap();
        assert!(matches!(
            v.viewed_snapshot(1, ids[1]),
            Err(ArchiveError::SnapshotIdentityMismatch { actual: None, .. })
        ));
        assert!(matches!(
            v.revert_viewed(0, ids[0]),
            Err(ArchiveError::SnapshotIdentityMismatch { actual: Some(_), .. })
        ));
    }
}
