//! # Folio - Versioned document archive
//!
//! A library for hierarchical document archives whose content keeps a
//! snapshot history and is persisted through minimal, edit-scoped writes.
//!
//! ## Overview
//!
//! Folio organizes content as a tree and versions it per component:
//! - Directories hold pages and other directories, kept sorted under a
//!   per-directory criterion that can be swapped at runtime
//! - Pages hold typed components: free text, tables and audio playlists
//! - Text and table components keep a newest-first history of immutable
//!   snapshots that can be captured, reverted to and removed
//! - Every edit is recorded in the component's action log and written to the
//!   store as the smallest change that reproduces it
//!
//! ## Architecture
//!
//! - **Sorted containers**: stable inserts and re-sorts that report every
//!   item's `(old_index, new_index)` move so a UI can animate instead of reload
//! - **Arena hierarchy**: all directories and pages live in one table keyed by
//!   id; parents are ids, so there are no back-pointers to keep alive
//! - **Versioned content**: a capture-state machine (`Captured` ⇄
//!   `NeedsCapture`) guards when a snapshot is due
//! - **Serialized synchronizer**: one background worker applies writes in
//!   issue order, each in a single all-or-nothing transaction
//! - **Pluggable persistence**: anything implementing [`PersistenceService`]
//!   can back an archive; [`MemoryStore`] and [`FileStore`] ship with the crate
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use folio::{ArchiveConfig, Component, ComponentKind, MemoryStore, SaveMode, Synchronizer};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ArchiveConfig::default();
//! let store = Arc::new(MemoryStore::new());
//! let mut archive = folio::hydrate::open_archive(store.as_ref(), &config)?;
//! let sync = Synchronizer::spawn(store);
//!
//! // Create a page under the main directory
//! let (page_id, _) = archive.create_page(config.system.main, "Notes", false)?;
//! sync.create_item(&archive, page_id).await?;
//!
//! // Add a text component and edit it
//! let mut note = Component::empty("Idea", ComponentKind::Text);
//! sync.add_component(page_id, &mut note).await?;
//! note.set_text("first draft")?;
//! sync.sync_content_change(&mut note).await?;
//!
//! // Capture a snapshot
//! let snapshot = sync.capture_snapshot(&mut note, "draft", SaveMode::Manual).await?;
//! println!("Captured {}", snapshot);
//! # Ok(())
//! # }
//! ```
//!
//! ## Advanced Usage
//!
//! ### Configuring an archive on disk
//!
//! ```rust,no_run
//! use folio::{ArchiveBuilder, FileStore, StoreFormat};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = Path::new("./my_archive");
//! let config = ArchiveBuilder::new()
//!     .store_format(StoreFormat::Bincode)
//!     .trash_name("Bin")
//!     .auto_capture_description("autosave")
//!     .build(dir)?;
//!
//! let store = FileStore::open(config.store_file(dir), config.store_format)?;
//! let archive = folio::hydrate::open_archive(&store, &config)?;
//! println!("{} items", archive.len());
//! # Ok(())
//! # }
//! ```
//!
//! ### Saving on exit
//!
//! ```rust,no_run
//! # use folio::{Archive, Synchronizer};
//! # async fn on_exit(sync: &Synchronizer, archive: &mut Archive) -> folio::Result<()> {
//! // Components that are already captured are skipped, so this is safe to
//! // call unconditionally.
//! let report = sync.capture_all_pending(archive.components_mut()).await?;
//! println!("captured {}, skipped {}", report.captured, report.skipped);
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Concepts
//!
//! ### Snapshots
//!
//! A snapshot is an immutable copy of a component's content with:
//! - Unique identifier (UUID)
//! - Capture time and description
//! - Save mode (automatic or manual)
//! - SHA-256 digest of the content
//!
//! Snapshots are listed newest first. Removing one reports which index a
//! viewer of the removed snapshot should look at next.
//!
//! ### Action log
//!
//! Each component queues its pending edits. The synchronizer turns the
//! oldest entry into a [`PlannedWrite`](sync::PlannedWrite), commits it and
//! only then pops the entry. A failed write leaves the entry queued, so the
//! caller can retry the same write.
//!
//! ### System directories
//!
//! The main and trash directories are identified by ids stored in
//! [`ArchiveConfig`]. They cannot be moved or removed and are created on
//! first open.
//!
//! ## Error Handling
//!
//! All operations return `Result<T, ArchiveError>`. Versioning errors are
//! recoverable and never leave a component half-modified; persistence errors
//! surface as [`ArchiveError::StoreUnavailable`] and keep pending edits queued.
//!
//! ## Module Organization
//!
//! - [`sort`] and [`container`]: sort criteria and the sorted container
//! - [`content`]: text, table and audio payloads
//! - [`snapshot`]: snapshots and the capture-state machine
//! - [`action_log`]: pending edit records
//! - [`component`]: components on a page
//! - [`hierarchy`]: directories, pages and the archive arena
//! - [`store`]: the persistence contract and its implementations
//! - [`sync`]: the write worker
//! - [`hydrate`]: loading an archive from a store
//! - [`media`]: the audio file collaborator
//! - [`config`]: archive settings
//! - [`error`]: error types and handling

// Public API modules
pub mod action_log;
pub mod component;
pub mod config;
pub mod container;
pub mod content;
pub mod error;
pub mod hierarchy;
pub mod hydrate;
pub mod media;
pub mod snapshot;
pub mod sort;
pub mod store;
pub mod sync;

// Internal modules (not part of public API)
mod collections;

// Re-export main types for convenience
pub use action_log::{Action, ActionLog};
pub use component::{Component, ComponentBody, SnapshotInfo};
pub use config::{ArchiveBuilder, ArchiveConfig, StoreFormat, SystemDirectories};
pub use container::SortedContainer;
pub use content::{
    AudioContent, Column, ComponentContent, ComponentKind, Row, TableContent, TableSortBy,
    TextContent, Track, TrackMetadata, TrackSort,
};
pub use error::{ArchiveError, Result};
pub use hierarchy::{Archive, Directory, ItemKind, Page, StorageItem};
pub use media::AudioLibrary;
pub use snapshot::{CaptureState, SaveMode, Snapshot, SnapshotRemoval, Versioned};
pub use sort::{IndexMove, SortCriterion, SortKey, SortOrder, Sortable};
pub use store::{FileStore, MemoryStore, PersistenceService, TxOutcome};
pub use sync::{CaptureReport, Synchronizer};

#[cfg(test)]
mod tests;
