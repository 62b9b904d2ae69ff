//! Error types for the folio library
//!
//! Every fallible operation in the crate returns [`Result<T>`], whose error
//! side is [`ArchiveError`]. Versioning errors (`SnapshotNotFound`,
//! `SnapshotIdentityMismatch`) are recoverable and never leave a component in a
//! partially modified state. Persistence errors surface as `StoreUnavailable`
//! and leave the pending action log entry in place so the caller can retry.

use crate::store::EntityKind;
use thiserror::Error;
use uuid::Uuid;

/// Type alias for Results in the folio library
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Main error type for all folio operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Requested snapshot id is absent from a component's history
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(Uuid),

    /// The snapshot the caller believes it is viewing is not the one at that position
    #[error("Snapshot identity mismatch - expected: {expected}, actual: {actual:?}")]
    SnapshotIdentityMismatch {
        /// Snapshot id the caller remembered
        expected: Uuid,
        /// Snapshot id actually found at the viewed index (None if out of range)
        actual: Option<Uuid>,
    },

    /// Persistence transport could not be reached or the transaction failed
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A move or insert referenced a parent directory that no longer exists
    #[error("Parent directory not found: {0}")]
    ParentNotFound(Uuid),

    /// Storage item (directory or page) not found in the archive
    #[error("Item not found: {0}")]
    ItemNotFound(Uuid),

    /// Component not found on a page
    #[error("Component not found: {0}")]
    ComponentNotFound(Uuid),

    /// Table row not found
    #[error("Row not found: {0}")]
    RowNotFound(Uuid),

    /// Table column not found
    #[error("Column not found: {0}")]
    ColumnNotFound(Uuid),

    /// Audio track not found
    #[error("Track not found: {0}")]
    TrackNotFound(Uuid),

    /// Persisted record missing during a write
    #[error("Record not found: {kind:?} {id}")]
    RecordNotFound {
        /// Kind of the missing record
        kind: EntityKind,
        /// Identifier of the missing record
        id: Uuid,
    },

    /// Positional argument out of range
    #[error("Index {index} out of bounds (len {len})")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Length of the collection
        len: usize,
    },

    /// Operation applied to the wrong kind of component or item
    #[error("Kind mismatch - expected: {expected}, actual: {actual}")]
    KindMismatch {
        /// Kind the operation requires
        expected: &'static str,
        /// Kind that was found
        actual: &'static str,
    },

    /// Content edit rejected before it touched any state
    #[error("Invalid edit: {0}")]
    InvalidEdit(String),

    /// Hierarchy move rejected (cycle, system directory, ...)
    #[error("Invalid move: {0}")]
    InvalidMove(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Audio collaborator failure
    #[error("Media error: {0}")]
    Media(String),

    /// Background write worker is gone
    #[error("Sync worker stopped")]
    SyncWorkerStopped,

    /// I/O errors during store file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors during bincode serialization/deserialization
    #[error("Bincode error: {0}")]
    Bincode(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<bincode::error::DecodeError> for ArchiveError {
    fn from(err: bincode::error::DecodeError) -> Self {
        ArchiveError::Bincode(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for ArchiveError {
    fn from(err: bincode::error::EncodeError) -> Self {
        ArchiveError::Bincode(err.to_string())
    }
}

impl ArchiveError {
    /// Create a store error with a custom message
    pub fn store(msg: impl Into<String>) -> Self {
        ArchiveError::StoreUnavailable(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        ArchiveError::Internal(msg.into())
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors leave in-memory state untouched; retrying the same
    /// call (or refreshing a stale UI reference) is meaningful.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ArchiveError::StoreUnavailable(_)
                | ArchiveError::SnapshotNotFound(_)
                | ArchiveError::SnapshotIdentityMismatch { .. }
                | ArchiveError::Io(_)
        )
    }

    /// Check if this error came from the persistence layer
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            ArchiveError::StoreUnavailable(_)
                | ArchiveError::RecordNotFound { .. }
                | ArchiveError::SyncWorkerStopped
                | ArchiveError::Io(_)
                | ArchiveError::Json(_)
                | ArchiveError::Bincode(_)
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            ArchiveError::SnapshotNotFound(id) => {
                format!("Snapshot '{}' no longer exists. Refresh the history list.", id)
            }
            ArchiveError::SnapshotIdentityMismatch { .. } => {
                "The snapshot being viewed changed underneath you. Reopen the history view.".to_string()
            }
            ArchiveError::StoreUnavailable(msg) => {
                format!("Could not save changes ({}). Your edit is kept and can be retried.", msg)
            }
            ArchiveError::ParentNotFound(id) => {
                format!("Directory '{}' no longer exists.", id)
            }
            _ => self.to_string(),
        }
    }
}
