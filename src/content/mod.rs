//! Component content value types
//!
//! Content is pure value data: cloning a content value is how snapshots
//! capture it, and serializing it is how records and digests are produced.
//!
//! - [`TextContent`]: a single text blob
//! - [`TableContent`]: columns, rows and a cell per row×column pair
//! - [`AudioContent`]: an ordered track list with a sort mode

pub mod audio;
pub mod table;
pub mod text;

pub use audio::{AudioContent, Track, TrackMetadata, TrackSort};
pub use table::{Column, ColumnEdit, Row, TableContent, TableSortBy};
pub use text::TextContent;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a component, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    /// Free text
    Text,
    /// Spreadsheet-like table
    Table,
    /// Audio playlist
    Audio,
}

impl ComponentKind {
    /// Lowercase name used in messages and the CLI
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Text => "text",
            ComponentKind::Table => "table",
            ComponentKind::Audio => "audio",
        }
    }

    /// Whether components of this kind keep a snapshot history
    pub fn is_versioned(&self) -> bool {
        matches!(self, ComponentKind::Text | ComponentKind::Table)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of any component kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComponentContent {
    /// Text payload
    Text(TextContent),
    /// Table payload
    Table(TableContent),
    /// Audio payload
    Audio(AudioContent),
}

impl ComponentContent {
    /// Empty content of the given kind
    pub fn empty(kind: ComponentKind) -> Self {
        match kind {
            ComponentKind::Text => ComponentContent::Text(TextContent::default()),
            ComponentKind::Table => ComponentContent::Table(TableContent::default()),
            ComponentKind::Audio => ComponentContent::Audio(AudioContent::default()),
        }
    }

    /// Kind of this payload
    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentContent::Text(_) => ComponentKind::Text,
            ComponentContent::Table(_) => ComponentKind::Table,
            ComponentContent::Audio(_) => ComponentKind::Audio,
        }
    }
}

impl From<TextContent> for ComponentContent {
    fn from(content: TextContent) -> Self {
        ComponentContent::Text(content)
    }
}

impl From<TableContent> for ComponentContent {
    fn from(content: TableContent) -> Self {
        ComponentContent::Table(content)
    }
}

impl From<AudioContent> for ComponentContent {
    fn from(content: AudioContent) -> Self {
        ComponentContent::Audio(content)
    }
}
