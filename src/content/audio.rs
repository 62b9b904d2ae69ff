//! Audio playlist content
//!
//! Only track metadata lives here; audio bytes stay with the media
//! collaborator (see [`crate::media`]). Under [`TrackSort::Name`] and
//! [`TrackSort::CreateDate`] the track list is kept sorted by the in-memory
//! comparator; under [`TrackSort::Manual`] the list order is authoritative and
//! only explicit moves change it.

use crate::error::{ArchiveError, Result};
use crate::sort::{IndexMove, SortCriterion, SortOrder, Sortable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata of one audio track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Track id
    pub id: Uuid,
    /// Title (sort key under name sort)
    pub title: String,
    /// Artist
    pub artist: String,
    /// Encoded artwork, if any
    pub thumbnail: Option<Vec<u8>>,
    /// Lyrics
    pub lyrics: String,
    /// Extension of the backing audio file
    pub file_extension: String,
    /// When the track was added
    pub create_date: DateTime<Utc>,
}

impl Track {
    /// Create a track with a fresh id stamped now
    pub fn new(title: impl Into<String>, file_extension: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            artist: String::new(),
            thumbnail: None,
            lyrics: String::new(),
            file_extension: file_extension.into(),
            create_date: Utc::now(),
        }
    }

    /// Builder-style artist setter
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }
}

impl Sortable for Track {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.title
    }

    fn set_name(&mut self, name: String) {
        self.title = name;
    }

    fn creation_date(&self) -> DateTime<Utc> {
        self.create_date
    }
}

/// Partial metadata update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// New title
    pub title: Option<String>,
    /// New artist
    pub artist: Option<String>,
    /// New artwork
    pub thumbnail: Option<Vec<u8>>,
    /// New lyrics
    pub lyrics: Option<String>,
}

impl TrackMetadata {
    /// Whether the update changes nothing
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.artist.is_none() && self.thumbnail.is_none() && self.lyrics.is_none()
    }

    /// Apply the present fields to a track
    pub fn apply_to(&self, track: &mut Track) {
        if let Some(title) = &self.title {
            track.title = title.clone();
        }
        if let Some(artist) = &self.artist {
            track.artist = artist.clone();
        }
        if let Some(thumbnail) = &self.thumbnail {
            track.thumbnail = Some(thumbnail.clone());
        }
        if let Some(lyrics) = &self.lyrics {
            track.lyrics = lyrics.clone();
        }
    }
}

/// Track order of a playlist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackSort {
    /// By title
    Name,
    /// By date added
    #[default]
    CreateDate,
    /// User-controlled order
    Manual,
}

impl TrackSort {
    fn criterion(self) -> Option<SortOrder> {
        match self {
            TrackSort::Name => Some(SortOrder::by_name()),
            TrackSort::CreateDate => Some(SortOrder::by_creation_date()),
            TrackSort::Manual => None,
        }
    }
}

/// Ordered track list with a sort mode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioContent {
    tracks: Vec<Track>,
    sort_by: TrackSort,
}

impl AudioContent {
    /// Empty playlist
    pub fn new(sort_by: TrackSort) -> Self {
        Self {
            tracks: Vec::new(),
            sort_by,
        }
    }

    /// Rebuild a playlist from stored order without re-sorting
    pub fn from_parts(tracks: Vec<Track>, sort_by: TrackSort) -> Self {
        Self { tracks, sort_by }
    }

    /// Tracks in playlist order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Current sort mode
    pub fn sort_by(&self) -> TrackSort {
        self.sort_by
    }

    /// Track by id
    pub fn track(&self, id: Uuid) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Position of a track
    pub fn position_of(&self, id: Uuid) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    /// Add tracks at their sorted positions (appended under manual order)
    ///
    /// Returns the final positions of the added tracks, ascending.
    pub fn append_tracks(&mut self, tracks: Vec<Track>) -> Vec<usize> {
        let ids: Vec<Uuid> = tracks.iter().map(|t| t.id).collect();
        match self.sort_by.criterion() {
            None => self.tracks.extend(tracks),
            Some(criterion) => {
                for track in tracks {
                    let index = self
                        .tracks
                        .partition_point(|existing| !criterion.sorts_before(&track, existing));
                    self.tracks.insert(index, track);
                }
            }
        }
        let mut indices: Vec<usize> = ids.iter().filter_map(|id| self.position_of(*id)).collect();
        indices.sort_unstable();
        indices
    }

    /// Remove a track, returning its former position
    pub fn remove_track(&mut self, id: Uuid) -> Result<(usize, Track)> {
        let index = self.position_of(id).ok_or(ArchiveError::TrackNotFound(id))?;
        Ok((index, self.tracks.remove(index)))
    }

    /// Update metadata; re-positions the track if its sort key changed
    ///
    /// Returns the track's position after the update.
    pub fn edit_track_metadata(&mut self, id: Uuid, fields: &TrackMetadata) -> Result<usize> {
        let index = self.position_of(id).ok_or(ArchiveError::TrackNotFound(id))?;
        fields.apply_to(&mut self.tracks[index]);
        if self.sort_by == TrackSort::Name && fields.title.is_some() {
            self.resort();
        }
        self.position_of(id)
            .ok_or_else(|| ArchiveError::internal("track vanished during re-sort"))
    }

    /// Switch sort mode and re-sort, reporting every track's move
    ///
    /// Switching to manual keeps the current order.
    pub fn sort_tracks(&mut self, mode: TrackSort) -> Vec<IndexMove> {
        let before: Vec<Uuid> = self.tracks.iter().map(|t| t.id).collect();
        self.sort_by = mode;
        self.resort();
        before
            .iter()
            .enumerate()
            .filter_map(|(old_index, id)| {
                self.position_of(*id).map(|new_index| IndexMove { old_index, new_index })
            })
            .collect()
    }

    /// Move a track and switch the playlist to manual order
    pub fn move_track(&mut self, src: usize, dst: usize) -> Result<()> {
        let len = self.tracks.len();
        for index in [src, dst] {
            if index >= len {
                return Err(ArchiveError::IndexOutOfBounds { index, len });
            }
        }
        let track = self.tracks.remove(src);
        self.tracks.insert(dst, track);
        self.sort_by = TrackSort::Manual;
        Ok(())
    }

    fn resort(&mut self) {
        if let Some(criterion) = self.sort_by.criterion() {
            self.tracks.sort_by(|a, b| criterion.ordering(a, b));
        }
    }
}
