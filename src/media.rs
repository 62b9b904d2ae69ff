//! Audio collaborator contract
//!
//! Audio bytes never pass through the archive. An [`AudioLibrary`] owns the
//! files: it unpacks bundles, reads and writes embedded metadata and deletes
//! files. The helpers here keep an audio [`Component`] and the library in
//! step, always touching the library first so a failed file operation leaves
//! the component unchanged.

use crate::component::Component;
use crate::content::{Track, TrackMetadata};
use crate::error::{ArchiveError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// One audio file extracted from a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFile {
    /// Location of the extracted file
    pub path: PathBuf,
    /// File extension without the dot
    pub file_extension: String,
}

impl TrackFile {
    /// Describe a file by path; the extension is taken from the path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            path,
            file_extension,
        }
    }

    /// File name without extension
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Metadata embedded in an audio file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetadata {
    /// Title tag
    pub title: Option<String>,
    /// Artist tag
    pub artist: Option<String>,
    /// Artwork
    pub thumbnail: Option<Vec<u8>>,
}

/// File-side operations the archive relies on
pub trait AudioLibrary {
    /// Unpack a bundle into individual track files
    fn extract_tracks(&self, bundle: &Path) -> Result<Vec<TrackFile>>;
    /// Read embedded metadata
    fn read_metadata(&self, file: &TrackFile) -> Result<FileMetadata>;
    /// Write a track's metadata back into its file
    fn write_metadata(&self, track: &Track) -> Result<()>;
    /// Delete a track's file
    fn remove_file(&self, track: &Track) -> Result<()>;
}

/// Build a track from an extracted file and its metadata
///
/// A missing title falls back to the file stem.
pub fn track_from_file(file: &TrackFile, metadata: FileMetadata) -> Track {
    let title = metadata
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| file.stem());
    let mut track = Track::new(title, file.file_extension.clone());
    track.artist = metadata.artist.unwrap_or_default();
    track.thumbnail = metadata.thumbnail;
    track
}

/// Import every track of a bundle into an audio component
///
/// Files whose metadata cannot be read are imported with their file name as
/// title. Returns the final positions of the new tracks.
pub fn import_bundle(
    library: &dyn AudioLibrary,
    component: &mut Component,
    bundle: &Path,
) -> Result<Vec<usize>> {
    component.audio()?;
    let files = library.extract_tracks(bundle)?;
    if files.is_empty() {
        return Err(ArchiveError::Media(format!(
            "bundle {} holds no tracks",
            bundle.display()
        )));
    }

    let tracks: Vec<Track> = files
        .iter()
        .map(|file| {
            let metadata = library.read_metadata(file).unwrap_or_else(|e| {
                warn!("Could not read metadata of {:?}: {}", file.path, e);
                FileMetadata::default()
            });
            track_from_file(file, metadata)
        })
        .collect();
    debug!("Importing {} tracks from {:?}", tracks.len(), bundle);
    component.append_tracks(tracks)
}

/// Edit a track and write the result into its file
pub fn edit_track(
    library: &dyn AudioLibrary,
    component: &mut Component,
    track_id: Uuid,
    fields: TrackMetadata,
) -> Result<usize> {
    let mut edited = component
        .audio()?
        .track(track_id)
        .cloned()
        .ok_or(ArchiveError::TrackNotFound(track_id))?;
    fields.apply_to(&mut edited);
    library.write_metadata(&edited)?;
    component.edit_track_metadata(track_id, fields)
}

/// Delete a track's file, then the track
pub fn remove_track(library: &dyn AudioLibrary, component: &mut Component, track_id: Uuid) -> Result<usize> {
    let track = component
        .audio()?
        .track(track_id)
        .cloned()
        .ok_or(ArchiveError::TrackNotFound(track_id))?;
    library.remove_file(&track)?;
    component.remove_track(track_id)
}
