use std::path::{Path, PathBuf};

use metadata::{SourceType, TrackMetadata};
use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::LibraryError;

/// Opens the track once and reads v2 then v1. Failures land in the per-source errors.
pub fn read_track_metadata(fs: &dyn FileSystem, path: &Path) -> TrackMetadata {
    match fs.open(path) {
        Ok(mut file) => metadata::read_metadata(&mut file),
        Err(err) => {
            warn!(file = %path.display(), error = %err, "cannot open track");
            TrackMetadata::unreadable(&err.to_string())
        }
    }
}

/// Writes whatever differs between `desired` and the file on disk.
///
/// The new content goes to a sibling temporary file which then replaces the track,
/// so a failure leaves the original untouched.
pub fn write_differences(
    fs: &dyn FileSystem,
    path: &Path,
    desired: &TrackMetadata,
) -> Result<Vec<SourceType>, LibraryError> {
    let original = fs.read(path)?;
    let rewrite = metadata::rewrite(&original, desired)?;
    let temp = temp_path(path);
    fs.write_file(&temp, &rewrite.bytes)?;
    if let Err(err) = fs.rename(&temp, path) {
        if let Err(cleanup) = fs.remove(&temp) {
            warn!(file = %temp.display(), error = %cleanup, "cannot remove temporary file");
        }
        return Err(err.into());
    }
    debug!(file = %path.display(), sources = ?rewrite.edited, "metadata rewritten");
    Ok(rewrite.edited)
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.rewrite", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use metadata::{compose, SourceMetadata};

    fn record(title: &str) -> SourceMetadata {
        SourceMetadata {
            artist_name: "A".to_string(),
            album_name: "X".to_string(),
            track_name: title.to_string(),
            track_number: Some(1),
            ..SourceMetadata::default()
        }
    }

    #[test]
    fn reads_from_file_system() {
        let fs = MemoryFileSystem::new();
        let bytes = compose(Some(&record("a")), Some(&record("a")), b"audio").unwrap();
        fs.add_file("/m/1 a.mp3", bytes);
        let metadata = read_track_metadata(&fs, Path::new("/m/1 a.mp3"));
        assert_eq!(metadata.canonical, Some(SourceType::V2));
        assert_eq!(metadata.v2.track_name, "a");

        let missing = read_track_metadata(&fs, Path::new("/m/2 b.mp3"));
        assert!(missing.errors_occurred());
        assert!(missing.v1.error.is_some());
    }

    #[test]
    fn writes_through_temporary_file() {
        let fs = MemoryFileSystem::new();
        let path = Path::new("/m/1 a.mp3");
        let bytes = compose(Some(&record("old")), Some(&record("old")), b"audio").unwrap();
        fs.add_file(path, bytes);
        let mut desired = read_track_metadata(&fs, path);
        desired.v1.track_name = "new".to_string();
        desired.v2.track_name = "new".to_string();

        let edited = write_differences(&fs, path, &desired).unwrap();
        assert_eq!(edited.len(), 2);
        assert_eq!(fs.write_count(), 2);
        assert!(!fs.exists(temp_path(path)));
        assert_eq!(read_track_metadata(&fs, path).v2.track_name, "new");

        let again = write_differences(&fs, path, &desired).unwrap_err();
        assert!(again.is_no_edit_required());
        assert_eq!(fs.write_count(), 2);
    }

    #[test]
    fn failed_write_keeps_original() {
        let fs = MemoryFileSystem::new();
        let path = Path::new("/m/1 a.mp3");
        let original = compose(None, Some(&record("old")), b"audio").unwrap();
        fs.add_file(path, original.clone());
        let mut desired = read_track_metadata(&fs, path);
        desired.v2.track_name = "new".to_string();
        fs.fail_path(temp_path(path));
        assert!(write_differences(&fs, path, &desired).is_err());
        assert!(!fs.exists(temp_path(path)));
        assert_eq!(fs.contents(path).unwrap(), original);
    }
}
