use std::path::{Path, PathBuf};

use common::{content_digest, Album, Artist, Track};
use tracing::{debug, error, info, warn};

use crate::analysis::{analyze, desired_metadata, AlbumCanon, Checks};
use crate::concerns::{ConcernKind, ConcernedLibrary};
use crate::fs::{EntryKind, FileSystem};
use crate::output::Bus;
use crate::track_io::write_differences;
use crate::LibraryError;

/// Name of the per-album directory holding pre-repair copies.
pub const BACKUP_DIR: &str = "pre-repair-backup";

/// Told about every successful rewrite so cached state can be invalidated.
pub trait DirtyHook: Send + Sync {
    fn mark_dirty(&self, bus: &dyn Bus);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Tracks with conflicts found.
    pub candidates: usize,
    pub repaired: usize,
    /// Tracks that could not be backed up or rewritten.
    pub failed: usize,
}

impl RepairReport {
    pub fn system_error(&self) -> bool {
        self.failed > 0
    }
}

/// Backs up and rewrites every track carrying a conflict.
///
/// In dry-run mode the repairable concerns are printed and nothing is touched.
pub fn repair(
    fs: &dyn FileSystem,
    bus: &dyn Bus,
    hook: &dyn DirtyHook,
    artists: &[Artist],
    dry_run: bool,
) -> RepairReport {
    let mut library = analyze(
        artists,
        Checks {
            files: true,
            ..Checks::default()
        },
    );
    library.retain_kind(ConcernKind::Conflict);
    let mut report = RepairReport::default();
    if library.is_empty() {
        bus.console_println("No repairable track defects were found.");
        return report;
    }

    if dry_run {
        bus.console_println("The following concerns can be repaired:");
        let mut rolled = library.clone();
        rolled.rollup();
        rolled.render(bus);
        return report;
    }

    for artist in artists {
        for album in &artist.albums {
            let conflicted: Vec<&Track> = album
                .tracks
                .iter()
                .filter(|track| has_conflict(&library, artist, album, track))
                .collect();
            if conflicted.is_empty() {
                continue;
            }
            report.candidates += conflicted.len();
            let backup_dir = album.path.join(BACKUP_DIR);
            if let Err(err) = ensure_dir(fs, &backup_dir) {
                bus.error_println(&format!(
                    "The directory \"{}\" cannot be created: {}",
                    backup_dir.display(),
                    err
                ));
                error!(
                    directory = %backup_dir.display(),
                    error = %err,
                    "cannot create backup directory"
                );
                report.failed += conflicted.len();
                continue;
            }
            let canon = AlbumCanon::of(album);
            for track in conflicted {
                if repair_track(fs, bus, hook, artist, album, track, &canon, &backup_dir) {
                    report.repaired += 1;
                } else {
                    report.failed += 1;
                }
            }
        }
    }
    info!(
        repaired = report.repaired,
        failed = report.failed,
        "repair finished"
    );
    report
}

fn has_conflict(
    library: &ConcernedLibrary,
    artist: &Artist,
    album: &Album,
    track: &Track,
) -> bool {
    library
        .track(&artist.name, &album.title, &track.file_name)
        .map(|node| node.concerns.has(ConcernKind::Conflict))
        .unwrap_or(false)
}

fn ensure_dir(fs: &dyn FileSystem, path: &Path) -> std::io::Result<()> {
    match fs.stat(path) {
        Ok(EntryKind::Dir) => Ok(()),
        _ => fs.mkdir(path),
    }
}

/// Returns true unless the track had to be skipped or its rewrite failed.
#[allow(clippy::too_many_arguments)]
fn repair_track(
    fs: &dyn FileSystem,
    bus: &dyn Bus,
    hook: &dyn DirtyHook,
    artist: &Artist,
    album: &Album,
    track: &Track,
    canon: &AlbumCanon,
    backup_dir: &Path,
) -> bool {
    let Some(desired) = desired_metadata(artist, album, track, canon) else {
        bus.error_println(&format!(
            "An error occurred repairing track \"{}\".",
            track.path.display()
        ));
        warn!(file = %track.path.display(), "no usable metadata to repair from");
        refuse(bus, track);
        return false;
    };
    let backup = backup_dir.join(format!("{}{}", track.number, track.extension()));
    if let Ok(EntryKind::File) = fs.stat(&backup) {
        bus.error_println(&format!(
            "The backup file for track file \"{}\", \"{}\", already exists.",
            track.path.display(),
            backup.display()
        ));
        refuse(bus, track);
        return false;
    }
    if let Err(err) = back_up(fs, &track.path, &backup) {
        bus.error_println(&format!(
            "The track file \"{}\" could not be backed up to \"{}\": {}",
            track.path.display(),
            backup.display(),
            err
        ));
        error!(
            file = %track.path.display(),
            backup = %backup.display(),
            error = %err,
            "backup failed"
        );
        refuse(bus, track);
        return false;
    }

    match write_differences(fs, &track.path, &desired) {
        Ok(sources) => {
            debug!(file = %track.path.display(), ?sources, "track rewritten");
            bus.console_println(&format!("\"{}\" repaired.", track.path.display()));
            hook.mark_dirty(bus);
            true
        }
        Err(err) if err.is_no_edit_required() => {
            debug!(file = %track.path.display(), "nothing to rewrite");
            true
        }
        Err(err) => {
            bus.error_println(&format!(
                "An error occurred repairing track \"{}\".",
                track.path.display()
            ));
            error!(file = %track.path.display(), error = %err, "rewrite failed");
            false
        }
    }
}

fn refuse(bus: &dyn Bus, track: &Track) {
    bus.error_println(&format!(
        "The track file \"{}\" will not be repaired.",
        track.path.display()
    ));
}

/// Copies `source` to `backup` and confirms the copy holds the same bytes.
fn back_up(fs: &dyn FileSystem, source: &Path, backup: &Path) -> Result<(), LibraryError> {
    fs.copy_file(source, backup)?;
    let original = content_digest(&fs.read(source)?);
    let copy = content_digest(&fs.read(backup)?);
    if original != copy {
        return Err(LibraryError::Verification(format!(
            "digest {} does not match {}",
            copy, original
        )));
    }
    Ok(())
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: usize,
    pub failed: Vec<PathBuf>,
}

/// Deletes the backup directory of every album in the graph.
pub fn remove_backups(fs: &dyn FileSystem, bus: &dyn Bus, artists: &[Artist]) -> CleanupReport {
    let mut report = CleanupReport::default();
    for album in artists.iter().flat_map(|artist| artist.albums.iter()) {
        let backup_dir = album.path.join(BACKUP_DIR);
        if !matches!(fs.stat(&backup_dir), Ok(EntryKind::Dir)) {
            continue;
        }
        match fs.remove_dir_all(&backup_dir) {
            Ok(()) => {
                info!(directory = %backup_dir.display(), "backup directory deleted");
                report.deleted += 1;
            }
            Err(err) => {
                bus.error_println(&format!(
                    "The directory \"{}\" cannot be deleted: {}",
                    backup_dir.display(),
                    err
                ));
                error!(
                    directory = %backup_dir.display(),
                    error = %err,
                    "cannot delete backup directory"
                );
                report.failed.push(backup_dir);
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use crate::output::RecordingBus;
    use crate::reader::read_metadata;
    use crate::scanner::{scan, SearchParams};
    use metadata::{compose, SourceMetadata, SourceType};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingHook {
        calls: Mutex<usize>,
    }

    impl DirtyHook for CountingHook {
        fn mark_dirty(&self, _bus: &dyn Bus) {
            *self.calls.lock() += 1;
        }
    }

    fn record(artist: &str, album: &str, title: &str, number: u32) -> SourceMetadata {
        SourceMetadata {
            artist_name: artist.to_string(),
            album_name: album.to_string(),
            track_name: title.to_string(),
            track_number: Some(number),
            year: "1987".to_string(),
            genre: "Rock".to_string(),
            ..SourceMetadata::default()
        }
    }

    /// `artists` x `albums` x `tracks` library whose tags all claim track 99.
    fn dirty_library(fs: &MemoryFileSystem, artists: u32, albums: u32, tracks: u32) {
        for a in 1..=artists {
            let artist = format!("Artist {}", a);
            for b in 1..=albums {
                let album = format!("Album {}", b);
                for t in 1..=tracks {
                    let title = format!("Song {}", t);
                    let tag = record(&artist, &album, &title, 99);
                    fs.add_file(
                        format!("/music/{}/{}/{} {}.mp3", artist, album, t, title),
                        compose(Some(&tag), Some(&tag), b"\xFF\xFB audio").unwrap(),
                    );
                }
            }
        }
    }

    async fn load(fs: &Arc<MemoryFileSystem>) -> Vec<Artist> {
        let mut artists = scan(fs.as_ref(), &SearchParams::new("/music").unwrap()).unwrap();
        read_metadata(fs.clone(), &mut artists, 8).await;
        artists
    }

    #[tokio::test]
    async fn dry_run_reports_without_writing() {
        let fs = Arc::new(MemoryFileSystem::new());
        dirty_library(&fs, 1, 1, 2);
        let artists = load(&fs).await;
        let bus = RecordingBus::new();
        let hook = CountingHook::default();

        let report = repair(fs.as_ref(), &bus, &hook, &artists, true);
        assert!(!report.system_error());
        assert_eq!(fs.write_count(), 0);
        assert_eq!(*hook.calls.lock(), 0);
        assert_eq!(
            bus.console_lines(),
            vec![
                "The following concerns can be repaired:",
                "Artist \"Artist 1\"",
                "  Album \"Album 1\"",
                "  * [conflict] for all tracks: the track number field does not match the track's file name",
            ]
        );
    }

    #[tokio::test]
    async fn repairs_every_track_and_is_idempotent() {
        let fs = Arc::new(MemoryFileSystem::new());
        dirty_library(&fs, 2, 3, 4);
        let originals: Vec<(PathBuf, Vec<u8>)> = {
            let artists = load(&fs).await;
            artists
                .iter()
                .flat_map(|a| a.albums.iter())
                .flat_map(|b| b.tracks.iter())
                .map(|t| (t.path.clone(), fs.contents(&t.path).unwrap()))
                .collect()
        };
        let artists = load(&fs).await;
        let bus = RecordingBus::new();
        let hook = CountingHook::default();

        let report = repair(fs.as_ref(), &bus, &hook, &artists, false);
        assert_eq!(report.repaired, 24);
        assert_eq!(report.failed, 0);
        assert!(!report.system_error());
        assert_eq!(*hook.calls.lock(), 24);
        let repaired_lines = bus
            .console_lines()
            .iter()
            .filter(|line| line.ends_with(" repaired."))
            .count();
        assert_eq!(repaired_lines, 24);
        assert!(bus.error_lines().is_empty());

        for (path, before) in &originals {
            let number = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.split(' ').next())
                .unwrap()
                .to_string();
            let backup = path.parent().unwrap().join(BACKUP_DIR).join(format!("{}.mp3", number));
            assert_eq!(&fs.contents(&backup).unwrap(), before);
            assert_ne!(&fs.contents(path).unwrap(), before);
        }

        let reread = load(&fs).await;
        for artist in &reread {
            for album in &artist.albums {
                let canon = AlbumCanon::of(album);
                for track in &album.tracks {
                    let problems = crate::analysis::track_problems(artist, album, track, &canon);
                    assert!(problems.is_empty());
                }
            }
        }

        fs.reset_write_count();
        let bus = RecordingBus::new();
        let report = repair(fs.as_ref(), &bus, &hook, &reread, false);
        assert_eq!(report, RepairReport::default());
        assert_eq!(fs.write_count(), 0);
        assert_eq!(bus.console_lines(), vec!["No repairable track defects were found."]);
    }

    #[tokio::test]
    async fn existing_backup_blocks_repair() {
        let fs = Arc::new(MemoryFileSystem::new());
        dirty_library(&fs, 1, 1, 1);
        fs.add_file("/music/Artist 1/Album 1/pre-repair-backup/1.mp3", b"old backup".to_vec());
        let artists = load(&fs).await;
        let bus = RecordingBus::new();
        let hook = CountingHook::default();

        let report = repair(fs.as_ref(), &bus, &hook, &artists, false);
        assert!(report.system_error());
        assert_eq!(report.repaired, 0);
        assert_eq!(
            bus.error_lines(),
            vec![
                "The backup file for track file \"/music/Artist 1/Album 1/1 Song 1.mp3\", \"/music/Artist 1/Album 1/pre-repair-backup/1.mp3\", already exists.",
                "The track file \"/music/Artist 1/Album 1/1 Song 1.mp3\" will not be repaired.",
            ]
        );
        assert_eq!(
            fs.contents("/music/Artist 1/Album 1/pre-repair-backup/1.mp3").unwrap(),
            b"old backup"
        );
        assert_eq!(*hook.calls.lock(), 0);
    }

    #[tokio::test]
    async fn unwritable_backup_directory_skips_album() {
        let fs = Arc::new(MemoryFileSystem::new());
        dirty_library(&fs, 1, 2, 2);
        fs.fail_path("/music/Artist 1/Album 1/pre-repair-backup");
        let artists = load(&fs).await;
        let bus = RecordingBus::new();
        let hook = CountingHook::default();

        let report = repair(fs.as_ref(), &bus, &hook, &artists, false);
        assert_eq!(report.repaired, 2);
        assert_eq!(report.failed, 2);
        assert!(bus.error_lines()[0].starts_with(
            "The directory \"/music/Artist 1/Album 1/pre-repair-backup\" cannot be created: "
        ));
    }

    #[tokio::test]
    async fn failed_rewrite_keeps_backup() {
        let fs = Arc::new(MemoryFileSystem::new());
        dirty_library(&fs, 1, 1, 1);
        let artists = load(&fs).await;
        fs.fail_path("/music/Artist 1/Album 1/.1 Song 1.mp3.rewrite");
        let bus = RecordingBus::new();
        let hook = CountingHook::default();

        let report = repair(fs.as_ref(), &bus, &hook, &artists, false);
        assert!(report.system_error());
        assert_eq!(
            bus.error_lines(),
            vec!["An error occurred repairing track \"/music/Artist 1/Album 1/1 Song 1.mp3\"."]
        );
        assert!(fs.exists("/music/Artist 1/Album 1/pre-repair-backup/1.mp3"));
    }

    #[tokio::test]
    async fn repairs_track_with_only_v1_metadata() {
        let fs = Arc::new(MemoryFileSystem::new());
        let tag = record("Artist 1", "Album 1", "Song 1", 99);
        let path = "/music/Artist 1/Album 1/1 Song 1.mp3";
        let original = compose(Some(&tag), None, b"\xFF\xFB audio").unwrap();
        fs.add_file(path, original.clone());
        let artists = load(&fs).await;
        let bus = RecordingBus::new();
        let hook = CountingHook::default();

        let report = repair(fs.as_ref(), &bus, &hook, &artists, false);
        assert_eq!(report.repaired, 1);
        assert!(!report.system_error());
        assert_eq!(bus.console_text(), format!("\"{}\" repaired.\n", path));
        let repaired = fs.contents(path).unwrap();
        assert_eq!(repaired.len(), original.len());
        assert!(repaired.starts_with(b"\xFF\xFB audio"));

        let reread = load(&fs).await;
        let metadata = reread[0].albums[0].tracks[0].metadata.as_ref().unwrap();
        assert_eq!(metadata.canonical, Some(SourceType::V1));
        assert_eq!(metadata.v1.track_number, Some(1));
        assert!(!metadata.v2.is_readable());
    }

    #[test]
    fn track_without_metadata_is_refused_before_backup() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/music/A/X/1 a.mp3", b"untagged".to_vec());
        fs.add_dir(format!("/music/A/X/{}", BACKUP_DIR));
        let artists = scan(&fs, &SearchParams::new("/music").unwrap()).unwrap();
        let (artist, album) = (&artists[0], &artists[0].albums[0]);
        let bus = RecordingBus::new();
        let hook = CountingHook::default();
        let backup_dir = album.path.join(BACKUP_DIR);

        let canon = AlbumCanon::of(album);
        let repaired =
            repair_track(&fs, &bus, &hook, artist, album, &album.tracks[0], &canon, &backup_dir);
        assert!(!repaired);
        assert_eq!(
            bus.error_lines(),
            vec![
                "An error occurred repairing track \"/music/A/X/1 a.mp3\".",
                "The track file \"/music/A/X/1 a.mp3\" will not be repaired.",
            ]
        );
        assert!(!fs.exists(backup_dir.join("1.mp3")));
        assert_eq!(fs.write_count(), 0);
    }

    #[tokio::test]
    async fn removes_backup_directories() {
        let fs = Arc::new(MemoryFileSystem::new());
        dirty_library(&fs, 1, 3, 1);
        fs.add_file("/music/Artist 1/Album 1/pre-repair-backup/1.mp3", b"x".to_vec());
        fs.add_file("/music/Artist 1/Album 2/pre-repair-backup/1.mp3", b"y".to_vec());
        fs.add_file("/music/Elsewhere/pre-repair-backup/1.mp3", b"z".to_vec());
        let artists = scan(fs.as_ref(), &SearchParams::new("/music").unwrap()).unwrap();
        let bus = RecordingBus::new();

        let report = remove_backups(fs.as_ref(), &bus, &artists);
        assert_eq!(report.deleted, 2);
        assert!(report.failed.is_empty());
        assert!(!fs.exists("/music/Artist 1/Album 1/pre-repair-backup"));
        assert!(!fs.exists("/music/Artist 1/Album 2/pre-repair-backup"));
        assert!(fs.exists("/music/Artist 1/Album 1/1 Song 1.mp3"));
        assert!(bus.error_lines().is_empty());
    }
}
