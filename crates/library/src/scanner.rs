use std::path::{Path, PathBuf};

use common::{Album, Artist, Track};
use regex::Regex;
use tracing::{debug, error, warn};

use crate::fs::{DirEntry, EntryKind, FileSystem};

/// What to look for and where.
#[derive(Clone, Debug)]
pub struct SearchParams {
    pub music_root: PathBuf,
    pub artist_filter: Regex,
    pub album_filter: Regex,
    pub track_filter: Regex,
    /// Extensions including the leading dot, e.g. `".mp3"`.
    pub extensions: Vec<String>,
}

impl SearchParams {
    /// Matches everything with the default `.mp3` extension.
    pub fn new(music_root: impl Into<PathBuf>) -> Result<Self, regex::Error> {
        Ok(Self {
            music_root: music_root.into(),
            artist_filter: Regex::new(".*")?,
            album_filter: Regex::new(".*")?,
            track_filter: Regex::new(".*")?,
            extensions: vec![".mp3".to_string()],
        })
    }
}

/// Parses `"<number> <simple name><ext>"` for each supported extension.
#[derive(Clone, Debug)]
pub struct TrackNameParser {
    extensions: Vec<String>,
    patterns: Vec<Regex>,
}

impl TrackNameParser {
    pub fn new(extensions: &[String]) -> Result<Self, regex::Error> {
        let patterns = extensions
            .iter()
            .map(|ext| Regex::new(&format!(r"^([0-9]+)\s+(.+){}$", regex::escape(ext))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            extensions: extensions.to_vec(),
            patterns,
        })
    }

    /// Whether the file carries one of the extensions at all.
    pub fn is_candidate(&self, file_name: &str) -> bool {
        self.extensions
            .iter()
            .any(|ext| file_name.ends_with(ext.as_str()))
    }

    /// Track number and simple name, or `None` when the name does not fit the pattern
    /// or the number is zero or too large.
    pub fn parse(&self, file_name: &str) -> Option<(u32, String)> {
        for pattern in &self.patterns {
            if let Some(captures) = pattern.captures(file_name) {
                let number: u32 = captures.get(1)?.as_str().parse().ok()?;
                if number == 0 {
                    return None;
                }
                let name = captures.get(2)?.as_str().to_string();
                return Some((number, name));
            }
        }
        None
    }
}

/// Builds the library graph under `params.music_root`.
///
/// Unreadable directories are logged and treated as empty. Albums and artists that
/// are empty on disk are kept; those emptied by a filter are dropped.
pub fn scan(fs: &dyn FileSystem, params: &SearchParams) -> Result<Vec<Artist>, regex::Error> {
    let parser = TrackNameParser::new(&params.extensions)?;
    let mut artists = Vec::new();
    for (name, path) in subdirectories(fs, &params.music_root) {
        if !params.artist_filter.is_match(&name) {
            continue;
        }
        let mut artist = Artist::new(name, path);
        let album_dirs = subdirectories(fs, &artist.path);
        let empty_on_disk = album_dirs.is_empty();
        for (title, path) in album_dirs {
            if !params.album_filter.is_match(&title) {
                continue;
            }
            if let Some(album) = scan_album(fs, params, &parser, title, path) {
                artist.albums.push(album);
            }
        }
        if empty_on_disk || !artist.albums.is_empty() {
            artists.push(artist);
        }
    }
    debug!(
        root = %params.music_root.display(),
        artists = artists.len(),
        "library scanned"
    );
    Ok(artists)
}

fn scan_album(
    fs: &dyn FileSystem,
    params: &SearchParams,
    parser: &TrackNameParser,
    title: String,
    path: PathBuf,
) -> Option<Album> {
    let mut album = Album::new(title, path);
    let mut found_any = false;
    for entry in read_entries(fs, &album.path) {
        if entry.kind != EntryKind::File || !parser.is_candidate(&entry.name) {
            continue;
        }
        let Some((number, simple_name)) = parser.parse(&entry.name) else {
            warn!(
                file = %entry.path.display(),
                "track file name does not match \"<number> <name><ext>\"; skipped"
            );
            continue;
        };
        found_any = true;
        if params.track_filter.is_match(&simple_name) {
            album
                .tracks
                .push(Track::new(entry.name, simple_name, number, entry.path));
        }
    }
    if found_any && album.tracks.is_empty() {
        None
    } else {
        Some(album)
    }
}

fn subdirectories(fs: &dyn FileSystem, path: &Path) -> Vec<(String, PathBuf)> {
    read_entries(fs, path)
        .into_iter()
        .filter(|entry| entry.kind == EntryKind::Dir)
        .map(|entry| (entry.name, entry.path))
        .collect()
}

fn read_entries(fs: &dyn FileSystem, path: &Path) -> Vec<DirEntry> {
    match fs.read_dir(path) {
        Ok(entries) => entries,
        Err(err) => {
            error!(directory = %path.display(), error = %err, "cannot read directory");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;

    fn library() -> MemoryFileSystem {
        let fs = MemoryFileSystem::new();
        fs.add_file("/music/Beta/Second/1 One.mp3", b"".to_vec());
        fs.add_file("/music/Beta/Second/2 Two.mp3", b"".to_vec());
        fs.add_file("/music/Beta/Second/cover.jpg", b"".to_vec());
        fs.add_file("/music/Beta/Second/Three.mp3", b"".to_vec());
        fs.add_file("/music/Alpha/First/01 Intro.mp3", b"".to_vec());
        fs.add_dir("/music/Alpha/Nothing Here");
        fs.add_dir("/music/Gamma");
        fs.add_file("/music/readme.txt", b"".to_vec());
        fs
    }

    fn params() -> SearchParams {
        SearchParams::new("/music").unwrap()
    }

    #[test]
    fn parses_track_file_names() {
        let parser = TrackNameParser::new(&[".mp3".to_string(), ".flac".to_string()]).unwrap();
        assert_eq!(parser.parse("01 Intro.mp3"), Some((1, "Intro".to_string())));
        assert_eq!(parser.parse("12  Two Words.flac"), Some((12, "Two Words".to_string())));
        assert_eq!(parser.parse("Intro.mp3"), None);
        assert_eq!(parser.parse("0 Zero.mp3"), None);
        assert_eq!(parser.parse("99999999999 Big.mp3"), None);
        assert_eq!(parser.parse("1 Intro.mp3x"), None);
    }

    #[test]
    fn builds_ordered_graph() {
        let fs = library();
        let artists = scan(&fs, &params()).unwrap();
        let names: Vec<_> = artists.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta", "Gamma"]);

        let alpha = &artists[0];
        assert_eq!(alpha.albums.len(), 2);
        assert_eq!(alpha.albums[0].tracks[0].simple_name, "Intro");
        assert_eq!(alpha.albums[0].tracks[0].number, 1);
        assert!(alpha.albums[1].tracks.is_empty());

        let beta = &artists[1].albums[0];
        let files: Vec<_> = beta.tracks.iter().map(|t| t.file_name.as_str()).collect();
        assert_eq!(files, vec!["1 One.mp3", "2 Two.mp3"]);
        assert!(artists[2].albums.is_empty());
    }

    #[test]
    fn filters_drop_emptied_nodes_but_keep_empty_ones() {
        let fs = library();
        let mut params = params();
        params.track_filter = Regex::new("^Two$").unwrap();
        let artists = scan(&fs, &params).unwrap();
        let names: Vec<_> = artists.iter().map(|a| a.name.as_str()).collect();
        // Alpha keeps its empty album; Gamma was empty on disk
        assert_eq!(names, vec!["Alpha", "Beta", "Gamma"]);
        assert_eq!(artists[0].albums.len(), 1);
        assert_eq!(artists[0].albums[0].title, "Nothing Here");
        assert_eq!(artists[1].albums[0].tracks.len(), 1);

        params.track_filter = Regex::new(".*").unwrap();
        params.artist_filter = Regex::new("^B").unwrap();
        let artists = scan(&fs, &params).unwrap();
        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].name, "Beta");
    }

    #[test]
    fn unreadable_root_gives_empty_graph() {
        let fs = MemoryFileSystem::new();
        let artists = scan(&fs, &SearchParams::new("/missing").unwrap()).unwrap();
        assert!(artists.is_empty());
    }

    #[test]
    fn unreadable_album_is_treated_as_empty() {
        let fs = library();
        fs.fail_path("/music/Beta/Second");
        let artists = scan(&fs, &params()).unwrap();
        let beta = artists.iter().find(|a| a.name == "Beta").unwrap();
        assert_eq!(beta.albums.len(), 1);
        assert!(beta.albums[0].tracks.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn dangling_link_does_not_hide_its_album() {
        use crate::fs::OsFileSystem;
        let dir = tempfile::TempDir::new().unwrap();
        let album = dir.path().join("Artist").join("Album");
        std::fs::create_dir_all(&album).unwrap();
        std::fs::write(album.join("01 good.mp3"), b"").unwrap();
        std::os::unix::fs::symlink(album.join("missing"), album.join("02 bad.mp3")).unwrap();

        let artists = scan(&OsFileSystem, &SearchParams::new(dir.path()).unwrap()).unwrap();
        let tracks = &artists[0].albums[0].tracks;
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].file_name, "01 good.mp3");
    }

    #[test]
    fn scanning_twice_gives_the_same_graph() {
        let fs = library();
        assert_eq!(scan(&fs, &params()).unwrap(), scan(&fs, &params()).unwrap());
    }
}
