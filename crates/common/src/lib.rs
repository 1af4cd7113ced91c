use std::path::{Path, PathBuf};

use metadata::TrackMetadata;

/// A directory immediately under the music root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artist {
    pub name: String,
    pub path: PathBuf,
    pub albums: Vec<Album>,
}

impl Artist {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            albums: Vec::new(),
        }
    }

    pub fn track_count(&self) -> usize {
        self.albums.iter().map(|album| album.tracks.len()).sum()
    }
}

/// A directory inside an artist directory.
///
/// Albums and tracks hold no pointer back to their parent; code that needs the
/// owning artist or album walks down from the parent and passes it along.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Album {
    pub title: String,
    pub path: PathBuf,
    pub tracks: Vec<Track>,
}

impl Album {
    pub fn new(title: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            title: title.into(),
            path: path.into(),
            tracks: Vec::new(),
        }
    }

    pub fn track(&self, file_name: &str) -> Option<&Track> {
        self.tracks.iter().find(|track| track.file_name == file_name)
    }
}

/// A track file named `"<number> <simple name>.<ext>"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub file_name: String,
    pub simple_name: String,
    pub number: u32,
    pub path: PathBuf,
    pub metadata: Option<TrackMetadata>,
}

impl Track {
    pub fn new(
        file_name: impl Into<String>,
        simple_name: impl Into<String>,
        number: u32,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            simple_name: simple_name.into(),
            number,
            path: path.into(),
            metadata: None,
        }
    }

    /// Extension including the leading dot, e.g. `".mp3"`.
    pub fn extension(&self) -> String {
        extension_of(&self.path)
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Replaces characters that cannot appear in file names with their stand-ins.
///
/// | character | stand-in |
/// |---|---|
/// | `*` `/` `\` `:` `\|` | `-` |
/// | `<` | `[` |
/// | `>` | `]` |
/// | `?` | removed |
/// | `"` | `'` |
pub fn substitute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' | '/' | '\\' | ':' | '|' => out.push('-'),
            '<' => out.push('['),
            '>' => out.push(']'),
            '?' => {}
            '"' => out.push('\''),
            other => out.push(other),
        }
    }
    out
}

/// Best-effort inverse of [`substitute`]; `-` is left alone since it has several sources.
pub fn unsubstitute(value: &str) -> String {
    value
        .chars()
        .map(|ch| match ch {
            '[' => '<',
            ']' => '>',
            '\'' => '"',
            other => other,
        })
        .collect()
}

/// Whether a metadata value and a file system name denote the same thing.
pub fn names_match(metadata_value: &str, file_name: &str) -> bool {
    substitute(metadata_value) == substitute(file_name)
}

/// Hex blake3 digest used to compare a file with its copy.
pub fn content_digest(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
