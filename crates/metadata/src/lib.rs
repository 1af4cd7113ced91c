use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek, SeekFrom};

pub mod genre;
pub mod v1;
pub mod v2;

pub use genre::{genre_code, genre_name, genres_match, normalize_genre};
pub use v1::{V1Trailer, V1_TEXT_LEN, V1_TRAILER_LEN, V1_YEAR_LEN};
pub use v2::V2Block;

use id3::{ErrorKind, Tag, TagLike};
use v2::{ALBUM_FRAME, ARTIST_FRAME, GENRE_FRAME, TITLE_FRAME, TRACK_FRAME};

/// The two embedded metadata formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceType {
    V1,
    V2,
}

impl SourceType {
    pub fn name(self) -> &'static str {
        match self {
            SourceType::V1 => "ID3V1",
            SourceType::V2 => "ID3V2",
        }
    }
}

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    NoV1Tag,
    NoV2Tag,
    UnsupportedVersion(u8),
    Corrupt(String),
    NoEditRequired,
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::NoV1Tag => write!(f, "no ID3V1 metadata found"),
            MetadataError::NoV2Tag => write!(f, "no ID3V2 metadata found"),
            MetadataError::UnsupportedVersion(major) => {
                write!(f, "unsupported ID3V2 version {}", major)
            }
            MetadataError::Corrupt(detail) => write!(f, "corrupt metadata: {}", detail),
            MetadataError::NoEditRequired => write!(f, "no edit required"),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<id3::Error> for MetadataError {
    fn from(err: id3::Error) -> Self {
        match err.kind {
            ErrorKind::NoTag => MetadataError::NoV2Tag,
            _ => MetadataError::Corrupt(err.to_string()),
        }
    }
}

/// Field values read from (or destined for) one metadata source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceMetadata {
    pub artist_name: String,
    pub album_name: String,
    pub track_name: String,
    pub track_number: Option<u32>,
    pub year: String,
    pub genre: String,
    /// v2 only.
    pub cd_identifier: Vec<u8>,
    /// v2 only: major version of the block.
    pub version: Option<u8>,
    /// v2 only: printable rendition of every frame, keyed by frame ID.
    pub frame_strings: BTreeMap<String, Vec<String>>,
    /// Why the source could not be read, if it could not.
    pub error: Option<String>,
}

impl SourceMetadata {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn is_readable(&self) -> bool {
        self.error.is_none()
    }

    fn from_v1(tag: &id3::v1::Tag) -> Self {
        Self {
            artist_name: trim_v1(&tag.artist),
            album_name: trim_v1(&tag.album),
            track_name: trim_v1(&tag.title),
            track_number: tag.track.filter(|n| *n != 0).map(u32::from),
            year: trim_v1(&tag.year),
            genre: genre_name(tag.genre_id).to_string(),
            ..Self::default()
        }
    }

    fn from_v2(block: &V2Block) -> Self {
        let tag = &block.tag;
        let mut frame_strings: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for frame in tag.frames() {
            frame_strings
                .entry(frame.id().to_string())
                .or_default()
                .push(v2::describe(frame));
        }
        Self {
            artist_name: v2::text(tag, ARTIST_FRAME).unwrap_or_default(),
            album_name: v2::text(tag, ALBUM_FRAME).unwrap_or_default(),
            track_name: v2::text(tag, TITLE_FRAME).unwrap_or_default(),
            track_number: v2::text(tag, TRACK_FRAME)
                .as_deref()
                .and_then(parse_track_number),
            year: v2::year(tag).unwrap_or_default(),
            genre: v2::text(tag, GENRE_FRAME)
                .map(|value| normalize_genre(&value))
                .unwrap_or_default(),
            cd_identifier: v2::cd_identifier(tag),
            version: Some(block.major()),
            frame_strings,
            error: None,
        }
    }
}

fn trim_v1(value: &str) -> String {
    value.trim_end_matches([' ', '\0']).to_string()
}

/// Both metadata records of one track plus the source treated as authoritative.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    pub v1: SourceMetadata,
    pub v2: SourceMetadata,
    pub canonical: Option<SourceType>,
}

impl TrackMetadata {
    /// Both sources marked unreadable for the same reason.
    pub fn unreadable(reason: &str) -> Self {
        Self {
            v1: SourceMetadata::failed(reason),
            v2: SourceMetadata::failed(reason),
            canonical: None,
        }
    }

    pub fn source(&self, source: SourceType) -> &SourceMetadata {
        match source {
            SourceType::V1 => &self.v1,
            SourceType::V2 => &self.v2,
        }
    }

    pub fn source_mut(&mut self, source: SourceType) -> &mut SourceMetadata {
        match source {
            SourceType::V1 => &mut self.v1,
            SourceType::V2 => &mut self.v2,
        }
    }

    pub fn canonical_source(&self) -> Option<&SourceMetadata> {
        self.canonical.map(|source| self.source(source))
    }

    /// Sources that were read without error, v1 first.
    pub fn readable_sources(&self) -> Vec<SourceType> {
        [SourceType::V1, SourceType::V2]
            .into_iter()
            .filter(|source| self.source(*source).is_readable())
            .collect()
    }

    pub fn errors_occurred(&self) -> bool {
        self.canonical.is_none()
    }

    fn choose_canonical(&mut self) {
        self.canonical = if self.v2.is_readable() {
            Some(SourceType::V2)
        } else if self.v1.is_readable() {
            Some(SourceType::V1)
        } else {
            None
        };
    }
}

/// Reads both sources from an open track: the v2 block first, then the v1 trailer.
pub fn read_metadata<R: Read + Seek>(reader: &mut R) -> TrackMetadata {
    let v2 = match V2Block::read_from(reader) {
        Ok(Some(block)) => SourceMetadata::from_v2(&block),
        Ok(None) => SourceMetadata::failed(MetadataError::NoV2Tag.to_string()),
        Err(err) => SourceMetadata::failed(err.to_string()),
    };
    let v1 = match read_v1(reader) {
        Ok(Some(tag)) => SourceMetadata::from_v1(&tag),
        Ok(None) => SourceMetadata::failed(MetadataError::NoV1Tag.to_string()),
        Err(err) => SourceMetadata::failed(err.to_string()),
    };
    let mut metadata = TrackMetadata {
        v1,
        v2,
        canonical: None,
    };
    metadata.choose_canonical();
    metadata
}

fn read_v1<R: Read + Seek>(
    reader: &mut R,
) -> Result<Option<id3::v1::Tag>, MetadataError> {
    let len = reader.seek(SeekFrom::End(0))?;
    if len < V1_TRAILER_LEN as u64 {
        return Ok(None);
    }
    match id3::v1::Tag::read_from(&mut *reader) {
        Ok(tag) => Ok(Some(tag)),
        Err(err) if matches!(err.kind, ErrorKind::NoTag) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Result of a successful rewrite: the new file content and which sources changed.
#[derive(Clone, Debug)]
pub struct Rewrite {
    pub bytes: Vec<u8>,
    pub edited: Vec<SourceType>,
}

/// Rewrites the v1 trailer and v2 block of `original` wherever `desired` differs
/// from what is on disk. Audio bytes between the two are copied verbatim.
///
/// A source is attempted only when both the file and `desired` have it readable.
/// Any failure aborts the whole rewrite; when nothing differs the result is
/// [`MetadataError::NoEditRequired`].
pub fn rewrite(original: &[u8], desired: &TrackMetadata) -> Result<Rewrite, Vec<MetadataError>> {
    let mut errors = Vec::new();
    let mut edited = Vec::new();

    let mut cursor = Cursor::new(original);
    let existing_v2 = match V2Block::read_from(&mut cursor) {
        Ok(block) => block,
        Err(err) => {
            if desired.v2.is_readable() {
                errors.push(err);
            }
            None
        }
    };
    let audio_start = existing_v2
        .as_ref()
        .map(|block| block.size_on_disk)
        .unwrap_or(0)
        .min(original.len());

    let trailer_start = original.len().saturating_sub(V1_TRAILER_LEN);
    let existing_v1 = if original.len() >= audio_start + V1_TRAILER_LEN {
        V1Trailer::parse(&original[trailer_start..])
    } else {
        None
    };
    let audio_end = if existing_v1.is_some() {
        trailer_start
    } else {
        original.len()
    };

    let mut new_v2 = None;
    if let Some(block) = existing_v2.as_ref().filter(|_| desired.v2.is_readable()) {
        let mut updated = block.tag.clone();
        if apply_v2(&mut updated, &desired.v2) {
            match v2::to_bytes(&updated) {
                Ok(bytes) => {
                    new_v2 = Some(bytes);
                    edited.push(SourceType::V2);
                }
                Err(err) => errors.push(err),
            }
        }
    }

    let mut new_v1 = None;
    if let Some(trailer) = existing_v1.as_ref().filter(|_| desired.v1.is_readable()) {
        let mut updated = trailer.clone();
        if apply_v1(&mut updated, &desired.v1) {
            new_v1 = Some(updated);
            edited.push(SourceType::V1);
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    if edited.is_empty() {
        return Err(vec![MetadataError::NoEditRequired]);
    }

    let mut bytes = Vec::with_capacity(original.len() + V1_TRAILER_LEN);
    match new_v2 {
        Some(block) => bytes.extend(block),
        None => bytes.extend_from_slice(&original[..audio_start]),
    }
    bytes.extend_from_slice(&original[audio_start..audio_end]);
    match new_v1 {
        Some(trailer) => bytes.extend_from_slice(trailer.as_bytes()),
        None => bytes.extend_from_slice(&original[audio_end..]),
    }
    Ok(Rewrite { bytes, edited })
}

fn apply_v2(tag: &mut Tag, desired: &SourceMetadata) -> bool {
    let mut changed = false;
    let text_fields = [
        (TITLE_FRAME, &desired.track_name),
        (ARTIST_FRAME, &desired.artist_name),
        (ALBUM_FRAME, &desired.album_name),
    ];
    for (id, value) in text_fields {
        if v2::text(tag, id).unwrap_or_default() != *value {
            v2::set_text(tag, id, value);
            changed = true;
        }
    }

    if let Some(number) = desired.track_number {
        let current = v2::text(tag, TRACK_FRAME);
        if current.as_deref().and_then(parse_track_number) != Some(number) {
            let total = current
                .as_deref()
                .and_then(|value| value.split_once('/'))
                .map(|(_, total)| total.trim().to_string())
                .filter(|total| !total.is_empty());
            let value = match total {
                Some(total) => format!("{}/{}", number, total),
                None => number.to_string(),
            };
            v2::set_text(tag, TRACK_FRAME, &value);
            changed = true;
        }
    }

    if v2::year(tag).unwrap_or_default() != desired.year {
        let id = v2::year_frame_id(tag);
        v2::set_text(tag, id, &desired.year);
        changed = true;
    }

    let genre = v2::text(tag, GENRE_FRAME).unwrap_or_default();
    if !genres_match(&genre, &desired.genre) {
        v2::set_text(tag, GENRE_FRAME, &desired.genre);
        changed = true;
    }

    if v2::cd_identifier(tag) != desired.cd_identifier {
        v2::set_cd_identifier(tag, &desired.cd_identifier);
        changed = true;
    }

    changed
}

fn apply_v1(trailer: &mut V1Trailer, desired: &SourceMetadata) -> bool {
    let mut changed = false;
    if trailer.title() != v1::render_field(&desired.track_name, V1_TEXT_LEN) {
        trailer.set_title(&desired.track_name);
        changed = true;
    }
    if trailer.artist() != v1::render_field(&desired.artist_name, V1_TEXT_LEN) {
        trailer.set_artist(&desired.artist_name);
        changed = true;
    }
    if trailer.album() != v1::render_field(&desired.album_name, V1_TEXT_LEN) {
        trailer.set_album(&desired.album_name);
        changed = true;
    }
    if trailer.year() != v1::render_field(&desired.year, V1_YEAR_LEN) {
        trailer.set_year(&desired.year);
        changed = true;
    }
    if let Some(number) = desired.track_number.and_then(|n| u8::try_from(n).ok()) {
        if number != 0 && trailer.track() != Some(number) {
            trailer.set_track(number);
            changed = true;
        }
    }
    if !trailer.genre().eq_ignore_ascii_case(genre_name(genre_code(&desired.genre))) {
        trailer.set_genre(&desired.genre);
        changed = true;
    }
    changed
}

/// Parses `"n"` or `"n/total"`.
pub fn parse_track_number(value: &str) -> Option<u32> {
    let head = value.split('/').next().unwrap_or(value).trim();
    head.parse().ok()
}

/// Builds a complete track file from optional v1/v2 records around `audio`.
///
/// Text frames named in the v2 record's `frame_strings` are written too, after the
/// fields the record carries.
pub fn compose(
    v1: Option<&SourceMetadata>,
    v2: Option<&SourceMetadata>,
    audio: &[u8],
) -> Result<Vec<u8>, MetadataError> {
    let mut bytes = Vec::new();
    if let Some(record) = v2 {
        let mut tag = Tag::with_version(v2::version_of(record.version.unwrap_or(3)));
        v2::set_text(&mut tag, TITLE_FRAME, &record.track_name);
        v2::set_text(&mut tag, ARTIST_FRAME, &record.artist_name);
        v2::set_text(&mut tag, ALBUM_FRAME, &record.album_name);
        if let Some(number) = record.track_number {
            v2::set_text(&mut tag, TRACK_FRAME, &number.to_string());
        }
        let year_frame = v2::year_frame_id(&tag);
        v2::set_text(&mut tag, year_frame, &record.year);
        v2::set_text(&mut tag, GENRE_FRAME, &record.genre);
        v2::set_cd_identifier(&mut tag, &record.cd_identifier);
        for (id, values) in &record.frame_strings {
            if id.starts_with('T') && tag.get(id).is_none() {
                v2::set_text(&mut tag, id, &values.join("\0"));
            }
        }
        bytes.extend(v2::to_bytes(&tag)?);
    }
    bytes.extend_from_slice(audio);
    if let Some(record) = v1 {
        let mut trailer = V1Trailer::new();
        trailer.set_title(&record.track_name);
        trailer.set_artist(&record.artist_name);
        trailer.set_album(&record.album_name);
        trailer.set_year(&record.year);
        if let Some(number) = record.track_number.and_then(|n| u8::try_from(n).ok()) {
            trailer.set_track(number);
        }
        trailer.set_genre(&record.genre);
        bytes.extend_from_slice(trailer.as_bytes());
    }
    Ok(bytes)
}
