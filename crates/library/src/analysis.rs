use std::collections::{BTreeMap, BTreeSet};

use common::{names_match, Album, Artist, Track};
use metadata::{genre_code, genre_name, genres_match, SourceMetadata, SourceType, TrackMetadata};
use metadata::{v1::render_field, V1_TEXT_LEN, V1_YEAR_LEN};

use crate::concerns::{ConcernKind, ConcernedLibrary};

pub const NO_ALBUMS: &str = "no albums found";
pub const NO_TRACKS: &str = "no tracks found";
pub const NOT_READ: &str = "differences cannot be determined: metadata has not been read";
pub const READ_ERROR: &str = "differences cannot be determined: there was an error reading metadata";
pub const TRACK_NUMBER_CONFLICT: &str = "the track number field does not match the track's file name";
pub const TRACK_NAME_CONFLICT: &str = "the track name field does not match the track's file name";
pub const ALBUM_NAME_CONFLICT: &str = "the album name field does not match the name of the album directory";
pub const ARTIST_NAME_CONFLICT: &str = "the artist name field does not match the name of the artist directory";
pub const CD_IDENTIFIER_CONFLICT: &str = "the music CD identifier field does not match the other tracks in the album";
pub const YEAR_CONFLICT: &str = "the year field does not match the other tracks in the album";
pub const GENRE_CONFLICT: &str = "the genre field does not match the other tracks in the album";

/// Which families of checks to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Checks {
    /// Artists without albums, albums without tracks.
    pub empty: bool,
    /// Metadata against file names and album peers.
    pub files: bool,
    /// Duplicate and missing track numbers.
    pub numbering: bool,
}

impl Checks {
    pub fn any(self) -> bool {
        self.empty || self.files || self.numbering
    }
}

/// Values every track in an album should share, chosen by plurality.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlbumCanon {
    pub year: String,
    pub genre: String,
    pub cd_identifier: Vec<u8>,
}

impl AlbumCanon {
    /// Year and genre vote by canonical source; the CD identifier only by readable v2
    /// sources, since v1 cannot carry one.
    pub fn of(album: &Album) -> Self {
        let metadata: Vec<&TrackMetadata> = album
            .tracks
            .iter()
            .filter_map(|track| track.metadata.as_ref())
            .collect();
        let canonical: Vec<&SourceMetadata> = metadata
            .iter()
            .filter_map(|m| m.canonical_source())
            .collect();
        let cd_identifiers = metadata
            .iter()
            .map(|m| &m.v2)
            .filter(|v2| v2.is_readable())
            .map(|v2| v2.cd_identifier.clone());
        Self {
            year: plurality(canonical.iter().map(|s| s.year.clone())),
            genre: plurality(canonical.iter().map(|s| s.genre.clone())),
            cd_identifier: plurality(cd_identifiers),
        }
    }
}

/// Most frequent value; ties go to the smallest.
fn plurality<T: Ord + Default>(values: impl Iterator<Item = T>) -> T {
    let mut counts: BTreeMap<T, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }
    let mut best: Option<(T, usize)> = None;
    for (value, count) in counts {
        match &best {
            Some((_, best_count)) if *best_count >= count => {}
            _ => best = Some((value, count)),
        }
    }
    best.map(|(value, _)| value).unwrap_or_default()
}

/// Per-field target values for one track: the canonical value when it already agrees
/// with the file system, otherwise the file system name.
struct Corrected<'a> {
    track_name: String,
    album_name: String,
    artist_name: String,
    canon: &'a AlbumCanon,
}

impl<'a> Corrected<'a> {
    fn new(
        artist: &Artist,
        album: &Album,
        track: &Track,
        canonical: &SourceMetadata,
        canon: &'a AlbumCanon,
    ) -> Self {
        let choose = |value: &str, fs_name: &str| {
            if names_match(value, fs_name) {
                value.to_string()
            } else {
                fs_name.to_string()
            }
        };
        Self {
            track_name: choose(&canonical.track_name, &track.simple_name),
            album_name: choose(&canonical.album_name, &album.title),
            artist_name: choose(&canonical.artist_name, &artist.name),
            canon,
        }
    }
}

fn v1_text_matches(value: &str, fs_name: &str, corrected: &str) -> bool {
    names_match(value, &render_field(fs_name, V1_TEXT_LEN))
        || value == render_field(corrected, V1_TEXT_LEN)
}

fn v1_genre(genre: &str) -> &'static str {
    genre_name(genre_code(genre))
}

/// Which field of one source disagrees with where it should be.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Mismatches {
    track_number: bool,
    track_name: bool,
    album_name: bool,
    artist_name: bool,
    year: bool,
    genre: bool,
    cd_identifier: bool,
}

impl Mismatches {
    fn any(&self) -> bool {
        self.track_number
            || self.track_name
            || self.album_name
            || self.artist_name
            || self.year
            || self.genre
            || self.cd_identifier
    }
}

fn mismatches(
    source: SourceType,
    record: &SourceMetadata,
    artist: &Artist,
    album: &Album,
    track: &Track,
    corrected: &Corrected<'_>,
) -> Mismatches {
    match source {
        SourceType::V2 => Mismatches {
            track_number: record.track_number != Some(track.number),
            track_name: !names_match(&record.track_name, &track.simple_name),
            album_name: !names_match(&record.album_name, &album.title),
            artist_name: !names_match(&record.artist_name, &artist.name),
            year: record.year != corrected.canon.year,
            genre: !genres_match(&record.genre, &corrected.canon.genre),
            cd_identifier: record.cd_identifier != corrected.canon.cd_identifier,
        },
        SourceType::V1 => Mismatches {
            track_number: track.number <= u32::from(u8::MAX)
                && record.track_number != Some(track.number),
            track_name: !v1_text_matches(
                &record.track_name,
                &track.simple_name,
                &corrected.track_name,
            ),
            album_name: !v1_text_matches(&record.album_name, &album.title, &corrected.album_name),
            artist_name: !v1_text_matches(
                &record.artist_name,
                &artist.name,
                &corrected.artist_name,
            ),
            year: record.year != render_field(&corrected.canon.year, V1_YEAR_LEN),
            genre: !record.genre.eq_ignore_ascii_case(v1_genre(&corrected.canon.genre)),
            cd_identifier: false,
        },
    }
}

/// Concerns about one track's metadata, sorted and without duplicates.
pub fn track_problems(
    artist: &Artist,
    album: &Album,
    track: &Track,
    canon: &AlbumCanon,
) -> Vec<(ConcernKind, String)> {
    let Some(metadata) = track.metadata.as_ref() else {
        return vec![(ConcernKind::Files, NOT_READ.to_string())];
    };
    let Some(canonical) = metadata.canonical_source() else {
        return vec![(ConcernKind::Files, READ_ERROR.to_string())];
    };
    let corrected = Corrected::new(artist, album, track, canonical, canon);
    let mut problems = BTreeSet::new();
    for source in metadata.readable_sources() {
        let found = mismatches(source, metadata.source(source), artist, album, track, &corrected);
        let sentences = [
            (found.track_number, TRACK_NUMBER_CONFLICT),
            (found.track_name, TRACK_NAME_CONFLICT),
            (found.album_name, ALBUM_NAME_CONFLICT),
            (found.artist_name, ARTIST_NAME_CONFLICT),
            (found.year, YEAR_CONFLICT),
            (found.genre, GENRE_CONFLICT),
            (found.cd_identifier, CD_IDENTIFIER_CONFLICT),
        ];
        for (mismatch, sentence) in sentences {
            if mismatch {
                problems.insert((ConcernKind::Conflict, sentence.to_string()));
            }
        }
    }
    problems.into_iter().collect()
}

/// The metadata a track should carry, or `None` when it cannot be determined.
///
/// Only readable sources are touched, and fields that already agree keep their value.
pub fn desired_metadata(
    artist: &Artist,
    album: &Album,
    track: &Track,
    canon: &AlbumCanon,
) -> Option<TrackMetadata> {
    let metadata = track.metadata.as_ref()?;
    let canonical = metadata.canonical_source()?;
    let corrected = Corrected::new(artist, album, track, canonical, canon);
    let mut desired = metadata.clone();
    for source in metadata.readable_sources() {
        let found = mismatches(source, metadata.source(source), artist, album, track, &corrected);
        if !found.any() {
            continue;
        }
        let record = desired.source_mut(source);
        if found.track_number {
            record.track_number = Some(track.number);
        }
        if found.track_name {
            record.track_name = corrected.track_name.clone();
        }
        if found.album_name {
            record.album_name = corrected.album_name.clone();
        }
        if found.artist_name {
            record.artist_name = corrected.artist_name.clone();
        }
        if found.year {
            record.year = canon.year.clone();
        }
        if found.genre {
            record.genre = canon.genre.clone();
        }
        if found.cd_identifier {
            record.cd_identifier = canon.cd_identifier.clone();
        }
    }
    Some(desired)
}

/// Duplicate-number and gap concerns for an album.
///
/// `numbers` maps each track number to the simple names using it; `max_track` is the
/// album's track count.
pub fn generate_numbering_concerns(
    numbers: &BTreeMap<u32, Vec<String>>,
    max_track: usize,
) -> Vec<String> {
    let mut concerns = Vec::new();
    for (number, names) in numbers {
        if names.len() > 1 {
            let mut sorted = names.clone();
            sorted.sort();
            concerns.push(format!(
                "multiple tracks identified as track {}: {}",
                number,
                quoted_list(&sorted)
            ));
        }
    }

    let highest = numbers.keys().next_back().copied().unwrap_or(0);
    let limit = highest.max(u32::try_from(max_track).unwrap_or(u32::MAX));
    let mut gaps = Vec::new();
    let mut gap_start: Option<u32> = None;
    for number in 1..=limit {
        let present = numbers.contains_key(&number);
        match (present, gap_start) {
            (false, None) => gap_start = Some(number),
            (true, Some(start)) => {
                gaps.push(render_range(start, number - 1));
                gap_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = gap_start {
        gaps.push(render_range(start, limit));
    }
    if !gaps.is_empty() {
        concerns.push(format!("missing tracks identified: {}", gaps.join(", ")));
    }
    concerns
}

fn quoted_list(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|name| format!("\"{}\"", name)).collect();
    match quoted.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{} and {}", rest.join(", "), last),
        Some((last, _)) => last.clone(),
        None => String::new(),
    }
}

fn render_range(low: u32, high: u32) -> String {
    if low == high {
        low.to_string()
    } else {
        format!("{}-{}", low, high)
    }
}

/// Runs the selected checks over the graph. The result is not rolled up.
pub fn analyze(artists: &[Artist], checks: Checks) -> ConcernedLibrary {
    let mut library = ConcernedLibrary::new(artists);
    for artist in artists {
        if checks.empty && artist.albums.is_empty() {
            if let Some(node) = library.artist_mut(&artist.name) {
                node.concerns.add(ConcernKind::Empty, NO_ALBUMS);
            }
        }
        for album in &artist.albums {
            if checks.empty && album.tracks.is_empty() {
                if let Some(node) = library.album_mut(&artist.name, &album.title) {
                    node.concerns.add(ConcernKind::Empty, NO_TRACKS);
                }
            }
            if checks.numbering && !album.tracks.is_empty() {
                let mut numbers: BTreeMap<u32, Vec<String>> = BTreeMap::new();
                for track in &album.tracks {
                    numbers
                        .entry(track.number)
                        .or_default()
                        .push(track.simple_name.clone());
                }
                if let Some(node) = library.album_mut(&artist.name, &album.title) {
                    for message in generate_numbering_concerns(&numbers, album.tracks.len()) {
                        node.concerns.add(ConcernKind::Numbering, message);
                    }
                }
            }
            if checks.files {
                let canon = AlbumCanon::of(album);
                for track in &album.tracks {
                    let problems = track_problems(artist, album, track, &canon);
                    let node = library.track_mut(&artist.name, &album.title, &track.file_name);
                    if let Some(node) = node {
                        for (kind, message) in problems {
                            node.concerns.add(kind, message);
                        }
                    }
                }
            }
        }
    }
    library
}
