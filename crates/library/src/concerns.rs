use std::collections::BTreeMap;
use std::fmt;

use common::Artist;

use crate::output::Bus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConcernKind {
    Empty,
    Files,
    Numbering,
    Conflict,
}

impl ConcernKind {
    pub fn name(self) -> &'static str {
        match self {
            ConcernKind::Empty => "empty",
            ConcernKind::Files => "files",
            ConcernKind::Numbering => "numbering",
            ConcernKind::Conflict => "conflict",
        }
    }
}

impl fmt::Display for ConcernKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Messages attached to one node, grouped by kind and kept sorted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Concerns {
    by_kind: BTreeMap<ConcernKind, Vec<String>>,
}

impl Concerns {
    pub fn add(&mut self, kind: ConcernKind, message: impl Into<String>) {
        let messages = self.by_kind.entry(kind).or_default();
        messages.push(message.into());
        messages.sort();
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }

    pub fn has(&self, kind: ConcernKind) -> bool {
        self.by_kind.contains_key(&kind)
    }

    pub fn messages(&self, kind: ConcernKind) -> &[String] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    /// `* [kind] message` lines in lexicographic order.
    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .by_kind
            .iter()
            .flat_map(|(kind, messages)| {
                messages
                    .iter()
                    .map(move |message| format!("* [{}] {}", kind, message))
            })
            .collect();
        lines.sort();
        lines
    }

    pub fn retain_kind(&mut self, kind: ConcernKind) {
        self.by_kind.retain(|candidate, _| *candidate == kind);
    }

    fn take_prefixed(&mut self, prefix: &str) -> Concerns {
        let mut moved = Concerns::default();
        for (kind, messages) in std::mem::take(&mut self.by_kind) {
            for message in messages {
                moved.add(kind, format!("{}{}", prefix, message));
            }
        }
        moved
    }

    fn absorb(&mut self, other: Concerns) {
        for (kind, messages) in other.by_kind {
            for message in messages {
                self.add(kind, message);
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConcernedTrack {
    pub simple_name: String,
    pub number: u32,
    pub concerns: Concerns,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConcernedAlbum {
    pub title: String,
    pub concerns: Concerns,
    /// Keyed by track file name.
    pub tracks: BTreeMap<String, ConcernedTrack>,
}

impl ConcernedAlbum {
    pub fn has_concerns(&self) -> bool {
        !self.concerns.is_empty() || self.tracks.values().any(|t| !t.concerns.is_empty())
    }

    /// Moves concerns shared by every track up to the album.
    fn rollup(&mut self) {
        if !all_share_concerns(self.tracks.values().map(|t| &t.concerns)) {
            return;
        }
        let mut shared = None;
        for track in self.tracks.values_mut() {
            let moved = track.concerns.take_prefixed("for all tracks: ");
            shared.get_or_insert(moved);
        }
        if let Some(shared) = shared {
            self.concerns.absorb(shared);
        }
    }

    /// Tracks carrying concerns, by name and then by number.
    pub fn concerned_tracks(&self) -> Vec<&ConcernedTrack> {
        let mut tracks: Vec<&ConcernedTrack> = self
            .tracks
            .values()
            .filter(|t| !t.concerns.is_empty())
            .collect();
        tracks.sort_by(|a, b| {
            a.simple_name
                .cmp(&b.simple_name)
                .then(a.number.cmp(&b.number))
        });
        tracks
    }

    fn retain_kind(&mut self, kind: ConcernKind) {
        self.concerns.retain_kind(kind);
        for track in self.tracks.values_mut() {
            track.concerns.retain_kind(kind);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConcernedArtist {
    pub name: String,
    pub concerns: Concerns,
    /// Keyed by album title.
    pub albums: BTreeMap<String, ConcernedAlbum>,
}

impl ConcernedArtist {
    pub fn has_concerns(&self) -> bool {
        !self.concerns.is_empty() || self.albums.values().any(ConcernedAlbum::has_concerns)
    }

    fn rollup(&mut self) {
        for album in self.albums.values_mut() {
            album.rollup();
        }
        if !all_share_concerns(self.albums.values().map(|a| &a.concerns)) {
            return;
        }
        let mut shared = None;
        for album in self.albums.values_mut() {
            let moved = album.concerns.take_prefixed("for all albums: ");
            shared.get_or_insert(moved);
        }
        if let Some(shared) = shared {
            self.concerns.absorb(shared);
        }
    }
}

fn all_share_concerns<'a>(mut children: impl Iterator<Item = &'a Concerns>) -> bool {
    let Some(first) = children.next() else {
        return false;
    };
    if first.is_empty() {
        return false;
    }
    let mut count = 1;
    for child in children {
        if child != first {
            return false;
        }
        count += 1;
    }
    count >= 2
}

/// Concerns mirrored onto the shape of the library graph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConcernedLibrary {
    /// Keyed by artist name.
    pub artists: BTreeMap<String, ConcernedArtist>,
}

impl ConcernedLibrary {
    pub fn new(artists: &[Artist]) -> Self {
        let artists = artists
            .iter()
            .map(|artist| {
                let albums = artist
                    .albums
                    .iter()
                    .map(|album| {
                        let tracks = album
                            .tracks
                            .iter()
                            .map(|track| {
                                (
                                    track.file_name.clone(),
                                    ConcernedTrack {
                                        simple_name: track.simple_name.clone(),
                                        number: track.number,
                                        concerns: Concerns::default(),
                                    },
                                )
                            })
                            .collect();
                        (
                            album.title.clone(),
                            ConcernedAlbum {
                                title: album.title.clone(),
                                concerns: Concerns::default(),
                                tracks,
                            },
                        )
                    })
                    .collect();
                (
                    artist.name.clone(),
                    ConcernedArtist {
                        name: artist.name.clone(),
                        concerns: Concerns::default(),
                        albums,
                    },
                )
            })
            .collect();
        Self { artists }
    }

    pub fn artist_mut(&mut self, artist: &str) -> Option<&mut ConcernedArtist> {
        self.artists.get_mut(artist)
    }

    pub fn album_mut(&mut self, artist: &str, album: &str) -> Option<&mut ConcernedAlbum> {
        self.artists.get_mut(artist)?.albums.get_mut(album)
    }

    pub fn track(&self, artist: &str, album: &str, file_name: &str) -> Option<&ConcernedTrack> {
        self.artists.get(artist)?.albums.get(album)?.tracks.get(file_name)
    }

    pub fn track_mut(
        &mut self,
        artist: &str,
        album: &str,
        file_name: &str,
    ) -> Option<&mut ConcernedTrack> {
        self.artists
            .get_mut(artist)?
            .albums
            .get_mut(album)?
            .tracks
            .get_mut(file_name)
    }

    pub fn is_empty(&self) -> bool {
        !self.artists.values().any(ConcernedArtist::has_concerns)
    }

    /// One bottom-up pass: tracks into albums, then albums into artists.
    pub fn rollup(&mut self) {
        for artist in self.artists.values_mut() {
            artist.rollup();
        }
    }

    pub fn retain_kind(&mut self, kind: ConcernKind) {
        for artist in self.artists.values_mut() {
            artist.concerns.retain_kind(kind);
            for album in artist.albums.values_mut() {
                album.retain_kind(kind);
            }
        }
    }

    /// Renders every node that carries concerns, or has a descendant that does.
    pub fn render(&self, bus: &dyn Bus) {
        for artist in self.artists.values().filter(|a| a.has_concerns()) {
            bus.console_println(&format!("Artist \"{}\"", artist.name));
            print_lines(bus, "", &artist.concerns);
            for album in artist.albums.values().filter(|a| a.has_concerns()) {
                bus.console_println(&format!("  Album \"{}\"", album.title));
                print_lines(bus, "  ", &album.concerns);
                for track in album.concerned_tracks() {
                    bus.console_println(&format!("    Track \"{}\"", track.simple_name));
                    print_lines(bus, "    ", &track.concerns);
                }
            }
        }
    }
}

fn print_lines(bus: &dyn Bus, indent: &str, concerns: &Concerns) {
    for line in concerns.lines() {
        bus.console_println(&format!("{}{}", indent, line));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RecordingBus;
    use common::{Album, Track};

    fn graph() -> Vec<Artist> {
        let mut artist = Artist::new("A", "/m/A");
        for title in ["X", "Y"] {
            let mut album = Album::new(title, format!("/m/A/{}", title));
            for (n, name) in [(1, "one"), (2, "two")] {
                let file = format!("{} {}.mp3", n, name);
                album.tracks.push(Track::new(
                    file.clone(),
                    name,
                    n,
                    format!("/m/A/{}/{}", title, file),
                ));
            }
            artist.albums.push(album);
        }
        vec![artist]
    }

    #[test]
    fn concerns_sort_on_insert() {
        let mut concerns = Concerns::default();
        concerns.add(ConcernKind::Conflict, "b");
        concerns.add(ConcernKind::Conflict, "a");
        concerns.add(ConcernKind::Empty, "z");
        assert_eq!(concerns.messages(ConcernKind::Conflict), ["a", "b"]);
        assert_eq!(
            concerns.lines(),
            vec!["* [conflict] a", "* [conflict] b", "* [empty] z"]
        );
        assert_eq!(concerns.len(), 3);
    }

    #[test]
    fn rollup_moves_shared_track_concerns_to_album() {
        let artists = graph();
        let mut library = ConcernedLibrary::new(&artists);
        for file in ["1 one.mp3", "2 two.mp3"] {
            library
                .track_mut("A", "X", file)
                .unwrap()
                .concerns
                .add(ConcernKind::Conflict, "bad");
        }
        library
            .track_mut("A", "Y", "1 one.mp3")
            .unwrap()
            .concerns
            .add(ConcernKind::Conflict, "bad");

        library.rollup();
        let x = &library.artists["A"].albums["X"];
        assert_eq!(x.concerns.messages(ConcernKind::Conflict), ["for all tracks: bad"]);
        assert!(x.tracks.values().all(|t| t.concerns.is_empty()));

        // only one of Y's tracks has the concern, so nothing moves
        let y = &library.artists["A"].albums["Y"];
        assert!(y.concerns.is_empty());
        assert!(!y.tracks["1 one.mp3"].concerns.is_empty());
        assert!(library.artists["A"].concerns.is_empty());
    }

    #[test]
    fn rollup_reaches_artist_when_all_albums_agree() {
        let artists = graph();
        let mut library = ConcernedLibrary::new(&artists);
        for album in ["X", "Y"] {
            for file in ["1 one.mp3", "2 two.mp3"] {
                library
                    .track_mut("A", album, file)
                    .unwrap()
                    .concerns
                    .add(ConcernKind::Files, "unreadable");
            }
        }
        library.rollup();
        let artist = &library.artists["A"];
        assert_eq!(
            artist.concerns.messages(ConcernKind::Files),
            ["for all albums: for all tracks: unreadable"]
        );
        assert!(artist.albums.values().all(|a| a.concerns.is_empty()));
    }

    #[test]
    fn rollup_needs_two_children() {
        let mut artist = Artist::new("Solo", "/m/Solo");
        let mut album = Album::new("Only", "/m/Solo/Only");
        album
            .tracks
            .push(Track::new("1 a.mp3", "a", 1, "/m/Solo/Only/1 a.mp3"));
        artist.albums.push(album);
        let mut library = ConcernedLibrary::new(&[artist]);
        library
            .track_mut("Solo", "Only", "1 a.mp3")
            .unwrap()
            .concerns
            .add(ConcernKind::Conflict, "bad");
        library.rollup();
        let track = library.track("Solo", "Only", "1 a.mp3").unwrap();
        assert!(track.concerns.has(ConcernKind::Conflict));
    }

    #[test]
    fn renders_only_concerned_nodes() {
        let artists = vec![
            Artist::new("Quiet", "/m/Quiet"),
            {
                let mut artist = Artist::new("A", "/m/A");
                artist.albums.push(Album::new("X", "/m/A/X"));
                artist
            },
        ];
        let mut library = ConcernedLibrary::new(&artists);
        library
            .album_mut("A", "X")
            .unwrap()
            .concerns
            .add(ConcernKind::Empty, "no tracks found");

        let bus = RecordingBus::new();
        library.render(&bus);
        assert_eq!(
            bus.console_lines(),
            vec!["Artist \"A\"", "  Album \"X\"", "  * [empty] no tracks found"]
        );
        assert!(!library.is_empty());
    }

    #[test]
    fn renders_tracks_by_name_not_file_name() {
        let mut artist = Artist::new("A", "/m/A");
        let mut album = Album::new("X", "/m/A/X");
        for (n, name) in [(2, "Bravo"), (10, "Alpha"), (11, "Charlie"), (1, "Delta")] {
            let file = format!("{} {}.mp3", n, name);
            album
                .tracks
                .push(Track::new(file.clone(), name, n, format!("/m/A/X/{}", file)));
        }
        artist.albums.push(album);
        let mut library = ConcernedLibrary::new(&[artist]);
        for file in ["1 Delta.mp3", "10 Alpha.mp3", "11 Charlie.mp3", "2 Bravo.mp3"] {
            library
                .track_mut("A", "X", file)
                .unwrap()
                .concerns
                .add(ConcernKind::Files, format!("{} is odd", file));
        }

        let bus = RecordingBus::new();
        library.render(&bus);
        let headers: Vec<String> = bus
            .console_lines()
            .into_iter()
            .filter(|line| line.starts_with("    Track"))
            .collect();
        assert_eq!(
            headers,
            vec![
                "    Track \"Alpha\"",
                "    Track \"Bravo\"",
                "    Track \"Charlie\"",
                "    Track \"Delta\"",
            ]
        );
    }

    #[test]
    fn retain_kind_filters_every_level() {
        let artists = graph();
        let mut library = ConcernedLibrary::new(&artists);
        library
            .artist_mut("A")
            .unwrap()
            .concerns
            .add(ConcernKind::Empty, "e");
        library
            .track_mut("A", "X", "1 one.mp3")
            .unwrap()
            .concerns
            .add(ConcernKind::Conflict, "c");
        library.retain_kind(ConcernKind::Conflict);
        assert!(library.artists["A"].concerns.is_empty());
        assert!(!library.is_empty());
        library.retain_kind(ConcernKind::Numbering);
        assert!(library.is_empty());
    }
}
