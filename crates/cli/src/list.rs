use common::{Album, Artist, Track};
use library::analysis::{track_problems, AlbumCanon};
use library::Bus;
use metadata::v2::{
    ALBUM_FRAME, ARTIST_FRAME, CD_IDENTIFIER_FRAME, GENRE_FRAME, RECORDING_TIME_FRAME, TITLE_FRAME,
    TRACK_FRAME, YEAR_FRAME,
};
use metadata::{SourceMetadata, SourceType};

use crate::cli::SearchArgs;
use crate::context::Context;
use crate::exit::{CommandError, ExitStatus, UserError};
use crate::flags::FlagResolver;
use crate::search::Search;

pub const SECTION: &str = "list";

pub const NO_LISTING: &str = "No listing will be output.";

const CORE_FRAMES: [&str; 8] = [
    ALBUM_FRAME,
    ARTIST_FRAME,
    CD_IDENTIFIER_FRAME,
    GENRE_FRAME,
    RECORDING_TIME_FRAME,
    TITLE_FRAME,
    TRACK_FRAME,
    YEAR_FRAME,
];

#[derive(Clone, Debug, Default)]
pub struct ListArgs {
    pub artists: Option<bool>,
    pub albums: Option<bool>,
    pub tracks: Option<bool>,
    pub annotate: Option<bool>,
    pub details: Option<bool>,
    pub diagnostic: Option<bool>,
    pub by_number: Option<bool>,
    pub by_title: Option<bool>,
    pub search: SearchArgs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TrackOrder {
    Number,
    Title,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Listing {
    artists: bool,
    albums: bool,
    tracks: bool,
    annotate: bool,
    details: bool,
    diagnostic: bool,
    order: TrackOrder,
}

impl Listing {
    fn resolve(ctx: &Context, args: &ListArgs) -> Result<Self, CommandError> {
        let values = FlagResolver::new(&ctx.config, SECTION)
            .bool("artists", args.artists, false)?
            .bool("albums", args.albums, false)?
            .bool("tracks", args.tracks, false)?
            .bool("annotate", args.annotate, false)?
            .bool("details", args.details, false)?
            .bool("diagnostic", args.diagnostic, false)?
            .bool("byNumber", args.by_number, false)?
            .bool("byTitle", args.by_title, false)?
            .finish();
        let (artists, _) = values.get_bool("artists")?;
        let (albums, _) = values.get_bool("albums")?;
        let (tracks, _) = values.get_bool("tracks")?;
        let (annotate, _) = values.get_bool("annotate")?;
        let (details, _) = values.get_bool("details")?;
        let (diagnostic, _) = values.get_bool("diagnostic")?;
        let (by_number, _) = values.get_bool("byNumber")?;
        let (by_title, _) = values.get_bool("byTitle")?;

        if !artists && !albums && !tracks {
            return Err(UserError::new(
                NO_LISTING,
                "The flags --artists, --albums, and --tracks are all false.",
                "Use one or more of --artists, --albums, and --tracks.",
            )
            .into());
        }
        let order = match (by_number, by_title) {
            (true, true) => {
                return Err(UserError::new(
                    "Track sorting cannot be done.",
                    "The --byNumber and --byTitle flags are both true.",
                    "Use only one of --byNumber and --byTitle.",
                )
                .into())
            }
            (true, false) if tracks && !albums => {
                return Err(UserError::new(
                    "Sorting tracks by number not possible.",
                    "Track numbers are only meaningful within an album, and --albums is false.",
                    "Use --albums with --byNumber, or use --byTitle.",
                )
                .into())
            }
            (true, false) => TrackOrder::Number,
            (false, true) => TrackOrder::Title,
            (false, false) if albums => TrackOrder::Number,
            (false, false) => TrackOrder::Title,
        };
        Ok(Self {
            artists,
            albums,
            tracks,
            annotate,
            details,
            diagnostic,
            order,
        })
    }

    fn needs_metadata(&self) -> bool {
        self.tracks && (self.details || self.diagnostic)
    }
}

pub async fn run(ctx: &Context, args: &ListArgs) -> Result<ExitStatus, CommandError> {
    let listing = Listing::resolve(ctx, args)?;
    let search = Search::resolve(ctx, &args.search)?;
    let artists = search.load(ctx, listing.needs_metadata()).await?;
    render(ctx.bus(), &listing, &artists);
    Ok(ExitStatus::Success)
}

fn render(bus: &dyn Bus, listing: &Listing, artists: &[Artist]) {
    let mut sorted: Vec<&Artist> = artists.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    if listing.artists {
        for artist in sorted {
            bus.console_println(&format!("Artist: {}", artist.name));
            render_albums(bus, listing, &[artist], 2);
        }
    } else {
        render_albums(bus, listing, &sorted, 0);
    }
}

fn render_albums(bus: &dyn Bus, listing: &Listing, artists: &[&Artist], indent: usize) {
    let mut albums: Vec<(&Artist, &Album)> = artists
        .iter()
        .flat_map(|artist| artist.albums.iter().map(move |album| (*artist, album)))
        .collect();
    albums.sort_by(|a, b| (&a.1.title, &a.0.name).cmp(&(&b.1.title, &b.0.name)));
    if !listing.albums {
        render_tracks(bus, listing, &albums, indent);
        return;
    }
    for (artist, album) in albums {
        let mut line = format!("{}Album: {}", pad(indent), album.title);
        if listing.annotate && !listing.artists {
            line.push_str(&format!(" by \"{}\"", artist.name));
        }
        bus.console_println(&line);
        render_tracks(bus, listing, &[(artist, album)], indent + 2);
    }
}

fn render_tracks(bus: &dyn Bus, listing: &Listing, albums: &[(&Artist, &Album)], indent: usize) {
    if !listing.tracks {
        return;
    }
    let canons: Vec<AlbumCanon> = albums
        .iter()
        .map(|(_, album)| AlbumCanon::of(album))
        .collect();
    let mut entries: Vec<(usize, &Track)> = albums
        .iter()
        .enumerate()
        .flat_map(|(index, (_, album))| album.tracks.iter().map(move |track| (index, track)))
        .collect();
    match listing.order {
        TrackOrder::Number => entries.sort_by(|a, b| {
            (a.1.number, &a.1.simple_name).cmp(&(b.1.number, &b.1.simple_name))
        }),
        TrackOrder::Title => entries.sort_by(|a, b| {
            let left = (&a.1.simple_name, &albums[a.0].1.title, &albums[a.0].0.name);
            let right = (&b.1.simple_name, &albums[b.0].1.title, &albums[b.0].0.name);
            left.cmp(&right)
        }),
    }
    for (index, track) in entries {
        let (artist, album) = albums[index];
        let mut line = match listing.order {
            TrackOrder::Number => format!("{}{}. {}", pad(indent), track.number, track.simple_name),
            TrackOrder::Title => format!("{}{}", pad(indent), track.simple_name),
        };
        if listing.annotate {
            if !listing.albums {
                line.push_str(&format!(" on \"{}\"", album.title));
            }
            if !listing.artists {
                line.push_str(&format!(" by \"{}\"", artist.name));
            }
        }
        bus.console_println(&line);
        if listing.details {
            render_details(bus, artist, album, track, &canons[index], indent + 2);
        }
        if listing.diagnostic {
            render_diagnostic(bus, track, indent + 2);
        }
    }
}

/// Metadata problems, then every frame outside the fields the tool manages.
fn render_details(
    bus: &dyn Bus,
    artist: &Artist,
    album: &Album,
    track: &Track,
    canon: &AlbumCanon,
    indent: usize,
) {
    let mut lines: Vec<String> = track_problems(artist, album, track, canon)
        .into_iter()
        .map(|(kind, message)| format!("* [{}] {}", kind, message))
        .collect();
    if let Some(metadata) = track.metadata.as_ref() {
        for (id, values) in &metadata.v2.frame_strings {
            if CORE_FRAMES.contains(&id.as_str()) {
                continue;
            }
            for value in values {
                lines.push(format!("{} = {:?}", id, value));
            }
        }
    }
    if lines.is_empty() {
        return;
    }
    bus.console_println(&format!("{}Details:", pad(indent)));
    for line in lines {
        bus.console_println(&format!("{}{}", pad(indent + 2), line));
    }
}

fn render_diagnostic(bus: &dyn Bus, track: &Track, indent: usize) {
    let Some(metadata) = track.metadata.as_ref() else {
        bus.console_println(&format!("{}metadata has not been read", pad(indent)));
        return;
    };
    for source in [SourceType::V2, SourceType::V1] {
        for line in diagnostic_lines(source, metadata.source(source)) {
            bus.console_println(&format!("{}{}", pad(indent), line));
        }
    }
}

fn diagnostic_lines(source: SourceType, record: &SourceMetadata) -> Vec<String> {
    let name = source.name();
    if let Some(error) = &record.error {
        return vec![format!("{} error: {}", name, error)];
    }
    match source {
        SourceType::V2 => {
            let mut lines = Vec::new();
            if let Some(version) = record.version {
                lines.push(format!("{} version: {}", name, version));
            }
            for (id, values) in &record.frame_strings {
                for value in values {
                    lines.push(format!("{} {} = {:?}", name, id, value));
                }
            }
            lines
        }
        SourceType::V1 => {
            let number = record
                .track_number
                .map(|n| n.to_string())
                .unwrap_or_default();
            vec![
                format!("{} artist = {:?}", name, record.artist_name),
                format!("{} album = {:?}", name, record.album_name),
                format!("{} title = {:?}", name, record.track_name),
                format!("{} track = {:?}", name, number),
                format!("{} year = {:?}", name, record.year),
                format!("{} genre = {:?}", name, record.genre),
            ]
        }
    }
}

fn pad(indent: usize) -> String {
    " ".repeat(indent)
}
