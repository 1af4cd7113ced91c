use common::Artist;
use library::fs::EntryKind;
use library::{read_metadata, scan, SearchParams, MAX_OPEN_FILES};
use regex::Regex;
use tracing::{info, warn};

use crate::cli::SearchArgs;
use crate::context::Context;
use crate::exit::{CommandError, UserError};
use crate::flags::FlagResolver;

pub const SECTION: &str = "search";

const DEFAULT_TOP_DIR: &str = "$HOME/Music";
const DEFAULT_FILTER: &str = ".*";
const DEFAULT_EXTENSIONS: &str = ".mp3";
const DEFAULT_MAX_OPEN_FILES: i64 = 1000;

pub const NO_MUSIC: &str = "No music files could be found using the specified parameters.";

/// Validated search flags, ready to drive the scanner and reader.
#[derive(Clone, Debug)]
pub struct Search {
    pub params: SearchParams,
    pub max_open_files: usize,
}

impl Search {
    /// Resolves the search flags against the config file and validates them.
    pub fn resolve(ctx: &Context, args: &SearchArgs) -> Result<Self, CommandError> {
        let values = FlagResolver::new(&ctx.config, SECTION)
            .path("topDir", args.top_dir.as_deref(), DEFAULT_TOP_DIR)?
            .string("albumFilter", args.album_filter.as_deref(), DEFAULT_FILTER)?
            .string("artistFilter", args.artist_filter.as_deref(), DEFAULT_FILTER)?
            .string("trackFilter", args.track_filter.as_deref(), DEFAULT_FILTER)?
            .string("extensions", args.extensions.as_deref(), DEFAULT_EXTENSIONS)?
            .int("maxOpenFiles", args.max_open_files, DEFAULT_MAX_OPEN_FILES)?
            .finish();

        let (top_dir, _) = values.get_string("topDir")?;
        let (album_filter, _) = values.get_string("albumFilter")?;
        let (artist_filter, _) = values.get_string("artistFilter")?;
        let (track_filter, _) = values.get_string("trackFilter")?;
        let (extensions, _) = values.get_string("extensions")?;
        let (max_open_files, _) = values.get_int("maxOpenFiles")?;

        let params = SearchParams {
            music_root: top_dir.clone().into(),
            artist_filter: filter("artistFilter", &artist_filter)?,
            album_filter: filter("albumFilter", &album_filter)?,
            track_filter: filter("trackFilter", &track_filter)?,
            extensions: parse_extensions(&extensions)?,
        };
        if !matches!(ctx.fs.stat(&params.music_root), Ok(EntryKind::Dir)) {
            return Err(UserError::new(
                format!("The --topDir value \"{}\" cannot be used.", top_dir),
                "The value is not the name of a readable directory.",
                "Set --topDir, or topDir in the search section of the configuration file, to your music directory.",
            )
            .into());
        }
        Ok(Self {
            params,
            max_open_files: clamp_open_files(ctx, max_open_files),
        })
    }

    /// Builds the library graph; the graph must not be empty.
    ///
    /// Track metadata is read only when `with_metadata` is set.
    pub async fn load(
        &self,
        ctx: &Context,
        with_metadata: bool,
    ) -> Result<Vec<Artist>, CommandError> {
        let mut artists = scan(ctx.fs.as_ref(), &self.params).map_err(|err| {
            UserError::new(
                "The --extensions value cannot be used.",
                format!("A track name pattern could not be built: {}.", err),
                "Use extensions made of a dot followed by letters and digits.",
            )
        })?;
        if artists.is_empty() {
            return Err(UserError::new(
                NO_MUSIC,
                format!(
                    "No artist directories under \"{}\" matched the filters.",
                    self.params.music_root.display()
                ),
                "Check the --topDir, --extensions, and filter values.",
            )
            .into());
        }
        if with_metadata {
            read_metadata(ctx.fs.clone(), &mut artists, self.max_open_files).await;
        }
        info!(
            artists = artists.len(),
            tracks = artists.iter().map(Artist::track_count).sum::<usize>(),
            "library loaded"
        );
        Ok(artists)
    }
}

fn filter(flag: &str, pattern: &str) -> Result<Regex, UserError> {
    Regex::new(pattern).map_err(|err| {
        UserError::new(
            format!("The --{} value \"{}\" cannot be used.", flag, pattern),
            format!("The value is not a valid regular expression: {}.", err),
            "Correct the regular expression and try again.",
        )
    })
}

fn parse_extensions(value: &str) -> Result<Vec<String>, UserError> {
    let shape = Regex::new(r"^\.\w+$").map_err(|err| {
        UserError::new(
            "The --extensions value cannot be checked.",
            err.to_string(),
            "Report this problem.",
        )
    })?;
    let mut extensions = Vec::new();
    for candidate in value.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        if !shape.is_match(candidate) {
            return Err(UserError::new(
                format!("The --extensions value \"{}\" cannot be used.", value),
                format!(
                    "The extension \"{}\" is not a dot followed by letters and digits.",
                    candidate
                ),
                "Provide extensions such as \".mp3\", separated by commas.",
            ));
        }
        extensions.push(candidate.to_string());
    }
    if extensions.is_empty() {
        return Err(UserError::new(
            "The --extensions value is empty.",
            "At least one extension is needed to recognize track files.",
            "Provide extensions such as \".mp3\", separated by commas.",
        ));
    }
    Ok(extensions)
}

fn clamp_open_files(ctx: &Context, requested: i64) -> usize {
    let clamped = requested.clamp(1, MAX_OPEN_FILES as i64);
    if clamped != requested {
        ctx.bus().error_println(&format!(
            "The --maxOpenFiles value {} is out of range; {} will be used instead.",
            requested, clamped
        ));
        warn!(requested, used = clamped, "maxOpenFiles clamped");
    }
    clamped as usize
}
