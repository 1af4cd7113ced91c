use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "mp3repair",
    version,
    about = "Inspect and repair the metadata of a music library"
)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report problems with the music library
    Scan {
        /// Report artists without albums and albums without tracks
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        empty: Option<bool>,
        /// Report metadata that disagrees with file names or album peers
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        files: Option<bool>,
        /// Report duplicate and missing track numbers
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        numbering: Option<bool>,
        #[command(flatten)]
        search: SearchArgs,
    },

    /// Rewrite track metadata so it agrees with file names and album peers
    Repair {
        /// Print what would be repaired without changing anything
        #[arg(long = "dryRun", num_args = 0..=1, default_missing_value = "true")]
        dry_run: Option<bool>,
        #[command(flatten)]
        search: SearchArgs,
    },

    /// List artists, albums, and tracks
    List {
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        artists: Option<bool>,
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        albums: Option<bool>,
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        tracks: Option<bool>,
        /// Name the owning album and artist on each line
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        annotate: Option<bool>,
        /// Print each track's metadata problems and extra frames
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        details: Option<bool>,
        /// Print each track's raw metadata records
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        diagnostic: Option<bool>,
        /// Sort tracks by track number
        #[arg(long = "byNumber", num_args = 0..=1, default_missing_value = "true")]
        by_number: Option<bool>,
        /// Sort tracks by title
        #[arg(long = "byTitle", num_args = 0..=1, default_missing_value = "true")]
        by_title: Option<bool>,
        #[command(flatten)]
        search: SearchArgs,
    },

    /// Delete the backup directories created by repair
    #[command(name = "postRepair")]
    PostRepair {
        #[command(flatten)]
        search: SearchArgs,
    },
}

/// Flags shared by every command for locating tracks.
#[derive(ClapArgs, Debug, Default, Clone)]
pub struct SearchArgs {
    /// Top directory of the music library
    #[arg(long = "topDir")]
    pub top_dir: Option<String>,
    /// Regular expression selecting albums
    #[arg(long = "albumFilter")]
    pub album_filter: Option<String>,
    /// Regular expression selecting artists
    #[arg(long = "artistFilter")]
    pub artist_filter: Option<String>,
    /// Regular expression selecting tracks
    #[arg(long = "trackFilter")]
    pub track_filter: Option<String>,
    /// Comma-separated track file extensions
    #[arg(long)]
    pub extensions: Option<String>,
    /// Most track files to open at once
    #[arg(long = "maxOpenFiles")]
    pub max_open_files: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_camel_case_flags() {
        let args = Args::try_parse_from([
            "mp3repair",
            "repair",
            "--dryRun",
            "--topDir",
            "/music",
            "--maxOpenFiles",
            "12",
        ])
        .unwrap();
        match args.cmd {
            Command::Repair { dry_run, search } => {
                assert_eq!(dry_run, Some(true));
                assert_eq!(search.top_dir.as_deref(), Some("/music"));
                assert_eq!(search.max_open_files, Some(12));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn bool_flags_take_optional_values() {
        let args = Args::try_parse_from(["mp3repair", "scan", "--empty=false", "--files"]).unwrap();
        match args.cmd {
            Command::Scan {
                empty,
                files,
                numbering,
                ..
            } => {
                assert_eq!(empty, Some(false));
                assert_eq!(files, Some(true));
                assert_eq!(numbering, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
        let args = Args::try_parse_from(["mp3repair", "postRepair"]).unwrap();
        assert!(matches!(args.cmd, Command::PostRepair { .. }));
    }
}
