use library::{analyze, Checks};
use tracing::info;

use crate::cli::SearchArgs;
use crate::context::Context;
use crate::exit::{CommandError, ExitStatus, UserError};
use crate::flags::FlagResolver;
use crate::search::Search;

pub const SECTION: &str = "scan";

pub const NO_SCANS: &str = "No scans will be performed.";
pub const NO_CONCERNS: &str = "No concerns were found.";

#[derive(Clone, Debug, Default)]
pub struct ScanArgs {
    pub empty: Option<bool>,
    pub files: Option<bool>,
    pub numbering: Option<bool>,
    pub search: SearchArgs,
}

pub async fn run(ctx: &Context, args: &ScanArgs) -> Result<ExitStatus, CommandError> {
    let values = FlagResolver::new(&ctx.config, SECTION)
        .bool("empty", args.empty, false)?
        .bool("files", args.files, false)?
        .bool("numbering", args.numbering, false)?
        .finish();
    let (empty, empty_set) = values.get_bool("empty")?;
    let (files, files_set) = values.get_bool("files")?;
    let (numbering, numbering_set) = values.get_bool("numbering")?;
    let checks = Checks {
        empty,
        files,
        numbering,
    };
    if !checks.any() {
        let why = if empty_set || files_set || numbering_set {
            "The flags --empty, --files, and --numbering are all set to false."
        } else {
            "The flags --empty, --files, and --numbering are all false by default."
        };
        return Err(UserError::new(
            NO_SCANS,
            why,
            "Use one or more of --empty, --files, and --numbering, or set them in the scan section of the configuration file.",
        )
        .into());
    }

    let search = Search::resolve(ctx, &args.search)?;
    let artists = search.load(ctx, checks.files).await?;
    let mut concerns = analyze(&artists, checks);
    concerns.rollup();
    if concerns.is_empty() {
        ctx.bus().console_println(NO_CONCERNS);
    } else {
        concerns.render(ctx.bus());
    }
    info!(empty, files, numbering, "scan finished");
    Ok(ExitStatus::Success)
}
