use library::remove_backups;
use tracing::info;

use crate::cli::SearchArgs;
use crate::context::Context;
use crate::exit::{CommandError, ExitStatus};
use crate::search::Search;

pub const NO_BACKUPS: &str = "No backup directories were found.";

pub async fn run(ctx: &Context, search: &SearchArgs) -> Result<ExitStatus, CommandError> {
    let search = Search::resolve(ctx, search)?;
    let artists = search.load(ctx, false).await?;
    let report = remove_backups(ctx.fs.as_ref(), ctx.bus(), &artists);
    info!(deleted = report.deleted, failed = report.failed.len(), "backup cleanup finished");

    if report.deleted == 0 && report.failed.is_empty() {
        ctx.bus().console_println(NO_BACKUPS);
        return Ok(ExitStatus::Success);
    }
    ctx.bus()
        .console_println(&format!("Backup directories deleted: {}.", report.deleted));
    if report.failed.is_empty() {
        return Ok(ExitStatus::Success);
    }
    ctx.bus().error_println(&format!(
        "Backup directories that could not be deleted: {}.",
        report.failed.len()
    ));
    Ok(ExitStatus::SystemError)
}
