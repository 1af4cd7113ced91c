mod cli;
mod config;
mod context;
mod dirty;
mod exit;
mod flags;
mod list;
mod post_repair;
mod repair;
mod scan;
mod search;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use cli::{Args, Command};
use config::{config_path_from_env, Config};
use context::Context;
use exit::{CommandError, ExitStatus};
use library::{Bus, ConsoleBus, OsFileSystem};
use list::ListArgs;
use repair::RepairArgs;
use scan::ScanArgs;
use tracing::debug;

#[tokio::main]
async fn main() -> ExitCode {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let bus: Arc<dyn Bus> = Arc::new(ConsoleBus);
    let config_path = config_path_from_env();
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            err.to_user_error(&config_path).report(bus.as_ref());
            return ExitCode::from(ExitStatus::UserError.code());
        }
    };
    let ctx = Context::new(Arc::new(OsFileSystem), bus, config);

    let status = match dispatch(&ctx, args.cmd).await {
        Ok(status) => status,
        Err(err) => {
            err.report(ctx.bus());
            err.exit_status()
        }
    };
    debug!(code = status.code(), "exiting");
    ExitCode::from(status.code())
}

async fn dispatch(ctx: &Context, cmd: Command) -> Result<ExitStatus, CommandError> {
    match cmd {
        Command::Scan {
            empty,
            files,
            numbering,
            search,
        } => {
            let args = ScanArgs {
                empty,
                files,
                numbering,
                search,
            };
            scan::run(ctx, &args).await
        }
        Command::Repair { dry_run, search } => {
            repair::run(ctx, &RepairArgs { dry_run, search }).await
        }
        Command::List {
            artists,
            albums,
            tracks,
            annotate,
            details,
            diagnostic,
            by_number,
            by_title,
            search,
        } => {
            let args = ListArgs {
                artists,
                albums,
                tracks,
                annotate,
                details,
                diagnostic,
                by_number,
                by_title,
                search,
            };
            list::run(ctx, &args).await
        }
        Command::PostRepair { search } => post_repair::run(ctx, &search).await,
    }
}
