use library::{repair, DirtyHook};
use tracing::warn;

use crate::cli::SearchArgs;
use crate::context::Context;
use crate::dirty::DirtyMarker;
use crate::exit::{CommandError, ExitStatus};
use crate::flags::FlagResolver;
use crate::search::Search;

pub const SECTION: &str = "repair";

#[derive(Clone, Debug, Default)]
pub struct RepairArgs {
    pub dry_run: Option<bool>,
    pub search: SearchArgs,
}

pub async fn run(ctx: &Context, args: &RepairArgs) -> Result<ExitStatus, CommandError> {
    let marker = DirtyMarker::new(ctx.fs.clone(), &ctx.config.data_dir());
    run_with(ctx, args, &marker).await
}

pub async fn run_with(
    ctx: &Context,
    args: &RepairArgs,
    hook: &dyn DirtyHook,
) -> Result<ExitStatus, CommandError> {
    let values = FlagResolver::new(&ctx.config, SECTION)
        .bool("dryRun", args.dry_run, false)?
        .finish();
    let (dry_run, _) = values.get_bool("dryRun")?;

    let search = Search::resolve(ctx, &args.search)?;
    let artists = search.load(ctx, true).await?;
    let report = repair(ctx.fs.as_ref(), ctx.bus(), hook, &artists, dry_run);
    if report.system_error() {
        warn!(failed = report.failed, "some tracks could not be repaired");
        return Ok(ExitStatus::SystemError);
    }
    Ok(ExitStatus::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use library::{Bus, MemoryFileSystem, RecordingBus, BACKUP_DIR};
    use metadata::{compose, SourceMetadata};
    use parking_lot::Mutex;
    use std::path::Path;
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingHook {
        calls: Mutex<usize>,
    }

    impl DirtyHook for CountingHook {
        fn mark_dirty(&self, _bus: &dyn Bus) {
            *self.calls.lock() += 1;
        }
    }

    fn dirty_library(fs: &MemoryFileSystem, artists: u32, albums: u32, tracks: u32) {
        for a in 1..=artists {
            for b in 1..=albums {
                for t in 1..=tracks {
                    let tag = SourceMetadata {
                        artist_name: format!("Artist {}", a),
                        album_name: format!("Album {}", b),
                        track_name: format!("Song {}", t),
                        track_number: Some(99),
                        ..SourceMetadata::default()
                    };
                    fs.add_file(
                        format!("/m/Artist {}/Album {}/{} Song {}.mp3", a, b, t, t),
                        compose(Some(&tag), Some(&tag), b"audio").unwrap(),
                    );
                }
            }
        }
    }

    fn context(fs: Arc<MemoryFileSystem>, bus: Arc<RecordingBus>) -> Context {
        let config = Config::parse(Path::new("/cfg/defaults.yaml"), "").unwrap();
        Context::new(fs, bus, config)
    }

    fn args(dry_run: bool) -> RepairArgs {
        RepairArgs {
            dry_run: Some(dry_run),
            search: SearchArgs {
                top_dir: Some("/m".to_string()),
                ..SearchArgs::default()
            },
        }
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let fs = Arc::new(MemoryFileSystem::new());
        dirty_library(&fs, 1, 1, 3);
        let bus = Arc::new(RecordingBus::new());
        let hook = CountingHook::default();
        let status = run_with(&context(fs.clone(), bus.clone()), &args(true), &hook)
            .await
            .unwrap();
        assert_eq!(status, ExitStatus::Success);
        assert_eq!(fs.write_count(), 0);
        assert_eq!(*hook.calls.lock(), 0);
        assert_eq!(
            bus.console_lines()[0],
            "The following concerns can be repaired:"
        );
    }

    #[tokio::test]
    async fn repairs_every_track() {
        let fs = Arc::new(MemoryFileSystem::new());
        dirty_library(&fs, 2, 3, 4);
        let bus = Arc::new(RecordingBus::new());
        let hook = CountingHook::default();
        let ctx = context(fs.clone(), bus.clone());
        let status = run_with(&ctx, &args(false), &hook).await.unwrap();
        assert_eq!(status, ExitStatus::Success);
        let repaired = bus
            .console_lines()
            .iter()
            .filter(|line| line.ends_with("repaired."))
            .count();
        assert_eq!(repaired, 24);
        assert_eq!(*hook.calls.lock(), 24);
        assert!(fs.exists("/m/Artist 1/Album 1/pre-repair-backup/1.mp3"));

        fs.reset_write_count();
        let again = RecordingBus::new();
        let ctx = Context::new(fs.clone(), Arc::new(again), ctx.config.clone());
        assert_eq!(run_with(&ctx, &args(false), &hook).await.unwrap(), ExitStatus::Success);
        assert_eq!(fs.write_count(), 0);
    }

    #[tokio::test]
    async fn existing_backup_is_a_system_error() {
        let fs = Arc::new(MemoryFileSystem::new());
        dirty_library(&fs, 1, 1, 1);
        let backup = format!("/m/Artist 1/Album 1/{}/1.mp3", BACKUP_DIR);
        fs.add_file(&backup, b"older".to_vec());
        let bus = Arc::new(RecordingBus::new());
        let hook = CountingHook::default();
        let status = run_with(&context(fs.clone(), bus.clone()), &args(false), &hook)
            .await
            .unwrap();
        assert_eq!(status, ExitStatus::SystemError);
        assert_eq!(status.code(), 3);
        assert_eq!(
            bus.error_lines(),
            vec![
                format!(
                    "The backup file for track file \"/m/Artist 1/Album 1/1 Song 1.mp3\", \"{}\", already exists.",
                    backup
                ),
                "The track file \"/m/Artist 1/Album 1/1 Song 1.mp3\" will not be repaired.".to_string(),
            ]
        );
        assert_eq!(*hook.calls.lock(), 0);
    }
}
