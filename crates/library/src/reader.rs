use std::path::PathBuf;
use std::sync::Arc;

use common::Artist;
use metadata::TrackMetadata;
use tokio::sync::Semaphore;
use tokio::task;
use tracing::{debug, error};

use crate::fs::FileSystem;
use crate::track_io::read_track_metadata;

pub const MAX_OPEN_FILES: usize = 32767;
pub const DEFAULT_OPEN_FILES: usize = 1000;

/// Reads every track's metadata with at most `open_file_limit` files open at once.
///
/// Returns only after every track has its metadata set; per-track failures are
/// recorded in that track's metadata.
pub async fn read_metadata(
    fs: Arc<dyn FileSystem>,
    artists: &mut [Artist],
    open_file_limit: usize,
) {
    let permits = Arc::new(Semaphore::new(open_file_limit.clamp(1, MAX_OPEN_FILES)));
    let mut pending = Vec::new();
    for (artist_index, artist) in artists.iter().enumerate() {
        for (album_index, album) in artist.albums.iter().enumerate() {
            for (track_index, track) in album.tracks.iter().enumerate() {
                let slot = (artist_index, album_index, track_index);
                let read = read_one(fs.clone(), permits.clone(), track.path.clone());
                let handle = tokio::spawn(read);
                pending.push((slot, handle));
            }
        }
    }
    debug!(tracks = pending.len(), "reading track metadata");

    for ((artist_index, album_index, track_index), handle) in pending {
        let track = &mut artists[artist_index].albums[album_index].tracks[track_index];
        let metadata = match handle.await {
            Ok(metadata) => metadata,
            Err(err) => {
                error!(file = %track.path.display(), error = %err, "metadata read task failed");
                TrackMetadata::unreadable(&err.to_string())
            }
        };
        track.metadata = Some(metadata);
    }
}

async fn read_one(
    fs: Arc<dyn FileSystem>,
    permits: Arc<Semaphore>,
    path: PathBuf,
) -> TrackMetadata {
    let permit = match permits.acquire_owned().await {
        Ok(permit) => permit,
        Err(err) => return TrackMetadata::unreadable(&err.to_string()),
    };
    let result = task::spawn_blocking(move || {
        let _permit = permit;
        read_track_metadata(fs.as_ref(), &path)
    })
    .await;
    result.unwrap_or_else(|err| TrackMetadata::unreadable(&err.to_string()))
}
