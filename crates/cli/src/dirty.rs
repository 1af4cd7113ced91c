use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use library::{Bus, DirtyHook, FileSystem};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DIRTY_FILE: &str = "metadata.dirty";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirtyRecord {
    /// Seconds since the Unix epoch.
    pub marked_at: u64,
}

/// Records that track metadata changed since the library was last indexed.
#[derive(Clone)]
pub struct DirtyMarker {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl DirtyMarker {
    pub fn new(fs: Arc<dyn FileSystem>, data_dir: &Path) -> Self {
        Self {
            fs,
            path: data_dir.join(DIRTY_FILE),
        }
    }

    fn write(&self) -> Result<(), String> {
        let marked_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        let bytes = serde_json::to_vec(&DirtyRecord { marked_at }).map_err(|err| err.to_string())?;
        self.fs
            .write_file(&self.path, &bytes)
            .map_err(|err| err.to_string())
    }
}

impl DirtyHook for DirtyMarker {
    fn mark_dirty(&self, bus: &dyn Bus) {
        match self.write() {
            Ok(()) => debug!(path = %self.path.display(), "metadata marked dirty"),
            Err(err) => {
                bus.error_println(&format!(
                    "The file \"{}\" cannot be written: {}.",
                    self.path.display(),
                    err
                ));
                warn!(path = %self.path.display(), error = %err, "cannot mark metadata dirty");
            }
        }
    }
}
