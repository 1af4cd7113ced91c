use metadata::MetadataError;

pub mod analysis;
pub mod concerns;
pub mod fs;
pub mod output;
pub mod reader;
pub mod repair;
pub mod scanner;
pub mod track_io;

pub use analysis::{analyze, Checks};
pub use concerns::{ConcernKind, ConcernedLibrary};
pub use fs::{FileSystem, MemoryFileSystem, OsFileSystem};
pub use output::{Bus, ConsoleBus, RecordingBus};
pub use reader::{read_metadata, MAX_OPEN_FILES};
pub use repair::{remove_backups, repair, DirtyHook, BACKUP_DIR};
pub use scanner::{scan, SearchParams};

#[derive(Debug)]
pub enum LibraryError {
    Io(std::io::Error),
    Metadata(Vec<MetadataError>),
    Verification(String),
}

impl LibraryError {
    /// True when the only complaint is that the file already holds the desired metadata.
    pub fn is_no_edit_required(&self) -> bool {
        match self {
            LibraryError::Metadata(errors) => {
                !errors.is_empty()
                    && errors
                        .iter()
                        .all(|err| matches!(err, MetadataError::NoEditRequired))
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Io(err) => write!(f, "io error: {}", err),
            LibraryError::Metadata(errors) => {
                let rendered: Vec<String> = errors.iter().map(ToString::to_string).collect();
                write!(f, "{}", rendered.join("; "))
            }
            LibraryError::Verification(detail) => write!(f, "verification failed: {}", detail),
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Io(err)
    }
}

impl From<Vec<MetadataError>> for LibraryError {
    fn from(errors: Vec<MetadataError>) -> Self {
        LibraryError::Metadata(errors)
    }
}
