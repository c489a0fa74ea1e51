// Error types shared by the scanner, the playlist model and the playback side

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShuffleError {
    #[error("root path does not exist: {}", .0.display())]
    RootMissing(PathBuf),

    #[error("failed to enumerate {}: {source}", path.display())]
    Enumeration {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to resolve {}: {source}", path.display())]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to launch player '{command}': {source}")]
    PlayerLaunch {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("player error: {0}")]
    Player(String),

    #[error("scan task failed: {0}")]
    ScanTask(String),

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ShuffleError>;
