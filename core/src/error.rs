use std::io;
use std::path::PathBuf;

use zpdb_archive::ArchiveError;
use zpdb_utils_stream::StreamError;

pub type Result<T> = std::result::Result<T, ZpdbError>;

#[derive(Debug, thiserror::Error)]
pub enum ZpdbError {
    #[error("unknown command `{0}`")]
    Usage(String),

    #[error("failed to open container {path} for reading")]
    ContainerUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to check write access to {path}")]
    WriteProbe {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("staging I/O failed on {path}")]
    StagingIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to copy {from} to {to}")]
    StagingTransfer {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: StreamError,
    },

    #[error("failed to remove staging file {path}")]
    StagingCleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("failed to relaunch {program}")]
    Relaunch {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
}
