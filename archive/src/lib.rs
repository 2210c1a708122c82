//! Archive Entry Store.
//!
//! A container is a native executable followed by a zip archive. This crate
//! reads, deletes, and writes single named entries in that trailing archive
//! without disturbing the native bytes in front of it.

mod region;
mod zip_store;

use std::io;
use std::path::{Path, PathBuf};

pub use zip_store::ZipEntryStore;

/// Name of the entry holding the persisted payload.
pub const DEFAULT_ENTRY_NAME: &str = "file.txt";

#[cfg(windows)]
const ERROR_SHARING_VIOLATION: i32 = 32;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("container {path} is locked for writing")]
    Locked {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open container {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read container {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write container {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("archive region of {path} is corrupt")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("failed to encode entry {name}")]
    Encode {
        name: String,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Storage for named entries inside a container's archive region.
///
/// Implementations do not promise in-place resizing of an entry, so callers
/// replace an entry with [`EntryStore::delete_entry`] followed by
/// [`EntryStore::write_entry`].
pub trait EntryStore {
    /// Return the bytes of `name`, or an empty buffer when it is absent.
    fn open_entry(&self, container: &Path, name: &str) -> Result<Vec<u8>, ArchiveError>;

    /// Remove `name` if present. An absent entry is not an error.
    fn delete_entry(&self, container: &Path, name: &str) -> Result<(), ArchiveError>;

    /// Create the container if needed and (re)write `name` with `bytes`.
    fn write_entry(&self, container: &Path, name: &str, bytes: &[u8]) -> Result<(), ArchiveError>;
}

/// Whether `err` is the OS refusing write access to a file, which for a
/// container means it is the image of a running process.
pub fn is_write_locked(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::PermissionDenied {
        return true;
    }
    #[cfg(unix)]
    {
        if err.raw_os_error() == Some(libc::ETXTBSY) {
            return true;
        }
    }
    #[cfg(windows)]
    {
        if err.raw_os_error() == Some(ERROR_SHARING_VIOLATION) {
            return true;
        }
    }
    false
}
