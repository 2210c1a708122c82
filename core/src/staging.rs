//! Filesystem steps of the staging cycle.

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use tracing::debug;
use tracing::warn;
use zpdb_utils_stream::transfer_exact;

use crate::Result;
use crate::ZpdbError;

/// Copy the whole of `original` into a new file at `staging`, carrying the
/// permissions across so the copy can be executed.
pub(crate) fn snapshot(original: &Path, staging: &Path) -> Result<u64> {
    let unreadable = |source| ZpdbError::ContainerUnreadable {
        path: original.to_path_buf(),
        source,
    };
    let mut source = File::open(original).map_err(unreadable)?;
    let metadata = source.metadata().map_err(unreadable)?;

    let mut target = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(staging)
        .map_err(|source| staging_io(staging, source))?;

    let copied = transfer_exact(&mut source, &mut target, metadata.len())
        .map_err(|source| ZpdbError::StagingTransfer {
            from: original.to_path_buf(),
            to: staging.to_path_buf(),
            source,
        })
        .and_then(|copied| {
            target.sync_all().map_err(|err| staging_io(staging, err))?;
            fs::set_permissions(staging, metadata.permissions())
                .map_err(|err| staging_io(staging, err))?;
            Ok(copied)
        });

    if copied.is_err() {
        drop(target);
        remove_quietly(staging);
    }
    copied
}

/// Replace `original` with the bytes of `staging`. The copy goes to a
/// temporary sibling first and is renamed over `original` only after its
/// length has been verified, so a failed copy leaves `original` as it was.
pub(crate) fn swap_back(staging: &Path, original: &Path) -> Result<u64> {
    let mut source = File::open(staging).map_err(|err| staging_io(staging, err))?;
    let metadata = source.metadata().map_err(|err| staging_io(staging, err))?;

    let dir = original
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut replacement = tempfile::Builder::new()
        .prefix(".zpdb-swap-")
        .tempfile_in(dir)
        .map_err(|err| staging_io(dir, err))?;

    let copied = transfer_exact(&mut source, replacement.as_file_mut(), metadata.len()).map_err(
        |source| ZpdbError::StagingTransfer {
            from: staging.to_path_buf(),
            to: replacement.path().to_path_buf(),
            source,
        },
    )?;
    replacement
        .as_file()
        .sync_all()
        .map_err(|err| staging_io(replacement.path(), err))?;
    fs::set_permissions(replacement.path(), metadata.permissions())
        .map_err(|err| staging_io(replacement.path(), err))?;

    replacement
        .persist(original)
        .map_err(|err| staging_io(original, err.error))?;
    debug!(bytes = copied, original = %original.display(), "staging copy swapped into place");
    Ok(copied)
}

/// Remove a leftover staging file. Someone else removing it first is fine.
pub(crate) fn discard(staging: &Path) -> Result<()> {
    match fs::remove_file(staging) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(staging = %staging.display(), "staging file already gone");
            Ok(())
        }
        Err(source) => Err(ZpdbError::StagingCleanup {
            path: staging.to_path_buf(),
            source,
        }),
    }
}

pub(crate) fn remove_quietly(staging: &Path) {
    if let Err(err) = fs::remove_file(staging) {
        if err.kind() != io::ErrorKind::NotFound {
            warn!(staging = %staging.display(), "failed to remove staging file: {err}");
        }
    }
}

fn staging_io(path: &Path, source: io::Error) -> ZpdbError {
    ZpdbError::StagingIo {
        path: path.to_path_buf(),
        source,
    }
}
