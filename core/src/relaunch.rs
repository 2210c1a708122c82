//! Handing execution over to another copy of the binary.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::Command;

/// Starts `program` with `args` in place of the current invocation.
///
/// A successful return means the new process owns the rest of the work; the
/// caller must not touch the container afterwards.
pub trait Relauncher {
    fn relaunch(&self, program: &Path, args: &[OsString]) -> io::Result<()>;
}

/// Relaunches through the OS. On Unix the process image is replaced, keeping
/// the PID and standard streams, so this only returns on failure. Elsewhere
/// the new process is spawned with inherited streams and the caller exits.
///
/// The spawned process is not synchronized with the exiting parent. Where a
/// running executable cannot be replaced or deleted, the child's swap-back
/// or its cleanup of the staging file can fail while the parent is still
/// alive; the error is reported and the next invocation retries the cleanup.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRelauncher;

impl Relauncher for ProcessRelauncher {
    #[cfg(unix)]
    fn relaunch(&self, program: &Path, args: &[OsString]) -> io::Result<()> {
        use std::os::unix::process::CommandExt as _;

        Err(Command::new(program).args(args).exec())
    }

    #[cfg(not(unix))]
    fn relaunch(&self, program: &Path, args: &[OsString]) -> io::Result<()> {
        Command::new(program).args(args).spawn().map(|_child| ())
    }
}
