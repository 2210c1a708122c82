use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use zpdb_archive::is_write_locked;

/// What a read-write open of the container tells us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAccess {
    Granted,
    /// The OS refused write access; the container is the image of a running
    /// process.
    Locked,
    /// Nothing is going to be written, so access was not checked.
    NotRequired,
}

pub trait WriteProbe {
    fn probe(&self, container: &Path) -> io::Result<WriteAccess>;
}

/// Probes by opening the container read-write and closing it again.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenProbe;

impl WriteProbe for OpenProbe {
    fn probe(&self, container: &Path) -> io::Result<WriteAccess> {
        match OpenOptions::new().read(true).write(true).open(container) {
            Ok(_) => Ok(WriteAccess::Granted),
            Err(err) if is_write_locked(&err) => Ok(WriteAccess::Locked),
            Err(err) => Err(err),
        }
    }
}
