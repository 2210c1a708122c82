//! Byte transfer between a reader and a writer.
//!
//! Reads may come back short; the transfer keeps looping until the source is
//! exhausted. Writes may not: a destination that accepts fewer bytes than it
//! was handed is treated as a hard failure, because a partially written
//! chunk cannot be told apart from silent data loss.

use std::io::{self, ErrorKind, Read, Write};

/// Size of the intermediate buffer used for every transfer.
pub const BUFFER_SIZE: usize = 4096;

/// Errors raised while moving bytes between two streams.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("error reading")]
    Read(#[source] io::Error),

    #[error("error writing")]
    Write(#[source] io::Error),

    #[error("short write: destination accepted {written} of {expected} bytes")]
    ShortWrite { expected: usize, written: usize },

    #[error("error flushing output")]
    Flush(#[source] io::Error),

    #[error("transferred {actual} bytes, expected {expected}")]
    SizeMismatch { expected: u64, actual: u64 },
}

/// Copy everything from `reader` into `writer`, then flush `writer`.
///
/// Returns the number of bytes moved. An empty source completes immediately.
pub fn transfer<R, W>(reader: &mut R, writer: &mut W) -> Result<u64, StreamError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buffer = [0u8; BUFFER_SIZE];
    let mut total: u64 = 0;

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(StreamError::Read(err)),
        };

        let written = write_chunk(writer, &buffer[..bytes_read])?;
        if written != bytes_read {
            return Err(StreamError::ShortWrite {
                expected: bytes_read,
                written,
            });
        }
        total += bytes_read as u64;
    }

    writer.flush().map_err(StreamError::Flush)?;
    Ok(total)
}

/// Like [`transfer`], but fails unless exactly `expected` bytes were moved.
pub fn transfer_exact<R, W>(reader: &mut R, writer: &mut W, expected: u64) -> Result<u64, StreamError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let actual = transfer(reader, writer)?;
    if actual != expected {
        return Err(StreamError::SizeMismatch { expected, actual });
    }
    Ok(actual)
}

/// Read `reader` to end-of-input into a fresh buffer.
pub fn read_to_end<R>(reader: &mut R) -> Result<Vec<u8>, StreamError>
where
    R: Read + ?Sized,
{
    let mut bytes = Vec::new();
    transfer(reader, &mut bytes)?;
    Ok(bytes)
}

fn write_chunk<W>(writer: &mut W, chunk: &[u8]) -> Result<usize, StreamError>
where
    W: Write + ?Sized,
{
    loop {
        match writer.write(chunk) {
            Ok(n) => return Ok(n),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(StreamError::Write(err)),
        }
    }
}
