//! Locating the archive region at the tail of a container.

use std::io::Cursor;

use zip::ZipArchive;
use zip::result::ZipResult;

const EOCD_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];
const EOCD_LEN: usize = 22;
const MAX_COMMENT_LEN: usize = u16::MAX as usize;

/// A container split into its native payload and optional archive.
pub(crate) struct Region<'a> {
    pub native: &'a [u8],
    pub archive: Option<ZipArchive<Cursor<&'a [u8]>>>,
}

impl<'a> Region<'a> {
    pub fn parse(bytes: &'a [u8]) -> ZipResult<Self> {
        let Some(eocd) = find_end_of_central_directory(bytes) else {
            return Ok(Self {
                native: bytes,
                archive: None,
            });
        };

        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut native_len = central_directory_start(bytes, eocd);
        for index in 0..archive.len() {
            let header_start = archive.by_index_raw(index)?.header_start();
            native_len = native_len.min(usize::try_from(header_start).unwrap_or(usize::MAX));
        }

        Ok(Self {
            native: &bytes[..native_len.min(bytes.len())],
            archive: Some(archive),
        })
    }
}

/// Offset of the end-of-central-directory record, if the tail of `bytes`
/// holds one whose comment runs exactly to end-of-file.
pub(crate) fn find_end_of_central_directory(bytes: &[u8]) -> Option<usize> {
    let last = bytes.len().checked_sub(EOCD_LEN)?;
    let earliest = last.saturating_sub(MAX_COMMENT_LEN);
    (earliest..=last).rev().find(|&pos| {
        bytes[pos..pos + 4] == EOCD_SIGNATURE && {
            let comment_len = usize::from(u16::from_le_bytes([bytes[pos + 20], bytes[pos + 21]]));
            pos + EOCD_LEN + comment_len == bytes.len()
        }
    })
}

pub(crate) fn central_directory_start(bytes: &[u8], eocd: usize) -> usize {
    let size = u32::from_le_bytes([
        bytes[eocd + 12],
        bytes[eocd + 13],
        bytes[eocd + 14],
        bytes[eocd + 15],
    ]);
    eocd.saturating_sub(size as usize)
}
