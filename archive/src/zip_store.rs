use std::fs::{File, OpenOptions};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::ArchiveError;
use crate::EntryStore;
use crate::is_write_locked;
use crate::region::Region;

/// [`EntryStore`] backed by a zip archive appended to the container.
#[derive(Debug, Clone)]
pub struct ZipEntryStore {
    compression: CompressionMethod,
}

impl Default for ZipEntryStore {
    fn default() -> Self {
        Self {
            compression: CompressionMethod::Deflated,
        }
    }
}

impl ZipEntryStore {
    pub fn with_compression(compression: CompressionMethod) -> Self {
        Self { compression }
    }

    fn options(&self) -> FileOptions {
        FileOptions::default()
            .compression_method(self.compression)
            .unix_permissions(0o644)
    }

    /// Rewrite the archive region of `container` so that it holds every
    /// current entry except `name`, plus `replacement` under `name` if given.
    fn rewrite(
        &self,
        container: &Path,
        mut file: File,
        name: &str,
        replacement: Option<&[u8]>,
    ) -> Result<(), ArchiveError> {
        let bytes = read_all(container, &mut file)?;
        let region = Region::parse(&bytes).map_err(|source| corrupt(container, source))?;
        let native = region.native;
        let Some(mut archive) = region.archive else {
            let Some(data) = replacement else {
                debug!(container = %container.display(), "no archive region; nothing to delete");
                return Ok(());
            };
            let rebuilt = self.encode(native, None, name, Some(data))?;
            return write_all(container, &mut file, &rebuilt);
        };

        let present = archive.file_names().any(|existing| existing == name);
        if !present && replacement.is_none() {
            debug!(container = %container.display(), entry = name, "entry absent; nothing to delete");
            return Ok(());
        }

        let rebuilt = self.encode(native, Some(&mut archive), name, replacement)?;
        write_all(container, &mut file, &rebuilt)
    }

    fn encode(
        &self,
        native: &[u8],
        mut archive: Option<&mut zip::ZipArchive<Cursor<&[u8]>>>,
        name: &str,
        replacement: Option<&[u8]>,
    ) -> Result<Vec<u8>, ArchiveError> {
        let kept = archive
            .as_deref()
            .map_or(0, |a| a.file_names().filter(|existing| *existing != name).count());
        if kept == 0 && replacement.is_none() {
            return Ok(native.to_vec());
        }

        let encode_err = |source| ArchiveError::Encode {
            name: name.to_string(),
            source,
        };

        let mut cursor = Cursor::new(native.to_vec());
        cursor.set_position(native.len() as u64);
        let mut writer = ZipWriter::new(cursor);

        if let Some(archive) = archive.as_deref_mut() {
            for index in 0..archive.len() {
                let entry = archive.by_index(index).map_err(encode_err)?;
                if entry.name() == name {
                    continue;
                }
                writer.raw_copy_file(entry).map_err(encode_err)?;
            }
        }

        if let Some(data) = replacement {
            writer.start_file(name, self.options()).map_err(encode_err)?;
            writer
                .write_all(data)
                .map_err(|err| encode_err(ZipError::Io(err)))?;
        }

        let cursor = writer.finish().map_err(encode_err)?;
        Ok(cursor.into_inner())
    }
}

impl EntryStore for ZipEntryStore {
    fn open_entry(&self, container: &Path, name: &str) -> Result<Vec<u8>, ArchiveError> {
        let mut file = File::open(container).map_err(|source| ArchiveError::Open {
            path: container.to_path_buf(),
            source,
        })?;
        let bytes = read_all(container, &mut file)?;
        let region = Region::parse(&bytes).map_err(|source| corrupt(container, source))?;
        let Some(mut archive) = region.archive else {
            return Ok(Vec::new());
        };

        let mut entry = match archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(Vec::new()),
            Err(source) => return Err(corrupt(container, source)),
        };
        let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry
            .read_to_end(&mut data)
            .map_err(|source| corrupt(container, ZipError::Io(source)))?;
        Ok(data)
    }

    fn delete_entry(&self, container: &Path, name: &str) -> Result<(), ArchiveError> {
        let file = open_for_update(container, false)?;
        self.rewrite(container, file, name, None)
    }

    fn write_entry(&self, container: &Path, name: &str, bytes: &[u8]) -> Result<(), ArchiveError> {
        let file = open_for_update(container, true)?;
        self.rewrite(container, file, name, Some(bytes))
    }
}

fn open_for_update(container: &Path, create: bool) -> Result<File, ArchiveError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(create)
        .truncate(false)
        .open(container)
        .map_err(|source| {
            if is_write_locked(&source) {
                ArchiveError::Locked {
                    path: container.to_path_buf(),
                    source,
                }
            } else {
                ArchiveError::Open {
                    path: container.to_path_buf(),
                    source,
                }
            }
        })
}

fn read_all(container: &Path, file: &mut File) -> Result<Vec<u8>, ArchiveError> {
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|source| ArchiveError::Read {
            path: container.to_path_buf(),
            source,
        })?;
    Ok(bytes)
}

fn write_all(container: &Path, file: &mut File, bytes: &[u8]) -> Result<(), ArchiveError> {
    let write = |file: &mut File| -> std::io::Result<()> {
        file.seek(SeekFrom::Start(0))?;
        file.write_all(bytes)?;
        file.set_len(bytes.len() as u64)?;
        file.sync_all()
    };
    write(file).map_err(|source| ArchiveError::Write {
        path: container.to_path_buf(),
        source,
    })?;
    debug!(container = %container.display(), len = bytes.len(), "container rewritten");
    Ok(())
}

fn corrupt(container: &Path, source: ZipError) -> ArchiveError {
    ArchiveError::Corrupt {
        path: container.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_ENTRY_NAME;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    const NATIVE: &[u8] = b"\x7fELF\x02\x01\x01 pretend this is a program";

    fn container(dir: &TempDir, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join("zpdb");
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn absent_entry_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = container(&dir, NATIVE);

        let data = ZipEntryStore::default()
            .open_entry(&path, DEFAULT_ENTRY_NAME)
            .unwrap();

        assert!(data.is_empty());
    }

    #[test]
    fn write_then_open_returns_bytes_and_keeps_native_payload() {
        let dir = TempDir::new().unwrap();
        let path = container(&dir, NATIVE);
        let store = ZipEntryStore::default();

        store
            .write_entry(&path, DEFAULT_ENTRY_NAME, b"hello world")
            .unwrap();

        assert_eq!(store.open_entry(&path, DEFAULT_ENTRY_NAME).unwrap(), b"hello world");
        let on_disk = fs::read(&path).unwrap();
        assert!(on_disk.starts_with(NATIVE));
        assert!(on_disk.len() > NATIVE.len());
    }

    #[test]
    fn rewriting_keeps_a_single_entry() {
        let dir = TempDir::new().unwrap();
        let path = container(&dir, NATIVE);
        let store = ZipEntryStore::default();

        store.write_entry(&path, DEFAULT_ENTRY_NAME, b"first").unwrap();
        store.write_entry(&path, DEFAULT_ENTRY_NAME, b"second").unwrap();

        let bytes = fs::read(&path).unwrap();
        let region = Region::parse(&bytes).unwrap();
        assert_eq!(region.archive.map(|a| a.len()), Some(1));
        assert_eq!(store.open_entry(&path, DEFAULT_ENTRY_NAME).unwrap(), b"second");
    }

    #[test]
    fn deleting_last_entry_restores_native_bytes() {
        let dir = TempDir::new().unwrap();
        let path = container(&dir, NATIVE);
        let store = ZipEntryStore::default();

        store.write_entry(&path, DEFAULT_ENTRY_NAME, b"payload").unwrap();
        store.delete_entry(&path, DEFAULT_ENTRY_NAME).unwrap();

        assert_eq!(fs::read(&path).unwrap(), NATIVE);
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = container(&dir, NATIVE);
        let store = ZipEntryStore::default();

        store.delete_entry(&path, DEFAULT_ENTRY_NAME).unwrap();
        store.delete_entry(&path, DEFAULT_ENTRY_NAME).unwrap();

        assert_eq!(fs::read(&path).unwrap(), NATIVE);
    }

    #[test]
    fn unrelated_entries_survive_a_rewrite() {
        let dir = TempDir::new().unwrap();
        let path = container(&dir, NATIVE);
        let store = ZipEntryStore::with_compression(CompressionMethod::Stored);

        store.write_entry(&path, "notes.md", b"keep me").unwrap();
        store.write_entry(&path, DEFAULT_ENTRY_NAME, b"v1").unwrap();
        store.delete_entry(&path, DEFAULT_ENTRY_NAME).unwrap();
        store.write_entry(&path, DEFAULT_ENTRY_NAME, b"v2").unwrap();

        assert_eq!(store.open_entry(&path, "notes.md").unwrap(), b"keep me");
        assert_eq!(store.open_entry(&path, DEFAULT_ENTRY_NAME).unwrap(), b"v2");
    }

    #[test]
    fn write_creates_missing_container() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh");
        let store = ZipEntryStore::default();

        store.write_entry(&path, DEFAULT_ENTRY_NAME, b"created").unwrap();

        assert_eq!(store.open_entry(&path, DEFAULT_ENTRY_NAME).unwrap(), b"created");
    }

    #[test]
    fn unreadable_container_is_an_open_error() {
        let dir = TempDir::new().unwrap();
        let err = ZipEntryStore::default()
            .open_entry(&dir.path().join("missing"), DEFAULT_ENTRY_NAME)
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Open { .. }), "unexpected error: {err:?}");
    }

    #[test]
    fn truncated_archive_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = container(&dir, NATIVE);
        let store = ZipEntryStore::default();
        store.write_entry(&path, DEFAULT_ENTRY_NAME, b"payload").unwrap();

        // Keep the end-of-central-directory record but damage the directory.
        let mut bytes = fs::read(&path).unwrap();
        let eocd = crate::region::find_end_of_central_directory(&bytes).unwrap();
        let directory = crate::region::central_directory_start(&bytes, eocd);
        bytes[directory..directory + 4].copy_from_slice(b"XXXX");
        fs::write(&path, &bytes).unwrap();

        let err = store.open_entry(&path, DEFAULT_ENTRY_NAME).unwrap_err();
        assert!(matches!(err, ArchiveError::Corrupt { .. }), "unexpected error: {err:?}");
    }
}
