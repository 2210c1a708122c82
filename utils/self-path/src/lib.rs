//! Resolve the path of the running binary from the invocation argument.
//!
//! Build pipelines leave artifacts such as `tool.com.dbg` (debug symbols next
//! to a packaged binary) or `tool.aarch64.elf` (per-architecture image) that
//! carry the same archive payload as the canonical `tool`. The resolver trims
//! those suffix chains so every variant operates on the one canonical file.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};

/// Compound suffixes that are removed from the end of the file name. A chain
/// is only removed as a whole.
pub const SUFFIX_CHAINS: &[&str] = &[".com.dbg", ".aarch64.elf"];

#[derive(Debug, thiserror::Error)]
pub enum PathResolutionError {
    #[error("no invocation path was provided")]
    Empty,

    #[error("Path too long: {len} bytes exceeds the platform limit of {max}")]
    TooLong { len: usize, max: usize },

    #[error("could not locate `{name}` on PATH")]
    Lookup {
        name: String,
        #[source]
        source: which::Error,
    },

    #[error("could not resolve {path}")]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Longest invocation path accepted before resolution fails.
pub fn max_path_len() -> usize {
    #[cfg(unix)]
    {
        libc::PATH_MAX as usize
    }
    #[cfg(windows)]
    {
        260
    }
    #[cfg(not(any(unix, windows)))]
    {
        4096
    }
}

/// Derive the canonical path of the binary that should be treated as the
/// container from `arg0`.
pub fn resolve_self_path(arg0: &OsStr) -> Result<PathBuf, PathResolutionError> {
    if arg0.is_empty() {
        return Err(PathResolutionError::Empty);
    }

    let len = arg0.len();
    let max = max_path_len();
    if len >= max {
        return Err(PathResolutionError::TooLong { len, max });
    }

    let trimmed = PathBuf::from(strip_build_suffix(arg0));
    let located = if is_bare_name(&trimmed) {
        which::which(&trimmed).map_err(|source| PathResolutionError::Lookup {
            name: trimmed.to_string_lossy().into_owned(),
            source,
        })?
    } else {
        trimmed
    };

    dunce::canonicalize(&located).map_err(|source| PathResolutionError::Canonicalize {
        path: located,
        source,
    })
}

/// Remove the first matching entry of [`SUFFIX_CHAINS`] from `path`.
pub fn strip_build_suffix(path: &OsStr) -> &OsStr {
    SUFFIX_CHAINS
        .iter()
        .find_map(|chain| strip_file_suffix(path, chain))
        .unwrap_or(path)
}

/// Strip `suffix` from the end of `path` when the final file name keeps a
/// non-empty stem. `suffix` must be ASCII.
pub fn strip_file_suffix<'a>(path: &'a OsStr, suffix: &str) -> Option<&'a OsStr> {
    let bytes = path.as_encoded_bytes();
    let stem = bytes.strip_suffix(suffix.as_bytes())?;
    match stem.last() {
        None | Some(b'/') => return None,
        #[cfg(windows)]
        Some(b'\\') | Some(b':') => return None,
        Some(_) => {}
    }
    // SAFETY: `stem` is `path` cut directly before the ASCII suffix, which is
    // a valid boundary for the platform encoding.
    Some(unsafe { OsStr::from_encoded_bytes_unchecked(stem) })
}

/// Append `.{suffix}` to the whole of `path`.
pub fn with_file_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = OsString::from(path.as_os_str());
    raw.push(".");
    raw.push(suffix);
    PathBuf::from(raw)
}

fn is_bare_name(path: &Path) -> bool {
    path.parent().is_some_and(|parent| parent.as_os_str().is_empty()) && !path.has_root()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn strip(path: &str) -> &str {
        strip_build_suffix(OsStr::new(path))
            .to_str()
            .unwrap()
    }

    #[test]
    fn strips_full_chains_only() {
        assert_eq!(strip("out/zpdb.com.dbg"), "out/zpdb");
        assert_eq!(strip("out/zpdb.aarch64.elf"), "out/zpdb");
        assert_eq!(strip("out/zpdb.dbg"), "out/zpdb.dbg");
        assert_eq!(strip("out/zpdb.elf"), "out/zpdb.elf");
        assert_eq!(strip("out/zpdb.com"), "out/zpdb.com");
        assert_eq!(strip("out/zpdb.x86_64.elf"), "out/zpdb.x86_64.elf");
    }

    #[test]
    fn never_strips_to_an_empty_file_name() {
        assert_eq!(strip(".com.dbg"), ".com.dbg");
        assert_eq!(strip("out/.aarch64.elf"), "out/.aarch64.elf");
    }

    #[test]
    fn staging_suffix_round_trips() {
        let original = Path::new("/opt/bin/zpdb");
        let staging = with_file_suffix(original, "staging");
        assert_eq!(staging, PathBuf::from("/opt/bin/zpdb.staging"));
        assert_eq!(
            strip_file_suffix(staging.as_os_str(), ".staging"),
            Some(original.as_os_str())
        );
        assert_eq!(strip_file_suffix(original.as_os_str(), ".staging"), None);
    }

    #[test]
    fn rejects_overlong_paths_without_truncating() {
        let long = "a".repeat(max_path_len());
        let err = resolve_self_path(OsStr::new(&long)).unwrap_err();
        assert!(
            matches!(err, PathResolutionError::TooLong { len, .. } if len == long.len()),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn rejects_empty_invocation() {
        assert!(matches!(
            resolve_self_path(OsStr::new("")),
            Err(PathResolutionError::Empty)
        ));
    }

    #[test]
    fn resolves_debug_artifact_to_canonical_binary() {
        let dir = TempDir::new().unwrap();
        let binary = dir.path().join("zpdb");
        fs::write(&binary, b"native").unwrap();

        let invoked = dir.path().join("zpdb.com.dbg");
        let resolved = resolve_self_path(invoked.as_os_str()).unwrap();

        assert_eq!(resolved, dunce::canonicalize(&binary).unwrap());
    }

    #[test]
    fn missing_binary_is_a_resolution_error() {
        let dir = TempDir::new().unwrap();
        let invoked = dir.path().join("missing");
        assert!(matches!(
            resolve_self_path(invoked.as_os_str()),
            Err(PathResolutionError::Canonicalize { .. })
        ));
    }
}
