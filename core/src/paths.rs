//! The (original, staging) path pair every protocol step works with.

use std::path::{Path, PathBuf};

use zpdb_utils_self_path::strip_file_suffix;
use zpdb_utils_self_path::with_file_suffix;

/// Which of the two files the current process was started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Original,
    Staging,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerPaths {
    original: PathBuf,
    staging: PathBuf,
    role: Role,
}

impl ContainerPaths {
    /// Build the pair from the resolved path of the running binary. A path
    /// that already carries `.{staging_suffix}` marks a staging process.
    pub fn from_resolved(resolved: PathBuf, staging_suffix: &str) -> Self {
        let dotted = format!(".{staging_suffix}");
        let original = strip_file_suffix(resolved.as_os_str(), &dotted).map(PathBuf::from);
        match original {
            Some(original) => Self {
                original,
                staging: resolved,
                role: Role::Staging,
            },
            None => Self {
                staging: with_file_suffix(&resolved, staging_suffix),
                original: resolved,
                role: Role::Original,
            },
        }
    }

    pub fn original(&self) -> &Path {
        &self.original
    }

    pub fn staging(&self) -> &Path {
        &self.staging
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn running_from_staging(&self) -> bool {
        self.role == Role::Staging
    }
}
