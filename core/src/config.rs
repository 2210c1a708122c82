use zpdb_archive::DEFAULT_ENTRY_NAME;

/// Suffix appended (after a dot) to the container path to name the staging
/// copy.
pub const DEFAULT_STAGING_SUFFIX: &str = "staging";

/// Constants the update protocol runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolOptions {
    /// Name of the archive entry holding the payload.
    pub entry_name: String,
    /// Staging copies live at `<container>.<staging_suffix>`.
    pub staging_suffix: String,
}

impl Default for ProtocolOptions {
    fn default() -> Self {
        Self {
            entry_name: DEFAULT_ENTRY_NAME.to_string(),
            staging_suffix: DEFAULT_STAGING_SUFFIX.to_string(),
        }
    }
}
