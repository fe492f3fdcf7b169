//! Per-file diff metadata as returned by the forge's "list PR files"
//! endpoint, and as selected/clipped by the context builder.

use serde::{Deserialize, Serialize};

/// The lifecycle status of a changed file within a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
}

/// One entry from the forge's changed-files listing, optionally clipped by
/// the context builder.
///
/// Invariant: `additions + deletions <= changes`. When `patch_truncated` is
/// true, `patch` (if present) is exactly `per_file_budget` bytes long.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFileEntry {
    pub filename: String,
    pub status: FileStatus,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
    /// Unified diff text. Absent for binary files or when the forge omits
    /// it (e.g. a huge rename with no patch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    #[serde(default)]
    pub patch_truncated: bool,
}

impl ChangedFileEntry {
    /// `true` if `additions + deletions <= changes`, the data-model
    /// invariant from spec §3.
    pub fn satisfies_change_count_invariant(&self) -> bool {
        self.additions + self.deletions <= self.changes
    }

    /// Byte length of the patch, or 0 if absent.
    pub fn patch_len(&self) -> usize {
        self.patch.as_ref().map(|p| p.len()).unwrap_or(0)
    }
}
