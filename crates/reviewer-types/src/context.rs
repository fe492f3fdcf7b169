//! The bounded, prioritized PR context handed to the planner and reviewer.

use serde::{Deserialize, Serialize};

use crate::files::ChangedFileEntry;

/// A summary of the pull request itself, independent of its changed files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub title: String,
    /// Truncated to at most 1000 chars by the context builder.
    pub body: String,
    pub base_ref: String,
    pub head_ref: String,
    pub total_additions: u64,
    pub total_deletions: u64,
    pub total_changed_files: u64,
}

/// A file the context builder chose not to include, with a human-readable
/// reason (sensitive path, exclusion glob, file-count cap, byte budget).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub filename: String,
    pub reason: String,
}

/// The bounded, prioritized selection of changed files and PR metadata
/// passed to the planner and reviewer.
///
/// Ordering invariant: `changed_files` is sorted by descending `changes` at
/// selection time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PRContext {
    pub pull_request: PullRequestSummary,
    pub changed_files: Vec<ChangedFileEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_files: Vec<SkippedFile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linked_jira_issues: Vec<String>,
    /// Human-readable summary of the first five skip reasons, present only
    /// when at least one file was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation_note: Option<String>,
}

impl PRContext {
    /// `true` if `changed_files` is sorted by non-increasing `changes`.
    pub fn is_sorted_by_descending_changes(&self) -> bool {
        self.changed_files
            .windows(2)
            .all(|w| w[0].changes >= w[1].changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::FileStatus;

    fn file(name: &str, changes: u64) -> ChangedFileEntry {
        ChangedFileEntry {
            filename: name.to_string(),
            status: FileStatus::Modified,
            additions: changes,
            deletions: 0,
            changes,
            patch: None,
            patch_truncated: false,
        }
    }

    fn base_summary() -> PullRequestSummary {
        PullRequestSummary {
            title: "Add feature".to_string(),
            body: "Does a thing".to_string(),
            base_ref: "main".to_string(),
            head_ref: "feature".to_string(),
            total_additions: 10,
            total_deletions: 0,
            total_changed_files: 2,
        }
    }

    #[test]
    fn sorted_context_passes_ordering_check() {
        let ctx = PRContext {
            pull_request: base_summary(),
            changed_files: vec![file("a", 10), file("b", 5), file("c", 5)],
            skipped_files: vec![],
            linked_jira_issues: vec![],
            truncation_note: None,
        };
        assert!(ctx.is_sorted_by_descending_changes());
    }

    #[test]
    fn unsorted_context_fails_ordering_check() {
        let ctx = PRContext {
            pull_request: base_summary(),
            changed_files: vec![file("a", 5), file("b", 10)],
            skipped_files: vec![],
            linked_jira_issues: vec![],
            truncation_note: None,
        };
        assert!(!ctx.is_sorted_by_descending_changes());
    }
}
