//! Selects, prioritizes, clips, and annotates a pull request's changed
//! files under per-file, total, and file-count budgets.
//!
//! # Example
//!
//! ```
//! use reviewer_context::{ContextBudgets, LargePatchPolicy, RawChangedFile, build_context};
//! use reviewer_types::{FileStatus, PullRequestSummary};
//!
//! let pr = PullRequestSummary {
//!     title: "Add feature".to_string(),
//!     body: String::new(),
//!     base_ref: "main".to_string(),
//!     head_ref: "feature".to_string(),
//!     total_additions: 10,
//!     total_deletions: 2,
//!     total_changed_files: 1,
//! };
//! let files = vec![RawChangedFile {
//!     filename: "src/lib.rs".to_string(),
//!     status: FileStatus::Modified,
//!     additions: 8,
//!     deletions: 2,
//!     changes: 10,
//!     patch: Some("@@ -1,1 +1,2 @@\n+new line\n".to_string()),
//! }];
//! let budgets = ContextBudgets::default();
//! let result = build_context(pr, files, &budgets, &[]);
//! assert_eq!(result.context.changed_files.len(), 1);
//! ```

use reviewer_types::{ChangedFileEntry, FileStatus, PRContext, PullRequestSummary, SkippedFile};

/// How an over-budget patch is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LargePatchPolicy {
    /// Truncate to the byte budget at a UTF-8 safe boundary.
    Clip,
    /// Exclude the file entirely.
    Skip,
}

#[derive(Debug, Clone)]
pub struct ContextBudgets {
    pub max_review_files: usize,
    pub max_diff_bytes: usize,
    pub max_total_diff_bytes: usize,
    pub large_patch_policy: LargePatchPolicy,
}

impl Default for ContextBudgets {
    fn default() -> Self {
        Self {
            max_review_files: 40,
            max_diff_bytes: 20_000,
            max_total_diff_bytes: 200_000,
            large_patch_policy: LargePatchPolicy::Clip,
        }
    }
}

/// A changed file as reported by the forge, before budget application.
#[derive(Debug, Clone)]
pub struct RawChangedFile {
    pub filename: String,
    pub status: FileStatus,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
    pub patch: Option<String>,
}

/// Fragments that mark a path as containing credential material. Matched
/// case-insensitively against the whole path.
const SENSITIVE_FRAGMENTS: &[&str] = &["secrets", "credentials", ".env", ".pem", ".key", ".p12"];

/// `true` if `path` matches the sensitive-path predicate.
pub fn is_sensitive_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    SENSITIVE_FRAGMENTS.iter().any(|f| lower.contains(f)) || path_matches_glob(&lower, "*id_rsa*")
}

/// Minimal `*`-wildcard glob matcher (no `**`/`?`/character classes). `*`
/// matches any run of characters including none. Sufficient for the
/// lockfile/binary/vendor exclusion patterns this crate needs.
pub fn path_matches_glob(path: &str, pattern: &str) -> bool {
    let path = path.as_bytes();
    let pattern = pattern.as_bytes();
    fn helper(path: &[u8], pattern: &[u8]) -> bool {
        match pattern.first() {
            None => path.is_empty(),
            Some(b'*') => {
                if helper(path, &pattern[1..]) {
                    return true;
                }
                if !path.is_empty() {
                    return helper(&path[1..], pattern);
                }
                false
            }
            Some(&c) => path.first() == Some(&c) && helper(&path[1..], &pattern[1..]),
        }
    }
    helper(path, pattern)
}

/// `true` if `path` matches any pattern in the configured exclusion glob
/// set (lockfiles, binaries, build artifacts, vendor trees).
pub fn matches_exclusion_set(path: &str, patterns: &[String]) -> bool {
    let lower = path.to_lowercase();
    patterns.iter().any(|p| path_matches_glob(&lower, &p.to_lowercase()))
}

/// Truncate `patch` to at most `max_bytes`, at a UTF-8 char boundary.
fn clip_patch(patch: &str, max_bytes: usize) -> String {
    if patch.len() <= max_bytes {
        return patch.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !patch.is_char_boundary(end) {
        end -= 1;
    }
    patch[..end].to_string()
}

pub struct BuildResult {
    pub context: PRContext,
}

/// Run the full selection algorithm (spec §4.4) over `files`.
pub fn build_context(
    pull_request: PullRequestSummary,
    mut files: Vec<RawChangedFile>,
    budgets: &ContextBudgets,
    exclusion_patterns: &[String],
) -> BuildResult {
    files.sort_by(|a, b| b.changes.cmp(&a.changes));

    let mut changed_files = Vec::new();
    let mut skipped_files = Vec::new();
    let mut total_diff_bytes: usize = 0;

    for file in files {
        if is_sensitive_path(&file.filename) {
            skipped_files.push(SkippedFile {
                filename: file.filename,
                reason: "sensitive path".to_string(),
            });
            continue;
        }
        if matches_exclusion_set(&file.filename, exclusion_patterns) {
            skipped_files.push(SkippedFile {
                filename: file.filename,
                reason: "matches exclusion glob set".to_string(),
            });
            continue;
        }
        if changed_files.len() >= budgets.max_review_files {
            skipped_files.push(SkippedFile {
                filename: file.filename,
                reason: "MAX_REVIEW_FILES reached".to_string(),
            });
            continue;
        }

        let (patch, patch_truncated) = match &file.patch {
            None => (None, false),
            Some(raw_patch) if raw_patch.len() > budgets.max_diff_bytes => match budgets.large_patch_policy {
                LargePatchPolicy::Clip => (Some(clip_patch(raw_patch, budgets.max_diff_bytes)), true),
                LargePatchPolicy::Skip => {
                    skipped_files.push(SkippedFile {
                        filename: file.filename,
                        reason: "patch exceeds MAX_DIFF_BYTES".to_string(),
                    });
                    continue;
                }
            },
            Some(raw_patch) => (Some(raw_patch.clone()), false),
        };

        let patch_bytes = patch.as_ref().map(|p| p.len()).unwrap_or(0);
        if total_diff_bytes + patch_bytes > budgets.max_total_diff_bytes {
            skipped_files.push(SkippedFile {
                filename: file.filename,
                reason: "total diff budget exhausted".to_string(),
            });
            continue;
        }
        total_diff_bytes += patch_bytes;

        changed_files.push(ChangedFileEntry {
            filename: file.filename,
            status: file.status,
            additions: file.additions,
            deletions: file.deletions,
            changes: file.changes,
            patch,
            patch_truncated,
        });
    }

    let truncation_note = if skipped_files.is_empty() {
        None
    } else {
        let reasons: Vec<String> = skipped_files
            .iter()
            .take(5)
            .map(|s| format!("{}: {}", s.filename, s.reason))
            .collect();
        Some(format!("{} file(s) skipped: {}", skipped_files.len(), reasons.join("; ")))
    };

    BuildResult {
        context: PRContext {
            pull_request,
            changed_files,
            skipped_files,
            linked_jira_issues: Vec::new(),
            truncation_note,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pr_summary() -> PullRequestSummary {
        PullRequestSummary {
            title: "t".to_string(),
            body: String::new(),
            base_ref: "main".to_string(),
            head_ref: "feature".to_string(),
            total_additions: 0,
            total_deletions: 0,
            total_changed_files: 0,
        }
    }

    fn raw(filename: &str, changes: u64, patch: Option<&str>) -> RawChangedFile {
        RawChangedFile {
            filename: filename.to_string(),
            status: FileStatus::Modified,
            additions: changes,
            deletions: 0,
            changes,
            patch: patch.map(|p| p.to_string()),
        }
    }

    #[test]
    fn files_are_sorted_by_descending_changes() {
        let files = vec![raw("a.rs", 5, Some("x")), raw("b.rs", 50, Some("y")), raw("c.rs", 20, Some("z"))];
        let result = build_context(pr_summary(), files, &ContextBudgets::default(), &[]);
        let names: Vec<&str> = result.context.changed_files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["b.rs", "c.rs", "a.rs"]);
    }

    #[test]
    fn sensitive_paths_are_skipped_with_reason() {
        let files = vec![raw("config/.env", 3, Some("x")), raw("src/lib.rs", 3, Some("y"))];
        let result = build_context(pr_summary(), files, &ContextBudgets::default(), &[]);
        assert_eq!(result.context.changed_files.len(), 1);
        assert_eq!(result.context.changed_files[0].filename, "src/lib.rs");
        assert_eq!(result.context.skipped_files[0].reason, "sensitive path");
    }

    #[test]
    fn exclusion_patterns_skip_matching_files() {
        let files = vec![raw("Cargo.lock", 100, Some("x")), raw("src/lib.rs", 3, Some("y"))];
        let patterns = vec!["*.lock".to_string()];
        let result = build_context(pr_summary(), files, &ContextBudgets::default(), &patterns);
        assert_eq!(result.context.changed_files.len(), 1);
        assert_eq!(result.context.changed_files[0].filename, "src/lib.rs");
    }

    #[test]
    fn max_review_files_caps_file_count() {
        let files: Vec<_> = (0..5).map(|i| raw(&format!("f{i}.rs"), 10 - i as u64, Some("x"))).collect();
        let budgets = ContextBudgets { max_review_files: 2, ..ContextBudgets::default() };
        let result = build_context(pr_summary(), files, &budgets, &[]);
        assert_eq!(result.context.changed_files.len(), 2);
        assert_eq!(result.context.skipped_files.len(), 3);
    }

    #[test]
    fn oversized_patch_is_clipped_under_clip_policy() {
        let big_patch = "x".repeat(100);
        let files = vec![raw("big.rs", 100, Some(&big_patch))];
        let budgets = ContextBudgets { max_diff_bytes: 10, ..ContextBudgets::default() };
        let result = build_context(pr_summary(), files, &budgets, &[]);
        let entry = &result.context.changed_files[0];
        assert!(entry.patch_truncated);
        assert_eq!(entry.patch.as_ref().unwrap().len(), 10);
    }

    #[test]
    fn oversized_patch_is_skipped_under_skip_policy() {
        let big_patch = "x".repeat(100);
        let files = vec![raw("big.rs", 100, Some(&big_patch))];
        let budgets = ContextBudgets {
            max_diff_bytes: 10,
            large_patch_policy: LargePatchPolicy::Skip,
            ..ContextBudgets::default()
        };
        let result = build_context(pr_summary(), files, &budgets, &[]);
        assert!(result.context.changed_files.is_empty());
        assert_eq!(result.context.skipped_files[0].reason, "patch exceeds MAX_DIFF_BYTES");
    }

    #[test]
    fn total_diff_budget_exhaustion_skips_later_files() {
        let files = vec![raw("a.rs", 100, Some(&"x".repeat(60))), raw("b.rs", 90, Some(&"y".repeat(60)))];
        let budgets = ContextBudgets { max_total_diff_bytes: 100, ..ContextBudgets::default() };
        let result = build_context(pr_summary(), files, &budgets, &[]);
        assert_eq!(result.context.changed_files.len(), 1);
        assert_eq!(result.context.skipped_files[0].reason, "total diff budget exhausted");
    }

    #[test]
    fn truncation_note_summarizes_first_five_reasons() {
        let files: Vec<_> = (0..8).map(|i| raw(&format!("secrets/f{i}.rs"), 1, Some("x"))).collect();
        let result = build_context(pr_summary(), files, &ContextBudgets::default(), &[]);
        let note = result.context.truncation_note.unwrap();
        assert!(note.starts_with("8 file(s) skipped:"));
        assert_eq!(note.matches("secrets/").count(), 5);
    }

    #[test]
    fn no_skips_means_no_truncation_note() {
        let files = vec![raw("a.rs", 1, Some("x"))];
        let result = build_context(pr_summary(), files, &ContextBudgets::default(), &[]);
        assert!(result.context.truncation_note.is_none());
    }

    #[test]
    fn glob_star_matches_suffix_and_prefix() {
        assert!(path_matches_glob("cargo.lock", "*.lock"));
        assert!(path_matches_glob("vendor/foo/bar.rs", "vendor/*"));
        assert!(!path_matches_glob("src/lib.rs", "*.lock"));
    }

    #[test]
    fn id_rsa_variants_are_sensitive() {
        assert!(is_sensitive_path("keys/id_rsa"));
        assert!(is_sensitive_path("keys/id_rsa.pub"));
        assert!(!is_sensitive_path("src/connection_pool.rs"));
    }
}
