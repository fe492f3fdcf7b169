//! The read-only repo policy snapshot loaded from the PR's default branch.

use serde::{Deserialize, Serialize};

/// A severity threshold, ordered `None < Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Medium
    }
}

/// How inline review comments are emitted relative to the diff-position
/// mapper's ability to place them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewCommentMode {
    /// Emit only comments whose position could be mapped; others are
    /// dropped silently from the inline set (they still appear in the
    /// rendered summary).
    InlineBestEffort,
    /// Suppress any finding that cannot be positioned inline, including
    /// those with a null line.
    StrictInline,
    /// Emit no inline comments at all.
    SummaryOnly,
}

impl Default for ReviewCommentMode {
    fn default() -> Self {
        ReviewCommentMode::InlineBestEffort
    }
}

/// Read-only repo configuration, loaded once per message from
/// `.ai-reviewer.yml` on the PR's default branch and never mutated after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoPolicy {
    pub failure_on_severity: Severity,
    pub skip_draft_prs: bool,
    pub post_review_comment: bool,
    pub review_comment_mode: ReviewCommentMode,
    pub require_security_review: bool,
    pub require_tests_review: bool,
    pub num_max_findings: u32,
}

impl Default for RepoPolicy {
    fn default() -> Self {
        Self {
            failure_on_severity: Severity::default(),
            skip_draft_prs: true,
            post_review_comment: true,
            review_comment_mode: ReviewCommentMode::default(),
            require_security_review: false,
            require_tests_review: false,
            num_max_findings: 25,
        }
    }
}
