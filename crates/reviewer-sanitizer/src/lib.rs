//! Strips suggested patches and rewrites security findings for any
//! [`Finding`] whose file matches the sensitive-path predicate, so that
//! credential material never reaches a posted review comment.
//!
//! # Example
//!
//! ```
//! use reviewer_sanitizer::sanitize_finding;
//! use reviewer_types::{Finding, FindingType, Priority};
//!
//! let finding = Finding {
//!     priority: Priority::try_from(0).unwrap(),
//!     finding_type: FindingType::Security,
//!     file: "config/.env".to_string(),
//!     start_line: Some(1),
//!     end_line: Some(1),
//!     message: "hardcoded token: sk_live_abc123".to_string(),
//!     evidence: "sk_live_abc123".to_string(),
//!     suggested_patch: Some("-sk_live_abc123\n+REDACTED".to_string()),
//! };
//! let sanitized = sanitize_finding(finding);
//! assert!(sanitized.suggested_patch.is_none());
//! assert_eq!(sanitized.message, reviewer_sanitizer::CANONICAL_SECURITY_REMEDIATION_MESSAGE);
//! ```

use reviewer_context::is_sensitive_path;
use reviewer_types::{Finding, FindingType};

/// Replaces a security finding's message when its file is sensitive, so the
/// rendered review never echoes the credential material the LLM may have
/// quoted back from the diff.
pub const CANONICAL_SECURITY_REMEDIATION_MESSAGE: &str =
    "A potential credential or secret was detected in a sensitive file. Rotate the affected \
     credential and remove it from version control; details are withheld from this review.";

/// Sanitize a single finding in place (by value): clear `suggested_patch`
/// when `file` is sensitive, and additionally replace `message` with
/// [`CANONICAL_SECURITY_REMEDIATION_MESSAGE`] when the finding is also a
/// [`FindingType::Security`] finding.
pub fn sanitize_finding(mut finding: Finding) -> Finding {
    if !is_sensitive_path(&finding.file) {
        return finding;
    }
    finding.suggested_patch = None;
    if finding.finding_type == FindingType::Security {
        finding.message = CANONICAL_SECURITY_REMEDIATION_MESSAGE.to_string();
    }
    finding
}

/// Apply [`sanitize_finding`] across a batch of findings, preserving order.
pub fn sanitize_findings(findings: Vec<Finding>) -> Vec<Finding> {
    findings.into_iter().map(sanitize_finding).collect()
}
