//! Applies a repo's findings cap and severity threshold to a sanitized
//! finding set and derives the check-run conclusion.
//!
//! [`Finding::priority`] is the three-level scale the reviewer emits
//! (`0`=critical, `1`=warning, `2`=info); [`Severity`] is the four-level
//! scale repo policy is expressed in (`none < low < medium < high`).
//! [`severity_of`] is the single place that bridges the two: critical maps
//! to high, warning to medium, info to low. `Severity::None` is reachable
//! only as a policy threshold, never as a finding's own severity.
//!
//! # Example
//!
//! ```
//! use reviewer_types::{Priority, Severity};
//! use reviewer_verdict::severity_of;
//!
//! assert_eq!(severity_of(Priority::CRITICAL), Severity::High);
//! assert_eq!(severity_of(Priority::INFO), Severity::Low);
//! ```

use reviewer_types::{Finding, FindingType, Priority, RepoPolicy, Severity};

/// The check-run conclusion a worker posts after a review completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Neutral,
    Failure,
}

/// Map a finding's three-level priority to the four-level severity scale
/// repo policy thresholds are expressed in.
pub fn severity_of(priority: Priority) -> Severity {
    match priority.value() {
        0 => Severity::High,
        1 => Severity::Medium,
        _ => Severity::Low,
    }
}

/// Cap `findings` to `policy.num_max_findings`, keeping the most severe
/// (lowest `priority` value) findings first. Ties keep input order.
pub fn apply_findings_cap(mut findings: Vec<Finding>, policy: &RepoPolicy) -> Vec<Finding> {
    findings.sort_by_key(|f| f.priority);
    findings.truncate(policy.num_max_findings as usize);
    findings
}

/// Derive the check-run conclusion from the (already sanitized and capped)
/// findings and repo policy.
///
/// - `failure_on_severity = none` always yields [`Verdict::Neutral`],
///   unconditionally — `require_security_review`/`require_tests_review` are
///   filters applied on top of a nonzero threshold, never a gate of their
///   own that can force a failure at threshold `none`.
/// - Otherwise, [`Verdict::Failure`] if any finding's severity is at least
///   the threshold, or if `require_security_review`/`require_tests_review`
///   is set and no finding of the corresponding category is present among
///   `findings` (the category was required but not delivered).
/// - [`Verdict::Success`] never arises from findings alone; callers that
///   want a clean bill of health for an empty, compliant review should
///   treat [`Verdict::Neutral`] with zero findings as success-equivalent.
pub fn derive_verdict(findings: &[Finding], policy: &RepoPolicy) -> Verdict {
    if policy.failure_on_severity == Severity::None {
        return Verdict::Neutral;
    }

    if policy.require_security_review && !findings.iter().any(|f| f.finding_type == FindingType::Security) {
        return Verdict::Failure;
    }
    if policy.require_tests_review && !findings.iter().any(|f| f.finding_type == FindingType::Tests) {
        return Verdict::Failure;
    }

    let any_over_threshold = findings.iter().any(|f| severity_of(f.priority) >= policy.failure_on_severity);
    if any_over_threshold { Verdict::Failure } else { Verdict::Neutral }
}
