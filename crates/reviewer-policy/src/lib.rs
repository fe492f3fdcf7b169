//! Loads `.ai-reviewer.yml` from the PR's default branch into a
//! [`RepoPolicy`], with a load-with-defaults shape: a file that may be
//! partially present, missing entirely, or carry keys from a future schema
//! version, all of which must resolve to a usable policy rather than a
//! hard failure.
//!
//! # Example
//!
//! ```
//! use reviewer_policy::load_repo_policy;
//!
//! let policy = load_repo_policy(None).unwrap();
//! assert!(policy.skip_draft_prs);
//!
//! let policy = load_repo_policy(Some("failure_on_severity: high\n")).unwrap();
//! assert_eq!(policy.failure_on_severity, reviewer_types::Severity::High);
//! ```

use reviewer_types::RepoPolicy;

/// Error parsing a present-but-malformed `.ai-reviewer.yml`.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("policy file is not valid YAML: {0}")]
    Malformed(#[from] serde_yaml::Error),
}

/// Load the repo policy from the raw file contents, if the file exists
/// on the default branch. `None` (the file is absent) yields
/// [`RepoPolicy::default`], matching the spec's "never block a PR on a
/// missing config file" requirement. A present file that fails to parse
/// is a [`PolicyError::Malformed`]; unknown keys in an otherwise valid
/// file are silently ignored via `#[serde(default)]` on every field.
pub fn load_repo_policy(contents: Option<&str>) -> Result<RepoPolicy, PolicyError> {
    match contents {
        None => Ok(RepoPolicy::default()),
        Some(raw) if raw.trim().is_empty() => Ok(RepoPolicy::default()),
        Some(raw) => Ok(serde_yaml::from_str(raw)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reviewer_types::{ReviewCommentMode, Severity};

    #[test]
    fn absent_file_yields_defaults() {
        let policy = load_repo_policy(None).unwrap();
        assert_eq!(policy, RepoPolicy::default());
    }

    #[test]
    fn empty_file_yields_defaults() {
        let policy = load_repo_policy(Some("")).unwrap();
        assert_eq!(policy, RepoPolicy::default());
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let policy = load_repo_policy(Some("require_security_review: true\nnum_max_findings: 10\n")).unwrap();
        assert!(policy.require_security_review);
        assert_eq!(policy.num_max_findings, 10);
        assert!(policy.skip_draft_prs);
        assert_eq!(policy.review_comment_mode, ReviewCommentMode::InlineBestEffort);
    }

    #[test]
    fn unknown_keys_do_not_fail_the_load() {
        let policy = load_repo_policy(Some("failure_on_severity: low\nsome_future_key: [1, 2]\n")).unwrap();
        assert_eq!(policy.failure_on_severity, Severity::Low);
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let result = load_repo_policy(Some("failure_on_severity: [unterminated\n"));
        assert!(matches!(result, Err(PolicyError::Malformed(_))));
    }

    proptest::proptest! {
        #[test]
        fn num_max_findings_round_trips(n: u32) {
            let yaml = format!("num_max_findings: {n}\n");
            let policy = load_repo_policy(Some(&yaml)).unwrap();
            proptest::prop_assert_eq!(policy.num_max_findings, n);
        }
    }
}
