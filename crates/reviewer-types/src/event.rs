//! The canonical event produced by the webhook receiver and consumed by
//! workers, plus the dedup/idempotency key derived from it.

use serde::{Deserialize, Serialize};

/// Canonical classification of why a review was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// A pull-request lifecycle event that should always be reviewed
    /// (`opened`, `synchronize`, `reopened`, `ready_for_review`, or a
    /// qualifying `labeled`).
    Auto,
    /// An explicit request via issue comment (`/review` or `@bot review`).
    Manual,
    /// A check-run re-run request.
    Rerun,
}

impl Trigger {
    /// `manual` and `rerun` triggers override the drafts/branch-pattern
    /// skip policy at worker time: an explicit request always runs.
    pub fn overrides_skip_policy(self) -> bool {
        matches!(self, Trigger::Manual | Trigger::Rerun)
    }
}

/// The normalized internal representation of an inbound forge event,
/// produced by the webhook receiver after classification. Consumers must
/// be tolerant of unknown fields (the struct is deliberately not
/// `deny_unknown_fields`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    /// Opaque forge delivery id, used for correlation and logging.
    pub delivery_id: String,
    /// `owner/name`.
    pub repo_full_name: String,
    /// Positive pull-request number.
    pub pr_number: u64,
    /// 40-hex commit sha the review should run against.
    pub head_sha: String,
    /// Opaque forge-app installation id.
    pub installation_id: String,
    /// Raw event action string (`opened`, `synchronize`, `rerequested`, ...).
    pub event_action: String,
    /// Canonical trigger classification.
    pub trigger: Trigger,
    /// Base branch ref, when known at enqueue time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_ref: Option<String>,
}

impl CanonicalEvent {
    /// Derive this event's [`DedupKey`].
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(&self.repo_full_name, self.pr_number, &self.head_sha)
    }

    /// `MessageGroupId` for a FIFO queue: serializes delivery per-PR.
    pub fn message_group_id(&self) -> String {
        format!("{}:{}", self.repo_full_name, self.pr_number)
    }

    /// Correlation id used in logs and error messages:
    /// `delivery:repo:pr:sha`.
    pub fn correlation_id(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.delivery_id, self.repo_full_name, self.pr_number, self.head_sha
        )
    }
}

/// Stable string identifying one `(repo, pr, head_sha)` triple. Used as the
/// FIFO deduplication id on the queue and as the idempotency-claim primary
/// key. It is a total, injective function of its inputs: changing any one
/// input field changes the key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DedupKey(String);

impl DedupKey {
    /// Build a dedup key as `<repo_full_name>:<pr_number>:<head_sha>`.
    pub fn new(repo_full_name: &str, pr_number: u64, head_sha: &str) -> Self {
        Self(format!("{repo_full_name}:{pr_number}:{head_sha}"))
    }

    /// The raw string form, e.g. for use as a KV store key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> CanonicalEvent {
        CanonicalEvent {
            delivery_id: "d1".to_string(),
            repo_full_name: "acme/widgets".to_string(),
            pr_number: 42,
            head_sha: "a".repeat(40),
            installation_id: "inst-1".to_string(),
            event_action: "opened".to_string(),
            trigger: Trigger::Auto,
            base_ref: Some("main".to_string()),
        }
    }

    #[test]
    fn dedup_key_is_total_function_of_inputs() {
        let a = DedupKey::new("acme/widgets", 42, &"a".repeat(40));
        let b = DedupKey::new("acme/widgets", 42, &"a".repeat(40));
        assert_eq!(a, b);
    }

    #[test]
    fn dedup_key_changes_when_sha_changes() {
        let a = DedupKey::new("acme/widgets", 42, &"a".repeat(40));
        let b = DedupKey::new("acme/widgets", 42, &"b".repeat(40));
        assert_ne!(a, b);
    }

    #[test]
    fn dedup_key_changes_when_pr_changes() {
        let a = DedupKey::new("acme/widgets", 42, &"a".repeat(40));
        let b = DedupKey::new("acme/widgets", 43, &"a".repeat(40));
        assert_ne!(a, b);
    }

    #[test]
    fn dedup_key_changes_when_repo_changes() {
        let a = DedupKey::new("acme/widgets", 42, &"a".repeat(40));
        let b = DedupKey::new("acme/other", 42, &"a".repeat(40));
        assert_ne!(a, b);
    }

    #[test]
    fn event_dedup_key_matches_manual_derivation() {
        let event = sample_event();
        assert_eq!(event.dedup_key().as_str(), "acme/widgets:42:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    }

    #[test]
    fn message_group_id_is_per_pr() {
        let event = sample_event();
        assert_eq!(event.message_group_id(), "acme/widgets:42");
    }

    #[test]
    fn manual_and_rerun_override_skip_policy() {
        assert!(Trigger::Manual.overrides_skip_policy());
        assert!(Trigger::Rerun.overrides_skip_policy());
        assert!(!Trigger::Auto.overrides_skip_policy());
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let json = serde_json::json!({
            "delivery_id": "d1",
            "repo_full_name": "acme/widgets",
            "pr_number": 1,
            "head_sha": "a".repeat(40),
            "installation_id": "inst",
            "event_action": "opened",
            "trigger": "auto",
            "some_future_field": "ignored",
        });
        let event: CanonicalEvent = serde_json::from_value(json).unwrap();
        assert_eq!(event.pr_number, 1);
    }

    #[test]
    fn correlation_id_format() {
        let event = sample_event();
        assert_eq!(
            event.correlation_id(),
            format!("d1:acme/widgets:42:{}", "a".repeat(40))
        );
    }
}
