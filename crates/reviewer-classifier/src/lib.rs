//! Maps a raw `(event, action, ...)` tuple from the forge to a canonical
//! [`reviewer_types::Trigger`], or a reason to ignore the delivery.
//!
//! # Example
//!
//! ```
//! use reviewer_classifier::{ClassifierConfig, classify_pull_request};
//!
//! let config = ClassifierConfig::default();
//! let decision = classify_pull_request("opened", None, &config);
//! assert!(decision.is_enqueue());
//! ```

use reviewer_types::Trigger;

/// Runtime-configurable knobs for classification, sourced from the
/// `REVIEW_TRIGGER_PHRASE`, `BOT_USERNAME`, `REVIEW_TRIGGER_LABELS`, and
/// `CHECK_RUN_NAME` environment options.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub trigger_phrase: String,
    pub bot_username: String,
    pub trigger_labels: Vec<String>,
    pub check_run_name: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            trigger_phrase: "/review".to_string(),
            bot_username: "ai-reviewer".to_string(),
            trigger_labels: Vec::new(),
            check_run_name: "ai-review".to_string(),
        }
    }
}

/// The outcome of classifying one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    Enqueue {
        trigger: Trigger,
        /// `issue_comment` deliveries carry no `head_sha`; the receiver
        /// must resolve it via a forge API call before enqueueing.
        needs_head_sha_resolution: bool,
    },
    Ignore {
        reason: String,
    },
}

impl TriggerDecision {
    pub fn is_enqueue(&self) -> bool {
        matches!(self, TriggerDecision::Enqueue { .. })
    }

    pub fn ignore_reason(&self) -> Option<&str> {
        match self {
            TriggerDecision::Ignore { reason } => Some(reason),
            _ => None,
        }
    }
}

fn enqueue_auto() -> TriggerDecision {
    TriggerDecision::Enqueue {
        trigger: Trigger::Auto,
        needs_head_sha_resolution: false,
    }
}

fn ignore(reason: impl Into<String>) -> TriggerDecision {
    TriggerDecision::Ignore { reason: reason.into() }
}

/// Classify a `pull_request` event. `applied_label` is the label name
/// from the event payload when `action == "labeled"`.
pub fn classify_pull_request(action: &str, applied_label: Option<&str>, config: &ClassifierConfig) -> TriggerDecision {
    match action {
        "opened" | "synchronize" | "reopened" | "ready_for_review" => enqueue_auto(),
        "labeled" => match applied_label {
            Some(label) if config.trigger_labels.iter().any(|l| l == label) => enqueue_auto(),
            Some(label) => ignore(format!("label '{label}' not in trigger-label set")),
            None => ignore("labeled action carried no label"),
        },
        other => ignore(format!("pull_request action '{other}' is not actionable")),
    }
}

/// Classify an `issue_comment` event. `is_pull_request` must reflect
/// whether the parent issue is actually a pull request (plain issue
/// comments are never actionable).
pub fn classify_issue_comment(
    action: &str,
    is_pull_request: bool,
    comment_body: &str,
    config: &ClassifierConfig,
) -> TriggerDecision {
    if !matches!(action, "created" | "edited") {
        return ignore(format!("issue_comment action '{action}' is not actionable"));
    }
    if !is_pull_request {
        return ignore("comment is on an issue, not a pull request");
    }
    if detect_trigger_phrase(comment_body, &config.trigger_phrase, &config.bot_username) {
        TriggerDecision::Enqueue {
            trigger: Trigger::Manual,
            needs_head_sha_resolution: true,
        }
    } else {
        ignore("no_trigger_phrase")
    }
}

/// Classify a `check_run` event.
pub fn classify_check_run(action: &str, check_name: &str, config: &ClassifierConfig) -> TriggerDecision {
    if action != "rerequested" {
        return ignore(format!("check_run action '{action}' is not actionable"));
    }
    if check_name != config.check_run_name {
        return ignore(format!("check run '{check_name}' does not match configured name"));
    }
    TriggerDecision::Enqueue {
        trigger: Trigger::Rerun,
        needs_head_sha_resolution: false,
    }
}

/// `pull_request_review_comment` deliveries are always ignored to avoid
/// recursive review loops (the reviewer's own inline comments land here).
pub fn classify_pull_request_review_comment() -> TriggerDecision {
    ignore("pull_request_review_comment is never actionable")
}

/// Detect the manual-trigger phrase in a comment body: either the
/// configured trigger phrase (default `/review`) or `@<bot> review`,
/// matched case-insensitively.
pub fn detect_trigger_phrase(comment_body: &str, trigger_phrase: &str, bot_username: &str) -> bool {
    let lower = comment_body.to_lowercase();
    if lower.contains(&trigger_phrase.to_lowercase()) {
        return true;
    }
    let mention = format!("@{} review", bot_username.to_lowercase());
    lower.contains(&mention)
}

/// `true` if `repo_full_name` passes the configured allow-list. An empty
/// allow-list means no filtering (everything passes).
pub fn repo_allowed(repo_full_name: &str, allow_list: &[String]) -> bool {
    allow_list.is_empty() || allow_list.iter().any(|r| r == repo_full_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClassifierConfig {
        ClassifierConfig {
            trigger_phrase: "/review".to_string(),
            bot_username: "ai-reviewer".to_string(),
            trigger_labels: vec!["needs-review".to_string()],
            check_run_name: "ai-review".to_string(),
        }
    }

    #[test]
    fn opened_synchronize_reopened_ready_are_auto() {
        let config = config();
        for action in ["opened", "synchronize", "reopened", "ready_for_review"] {
            let decision = classify_pull_request(action, None, &config);
            assert_eq!(
                decision,
                TriggerDecision::Enqueue { trigger: Trigger::Auto, needs_head_sha_resolution: false }
            );
        }
    }

    #[test]
    fn labeled_with_trigger_label_enqueues() {
        let config = config();
        let decision = classify_pull_request("labeled", Some("needs-review"), &config);
        assert!(decision.is_enqueue());
    }

    #[test]
    fn labeled_with_other_label_is_ignored() {
        let config = config();
        let decision = classify_pull_request("labeled", Some("wontfix"), &config);
        assert!(!decision.is_enqueue());
    }

    #[test]
    fn other_pull_request_actions_are_ignored() {
        let config = config();
        assert!(!classify_pull_request("closed", None, &config).is_enqueue());
        assert!(!classify_pull_request("assigned", None, &config).is_enqueue());
    }

    #[test]
    fn trigger_phrase_detected_case_insensitively() {
        let config = config();
        let decision = classify_issue_comment("created", true, "please /REVIEW this", &config);
        assert_eq!(
            decision,
            TriggerDecision::Enqueue { trigger: Trigger::Manual, needs_head_sha_resolution: true }
        );
    }

    #[test]
    fn bot_mention_review_is_detected() {
        let config = config();
        let decision = classify_issue_comment("created", true, "@AI-Reviewer review please", &config);
        assert!(decision.is_enqueue());
    }

    #[test]
    fn comment_without_trigger_phrase_is_ignored_with_reason() {
        let config = config();
        let decision = classify_issue_comment("created", true, "looks good to me", &config);
        assert_eq!(decision.ignore_reason(), Some("no_trigger_phrase"));
    }

    #[test]
    fn comment_on_plain_issue_is_ignored() {
        let config = config();
        let decision = classify_issue_comment("created", false, "/review", &config);
        assert!(!decision.is_enqueue());
    }

    #[test]
    fn rerequested_matching_check_name_is_rerun() {
        let config = config();
        let decision = classify_check_run("rerequested", "ai-review", &config);
        assert_eq!(
            decision,
            TriggerDecision::Enqueue { trigger: Trigger::Rerun, needs_head_sha_resolution: false }
        );
    }

    #[test]
    fn rerequested_for_other_check_is_ignored() {
        let config = config();
        assert!(!classify_check_run("rerequested", "ci/build", &config).is_enqueue());
    }

    #[test]
    fn review_comment_event_is_always_ignored() {
        assert!(!classify_pull_request_review_comment().is_enqueue());
    }

    #[test]
    fn empty_allow_list_admits_everything() {
        assert!(repo_allowed("acme/widgets", &[]));
    }

    #[test]
    fn nonempty_allow_list_filters() {
        let allow_list = vec!["acme/widgets".to_string()];
        assert!(repo_allowed("acme/widgets", &allow_list));
        assert!(!repo_allowed("acme/other", &allow_list));
    }
}
