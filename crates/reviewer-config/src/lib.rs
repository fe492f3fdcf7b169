//! Environment-variable configuration, loaded once at process start and
//! never mutated after. Every key in the external-interfaces contract
//! (`MAX_WEBHOOK_AGE_SECONDS`, `GITHUB_ALLOWED_REPOS`, ...) has a typed
//! field here with a documented default, following a load-with-defaults
//! shape, sourced from environment variables since this is how a
//! serverless invocation receives its configuration.
//!
//! # Example
//!
//! ```
//! use reviewer_config::Config;
//!
//! temp_env::with_var("QUEUE_URL", Some("https://queue.example/q"), || {
//!     temp_env::with_var("IDEMPOTENCY_TABLE", Some("reviews"), || {
//!         let config = Config::from_env().unwrap();
//!         assert_eq!(config.max_webhook_age_seconds, 300);
//!     });
//! });
//! ```

use std::env;

use reviewer_context::LargePatchPolicy;

/// Error loading configuration from the process environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),
    #[error("environment variable {name} has an invalid value {value:?}: {reason}")]
    Invalid { name: &'static str, value: String, reason: String },
}

/// The full set of recognized environment options (spec §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `0` disables the replay-window check.
    pub max_webhook_age_seconds: i64,
    /// Empty means no filtering (every repo is allowed).
    pub github_allowed_repos: Vec<String>,
    pub review_trigger_phrase: String,
    pub bot_username: String,
    pub review_trigger_labels: Vec<String>,
    pub check_run_name: String,
    pub queue_url: String,
    pub fanout_queue_url: Option<String>,
    pub idempotency_table: String,
    pub idempotency_ttl_seconds: i64,
    pub max_review_files: usize,
    pub max_diff_bytes: usize,
    pub max_total_diff_bytes: usize,
    pub large_patch_policy: LargePatchPolicy,
    pub skip_patterns: Vec<String>,
    pub dry_run: bool,
}

impl Config {
    /// Load configuration from `std::env`, applying the documented
    /// default for every optional key. `QUEUE_URL` and
    /// `IDEMPOTENCY_TABLE` are the only keys with no default: a worker
    /// cannot dispatch or claim idempotency without them.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            max_webhook_age_seconds: parse_opt("MAX_WEBHOOK_AGE_SECONDS", 300)?,
            github_allowed_repos: csv_opt("GITHUB_ALLOWED_REPOS"),
            review_trigger_phrase: string_opt("REVIEW_TRIGGER_PHRASE", "/review"),
            bot_username: string_opt("BOT_USERNAME", "ai-reviewer"),
            review_trigger_labels: csv_opt("REVIEW_TRIGGER_LABELS"),
            check_run_name: string_opt("CHECK_RUN_NAME", "ai-review"),
            queue_url: required("QUEUE_URL")?,
            fanout_queue_url: env::var("FANOUT_QUEUE_URL").ok(),
            idempotency_table: required("IDEMPOTENCY_TABLE")?,
            idempotency_ttl_seconds: parse_opt("IDEMPOTENCY_TTL_SECONDS", 7 * 24 * 3600)?,
            max_review_files: parse_opt("MAX_REVIEW_FILES", 40)?,
            max_diff_bytes: parse_opt("MAX_DIFF_BYTES", 20_000)?,
            max_total_diff_bytes: parse_opt("MAX_TOTAL_DIFF_BYTES", 200_000)?,
            large_patch_policy: large_patch_policy()?,
            skip_patterns: csv_opt("SKIP_PATTERNS"),
            dry_run: bool_opt("DRY_RUN"),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingRequired(name))
}

fn string_opt(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn csv_opt(name: &'static str) -> Vec<String> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
        }
        _ => Vec::new(),
    }
}

fn bool_opt(name: &'static str) -> bool {
    match env::var(name) {
        Ok(raw) => matches!(raw.trim(), "1" | "true" | "TRUE" | "True"),
        Err(_) => false,
    }
}

fn parse_opt<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse::<T>().map_err(|_| ConfigError::Invalid {
            name,
            value: raw,
            reason: "not a valid integer".to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn large_patch_policy() -> Result<LargePatchPolicy, ConfigError> {
    match env::var("LARGE_PATCH_POLICY") {
        Ok(raw) => match raw.as_str() {
            "clip" => Ok(LargePatchPolicy::Clip),
            "skip" => Ok(LargePatchPolicy::Skip),
            other => Err(ConfigError::Invalid {
                name: "LARGE_PATCH_POLICY",
                value: other.to_string(),
                reason: "must be 'clip' or 'skip'".to_string(),
            }),
        },
        Err(_) => Ok(LargePatchPolicy::Clip),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn with_required_vars<F: FnOnce()>(f: F) {
        temp_env::with_vars(
            [("QUEUE_URL", Some("https://queue.example/q")), ("IDEMPOTENCY_TABLE", Some("reviews"))],
            f,
        );
    }

    #[test]
    #[serial]
    fn missing_queue_url_is_an_error() {
        temp_env::with_var("QUEUE_URL", None::<&str>, || {
            temp_env::with_var("IDEMPOTENCY_TABLE", Some("reviews"), || {
                let result = Config::from_env();
                assert!(matches!(result, Err(ConfigError::MissingRequired("QUEUE_URL"))));
            });
        });
    }

    #[test]
    #[serial]
    fn defaults_match_spec() {
        with_required_vars(|| {
            let config = Config::from_env().unwrap();
            assert_eq!(config.max_webhook_age_seconds, 300);
            assert_eq!(config.review_trigger_phrase, "/review");
            assert_eq!(config.check_run_name, "ai-review");
            assert_eq!(config.idempotency_ttl_seconds, 604_800);
            assert_eq!(config.max_review_files, 40);
            assert_eq!(config.max_diff_bytes, 20_000);
            assert_eq!(config.max_total_diff_bytes, 200_000);
            assert_eq!(config.large_patch_policy, LargePatchPolicy::Clip);
            assert!(!config.dry_run);
            assert!(config.github_allowed_repos.is_empty());
            assert!(config.fanout_queue_url.is_none());
        });
    }

    #[test]
    #[serial]
    fn csv_options_split_and_trim() {
        with_required_vars(|| {
            temp_env::with_var("GITHUB_ALLOWED_REPOS", Some("acme/widgets, acme/gadgets ,, acme/gizmos"), || {
                let config = Config::from_env().unwrap();
                assert_eq!(
                    config.github_allowed_repos,
                    vec!["acme/widgets".to_string(), "acme/gadgets".to_string(), "acme/gizmos".to_string()]
                );
            });
        });
    }

    #[test]
    #[serial]
    fn dry_run_parses_truthy_values() {
        with_required_vars(|| {
            temp_env::with_var("DRY_RUN", Some("1"), || {
                assert!(Config::from_env().unwrap().dry_run);
            });
            temp_env::with_var("DRY_RUN", Some("0"), || {
                assert!(!Config::from_env().unwrap().dry_run);
            });
        });
    }

    #[test]
    #[serial]
    fn invalid_integer_is_an_error() {
        with_required_vars(|| {
            temp_env::with_var("MAX_REVIEW_FILES", Some("not-a-number"), || {
                let result = Config::from_env();
                assert!(matches!(result, Err(ConfigError::Invalid { name: "MAX_REVIEW_FILES", .. })));
            });
        });
    }

    #[test]
    #[serial]
    fn invalid_large_patch_policy_is_an_error() {
        with_required_vars(|| {
            temp_env::with_var("LARGE_PATCH_POLICY", Some("truncate"), || {
                let result = Config::from_env();
                assert!(matches!(result, Err(ConfigError::Invalid { name: "LARGE_PATCH_POLICY", .. })));
            });
        });
    }

    #[test]
    #[serial]
    fn zero_webhook_age_disables_replay_check_downstream() {
        with_required_vars(|| {
            temp_env::with_var("MAX_WEBHOOK_AGE_SECONDS", Some("0"), || {
                assert_eq!(Config::from_env().unwrap().max_webhook_age_seconds, 0);
            });
        });
    }
}
