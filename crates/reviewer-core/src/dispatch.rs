//! The [`Dispatcher`]: one worker invocation's worth of state (forge app
//! credentials, the installation-token cache, the idempotency store, and
//! the LLM runtime) and the pipeline that turns a [`CanonicalEvent`] into
//! a posted review.

use std::sync::Arc;

use anyhow::Context as _;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;

use reviewer_config::Config;
use reviewer_context::{ContextBudgets, RawChangedFile, build_context, matches_exclusion_set};
use reviewer_diff_map::map_position;
use reviewer_forge_auth::{InstallationTokenCache, exchange_for_installation_token, mint_app_jwt, resolve_installation_id};
use reviewer_forge_client::ForgeClient;
use reviewer_forge_client::types::{
    CheckRunConclusion, CheckRunOutput, CheckRunStatus, CreateCheckRunRequest, CreateReviewRequest, InlineComment,
    PullRequest, PullRequestFile, ReviewEvent,
};
use reviewer_idempotency::{ClaimOutcome, IdempotencyStore, claim};
use reviewer_llm::{LlmRuntime, LlmStageError, run_planner, run_reviewer};
use reviewer_logging::dispatch_span;
use reviewer_metrics::MetricsSink;
use reviewer_policy::load_repo_policy;
use reviewer_retry::RetryConfig;
use reviewer_sanitizer::sanitize_findings;
use reviewer_types::{
    CanonicalEvent, Finding, FileStatus, FindingType, PRContext, PullRequestSummary, RepoPolicy, Review,
    ReviewCommentMode,
};
use reviewer_verdict::{Verdict, apply_findings_cap, derive_verdict};

use crate::error::DispatchError;

/// The result of dispatching one message, distinct from the message-level
/// failure [`DispatchError`] represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A review (and/or check run) was posted, or would have been under
    /// `DRY_RUN`.
    Posted { verdict: Verdict },
    /// The dedup key was already claimed by a previous delivery; no work
    /// was done.
    AlreadyHandled,
    /// The PR was excluded by skip policy (draft, branch pattern, author
    /// pattern) before any LLM call was made.
    Skipped { reason: String },
    /// The planner or reviewer stage produced output that failed schema
    /// validation; a neutral check-run explaining the failure was posted
    /// (or logged, under `DRY_RUN`) instead of a review.
    NeutralWithError { reason: String },
}

/// The how-comments-map-to-findings behavior named by
/// [`ReviewCommentMode`], reified as the (findings, inline comments) pair
/// it produces. Kept as a free function rather than a method so it has no
/// dependency on `Dispatcher`'s fields.
fn apply_comment_mode(findings: Vec<Finding>, context: &PRContext, mode: ReviewCommentMode) -> (Vec<Finding>, Vec<InlineComment>) {
    let mut retained = Vec::with_capacity(findings.len());
    let mut inline = Vec::new();

    for finding in findings {
        let position = finding.start_line.and_then(|line| {
            context
                .changed_files
                .iter()
                .find(|f| f.filename == finding.file)
                .and_then(|f| f.patch.as_deref())
                .and_then(|patch| map_position(patch, line))
        });

        match mode {
            ReviewCommentMode::StrictInline => {
                if let Some(position) = position {
                    inline.push(InlineComment { path: finding.file.clone(), position, body: inline_comment_body(&finding) });
                    retained.push(finding);
                }
            }
            ReviewCommentMode::InlineBestEffort => {
                if let Some(position) = position {
                    inline.push(InlineComment { path: finding.file.clone(), position, body: inline_comment_body(&finding) });
                }
                retained.push(finding);
            }
            ReviewCommentMode::SummaryOnly => {
                retained.push(finding);
            }
        }
    }

    (retained, inline)
}

fn inline_comment_body(finding: &Finding) -> String {
    format!("**{}**: {}\n\n{}", finding_type_label(finding.finding_type), finding.message, finding.evidence)
}

fn finding_type_label(kind: FindingType) -> &'static str {
    match kind {
        FindingType::Bug => "bug",
        FindingType::Security => "security",
        FindingType::Performance => "performance",
        FindingType::Style => "style",
        FindingType::Tests => "tests",
        FindingType::Docs => "docs",
    }
}

fn review_event_for(verdict: Verdict) -> ReviewEvent {
    match verdict {
        Verdict::Success => ReviewEvent::Approve,
        Verdict::Neutral => ReviewEvent::Comment,
        Verdict::Failure => ReviewEvent::RequestChanges,
    }
}

fn check_run_conclusion_for(verdict: Verdict) -> CheckRunConclusion {
    match verdict {
        Verdict::Success => CheckRunConclusion::Success,
        Verdict::Neutral => CheckRunConclusion::Neutral,
        Verdict::Failure => CheckRunConclusion::Failure,
    }
}

fn file_status_from_str(raw: &str) -> FileStatus {
    match raw {
        "added" => FileStatus::Added,
        "removed" => FileStatus::Removed,
        "renamed" => FileStatus::Renamed,
        _ => FileStatus::Modified,
    }
}

/// Truncate `body` to at most 1000 chars, matching the context builder's
/// PR-body budget.
fn truncate_body(body: Option<String>) -> String {
    body.unwrap_or_default().chars().take(1000).collect()
}

/// Orchestrates a single queue message end-to-end. Not `Sync`: the
/// installation-token cache is a `RefCell`, matching the one-invocation-
/// owns-its-state concurrency model the rest of the worker stack uses.
pub struct Dispatcher<S: IdempotencyStore> {
    config: Config,
    forge_api_base: String,
    forge_app_id: String,
    forge_app_private_key_pem: String,
    default_installation_id: String,
    idempotency_store: S,
    llm_runtime: Arc<dyn LlmRuntime>,
    retry_config: RetryConfig,
    http: reqwest::Client,
    installation_tokens: InstallationTokenCache,
}

impl<S: IdempotencyStore> Dispatcher<S> {
    pub fn new(
        config: Config,
        forge_api_base: impl Into<String>,
        forge_app_id: impl Into<String>,
        forge_app_private_key_pem: impl Into<String>,
        default_installation_id: impl Into<String>,
        idempotency_store: S,
        llm_runtime: Arc<dyn LlmRuntime>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .context("failed to build forge-auth HTTP client")?;
        Ok(Self {
            config,
            forge_api_base: forge_api_base.into(),
            forge_app_id: forge_app_id.into(),
            forge_app_private_key_pem: forge_app_private_key_pem.into(),
            default_installation_id: default_installation_id.into(),
            idempotency_store,
            llm_runtime,
            retry_config: RetryConfig::default(),
            http,
            installation_tokens: InstallationTokenCache::new(),
        })
    }

    /// Run the full pipeline for one message: claim idempotency, then
    /// (if this is the first delivery) dispatch. Emits `reviews_success`/
    /// `reviews_failed` counters and a `dispatch_duration_ms` histogram.
    pub async fn dispatch_one(&self, event: &CanonicalEvent, metrics: &mut dyn MetricsSink) -> Result<DispatchOutcome, DispatchError> {
        let _span = dispatch_span!(event.delivery_id, event.repo_full_name, event.pr_number, event.head_sha, event.trigger).entered();
        let start = std::time::Instant::now();
        let now = Utc::now();
        let ttl = chrono::Duration::seconds(self.config.idempotency_ttl_seconds);

        let claim_outcome = claim(&self.idempotency_store, &event.dedup_key(), now, ttl)
            .await
            .map_err(DispatchError::Idempotency)?;
        if claim_outcome == ClaimOutcome::AlreadyHandled {
            tracing::info!("dedup key already claimed by a previous delivery");
            metrics.counter("reviews_success", 1, &[]);
            return Ok(DispatchOutcome::AlreadyHandled);
        }

        let result = self.run_claimed(event, metrics).await;
        metrics.histogram("dispatch_duration_ms", start.elapsed().as_millis() as f64, &[]);
        match &result {
            Ok(outcome) => {
                tracing::info!(?outcome, "dispatch completed");
                metrics.counter("reviews_success", 1, &[]);
            }
            Err(err) => {
                tracing::error!(error = %err, "dispatch failed");
                metrics.counter("reviews_failed", 1, &[]);
            }
        }
        result
    }

    /// Drive a batch of messages through [`Self::dispatch_one`], returning
    /// the delivery ids of the messages that failed so the caller can
    /// report them to the queue for redelivery (every other message,
    /// including skips and already-handled deliveries, is implicitly
    /// acknowledged).
    pub async fn dispatch_batch(&self, events: &[CanonicalEvent], metrics: &mut dyn MetricsSink) -> Vec<String> {
        let mut failed = Vec::new();
        for event in events {
            if self.dispatch_one(event, metrics).await.is_err() {
                failed.push(event.delivery_id.clone());
            }
        }
        failed
    }

    async fn resolve_token(&self, installation_id: &str) -> Result<String, DispatchError> {
        let now = Utc::now();
        if let Some(cached) = self.installation_tokens.get(installation_id, now, chrono::Duration::seconds(60)) {
            return Ok(cached.token);
        }
        let jwt = mint_app_jwt(&self.forge_app_id, &self.forge_app_private_key_pem, now).map_err(DispatchError::Auth)?;
        let token = exchange_for_installation_token(&self.http, &self.forge_api_base, installation_id, &jwt)
            .await
            .map_err(DispatchError::Auth)?;
        self.installation_tokens.put(installation_id, token.clone());
        Ok(token.token)
    }

    async fn load_policy(&self, forge: &ForgeClient, repo: &str, default_branch: &str) -> Result<RepoPolicy, DispatchError> {
        use reviewer_forge_client::ForgeError;

        let raw = match forge.get_contents(repo, ".ai-reviewer.yml", default_branch).await {
            Ok(response) => {
                let cleaned: String = response.content.chars().filter(|c| !c.is_whitespace()).collect();
                let decoded = BASE64
                    .decode(cleaned.as_bytes())
                    .map_err(|e| DispatchError::Unexpected(anyhow::anyhow!("policy file is not valid base64: {e}")))?;
                Some(
                    String::from_utf8(decoded)
                        .map_err(|e| DispatchError::Unexpected(anyhow::anyhow!("policy file is not valid utf-8: {e}")))?,
                )
            }
            Err(ForgeError::Http { status, .. }) if status == reqwest::StatusCode::NOT_FOUND => None,
            Err(other) => return Err(other.into()),
        };

        match load_repo_policy(raw.as_deref()) {
            Ok(policy) => Ok(policy),
            Err(err) => {
                tracing::warn!(error = %err, "repo policy file failed to parse, falling back to defaults");
                Ok(RepoPolicy::default())
            }
        }
    }

    /// `Some(reason)` if `event` should be skipped before any LLM call is
    /// made; `None` otherwise. A manual or rerun trigger always overrides
    /// skip policy.
    fn evaluate_skip(&self, event: &CanonicalEvent, pr: &PullRequest, policy: &RepoPolicy) -> Option<String> {
        if event.trigger.overrides_skip_policy() {
            return None;
        }
        if pr.draft && policy.skip_draft_prs {
            return Some("draft pull request skipped by policy".to_string());
        }
        if matches_exclusion_set(&pr.head.git_ref, &self.config.skip_patterns) {
            return Some(format!("branch '{}' matches a configured skip pattern", pr.head.git_ref));
        }
        if matches_exclusion_set(&pr.user.login, &self.config.skip_patterns) {
            return Some(format!("author '{}' matches a configured skip pattern", pr.user.login));
        }
        None
    }

    async fn post_neutral_check_run(&self, forge: &ForgeClient, repo: &str, head_sha: &str, reason: &str) -> Result<(), DispatchError> {
        let request = CreateCheckRunRequest {
            name: self.config.check_run_name.clone(),
            head_sha: head_sha.to_string(),
            status: CheckRunStatus::Completed,
            conclusion: Some(CheckRunConclusion::Neutral),
            output: CheckRunOutput {
                title: "Automated review could not complete".to_string(),
                summary: reason.to_string(),
            },
        };
        if self.config.dry_run {
            tracing::info!(repo, head_sha, reason, "dry run: would have posted a neutral check run");
            return Ok(());
        }
        forge.create_check_run(repo, &request).await?;
        Ok(())
    }

    async fn run_claimed(&self, event: &CanonicalEvent, metrics: &mut dyn MetricsSink) -> Result<DispatchOutcome, DispatchError> {
        let repo = event.repo_full_name.as_str();
        let installation_id = resolve_installation_id(&self.default_installation_id, Some(event.installation_id.as_str()));
        let token = self.resolve_token(installation_id).await?;
        let forge = ForgeClient::new(self.forge_api_base.clone(), token, self.retry_config).map_err(DispatchError::Unexpected)?;

        let pr = forge.get_pull_request(repo, event.pr_number).await?;
        let files: Vec<PullRequestFile> = forge.list_pull_request_files(repo, event.pr_number).await?;

        let policy = self.load_policy(&forge, repo, &pr.base.git_ref).await?;

        if let Some(reason) = self.evaluate_skip(event, &pr, &policy) {
            tracing::info!(reason, "skipping review");
            metrics.counter("reviews_skipped", 1, &[]);
            return Ok(DispatchOutcome::Skipped { reason });
        }

        let total_additions = files.iter().map(|f| f.additions).sum();
        let total_deletions = files.iter().map(|f| f.deletions).sum();
        let total_changed_files = files.len() as u64;
        let pull_request_summary = PullRequestSummary {
            title: pr.title.clone(),
            body: truncate_body(pr.body.clone()),
            base_ref: pr.base.git_ref.clone(),
            head_ref: pr.head.git_ref.clone(),
            total_additions,
            total_deletions,
            total_changed_files,
        };
        let raw_files: Vec<RawChangedFile> = files
            .into_iter()
            .map(|f| RawChangedFile {
                filename: f.filename,
                status: file_status_from_str(&f.status),
                additions: f.additions,
                deletions: f.deletions,
                changes: f.changes,
                patch: f.patch,
            })
            .collect();
        let budgets = ContextBudgets {
            max_review_files: self.config.max_review_files,
            max_diff_bytes: self.config.max_diff_bytes,
            max_total_diff_bytes: self.config.max_total_diff_bytes,
            large_patch_policy: self.config.large_patch_policy,
        };
        let context = build_context(pull_request_summary, raw_files, &budgets, &self.config.skip_patterns).context;

        let plan = match run_planner(self.llm_runtime.as_ref(), &context).await {
            Ok(plan) => plan,
            Err(LlmStageError::Runtime(e)) => return Err(DispatchError::Llm(e)),
            Err(other) => {
                let reason = other.to_string();
                self.post_neutral_check_run(&forge, repo, &event.head_sha, &reason).await?;
                return Ok(DispatchOutcome::NeutralWithError { reason });
            }
        };

        let review = match run_reviewer(self.llm_runtime.as_ref(), &context, &plan).await {
            Ok(review) => review,
            Err(LlmStageError::Runtime(e)) => return Err(DispatchError::Llm(e)),
            Err(other) => {
                let reason = other.to_string();
                self.post_neutral_check_run(&forge, repo, &event.head_sha, &reason).await?;
                return Ok(DispatchOutcome::NeutralWithError { reason });
            }
        };

        let sanitized = sanitize_findings(review.findings.clone());
        let capped = apply_findings_cap(sanitized, &policy);
        let verdict = derive_verdict(&capped, &policy);
        let (retained_findings, inline_comments) = apply_comment_mode(capped, &context, policy.review_comment_mode);

        let mut rendered_review = Review { findings: retained_findings, ..review };
        rendered_review.findings.sort_by_key(|f| f.priority);
        let body = reviewer_markdown::render(&rendered_review);

        if self.config.dry_run {
            tracing::info!(
                repo,
                pr = event.pr_number,
                verdict = ?verdict,
                findings = rendered_review.findings.len(),
                inline_comments = inline_comments.len(),
                body,
                "dry run: would have posted this review"
            );
            return Ok(DispatchOutcome::Posted { verdict });
        }

        if policy.post_review_comment {
            let review_request = CreateReviewRequest {
                commit_id: event.head_sha.clone(),
                body: body.clone(),
                event: review_event_for(verdict),
                comments: inline_comments,
            };
            forge.create_review(repo, event.pr_number, &review_request).await?;
        }

        let check_run_request = CreateCheckRunRequest {
            name: self.config.check_run_name.clone(),
            head_sha: event.head_sha.clone(),
            status: CheckRunStatus::Completed,
            conclusion: Some(check_run_conclusion_for(verdict)),
            output: CheckRunOutput { title: "AI Code Review".to_string(), summary: body },
        };
        forge.create_check_run(repo, &check_run_request).await?;

        Ok(DispatchOutcome::Posted { verdict })
    }
}
