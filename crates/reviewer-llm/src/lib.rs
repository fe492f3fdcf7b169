//! Two sequential LLM calls with distinct system prompts and strict JSON
//! schemas: a stage-1 planner that triages the changed files, and a
//! stage-2 reviewer that produces the findings.
//!
//! The [`LlmRuntime`] trait is the seam between this crate and the actual
//! inference API; [`HttpLlmRuntime`] is the only implementation shipped
//! here, but tests substitute a stub to exercise the extraction/validation
//! logic without a network call.

use anyhow::Context as _;
use async_trait::async_trait;
use reviewer_types::{PRContext, Review, SchemaError, TriagePlan, extract_json_object};
use serde::{Deserialize, Serialize};

/// System prompt enforcing JSON-only planner output.
pub const PLANNER_SYSTEM_PROMPT: &str = "You are a pull-request triage planner. Respond with a single JSON object matching the TriagePlan schema and nothing else. Every `reason` field must cite a function name, line range, or token pattern from the provided diff.";

/// System prompt enforcing JSON-only reviewer output.
pub const REVIEWER_SYSTEM_PROMPT: &str = "You are a meticulous code reviewer. Respond with a single JSON object matching the Review schema and nothing else.";

const PLANNER_MAX_TOKENS: u32 = 1024;
const REVIEWER_MAX_TOKENS: u32 = 4096;
const TEMPERATURE: f32 = 0.15;

/// Request body for the LLM runtime contract.
#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    pub system: String,
    pub messages: Vec<LlmMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: Vec<LlmContentBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmContentBlock {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
struct LlmOutputMessage {
    content: Vec<LlmContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
struct LlmResponse {
    message: LlmOutputMessage,
}

/// The seam between this crate and the remote inference API.
#[async_trait]
pub trait LlmRuntime: Send + Sync {
    async fn invoke(&self, request: LlmRequest) -> anyhow::Result<String>;
}

/// Calls the LLM runtime contract over HTTP and extracts the first text
/// block of the output message.
pub struct HttpLlmRuntime {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpLlmRuntime {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("failed to build LLM HTTP client")?;
        Ok(Self { http, endpoint: endpoint.into(), api_key: api_key.into() })
    }
}

#[async_trait]
impl LlmRuntime for HttpLlmRuntime {
    async fn invoke(&self, request: LlmRequest) -> anyhow::Result<String> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("LLM runtime request failed")?;
        if !response.status().is_success() {
            anyhow::bail!("LLM runtime returned {}", response.status());
        }
        let parsed: LlmResponse = response.json().await.context("LLM runtime response was not valid JSON")?;
        parsed
            .message
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .context("LLM runtime response had no text block")
    }
}

/// Error at either planner or reviewer stage. `SchemaInvalid` is the
/// never-retried validation path (§4.6): the caller renders a neutral
/// check-run rather than propagating.
#[derive(Debug, thiserror::Error)]
pub enum LlmStageError {
    #[error("LLM runtime call failed: {0}")]
    Runtime(#[from] anyhow::Error),
    #[error("LLM output did not match the expected schema: {0}")]
    SchemaInvalid(#[from] SchemaError),
    #[error("planner referenced unknown filenames: {0:?}")]
    PlanReferencedUnknownFiles(Vec<String>),
}

fn user_message(text: String) -> LlmMessage {
    LlmMessage { role: "user".to_string(), content: vec![LlmContentBlock { text }] }
}

/// Run the stage-1 planner call against `context`.
pub async fn run_planner(runtime: &dyn LlmRuntime, context: &PRContext) -> Result<TriagePlan, LlmStageError> {
    let prompt = serde_json::to_string(context).context("failed to serialize PRContext for planner")?;
    let request = LlmRequest {
        system: PLANNER_SYSTEM_PROMPT.to_string(),
        messages: vec![user_message(prompt)],
        max_tokens: PLANNER_MAX_TOKENS,
        temperature: TEMPERATURE,
    };
    let raw = runtime.invoke(request).await?;
    let plan: TriagePlan = extract_json_object(&raw)?;

    let known_files: Vec<String> = context.changed_files.iter().map(|f| f.filename.clone()).collect();
    let unknown = plan.unknown_filenames(&known_files);
    if !unknown.is_empty() {
        return Err(LlmStageError::PlanReferencedUnknownFiles(
            unknown.into_iter().map(|s| s.to_string()).collect(),
        ));
    }
    Ok(plan)
}

/// Run the stage-2 reviewer call against `context` and the plan produced
/// by [`run_planner`].
pub async fn run_reviewer(
    runtime: &dyn LlmRuntime,
    context: &PRContext,
    plan: &TriagePlan,
) -> Result<Review, LlmStageError> {
    let payload = serde_json::json!({ "context": context, "plan": plan });
    let prompt = serde_json::to_string(&payload).context("failed to serialize reviewer prompt")?;
    let request = LlmRequest {
        system: REVIEWER_SYSTEM_PROMPT.to_string(),
        messages: vec![user_message(prompt)],
        max_tokens: REVIEWER_MAX_TOKENS,
        temperature: TEMPERATURE,
    };
    let raw = runtime.invoke(request).await?;
    let review: Review = extract_json_object(&raw)?;

    let invalid = review.findings_with_invalid_line_ranges();
    if !invalid.is_empty() {
        let locations: Vec<String> = invalid.iter().map(|f| format!("{}:{:?}-{:?}", f.file, f.start_line, f.end_line)).collect();
        return Err(SchemaError::Violation(format!(
            "{} finding(s) have end_line set without start_line: {}",
            invalid.len(),
            locations.join(", ")
        ))
        .into());
    }

    Ok(review)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reviewer_types::{ChangedFileEntry, FileStatus, PullRequestSummary};
    use std::sync::Mutex;

    struct StubRuntime {
        responses: Mutex<Vec<String>>,
    }

    impl StubRuntime {
        fn returning(responses: Vec<&str>) -> Self {
            Self { responses: Mutex::new(responses.into_iter().rev().map(|s| s.to_string()).collect()) }
        }
    }

    #[async_trait]
    impl LlmRuntime for StubRuntime {
        async fn invoke(&self, _request: LlmRequest) -> anyhow::Result<String> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| anyhow::anyhow!("stub runtime exhausted"))
        }
    }

    fn sample_context() -> PRContext {
        PRContext {
            pull_request: PullRequestSummary {
                title: "Add feature".to_string(),
                body: String::new(),
                base_ref: "main".to_string(),
                head_ref: "feature".to_string(),
                total_additions: 1,
                total_deletions: 0,
                total_changed_files: 1,
            },
            changed_files: vec![ChangedFileEntry {
                filename: "src/lib.rs".to_string(),
                status: FileStatus::Modified,
                additions: 1,
                deletions: 0,
                changes: 1,
                patch: Some("@@ -1 +1,2 @@\n+line\n".to_string()),
                patch_truncated: false,
            }],
            skipped_files: vec![],
            linked_jira_issues: vec![],
            truncation_note: None,
        }
    }

    #[tokio::test]
    async fn planner_parses_valid_plan_wrapped_in_prose() {
        let raw = r#"Here is my plan:
        {"risk_ranking": ["src/lib.rs"], "hotspots": [], "file_clusters": [], "skip_files": [], "overall_risk_estimate": "low"}
        Let me know if you need more."#;
        let runtime = StubRuntime::returning(vec![raw]);
        let plan = run_planner(&runtime, &sample_context()).await.unwrap();
        assert_eq!(plan.risk_ranking, vec!["src/lib.rs".to_string()]);
    }

    #[tokio::test]
    async fn planner_rejects_plan_referencing_unknown_file() {
        let raw = r#"{"risk_ranking": ["nonexistent.rs"], "hotspots": [], "file_clusters": [], "skip_files": [], "overall_risk_estimate": "low"}"#;
        let runtime = StubRuntime::returning(vec![raw]);
        let result = run_planner(&runtime, &sample_context()).await;
        assert!(matches!(result, Err(LlmStageError::PlanReferencedUnknownFiles(_))));
    }

    #[tokio::test]
    async fn planner_surfaces_malformed_json_as_schema_invalid() {
        let runtime = StubRuntime::returning(vec!["no json here at all"]);
        let result = run_planner(&runtime, &sample_context()).await;
        assert!(matches!(result, Err(LlmStageError::SchemaInvalid(_))));
    }

    #[tokio::test]
    async fn reviewer_parses_valid_review() {
        let raw = r#"{
            "summary": "Looks fine",
            "overall_risk": "low",
            "findings": [],
            "suggested_tests": [],
            "risk_hotspots": [],
            "files_reviewed": ["src/lib.rs"],
            "files_skipped": [],
            "truncation_note": null,
            "not_reviewed": null,
            "ticket_compliance": null
        }"#;
        let runtime = StubRuntime::returning(vec![raw]);
        let plan = TriagePlan {
            risk_ranking: vec!["src/lib.rs".to_string()],
            hotspots: vec![],
            file_clusters: vec![],
            skip_files: vec![],
            overall_risk_estimate: reviewer_types::RiskEstimate::Low,
        };
        let review = run_reviewer(&runtime, &sample_context(), &plan).await.unwrap();
        assert_eq!(review.summary, "Looks fine");
    }

    #[tokio::test]
    async fn reviewer_rejects_finding_with_end_line_but_no_start_line() {
        let raw = r#"{
            "summary": "Looks fine",
            "overall_risk": "low",
            "findings": [{
                "priority": 1,
                "type": "bug",
                "file": "src/lib.rs",
                "start_line": null,
                "end_line": 5,
                "message": "m",
                "evidence": "e",
                "suggested_patch": null
            }],
            "suggested_tests": [],
            "risk_hotspots": [],
            "files_reviewed": ["src/lib.rs"],
            "files_skipped": [],
            "truncation_note": null,
            "not_reviewed": null,
            "ticket_compliance": null
        }"#;
        let runtime = StubRuntime::returning(vec![raw]);
        let plan = TriagePlan {
            risk_ranking: vec!["src/lib.rs".to_string()],
            hotspots: vec![],
            file_clusters: vec![],
            skip_files: vec![],
            overall_risk_estimate: reviewer_types::RiskEstimate::Low,
        };
        let result = run_reviewer(&runtime, &sample_context(), &plan).await;
        assert!(matches!(result, Err(LlmStageError::SchemaInvalid(SchemaError::Violation(_)))));
    }
}
