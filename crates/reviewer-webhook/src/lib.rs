//! The inbound webhook receiver: `POST /webhook`.
//!
//! Verifies the HMAC signature, enforces the replay window, classifies
//! the event, resolves a repo allow-list, and hands the resulting
//! [`CanonicalEvent`] to an [`Enqueuer`]. Grounded on the axum
//! route/handler conventions used for trigger endpoints in the wider
//! retrieval pack: a thin `Json`/`StatusCode`-returning handler over a
//! small `Arc`-wrapped state struct, with domain errors mapped to HTTP
//! status via [`axum::response::IntoResponse`].

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use reviewer_classifier::{ClassifierConfig, TriggerDecision, classify_issue_comment, classify_pull_request, classify_check_run, classify_pull_request_review_comment, repo_allowed};
use reviewer_signature::{verify, within_replay_window};
use reviewer_types::{CanonicalEvent, Trigger};
use serde::Serialize;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";
const EVENT_HEADER: &str = "x-github-event";
const DELIVERY_HEADER: &str = "x-github-delivery";
/// Ingress-platform-supplied receipt time, when the ingress layer attaches
/// one. Absent on a bare `POST /webhook` behind no such proxy, in which
/// case the replay-window check is skipped (spec §4.1: "the age check is
/// skipped gracefully when no timestamp is available").
const RECEIVED_AT_HEADER: &str = "x-request-received-at";

/// Enqueues a canonical event onto the work queue. Implementations talk
/// to the actual queue (SQS, etc.); this crate only depends on the seam.
#[async_trait]
pub trait Enqueuer: Send + Sync {
    async fn enqueue(&self, event: &CanonicalEvent) -> anyhow::Result<()>;
}

/// Resolves the current `head_sha` for a pull request, needed for
/// `issue_comment` manual triggers which carry no sha of their own.
#[async_trait]
pub trait HeadShaResolver: Send + Sync {
    async fn resolve_head_sha(&self, repo_full_name: &str, pr_number: u64) -> anyhow::Result<String>;
}

/// Shared receiver configuration and collaborators.
pub struct ReceiverState {
    pub webhook_secret: Vec<u8>,
    pub max_webhook_age_seconds: i64,
    pub allowed_repos: Vec<String>,
    pub classifier_config: ClassifierConfig,
    pub enqueuer: Arc<dyn Enqueuer>,
    pub fanout_enqueuer: Option<Arc<dyn Enqueuer>>,
    pub head_sha_resolver: Arc<dyn HeadShaResolver>,
}

/// Build the `POST /webhook` router over `state`.
pub fn router(state: Arc<ReceiverState>) -> Router {
    Router::new().route("/webhook", post(handle_webhook)).with_state(state)
}

#[derive(Debug, Serialize)]
struct AcceptedBody {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct IgnoredBody {
    ignored: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Failure modes the handler can surface; each maps to one response in
/// spec §4.2's behavioral matrix (400, 401, or 500).
#[derive(Debug, thiserror::Error)]
enum WebhookError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),
    #[error("request body is not valid JSON")]
    MalformedBody,
    #[error("webhook_too_old")]
    TooOld,
    #[error("invalid_signature")]
    InvalidSignature,
    #[error("failed to resolve head sha: {0}")]
    ResolutionFailed(String),
    #[error("failed to enqueue event: {0}")]
    EnqueueFailed(String),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            WebhookError::MissingHeader(_) | WebhookError::MalformedBody => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            WebhookError::TooOld => (StatusCode::BAD_REQUEST, "webhook_too_old".to_string()),
            WebhookError::InvalidSignature => (StatusCode::UNAUTHORIZED, "invalid_signature".to_string()),
            WebhookError::ResolutionFailed(_) | WebhookError::EnqueueFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

async fn handle_webhook(
    State(state): State<Arc<ReceiverState>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Response, WebhookError> {
    let signature = header_str(&headers, SIGNATURE_HEADER)?;
    let event_type = header_str(&headers, EVENT_HEADER)?;
    let delivery_id = header_str(&headers, DELIVERY_HEADER)?;

    if !verify(&body, signature, &state.webhook_secret) {
        return Err(WebhookError::InvalidSignature);
    }

    if let Some(received_at) = headers.get(RECEIVED_AT_HEADER).and_then(|v| v.to_str().ok()) {
        if let Ok(received_at) = received_at.parse::<i64>() {
            let now = now_unix();
            if !within_replay_window(now - received_at, state.max_webhook_age_seconds) {
                return Err(WebhookError::TooOld);
            }
        }
    }

    let payload: serde_json::Value = serde_json::from_slice(&body).map_err(|_| WebhookError::MalformedBody)?;

    let decision = classify(event_type, &payload, &state.classifier_config);
    let TriggerDecision::Enqueue { trigger, needs_head_sha_resolution } = decision else {
        tracing::info!(delivery_id, reason = decision.ignore_reason(), "webhook delivery ignored");
        return Ok((StatusCode::ACCEPTED, Json(IgnoredBody { ignored: decision.ignore_reason().unwrap_or("unknown").to_string() })).into_response());
    };

    let Some(repo_full_name) = payload_str(&payload, &["repository", "full_name"]) else {
        return Err(WebhookError::MissingHeader("repository.full_name"));
    };
    if !repo_allowed(repo_full_name, &state.allowed_repos) {
        tracing::info!(delivery_id, repo = repo_full_name, "webhook delivery ignored: repo not in allow-list");
        return Ok((StatusCode::ACCEPTED, Json(IgnoredBody { ignored: "repo_not_allowed".to_string() })).into_response());
    }

    let pr_number = payload_u64(&payload, &["pull_request", "number"])
        .or_else(|| payload_u64(&payload, &["issue", "number"]))
        .ok_or(WebhookError::MissingHeader("pull_request.number"))?;

    let head_sha = if needs_head_sha_resolution {
        state
            .head_sha_resolver
            .resolve_head_sha(repo_full_name, pr_number)
            .await
            .map_err(|e| WebhookError::ResolutionFailed(e.to_string()))?
    } else {
        payload_str(&payload, &["pull_request", "head", "sha"])
            .ok_or(WebhookError::MissingHeader("pull_request.head.sha"))?
            .to_string()
    };

    let installation_id = payload_u64(&payload, &["installation", "id"])
        .map(|id| id.to_string())
        .unwrap_or_default();
    let base_ref = payload_str(&payload, &["pull_request", "base", "ref"]).map(str::to_string);
    let event_action = payload_str(&payload, &["action"]).unwrap_or("").to_string();

    let event = CanonicalEvent {
        delivery_id: delivery_id.to_string(),
        repo_full_name: repo_full_name.to_string(),
        pr_number,
        head_sha,
        installation_id,
        event_action,
        trigger,
        base_ref,
    };

    state
        .enqueuer
        .enqueue(&event)
        .await
        .map_err(|e| WebhookError::EnqueueFailed(e.to_string()))?;
    if trigger == Trigger::Auto {
        if let Some(fanout) = &state.fanout_enqueuer {
            fanout.enqueue(&event).await.map_err(|e| WebhookError::EnqueueFailed(e.to_string()))?;
        }
    }

    Ok((StatusCode::ACCEPTED, Json(AcceptedBody { status: "accepted" })).into_response())
}

fn classify(event_type: &str, payload: &serde_json::Value, config: &ClassifierConfig) -> TriggerDecision {
    match event_type {
        "pull_request" => {
            let action = payload_str(payload, &["action"]).unwrap_or("");
            let label = payload_str(payload, &["label", "name"]);
            classify_pull_request(action, label, config)
        }
        "issue_comment" => {
            let action = payload_str(payload, &["action"]).unwrap_or("");
            let is_pull_request = payload["issue"].get("pull_request").is_some();
            let body = payload_str(payload, &["comment", "body"]).unwrap_or("");
            classify_issue_comment(action, is_pull_request, body, config)
        }
        "check_run" => {
            let action = payload_str(payload, &["action"]).unwrap_or("");
            let name = payload_str(payload, &["check_run", "name"]).unwrap_or("");
            classify_check_run(action, name, config)
        }
        "pull_request_review_comment" => classify_pull_request_review_comment(),
        other => TriggerDecision::Ignore { reason: format!("event '{other}' is not actionable") },
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, WebhookError> {
    headers.get(name).and_then(|v| v.to_str().ok()).ok_or(WebhookError::MissingHeader(name))
}

fn payload_str<'a>(payload: &'a serde_json::Value, path: &[&str]) -> Option<&'a str> {
    let mut current = payload;
    for segment in path {
        current = current.get(segment)?;
    }
    current.as_str()
}

fn payload_u64(payload: &serde_json::Value, path: &[&str]) -> Option<u64> {
    let mut current = payload;
    for segment in path {
        current = current.get(segment)?;
    }
    current.as_u64()
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct RecordingEnqueuer {
        events: Mutex<Vec<CanonicalEvent>>,
    }

    #[async_trait]
    impl Enqueuer for RecordingEnqueuer {
        async fn enqueue(&self, event: &CanonicalEvent) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct FixedShaResolver;

    #[async_trait]
    impl HeadShaResolver for FixedShaResolver {
        async fn resolve_head_sha(&self, _repo_full_name: &str, _pr_number: u64) -> anyhow::Result<String> {
            Ok("b".repeat(40))
        }
    }

    fn test_state(enqueuer: Arc<RecordingEnqueuer>) -> Arc<ReceiverState> {
        Arc::new(ReceiverState {
            webhook_secret: b"topsecret".to_vec(),
            max_webhook_age_seconds: 300,
            allowed_repos: vec![],
            classifier_config: ClassifierConfig::default(),
            enqueuer,
            fanout_enqueuer: None,
            head_sha_resolver: Arc::new(FixedShaResolver),
        })
    }

    fn signed_request(body: &[u8], event: &str, secret: &[u8]) -> Request<Body> {
        let signature = reviewer_signature::sign(secret, body);
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header(SIGNATURE_HEADER, signature)
            .header(EVENT_HEADER, event)
            .header(DELIVERY_HEADER, "delivery-1")
            .header("content-type", "application/json")
            .body(Body::from(body.to_vec()))
            .unwrap()
    }

    fn pull_request_opened_payload() -> serde_json::Value {
        serde_json::json!({
            "action": "opened",
            "repository": {"full_name": "acme/widgets"},
            "pull_request": {
                "number": 42,
                "head": {"sha": "a".repeat(40)},
                "base": {"ref": "main"},
            },
            "installation": {"id": 99},
        })
    }

    #[tokio::test]
    async fn pull_request_opened_is_accepted_and_enqueued() {
        let enqueuer = Arc::new(RecordingEnqueuer { events: Mutex::new(vec![]) });
        let state = test_state(enqueuer.clone());
        let app = router(state);

        let body = serde_json::to_vec(&pull_request_opened_payload()).unwrap();
        let request = signed_request(&body, "pull_request", b"topsecret");
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(enqueuer.events.lock().unwrap().len(), 1);
        assert_eq!(enqueuer.events.lock().unwrap()[0].trigger, Trigger::Auto);
    }

    #[tokio::test]
    async fn invalid_signature_is_rejected() {
        let enqueuer = Arc::new(RecordingEnqueuer { events: Mutex::new(vec![]) });
        let state = test_state(enqueuer);
        let app = router(state);

        let body = serde_json::to_vec(&pull_request_opened_payload()).unwrap();
        let request = signed_request(&body, "pull_request", b"wrong-secret");
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_actionable_pull_request_action_is_ignored_with_202() {
        let enqueuer = Arc::new(RecordingEnqueuer { events: Mutex::new(vec![]) });
        let state = test_state(enqueuer.clone());
        let app = router(state);

        let mut payload = pull_request_opened_payload();
        payload["action"] = serde_json::json!("closed");
        let body = serde_json::to_vec(&payload).unwrap();
        let request = signed_request(&body, "pull_request", b"topsecret");
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(enqueuer.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn repo_outside_allow_list_is_ignored() {
        let enqueuer = Arc::new(RecordingEnqueuer { events: Mutex::new(vec![]) });
        let mut state = test_state(enqueuer.clone());
        Arc::get_mut(&mut state).unwrap().allowed_repos = vec!["acme/other".to_string()];
        let app = router(state);

        let body = serde_json::to_vec(&pull_request_opened_payload()).unwrap();
        let request = signed_request(&body, "pull_request", b"topsecret");
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(enqueuer.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn issue_comment_trigger_resolves_head_sha() {
        let enqueuer = Arc::new(RecordingEnqueuer { events: Mutex::new(vec![]) });
        let state = test_state(enqueuer.clone());
        let app = router(state);

        let payload = serde_json::json!({
            "action": "created",
            "repository": {"full_name": "acme/widgets"},
            "issue": {"number": 7, "pull_request": {}},
            "comment": {"body": "/review please"},
            "installation": {"id": 1},
        });
        let body = serde_json::to_vec(&payload).unwrap();
        let request = signed_request(&body, "issue_comment", b"topsecret");
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let events = enqueuer.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].head_sha, "b".repeat(40));
        assert_eq!(events[0].trigger, Trigger::Manual);
    }

    #[tokio::test]
    async fn missing_signature_header_is_400() {
        let enqueuer = Arc::new(RecordingEnqueuer { events: Mutex::new(vec![]) });
        let state = test_state(enqueuer);
        let app = router(state);

        let body = serde_json::to_vec(&pull_request_opened_payload()).unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header(EVENT_HEADER, "pull_request")
            .header(DELIVERY_HEADER, "delivery-1")
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
