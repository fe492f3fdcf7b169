//! Binary entrypoint for the AI code-review platform.
//!
//! Three subcommands share one worker stack: `serve` runs the `POST
//! /webhook` receiver, `work` drains the local queue file through the
//! dispatcher, and `dispatch` runs a single message read from stdin (the
//! shape a serverless invocation already holding one dequeued message
//! would use). There is no managed-queue integration here — the
//! `--queue-file` NDJSON file stands in for it, the way a local `shipper`
//! run stands in for a CI-triggered one.

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};

use reviewer_classifier::ClassifierConfig;
use reviewer_config::Config;
use reviewer_core::{DispatchOutcome, Dispatcher};
use reviewer_forge_auth::{exchange_for_installation_token, mint_app_jwt};
use reviewer_forge_client::ForgeClient;
use reviewer_idempotency::InMemoryIdempotencyStore;
use reviewer_llm::HttpLlmRuntime;
use reviewer_metrics::TracingMetricsSink;
use reviewer_secrets::{EnvSecretStore, SecretCache, parse_forge_app_identity};
use reviewer_types::CanonicalEvent;
use reviewer_webhook::{Enqueuer, HeadShaResolver, ReceiverState, router};

#[derive(Parser, Debug)]
#[command(name = "reviewer", version)]
#[command(about = "AI-assisted pull request review: webhook receiver and worker dispatcher")]
struct Cli {
    /// Local file standing in for the work queue: `serve` appends
    /// canonical events here, `work` drains and requeues failures into it.
    #[arg(long, default_value = ".reviewer-queue.ndjson", global = true)]
    queue_file: PathBuf,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the `POST /webhook` receiver.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind_addr: SocketAddr,
    },
    /// Dispatch every message currently queued, requeuing the ones that fail.
    Work,
    /// Dispatch a single canonical event read as JSON from stdin.
    Dispatch,
}

#[tokio::main]
async fn main() -> Result<()> {
    reviewer_logging::init();
    let cli = Cli::parse();
    match cli.cmd {
        Commands::Serve { bind_addr } => serve(bind_addr, &cli.queue_file).await,
        Commands::Work => work(&cli.queue_file).await,
        Commands::Dispatch => dispatch_stdin().await,
    }
}

/// Appends every enqueued event as one JSON line to the queue file.
struct FileEnqueuer {
    path: PathBuf,
}

#[async_trait]
impl Enqueuer for FileEnqueuer {
    async fn enqueue(&self, event: &CanonicalEvent) -> Result<()> {
        let mut line = serde_json::to_string(event).context("failed to serialize canonical event")?;
        line.push('\n');
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open queue file {}", path.display()))?;
            file.write_all(line.as_bytes()).context("failed to append to queue file")
        })
        .await
        .context("enqueue task panicked")??;
        Ok(())
    }
}

/// Resolves `issue_comment`-trigger head shas via the forge API, using the
/// same app-jwt/installation-token exchange the dispatcher performs.
struct ForgeHeadShaResolver {
    api_base: String,
    app_id: String,
    private_key_pem: String,
    installation_id: String,
}

#[async_trait]
impl HeadShaResolver for ForgeHeadShaResolver {
    async fn resolve_head_sha(&self, repo_full_name: &str, pr_number: u64) -> Result<String> {
        let http = reqwest::Client::new();
        let jwt = mint_app_jwt(&self.app_id, &self.private_key_pem, chrono::Utc::now())?;
        let token = exchange_for_installation_token(&http, &self.api_base, &self.installation_id, &jwt).await?;
        let forge = ForgeClient::new(self.api_base.clone(), token.token, reviewer_retry::RetryConfig::default())?;
        let pr = forge.get_pull_request(repo_full_name, pr_number).await?;
        Ok(pr.head.sha)
    }
}

/// Secrets every subcommand that talks to the forge needs: the app's
/// identity, its private key, and which API base to call.
struct ForgeSecrets {
    app_id: String,
    installation_id: String,
    private_key_pem: String,
    api_base: String,
}

fn load_forge_secrets(secrets: &SecretCache<EnvSecretStore>) -> Result<ForgeSecrets> {
    let identity = parse_forge_app_identity(&secrets.get("FORGE_APP_IDENTITY")?)
        .context("FORGE_APP_IDENTITY secret is malformed")?;
    let private_key_pem = secrets.get("FORGE_APP_PRIVATE_KEY")?;
    let api_base = secrets.get("FORGE_API_BASE").unwrap_or_else(|_| "https://api.github.com".to_string());
    Ok(ForgeSecrets { app_id: identity.app_id, installation_id: identity.installation_id, private_key_pem, api_base })
}

async fn serve(bind_addr: SocketAddr, queue_file: &Path) -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    let secrets = SecretCache::new(EnvSecretStore);
    let forge = load_forge_secrets(&secrets)?;
    let webhook_secret = secrets.get("WEBHOOK_SECRET")?;

    let state = Arc::new(ReceiverState {
        webhook_secret: webhook_secret.into_bytes(),
        max_webhook_age_seconds: config.max_webhook_age_seconds,
        allowed_repos: config.github_allowed_repos.clone(),
        classifier_config: ClassifierConfig {
            trigger_phrase: config.review_trigger_phrase.clone(),
            bot_username: config.bot_username.clone(),
            trigger_labels: config.review_trigger_labels.clone(),
            check_run_name: config.check_run_name.clone(),
        },
        enqueuer: Arc::new(FileEnqueuer { path: queue_file.to_path_buf() }),
        fanout_enqueuer: None,
        head_sha_resolver: Arc::new(ForgeHeadShaResolver {
            api_base: forge.api_base,
            app_id: forge.app_id,
            private_key_pem: forge.private_key_pem,
            installation_id: forge.installation_id,
        }),
    });

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(%bind_addr, "webhook receiver listening");
    axum::serve(listener, app).await.context("webhook receiver server failed")
}

/// Build a [`Dispatcher`] from environment configuration and secrets.
/// Shared by `work` and `dispatch`.
fn build_dispatcher(config: Config) -> Result<Dispatcher<InMemoryIdempotencyStore>> {
    let secrets = SecretCache::new(EnvSecretStore);
    let forge = load_forge_secrets(&secrets)?;
    let llm_endpoint = secrets.get("LLM_ENDPOINT")?;
    let llm_api_key = secrets.get("LLM_API_KEY")?;
    let llm_runtime = Arc::new(HttpLlmRuntime::new(llm_endpoint, llm_api_key)?);

    Dispatcher::new(
        config,
        forge.api_base,
        forge.app_id,
        forge.private_key_pem,
        forge.installation_id,
        InMemoryIdempotencyStore::new(),
        llm_runtime,
    )
}

async fn work(queue_file: &Path) -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    let dispatcher = build_dispatcher(config)?;

    let raw = match fs::read_to_string(queue_file) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            println!("queue file {} does not exist yet; nothing to do", queue_file.display());
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", queue_file.display())),
    };

    let events: Vec<CanonicalEvent> = raw
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).with_context(|| format!("malformed queue line: {line}")))
        .collect::<Result<_>>()?;

    if events.is_empty() {
        println!("queue is empty");
        return Ok(());
    }

    let mut metrics = TracingMetricsSink;
    let failed_ids = dispatcher.dispatch_batch(&events, &mut metrics).await;
    let failed: Vec<&CanonicalEvent> = events.iter().filter(|e| failed_ids.contains(&e.delivery_id)).collect();

    println!("dispatched {} message(s), {} failed and were requeued", events.len(), failed.len());

    let mut remaining = String::new();
    for event in &failed {
        remaining.push_str(&serde_json::to_string(event)?);
        remaining.push('\n');
    }
    fs::write(queue_file, remaining).with_context(|| format!("failed to rewrite {}", queue_file.display()))?;

    Ok(())
}

async fn dispatch_stdin() -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    let dispatcher = build_dispatcher(config)?;

    let mut raw = String::new();
    io::stdin().read_to_string(&mut raw).context("failed to read event JSON from stdin")?;
    let event: CanonicalEvent = serde_json::from_str(&raw).context("stdin was not a valid canonical event")?;

    let mut metrics = TracingMetricsSink;
    let outcome = dispatcher.dispatch_one(&event, &mut metrics).await?;
    println!("{}", serde_json::to_string_pretty(&DisplayOutcome::from(&outcome))?);
    Ok(())
}

/// A JSON-serializable view of [`DispatchOutcome`], which carries no
/// `Serialize` impl of its own since it is an in-process return value,
/// not a wire type.
#[derive(Debug, serde::Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum DisplayOutcome {
    Posted { verdict: String },
    AlreadyHandled,
    Skipped { reason: String },
    NeutralWithError { reason: String },
}

impl From<&DispatchOutcome> for DisplayOutcome {
    fn from(outcome: &DispatchOutcome) -> Self {
        match outcome {
            DispatchOutcome::Posted { verdict } => DisplayOutcome::Posted { verdict: format!("{verdict:?}") },
            DispatchOutcome::AlreadyHandled => DisplayOutcome::AlreadyHandled,
            DispatchOutcome::Skipped { reason } => DisplayOutcome::Skipped { reason: reason.clone() },
            DispatchOutcome::NeutralWithError { reason } => DisplayOutcome::NeutralWithError { reason: reason.clone() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn file_enqueuer_appends_one_json_line_per_event() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.ndjson");
        let enqueuer = FileEnqueuer { path: path.clone() };

        let event = CanonicalEvent {
            delivery_id: "d1".to_string(),
            repo_full_name: "acme/widgets".to_string(),
            pr_number: 1,
            head_sha: "a".repeat(40),
            installation_id: "inst".to_string(),
            event_action: "opened".to_string(),
            trigger: reviewer_types::Trigger::Auto,
            base_ref: None,
        };
        enqueuer.enqueue(&event).await.unwrap();
        enqueuer.enqueue(&event).await.unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        let parsed: CanonicalEvent = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(parsed.delivery_id, "d1");
    }

    #[test]
    fn display_outcome_serializes_skip_with_reason() {
        let outcome = DispatchOutcome::Skipped { reason: "draft pull request skipped by policy".to_string() };
        let json = serde_json::to_value(DisplayOutcome::from(&outcome)).unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["reason"], "draft pull request skipped by policy");
    }
}
