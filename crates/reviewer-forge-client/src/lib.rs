//! Typed wrapper over the forge's pull-request REST surface.
//!
//! Every call goes through [`reviewer_retry::retry_async`] with the
//! client's configured [`reviewer_retry::RetryConfig`], classifying
//! HTTP 403/429/5xx as retryable and everything else as terminal.
//!
//! # Example
//!
//! ```no_run
//! use reviewer_forge_client::ForgeClient;
//! use reviewer_retry::RetryConfig;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = ForgeClient::new(
//!     "https://api.github.com",
//!     "installation-token",
//!     RetryConfig::default(),
//! )?;
//! let pr = client.get_pull_request("acme/widgets", 42).await?;
//! println!("{}", pr.title);
//! # Ok(())
//! # }
//! ```

pub mod types;

use anyhow::{Context as _, Result};
use reqwest::{Method, StatusCode};
use reviewer_retry::{RetryConfig, is_retryable_http_status, retry_async};
use serde::Serialize;
use serde::de::DeserializeOwned;

use types::*;

const API_VERSION: &str = "2022-11-28";

/// Error raised by a forge API call that exhausted retries or failed with
/// a terminal status.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("forge API returned {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error("forge API request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("forge API response was not valid JSON: {0}")]
    Decode(String),
}

impl ForgeError {
    /// Classification used by the retry envelope: HTTP 403/429/5xx and
    /// network-level failures (timeouts, resets) are retryable; a decoded
    /// body that fails schema validation is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ForgeError::Http { status, .. } => is_retryable_http_status(status.as_u16()),
            ForgeError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ForgeError::Decode(_) => false,
        }
    }
}

/// A thin, typed wrapper over the forge's REST API for a single
/// installation token.
pub struct ForgeClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    retry_config: RetryConfig,
}

impl ForgeClient {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>, retry_config: RetryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .context("failed to build forge HTTP client")?;
        Ok(Self {
            http,
            api_base: api_base.into(),
            token: token.into(),
            retry_config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn request<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ForgeError> {
        retry_async(
            path,
            &self.retry_config,
            ForgeError::is_retryable,
            |_attempt| async {
                let mut req = self
                    .http
                    .request(method.clone(), self.url(path))
                    .header("Authorization", format!("token {}", self.token))
                    .header("Accept", "application/vnd.github+json")
                    .header("X-GitHub-Api-Version", API_VERSION);
                if let Some(b) = body {
                    req = req.json(b);
                }
                let response = req.send().await?;
                let status = response.status();
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(ForgeError::Http { status, body: text });
                }
                response
                    .json::<T>()
                    .await
                    .map_err(|e| ForgeError::Decode(e.to_string()))
            },
        )
        .await
    }

    async fn request_no_body<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T, ForgeError> {
        self.request::<(), T>(method, path, None).await
    }

    pub async fn get_pull_request(&self, repo: &str, pr_number: u64) -> Result<PullRequest, ForgeError> {
        self.request_no_body(Method::GET, &format!("/repos/{repo}/pulls/{pr_number}"))
            .await
    }

    /// Fetch every page of changed files for a pull request (100/page).
    pub async fn list_pull_request_files(&self, repo: &str, pr_number: u64) -> Result<Vec<PullRequestFile>, ForgeError> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let batch: Vec<PullRequestFile> = self
                .request_no_body(
                    Method::GET,
                    &format!("/repos/{repo}/pulls/{pr_number}/files?per_page=100&page={page}"),
                )
                .await?;
            let returned = batch.len();
            all.extend(batch);
            if returned < 100 {
                break;
            }
            page += 1;
        }
        Ok(all)
    }

    pub async fn list_pull_request_commits(&self, repo: &str, pr_number: u64) -> Result<Vec<Commit>, ForgeError> {
        self.request_no_body(Method::GET, &format!("/repos/{repo}/pulls/{pr_number}/commits"))
            .await
    }

    pub async fn create_review(
        &self,
        repo: &str,
        pr_number: u64,
        review: &CreateReviewRequest,
    ) -> Result<ReviewResponse, ForgeError> {
        self.request(
            Method::POST,
            &format!("/repos/{repo}/pulls/{pr_number}/reviews"),
            Some(review),
        )
        .await
    }

    pub async fn update_pull_request_body(
        &self,
        repo: &str,
        pr_number: u64,
        body: &UpdatePullRequestBody,
    ) -> Result<PullRequest, ForgeError> {
        self.request(Method::PATCH, &format!("/repos/{repo}/pulls/{pr_number}"), Some(body))
            .await
    }

    pub async fn create_check_run(
        &self,
        repo: &str,
        check_run: &CreateCheckRunRequest,
    ) -> Result<CheckRunResponse, ForgeError> {
        self.request(Method::POST, &format!("/repos/{repo}/check-runs"), Some(check_run))
            .await
    }

    pub async fn update_check_run(
        &self,
        repo: &str,
        check_run_id: u64,
        check_run: &CreateCheckRunRequest,
    ) -> Result<CheckRunResponse, ForgeError> {
        self.request(
            Method::PATCH,
            &format!("/repos/{repo}/check-runs/{check_run_id}"),
            Some(check_run),
        )
        .await
    }

    pub async fn list_tags(&self, repo: &str) -> Result<Vec<Tag>, ForgeError> {
        self.request_no_body(Method::GET, &format!("/repos/{repo}/tags")).await
    }

    pub async fn compare_commits(&self, repo: &str, base: &str, head: &str) -> Result<CompareResult, ForgeError> {
        self.request_no_body(Method::GET, &format!("/repos/{repo}/compare/{base}...{head}"))
            .await
    }

    pub async fn list_closed_pulls(&self, repo: &str) -> Result<Vec<PullRequest>, ForgeError> {
        self.request_no_body(Method::GET, &format!("/repos/{repo}/pulls?state=closed&per_page=100"))
            .await
    }

    pub async fn get_release(&self, repo: &str, release_id: u64) -> Result<Release, ForgeError> {
        self.request_no_body(Method::GET, &format!("/repos/{repo}/releases/{release_id}"))
            .await
    }

    pub async fn create_release(&self, repo: &str, release: &CreateReleaseRequest) -> Result<Release, ForgeError> {
        self.request(Method::POST, &format!("/repos/{repo}/releases"), Some(release))
            .await
    }

    pub async fn update_release(
        &self,
        repo: &str,
        release_id: u64,
        release: &CreateReleaseRequest,
    ) -> Result<Release, ForgeError> {
        self.request(
            Method::PATCH,
            &format!("/repos/{repo}/releases/{release_id}"),
            Some(release),
        )
        .await
    }

    pub async fn get_ref(&self, repo: &str, git_ref: &str) -> Result<GitRef, ForgeError> {
        self.request_no_body(Method::GET, &format!("/repos/{repo}/git/ref/{git_ref}"))
            .await
    }

    pub async fn create_ref(&self, repo: &str, new_ref: &CreateRefRequest) -> Result<GitRef, ForgeError> {
        self.request(Method::POST, &format!("/repos/{repo}/git/refs"), Some(new_ref))
            .await
    }

    pub async fn get_contents(&self, repo: &str, path: &str, git_ref: &str) -> Result<ContentsResponse, ForgeError> {
        self.request_no_body(Method::GET, &format!("/repos/{repo}/contents/{path}?ref={git_ref}"))
            .await
    }

    pub async fn put_contents(
        &self,
        repo: &str,
        path: &str,
        put: &PutContentsRequest,
    ) -> Result<ContentsResponse, ForgeError> {
        self.request(Method::PUT, &format!("/repos/{repo}/contents/{path}"), Some(put))
            .await
    }
}
