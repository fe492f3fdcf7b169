//! Forge-app authentication: short-lived JWT assertions, installation-token
//! exchange, and a process-local cache over issued tokens.
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use reviewer_forge_auth::mint_app_jwt;
//!
//! let jwt = mint_app_jwt("123456", include_str!("../testdata/test_key.pem"), Utc::now());
//! assert!(jwt.is_ok());
//! ```

use std::cell::RefCell;
use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};

/// JWT claims for a forge-app assertion: issuer is the app id, validity
/// window is `[now-60s, now+540s]` per the forge's clock-skew tolerance.
#[derive(Debug, Serialize)]
struct AppAssertionClaims {
    iss: String,
    iat: i64,
    exp: i64,
}

/// Mint a short-lived RS256 JWT identifying `app_id`, signed with
/// `private_key_pem` (PKCS#1 or PKCS#8 PEM).
pub fn mint_app_jwt(app_id: &str, private_key_pem: &str, now: DateTime<Utc>) -> Result<String> {
    let claims = AppAssertionClaims {
        iss: app_id.to_string(),
        iat: (now - chrono::Duration::seconds(60)).timestamp(),
        exp: (now + chrono::Duration::seconds(540)).timestamp(),
    };
    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
        .context("forge app private key is not a valid RSA PEM")?;
    let header = Header::new(Algorithm::RS256);
    encode(&header, &claims, &key).context("failed to sign forge app assertion")
}

/// An installation access token and the time it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstallationToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Exchange a signed app JWT for an installation access token via
/// `POST {api_base}/app/installations/{installation_id}/access_tokens`.
pub async fn exchange_for_installation_token(
    client: &reqwest::Client,
    api_base: &str,
    installation_id: &str,
    app_jwt: &str,
) -> Result<InstallationToken> {
    let url = format!("{api_base}/app/installations/{installation_id}/access_tokens");
    let response = client
        .post(&url)
        .bearer_auth(app_jwt)
        .header("Accept", "application/vnd.github+json")
        .header("X-GitHub-Api-Version", "2022-11-28")
        .send()
        .await
        .context("installation token exchange request failed")?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "installation token exchange returned {}",
            response.status()
        ));
    }
    response
        .json::<InstallationToken>()
        .await
        .context("installation token response was not valid JSON")
}

/// Resolve which installation id to use: a webhook-supplied id always
/// overrides the configured default.
pub fn resolve_installation_id<'a>(configured_default: &'a str, webhook_supplied: Option<&'a str>) -> &'a str {
    webhook_supplied.unwrap_or(configured_default)
}

/// Process-local cache of installation tokens, keyed by installation id.
/// Not required for correctness (every invocation is short-lived) but
/// avoids a redundant exchange call when one invocation handles a message
/// whose installation was already authenticated earlier in the same run.
#[derive(Default)]
pub struct InstallationTokenCache {
    tokens: RefCell<HashMap<String, InstallationToken>>,
}

impl InstallationTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a still-valid cached token for `installation_id`, if any.
    /// A token expiring within `skew` of `now` is treated as absent so
    /// callers re-exchange before the forge rejects it.
    pub fn get(
        &self,
        installation_id: &str,
        now: DateTime<Utc>,
        skew: chrono::Duration,
    ) -> Option<InstallationToken> {
        let tokens = self.tokens.borrow();
        tokens.get(installation_id).and_then(|t| {
            if t.expires_at - skew > now {
                Some(t.clone())
            } else {
                None
            }
        })
    }

    pub fn put(&self, installation_id: &str, token: InstallationToken) {
        self.tokens
            .borrow_mut()
            .insert(installation_id.to_string(), token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

    const TEST_PRIVATE_KEY_PEM: &str = include_str!("../testdata/test_key.pem");
    const TEST_PUBLIC_KEY_PEM: &str = include_str!("../testdata/test_key_pub.pem");

    #[derive(Debug, serde::Deserialize)]
    struct DecodedClaims {
        iss: String,
        iat: i64,
        exp: i64,
    }

    #[test]
    fn jwt_claims_have_expected_issuer_and_window() {
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let jwt = mint_app_jwt("app-123", TEST_PRIVATE_KEY_PEM, now).unwrap();

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        let decoded = decode::<DecodedClaims>(
            &jwt,
            &DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY_PEM.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.claims.iss, "app-123");
        assert_eq!(decoded.claims.iat, now.timestamp() - 60);
        assert_eq!(decoded.claims.exp, now.timestamp() + 540);
    }

    #[test]
    fn malformed_private_key_is_an_error() {
        let now = Utc::now();
        assert!(mint_app_jwt("app-123", "not a pem", now).is_err());
    }

    #[test]
    fn webhook_supplied_installation_id_overrides_default() {
        assert_eq!(resolve_installation_id("default-id", Some("webhook-id")), "webhook-id");
        assert_eq!(resolve_installation_id("default-id", None), "default-id");
    }

    #[test]
    fn cache_returns_unexpired_token() {
        let cache = InstallationTokenCache::new();
        let now = Utc::now();
        cache.put(
            "inst-1",
            InstallationToken {
                token: "tok".to_string(),
                expires_at: now + chrono::Duration::minutes(10),
            },
        );
        let hit = cache.get("inst-1", now, chrono::Duration::seconds(30));
        assert_eq!(hit.unwrap().token, "tok");
    }

    #[test]
    fn cache_treats_near_expiry_token_as_absent() {
        let cache = InstallationTokenCache::new();
        let now = Utc::now();
        cache.put(
            "inst-1",
            InstallationToken {
                token: "tok".to_string(),
                expires_at: now + chrono::Duration::seconds(10),
            },
        );
        let hit = cache.get("inst-1", now, chrono::Duration::seconds(30));
        assert!(hit.is_none());
    }

    #[test]
    fn cache_miss_for_unknown_installation() {
        let cache = InstallationTokenCache::new();
        assert!(cache.get("never-seen", Utc::now(), chrono::Duration::seconds(30)).is_none());
    }

    #[tokio::test]
    async fn exchange_parses_successful_response() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr();
        let handle = std::thread::spawn(move || {
            let request = server.recv().unwrap();
            let body = r#"{"token":"ghs_abc123","expires_at":"2026-01-01T01:00:00Z"}"#;
            let response = tiny_http::Response::from_string(body).with_header(
                tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                    .unwrap(),
            );
            request.respond(response).unwrap();
        });

        let api_base = format!("http://{addr}");
        let client = reqwest::Client::new();
        let token = exchange_for_installation_token(&client, &api_base, "inst-1", "fake-jwt")
            .await
            .unwrap();

        assert_eq!(token.token, "ghs_abc123");
        handle.join().unwrap();
    }
}
