//! Process-lifetime cache over the secret store.
//!
//! A [`SecretStore`] is the thing that actually knows how to fetch a named
//! secret (environment variables in this build; a real deployment would
//! swap in a vault-backed implementation without touching callers). A
//! [`SecretCache`] wraps any `SecretStore` and remembers every value it has
//! already read for the lifetime of the process — secrets are immutable
//! for the duration of an invocation, so a second read of the same name is
//! always served from memory.
//!
//! # Example
//!
//! ```
//! use reviewer_secrets::{EnvSecretStore, SecretCache};
//!
//! temp_env::with_var("MY_SECRET", Some("shh"), || {
//!     let cache = SecretCache::new(EnvSecretStore);
//!     assert_eq!(cache.get("MY_SECRET").unwrap(), "shh");
//! });
//! ```

use std::cell::RefCell;
use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

/// Anything that can resolve a secret by name.
pub trait SecretStore {
    fn fetch(&self, name: &str) -> Result<String>;
}

/// Resolves secrets from process environment variables. This is the only
/// store implementation shipped here; it is the natural fit for a
/// short-lived serverless invocation where secrets are injected by the
/// platform at startup.
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn fetch(&self, name: &str) -> Result<String> {
        std::env::var(name).with_context(|| format!("secret {name} is not set"))
    }
}

/// Read-through cache over a [`SecretStore`]. Not `Sync`: each invocation
/// owns its own cache (see the crate's concurrency model), so an
/// uncontended `RefCell` is sufficient and avoids lock overhead.
pub struct SecretCache<S> {
    store: S,
    values: RefCell<HashMap<String, String>>,
}

impl<S: SecretStore> SecretCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            values: RefCell::new(HashMap::new()),
        }
    }

    /// Fetch `name`, serving from cache after the first successful read.
    /// A failed fetch is never cached, so a transient secret-store outage
    /// is retried on the next call.
    pub fn get(&self, name: &str) -> Result<String> {
        if let Some(cached) = self.values.borrow().get(name) {
            return Ok(cached.clone());
        }
        let value = self.store.fetch(name)?;
        self.values
            .borrow_mut()
            .insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Number of distinct secret names resolved so far. Exposed for tests
    /// and metrics, not for correctness.
    pub fn cached_len(&self) -> usize {
        self.values.borrow().len()
    }
}

/// The forge-app identity secret: `{app_id, installation_id}`. The
/// `installation_id` here is the configured default; a webhook-supplied
/// installation id always takes precedence over it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ForgeAppIdentity {
    pub app_id: String,
    pub installation_id: String,
}

/// Parse the forge-app identity secret's JSON value.
pub fn parse_forge_app_identity(raw: &str) -> Result<ForgeAppIdentity> {
    serde_json::from_str(raw)
        .map_err(|e| anyhow!("forge app identity secret is not valid JSON: {e}"))
}
