//! Structured JSON-line logging, following the `tracing` +
//! `tracing-subscriber` convention used throughout the wider retrieval
//! pack (the teacher CLI itself reports through a `Reporter` trait rather
//! than emitting logs; this crate is the ambient-stack substitute).
//!
//! [`init`] installs a global subscriber once per process; [`dispatch_span`]
//! opens the per-message span every worker invocation logs inside, so
//! every line in the worker path carries `delivery_id`, `repo`, `pr`,
//! `head_sha`, and `trigger` as structured fields.

use tracing_subscriber::EnvFilter;

/// Install a JSON-line subscriber reading its filter from `RUST_LOG`
/// (defaulting to `info` when unset). Safe to call more than once: later
/// calls are no-ops, matching `tracing`'s own global-subscriber guard.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().json().with_env_filter(filter).try_init();
}

/// Open the correlation span every step of a single dispatch logs inside.
/// Fields mirror [`reviewer_types::CanonicalEvent::correlation_id`]'s
/// components individually, rather than as one joined string, so a log
/// aggregator can filter/group on any one of them.
#[macro_export]
macro_rules! dispatch_span {
    ($delivery_id:expr, $repo:expr, $pr:expr, $head_sha:expr, $trigger:expr) => {
        ::tracing::info_span!(
            "dispatch",
            delivery_id = %$delivery_id,
            repo = %$repo,
            pr = %$pr,
            head_sha = %$head_sha,
            trigger = ?$trigger,
        )
    };
}
