//! Core domain types for the AI code-review platform.
//!
//! This crate defines the schemas that cross component boundaries:
//! [`CanonicalEvent`] (webhook receiver → queue → worker), [`PRContext`]
//! (context builder → planner/reviewer), [`TriagePlan`] (planner →
//! reviewer), [`Review`] (reviewer → renderer/verdict), and [`RepoPolicy`]
//! (policy loader → verdict deriver). Every cross-component message is
//! schema-validated at both producer and consumer; LLM output is treated
//! as an untrusted string until it parses into one of these types.
//!
//! ## Modules
//!
//! - [`event`] — [`CanonicalEvent`], [`Trigger`], [`DedupKey`]
//! - [`files`] — [`ChangedFileEntry`], [`FileStatus`]
//! - [`context`] — [`PRContext`], [`PullRequestSummary`], [`SkippedFile`]
//! - [`plan`] — [`TriagePlan`], [`Hotspot`], [`FileCluster`], [`RiskEstimate`]
//! - [`review`] — [`Review`], [`Finding`], [`Priority`], [`FindingType`], [`TicketCompliance`]
//! - [`policy`] — [`RepoPolicy`], [`ReviewCommentMode`], [`Severity`]
//! - [`idempotency`] — [`IdempotencyRecord`]

pub mod context;
pub mod event;
pub mod files;
pub mod idempotency;
pub mod plan;
pub mod policy;
pub mod review;

pub use context::{PRContext, PullRequestSummary, SkippedFile};
pub use event::{CanonicalEvent, DedupKey, Trigger};
pub use files::{ChangedFileEntry, FileStatus};
pub use idempotency::IdempotencyRecord;
pub use plan::{FileCluster, Hotspot, RiskEstimate, TriagePlan};
pub use policy::{RepoPolicy, ReviewCommentMode, Severity};
pub use review::{Finding, FindingType, Priority, Review, TicketCompliance};

/// Errors raised while validating an untrusted JSON payload (planner or
/// reviewer LLM output, or a webhook body) against one of this crate's
/// schemas.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The raw text contained no `{ ... }` object to extract.
    #[error("no JSON object found in output")]
    NoJsonObject,
    /// The extracted substring did not parse as JSON.
    #[error("failed to parse JSON: {0}")]
    ParseError(#[from] serde_json::Error),
    /// The JSON parsed but violated a schema invariant not expressible in
    /// serde's structural typing (e.g. "end_line without start_line").
    #[error("schema violation: {0}")]
    Violation(String),
}

/// Extract the first top-level `{ ... }` object from possibly-prose-wrapped
/// LLM output, then parse it as `T`.
///
/// First tries the substring from the first `{` to the last `}`, which
/// handles the common case of a single JSON object wrapped in a sentence or
/// a fenced code block. If that substring fails to parse — typically
/// because trailing prose after the object contains a stray `}` — falls
/// back to the shortest balanced-brace span starting at the first `{`,
/// which never rejects anything the first pass would have accepted.
pub fn extract_json_object<T>(raw: &str) -> Result<T, SchemaError>
where
    T: serde::de::DeserializeOwned,
{
    let start = raw.find('{').ok_or(SchemaError::NoJsonObject)?;
    let end = raw.rfind('}').ok_or(SchemaError::NoJsonObject)?;
    if end < start {
        return Err(SchemaError::NoJsonObject);
    }
    let candidate = &raw[start..=end];
    match serde_json::from_str(candidate) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            if let Some(balanced) = balanced_object_span(&raw[start..]) {
                serde_json::from_str(balanced).map_err(SchemaError::from)
            } else {
                Err(SchemaError::from(first_err))
            }
        }
    }
}

/// Find the shortest `{ ... }` span, starting at byte 0 of `text` (which
/// must itself start with `{`), that has balanced braces outside of string
/// literals.
fn balanced_object_span(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.first() != Some(&b'{') {
        return None;
    }
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
