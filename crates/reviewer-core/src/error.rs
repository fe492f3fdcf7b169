//! The dispatcher's top-level error enum.
//!
//! Every variant here is something [`crate::Dispatcher::dispatch_batch`]
//! surfaces by returning the failing message's delivery id for queue
//! redelivery. Validation failures from the LLM pipeline are deliberately
//! *not* represented here: [`crate::Dispatcher::dispatch_one`] catches
//! those inline and renders a neutral check-run instead of propagating,
//! since redelivering a message whose plan or review failed to validate
//! would just fail the same way again.

use reviewer_forge_client::ForgeError;
use reviewer_llm::LlmStageError;

/// An error that aborts a single message's dispatch and, at the batch
/// level, marks it for redelivery.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to authenticate as the forge app: {0}")]
    Auth(#[source] anyhow::Error),
    #[error("forge API call failed: {0}")]
    Forge(#[from] ForgeError),
    #[error("LLM runtime call failed: {0}")]
    Llm(#[source] anyhow::Error),
    #[error("idempotency store error: {0}")]
    Idempotency(#[source] anyhow::Error),
    #[error("repo policy file is malformed: {0}")]
    Policy(#[from] reviewer_policy::PolicyError),
    #[error("unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl From<LlmStageError> for DispatchError {
    /// Only the runtime (network/transport) variant of [`LlmStageError`]
    /// ever reaches here — [`crate::dispatch`] handles
    /// `SchemaInvalid`/`PlanReferencedUnknownFiles` inline by rendering a
    /// neutral check-run. This conversion exists so `?` composes cleanly
    /// at call sites that have already excluded those two variants.
    fn from(err: LlmStageError) -> Self {
        match err {
            LlmStageError::Runtime(e) => DispatchError::Llm(e),
            other => DispatchError::Unexpected(anyhow::anyhow!(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_llm_error_maps_to_llm_variant() {
        let err = LlmStageError::Runtime(anyhow::anyhow!("boom"));
        assert!(matches!(DispatchError::from(err), DispatchError::Llm(_)));
    }
}
