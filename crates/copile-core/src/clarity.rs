//! Specification Clarity Check
//!
//! Runs once per generation, before the first attempt. An unclear
//! specification is never retried: the caller has to rewrite it.

use crate::config::ModelsConfig;
use crate::error::{CopileError, Result};
use crate::oracle::{prompts, ModelTier, Oracle};
use crate::types::Specification;

/// Prefix marking a rejected specification
pub const UNCLEAR_PREFIX: &str = "UNCLEAR";

/// Ask the oracle whether `spec` can be implemented as written.
pub async fn check_clarity(
    oracle: &dyn Oracle,
    models: &ModelsConfig,
    spec: &Specification,
) -> Result<()> {
    let response = oracle
        .complete(
            spec.text(),
            prompts::ASSESS_SPECIFICATION,
            ModelTier::Fast,
            models.temperature,
        )
        .await?;

    if response.starts_with(UNCLEAR_PREFIX) {
        tracing::warn!("Specification for {}() judged unclear", spec.callable_name());
        return Err(CopileError::SpecificationUnclear {
            callable: spec.callable_name().to_string(),
            response,
        });
    }
    Ok(())
}
