//! Generation Loop
//!
//! ```text
//! CHECK_CACHE ──hit, no force──▶ RETURN_CACHED
//!      │ miss or force
//!      ▼
//! CHECK_CLARITY ──unclear──▶ FAIL
//!      │ clear
//!      ▼
//! GENERATE (≤ max_attempts) ──▶ gate ──▶ load ──▶ cache ──▶ RETURN
//! ```
//!
//! Safety violations, unclear specifications and missing modules end the
//! generation at once. Only malformed candidates earn another attempt, and
//! every attempt uses the highest-capability tier.

use std::sync::Arc;

use crate::clarity;
use crate::config::ModelsConfig;
use crate::error::Result;
use crate::guardrail::SafetyGate;
use crate::oracle::{prompts, ModelTier, Oracle};
use crate::runtime::{CallableRuntime, Copilation};
use crate::storage::CacheStore;
use crate::types::{CopileOptions, Specification};

const ARTIFACT_PREFIXES: [&str; 5] = ["'", "```python", "```py", "```json", "```"];
const ARTIFACT_SUFFIXES: [&str; 2] = ["'", "```"];

/// Tier used for every generation attempt, retries included
pub const GENERATION_TIER: ModelTier = ModelTier::Best;

/// Strip quoting and code fences the model wraps around its answer.
pub fn clean_response(response: &str) -> String {
    let mut text = response.trim();
    for prefix in ARTIFACT_PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest;
        }
    }
    for suffix in ARTIFACT_SUFFIXES {
        if let Some(rest) = text.strip_suffix(suffix) {
            text = rest;
        }
    }
    text.trim().to_string()
}

/// Everything one generation run needs, borrowed from the owner
#[derive(Debug)]
pub struct GenerationLoop<'a> {
    oracle: &'a dyn Oracle,
    models: &'a ModelsConfig,
    gate: SafetyGate<'a>,
    runtime: Arc<dyn CallableRuntime>,
    cache: &'a CacheStore,
    max_attempts: usize,
}

impl<'a> GenerationLoop<'a> {
    /// Assemble a loop
    pub fn new(
        oracle: &'a dyn Oracle,
        models: &'a ModelsConfig,
        gate: SafetyGate<'a>,
        runtime: Arc<dyn CallableRuntime>,
        cache: &'a CacheStore,
        max_attempts: usize,
    ) -> Self {
        Self {
            oracle,
            models,
            gate,
            runtime,
            cache,
            max_attempts,
        }
    }

    /// Serve `spec` from the cache, or generate, review and cache a new implementation.
    ///
    /// `Ok(None)` means every attempt produced a malformed candidate.
    pub async fn run(&self, spec: &Specification, options: &CopileOptions) -> Result<Option<Copilation>> {
        if !options.force {
            if let Some(cached) = self.cached(spec)? {
                return Ok(Some(cached));
            }
        }

        clarity::check_clarity(self.oracle, self.models, spec).await?;
        self.generate(spec, options).await
    }

    fn cached(&self, spec: &Specification) -> Result<Option<Copilation>> {
        let name = spec.callable_name();
        let Some(entry) = self.cache.load(name)? else {
            return Ok(None);
        };

        match self.cache.fingerprint(name)? {
            Some(recorded) if recorded != spec.fingerprint() => {
                tracing::warn!(
                    "Specification of {}() changed since it was cached; serving the cached version (force to regenerate)",
                    name
                );
            }
            _ => {}
        }

        tracing::info!("Using cached {}() from {}", name, entry.path.display());
        Ok(Some(Copilation::new(
            entry.name,
            entry.source,
            entry.path,
            Arc::clone(&self.runtime),
        )))
    }

    async fn generate(&self, spec: &Specification, options: &CopileOptions) -> Result<Option<Copilation>> {
        let name = spec.callable_name();
        let mut last_candidate = String::new();

        for attempt in 1..=self.max_attempts {
            tracing::info!("Generating {}() (attempt {}/{})", name, attempt, self.max_attempts);

            let response = self
                .oracle
                .complete(
                    spec.text(),
                    prompts::IMPLEMENT_SPECIFICATION,
                    GENERATION_TIER,
                    self.models.temperature,
                )
                .await?;
            let candidate = clean_response(&response);
            last_candidate = candidate.clone();

            let outcome = match self.gate.review(&candidate, options).await {
                Ok(()) => self.runtime.load(name, &candidate).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => {
                    let path = self.cache.write(name, &candidate).await?;
                    self.cache.record_fingerprint(name, &spec.fingerprint())?;
                    tracing::info!("The specification for {}() was copiled in {}", name, path.display());
                    return Ok(Some(Copilation::new(
                        name,
                        candidate,
                        path,
                        Arc::clone(&self.runtime),
                    )));
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!("Attempt {} for {}() produced a bad candidate: {}", attempt, name, e);
                }
                Err(e) => return Err(e),
            }
        }

        tracing::error!(
            "No usable implementation of {}() after {} attempts. The last candidate was:\n{}",
            name,
            self.max_attempts,
            last_candidate
        );
        Ok(None)
    }
}
