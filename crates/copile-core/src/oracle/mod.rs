//! Oracle - the language-model completion service
//!
//! The pipeline only ever asks one question shape: a text, a system
//! instruction, a model tier and a temperature, answered with text.
//! [`BudgetedOracle`] sits in front of any implementation and refuses to
//! forward text that would not fit the tier's context budget.

pub mod openai;
pub mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ModelsConfig;
use crate::error::Result;

pub use openai::OpenAICompatibleOracle;

/// Named model classes with distinct context budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Cheap and quick
    Fast,
    /// Highest capability
    Best,
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Best => write!(f, "best"),
        }
    }
}

/// Text-in, text-out completion service
#[async_trait]
pub trait Oracle: Send + Sync + std::fmt::Debug {
    /// Complete `text` under `instruction` with the model behind `tier`
    async fn complete(
        &self,
        text: &str,
        instruction: &str,
        tier: ModelTier,
        temperature: f64,
    ) -> Result<String>;
}

#[async_trait]
impl<T: Oracle + ?Sized> Oracle for std::sync::Arc<T> {
    async fn complete(
        &self,
        text: &str,
        instruction: &str,
        tier: ModelTier,
        temperature: f64,
    ) -> Result<String> {
        (**self).complete(text, instruction, tier, temperature).await
    }
}

/// Completion used in place of a real answer when the text is over budget
pub fn over_budget_completion(characters: usize, max_characters: usize) -> String {
    format!(
        "Could not get a completion because the number of characters ({}) exceeds the max allowed ({}).",
        characters, max_characters
    )
}

/// Size guard in front of an oracle.
///
/// Over-budget text never reaches the inner oracle; the placeholder from
/// [`over_budget_completion`] flows downstream as the answer instead.
#[derive(Debug)]
pub struct BudgetedOracle<O> {
    inner: O,
    models: ModelsConfig,
}

impl<O: Oracle> BudgetedOracle<O> {
    /// Guard `inner` with the budgets of `models`
    pub fn new(inner: O, models: ModelsConfig) -> Self {
        Self { inner, models }
    }

    /// The guarded oracle
    pub fn inner(&self) -> &O {
        &self.inner
    }
}

#[async_trait]
impl<O: Oracle> Oracle for BudgetedOracle<O> {
    async fn complete(
        &self,
        text: &str,
        instruction: &str,
        tier: ModelTier,
        temperature: f64,
    ) -> Result<String> {
        let characters = text.chars().count();
        let max_characters = self.models.max_characters(tier);
        if characters > max_characters {
            tracing::warn!(
                "Text of {} characters exceeds the {} budget of {}, skipping oracle call",
                characters,
                tier,
                max_characters
            );
            return Ok(over_budget_completion(characters, max_characters));
        }

        tracing::debug!("Oracle request: {} characters, tier {}", characters, tier);
        self.inner.complete(text, instruction, tier, temperature).await
    }
}
