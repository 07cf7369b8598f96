//! Semantic Safety Classifier
//!
//! One oracle round-trip per candidate. The answer is trusted as-is for this
//! layer: no retry, no second opinion.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ModelsConfig;
use crate::error::Result;
use crate::oracle::{prompts, ModelTier, Oracle};

/// Risk labels the safety review may return
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    /// Opens or reads a file
    FileAccess,
    /// Deletes a file
    FileDeletion,
    /// Creates or writes a file
    FileWrite,
    /// May never terminate
    NonTerminating,
    /// Evaluates source code
    CodeEval,
    /// Runs external software
    SystemCall,
    /// Anything else the reviewer considers unsafe
    GenerallyUnsafe,
    /// No issue found
    None,
    /// A label outside the known set, kept verbatim
    Unrecognized(String),
}

impl RiskCategory {
    /// Every known label, `NONE` included
    pub const KNOWN: [RiskCategory; 8] = [
        Self::FileAccess,
        Self::FileDeletion,
        Self::FileWrite,
        Self::NonTerminating,
        Self::CodeEval,
        Self::SystemCall,
        Self::GenerallyUnsafe,
        Self::None,
    ];

    /// Wire label
    pub fn label(&self) -> &str {
        match self {
            Self::FileAccess => "FILE_ACCESS",
            Self::FileDeletion => "FILE_DELETION",
            Self::FileWrite => "FILE_WRITE",
            Self::NonTerminating => "NON_TERMINATING",
            Self::CodeEval => "CODE_EVAL",
            Self::SystemCall => "SYSTEM_CALL",
            Self::GenerallyUnsafe => "GENERALLY_UNSAFE",
            Self::None => "NONE",
            Self::Unrecognized(label) => label,
        }
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RiskCategory {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::KNOWN
            .iter()
            .find(|known| known.label() == s)
            .cloned()
            .unwrap_or_else(|| Self::Unrecognized(s.to_string())))
    }
}

/// Parse a review answer: labels separated by `", "`.
pub fn parse_labels(response: &str) -> BTreeSet<RiskCategory> {
    response
        .trim()
        .split(", ")
        .filter(|label| !label.is_empty())
        .map(|label| match label.parse::<RiskCategory>() {
            Ok(category) => category,
            Err(never) => match never {},
        })
        .collect()
}

/// Ask the oracle which risk categories `source` exhibits.
pub async fn classify(
    oracle: &dyn Oracle,
    models: &ModelsConfig,
    source: &str,
) -> Result<BTreeSet<RiskCategory>> {
    let response = oracle
        .complete(source, prompts::REVIEW_SAFETY, ModelTier::Best, models.temperature)
        .await?;
    let labels = parse_labels(&response);
    tracing::debug!("Safety review labels: {:?}", labels);
    Ok(labels)
}
