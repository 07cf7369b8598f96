//! Error types for Copile Core
//!
//! Every error carries its structured payload (the offending candidate and
//! the violation set). Human-facing remediation text is produced by the
//! caller, not here.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::classifier::RiskCategory;

/// Result type alias for copile operations
pub type Result<T> = std::result::Result<T, CopileError>;

/// Main error type for copile operations
#[derive(Error, Debug)]
pub enum CopileError {
    /// The candidate imports a denylisted module
    #[error("Generated source imports denylisted module(s): {}", .modules.join(", "))]
    BlacklistedModuleImport {
        /// Offending candidate source
        candidate: String,
        /// Denylisted modules found in the candidate
        modules: Vec<String>,
    },

    /// The candidate calls a denylisted function
    #[error("Generated source calls denylisted function(s): {}", .functions.join(", "))]
    BlacklistedFunctionUse {
        /// Offending candidate source
        candidate: String,
        /// Denylisted functions found in the candidate
        functions: Vec<String>,
    },

    /// The semantic review flagged risk categories that were not overridden
    #[error("Generated source was deemed unsafe: {}", join_labels(.issues))]
    SourceDeemedUnsafe {
        /// Offending candidate source
        candidate: String,
        /// Remaining risk categories
        issues: BTreeSet<RiskCategory>,
    },

    /// The candidate needs a module the interpreter cannot resolve
    #[error("Generated source needs module \"{module}\" which is not installed")]
    NeedsModule {
        /// Unresolved module name
        module: String,
    },

    /// The clarity check rejected the specification
    #[error("The specification for \"{callable}()\" is unclear: {response}")]
    SpecificationUnclear {
        /// Callable whose specification was rejected
        callable: String,
        /// Full oracle response
        response: String,
    },

    /// The candidate does not yield the expected callable
    #[error("Generated source is not a usable implementation: {0}")]
    MalformedCandidate(String),

    /// The candidate is not syntactically valid
    #[error("Generated source does not parse: {0}")]
    Syntax(String),

    /// No function or class definition found in a specification
    #[error("No function or class definition found in specification")]
    MissingCallableName,

    /// The oracle could not be reached or answered with an error
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// Invoking a cached callable failed
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        /// What was being attempted
        context: String,
        /// Underlying error
        source: Box<CopileError>,
    },
}

fn join_labels(labels: &BTreeSet<RiskCategory>) -> String {
    labels
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl CopileError {
    /// Add context to an error
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with context layers removed
    pub fn root(&self) -> &CopileError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the generation loop retries after this error.
    ///
    /// Only a malformed candidate is worth another attempt; everything
    /// else is terminal for the current generation.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.root(),
            Self::MalformedCandidate(_) | Self::Syntax(_)
        )
    }

    /// Whether this error came from one of the safety gate layers
    pub fn is_safety_violation(&self) -> bool {
        matches!(
            self.root(),
            Self::BlacklistedModuleImport { .. }
                | Self::BlacklistedFunctionUse { .. }
                | Self::SourceDeemedUnsafe { .. }
        )
    }

    /// The candidate source attached to a safety violation, if any
    pub fn candidate(&self) -> Option<&str> {
        match self.root() {
            Self::BlacklistedModuleImport { candidate, .. }
            | Self::BlacklistedFunctionUse { candidate, .. }
            | Self::SourceDeemedUnsafe { candidate, .. } => Some(candidate),
            _ => None,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add lazy context to a Result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.context(f()))
    }
}
