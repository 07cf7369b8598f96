//! Core types shared across the pipeline

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::classifier::RiskCategory;
use crate::error::{CopileError, Result};
use crate::python;

/// The contract a generated implementation must satisfy.
///
/// Prototype plus docstring, as written by the caller. The callable name is
/// the first function or class defined in the text. Only [`Specification::new`]
/// builds one, so the name always comes from the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Specification {
    text: String,
    callable_name: String,
}

impl Specification {
    /// Wrap specification text, discovering its callable name
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let callable_name =
            python::first_definition_name(&text)?.ok_or(CopileError::MissingCallableName)?;
        Ok(Self {
            text,
            callable_name,
        })
    }

    /// Extract the specification from a decorated stub: the first line (the
    /// decorator itself) is dropped.
    pub fn from_stub(stub: &str) -> Result<Self> {
        let body = stub.lines().skip(1).collect::<Vec<_>>().join("\n");
        Self::new(body)
    }

    /// Specification text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Name of the callable being specified
    pub fn callable_name(&self) -> &str {
        &self.callable_name
    }

    /// BLAKE3 digest of the text, hex encoded
    pub fn fingerprint(&self) -> String {
        blake3::hash(self.text.as_bytes()).to_hex().to_string()
    }
}

/// Per-call overrides, scoped to a single generation. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopileOptions {
    /// Regenerate even if a cached entry exists
    pub force: bool,
    /// Modules allowed despite the denylist
    pub module_whitelist: BTreeSet<String>,
    /// Functions allowed despite the denylist
    pub function_whitelist: BTreeSet<String>,
    /// Risk categories accepted from the semantic review
    pub unsafe_overrides: BTreeSet<RiskCategory>,
}

impl CopileOptions {
    /// Options with nothing overridden
    pub fn new() -> Self {
        Self::default()
    }

    /// Force regeneration
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Allow a denylisted module
    pub fn allow_module(mut self, module: impl Into<String>) -> Self {
        self.module_whitelist.insert(module.into());
        self
    }

    /// Allow a denylisted function
    pub fn allow_function(mut self, function: impl Into<String>) -> Self {
        self.function_whitelist.insert(function.into());
        self
    }

    /// Accept a risk category
    pub fn allow_risk(mut self, risk: RiskCategory) -> Self {
        self.unsafe_overrides.insert(risk);
        self
    }
}
