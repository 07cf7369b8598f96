//! Denylists of module and function names
//!
//! Loaded once by whoever owns the pipeline and passed by reference into
//! every safety review. Per-call whitelists are applied on top and never
//! stored here.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{CopileError, Result};

const BUILTIN_MODULES: &str = include_str!("../denylists/modules.txt");
const BUILTIN_FUNCTIONS: &str = include_str!("../denylists/functions.txt");

/// Ordered set of denied names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Denylist {
    entries: Vec<String>,
}

impl Denylist {
    /// Parse a newline-separated list. Blank lines and `#` comments are skipped,
    /// duplicates keep their first position.
    pub fn parse(text: &str) -> Self {
        let mut entries: Vec<String> = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if !entries.iter().any(|e| e == line) {
                entries.push(line.to_string());
            }
        }
        Self { entries }
    }

    /// Build from an explicit list of names
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let text = names
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        Self::parse(&text)
    }

    /// Load a list file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CopileError::Config(format!("Cannot read denylist {}: {}", path.display(), e))
        })?;
        Ok(Self::parse(&text))
    }

    /// All entries, in file order
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Whether `name` is denied before any whitelist is applied
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e == name)
    }

    /// Entries still active once `whitelist` is subtracted
    pub fn active<'a>(&'a self, whitelist: &'a BTreeSet<String>) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |e| !whitelist.contains(e.as_str()))
            .map(String::as_str)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The two denylists consulted by the static scans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenylistConfig {
    /// Modules that may not be imported
    pub modules: Denylist,
    /// Functions that may not be called by bare name
    pub functions: Denylist,
}

impl Default for DenylistConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

impl DenylistConfig {
    /// Lists shipped with the crate
    pub fn builtin() -> Self {
        Self {
            modules: Denylist::parse(BUILTIN_MODULES),
            functions: Denylist::parse(BUILTIN_FUNCTIONS),
        }
    }

    /// Load lists from files, falling back to the built-in list for any path not given
    pub fn load(modules: Option<&Path>, functions: Option<&Path>) -> Result<Self> {
        let builtin = Self::builtin();
        Ok(Self {
            modules: match modules {
                Some(path) => Denylist::from_file(path)?,
                None => builtin.modules,
            },
            functions: match functions {
                Some(path) => Denylist::from_file(path)?,
                None => builtin.functions,
            },
        })
    }
}
