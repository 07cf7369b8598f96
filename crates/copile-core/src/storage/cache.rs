//! CacheStore - one source file per generated callable
//!
//! Entries live at `<dir>/<name>.co.py`. A rewrite replaces only the span of
//! the named definition, located structurally rather than by line numbers,
//! so anything else in the file survives.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{CopileError, Result, ResultExt};
use crate::python;

use super::format::{hoist_imports, NoopFormatter, SourceFormatter};

const SOURCE_SUFFIX: &str = ".co.py";
const FINGERPRINT_SUFFIX: &str = ".co.spec";

/// A cached implementation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Callable name
    pub name: String,
    /// Cache file holding the definition
    pub path: PathBuf,
    /// Full text of the cache file
    pub source: String,
}

/// On-disk store of generated implementations
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    formatter: Arc<dyn SourceFormatter>,
}

impl CacheStore {
    /// Store rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            formatter: Arc::new(NoopFormatter),
        }
    }

    /// Run `formatter` on every file after it is written
    pub fn with_formatter(mut self, formatter: Arc<dyn SourceFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file for `name`
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}{}", name, SOURCE_SUFFIX))
    }

    fn fingerprint_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}{}", name, FINGERPRINT_SUFFIX))
    }

    fn read_optional(path: &Path) -> Result<Option<String>> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CopileError::from(e)).with_context(|| format!("Reading {}", path.display())),
        }
    }

    /// Cached entry for `name`.
    ///
    /// A missing file and a file that does not define `name` are both a
    /// plain miss.
    pub fn load(&self, name: &str) -> Result<Option<CacheEntry>> {
        let path = self.path_for(name);
        let Some(source) = Self::read_optional(&path)? else {
            tracing::debug!("Cache miss for {}: no file", name);
            return Ok(None);
        };
        if !python::defines(&source, name)? {
            tracing::debug!("Cache miss for {}: {} does not define it", name, path.display());
            return Ok(None);
        }
        Ok(Some(CacheEntry {
            name: name.to_string(),
            path,
            source,
        }))
    }

    /// Store `source` as the implementation of `name`, returning the cache file path.
    pub async fn write(&self, name: &str, source: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .map_err(CopileError::from)
            .with_context(|| format!("Creating cache directory {}", self.dir.display()))?;

        let path = self.path_for(name);
        let updated = match Self::read_optional(&path)? {
            Some(existing) => splice(&existing, name, source)?,
            None => source.to_string(),
        };

        std::fs::write(&path, hoist_imports(&updated)?)?;
        self.formatter.format(&path).await;

        tracing::info!("Cached {} in {}", name, path.display());
        Ok(path)
    }

    /// Specification digest recorded alongside `name`, if any
    pub fn fingerprint(&self, name: &str) -> Result<Option<String>> {
        Ok(Self::read_optional(&self.fingerprint_path(name))?.map(|s| s.trim().to_string()))
    }

    /// Record the digest of the specification that produced `name`
    pub fn record_fingerprint(&self, name: &str, fingerprint: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.fingerprint_path(name), format!("{}\n", fingerprint))?;
        Ok(())
    }
}

/// Replace the definition of `name` in `existing` with `source`, or append
/// `source` when there is none.
fn splice(existing: &str, name: &str, source: &str) -> Result<String> {
    let tree = python::parse(existing)?;
    let source = source.trim_end();

    Ok(match python::definition_span(&tree, existing, name) {
        Some(span) => {
            let before = &existing[..span.start];
            let after = existing[span.end..].trim_start_matches(['\n', '\r']);
            format!("{}{}\n\n\n{}", before, source, after)
        }
        None if existing.trim().is_empty() => source.to_string(),
        None => format!("{}\n\n\n{}\n", existing.trim_end(), source),
    })
}
