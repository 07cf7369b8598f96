//! Oracle credentials kept in a dotenv file

use std::io::ErrorKind;
use std::path::Path;

use crate::error::{CopileError, Result};

/// Load `path` into the process environment. Variables already set win.
///
/// Returns whether a file was loaded.
pub fn load_env(path: &Path) -> bool {
    match dotenvy::from_path(path) {
        Ok(()) => {
            tracing::debug!("Loaded environment from {}", path.display());
            true
        }
        Err(e) if e.not_found() => false,
        Err(e) => {
            tracing::warn!("Ignoring unreadable env file {}: {}", path.display(), e);
            false
        }
    }
}

/// Write `var=key` into the dotenv file at `path`, replacing an existing
/// assignment of `var` and keeping every other line.
pub fn save_api_key(path: &Path, var: &str, key: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() || key.contains(['\n', '\r', '\'']) {
        return Err(CopileError::Config(
            "API key must be a single line without quotes".to_string(),
        ));
    }

    let existing = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let assignment = format!("{}='{}'", var, key);
    let mut replaced = false;
    let mut lines: Vec<String> = existing
        .lines()
        .map(|line| {
            let bare = line.trim_start().trim_start_matches("export ").trim_start();
            if bare.starts_with(&format!("{}=", var)) {
                replaced = true;
                assignment.clone()
            } else {
                line.to_string()
            }
        })
        .collect();
    if !replaced {
        lines.push(assignment);
    }

    std::fs::write(path, lines.join("\n") + "\n")?;
    tracing::info!("Saved {} to {}", var, path.display());
    Ok(())
}
