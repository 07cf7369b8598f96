//! Normalization of cache files after a write

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::python;

const IMPORT_KINDS: [&str; 3] = [
    "import_statement",
    "import_from_statement",
    "future_import_statement",
];

/// Move every top-level import to the head of the file.
///
/// Imports keep their relative order and exact duplicates collapse; all
/// other text keeps its original order. Imports nested in a body stay put.
pub fn hoist_imports(text: &str) -> Result<String> {
    let tree = python::parse(text)?;
    let root = tree.root_node();

    let mut imports: Vec<&str> = Vec::new();
    let mut rest = String::with_capacity(text.len());
    let mut cursor = 0;

    for i in 0..root.named_child_count() {
        let Some(node) = root.named_child(i) else {
            continue;
        };
        if !IMPORT_KINDS.contains(&node.kind()) {
            continue;
        }
        let span = node.byte_range();
        rest.push_str(&text[cursor..span.start]);
        let statement = text[span.clone()].trim();
        if !imports.contains(&statement) {
            imports.push(statement);
        }
        cursor = span.end;
        // swallow the statement's own line break
        if text[cursor..].starts_with('\n') {
            cursor += 1;
        }
    }
    rest.push_str(&text[cursor..]);

    let body = rest.trim();
    let mut out = String::with_capacity(text.len() + 1);
    if !imports.is_empty() {
        out.push_str(&imports.join("\n"));
        out.push('\n');
        if !body.is_empty() {
            out.push_str("\n\n");
        }
    }
    if !body.is_empty() {
        out.push_str(body);
        out.push('\n');
    }
    Ok(out)
}

/// External source formatter applied to a cache file in place
#[async_trait]
pub trait SourceFormatter: Send + Sync + std::fmt::Debug {
    /// Format the file at `path`
    async fn format(&self, path: &Path);
}

/// Leaves files untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFormatter;

#[async_trait]
impl SourceFormatter for NoopFormatter {
    async fn format(&self, _path: &Path) {}
}

/// Runs a sequence of commands, each with the file path appended.
///
/// A formatter that is missing or exits non-zero is logged and skipped;
/// the cache file stays valid either way.
#[derive(Debug, Clone, Default)]
pub struct CommandFormatter {
    commands: Vec<Vec<String>>,
}

impl CommandFormatter {
    /// Formatter running `commands` in order
    pub fn new(commands: Vec<Vec<String>>) -> Self {
        Self { commands }
    }
}

#[async_trait]
impl SourceFormatter for CommandFormatter {
    async fn format(&self, path: &Path) {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file = path.to_string_lossy().to_string();
        let absolute = std::fs::canonicalize(path)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or(file);

        for command in &self.commands {
            let Some((program, args)) = command.split_first() else {
                continue;
            };
            let mut args = args.to_vec();
            args.push(absolute.clone());

            match copile_sandbox::run_in(dir, program, &args, None).await {
                Ok(result) if result.success => {
                    tracing::debug!("Formatted {} with {}", absolute, program);
                }
                Ok(result) => {
                    tracing::warn!(
                        "Formatter {} failed on {} (exit {}): {}",
                        program,
                        absolute,
                        result.exit_code,
                        result.stderr.trim()
                    );
                }
                Err(e) => {
                    tracing::warn!("Formatter {} unavailable: {:#}", program, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imports_move_to_top_in_order() {
        let text = "def a():\n    return math.pi\n\n\nimport math\nfrom typing import List\n\n\ndef b() -> List[int]:\n    return []\n";
        let out = hoist_imports(text).unwrap();
        assert_eq!(
            out,
            "import math\nfrom typing import List\n\n\ndef a():\n    return math.pi\n\n\n\n\ndef b() -> List[int]:\n    return []\n"
        );
    }

    #[test]
    fn test_duplicate_imports_collapse() {
        let text = "import math\n\ndef a():\n    return math.e\n\nimport math\n";
        let out = hoist_imports(text).unwrap();
        assert_eq!(out.matches("import math").count(), 1);
        assert!(out.starts_with("import math\n"));
    }

    #[test]
    fn test_nested_imports_stay_in_body() {
        let text = "def a():\n    import json\n    return json.dumps(1)\n";
        assert_eq!(hoist_imports(text).unwrap(), text);
    }

    #[test]
    fn test_multiline_import_moves_whole() {
        let text = "x = 1\nfrom typing import (\n    List,\n    Dict,\n)\n";
        let out = hoist_imports(text).unwrap();
        assert!(out.starts_with("from typing import (\n    List,\n    Dict,\n)\n"));
        assert!(out.ends_with("x = 1\n"));
    }

    #[tokio::test]
    async fn test_missing_formatter_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.co.py");
        std::fs::write(&path, "x = 1\n").unwrap();

        let formatter = CommandFormatter::new(vec![vec!["copile-no-such-formatter".into()]]);
        formatter.format(&path).await;

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x = 1\n");
    }
}
