//! Decorator discovery
//!
//! Finds `@copile` / `@copile(...)` stubs in a Python file and reads the
//! decorator's keyword arguments into [`CopileOptions`]:
//!
//! ```python
//! @copile(force_copilation=True, module_whitelist=["re"], unsafe_overrides="FILE_ACCESS")
//! def count_words(path: str) -> int:
//!     """Count the words in the file at path."""
//! ```

use std::collections::BTreeSet;

use tree_sitter::Node;

use crate::classifier::RiskCategory;
use crate::error::{CopileError, Result};
use crate::python::{self, node_text};
use crate::types::{CopileOptions, Specification};

/// Decorator name recognized on stubs
pub const DECORATOR_NAME: &str = "copile";

/// A stub found in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoratedStub {
    /// Specification: the definition without its decorators
    pub spec: Specification,
    /// Options read from the decorator arguments
    pub options: CopileOptions,
    /// 1-based line of the decorator
    pub line: usize,
}

/// Every top-level definition in `source` carrying the copile decorator.
pub fn find_decorated_stubs(source: &str) -> Result<Vec<DecoratedStub>> {
    let tree = python::parse(source)?;
    let root = tree.root_node();
    let mut stubs = Vec::new();

    for i in 0..root.named_child_count() {
        let Some(node) = root.named_child(i) else {
            continue;
        };
        if node.kind() != "decorated_definition" {
            continue;
        }
        let Some(definition) = node.child_by_field_name("definition") else {
            continue;
        };

        for j in 0..node.named_child_count() {
            let Some(decorator) = node.named_child(j) else {
                continue;
            };
            if decorator.kind() != "decorator" {
                continue;
            }
            if let Some(options) = read_decorator(decorator, source)? {
                stubs.push(DecoratedStub {
                    spec: Specification::new(node_text(definition, source))?,
                    options,
                    line: decorator.start_position().row + 1,
                });
                break;
            }
        }
    }
    Ok(stubs)
}

fn is_copile_reference(node: Node<'_>, source: &str) -> bool {
    match node.kind() {
        "identifier" => node_text(node, source) == DECORATOR_NAME,
        "attribute" => node
            .child_by_field_name("attribute")
            .map(|a| node_text(a, source) == DECORATOR_NAME)
            .unwrap_or(false),
        _ => false,
    }
}

/// Options for a copile decorator, `None` for any other decorator
fn read_decorator(decorator: Node<'_>, source: &str) -> Result<Option<CopileOptions>> {
    let Some(expression) = decorator.named_child(0) else {
        return Ok(None);
    };

    if is_copile_reference(expression, source) {
        return Ok(Some(CopileOptions::default()));
    }
    if expression.kind() != "call" {
        return Ok(None);
    }
    let is_copile = expression
        .child_by_field_name("function")
        .map(|f| is_copile_reference(f, source))
        .unwrap_or(false);
    if !is_copile {
        return Ok(None);
    }

    let mut options = CopileOptions::default();
    let Some(arguments) = expression.child_by_field_name("arguments") else {
        return Ok(Some(options));
    };

    for i in 0..arguments.named_child_count() {
        let Some(argument) = arguments.named_child(i) else {
            continue;
        };
        if argument.kind() != "keyword_argument" {
            continue;
        }
        let (Some(name), Some(value)) = (
            argument.child_by_field_name("name"),
            argument.child_by_field_name("value"),
        ) else {
            continue;
        };

        match node_text(name, source) {
            "force_copilation" => options.force = boolean(value, source)?,
            "module_whitelist" => options.module_whitelist = strings(value, source)?,
            "function_whitelist" => options.function_whitelist = strings(value, source)?,
            "unsafe_overrides" => {
                options.unsafe_overrides = strings(value, source)?
                    .iter()
                    .map(|s| s.parse::<RiskCategory>().unwrap_or_else(|never| match never {}))
                    .collect();
            }
            other => {
                tracing::warn!(
                    "Ignoring unknown copile argument `{}` at line {}",
                    other,
                    argument.start_position().row + 1
                );
            }
        }
    }
    Ok(Some(options))
}

fn invalid(node: Node<'_>, source: &str, expected: &str) -> CopileError {
    CopileError::Config(format!(
        "line {}: expected {}, found `{}`",
        node.start_position().row + 1,
        expected,
        node_text(node, source)
    ))
}

fn boolean(node: Node<'_>, source: &str) -> Result<bool> {
    match node.kind() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid(node, source, "True or False")),
    }
}

/// A string, or a list / tuple / set of strings
fn strings(node: Node<'_>, source: &str) -> Result<BTreeSet<String>> {
    match node.kind() {
        "string" => Ok([string_literal(node, source)?].into_iter().collect()),
        "list" | "tuple" | "set" => {
            let mut values = BTreeSet::new();
            for i in 0..node.named_child_count() {
                if let Some(item) = node.named_child(i) {
                    if item.kind() == "comment" {
                        continue;
                    }
                    values.insert(string_literal(item, source)?);
                }
            }
            Ok(values)
        }
        _ => Err(invalid(node, source, "a string or a list of strings")),
    }
}

fn string_literal(node: Node<'_>, source: &str) -> Result<String> {
    if node.kind() != "string" {
        return Err(invalid(node, source, "a string"));
    }
    let text = node_text(node, source).trim_start_matches(|c: char| "rRbBuU".contains(c));
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|t| t.strip_suffix(quote))
        {
            return Ok(inner.to_string());
        }
    }
    Err(invalid(node, source, "a plain string literal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULE: &str = r#"from copile import copile


@copile
def add(a: int, b: int) -> int:
    """Return the sum of a and b."""


@copile(force_copilation=True, module_whitelist=["re", 'json'], function_whitelist="open", unsafe_overrides={"FILE_ACCESS"})
def count_words(path: str) -> int:
    """Count the words in the file at path."""


@staticmethod
def untouched():
    pass


def plain():
    pass
"#;

    #[test]
    fn test_finds_decorated_stubs() {
        let stubs = find_decorated_stubs(MODULE).unwrap();
        let names: Vec<_> = stubs.iter().map(|s| s.spec.callable_name()).collect();
        assert_eq!(names, vec!["add", "count_words"]);
        assert_eq!(stubs[0].line, 4);
        assert!(stubs[0].spec.text().starts_with("def add"));
        assert_eq!(stubs[0].options, CopileOptions::default());
    }

    #[test]
    fn test_reads_keyword_arguments() {
        let stubs = find_decorated_stubs(MODULE).unwrap();
        let options = &stubs[1].options;
        assert!(options.force);
        assert_eq!(
            options.module_whitelist,
            ["json", "re"].iter().map(|s| s.to_string()).collect()
        );
        assert!(options.function_whitelist.contains("open"));
        assert!(options.unsafe_overrides.contains(&RiskCategory::FileAccess));
    }

    #[test]
    fn test_attribute_form_is_recognized() {
        let source = "import copile\n\n@copile.copile(force_copilation=False)\ndef f():\n    \"\"\"One.\"\"\"\n";
        let stubs = find_decorated_stubs(source).unwrap();
        assert_eq!(stubs.len(), 1);
        assert!(!stubs[0].options.force);
    }

    #[test]
    fn test_bad_argument_type_is_config_error() {
        let source = "@copile(force_copilation=\"yes\")\ndef f():\n    pass\n";
        assert!(matches!(
            find_decorated_stubs(source),
            Err(CopileError::Config(msg)) if msg.contains("True or False")
        ));
    }
}
