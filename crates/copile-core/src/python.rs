//! Tree-sitter helpers for Python sources
//!
//! Specifications, candidates and cache files are all Python text. These
//! helpers are the only place that knows the grammar's node kinds.

use std::collections::VecDeque;
use std::ops::Range;

use tree_sitter::{Node, Parser, Tree};

use crate::error::{CopileError, Result};

const FUNCTION_DEFINITION: &str = "function_definition";
const CLASS_DEFINITION: &str = "class_definition";
const DECORATED_DEFINITION: &str = "decorated_definition";

fn parser() -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(tree_sitter_python::language())
        .map_err(|e| CopileError::Config(format!("Failed to initialize Python parser: {}", e)))?;
    Ok(parser)
}

/// Parse a source, tolerating syntax errors (they show up as error nodes).
pub fn parse(source: &str) -> Result<Tree> {
    parser()?
        .parse(source, None)
        .ok_or_else(|| CopileError::Syntax("parser produced no tree".to_string()))
}

/// Parse a source and reject it if the tree contains any error or missing node.
pub fn parse_strict(source: &str) -> Result<Tree> {
    let tree = parse(source)?;
    if tree.root_node().has_error() {
        let location = first_error(tree.root_node())
            .map(|n| {
                format!(
                    "syntax error at line {}, column {}",
                    n.start_position().row + 1,
                    n.start_position().column + 1
                )
            })
            .unwrap_or_else(|| "syntax error".to_string());
        return Err(CopileError::Syntax(location));
    }
    Ok(tree)
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    for i in 0..node.child_count() {
        if let Some(found) = node.child(i).and_then(first_error) {
            return Some(found);
        }
    }
    None
}

/// Text covered by a node
pub fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

fn definition_name<'s>(node: Node<'_>, source: &'s str) -> Option<&'s str> {
    match node.kind() {
        FUNCTION_DEFINITION | CLASS_DEFINITION => node
            .child_by_field_name("name")
            .map(|n| node_text(n, source)),
        _ => None,
    }
}

/// Name of the first function or class definition, in breadth-first order.
pub fn first_definition_name(source: &str) -> Result<Option<String>> {
    let tree = parse(source)?;
    let mut queue = VecDeque::from([tree.root_node()]);

    while let Some(node) = queue.pop_front() {
        if let Some(name) = definition_name(node, source) {
            return Ok(Some(name.to_string()));
        }
        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                queue.push_back(child);
            }
        }
    }
    Ok(None)
}

/// Byte span of the top-level definition of `name`, decorators included.
pub fn definition_span(tree: &Tree, source: &str, name: &str) -> Option<Range<usize>> {
    let root = tree.root_node();
    for i in 0..root.named_child_count() {
        let Some(node) = root.named_child(i) else {
            continue;
        };
        let inner = if node.kind() == DECORATED_DEFINITION {
            node.child_by_field_name("definition")
        } else {
            Some(node)
        };
        if inner.and_then(|n| definition_name(n, source)) == Some(name) {
            return Some(node.byte_range());
        }
    }
    None
}

/// Whether `source` defines `name` at top level.
pub fn defines(source: &str, name: &str) -> Result<bool> {
    let tree = parse(source)?;
    Ok(definition_span(&tree, source, name).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"import math
from collections import OrderedDict


@cache
def area(r: float) -> float:
    """Area of a circle."""
    return math.pi * r * r


class Shape:
    pass
"#;

    #[test]
    fn test_first_definition_name_is_breadth_first() {
        let source = "class Outer:\n    def inner(self):\n        pass\n\ndef later():\n    pass\n";
        assert_eq!(first_definition_name(source).unwrap().as_deref(), Some("Outer"));
    }

    #[test]
    fn test_first_definition_name_none_without_definitions() {
        assert_eq!(first_definition_name("x = 1\n").unwrap(), None);
    }

    #[test]
    fn test_definition_span_includes_decorators() {
        let tree = parse(SAMPLE).unwrap();
        let span = definition_span(&tree, SAMPLE, "area").unwrap();
        let text = &SAMPLE[span];
        assert!(text.starts_with("@cache"));
        assert!(text.ends_with("return math.pi * r * r"));
    }

    #[test]
    fn test_definition_span_finds_classes() {
        let tree = parse(SAMPLE).unwrap();
        let span = definition_span(&tree, SAMPLE, "Shape").unwrap();
        assert!(SAMPLE[span].starts_with("class Shape"));
        assert!(definition_span(&tree, SAMPLE, "missing").is_none());
    }

    #[test]
    fn test_parse_strict_reports_line() {
        let err = parse_strict("def broken(:\n    return 1\n").unwrap_err();
        assert!(matches!(err, CopileError::Syntax(msg) if msg.contains("line 1")));
        assert!(parse_strict(SAMPLE).is_ok());
    }
}
