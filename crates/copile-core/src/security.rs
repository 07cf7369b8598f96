//! Static Denylist Scanner
//!
//! Two scans over a candidate before any model looks at it:
//! - imports of denylisted modules, by literal substring on the import syntax
//! - bare-name calls of denylisted functions, by syntax-tree traversal
//!
//! The import scan never resolves modules, so `import osmosis` trips an `os`
//! entry. Callers widen the whitelist to get past a false positive.

use std::collections::BTreeSet;

use serde::Serialize;
use tree_sitter::Node;

use crate::denylist::DenylistConfig;
use crate::error::Result;
use crate::python;

/// Denylisted modules imported by `source`.
pub fn scan_modules<'a, I>(source: &str, denylist: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    denylist
        .into_iter()
        .filter(|module| {
            source.contains(&format!("import {}", module))
                || source.contains(&format!("from {} import", module))
        })
        .map(str::to_string)
        .collect()
}

/// Denylisted functions called by bare name in `source`, sorted.
///
/// Fails with [`CopileError::Syntax`](crate::CopileError::Syntax) when the
/// source does not parse.
pub fn scan_functions<'a, I>(source: &str, denylist: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    let denied: BTreeSet<&str> = denylist.into_iter().collect();
    let tree = python::parse_strict(source)?;

    let mut found = BTreeSet::new();
    find_calls(tree.root_node(), source, &denied, &mut found);
    Ok(found.into_iter().collect())
}

fn find_calls(node: Node<'_>, source: &str, denied: &BTreeSet<&str>, found: &mut BTreeSet<String>) {
    for i in 0..node.child_count() {
        let Some(child) = node.child(i) else {
            continue;
        };
        if child.kind() == "call" {
            if let Some(callee) = child.child_by_field_name("function") {
                if callee.kind() == "identifier" {
                    let name = python::node_text(callee, source);
                    if denied.contains(name) {
                        found.insert(name.to_string());
                    }
                }
            }
        }
        find_calls(child, source, denied, found);
    }
}

/// Both static scans, run without short-circuiting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Denylisted modules imported
    pub modules: Vec<String>,
    /// Denylisted functions called
    pub functions: Vec<String>,
}

impl ScanReport {
    /// No violations in either scan
    pub fn is_clean(&self) -> bool {
        self.modules.is_empty() && self.functions.is_empty()
    }
}

/// Run both scans against the active denylists (denylist minus whitelist).
pub fn scan(
    source: &str,
    denylists: &DenylistConfig,
    module_whitelist: &BTreeSet<String>,
    function_whitelist: &BTreeSet<String>,
) -> Result<ScanReport> {
    let modules = scan_modules(source, denylists.modules.active(module_whitelist));
    let functions = scan_functions(source, denylists.functions.active(function_whitelist))?;
    Ok(ScanReport {
        modules: modules.into_iter().collect(),
        functions,
    })
}
