//! Terminal presentation of copile outcomes

use std::collections::BTreeSet;

use colored::*;
use copile_core::{CopileError, RiskCategory};

/// Render names the way they are written in a decorator argument
fn python_list<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = names.into_iter().map(|n| format!("\"{}\"", n)).collect();
    format!("[{}]", quoted.join(", "))
}

fn labels(issues: &BTreeSet<RiskCategory>) -> String {
    python_list(issues.iter().map(|i| i.label()))
}

fn review_before(candidate: &str) -> String {
    format!(
        "Review the generated source before whitelisting. It was:\n{}",
        candidate
    )
}

/// How the user can get past `err`, if anything besides a retry helps
pub fn remediation(err: &CopileError) -> Option<String> {
    match err.root() {
        CopileError::BlacklistedModuleImport { candidate, modules } => Some(format!(
            "If this callable may use {0}, allow it for this callable only with @copile(module_whitelist={0}) or --module-whitelist.\n{1}",
            python_list(modules.iter().map(String::as_str)),
            review_before(candidate)
        )),
        CopileError::BlacklistedFunctionUse {
            candidate,
            functions,
        } => Some(format!(
            "If this callable may call {0}, allow it for this callable only with @copile(function_whitelist={0}) or --function-whitelist.\n{1}",
            python_list(functions.iter().map(String::as_str)),
            review_before(candidate)
        )),
        CopileError::SourceDeemedUnsafe { candidate, issues } => Some(format!(
            "If this behavior is intended, override it for this callable only with @copile(unsafe_overrides={0}) or --allow.\n{1}",
            labels(issues),
            review_before(candidate)
        )),
        CopileError::NeedsModule { module } => {
            Some(format!("Try `pip install {}` and build again.", module))
        }
        CopileError::SpecificationUnclear { .. } => {
            Some("Reword the docstring and build again.".to_string())
        }
        CopileError::MissingCallableName => {
            Some("The decorated block must contain a def or class.".to_string())
        }
        _ => None,
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

/// Print a failure with its remediation
pub fn print_failure(name: &str, err: &CopileError) {
    eprintln!("{} {}: {}", "✗".red(), name.bold(), err);
    if let Some(hint) = remediation(err) {
        eprintln!("{}", hint.dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_hint_names_whitelist() {
        let err = CopileError::BlacklistedModuleImport {
            candidate: "import os".to_string(),
            modules: vec!["os".to_string()],
        };
        let hint = remediation(&err).unwrap();
        assert!(hint.contains("@copile(module_whitelist=[\"os\"])"));
        assert!(hint.ends_with("import os"));
    }

    #[test]
    fn test_unsafe_hint_lists_labels() {
        let err = CopileError::SourceDeemedUnsafe {
            candidate: "def f(): ...".to_string(),
            issues: [RiskCategory::FileWrite, RiskCategory::FileAccess]
                .into_iter()
                .collect(),
        };
        let hint = remediation(&err).unwrap();
        assert!(hint.contains("unsafe_overrides=[\"FILE_ACCESS\", \"FILE_WRITE\"]"));
    }

    #[test]
    fn test_hint_sees_through_context() {
        let err = CopileError::NeedsModule {
            module: "numpy".to_string(),
        }
        .context("Copiling hyp");
        assert_eq!(remediation(&err).unwrap(), "Try `pip install numpy` and build again.");
    }

    #[test]
    fn test_no_hint_for_oracle_failures() {
        assert!(remediation(&CopileError::Oracle("timeout".to_string())).is_none());
    }
}
