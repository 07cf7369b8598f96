//! Safety Gate - the barrier between a candidate and the cache
//!
//! Three layers, strictly in order, each short-circuiting:
//! 1. module denylist scan
//! 2. function denylist scan
//! 3. semantic review by the oracle
//!
//! The oracle is only consulted once both static scans are clean.

use std::collections::BTreeSet;

use crate::classifier::{self, RiskCategory};
use crate::config::ModelsConfig;
use crate::denylist::DenylistConfig;
use crate::error::{CopileError, Result};
use crate::oracle::Oracle;
use crate::security;
use crate::types::CopileOptions;

/// Pass/fail review of candidate sources
#[derive(Debug, Clone, Copy)]
pub struct SafetyGate<'a> {
    denylists: &'a DenylistConfig,
    oracle: &'a dyn Oracle,
    models: &'a ModelsConfig,
}

impl<'a> SafetyGate<'a> {
    /// Gate using shared denylists and an oracle for the semantic layer
    pub fn new(denylists: &'a DenylistConfig, oracle: &'a dyn Oracle, models: &'a ModelsConfig) -> Self {
        Self {
            denylists,
            oracle,
            models,
        }
    }

    /// Review `candidate` under the per-call overrides in `options`.
    pub async fn review(&self, candidate: &str, options: &CopileOptions) -> Result<()> {
        let modules = security::scan_modules(
            candidate,
            self.denylists.modules.active(&options.module_whitelist),
        );
        if !modules.is_empty() {
            tracing::warn!("Candidate rejected, denylisted modules: {:?}", modules);
            return Err(CopileError::BlacklistedModuleImport {
                candidate: candidate.to_string(),
                modules: modules.into_iter().collect(),
            });
        }

        let functions = security::scan_functions(
            candidate,
            self.denylists.functions.active(&options.function_whitelist),
        )?;
        if !functions.is_empty() {
            tracing::warn!("Candidate rejected, denylisted functions: {:?}", functions);
            return Err(CopileError::BlacklistedFunctionUse {
                candidate: candidate.to_string(),
                functions,
            });
        }

        let labels = classifier::classify(self.oracle, self.models, candidate).await?;
        let issues = remaining_issues(labels, &options.unsafe_overrides);
        if !issues.is_empty() {
            tracing::warn!("Candidate rejected by safety review: {:?}", issues);
            return Err(CopileError::SourceDeemedUnsafe {
                candidate: candidate.to_string(),
                issues,
            });
        }

        tracing::debug!("Candidate passed the safety gate");
        Ok(())
    }
}

/// Labels left after removing overrides and the `NONE` sentinel
pub fn remaining_issues(
    labels: BTreeSet<RiskCategory>,
    overrides: &BTreeSet<RiskCategory>,
) -> BTreeSet<RiskCategory> {
    labels
        .into_iter()
        .filter(|label| *label != RiskCategory::None && !overrides.contains(label))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::denylist::Denylist;
    use crate::oracle::ModelTier;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct FixedReview {
        answer: &'static str,
        calls: AtomicUsize,
    }

    impl FixedReview {
        fn new(answer: &'static str) -> Self {
            Self {
                answer,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Oracle for FixedReview {
        async fn complete(&self, _: &str, _: &str, tier: ModelTier, _: f64) -> Result<String> {
            assert_eq!(tier, ModelTier::Best);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.to_string())
        }
    }

    fn denylists() -> DenylistConfig {
        DenylistConfig {
            modules: Denylist::from_names(["os"]),
            functions: Denylist::from_names(["eval"]),
        }
    }

    #[tokio::test]
    async fn test_import_os_is_rejected() {
        let lists = denylists();
        let oracle = FixedReview::new("NONE");
        let models = ModelsConfig::default();
        let gate = SafetyGate::new(&lists, &oracle, &models);

        let err = gate
            .review("import os\n\ndef f():\n    return 1\n", &CopileOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(&err, CopileError::BlacklistedModuleImport { modules, .. } if modules == &["os"]));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_whitelisted_module_passes() {
        let lists = denylists();
        let oracle = FixedReview::new("NONE");
        let models = ModelsConfig::default();
        let gate = SafetyGate::new(&lists, &oracle, &models);

        gate.review(
            "import os\n\ndef f():\n    return 1\n",
            &CopileOptions::new().allow_module("os"),
        )
        .await
        .unwrap();

        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_function_violation_skips_review() {
        let lists = denylists();
        let oracle = FixedReview::new("NONE");
        let models = ModelsConfig::default();
        let gate = SafetyGate::new(&lists, &oracle, &models);

        let err = gate
            .review("def f(x):\n    return eval(x)\n", &CopileOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(&err, CopileError::BlacklistedFunctionUse { functions, .. } if functions == &["eval"]));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_overridden_risk_passes() {
        let lists = denylists();
        let oracle = FixedReview::new("FILE_WRITE, NONE");
        let models = ModelsConfig::default();
        let gate = SafetyGate::new(&lists, &oracle, &models);

        gate.review(
            "def f():\n    return 1\n",
            &CopileOptions::new().allow_risk(RiskCategory::FileWrite),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_unoverridden_risk_is_rejected() {
        let lists = denylists();
        let oracle = FixedReview::new("FILE_WRITE, SYSTEM_CALL");
        let models = ModelsConfig::default();
        let gate = SafetyGate::new(&lists, &oracle, &models);

        let err = gate
            .review(
                "def f():\n    return 1\n",
                &CopileOptions::new().allow_risk(RiskCategory::FileWrite),
            )
            .await
            .unwrap_err();

        match err {
            CopileError::SourceDeemedUnsafe { issues, candidate } => {
                assert_eq!(issues, [RiskCategory::SystemCall].into_iter().collect());
                assert!(candidate.contains("def f"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unparsable_candidate_is_syntax_error() {
        let lists = denylists();
        let oracle = FixedReview::new("NONE");
        let models = ModelsConfig::default();
        let gate = SafetyGate::new(&lists, &oracle, &models);

        let err = gate
            .review("def f(:\n", &CopileOptions::new())
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_remaining_issues_drops_none_sentinel() {
        let labels = [RiskCategory::None].into_iter().collect();
        assert!(remaining_issues(labels, &BTreeSet::new()).is_empty());
    }
}
