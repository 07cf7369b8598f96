//! Copiler - the entry point tying the pipeline together
//!
//! Owns the configuration, the denylists (loaded once), the oracle behind
//! its size guard, the runtime and the cache. Every request runs the same
//! sequence: cache lookup, clarity check, generation attempts.

use std::sync::Arc;

use crate::config::CopileConfig;
use crate::denylist::DenylistConfig;
use crate::error::Result;
use crate::generation::GenerationLoop;
use crate::guardrail::SafetyGate;
use crate::oracle::{BudgetedOracle, OpenAICompatibleOracle, Oracle};
use crate::runtime::{CallableRuntime, Copilation, PythonRuntime};
use crate::storage::{CacheStore, CommandFormatter};
use crate::types::{CopileOptions, Specification};

/// Turns specifications into cached, safety-reviewed callables
#[derive(Debug)]
pub struct Copiler {
    config: CopileConfig,
    denylists: DenylistConfig,
    oracle: Arc<dyn Oracle>,
    runtime: Arc<dyn CallableRuntime>,
    cache: CacheStore,
}

impl Copiler {
    /// Build the production pipeline: HTTP oracle, Python runtime and the
    /// configured formatters.
    pub fn from_config(config: CopileConfig) -> Result<Self> {
        let oracle: Arc<dyn Oracle> = Arc::new(OpenAICompatibleOracle::from_config(&config));
        let runtime: Arc<dyn CallableRuntime> = Arc::new(PythonRuntime::new(config.python.clone()));
        Self::new(config, oracle, runtime)
    }

    /// Pipeline around a caller-supplied oracle and runtime.
    ///
    /// The oracle is wrapped in the size guard for the configured models.
    pub fn new(
        config: CopileConfig,
        oracle: Arc<dyn Oracle>,
        runtime: Arc<dyn CallableRuntime>,
    ) -> Result<Self> {
        config.validate()?;
        let denylists = DenylistConfig::load(
            config.module_denylist.as_deref(),
            config.function_denylist.as_deref(),
        )?;
        let cache = CacheStore::new(config.cache_dir.clone())
            .with_formatter(Arc::new(CommandFormatter::new(config.formatters.clone())));
        let oracle: Arc<dyn Oracle> = Arc::new(BudgetedOracle::new(oracle, config.models.clone()));

        tracing::debug!(
            "Copiler ready: {} denied modules, {} denied functions, cache in {}",
            denylists.modules.len(),
            denylists.functions.len(),
            cache.dir().display()
        );

        Ok(Self {
            config,
            denylists,
            oracle,
            runtime,
            cache,
        })
    }

    /// Replace the denylists loaded from configuration
    pub fn with_denylists(mut self, denylists: DenylistConfig) -> Self {
        self.denylists = denylists;
        self
    }

    /// Replace the cache store
    pub fn with_cache(mut self, cache: CacheStore) -> Self {
        self.cache = cache;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &CopileConfig {
        &self.config
    }

    /// Denylists enforced by the safety gate
    pub fn denylists(&self) -> &DenylistConfig {
        &self.denylists
    }

    /// Cache store
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Copile a decorated stub; its first line is the decorator and is dropped.
    pub async fn copile(&self, stub: &str, options: &CopileOptions) -> Result<Option<Copilation>> {
        let spec = Specification::from_stub(stub)?;
        self.copile_specification(&spec, options).await
    }

    /// Copile an already extracted specification.
    ///
    /// `Ok(None)` means every attempt produced a malformed candidate; the
    /// last one has been logged.
    pub async fn copile_specification(
        &self,
        spec: &Specification,
        options: &CopileOptions,
    ) -> Result<Option<Copilation>> {
        let gate = SafetyGate::new(&self.denylists, self.oracle.as_ref(), &self.config.models);
        let generation = GenerationLoop::new(
            self.oracle.as_ref(),
            &self.config.models,
            gate,
            Arc::clone(&self.runtime),
            &self.cache,
            self.config.max_attempts,
        );
        generation.run(spec, options).await
    }

    /// The cached callable `name`, without generating anything
    pub fn cached(&self, name: &str) -> Result<Option<Copilation>> {
        Ok(self.cache.load(name)?.map(|entry| {
            Copilation::new(entry.name, entry.source, entry.path, Arc::clone(&self.runtime))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::denylist::Denylist;
    use crate::error::CopileError;
    use crate::oracle::ModelTier;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::path::Path;

    #[derive(Debug)]
    struct Silent;

    #[async_trait]
    impl Oracle for Silent {
        async fn complete(&self, _: &str, _: &str, _: ModelTier, _: f64) -> Result<String> {
            Ok(String::new())
        }
    }

    #[derive(Debug)]
    struct Echo;

    #[async_trait]
    impl CallableRuntime for Echo {
        async fn load(&self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }

        async fn invoke(&self, _: &Path, name: &str, args: &[Value]) -> Result<Value> {
            Ok(json!({ "name": name, "args": args }))
        }
    }

    fn copiler(dir: &Path) -> Copiler {
        let config = CopileConfig::new()
            .with_cache_dir(dir)
            .with_formatters(Vec::new());
        Copiler::new(config, Arc::new(Silent), Arc::new(Echo)).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = CopileConfig::new().with_max_attempts(0);
        let err = Copiler::new(config, Arc::new(Silent), Arc::new(Echo)).unwrap_err();
        assert!(matches!(err, CopileError::Config(_)));
    }

    #[test]
    fn test_builtin_denylists_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let copiler = copiler(dir.path());
        assert!(copiler.denylists().modules.contains("os"));
        assert!(copiler.denylists().functions.contains("eval"));

        let copiler = copiler.with_denylists(DenylistConfig {
            modules: Denylist::from_names(["socket"]),
            functions: Denylist::default(),
        });
        assert!(!copiler.denylists().modules.contains("os"));
    }

    #[tokio::test]
    async fn test_cached_binds_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let copiler = copiler(dir.path());
        assert!(copiler.cached("add").unwrap().is_none());

        std::fs::write(
            copiler.cache().path_for("add"),
            "def add(a, b):\n    return a + b\n",
        )
        .unwrap();

        let add = copiler.cached("add").unwrap().unwrap();
        let value = add.call(&[json!(1), json!(2)]).await.unwrap();
        assert_eq!(value, json!({ "name": "add", "args": [1, 2] }));
    }

    #[tokio::test]
    async fn test_stub_without_definition() {
        let dir = tempfile::tempdir().unwrap();
        let copiler = copiler(dir.path());
        let err = copiler
            .copile("@copile\nx = 1\n", &CopileOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CopileError::MissingCallableName));
    }
}
