//! Test doubles for the oracle and the runtime

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use copile_core::oracle::prompts;
use copile_core::runtime::check_definition;
use copile_core::{
    CallableRuntime, CopileConfig, CopileError, Copiler, ModelTier, ModelsConfig, Oracle, Result,
};

pub const ADD_STUB: &str = "@copile\ndef add(a: int, b: int) -> int:\n    \"\"\"Return the sum of a and b.\"\"\"\n";

pub const ADD_IMPL: &str = "```python\ndef add(a: int, b: int) -> int:\n    \"\"\"Return the sum of a and b.\"\"\"\n    return a + b\n```";

/// Oracle answering each system instruction from a script
#[derive(Debug)]
pub struct ScriptedOracle {
    clarity: String,
    review: String,
    implementations: Mutex<VecDeque<String>>,
    pub clarity_calls: AtomicUsize,
    pub review_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
    pub generate_tiers: Mutex<Vec<ModelTier>>,
}

impl ScriptedOracle {
    pub fn new<I, S>(implementations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            clarity: "CLEAR".to_string(),
            review: "NONE".to_string(),
            implementations: Mutex::new(implementations.into_iter().map(Into::into).collect()),
            clarity_calls: AtomicUsize::new(0),
            review_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            generate_tiers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_clarity(mut self, answer: &str) -> Self {
        self.clarity = answer.to_string();
        self
    }

    pub fn with_review(mut self, answer: &str) -> Self {
        self.review = answer.to_string();
        self
    }

    pub fn generated(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn clarity_checked(&self) -> usize {
        self.clarity_calls.load(Ordering::SeqCst)
    }

    pub fn reviewed(&self) -> usize {
        self.review_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn complete(&self, _: &str, instruction: &str, tier: ModelTier, _: f64) -> Result<String> {
        if instruction == prompts::ASSESS_SPECIFICATION {
            self.clarity_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(self.clarity.clone());
        }
        if instruction == prompts::REVIEW_SAFETY {
            self.review_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(self.review.clone());
        }
        if instruction == prompts::IMPLEMENT_SPECIFICATION {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            self.generate_tiers.lock().unwrap().push(tier);
            return self
                .implementations
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| CopileError::Oracle("script exhausted".to_string()));
        }
        panic!("unexpected instruction: {}", instruction);
    }
}

/// Runtime that checks definitions without an interpreter
#[derive(Debug, Default)]
pub struct StubRuntime {
    missing_module: Option<String>,
    pub loads: AtomicUsize,
}

impl StubRuntime {
    pub fn missing(module: &str) -> Self {
        Self {
            missing_module: Some(module.to_string()),
            loads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CallableRuntime for StubRuntime {
    async fn load(&self, name: &str, source: &str) -> Result<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(module) = &self.missing_module {
            if source.contains(&format!("import {}", module)) {
                return Err(CopileError::NeedsModule {
                    module: module.clone(),
                });
            }
        }
        check_definition(name, source)
    }

    async fn invoke(&self, path: &Path, name: &str, args: &[Value]) -> Result<Value> {
        Ok(json!({ "file": path.file_name().map(|f| f.to_string_lossy().to_string()), "name": name, "args": args }))
    }
}

pub fn config(dir: &Path) -> CopileConfig {
    CopileConfig::new()
        .with_cache_dir(dir)
        .with_formatters(Vec::new())
}

pub fn copiler_with(
    config: CopileConfig,
    oracle: &Arc<ScriptedOracle>,
    runtime: &Arc<StubRuntime>,
) -> Copiler {
    let oracle: Arc<dyn Oracle> = oracle.clone();
    let runtime: Arc<dyn CallableRuntime> = runtime.clone();
    Copiler::new(config, oracle, runtime).unwrap()
}

pub fn copiler(dir: &Path, oracle: &Arc<ScriptedOracle>) -> Copiler {
    copiler_with(config(dir), oracle, &Arc::new(StubRuntime::default()))
}

pub fn tiny_models(tier: ModelTier) -> ModelsConfig {
    let mut models = ModelsConfig::default();
    match tier {
        ModelTier::Fast => models.fast.max_tokens = 1,
        ModelTier::Best => models.best.max_tokens = 1,
    }
    models
}

pub fn cache_file(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.co.py", name))
}
