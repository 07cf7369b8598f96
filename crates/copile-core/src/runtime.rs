//! Runtime - from source text to a live callable
//!
//! Generated code is Python and runs in a separate interpreter process. The
//! rest of the crate only sees [`CallableRuntime`] and [`Copilation`], never
//! how the interpreter is driven.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use copile_sandbox::Sandbox;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::{CopileError, Result};
use crate::python;

lazy_static! {
    static ref MISSING_MODULE: Regex = Regex::new(r"No module named '([^']+)'").unwrap();
}

/// Exit status the load script uses for an unresolvable import
const EXIT_MISSING_MODULE: i32 = 3;
/// Exit status the load script uses when the name is absent or not callable
const EXIT_NOT_CALLABLE: i32 = 4;

/// Result file written by the invoke script, relative to the sandbox root
const RESULT_FILE: &str = "result.json";

const LOAD_SCRIPT: &str = r#"import importlib.util
import sys

path, name = sys.argv[1], sys.argv[2]
spec = importlib.util.spec_from_file_location("candidate", path)
module = importlib.util.module_from_spec(spec)
try:
    spec.loader.exec_module(module)
except ModuleNotFoundError as e:
    sys.stderr.write(e.name or "")
    sys.exit(3)
if not callable(getattr(module, name, None)):
    sys.exit(4)
"#;

const INVOKE_SCRIPT: &str = r#"import importlib.util
import json
import sys

path, name, result_path = sys.argv[1], sys.argv[2], sys.argv[3]
spec = importlib.util.spec_from_file_location("copilation", path)
module = importlib.util.module_from_spec(spec)
spec.loader.exec_module(module)
args = json.loads(sys.stdin.read() or "[]")
result = getattr(module, name)(*args)
with open(result_path, "w") as out:
    json.dump(result, out, default=repr)
"#;

/// Turns candidates into callables and invokes cached ones
#[async_trait]
pub trait CallableRuntime: Send + Sync + std::fmt::Debug {
    /// Check that `source` yields a callable named `name`.
    ///
    /// Fails with `NeedsModule` for an unresolvable import, and with a
    /// transient error when the candidate does not parse or does not
    /// define `name`.
    async fn load(&self, name: &str, source: &str) -> Result<()>;

    /// Call `name` from the module at `path` with positional JSON arguments
    async fn invoke(&self, path: &Path, name: &str, args: &[Value]) -> Result<Value>;
}

/// Checks that need no interpreter: the source parses and defines `name`.
pub fn check_definition(name: &str, source: &str) -> Result<()> {
    let tree = python::parse_strict(source)?;
    if python::definition_span(&tree, source, name).is_none() {
        return Err(CopileError::MalformedCandidate(format!(
            "does not define `{}`",
            name
        )));
    }
    Ok(())
}

/// Runtime backed by a Python interpreter subprocess
#[derive(Debug, Clone)]
pub struct PythonRuntime {
    python: String,
}

impl Default for PythonRuntime {
    fn default() -> Self {
        Self::new("python3")
    }
}

impl PythonRuntime {
    /// Use the interpreter at `python`
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
        }
    }

    /// Interpreter command
    pub fn python(&self) -> &str {
        &self.python
    }
}

fn missing_module(stderr: &str) -> Option<String> {
    MISSING_MODULE
        .captures_iter(stderr)
        .last()
        .map(|c| c[1].to_string())
}

fn last_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("interpreter failed without output")
        .trim()
        .to_string()
}

/// Pass through whatever the callable itself printed
fn forward_output(stdout: &str, stderr: &str) -> Result<()> {
    if !stdout.is_empty() {
        let mut out = std::io::stdout().lock();
        out.write_all(stdout.as_bytes())?;
        out.flush()?;
    }
    if !stderr.is_empty() {
        tracing::debug!("Interpreter stderr:\n{}", stderr.trim_end());
    }
    Ok(())
}

#[async_trait]
impl CallableRuntime for PythonRuntime {
    async fn load(&self, name: &str, source: &str) -> Result<()> {
        check_definition(name, source)?;

        let sandbox = Sandbox::new().map_err(|e| CopileError::Runtime(format!("{:#}", e)))?;
        sandbox
            .prepare(&[
                (PathBuf::from("candidate.py"), source.to_string()),
                (PathBuf::from("load.py"), LOAD_SCRIPT.to_string()),
            ])
            .map_err(|e| CopileError::Runtime(format!("{:#}", e)))?;

        let args = vec![
            "load.py".to_string(),
            "candidate.py".to_string(),
            name.to_string(),
        ];

        let result = sandbox
            .run(&self.python, &args)
            .await
            .map_err(|e| CopileError::Runtime(format!("{:#}", e)))?;

        if result.success {
            return Ok(());
        }
        if result.exit_code == EXIT_MISSING_MODULE {
            let module = match result.stderr.trim() {
                "" => missing_module(&result.stderr).unwrap_or_else(|| "unknown".to_string()),
                named => named.to_string(),
            };
            return Err(CopileError::NeedsModule { module });
        }
        if result.exit_code == EXIT_NOT_CALLABLE {
            return Err(CopileError::MalformedCandidate(format!(
                "`{}` is not callable after loading",
                name
            )));
        }
        if let Some(module) = missing_module(&result.stderr) {
            return Err(CopileError::NeedsModule { module });
        }
        Err(CopileError::MalformedCandidate(last_line(&result.stderr)))
    }

    async fn invoke(&self, path: &Path, name: &str, args: &[Value]) -> Result<Value> {
        let absolute = std::fs::canonicalize(path)?;
        let sandbox = Sandbox::new().map_err(|e| CopileError::Runtime(format!("{:#}", e)))?;
        sandbox
            .prepare(&[(PathBuf::from("invoke.py"), INVOKE_SCRIPT.to_string())])
            .map_err(|e| CopileError::Runtime(format!("{:#}", e)))?;

        let script_args = vec![
            "invoke.py".to_string(),
            absolute.to_string_lossy().to_string(),
            name.to_string(),
            RESULT_FILE.to_string(),
        ];
        let stdin = serde_json::to_string(args)?;

        let result = sandbox
            .run_with_stdin(&self.python, &script_args, &stdin)
            .await
            .map_err(|e| CopileError::Runtime(format!("{:#}", e)))?;

        forward_output(&result.stdout, &result.stderr)?;
        if !result.success {
            return Err(CopileError::Runtime(format!(
                "{}() failed: {}",
                name,
                last_line(&result.stderr)
            )));
        }

        let encoded = std::fs::read_to_string(sandbox.root_path.join(RESULT_FILE))
            .map_err(|e| CopileError::Runtime(format!("{}() left no result: {}", name, e)))?;
        Ok(serde_json::from_str(&encoded)?)
    }
}

/// A live callable bound to a cached implementation
#[derive(Debug, Clone)]
pub struct Copilation {
    name: String,
    source: String,
    path: PathBuf,
    runtime: Arc<dyn CallableRuntime>,
}

impl Copilation {
    /// Bind `name` in the cache file at `path`
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        path: impl Into<PathBuf>,
        runtime: Arc<dyn CallableRuntime>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            path: path.into(),
            runtime,
        }
    }

    /// Callable name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source the callable was bound from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Cache file holding the implementation
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Invoke with positional JSON arguments
    pub async fn call(&self, args: &[Value]) -> Result<Value> {
        tracing::debug!("Calling {}() from {}", self.name, self.path.display());
        self.runtime.invoke(&self.path, &self.name, args).await
    }
}
