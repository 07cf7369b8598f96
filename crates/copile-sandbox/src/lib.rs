//! Copile Sandbox - Ephemeral execution environment
//!
//! Generated code and external tools (the Python interpreter, formatters)
//! are run as subprocesses inside a throwaway directory, so loading a
//! candidate never touches the caller's working tree.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Isolated working directory, removed on drop
pub struct Sandbox {
    #[allow(dead_code)]
    temp_dir: TempDir,
    /// Root of the sandbox
    pub root_path: PathBuf,
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("root_path", &self.root_path)
            .finish()
    }
}

/// Outcome of a subprocess run
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl Sandbox {
    /// Create an empty sandbox
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix("copile-sandbox-")
            .tempdir()
            .context("Failed to create sandbox directory")?;

        Ok(Self {
            root_path: temp_dir.path().to_path_buf(),
            temp_dir,
        })
    }

    /// Write files (relative to the sandbox root), creating parent directories
    pub fn prepare(&self, files: &[(PathBuf, String)]) -> Result<()> {
        for (path, content) in files {
            let full_path = self.root_path.join(path);
            if let Some(parent) = full_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&full_path, content)
                .with_context(|| format!("Failed to write {}", full_path.display()))?;
        }
        Ok(())
    }

    /// Run a command with the sandbox root as working directory
    pub async fn run(&self, cmd: &str, args: &[String]) -> Result<ExecutionResult> {
        run_in(&self.root_path, cmd, args, None).await
    }

    /// Run a command in the sandbox, feeding `stdin` to the child
    pub async fn run_with_stdin(
        &self,
        cmd: &str,
        args: &[String],
        stdin: &str,
    ) -> Result<ExecutionResult> {
        run_in(&self.root_path, cmd, args, Some(stdin)).await
    }
}

/// Run a command in an arbitrary directory.
///
/// Used for tools that must operate on files in place (formatters).
pub async fn run_in(
    dir: &Path,
    cmd: &str,
    args: &[String],
    stdin: Option<&str>,
) -> Result<ExecutionResult> {
    tracing::debug!("Running `{} {}` in {}", cmd, args.join(" "), dir.display());

    let mut child = Command::new(cmd)
        .args(args)
        .current_dir(dir)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to spawn `{}`", cmd))?;

    if let Some(input) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(input.as_bytes()).await?;
            pipe.shutdown().await?;
        }
    }

    let output = child.wait_with_output().await?;

    Ok(ExecutionResult {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sandbox_lifecycle() -> Result<()> {
        let sandbox = Sandbox::new()?;
        let files = vec![(PathBuf::from("hello.sh"), "echo 'Hello Copile'".to_string())];
        sandbox.prepare(&files)?;

        let res = sandbox.run("sh", &["hello.sh".to_string()]).await?;
        assert!(res.success);
        assert_eq!(res.stdout.trim(), "Hello Copile");

        Ok(())
    }

    #[tokio::test]
    async fn test_stdin_is_forwarded() -> Result<()> {
        let sandbox = Sandbox::new()?;
        let res = sandbox.run_with_stdin("cat", &[], "ping").await?;
        assert!(res.success);
        assert_eq!(res.stdout, "ping");
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_command_is_an_error() {
        let sandbox = Sandbox::new().unwrap();
        let res = sandbox.run("copile-no-such-binary", &[]).await;
        assert!(res.is_err());
    }

    #[test]
    fn test_sandbox_removed_on_drop() {
        let sandbox = Sandbox::new().unwrap();
        let root = sandbox.root_path.clone();
        assert!(root.exists());
        drop(sandbox);
        assert!(!root.exists());
    }
}
