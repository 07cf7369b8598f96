//! copile - generate, review and cache implementations of Python stubs
//!
//! # Usage
//! ```bash
//! copile set-key sk-...
//! copile build funcs.py [--force] [--module-whitelist re,json] [--allow FILE_ACCESS]
//! copile call add 2 3
//! copile scan funcs.co.py
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use copile_core::credentials;
use copile_core::security;
use copile_core::{
    find_decorated_stubs, CopileConfig, CopileOptions, Copiler, DenylistConfig, RiskCategory,
    DEFAULT_CONFIG_FILE,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

mod report;

/// copile - turn documented Python stubs into reviewed implementations
#[derive(Parser)]
#[command(name = "copile", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the oracle API key in the env file
    SetKey {
        /// API key
        key: String,
    },

    /// Generate every @copile stub in a Python file
    Build {
        /// Python file holding the stubs
        file: PathBuf,

        /// Regenerate even when a cached implementation exists
        #[arg(long)]
        force: bool,

        /// Denylisted modules to allow, comma separated
        #[arg(long, value_delimiter = ',')]
        module_whitelist: Vec<String>,

        /// Denylisted functions to allow, comma separated
        #[arg(long, value_delimiter = ',')]
        function_whitelist: Vec<String>,

        /// Risk categories to accept, comma separated (e.g. FILE_ACCESS)
        #[arg(long = "allow", value_delimiter = ',')]
        unsafe_overrides: Vec<String>,
    },

    /// Invoke a cached callable; each argument is a JSON value
    Call {
        /// Callable name
        name: String,

        /// Positional arguments
        args: Vec<String>,
    },

    /// Run the static denylist scans over a Python file
    Scan {
        /// Python file to scan
        file: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = CopileConfig::load_or_default(&cli.config)
        .with_context(|| format!("Loading {}", cli.config.display()))?;
    credentials::load_env(&config.oracle.env_file);

    match cli.command {
        Commands::SetKey { key } => {
            credentials::save_api_key(&config.oracle.env_file, &config.oracle.api_key_env, &key)?;
            report::print_success(&format!(
                "{} saved to {}",
                config.oracle.api_key_env,
                config.oracle.env_file.display()
            ));
        }
        Commands::Build {
            file,
            force,
            module_whitelist,
            function_whitelist,
            unsafe_overrides,
        } => {
            let overrides = CopileOptions {
                force,
                module_whitelist: module_whitelist.into_iter().collect(),
                function_whitelist: function_whitelist.into_iter().collect(),
                unsafe_overrides: unsafe_overrides
                    .iter()
                    .map(|label| label.parse::<RiskCategory>().unwrap_or_else(|never| match never {}))
                    .collect(),
            };
            build(config, &file, &overrides).await?;
        }
        Commands::Call { name, args } => {
            let copiler = Copiler::from_config(config)?;
            let Some(copilation) = copiler.cached(&name)? else {
                bail!("No cached implementation of {}(); run `copile build` first", name);
            };
            let args = parse_args(&args)?;
            let value = copilation.call(&args).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Scan { file, json } => scan(&config, &file, json)?,
    }

    Ok(())
}

/// Static denylist scan of `file`; any violation is an error
fn scan(config: &CopileConfig, file: &Path, json: bool) -> anyhow::Result<()> {
    let denylists = DenylistConfig::load(
        config.module_denylist.as_deref(),
        config.function_denylist.as_deref(),
    )?;
    let source =
        std::fs::read_to_string(file).with_context(|| format!("Reading {}", file.display()))?;
    let scan = security::scan(&source, &denylists, &BTreeSet::new(), &BTreeSet::new())?;

    if json {
        println!("{}", serde_json::to_string(&scan)?);
    } else if scan.is_clean() {
        report::print_success(&format!("{}: no denylisted modules or functions", file.display()));
    } else {
        for module in &scan.modules {
            report::print_warning(&format!("imports denylisted module {}", module));
        }
        for function in &scan.functions {
            report::print_warning(&format!("calls denylisted function {}()", function));
        }
    }

    let violations = scan.modules.len() + scan.functions.len();
    if violations > 0 {
        bail!("{} denylist violation(s) in {}", violations, file.display());
    }
    Ok(())
}

/// Decorator options widened by the command line ones
fn merge(mut options: CopileOptions, overrides: &CopileOptions) -> CopileOptions {
    options.force |= overrides.force;
    options
        .module_whitelist
        .extend(overrides.module_whitelist.iter().cloned());
    options
        .function_whitelist
        .extend(overrides.function_whitelist.iter().cloned());
    options
        .unsafe_overrides
        .extend(overrides.unsafe_overrides.iter().cloned());
    options
}

async fn build(config: CopileConfig, file: &Path, overrides: &CopileOptions) -> anyhow::Result<()> {
    let source =
        std::fs::read_to_string(file).with_context(|| format!("Reading {}", file.display()))?;
    let stubs = find_decorated_stubs(&source)?;
    if stubs.is_empty() {
        report::print_warning(&format!("No @copile stubs in {}", file.display()));
        return Ok(());
    }

    let copiler = Copiler::from_config(config)?;
    let mut failures = 0;

    for stub in stubs {
        let name = stub.spec.callable_name().to_string();
        let options = merge(stub.options, overrides);
        tracing::debug!("Building {}() from line {}", name, stub.line);

        match copiler.copile_specification(&stub.spec, &options).await {
            Ok(Some(copilation)) => {
                report::print_success(&format!("{}() -> {}", name, copilation.path().display()));
            }
            Ok(None) => {
                failures += 1;
                report::print_warning(&format!(
                    "{}() could not be generated after {} attempts",
                    name,
                    copiler.config().max_attempts
                ));
            }
            Err(e) => {
                failures += 1;
                report::print_failure(&name, &e);
            }
        }
    }

    if failures > 0 {
        bail!("{} callable(s) in {} were not copiled", failures, file.display());
    }
    Ok(())
}

fn parse_args(raw: &[String]) -> anyhow::Result<Vec<Value>> {
    raw.iter()
        .map(|arg| {
            serde_json::from_str(arg).with_context(|| format!("Argument `{}` is not valid JSON", arg))
        })
        .collect()
}
