//! Copile Core - safety-reviewed code generation from specifications
//!
//! A specification is a Python prototype plus docstring. Copile asks a
//! language model for an implementation, reviews the candidate, and caches
//! the accepted source so later runs never call the model again.
//!
//! # Architecture
//!
//! 1. **Safety gate** (`guardrail`): module denylist, function denylist,
//!    then the model-backed risk classifier
//! 2. **Clarity check** (`clarity`): an unclear specification aborts before
//!    any generation attempt
//! 3. **Generation loop** (`generation`): bounded attempts, retrying only
//!    malformed candidates
//! 4. **Cache store** (`storage`): one `<name>.co.py` per callable, rewritten
//!    in place
//! 5. **Runtime** (`runtime`): loads and invokes generated code in a Python
//!    subprocess
//!
//! # Quick Start
//!
//! ```no_run
//! use copile_core::{CopileConfig, CopileOptions, Copiler};
//!
//! # async fn run() -> copile_core::Result<()> {
//! let copiler = Copiler::from_config(CopileConfig::default())?;
//!
//! let stub = r#"@copile
//! def add(a: int, b: int) -> int:
//!     """Return the sum of a and b."""
//! "#;
//!
//! if let Some(add) = copiler.copile(stub, &CopileOptions::new()).await? {
//!     let sum = add.call(&[2.into(), 3.into()]).await?;
//!     println!("{}", sum);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod clarity;
pub mod classifier;
pub mod config;
pub mod credentials;
pub mod decorator;
pub mod denylist;
pub mod error;
pub mod generation;
pub mod guardrail;
pub mod oracle;
pub mod orchestrator;
pub mod python;
pub mod runtime;
pub mod security;
pub mod storage;
pub mod types;

pub use classifier::RiskCategory;
pub use config::{CopileConfig, ModelSpec, ModelsConfig, OracleSettings, DEFAULT_CONFIG_FILE};
pub use decorator::{find_decorated_stubs, DecoratedStub};
pub use denylist::{Denylist, DenylistConfig};
pub use error::{CopileError, Result, ResultExt};
pub use oracle::{BudgetedOracle, ModelTier, OpenAICompatibleOracle, Oracle};
pub use orchestrator::Copiler;
pub use runtime::{CallableRuntime, Copilation, PythonRuntime};
pub use storage::{CacheEntry, CacheStore};
pub use types::{CopileOptions, Specification};

/// Version of the copile-core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the copile-core crate
pub const NAME: &str = env!("CARGO_PKG_NAME");
