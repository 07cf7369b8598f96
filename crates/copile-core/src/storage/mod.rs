//! Storage Layer
//!
//! - `cache`: per-callable cache files
//! - `format`: import hoisting and external formatter hooks

pub mod cache;
pub mod format;

pub use cache::{CacheEntry, CacheStore};
pub use format::{hoist_imports, CommandFormatter, NoopFormatter, SourceFormatter};
