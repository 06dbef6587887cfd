//! Fluent builders for tier tables and runtimes.
//!
//! Both builders validate on `build()` and report every problem at once,
//! so a misconfigured program fails at startup rather than mid-run.

pub mod error;
pub mod runtime;
pub mod tiers;

pub use error::BuildError;
pub use runtime::RuntimeBuilder;
pub use tiers::TierTableBuilder;
