//! Core state machine types.
//!
//! This module contains the pure pieces the event loop is built from:
//! - The `State` trait and the loop's own `LoopState`
//! - Guard predicates for loop decisions
//! - Execution history with its monotonically increasing size counter

mod guard;
mod history;
mod state;

pub use guard::Guard;
pub use history::{ExecutionHistory, StateTransition};
pub use state::{LoopState, State};
