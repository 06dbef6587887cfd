//! Core State trait and the event loop's own states.
//!
//! All state machine states implement this trait, which provides
//! pure methods for inspecting state properties without side effects.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for state machine states.
///
/// All methods are pure - no side effects. States represent immutable
/// values that describe the current position in a state machine.
///
/// # Required Traits
///
/// - `Clone`: States must be cloneable for history tracking
/// - `PartialEq`: States must be comparable for transition logic
/// - `Debug`: States must be debuggable for diagnostics
/// - `Serialize` + `Deserialize`: States must be serializable for persistence
pub trait State:
    Clone + PartialEq + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync
{
    /// Get the state's name for display/logging.
    fn name(&self) -> &str;

    /// Check if this is a final (terminal) state.
    ///
    /// Default implementation returns `false`.
    fn is_final(&self) -> bool {
        false
    }

    /// Check if this is an error state.
    ///
    /// Default implementation returns `false`.
    fn is_error(&self) -> bool {
        false
    }
}

/// Position of a customer instance's event loop.
///
/// ```rust
/// use loyalty::core::{LoopState, State};
///
/// assert!(LoopState::Running.accepts_signals());
/// assert!(LoopState::Continuing.is_final());
/// assert!(LoopState::Failed.is_error());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum LoopState {
    /// Awaiting the next inbound event.
    Running,
    /// Inside a handler; not preemptible.
    Dispatching,
    /// This execution is over and a relaunch with carried-over state was requested.
    Continuing,
    /// The account is closed.
    Completed,
    /// An unrecoverable error aborted the loop.
    Failed,
}

impl LoopState {
    /// Whether signal and query handlers registered at the top of the loop are live.
    pub fn accepts_signals(&self) -> bool {
        matches!(self, Self::Running | Self::Dispatching)
    }
}

impl State for LoopState {
    fn name(&self) -> &str {
        match self {
            Self::Running => "Running",
            Self::Dispatching => "Dispatching",
            Self::Continuing => "Continuing",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    /// `Continuing` is terminal for the current execution only.
    fn is_final(&self) -> bool {
        matches!(self, Self::Continuing | Self::Completed | Self::Failed)
    }

    fn is_error(&self) -> bool {
        matches!(self, Self::Failed)
    }
}
