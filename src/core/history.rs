//! Execution history tracking.
//!
//! Every execution of a customer instance accumulates history: loop-state
//! transitions plus the outbound calls made by handlers. The accumulated
//! size is what the continuation predicate compares against its threshold.

use super::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Record of a single state transition.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateTransition<S: State> {
    /// The state being transitioned from
    pub from: S,
    /// The state being transitioned to
    pub to: S,
    /// When the transition occurred
    pub timestamp: DateTime<Utc>,
    /// History size right after this transition was recorded
    pub sequence: u64,
}

/// History of one execution.
///
/// The size counter only ever grows. A continuation starts a fresh
/// `ExecutionHistory` rather than shrinking an existing one.
///
/// # Example
///
/// ```rust
/// use loyalty::core::{ExecutionHistory, LoopState};
///
/// let mut history = ExecutionHistory::new();
/// history.record(LoopState::Running, LoopState::Dispatching);
/// history.charge(2);
/// history.record(LoopState::Dispatching, LoopState::Running);
///
/// assert_eq!(history.size(), 4);
/// assert_eq!(history.get_path().len(), 3);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ExecutionHistory<S: State> {
    transitions: Vec<StateTransition<S>>,
    size: u64,
}

impl<S: State> Default for ExecutionHistory<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State> ExecutionHistory<S> {
    /// Create a new empty history.
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
            size: 0,
        }
    }

    /// Record a transition. Costs one unit of history.
    pub fn record(&mut self, from: S, to: S) {
        self.size = self.size.saturating_add(1);
        self.transitions.push(StateTransition {
            from,
            to,
            timestamp: Utc::now(),
            sequence: self.size,
        });
    }

    /// Account for history produced outside of loop-state transitions.
    pub fn charge(&mut self, units: u64) {
        self.size = self.size.saturating_add(units);
    }

    /// Accumulated history size.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get the path of states traversed.
    ///
    /// Returns references to states in order: initial state, then
    /// the `to` state of each transition.
    pub fn get_path(&self) -> Vec<&S> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.first() {
            path.push(&first.from);
        }
        for transition in &self.transitions {
            path.push(&transition.to);
        }
        path
    }

    /// Calculate total duration from first to last transition.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.transitions.first(), self.transitions.last()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    /// Get all transitions.
    pub fn transitions(&self) -> &[StateTransition<S>] {
        &self.transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LoopState;

    #[test]
    fn new_history_is_empty() {
        let history: ExecutionHistory<LoopState> = ExecutionHistory::new();
        assert_eq!(history.size(), 0);
        assert!(history.transitions().is_empty());
        assert!(history.get_path().is_empty());
        assert!(history.duration().is_none());
    }

    #[test]
    fn record_adds_transition_and_unit() {
        let mut history = ExecutionHistory::new();
        history.record(LoopState::Running, LoopState::Dispatching);

        assert_eq!(history.transitions().len(), 1);
        assert_eq!(history.size(), 1);
        assert_eq!(history.transitions()[0].sequence, 1);
    }

    #[test]
    fn charge_grows_size_without_transitions() {
        let mut history: ExecutionHistory<LoopState> = ExecutionHistory::new();
        history.charge(5);
        history.charge(0);

        assert_eq!(history.size(), 5);
        assert!(history.transitions().is_empty());
    }

    #[test]
    fn charge_saturates() {
        let mut history: ExecutionHistory<LoopState> = ExecutionHistory::new();
        history.charge(u64::MAX);
        history.charge(10);

        assert_eq!(history.size(), u64::MAX);
    }

    #[test]
    fn sequence_reflects_charges() {
        let mut history = ExecutionHistory::new();
        history.charge(3);
        history.record(LoopState::Running, LoopState::Dispatching);

        assert_eq!(history.transitions()[0].sequence, 4);
    }

    #[test]
    fn get_path_returns_state_sequence() {
        let mut history = ExecutionHistory::new();
        history.record(LoopState::Running, LoopState::Dispatching);
        history.record(LoopState::Dispatching, LoopState::Completed);

        let path = history.get_path();
        assert_eq!(path.len(), 3);
        assert_eq!(path[0], &LoopState::Running);
        assert_eq!(path[1], &LoopState::Dispatching);
        assert_eq!(path[2], &LoopState::Completed);
    }

    #[test]
    fn history_serializes_correctly() {
        let mut history = ExecutionHistory::new();
        history.record(LoopState::Running, LoopState::Dispatching);
        history.charge(2);

        let json = serde_json::to_string(&history).unwrap();
        let deserialized: ExecutionHistory<LoopState> = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.size(), 3);
        assert_eq!(deserialized.transitions().len(), 1);
    }
}
