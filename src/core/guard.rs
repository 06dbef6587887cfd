//! Guard predicates for controlling loop decisions.
//!
//! Guards are pure boolean functions over a value. The event loop uses them
//! for predicates it re-evaluates after every handler, such as the
//! continuation threshold.

/// Pure predicate over a value of type `T`.
///
/// # Example
///
/// ```rust
/// use loyalty::core::{Guard, LoopState, State};
///
/// let can_dispatch = Guard::new(|state: &LoopState| !state.is_final());
///
/// assert!(can_dispatch.check(&LoopState::Running));
/// assert!(!can_dispatch.check(&LoopState::Completed));
/// ```
pub struct Guard<T> {
    predicate: Box<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T> Guard<T> {
    /// Create a guard from a pure predicate function.
    ///
    /// The predicate must be deterministic and thread-safe (Send + Sync).
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Box::new(predicate),
        }
    }

    /// Evaluate the predicate.
    pub fn check(&self, value: &T) -> bool {
        (self.predicate)(value)
    }
}

impl<T> std::fmt::Debug for Guard<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ExecutionHistory, LoopState, State};

    #[test]
    fn guard_allows_matching_states() {
        let guard = Guard::new(|s: &LoopState| matches!(s, LoopState::Running));

        assert!(guard.check(&LoopState::Running));
        assert!(!guard.check(&LoopState::Dispatching));
    }

    #[test]
    fn guard_checks_non_error_states() {
        let guard = Guard::new(|s: &LoopState| !s.is_error());

        assert!(guard.check(&LoopState::Running));
        assert!(guard.check(&LoopState::Completed));
        assert!(!guard.check(&LoopState::Failed));
    }

    #[test]
    fn guard_is_deterministic() {
        let guard = Guard::new(|s: &LoopState| !s.is_final());

        let result1 = guard.check(&LoopState::Dispatching);
        let result2 = guard.check(&LoopState::Dispatching);

        assert_eq!(result1, result2);
    }

    #[test]
    fn guard_over_history_size() {
        let threshold = 3;
        let guard = Guard::new(move |h: &ExecutionHistory<LoopState>| h.size() >= threshold);

        let mut history = ExecutionHistory::new();
        history.charge(2);
        assert!(!guard.check(&history));

        history.record(LoopState::Running, LoopState::Dispatching);
        assert!(guard.check(&history));
    }
}
