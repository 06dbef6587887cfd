//! Instance Coordinator: how one instance starts or signals another.
//!
//! Starts use reject-duplicate semantics. An identity that is currently
//! running yields [`StartOutcome::AlreadyActiveConflict`]; one whose last run
//! has closed (for any reason) yields
//! [`StartOutcome::PermanentlyClosedConflict`]. A closed identity is never
//! restarted.

use crate::customer::CustomerInput;
use crate::signal::Signal;
use crate::tier::TierRef;
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Coordination failures other than the two start conflicts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinationError {
    #[error("Invalid instance identity '{identity}'")]
    InvalidIdentity { identity: String },

    #[error("Invalid seed input: {0}")]
    InvalidSeed(String),

    #[error("Coordinator is no longer available")]
    Unavailable,

    #[error("No instance named '{identity}'")]
    NotFound { identity: String },

    #[error("Instance '{identity}' has already closed")]
    Closed { identity: String },

    #[error("Signal to '{identity}' was rejected: {reason}")]
    SignalRejected { identity: String, reason: String },
}

/// Result of attempting to start an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyActiveConflict,
    PermanentlyClosedConflict,
    OtherError(CoordinationError),
}

#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Start `identity` from `seed` unless an instance with that identity
    /// has ever existed.
    async fn start(&self, identity: &str, seed: CustomerInput) -> StartOutcome;

    /// Deliver a signal to a running instance.
    async fn signal(&self, identity: &str, signal: Signal) -> Result<(), CoordinationError>;

    /// Start `identity` if absent, then make sure it sits at `minimum` or
    /// higher. Fresh and running instances both receive the ratchet signal,
    /// so re-inviting an existing guest re-promotes it. Closed instances
    /// report `PermanentlyClosedConflict` and are not signaled.
    async fn start_and_promote(
        &self,
        identity: &str,
        seed: CustomerInput,
        minimum: TierRef,
    ) -> StartOutcome {
        let outcome = self.start(identity, seed).await;
        if !matches!(
            outcome,
            StartOutcome::Started | StartOutcome::AlreadyActiveConflict
        ) {
            return outcome;
        }

        debug!(identity, ?outcome, minimum = minimum.0, "Signaling minimum status");
        match self
            .signal(identity, Signal::EnsureMinimumStatus(minimum))
            .await
        {
            Ok(()) => outcome,
            // Closed between the start attempt and the signal.
            Err(CoordinationError::Closed { .. }) => StartOutcome::PermanentlyClosedConflict,
            Err(e) => StartOutcome::OtherError(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Scripted {
        start: StartOutcome,
        signal: Result<(), CoordinationError>,
        signals: Mutex<Vec<(String, Signal)>>,
    }

    impl Scripted {
        fn new(start: StartOutcome, signal: Result<(), CoordinationError>) -> Self {
            Self {
                start,
                signal,
                signals: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Coordinator for Scripted {
        async fn start(&self, _identity: &str, _seed: CustomerInput) -> StartOutcome {
            self.start.clone()
        }

        async fn signal(&self, identity: &str, signal: Signal) -> Result<(), CoordinationError> {
            self.signals.lock().push((identity.to_string(), signal));
            self.signal.clone()
        }
    }

    fn seed() -> CustomerInput {
        CustomerInput::guest("g1", TierRef(1))
    }

    #[tokio::test]
    async fn fresh_start_is_also_ratcheted() {
        let c = Scripted::new(StartOutcome::Started, Ok(()));

        let outcome = c.start_and_promote("customer-g1", seed(), TierRef(1)).await;

        assert_eq!(outcome, StartOutcome::Started);
        assert_eq!(c.signals.lock().len(), 1);
    }

    #[tokio::test]
    async fn unexpected_signal_failure_is_other_error() {
        let c = Scripted::new(StartOutcome::Started, Err(CoordinationError::Unavailable));

        let outcome = c.start_and_promote("customer-g1", seed(), TierRef(1)).await;
        assert_eq!(
            outcome,
            StartOutcome::OtherError(CoordinationError::Unavailable)
        );
    }

    #[tokio::test]
    async fn running_instance_is_ratcheted() {
        let c = Scripted::new(StartOutcome::AlreadyActiveConflict, Ok(()));

        let outcome = c.start_and_promote("customer-g1", seed(), TierRef(2)).await;

        assert_eq!(outcome, StartOutcome::AlreadyActiveConflict);
        assert_eq!(
            *c.signals.lock(),
            vec![(
                "customer-g1".to_string(),
                Signal::EnsureMinimumStatus(TierRef(2))
            )]
        );
    }

    #[tokio::test]
    async fn closed_during_signal_is_permanent_conflict() {
        let c = Scripted::new(
            StartOutcome::AlreadyActiveConflict,
            Err(CoordinationError::Closed {
                identity: "customer-g1".into(),
            }),
        );

        let outcome = c.start_and_promote("customer-g1", seed(), TierRef(1)).await;
        assert_eq!(outcome, StartOutcome::PermanentlyClosedConflict);
    }

    #[tokio::test]
    async fn closed_instance_is_not_signaled() {
        let c = Scripted::new(StartOutcome::PermanentlyClosedConflict, Ok(()));

        let outcome = c.start_and_promote("customer-g1", seed(), TierRef(1)).await;

        assert_eq!(outcome, StartOutcome::PermanentlyClosedConflict);
        assert!(c.signals.lock().is_empty());
    }
}
