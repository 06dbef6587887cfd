//! Coordinator backed by the runtime's own registry.

use super::{Admission, RuntimeError, RuntimeInner};
use crate::coordinator::{CoordinationError, Coordinator, StartOutcome};
use crate::customer::{instance_id, CustomerInput};
use crate::signal::Signal;
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Lets an instance start and signal other instances of the same runtime.
///
/// Holds a weak reference so instances never keep their runtime alive.
#[derive(Clone)]
pub struct RuntimeCoordinator {
    inner: Weak<RuntimeInner>,
}

impl RuntimeCoordinator {
    pub(crate) fn new(inner: Weak<RuntimeInner>) -> Self {
        Self { inner }
    }

    fn runtime(&self) -> Result<Arc<RuntimeInner>, CoordinationError> {
        self.inner.upgrade().ok_or(CoordinationError::Unavailable)
    }
}

impl std::fmt::Debug for RuntimeCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeCoordinator")
            .field("available", &(self.inner.strong_count() > 0))
            .finish()
    }
}

#[async_trait]
impl Coordinator for RuntimeCoordinator {
    async fn start(&self, identity: &str, seed: CustomerInput) -> StartOutcome {
        if identity.is_empty() || identity != instance_id(&seed.id) {
            return StartOutcome::OtherError(CoordinationError::InvalidIdentity {
                identity: identity.to_string(),
            });
        }
        let runtime = match self.runtime() {
            Ok(runtime) => runtime,
            Err(e) => return StartOutcome::OtherError(e),
        };

        let outcome = match runtime.admit(seed) {
            Admission::Started(_) => StartOutcome::Started,
            Admission::Active(_) => StartOutcome::AlreadyActiveConflict,
            Admission::Closed => StartOutcome::PermanentlyClosedConflict,
            Admission::Rejected(e) => {
                StartOutcome::OtherError(CoordinationError::InvalidSeed(e.to_string()))
            }
        };
        debug!(identity, ?outcome, "Nested start");
        outcome
    }

    async fn signal(&self, identity: &str, signal: Signal) -> Result<(), CoordinationError> {
        let runtime = self.runtime()?;
        let handle = runtime
            .record(identity)
            .ok_or_else(|| CoordinationError::NotFound {
                identity: identity.to_string(),
            })?;

        handle.signal(signal).map_err(|e| match e {
            RuntimeError::Closed { identity } => CoordinationError::Closed { identity },
            other => CoordinationError::SignalRejected {
                identity: identity.to_string(),
                reason: other.to_string(),
            },
        })
    }
}
