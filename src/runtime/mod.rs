//! In-process stand-in for the durable execution substrate.
//!
//! The [`Runtime`] keeps a registry of instances keyed by instance identity,
//! spawns one task per logical instance, delivers signals and cancellation,
//! relaunches an instance when it continues as new, and enforces the
//! reject-duplicate start policy. Records of closed instances are retained
//! so they stay queryable and can never be restarted.
//!
//! Starting instances spawns tokio tasks and must happen inside a tokio
//! runtime.

mod coordinator;

pub use coordinator::RuntimeCoordinator;

use crate::checkpoint::ContinuationCheckpoint;
use crate::config::{ConfigError, LoyaltyConfig};
use crate::customer::{instance_id, CustomerInput, CustomerState, StatusSnapshot};
use crate::effects::{
    instance_channels, CustomerMachine, ExecutionOutcome, InstanceChannels, InstancePorts, Launch,
    MachineContext, MachineError,
};
use crate::notify::{NotificationGateway, Notifier, RetryPolicy};
use crate::signal::{CloseReason, Signal};
use crate::tier::{TierError, TierRef, TierTable};
use crate::validation::ValidationErrors;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("No instance for customer '{customer_id}'")]
    NotFound { customer_id: String },

    #[error("Instance '{identity}' is already running")]
    AlreadyRunning { identity: String },

    #[error("Instance '{identity}' has closed")]
    Closed { identity: String },

    #[error("Invalid customer input: {0}")]
    Invalid(ValidationErrors),

    #[error(transparent)]
    Tier(#[from] TierError),

    #[error(transparent)]
    Machine(#[from] MachineError),
}

/// Externally visible status of a logical instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceStatus {
    Running,
    Completed(CloseReason),
    Failed(String),
}

impl InstanceStatus {
    pub fn is_closed(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Completed(reason) => write!(f, "completed ({reason})"),
            Self::Failed(message) => write!(f, "failed: {message}"),
        }
    }
}

/// Progress of a logical instance across its runs.
#[derive(Debug, Clone)]
struct Lifecycle {
    run_id: Uuid,
    continuations: u32,
    outcome: Option<ExecutionOutcome>,
}

impl Lifecycle {
    fn status(&self) -> InstanceStatus {
        match &self.outcome {
            None | Some(ExecutionOutcome::ContinuedAsNew(_)) => InstanceStatus::Running,
            Some(ExecutionOutcome::Completed(reason)) => InstanceStatus::Completed(*reason),
            Some(ExecutionOutcome::Failed(e)) => InstanceStatus::Failed(e.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
struct InstanceRecord {
    ports: InstancePorts,
    lifecycle: watch::Receiver<Lifecycle>,
}

impl InstanceRecord {
    fn is_closed(&self) -> bool {
        self.lifecycle.borrow().outcome.is_some()
    }
}

/// Result of asking the registry to start an identity.
pub(crate) enum Admission {
    Started(InstanceHandle),
    Active(InstanceHandle),
    Closed,
    Rejected(MachineError),
}

pub(crate) struct RuntimeInner {
    tiers: Arc<TierTable>,
    history_threshold: u64,
    notifier: Notifier,
    instances: Mutex<HashMap<String, InstanceRecord>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RuntimeInner {
    /// Reject-duplicate start of `input` under its own identity.
    pub(crate) fn admit(self: &Arc<Self>, input: CustomerInput) -> Admission {
        let identity = instance_id(&input.id);
        let mut instances = self.instances.lock();

        if let Some(record) = instances.get(&identity) {
            if record.is_closed() {
                return Admission::Closed;
            }
            return Admission::Active(self.handle_for(&identity, record.clone()));
        }

        let ctx = MachineContext {
            tiers: self.tiers.clone(),
            notifier: self.notifier.clone(),
            coordinator: Arc::new(RuntimeCoordinator::new(Arc::downgrade(self))),
            history_threshold: self.history_threshold,
        };
        let machine = match CustomerMachine::new(ctx, Launch::Genesis(input)) {
            Ok(machine) => machine,
            Err(e) => return Admission::Rejected(e),
        };

        let (channels, ports) = instance_channels(machine.customer().clone());
        let (lifecycle_tx, lifecycle_rx) = watch::channel(Lifecycle {
            run_id: machine.run_id(),
            continuations: 0,
            outcome: None,
        });
        let record = InstanceRecord {
            ports,
            lifecycle: lifecycle_rx,
        };
        instances.insert(identity.clone(), record.clone());
        drop(instances);

        info!(identity = %identity, "Starting instance");
        let span = tracing::debug_span!("instance", identity = %identity);
        let task = tokio::spawn(drive(machine, channels, lifecycle_tx).instrument(span));
        self.tasks.lock().push(task);

        Admission::Started(self.handle_for(&identity, record))
    }

    pub(crate) fn record(&self, identity: &str) -> Option<InstanceHandle> {
        let record = self.instances.lock().get(identity).cloned()?;
        Some(self.handle_for(identity, record))
    }

    fn handle_for(&self, identity: &str, record: InstanceRecord) -> InstanceHandle {
        InstanceHandle {
            identity: identity.to_string(),
            tiers: self.tiers.clone(),
            record,
        }
    }
}

impl Drop for RuntimeInner {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

/// Relaunch the machine on every continuation until a terminal outcome.
async fn drive(
    mut machine: CustomerMachine,
    mut channels: InstanceChannels,
    lifecycle: watch::Sender<Lifecycle>,
) {
    loop {
        let ctx = machine.context().clone();
        let checkpoint = match machine.run(&mut channels).await {
            ExecutionOutcome::ContinuedAsNew(checkpoint) => checkpoint,
            terminal => {
                lifecycle.send_modify(|l| l.outcome = Some(terminal));
                return;
            }
        };

        let next = checkpoint
            .to_bytes()
            .and_then(|bytes| ContinuationCheckpoint::from_bytes(&bytes))
            .map_err(MachineError::from)
            .and_then(|checkpoint| CustomerMachine::new(ctx, Launch::Continuation(checkpoint)));

        match next {
            Ok(next) => {
                debug!(run_id = %next.run_id(), generation = next.generation(), "Continued as new run");
                lifecycle.send_modify(|l| {
                    l.run_id = next.run_id();
                    l.continuations += 1;
                });
                machine = next;
            }
            Err(e) => {
                error!(error = %e, "Failed to resume from continuation checkpoint");
                lifecycle.send_modify(|l| l.outcome = Some(ExecutionOutcome::Failed(e)));
                return;
            }
        }
    }
}

/// Address of one logical instance.
#[derive(Debug, Clone)]
pub struct InstanceHandle {
    identity: String,
    tiers: Arc<TierTable>,
    record: InstanceRecord,
}

impl InstanceHandle {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Deliver a signal. Fails once the instance has closed; a minimum status
    /// naming an unknown tier is rejected before it is queued.
    pub fn signal(&self, signal: Signal) -> Result<(), RuntimeError> {
        if let Signal::EnsureMinimumStatus(tier) = &signal {
            self.tiers.get(*tier)?;
        }
        if self.record.is_closed() {
            return Err(self.closed());
        }
        self.record
            .ports
            .signals
            .send(signal)
            .map_err(|_| self.closed())
    }

    pub fn add_points(&self, delta: i64) -> Result<(), RuntimeError> {
        self.signal(Signal::AddPoints(delta))
    }

    pub fn invite_guest(&self, guest_id: impl Into<String>) -> Result<(), RuntimeError> {
        self.signal(Signal::InviteGuest(guest_id.into()))
    }

    pub fn ensure_minimum_status(&self, tier: TierRef) -> Result<(), RuntimeError> {
        self.signal(Signal::EnsureMinimumStatus(tier))
    }

    pub fn cancel_account(&self) -> Result<(), RuntimeError> {
        self.signal(Signal::CancelAccount)
    }

    /// Request cancellation. Idempotent; a no-op after the instance closed.
    pub fn cancel(&self) {
        self.record.ports.cancel.send_replace(true);
    }

    /// `getStatus` query.
    pub fn status(&self) -> StatusSnapshot {
        self.record.ports.status.borrow().snapshot()
    }

    /// `getGuests` query.
    pub fn guests(&self) -> Vec<String> {
        self.record.ports.status.borrow().guests()
    }

    pub fn describe(&self) -> InstanceStatus {
        self.record.lifecycle.borrow().status()
    }

    pub fn run_id(&self) -> Uuid {
        self.record.lifecycle.borrow().run_id
    }

    pub fn continuations(&self) -> u32 {
        self.record.lifecycle.borrow().continuations
    }

    /// Wait for the final outcome of the logical instance.
    pub async fn result(&self) -> ExecutionOutcome {
        let mut lifecycle = self.record.lifecycle.clone();
        let outcome = match lifecycle.wait_for(|l| l.outcome.is_some()).await {
            Ok(l) => l.outcome.clone(),
            Err(_) => None,
        };
        outcome.unwrap_or(ExecutionOutcome::Failed(MachineError::Aborted))
    }

    /// Wait until the published state satisfies `predicate`, returning it.
    pub async fn wait_until<F>(&self, predicate: F) -> CustomerState
    where
        F: Fn(&CustomerState) -> bool,
    {
        let mut status = self.record.ports.status.clone();
        let state = match status.wait_for(|s| predicate(s)).await {
            Ok(state) => Some((*state).clone()),
            Err(_) => None,
        };
        state.unwrap_or_else(|| status.borrow().clone())
    }

    fn closed(&self) -> RuntimeError {
        RuntimeError::Closed {
            identity: self.identity.clone(),
        }
    }
}

/// Registry and scheduler of customer instances.
///
/// # Example
///
/// ```rust
/// use loyalty::config::LoyaltyConfig;
/// use loyalty::customer::CustomerInput;
/// use loyalty::notify::LogGateway;
/// use loyalty::runtime::Runtime;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let runtime = Runtime::new(LoyaltyConfig::default(), Arc::new(LogGateway)).unwrap();
/// let handle = runtime.start_customer(CustomerInput::new("c1")).unwrap();
///
/// handle.add_points(600).unwrap();
/// let state = handle.wait_until(|s| s.points == 600).await;
/// assert_eq!(state.tier.name, "Bronze");
///
/// runtime.shutdown().await;
/// # }
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Validate `config` and build a runtime delivering through `gateway`.
    pub fn new(
        config: LoyaltyConfig,
        gateway: Arc<dyn NotificationGateway>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let tiers = config.tier_table()?;
        Ok(Self::from_parts(
            Arc::new(tiers),
            config.history_threshold,
            Notifier::new(gateway, config.notification_retry),
        ))
    }

    pub(crate) fn from_parts(tiers: Arc<TierTable>, history_threshold: u64, notifier: Notifier) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                tiers,
                history_threshold,
                notifier,
                instances: Mutex::new(HashMap::new()),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn tiers(&self) -> &TierTable {
        &self.inner.tiers
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        self.inner.notifier.retry_policy()
    }

    /// Start a customer with reject-duplicate semantics.
    pub fn start_customer(&self, input: CustomerInput) -> Result<InstanceHandle, RuntimeError> {
        let identity = instance_id(&input.id);
        match self.inner.admit(input) {
            Admission::Started(handle) => Ok(handle),
            Admission::Active(_) => Err(RuntimeError::AlreadyRunning { identity }),
            Admission::Closed => Err(RuntimeError::Closed { identity }),
            Admission::Rejected(MachineError::InvalidInput(errors)) => {
                Err(RuntimeError::Invalid(errors))
            }
            Admission::Rejected(e) => Err(RuntimeError::Machine(e)),
        }
    }

    /// Address an existing instance, running or closed.
    pub fn handle(&self, customer_id: &str) -> Result<InstanceHandle, RuntimeError> {
        self.inner
            .record(&instance_id(customer_id))
            .ok_or_else(|| RuntimeError::NotFound {
                customer_id: customer_id.to_string(),
            })
    }

    pub fn signal(&self, customer_id: &str, signal: Signal) -> Result<(), RuntimeError> {
        self.handle(customer_id)?.signal(signal)
    }

    pub fn cancel(&self, customer_id: &str) -> Result<(), RuntimeError> {
        self.handle(customer_id)?.cancel();
        Ok(())
    }

    pub fn status(&self, customer_id: &str) -> Result<StatusSnapshot, RuntimeError> {
        Ok(self.handle(customer_id)?.status())
    }

    pub fn guests(&self, customer_id: &str) -> Result<Vec<String>, RuntimeError> {
        Ok(self.handle(customer_id)?.guests())
    }

    pub fn describe(&self, customer_id: &str) -> Result<InstanceStatus, RuntimeError> {
        Ok(self.handle(customer_id)?.describe())
    }

    /// Cancel every instance and wait for their tasks to finish.
    ///
    /// Guests admitted by a handler still in flight are picked up by the
    /// next round; shutdown returns once a round finds no tasks left.
    pub async fn shutdown(&self) {
        let mut rounds = 0usize;
        loop {
            let handles: Vec<InstanceHandle> = {
                let instances = self.inner.instances.lock();
                instances
                    .iter()
                    .map(|(identity, record)| self.inner.handle_for(identity, record.clone()))
                    .collect()
            };
            for handle in &handles {
                handle.cancel();
            }

            let tasks = std::mem::take(&mut *self.inner.tasks.lock());
            if tasks.is_empty() {
                break;
            }
            rounds += 1;
            info!(
                instances = handles.len(),
                tasks = tasks.len(),
                round = rounds,
                "Shutting down runtime"
            );
            for task in tasks {
                if let Err(e) = task.await {
                    if !e.is_cancelled() {
                        error!(error = %e, "Instance task panicked");
                    }
                }
            }
        }
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("tiers", &self.inner.tiers.len())
            .field("history_threshold", &self.inner.history_threshold)
            .field("instances", &self.inner.instances.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{Message, RecordingGateway};
    use std::time::Duration;

    fn runtime(gateway: Arc<RecordingGateway>) -> Runtime {
        let config = LoyaltyConfig {
            notification_retry: RetryPolicy::immediate(2),
            ..LoyaltyConfig::default()
        };
        Runtime::new(config, gateway).unwrap()
    }

    async fn within<F: std::future::Future>(future: F) -> F::Output {
        tokio::time::timeout(Duration::from_secs(5), future)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn start_rejects_duplicates() {
        let rt = runtime(Arc::new(RecordingGateway::new()));
        rt.start_customer(CustomerInput::new("c1")).unwrap();

        assert!(matches!(
            rt.start_customer(CustomerInput::new("c1")),
            Err(RuntimeError::AlreadyRunning { ref identity }) if identity == "customer-c1"
        ));
        rt.shutdown().await;
    }

    #[tokio::test]
    async fn closed_identity_cannot_restart() {
        let rt = runtime(Arc::new(RecordingGateway::new()));
        let handle = rt.start_customer(CustomerInput::new("c1")).unwrap();
        handle.cancel_account().unwrap();
        within(handle.result()).await;

        assert!(matches!(
            rt.start_customer(CustomerInput::new("c1")),
            Err(RuntimeError::Closed { .. })
        ));
        assert!(matches!(
            handle.add_points(1),
            Err(RuntimeError::Closed { .. })
        ));
        assert_eq!(
            rt.describe("c1").unwrap(),
            InstanceStatus::Completed(CloseReason::CanceledByCustomer)
        );
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_without_registering() {
        let rt = runtime(Arc::new(RecordingGateway::new()));

        assert!(matches!(
            rt.start_customer(CustomerInput::new("c1").with_points(-5)),
            Err(RuntimeError::Invalid(_))
        ));
        assert!(matches!(
            rt.handle("c1"),
            Err(RuntimeError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_minimum_tier_is_rejected_at_boundary() {
        let rt = runtime(Arc::new(RecordingGateway::new()));
        let handle = rt.start_customer(CustomerInput::new("c1")).unwrap();

        assert!(matches!(
            handle.ensure_minimum_status(TierRef(17)),
            Err(RuntimeError::Tier(TierError::UnknownOrdinal { ordinal: 17, .. }))
        ));
        rt.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_closes_guests_admitted_mid_shutdown() {
        let rt = runtime(Arc::new(RecordingGateway::new()));
        let host = rt
            .start_customer(CustomerInput::new("host").with_points(5_000))
            .unwrap();
        for i in 0..10 {
            host.invite_guest(format!("g{i}")).unwrap();
        }

        within(rt.shutdown()).await;

        assert!(rt.inner.tasks.lock().is_empty());
        let instances = rt.inner.instances.lock();
        assert!(instances.len() >= 1);
        for (identity, record) in instances.iter() {
            assert!(record.is_closed(), "{identity} still running after shutdown");
        }
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_reported_distinctly() {
        let gateway = Arc::new(RecordingGateway::new());
        let rt = runtime(gateway.clone());
        let handle = rt.start_customer(CustomerInput::new("c1")).unwrap();

        rt.cancel("c1").unwrap();
        rt.cancel("c1").unwrap();
        let outcome = within(handle.result()).await;
        handle.cancel();

        assert!(matches!(
            outcome,
            ExecutionOutcome::Completed(CloseReason::CanceledByCaller)
        ));
        assert!(!handle.status().account_active);
        assert!(!gateway
            .messages_for("c1")
            .contains(&Message::AccountCanceled));
    }

    #[tokio::test]
    async fn queries_remain_available_after_close() {
        let rt = runtime(Arc::new(RecordingGateway::new()));
        let handle = rt.start_customer(CustomerInput::new("c1").with_points(700)).unwrap();
        handle.cancel_account().unwrap();
        within(handle.result()).await;

        let status = rt.status("c1").unwrap();
        assert_eq!(status.tier.name, "Bronze");
        assert!(!status.account_active);
        assert!(rt.guests("c1").unwrap().is_empty());
    }
}
