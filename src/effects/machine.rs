//! Event loop of one customer instance.

use super::handlers::{self, History};
use crate::checkpoint::{CheckpointError, ContinuationCheckpoint, RunMetadata};
use crate::coordinator::{CoordinationError, Coordinator};
use crate::core::{ExecutionHistory, Guard, LoopState, State};
use crate::customer::{CustomerInput, CustomerState};
use crate::notify::{Message, Notifier};
use crate::signal::{CloseReason, Signal, QUERY_GET_GUESTS, QUERY_GET_STATUS};
use crate::tier::TierTable;
use crate::validation::ValidationErrors;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, info_span, trace, Instrument};
use uuid::Uuid;

/// Fatal errors that abort an execution.
#[derive(Debug, Clone, Error)]
pub enum MachineError {
    #[error("Coordinating guest '{guest_id}' failed: {source}")]
    Coordination {
        guest_id: String,
        #[source]
        source: CoordinationError,
    },

    #[error("Failed to register query '{query}'")]
    QueryRegistration { query: &'static str },

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("Invalid customer input: {0}")]
    InvalidInput(ValidationErrors),

    #[error("Instance task stopped before reporting an outcome")]
    Aborted,
}

/// How an execution ended.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Completed(CloseReason),
    /// History threshold crossed; the checkpoint seeds the next run.
    ContinuedAsNew(ContinuationCheckpoint),
    Failed(MachineError),
}

/// Collaborators shared by every execution of an instance.
#[derive(Clone)]
pub struct MachineContext {
    pub tiers: Arc<TierTable>,
    pub notifier: Notifier,
    pub coordinator: Arc<dyn Coordinator>,
    pub history_threshold: u64,
}

impl std::fmt::Debug for MachineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachineContext")
            .field("tiers", &self.tiers.len())
            .field("notifier", &self.notifier)
            .field("history_threshold", &self.history_threshold)
            .finish_non_exhaustive()
    }
}

/// Where an execution takes its initial state from.
#[derive(Debug, Clone)]
pub enum Launch {
    Genesis(CustomerInput),
    Continuation(ContinuationCheckpoint),
}

/// Loop-side ends of an instance's channels. Survive continuations.
#[derive(Debug)]
pub struct InstanceChannels {
    pub signals: mpsc::UnboundedReceiver<Signal>,
    pub cancel: watch::Receiver<bool>,
    pub status: watch::Sender<CustomerState>,
}

/// Caller-side ends of an instance's channels.
#[derive(Debug, Clone)]
pub struct InstancePorts {
    pub signals: mpsc::UnboundedSender<Signal>,
    pub cancel: Arc<watch::Sender<bool>>,
    pub status: watch::Receiver<CustomerState>,
}

/// Create the channel pair for one instance, publishing `initial` as status.
pub fn instance_channels(initial: CustomerState) -> (InstanceChannels, InstancePorts) {
    let (signals_tx, signals_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let (status_tx, status_rx) = watch::channel(initial);

    (
        InstanceChannels {
            signals: signals_rx,
            cancel: cancel_rx,
            status: status_tx,
        },
        InstancePorts {
            signals: signals_tx,
            cancel: Arc::new(cancel_tx),
            status: status_rx,
        },
    )
}

enum Event {
    Signal(Signal),
    Cancel,
}

/// One execution of a customer instance.
pub struct CustomerMachine {
    ctx: MachineContext,
    customer: CustomerState,
    state: LoopState,
    history: History,
    fatal: Option<MachineError>,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    generation: u32,
    genesis: bool,
    signals_handled: u64,
    continue_when: Guard<History>,
}

impl CustomerMachine {
    /// Prepare an execution. Genesis input is validated; a continuation
    /// checkpoint is checked against the tier table.
    pub fn new(ctx: MachineContext, launch: Launch) -> Result<Self, MachineError> {
        let (customer, generation, genesis) = match launch {
            Launch::Genesis(input) => (
                CustomerState::genesis(&input, &ctx.tiers).map_err(MachineError::InvalidInput)?,
                0,
                true,
            ),
            Launch::Continuation(checkpoint) => {
                checkpoint.validate(&ctx.tiers)?;
                (checkpoint.customer, checkpoint.generation, false)
            }
        };

        let threshold = ctx.history_threshold;
        Ok(Self {
            ctx,
            customer,
            state: LoopState::Running,
            history: ExecutionHistory::new(),
            fatal: None,
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            generation,
            genesis,
            signals_handled: 0,
            continue_when: Guard::new(move |history: &History| history.size() >= threshold),
        })
    }

    pub fn customer(&self) -> &CustomerState {
        &self.customer
    }

    pub fn context(&self) -> &MachineContext {
        &self.ctx
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Run until the execution completes, fails or continues.
    pub async fn run(self, channels: &mut InstanceChannels) -> ExecutionOutcome {
        let span = info_span!(
            "customer",
            instance_id = %self.customer.instance_id(),
            run_id = %self.run_id,
        );
        self.execute(channels).instrument(span).await
    }

    async fn execute(mut self, channels: &mut InstanceChannels) -> ExecutionOutcome {
        if channels.status.send(self.customer.clone()).is_err() {
            return self.fail(MachineError::QueryRegistration {
                query: QUERY_GET_STATUS,
            });
        }
        debug!(queries = ?[QUERY_GET_STATUS, QUERY_GET_GUESTS], "Queries registered");

        if self.genesis {
            info!(tier = %self.customer.tier, points = self.customer.points, "Starting new customer");
            let welcome = Message::Welcome {
                tier: self.customer.tier.name.clone(),
            };
            handlers::notify(&self.ctx, &mut self.history, &self.customer, welcome).await;
        } else {
            info!(generation = self.generation, "Resuming customer from continuation");
        }

        loop {
            let event = tokio::select! {
                biased;
                _ = cancelled(&mut channels.cancel) => Event::Cancel,
                Some(signal) = channels.signals.recv() => Event::Signal(signal),
            };

            self.transition(LoopState::Dispatching);
            let close_reason = match event {
                Event::Cancel => {
                    handlers::on_external_cancel(&mut self.customer);
                    CloseReason::CanceledByCaller
                }
                Event::Signal(signal) => {
                    self.signals_handled += 1;
                    debug!(signal = signal.name(), "Dispatching signal");
                    if let Err(e) = self.dispatch(signal).await {
                        self.fatal = Some(e);
                    }
                    CloseReason::CanceledByCustomer
                }
            };

            channels.status.send_replace(self.customer.clone());

            if let Some(e) = self.fatal.take() {
                return self.fail(e);
            }

            if !self.customer.account_active {
                self.transition(LoopState::Completed);
                info!(reason = %close_reason, "Customer instance completed");
                return ExecutionOutcome::Completed(close_reason);
            }

            if self.continue_when.check(&self.history) {
                self.transition(LoopState::Continuing);
                return self.continue_as_new();
            }

            self.transition(LoopState::Running);
        }
    }

    async fn dispatch(&mut self, signal: Signal) -> Result<(), MachineError> {
        let (ctx, history, customer) = (&self.ctx, &mut self.history, &mut self.customer);
        match signal {
            Signal::AddPoints(delta) => handlers::on_add_points(ctx, history, customer, delta).await,
            Signal::InviteGuest(guest_id) => {
                return handlers::on_invite_guest(ctx, history, customer, guest_id).await;
            }
            Signal::EnsureMinimumStatus(tier) => {
                handlers::on_ensure_minimum(ctx, history, customer, tier).await
            }
            Signal::CancelAccount => handlers::on_cancel_account(ctx, history, customer).await,
        }
        Ok(())
    }

    fn transition(&mut self, to: LoopState) {
        let from = self.state;
        self.history.record(from, to);
        self.state = to;
        trace!(
            from = from.name(),
            to = to.name(),
            accepts_signals = to.accepts_signals(),
            "Loop state transition"
        );
    }

    fn fail(mut self, e: MachineError) -> ExecutionOutcome {
        self.transition(LoopState::Failed);
        error!(error = %e, state = self.state.name(), "Customer instance failed");
        ExecutionOutcome::Failed(e)
    }

    fn continue_as_new(self) -> ExecutionOutcome {
        info!(
            history_size = self.history.size(),
            signals = self.signals_handled,
            "History threshold reached; continuing as new run"
        );
        ExecutionOutcome::ContinuedAsNew(ContinuationCheckpoint::capture(
            &self.customer,
            self.generation + 1,
            RunMetadata {
                run_id: self.run_id,
                started_at: self.started_at,
                history_size: self.history.size(),
                signals_handled: self.signals_handled,
            },
        ))
    }
}

impl std::fmt::Debug for CustomerMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomerMachine")
            .field("customer", &self.customer)
            .field("state", &self.state)
            .field("run_id", &self.run_id)
            .field("generation", &self.generation)
            .field("history_size", &self.history.size())
            .finish_non_exhaustive()
    }
}

/// Resolves once cancellation is requested. Stays pending if the caller side
/// is gone, since nobody can cancel any more.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let requested = cancel.wait_for(|requested| *requested).await.is_ok();
    if !requested {
        std::future::pending::<()>().await;
    }
}
