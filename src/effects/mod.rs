//! The per-instance event loop and its signal handlers.
//!
//! This module is the "imperative shell" around the pure customer state:
//! it waits on signals and cancellation, dispatches handlers one at a time,
//! and decides after each handler whether the execution completes, fails,
//! or continues as a fresh run.
//!
//! # Key Concepts
//!
//! - **Handlers**: mutate `CustomerState`, then notify and/or coordinate
//! - **Machine**: owns one execution's state, history and loop state
//! - **Channels**: signals, cancellation and the published status snapshot

mod handlers;
mod machine;

pub use machine::{
    instance_channels, CustomerMachine, ExecutionOutcome, InstanceChannels, InstancePorts, Launch,
    MachineContext, MachineError,
};
