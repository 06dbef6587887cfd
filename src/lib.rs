//! Loyalty: a durable loyalty-status state machine
//!
//! Every customer is one long-lived instance of the same state machine. An
//! instance accumulates points, moves between tiers in either direction,
//! invites guests (each of which becomes an instance of its own), and
//! eventually closes when the customer or the caller cancels it.
//!
//! The pure pieces (tiers, customer state, validation) carry no side
//! effects. The event loop in [`effects`] wraps them, talking to the outside
//! world only through a [`notify::NotificationGateway`] and a
//! [`coordinator::Coordinator`]. [`runtime::Runtime`] is an in-process
//! substrate that schedules instances, delivers signals and relaunches
//! instances whose history grew past the configured threshold.
//!
//! # Core Concepts
//!
//! - **Tier**: named level with a point threshold and a guest allowance
//! - **Signal**: fire-and-forget event handled serially by one instance
//! - **Query**: read-only snapshot of an instance's state
//! - **Continuation**: fresh run of the same instance carrying its state
//!
//! # Example
//!
//! ```rust
//! use loyalty::customer::{CustomerInput, CustomerState, TierChange};
//! use loyalty::tier::TierTable;
//!
//! let tiers = TierTable::standard();
//! let mut customer = CustomerState::genesis(&CustomerInput::new("c1"), &tiers).unwrap();
//!
//! // One promotion, even across several levels.
//! let change = customer.apply_points(5_000, &tiers);
//! assert!(matches!(change, TierChange::Promoted(ref tier) if tier.name == "Platinum"));
//!
//! assert!(customer.can_invite());
//! assert_eq!(tiers.previous_tier(&customer.tier).name, "Gold");
//! ```

pub mod builder;
pub mod checkpoint;
pub mod config;
pub mod coordinator;
pub mod core;
pub mod customer;
pub mod effects;
pub mod notify;
pub mod runtime;
pub mod signal;
pub mod telemetry;
pub mod tier;
pub mod validation;

// Re-export commonly used types
pub use config::LoyaltyConfig;
pub use customer::{CustomerInput, CustomerState, StatusSnapshot};
pub use effects::ExecutionOutcome;
pub use runtime::{InstanceHandle, InstanceStatus, Runtime, RuntimeError};
pub use signal::{CloseReason, Signal};
pub use tier::{Tier, TierRef, TierTable};
