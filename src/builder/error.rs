//! Build errors for the tier table and runtime builders.

use crate::validation::ValidationErrors;
use thiserror::Error;

/// Errors that can occur when building tier tables and runtimes.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("No tiers defined. Add at least one tier with .tier(name, points, guests)")]
    NoTiers,

    #[error("Notification gateway not specified. Call .gateway(gateway) before .build()")]
    MissingGateway,

    #[error("Invalid tier table: {0}")]
    InvalidTiers(ValidationErrors),

    #[error("Invalid runtime configuration: {0}")]
    InvalidConfig(ValidationErrors),
}
