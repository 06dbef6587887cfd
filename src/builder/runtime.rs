//! Builder for runtimes.

use crate::builder::error::BuildError;
use crate::builder::tiers::TierTableBuilder;
use crate::config::LoyaltyConfig;
use crate::notify::{NotificationGateway, Notifier, RetryPolicy};
use crate::runtime::Runtime;
use std::sync::Arc;

/// Builder for constructing a [`Runtime`] with a fluent API.
///
/// # Example
///
/// ```rust
/// use loyalty::builder::{RuntimeBuilder, TierTableBuilder};
/// use loyalty::notify::LogGateway;
/// use std::sync::Arc;
///
/// let runtime = RuntimeBuilder::new()
///     .tiers(TierTableBuilder::new().tier("Basic", 0, 0).tier("Elite", 100, 3))
///     .history_threshold(1_000)
///     .gateway(Arc::new(LogGateway))
///     .build()
///     .unwrap();
///
/// assert_eq!(runtime.tiers().highest().name, "Elite");
/// ```
#[derive(Default)]
pub struct RuntimeBuilder {
    config: LoyaltyConfig,
    tiers: Option<TierTableBuilder>,
    gateway: Option<Arc<dyn NotificationGateway>>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration.
    pub fn config(mut self, config: LoyaltyConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the configured tiers.
    pub fn tiers(mut self, tiers: TierTableBuilder) -> Self {
        self.tiers = Some(tiers);
        self
    }

    pub fn history_threshold(mut self, threshold: u64) -> Self {
        self.config.history_threshold = threshold;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.notification_retry = policy;
        self
    }

    /// Set the notification gateway (required).
    pub fn gateway(mut self, gateway: Arc<dyn NotificationGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Validate everything and build the runtime.
    pub fn build(self) -> Result<Runtime, BuildError> {
        let gateway = self.gateway.ok_or(BuildError::MissingGateway)?;

        let mut config = self.config;
        if let Some(tiers) = self.tiers {
            config.tiers = tiers.into_specs();
        }
        if config.tiers.is_empty() {
            return Err(BuildError::NoTiers);
        }
        config.validate().map_err(BuildError::InvalidConfig)?;
        let tiers = config.tier_table().map_err(BuildError::InvalidTiers)?;

        Ok(Runtime::from_parts(
            Arc::new(tiers),
            config.history_threshold,
            Notifier::new(gateway, config.notification_retry),
        ))
    }
}
