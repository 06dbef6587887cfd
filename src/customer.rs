//! Customer state and its pure mutations.
//!
//! `CustomerState` is owned by exactly one instance's event loop. Everything
//! here is side-effect free; notifications and coordination are the loop's
//! business.

use crate::tier::{Tier, TierRef, TierTable};
use crate::validation::{validate_customer_input, ValidationErrors};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Prefix shared by every customer instance identity.
pub const INSTANCE_ID_PREFIX: &str = "customer-";

/// Instance identity for a customer. Used identically by a parent addressing
/// a guest and by the top-level starter.
///
/// ```rust
/// assert_eq!(loyalty::customer::instance_id("g1"), "customer-g1");
/// ```
pub fn instance_id(customer_id: &str) -> String {
    format!("{INSTANCE_ID_PREFIX}{customer_id}")
}

/// Input for a brand-new (genesis) instance.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInput {
    pub id: String,
    #[serde(default)]
    pub points: i64,
    /// Explicit starting tier. Derived from `points` when absent.
    #[serde(default)]
    pub tier: Option<TierRef>,
}

impl CustomerInput {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            points: 0,
            tier: None,
        }
    }

    pub fn with_points(mut self, points: i64) -> Self {
        self.points = points;
        self
    }

    pub fn with_tier(mut self, tier: TierRef) -> Self {
        self.tier = Some(tier);
        self
    }

    /// Seed for a guest's own instance, guaranteed at least `minimum`.
    pub fn guest(id: impl Into<String>, minimum: TierRef) -> Self {
        Self::new(id).with_tier(minimum)
    }
}

/// Outcome of recomputing the tier after a point change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TierChange {
    Promoted(Tier),
    Demoted(Tier),
    Unchanged,
}

/// Read-only view returned by the status query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub tier: Tier,
    pub points: i64,
    pub account_active: bool,
}

/// Mutable record of one customer.
///
/// `tier.minimum_points <= points` holds after every point recomputation but
/// may be exceeded after an explicit minimum-status override. The guest set is
/// capped at invitation time only and never trimmed when the tier drops.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerState {
    pub id: String,
    pub points: i64,
    pub tier: Tier,
    pub guest_ids: BTreeSet<String>,
    pub account_active: bool,
}

impl CustomerState {
    /// Validate genesis input and derive the starting state.
    ///
    /// An explicit tier is kept as given and floors the points at its
    /// threshold; otherwise the tier follows from the points.
    pub fn genesis(input: &CustomerInput, tiers: &TierTable) -> Result<Self, ValidationErrors> {
        ValidationErrors::check(validate_customer_input(input, tiers))?;

        let (tier, points) = match input.tier.map(|r| tiers.get(r)) {
            Some(Ok(tier)) => (tier.clone(), input.points.max(tier.minimum_points)),
            _ => (tiers.tier_for_points(input.points).clone(), input.points),
        };

        Ok(Self {
            id: input.id.clone(),
            points,
            tier,
            guest_ids: BTreeSet::new(),
            account_active: true,
        })
    }

    pub fn instance_id(&self) -> String {
        instance_id(&self.id)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            tier: self.tier.clone(),
            points: self.points,
            account_active: self.account_active,
        }
    }

    pub fn guests(&self) -> Vec<String> {
        self.guest_ids.iter().cloned().collect()
    }

    /// Apply a (possibly negative) point delta and recompute the tier in
    /// either direction. Multi-level jumps are a single change.
    pub fn apply_points(&mut self, delta: i64, tiers: &TierTable) -> TierChange {
        self.points = self.points.saturating_add(delta);

        let new_tier = tiers.tier_for_points(self.points).clone();
        let change = match new_tier.ordinal.cmp(&self.tier.ordinal) {
            std::cmp::Ordering::Greater => TierChange::Promoted(new_tier.clone()),
            std::cmp::Ordering::Less => TierChange::Demoted(new_tier.clone()),
            std::cmp::Ordering::Equal => TierChange::Unchanged,
        };
        self.tier = new_tier;
        change
    }

    /// Ratchet up to `minimum`. Returns `true` when the tier changed.
    pub fn ensure_minimum(&mut self, minimum: &Tier) -> bool {
        if self.tier.ordinal >= minimum.ordinal {
            return false;
        }
        self.tier = minimum.clone();
        self.points = minimum.minimum_points;
        true
    }

    /// Whether another invitation fits the current allowance.
    pub fn can_invite(&self) -> bool {
        self.guest_ids.len() < self.tier.guests_allowed
    }

    /// Track a guest. Returns `false` if already tracked.
    pub fn add_guest(&mut self, guest_id: impl Into<String>) -> bool {
        self.guest_ids.insert(guest_id.into())
    }

    pub fn cancel(&mut self) {
        self.account_active = false;
    }
}
