//! Loyalty tiers and the immutable tier table.
//!
//! The table is built once, validated, and shared read-only (`Arc<TierTable>`)
//! by every instance in the process.

use crate::validation::{validate_tier_specs, ValidationErrors};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// A named loyalty level.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tier {
    /// Position in the table, starting at 0.
    pub ordinal: usize,
    pub name: String,
    pub minimum_points: i64,
    pub guests_allowed: usize,
}

impl Tier {
    /// Reference to this tier suitable for signals.
    pub fn tier_ref(&self) -> TierRef {
        TierRef(self.ordinal)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Reference to a tier by ordinal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TierRef(pub usize);

/// Unvalidated tier description, as found in configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSpec {
    pub name: String,
    pub minimum_points: i64,
    pub guests_allowed: usize,
}

impl TierSpec {
    pub fn new(name: impl Into<String>, minimum_points: i64, guests_allowed: usize) -> Self {
        Self {
            name: name.into(),
            minimum_points,
            guests_allowed,
        }
    }

    /// The default five-level program.
    pub fn standard() -> Vec<TierSpec> {
        vec![
            TierSpec::new("Member", 0, 0),
            TierSpec::new("Bronze", 500, 1),
            TierSpec::new("Silver", 1_000, 2),
            TierSpec::new("Gold", 2_000, 5),
            TierSpec::new("Platinum", 5_000, 10),
        ]
    }
}

/// Errors resolving a tier against the table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TierError {
    #[error("Tier ordinal {ordinal} is out of range (table has {len} tiers)")]
    UnknownOrdinal { ordinal: usize, len: usize },

    #[error("Tier '{name}' does not match the tier table entry at ordinal {ordinal}")]
    Mismatch { name: String, ordinal: usize },
}

/// Immutable ordered tier configuration.
///
/// Invariants (checked at construction): at least one tier, the lowest tier
/// starts at 0 points, thresholds strictly ascending, names unique.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TierTable {
    tiers: Vec<Tier>,
}

impl TierTable {
    /// Validate `specs` and build the table, reporting every violation at once.
    pub fn new(specs: Vec<TierSpec>) -> Result<Self, ValidationErrors> {
        ValidationErrors::check(validate_tier_specs(&specs))?;

        let tiers: Vec<Tier> = specs
            .into_iter()
            .enumerate()
            .map(|(ordinal, spec)| Tier {
                ordinal,
                name: spec.name,
                minimum_points: spec.minimum_points,
                guests_allowed: spec.guests_allowed,
            })
            .collect();

        for pair in tiers.windows(2) {
            if pair[1].guests_allowed < pair[0].guests_allowed {
                warn!(
                    lower = %pair[0].name,
                    higher = %pair[1].name,
                    "Guest allowance decreases with a higher tier"
                );
            }
        }

        Ok(Self { tiers })
    }

    /// Member/Bronze/Silver/Gold/Platinum.
    pub fn standard() -> Self {
        let tiers = TierSpec::standard()
            .into_iter()
            .enumerate()
            .map(|(ordinal, spec)| Tier {
                ordinal,
                name: spec.name,
                minimum_points: spec.minimum_points,
                guests_allowed: spec.guests_allowed,
            })
            .collect();
        Self { tiers }
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Ordinal 0.
    pub fn lowest(&self) -> &Tier {
        &self.tiers[0]
    }

    pub fn highest(&self) -> &Tier {
        &self.tiers[self.tiers.len() - 1]
    }

    pub fn get(&self, tier: TierRef) -> Result<&Tier, TierError> {
        self.tiers.get(tier.0).ok_or(TierError::UnknownOrdinal {
            ordinal: tier.0,
            len: self.tiers.len(),
        })
    }

    pub fn by_name(&self, name: &str) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.name == name)
    }

    /// Check that `tier` is exactly the table's entry at its ordinal.
    pub fn resolve(&self, tier: &Tier) -> Result<&Tier, TierError> {
        let entry = self.get(tier.tier_ref())?;
        if entry == tier {
            Ok(entry)
        } else {
            Err(TierError::Mismatch {
                name: tier.name.clone(),
                ordinal: tier.ordinal,
            })
        }
    }

    /// Highest tier whose threshold is at or below `points`.
    ///
    /// Points below the lowest threshold (including negative balances) map to
    /// the lowest tier.
    ///
    /// ```rust
    /// use loyalty::tier::TierTable;
    ///
    /// let tiers = TierTable::standard();
    /// assert_eq!(tiers.tier_for_points(-20).name, "Member");
    /// assert_eq!(tiers.tier_for_points(500).name, "Bronze");
    /// assert_eq!(tiers.tier_for_points(4_999).name, "Gold");
    /// assert_eq!(tiers.tier_for_points(1_000_000).name, "Platinum");
    /// ```
    pub fn tier_for_points(&self, points: i64) -> &Tier {
        let index = self
            .tiers
            .partition_point(|tier| tier.minimum_points <= points);
        &self.tiers[index.saturating_sub(1)]
    }

    /// One ordinal below `tier`, floored at the lowest tier.
    pub fn previous_tier(&self, tier: &Tier) -> &Tier {
        let ordinal = tier.ordinal.min(self.tiers.len() - 1);
        &self.tiers[ordinal.saturating_sub(1)]
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self::standard()
    }
}
