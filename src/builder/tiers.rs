//! Builder for tier tables.

use crate::builder::error::BuildError;
use crate::tier::{TierSpec, TierTable};

/// Fluent construction of a [`TierTable`], lowest tier first.
#[derive(Debug, Clone, Default)]
pub struct TierTableBuilder {
    specs: Vec<TierSpec>,
}

impl TierTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the standard five-level program.
    pub fn standard() -> Self {
        Self {
            specs: TierSpec::standard(),
        }
    }

    /// Append a tier above the ones added so far.
    pub fn tier(mut self, name: impl Into<String>, minimum_points: i64, guests_allowed: usize) -> Self {
        self.specs.push(TierSpec::new(name, minimum_points, guests_allowed));
        self
    }

    pub(crate) fn into_specs(self) -> Vec<TierSpec> {
        self.specs
    }

    /// Validate and build. Reports every violation at once.
    pub fn build(self) -> Result<TierTable, BuildError> {
        if self.specs.is_empty() {
            return Err(BuildError::NoTiers);
        }
        TierTable::new(self.specs).map_err(BuildError::InvalidTiers)
    }
}
