//! Continuation checkpoints.
//!
//! When an instance's history crosses the threshold it stops and hands its
//! state to a fresh execution under the same identity. The handoff is a
//! [`ContinuationCheckpoint`]: serializable, versioned, and validated against
//! the tier table before the next run accepts it. Pending signals are not
//! part of the checkpoint; they stay queued on the instance's channel.

use crate::customer::CustomerState;
use crate::tier::TierTable;
use crate::validation::{ValidationError, ValidationErrors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod error;

pub use error::CheckpointError;

/// Version identifier for checkpoint format
pub const CHECKPOINT_VERSION: u32 = 1;

/// Summary of the run that produced a checkpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// History size at the moment the run continued.
    pub history_size: u64,
    pub signals_handled: u64,
}

/// State carried from one execution of an instance to the next.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationCheckpoint {
    /// Checkpoint format version
    pub version: u32,

    /// Unique checkpoint identifier
    pub id: Uuid,

    /// When checkpoint was created
    pub timestamp: DateTime<Utc>,

    pub instance_id: String,

    /// Number of continuations so far, including this one.
    pub generation: u32,

    /// Full customer state at the moment of continuation.
    pub customer: CustomerState,

    pub previous_run: RunMetadata,
}

impl ContinuationCheckpoint {
    pub fn capture(customer: &CustomerState, generation: u32, previous_run: RunMetadata) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            instance_id: customer.instance_id(),
            generation,
            customer: customer.clone(),
            previous_run,
        }
    }

    /// Compact binary encoding used for the handoff between runs.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CheckpointError> {
        bincode::serialize(self).map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CheckpointError> {
        let checkpoint: Self = bincode::deserialize(bytes)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        checkpoint.check_version()?;
        Ok(checkpoint)
    }

    /// Human-readable encoding, for inspection and storage.
    pub fn to_json(&self) -> Result<String, CheckpointError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        let checkpoint: Self = serde_json::from_str(json)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        checkpoint.check_version()?;
        Ok(checkpoint)
    }

    fn check_version(&self) -> Result<(), CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: self.version,
                supported: CHECKPOINT_VERSION,
            });
        }
        Ok(())
    }

    /// Check that the carried state is consistent with `tiers`.
    pub fn validate(&self, tiers: &TierTable) -> Result<(), CheckpointError> {
        self.check_version()?;

        if self.customer.id.trim().is_empty() {
            return Err(CheckpointError::InvalidState(ValidationErrors::from(vec![
                ValidationError::EmptyCustomerId,
            ])));
        }

        if self.instance_id != self.customer.instance_id() {
            return Err(CheckpointError::ValidationFailed(format!(
                "instance id '{}' does not belong to customer '{}'",
                self.instance_id, self.customer.id
            )));
        }

        tiers
            .resolve(&self.customer.tier)
            .map_err(|e| CheckpointError::ValidationFailed(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customer::CustomerInput;
    use crate::tier::{TierSpec, TierTable};

    fn checkpoint() -> ContinuationCheckpoint {
        let tiers = TierTable::standard();
        let mut customer =
            CustomerState::genesis(&CustomerInput::new("c1").with_points(1_500), &tiers).unwrap();
        customer.add_guest("g1");

        ContinuationCheckpoint::capture(
            &customer,
            1,
            RunMetadata {
                run_id: Uuid::new_v4(),
                started_at: Utc::now(),
                history_size: 10_000,
                signals_handled: 4_999,
            },
        )
    }

    #[test]
    fn capture_records_identity() {
        let cp = checkpoint();
        assert_eq!(cp.version, CHECKPOINT_VERSION);
        assert_eq!(cp.instance_id, "customer-c1");
        assert_eq!(cp.generation, 1);
    }

    #[test]
    fn binary_round_trip() {
        let cp = checkpoint();
        let restored = ContinuationCheckpoint::from_bytes(&cp.to_bytes().unwrap()).unwrap();

        assert_eq!(restored, cp);
        assert!(restored.customer.guest_ids.contains("g1"));
    }

    #[test]
    fn json_round_trip() {
        let cp = checkpoint();
        let json = cp.to_json().unwrap();

        assert!(json.contains("customer-c1"));
        assert_eq!(ContinuationCheckpoint::from_json(&json).unwrap(), cp);
    }

    #[test]
    fn rejects_unknown_version() {
        let mut cp = checkpoint();
        cp.version = 99;

        let result = ContinuationCheckpoint::from_bytes(&cp.to_bytes().unwrap());
        assert!(matches!(
            result,
            Err(CheckpointError::UnsupportedVersion {
                found: 99,
                supported: CHECKPOINT_VERSION
            })
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            ContinuationCheckpoint::from_json("{not json"),
            Err(CheckpointError::DeserializationFailed(_))
        ));
    }

    #[test]
    fn validate_accepts_consistent_state() {
        assert!(checkpoint().validate(&TierTable::standard()).is_ok());
    }

    #[test]
    fn validate_rejects_foreign_tier_table() {
        let cp = checkpoint();
        let other = TierTable::new(vec![TierSpec::new("Basic", 0, 0)]).unwrap();

        assert!(matches!(
            cp.validate(&other),
            Err(CheckpointError::ValidationFailed(_))
        ));
    }

    #[test]
    fn validate_rejects_mismatched_instance() {
        let mut cp = checkpoint();
        cp.instance_id = "customer-other".to_string();

        assert!(cp.validate(&TierTable::standard()).is_err());
    }
}
