//! Inbound signals and terminal reporting.

use crate::tier::TierRef;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const SIGNAL_ADD_POINTS: &str = "addLoyaltyPoints";
pub const SIGNAL_INVITE_GUEST: &str = "inviteGuest";
pub const SIGNAL_ENSURE_MINIMUM_STATUS: &str = "ensureMinimumStatus";
pub const SIGNAL_CANCEL_ACCOUNT: &str = "cancelAccount";
pub const QUERY_GET_STATUS: &str = "getStatus";
pub const QUERY_GET_GUESTS: &str = "getGuests";

/// Fire-and-forget event directed at one instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    /// Add (or with a negative value, remove) loyalty points.
    AddPoints(i64),
    InviteGuest(String),
    EnsureMinimumStatus(TierRef),
    CancelAccount,
}

impl Signal {
    /// Channel name of this signal.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddPoints(_) => SIGNAL_ADD_POINTS,
            Self::InviteGuest(_) => SIGNAL_INVITE_GUEST,
            Self::EnsureMinimumStatus(_) => SIGNAL_ENSURE_MINIMUM_STATUS,
            Self::CancelAccount => SIGNAL_CANCEL_ACCOUNT,
        }
    }
}

/// Why an instance completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CloseReason {
    /// The customer sent `CancelAccount`.
    CanceledByCustomer,
    /// The caller requested cancellation of the instance.
    CanceledByCaller,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CanceledByCustomer => f.write_str("canceled-by-customer"),
            Self::CanceledByCaller => f.write_str("canceled-by-caller"),
        }
    }
}
