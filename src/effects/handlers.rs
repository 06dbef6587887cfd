//! Signal handlers.
//!
//! Each handler runs to completion against the instance's own
//! `CustomerState`. Outbound calls are charged to the execution history so
//! the continuation predicate sees them.

use super::machine::{MachineContext, MachineError};
use crate::coordinator::StartOutcome;
use crate::core::{ExecutionHistory, LoopState};
use crate::customer::{instance_id, CustomerInput, CustomerState, TierChange};
use crate::notify::Message;
use crate::tier::TierRef;
use tracing::{debug, info, warn};

pub(crate) type History = ExecutionHistory<LoopState>;

/// Deliver `message` to the customer, charging one unit per attempt.
pub(crate) async fn notify(
    ctx: &MachineContext,
    history: &mut History,
    customer: &CustomerState,
    message: Message,
) {
    let delivery = ctx.notifier.deliver(&customer.id, &message).await;
    history.charge(u64::from(delivery.attempts()));
}

pub(crate) async fn on_add_points(
    ctx: &MachineContext,
    history: &mut History,
    customer: &mut CustomerState,
    delta: i64,
) {
    let change = customer.apply_points(delta, &ctx.tiers);
    debug!(delta, points = customer.points, tier = %customer.tier, "Applied points");

    let message = match change {
        TierChange::Promoted(tier) => {
            info!(tier = %tier, "Customer promoted");
            Message::Promoted { tier: tier.name }
        }
        TierChange::Demoted(tier) => {
            info!(tier = %tier, "Customer demoted");
            Message::Demoted { tier: tier.name }
        }
        TierChange::Unchanged => return,
    };
    notify(ctx, history, customer, message).await;
}

pub(crate) async fn on_invite_guest(
    ctx: &MachineContext,
    history: &mut History,
    customer: &mut CustomerState,
    guest_id: String,
) -> Result<(), MachineError> {
    if !customer.can_invite() {
        debug!(
            guest_id = %guest_id,
            guests = customer.guest_ids.len(),
            allowed = customer.tier.guests_allowed,
            "Guest allowance exhausted"
        );
        notify(ctx, history, customer, Message::InsufficientAllowance).await;
        return Ok(());
    }

    customer.add_guest(guest_id.clone());

    let minimum = ctx.tiers.previous_tier(&customer.tier).tier_ref();
    let identity = instance_id(&guest_id);
    let outcome = ctx
        .coordinator
        .start_and_promote(&identity, CustomerInput::guest(&guest_id, minimum), minimum)
        .await;

    // Start plus the follow-up ratchet signal.
    let calls = match outcome {
        StartOutcome::Started | StartOutcome::AlreadyActiveConflict => 2,
        _ => 1,
    };
    history.charge(calls);

    let message = match &outcome {
        StartOutcome::Started | StartOutcome::AlreadyActiveConflict => {
            info!(guest_id = %guest_id, ?outcome, "Guest invited");
            Message::GuestInvited
        }
        StartOutcome::PermanentlyClosedConflict => {
            info!(guest_id = %guest_id, "Guest previously canceled");
            Message::GuestPreviouslyCanceled
        }
        StartOutcome::OtherError(source) => {
            return Err(MachineError::Coordination {
                guest_id,
                source: source.clone(),
            });
        }
    };
    notify(ctx, history, customer, message).await;
    Ok(())
}

pub(crate) async fn on_ensure_minimum(
    ctx: &MachineContext,
    history: &mut History,
    customer: &mut CustomerState,
    minimum: TierRef,
) {
    let tier = match ctx.tiers.get(minimum) {
        Ok(tier) => tier,
        Err(e) => {
            warn!(error = %e, "Ignoring minimum status for unknown tier");
            return;
        }
    };

    if customer.ensure_minimum(tier) {
        info!(tier = %tier, "Raised to minimum status");
        notify(
            ctx,
            history,
            customer,
            Message::Promoted {
                tier: tier.name.clone(),
            },
        )
        .await;
    }
}

pub(crate) async fn on_cancel_account(
    ctx: &MachineContext,
    history: &mut History,
    customer: &mut CustomerState,
) {
    customer.cancel();
    info!("Account canceled by customer");
    notify(ctx, history, customer, Message::AccountCanceled).await;
}

/// Caller-requested cancellation. Closes the account without notifying.
pub(crate) fn on_external_cancel(customer: &mut CustomerState) {
    customer.cancel();
    info!("Instance canceled by caller");
}
