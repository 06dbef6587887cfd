//! Loyalty Scenario
//!
//! Walks one customer through the program end to end:
//! - Promotion from Member to Bronze, then a multi-level jump to Platinum
//! - Inviting a guest, who becomes an instance of their own
//! - The guest canceling, and a re-invite reporting the earlier cancel
//!
//! Notifications go to the log. Set `RUST_LOG=debug` for more detail.
//!
//! Run with: cargo run --example loyalty_scenario

use loyalty::builder::RuntimeBuilder;
use loyalty::notify::{LogGateway, RetryPolicy};
use loyalty::telemetry::init_tracing;
use loyalty::{CustomerInput, ExecutionOutcome};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    init_tracing("info");

    let runtime = match RuntimeBuilder::new()
        .retry(RetryPolicy::default().with_initial_interval(Duration::from_millis(100)))
        .gateway(Arc::new(LogGateway))
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return;
        }
    };

    println!("=== Loyalty Scenario ===\n");

    let customer = match runtime.start_customer(CustomerInput::new("alice@example.com")) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to start customer: {e}");
            return;
        }
    };

    customer.add_points(500).ok();
    let state = customer.wait_until(|s| s.points == 500).await;
    println!("After 500 points:  {} ({} points)", state.tier, state.points);

    customer.invite_guest("bob@example.com").ok();
    let state = customer.wait_until(|s| !s.guest_ids.is_empty()).await;
    println!("Guests:            {:?}", state.guests());

    customer.add_points(4_500).ok();
    let state = customer.wait_until(|s| s.points == 5_000).await;
    println!("After 4500 more:   {} ({} points)", state.tier, state.points);

    if let Ok(guest) = runtime.handle("bob@example.com") {
        println!("Guest status:      {}", guest.status().tier);
        guest.cancel_account().ok();
        if let ExecutionOutcome::Completed(reason) = guest.result().await {
            println!("Guest closed:      {reason}");
        }
    }

    // Reports that the guest already canceled.
    customer.invite_guest("bob@example.com").ok();
    customer.cancel_account().ok();
    let outcome = customer.result().await;
    println!("Customer outcome:  {outcome:?}");
    println!("Final status:      {:?}", customer.status());

    runtime.shutdown().await;
}
