//! Gateway implementations.

use super::{GatewayError, Message, NotificationGateway};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::info;

/// Gateway that only logs. Stands in for a real mail/SMS provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogGateway;

#[async_trait]
impl NotificationGateway for LogGateway {
    async fn send(&self, recipient: &str, message: &Message) -> Result<(), GatewayError> {
        info!(recipient, contents = %message, "Sending notification");
        Ok(())
    }
}

/// A message that reached the gateway successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub recipient: String,
    pub message: Message,
}

/// In-memory gateway that records every delivered message, optionally
/// failing a number of attempts first.
#[derive(Debug)]
pub struct RecordingGateway {
    sent: Mutex<Vec<SentNotification>>,
    failures_remaining: Mutex<u32>,
    changes: watch::Sender<usize>,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::failing(0)
    }

    /// Fail the next `attempts` sends, then succeed.
    pub fn failing(attempts: u32) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            sent: Mutex::new(Vec::new()),
            failures_remaining: Mutex::new(attempts),
            changes,
        }
    }

    pub fn fail_next(&self, attempts: u32) {
        *self.failures_remaining.lock() = attempts;
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().clone()
    }

    pub fn messages_for(&self, recipient: &str) -> Vec<Message> {
        self.sent
            .lock()
            .iter()
            .filter(|n| n.recipient == recipient)
            .map(|n| n.message.clone())
            .collect()
    }

    /// Wait until the recorded notifications satisfy `predicate`.
    pub async fn wait_until<F>(&self, predicate: F)
    where
        F: Fn(&[SentNotification]) -> bool,
    {
        let mut changes = self.changes.subscribe();
        loop {
            if predicate(&self.sent.lock()) {
                return;
            }
            if changes.changed().await.is_err() {
                return;
            }
        }
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn send(&self, recipient: &str, message: &Message) -> Result<(), GatewayError> {
        {
            let mut failures = self.failures_remaining.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(GatewayError {
                    recipient: recipient.to_string(),
                    reason: "simulated outage".to_string(),
                });
            }
        }

        self.sent.lock().push(SentNotification {
            recipient: recipient.to_string(),
            message: message.clone(),
        });
        self.changes.send_modify(|count| *count += 1);
        Ok(())
    }
}
