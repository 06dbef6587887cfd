//! Notification Gateway: best-effort outbound messages with bounded retry.
//!
//! Handlers hand a [`Message`] to a [`Notifier`], which calls the configured
//! [`NotificationGateway`] until it succeeds or the [`RetryPolicy`] is
//! exhausted. Exhaustion is logged and never fails the calling handler.

mod gateway;
mod retry;

pub use gateway::{LogGateway, RecordingGateway, SentNotification};
pub use retry::RetryPolicy;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Customer-facing messages.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Message {
    Welcome { tier: String },
    Promoted { tier: String },
    Demoted { tier: String },
    GuestInvited,
    GuestPreviouslyCanceled,
    InsufficientAllowance,
    AccountCanceled,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Welcome { tier } => write!(
                f,
                "Welcome to our loyalty program! You're starting out at '{tier}' status."
            ),
            Self::Promoted { tier } => {
                write!(f, "Congratulations! You've been promoted to '{tier}' status!")
            }
            Self::Demoted { tier } => write!(
                f,
                "Unfortunately, you've lost enough points to bump you down to '{tier}' status. 😞"
            ),
            Self::GuestInvited => f.write_str("Congratulations! Your guest has been invited!"),
            Self::GuestPreviouslyCanceled => {
                f.write_str("Sorry, your guest has already canceled their account.")
            }
            Self::InsufficientAllowance => {
                f.write_str("Sorry, you need to earn more points to invite more guests!")
            }
            Self::AccountCanceled => f.write_str("Sorry to see you go!"),
        }
    }
}

/// A single failed send attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Notification to '{recipient}' failed: {reason}")]
pub struct GatewayError {
    pub recipient: String,
    pub reason: String,
}

/// External message dispatch.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, recipient: &str, message: &Message) -> Result<(), GatewayError>;
}

/// Result of delivering one message under a retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered { attempts: u32 },
    Exhausted { attempts: u32, error: GatewayError },
}

impl Delivery {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Delivered { attempts } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Gateway plus the retry policy applied to every message.
#[derive(Clone)]
pub struct Notifier {
    gateway: Arc<dyn NotificationGateway>,
    retry: RetryPolicy,
}

impl Notifier {
    pub fn new(gateway: Arc<dyn NotificationGateway>, retry: RetryPolicy) -> Self {
        Self { gateway, retry }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Send `message`, retrying with backoff. Never returns an error: the
    /// outcome is reported for accounting and logging only.
    pub async fn deliver(&self, recipient: &str, message: &Message) -> Delivery {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.gateway.send(recipient, message).await {
                Ok(()) => return Delivery::Delivered { attempts: attempt },
                Err(error) if attempt >= max_attempts => {
                    warn!(
                        recipient,
                        attempts = attempt,
                        error = %error,
                        "Giving up on notification"
                    );
                    return Delivery::Exhausted {
                        attempts: attempt,
                        error,
                    };
                }
                Err(error) => {
                    let delay = self.retry.delay_for(attempt - 1);
                    debug!(recipient, attempt, ?delay, error = %error, "Notification attempt failed; retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_texts() {
        assert_eq!(
            Message::Welcome {
                tier: "Member".into()
            }
            .to_string(),
            "Welcome to our loyalty program! You're starting out at 'Member' status."
        );
        assert_eq!(
            Message::Promoted {
                tier: "Gold".into()
            }
            .to_string(),
            "Congratulations! You've been promoted to 'Gold' status!"
        );
        assert_eq!(
            Message::Demoted {
                tier: "Bronze".into()
            }
            .to_string(),
            "Unfortunately, you've lost enough points to bump you down to 'Bronze' status. 😞"
        );
        assert_eq!(Message::AccountCanceled.to_string(), "Sorry to see you go!");
    }

    #[tokio::test]
    async fn deliver_succeeds_first_try() {
        let gateway = Arc::new(RecordingGateway::new());
        let notifier = Notifier::new(gateway.clone(), RetryPolicy::immediate(3));

        let delivery = notifier.deliver("c1", &Message::GuestInvited).await;

        assert_eq!(delivery, Delivery::Delivered { attempts: 1 });
        assert_eq!(gateway.messages_for("c1"), vec![Message::GuestInvited]);
    }

    #[tokio::test]
    async fn deliver_retries_transient_failures() {
        let gateway = Arc::new(RecordingGateway::failing(2));
        let notifier = Notifier::new(gateway.clone(), RetryPolicy::immediate(3));

        let delivery = notifier.deliver("c1", &Message::AccountCanceled).await;

        assert_eq!(delivery.attempts(), 3);
        assert!(delivery.is_delivered());
        assert_eq!(gateway.sent().len(), 1);
    }

    #[tokio::test]
    async fn deliver_gives_up_after_max_attempts() {
        let gateway = Arc::new(RecordingGateway::failing(10));
        let notifier = Notifier::new(gateway.clone(), RetryPolicy::immediate(2));

        let delivery = notifier.deliver("c1", &Message::GuestInvited).await;

        assert!(matches!(delivery, Delivery::Exhausted { attempts: 2, .. }));
        assert!(gateway.sent().is_empty());
    }
}
