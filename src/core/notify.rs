//! Notification sinks
//!
//! - [`Outbox`] keeps messages in memory per account, oldest first
//! - [`LogSink`] writes every message to the tracing log

use super::traits::NotificationSink;
use crate::types::{AccountId, Notification};
use dashmap::DashMap;
use tracing::info;

/// In-memory per-account message queue
#[derive(Debug, Default)]
pub struct Outbox {
    messages: DashMap<AccountId, Vec<String>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages queued for an account, oldest first
    pub fn messages_for(&self, account: AccountId) -> Vec<String> {
        self.messages
            .get(&account)
            .map(|queue| queue.clone())
            .unwrap_or_default()
    }

    /// Remove and return everything queued for an account
    pub fn drain(&self, account: AccountId) -> Vec<String> {
        self.messages
            .remove(&account)
            .map(|(_, queue)| queue)
            .unwrap_or_default()
    }

    /// Total number of queued messages
    pub fn len(&self) -> usize {
        self.messages.iter().map(|queue| queue.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSink for Outbox {
    fn enqueue(&self, account: AccountId, text: &str) {
        self.messages
            .entry(account)
            .or_default()
            .push(text.to_string());
    }
}

/// Sink that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn enqueue(&self, account: AccountId, text: &str) {
        info!(account, text, "notification");
    }
}

/// Hand committed notifications to a sink
pub fn deliver(sink: &dyn NotificationSink, notifications: &[Notification]) {
    for notification in notifications {
        sink.enqueue(notification.account, &notification.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbox_keeps_order_per_account() {
        let outbox = Outbox::new();
        deliver(
            &outbox,
            &[
                Notification::new(1, "first"),
                Notification::new(2, "other"),
                Notification::new(1, "second"),
            ],
        );

        assert_eq!(outbox.messages_for(1), vec!["first", "second"]);
        assert_eq!(outbox.messages_for(2), vec!["other"]);
        assert_eq!(outbox.len(), 3);
    }

    #[test]
    fn test_drain_empties_the_queue() {
        let outbox = Outbox::new();
        outbox.enqueue(1, "hello");

        assert_eq!(outbox.drain(1), vec!["hello"]);
        assert!(outbox.messages_for(1).is_empty());
        assert!(outbox.is_empty());
    }
}
