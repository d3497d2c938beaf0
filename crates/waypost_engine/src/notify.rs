//! Fire-and-forget runtime notifications.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use waypost_protocol::RuntimeMessage;

/// Outcome of a fire-and-forget send.
///
/// "Nobody was listening" is an ordinary outcome, not an error: the
/// side panel may simply be closed. Callers pattern-match on the
/// variants instead of catching anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// At least one listener received the message.
    Delivered,
    /// No listener was attached.
    NoReceiver,
}

/// The host runtime messaging channel, sending side.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Broadcasts a message to whoever is listening.
    async fn send(&self, message: RuntimeMessage) -> Delivery;
}

/// A sink that records every message, for testing.
#[derive(Debug)]
pub struct RecordingSink {
    messages: Mutex<Vec<RuntimeMessage>>,
    receiver_attached: AtomicBool,
}

impl RecordingSink {
    /// Creates a sink with a listener attached.
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            receiver_attached: AtomicBool::new(true),
        }
    }

    /// Detaches or re-attaches the simulated listener.
    pub fn set_receiver_attached(&self, attached: bool) {
        self.receiver_attached.store(attached, Ordering::SeqCst);
    }

    /// Returns every message sent so far, delivered or not.
    pub fn messages(&self) -> Vec<RuntimeMessage> {
        self.messages.lock().clone()
    }

    /// Counts sent messages matching the predicate.
    pub fn count_matching(&self, predicate: impl Fn(&RuntimeMessage) -> bool) -> usize {
        self.messages.lock().iter().filter(|m| predicate(m)).count()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send(&self, message: RuntimeMessage) -> Delivery {
        self.messages.lock().push(message);
        if self.receiver_attached.load(Ordering::SeqCst) {
            Delivery::Delivered
        } else {
            Delivery::NoReceiver
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_regardless_of_listener() {
        let sink = RecordingSink::new();
        assert_eq!(sink.send(RuntimeMessage::QueueSynced).await, Delivery::Delivered);

        sink.set_receiver_attached(false);
        assert_eq!(sink.send(RuntimeMessage::QueueSynced).await, Delivery::NoReceiver);

        assert_eq!(sink.messages().len(), 2);
    }
}
