//! The fallback sender that writes messages to the log instead of a broker.

use crate::error::MessagingResult;
use crate::manager::SenderStrategy;
use crate::message::{Message, MessageBody};
use crate::sender::MessageSender;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Sender used when no broker is configured. Every message is written to
/// the log at info level and then dropped.
#[derive(Debug, Default)]
pub struct LoggingSender {
    delivered: AtomicU64,
}

impl LoggingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages logged so far.
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MessageSender for LoggingSender {
    async fn deliver(&self, message: Message) -> MessagingResult<()> {
        let body = match &message.body {
            MessageBody::Text(text) => text.clone(),
            MessageBody::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        };
        info!(
            destination = %message.destination,
            headers = ?message.headers,
            %body,
            "message sent"
        );
        self.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn strategy(&self) -> Option<SenderStrategy> {
        Some(SenderStrategy::Logging)
    }
}
