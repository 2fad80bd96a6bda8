//! Dry-run transport: renders like the real one, logs instead of sending.

use std::sync::Mutex;

use async_trait::async_trait;
use herald_core::error::Result;
use herald_core::traits::Transport;
use herald_core::types::{BatchSummary, Message, NotificationKind, NotificationRecord};

use crate::templates::MessageBuilder;

pub struct LogTransport {
    templates: MessageBuilder,
    sent: Mutex<Vec<Message>>,
}

impl LogTransport {
    pub fn new(templates: MessageBuilder) -> Self {
        Self {
            templates,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Everything "sent" so far, in order.
    pub fn sent(&self) -> Vec<Message> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Transport for LogTransport {
    fn name(&self) -> &str {
        "log"
    }

    fn build_message(&self, kind: NotificationKind, record: &NotificationRecord) -> Result<Message> {
        self.templates.build(kind, record)
    }

    fn build_batch_summary(&self, summary: &BatchSummary) -> Result<Message> {
        self.templates.batch_summary(summary)
    }

    async fn send(&self, message: &Message) -> Result<()> {
        tracing::info!("📝 [dry-run] to={} subject=\"{}\"", message.to, message.subject);
        tracing::debug!("{}", message.text_body);
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());
        Ok(())
    }
}
