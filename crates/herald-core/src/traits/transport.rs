//! Transport trait — renders and delivers one message.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{BatchSummary, Message, NotificationKind, NotificationRecord};

/// Message delivery (SMTP, log sink...).
///
/// Per-call timeouts are the transport's job; the dispatcher just awaits.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    /// Render the message for `kind` about `record`.
    fn build_message(&self, kind: NotificationKind, record: &NotificationRecord) -> Result<Message>;

    /// Render the operator's "batch complete" message.
    fn build_batch_summary(&self, summary: &BatchSummary) -> Result<Message>;

    /// Deliver one message. Fails with [`crate::HeraldError::Send`].
    async fn send(&self, message: &Message) -> Result<()>;
}
