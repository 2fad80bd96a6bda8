//! Source traits — fetch the rows a run works on.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{EventReminder, NotificationRecord};

/// Produces the current state of every subject (orders sheet, API...).
#[async_trait]
pub trait RecordSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fails with [`crate::HeraldError::Fetch`]; callers treat that as "nothing to do".
    async fn fetch_records(&self) -> Result<Vec<NotificationRecord>>;
}

/// Produces the upcoming events of a reminder batch.
#[async_trait]
pub trait EventSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_events(&self) -> Result<Vec<EventReminder>>;
}
