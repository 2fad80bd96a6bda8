//! Reminder relay — the consumer side of a reminder batch.
//!
//! Released reminders go through [`Dispatcher::deliver`] under
//! [`NotificationKind::Reminder`], so a re-run over the same sheet finds them
//! in the ledger and stays quiet. The trailing item goes through
//! [`Dispatcher::announce`] and is sent once per batch.

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use herald_core::error::Result;
use herald_core::types::{EventReminder, NotificationKind};

use crate::clock::Clock;
use crate::deferred::{BatchOutcome, DeferredScheduler};
use crate::dispatch::{DeliveryOutcome, Dispatcher};
use crate::item::{Batch, Payload, RawEvent, ScheduledItem};

/// Turn source reminders into scheduler input.
pub fn reminder_events(reminders: Vec<EventReminder>) -> Vec<RawEvent<EventReminder>> {
    reminders.into_iter().map(RawEvent::from).collect()
}

pub struct ReminderRelay {
    dispatcher: Mutex<Dispatcher>,
}

impl ReminderRelay {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Mutex::new(dispatcher),
        }
    }

    /// Deliver one released item.
    pub async fn relay(&self, item: ScheduledItem<EventReminder>) -> Result<()> {
        match item.payload {
            Payload::Event(reminder) => {
                let outcome = self
                    .dispatcher
                    .lock()
                    .await
                    .deliver(&reminder.to_record(), NotificationKind::Reminder)
                    .await?;
                if let DeliveryOutcome::AlreadySent = outcome {
                    tracing::info!("⏭️ Reminder for '{}' was already sent", reminder.details);
                }
                Ok(())
            }
            Payload::Complete(summary) => self.dispatcher.lock().await.announce(&summary).await,
        }
    }

    /// Release `batch` on `scheduler`'s timeline, relaying every item.
    pub async fn release<C: Clock>(
        &self,
        scheduler: &DeferredScheduler<C>,
        batch: Batch<EventReminder>,
        cancel: &CancellationToken,
    ) -> BatchOutcome<EventReminder> {
        scheduler
            .release(batch, cancel, move |item| self.relay(item))
            .await
    }
}
