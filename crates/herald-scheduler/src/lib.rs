//! # Herald Scheduler
//!
//! Turns source rows into at-most-once notifications, now or later.
//!
//! ## Architecture
//! ```text
//! records ──► Classifier ──► Dispatcher ──► Ledger.contains?
//!                               │              └─ no ─► Transport.send ─► Ledger.record
//!                               └─ pause every N consecutive sends
//!
//! events ──► DeferredScheduler
//!              Collecting: fire_time = event_time − lead, past-due → ignored
//!              Sorted:     stable sort by fire_time, + trailing "batch complete"
//!              Releasing:  sleep until fire_time (cancellable) → consumer
//!              Done:       BatchOutcome
//!
//! ReminderRelay: reminder ──► Dispatcher.deliver(Reminder), trailing ──► Dispatcher.announce
//! ```

pub mod classify;
pub mod clock;
pub mod deferred;
pub mod dispatch;
pub mod item;
pub mod reminders;

pub use classify::Classifier;
pub use clock::{Clock, SystemClock, TokioClock};
pub use deferred::{BatchOutcome, DeferredScheduler, ReleaseFailure};
pub use dispatch::{DeliveryOutcome, DispatchFailure, DispatchReport, Dispatcher};
pub use item::{Batch, BatchState, IgnoredEvent, Payload, RawEvent, ScheduledItem};
pub use reminders::{ReminderRelay, reminder_events};
