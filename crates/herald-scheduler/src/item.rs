//! Scheduled item model — what a reminder batch is made of.

use chrono::{DateTime, Utc};
use herald_core::types::{BatchSummary, EventReminder};

/// An event as submitted, before it is accepted or ignored.
#[derive(Debug, Clone)]
pub struct RawEvent<P> {
    pub payload: P,
    pub event_time: DateTime<Utc>,
    pub fire_time: DateTime<Utc>,
}

impl<P> RawEvent<P> {
    /// Fire `lead` before `event_time`; None if that leaves chrono's range.
    pub fn new(payload: P, event_time: DateTime<Utc>, lead: chrono::Duration) -> Option<Self> {
        let fire_time = event_time.checked_sub_signed(lead)?;
        Some(Self::at(payload, event_time, fire_time))
    }

    /// Fire at an already computed instant.
    pub fn at(payload: P, event_time: DateTime<Utc>, fire_time: DateTime<Utc>) -> Self {
        Self {
            payload,
            event_time,
            fire_time,
        }
    }
}

impl From<EventReminder> for RawEvent<EventReminder> {
    fn from(reminder: EventReminder) -> Self {
        let (event_time, fire_time) = (reminder.event_time, reminder.fire_time);
        Self::at(reminder, event_time, fire_time)
    }
}

/// An event whose fire time had already passed at submission.
#[derive(Debug, Clone)]
pub struct IgnoredEvent<P> {
    pub payload: P,
    pub event_time: DateTime<Utc>,
    pub fire_time: DateTime<Utc>,
}

/// What a scheduled item carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload<P> {
    /// A real event.
    Event(P),
    /// The synthetic trailing item.
    Complete(BatchSummary),
}

/// One entry of the release timeline. Never mutated once built.
#[derive(Debug, Clone)]
pub struct ScheduledItem<P> {
    /// Submission order; the tie-breaker for equal fire times.
    pub seq: usize,
    pub fire_time: DateTime<Utc>,
    pub payload: Payload<P>,
}

impl<P> ScheduledItem<P> {
    pub fn is_terminal(&self) -> bool {
        matches!(self.payload, Payload::Complete(_))
    }
}

/// Lifecycle of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Collecting,
    Sorted,
    Releasing,
    Done,
}

impl std::fmt::Display for BatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchState::Collecting => write!(f, "collecting"),
            BatchState::Sorted => write!(f, "sorted"),
            BatchState::Releasing => write!(f, "releasing"),
            BatchState::Done => write!(f, "done"),
        }
    }
}

/// A planned batch: the ordered timeline plus what was turned away.
#[derive(Debug)]
pub struct Batch<P> {
    pub(crate) state: BatchState,
    pub(crate) items: Vec<ScheduledItem<P>>,
    pub(crate) ignored: Vec<IgnoredEvent<P>>,
}

impl<P> Batch<P> {
    /// `Sorted` when there is something to release, otherwise already `Done`.
    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Timeline in release order, trailing item included.
    pub fn items(&self) -> &[ScheduledItem<P>] {
        &self.items
    }

    pub fn ignored(&self) -> &[IgnoredEvent<P>] {
        &self.ignored
    }

    /// Real items only.
    pub fn scheduled_count(&self) -> usize {
        self.items.iter().filter(|i| !i.is_terminal()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_time_is_event_time_minus_lead() {
        let at = Utc::now();
        let ev = RawEvent::new("x", at, chrono::Duration::minutes(15)).unwrap();
        assert_eq!(ev.fire_time, at - chrono::Duration::minutes(15));
    }

    #[test]
    fn test_overflowing_lead_is_rejected() {
        assert!(RawEvent::new("x", DateTime::<Utc>::MIN_UTC, chrono::Duration::minutes(1)).is_none());
        assert!(RawEvent::new("x", Utc::now(), chrono::Duration::days(365 * 400_000)).is_none());
    }

    #[test]
    fn test_from_reminder_keeps_its_fire_time() {
        let at = Utc::now();
        let reminder = EventReminder::new("standup", at, 10, "Standup").unwrap();
        let ev = RawEvent::from(reminder.clone());
        assert_eq!(ev.event_time, at);
        assert_eq!(ev.fire_time, reminder.fire_time);
        assert_eq!(ev.payload, reminder);
    }
}
