//! Deferred Scheduler — releases a static batch of events at their fire times.
//!
//! One batch is one timeline: items are released strictly one after another,
//! never concurrently. `now` is re-read before every wait, so slow deliveries
//! push later items back rather than forward, and an item whose time has
//! already passed fires at once instead of being skipped.

use std::fmt::Display;
use std::future::Future;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use herald_core::types::BatchSummary;

use crate::clock::{Clock, SystemClock};
use crate::item::{Batch, BatchState, IgnoredEvent, Payload, RawEvent, ScheduledItem};

/// A release whose consumer reported an error.
#[derive(Debug, Clone)]
pub struct ReleaseFailure {
    pub fire_time: DateTime<Utc>,
    pub terminal: bool,
    pub error: String,
}

/// Final report of one batch.
#[derive(Debug)]
pub struct BatchOutcome<P> {
    /// Real items handed to the consumer (trailing item excluded).
    pub released_count: usize,
    pub ignored: Vec<IgnoredEvent<P>>,
    pub failures: Vec<ReleaseFailure>,
    /// Whether the "batch complete" item went out.
    pub terminal_released: bool,
    pub cancelled: bool,
    /// Items never released because the batch was cancelled.
    pub pending: usize,
}

impl<P> BatchOutcome<P> {
    pub fn ignored_count(&self) -> usize {
        self.ignored.len()
    }

    pub fn state(&self) -> BatchState {
        BatchState::Done
    }

    fn empty(ignored: Vec<IgnoredEvent<P>>) -> Self {
        Self {
            released_count: 0,
            ignored,
            failures: Vec::new(),
            terminal_released: false,
            cancelled: false,
            pending: 0,
        }
    }
}

/// The deferred scheduler.
pub struct DeferredScheduler<C: Clock = SystemClock> {
    clock: C,
    trailing_offset: chrono::Duration,
}

impl DeferredScheduler<SystemClock> {
    pub fn new(trailing_offset: chrono::Duration) -> Self {
        Self::with_clock(SystemClock, trailing_offset)
    }
}

impl<C: Clock> DeferredScheduler<C> {
    pub fn with_clock(clock: C, trailing_offset: chrono::Duration) -> Self {
        Self {
            clock,
            trailing_offset,
        }
    }

    /// Collect and sort: accept future events, turn away past-due ones, and
    /// append the trailing item when anything was accepted.
    pub fn plan<P>(&self, events: Vec<RawEvent<P>>) -> Batch<P> {
        let now = self.clock.now();
        let mut items = Vec::with_capacity(events.len() + 1);
        let mut ignored = Vec::new();

        for (seq, event) in events.into_iter().enumerate() {
            let fire_time = event.fire_time;
            if fire_time < now {
                tracing::info!(
                    "⏭️ Ignoring event at {} (fire time {} already passed)",
                    event.event_time,
                    fire_time
                );
                ignored.push(IgnoredEvent {
                    payload: event.payload,
                    event_time: event.event_time,
                    fire_time,
                });
            } else {
                tracing::debug!("📅 Event accepted, fires at {fire_time}");
                items.push(ScheduledItem {
                    seq,
                    fire_time,
                    payload: Payload::Event(event.payload),
                });
            }
        }

        // Stable: equal fire times keep submission order.
        items.sort_by_key(|item| item.fire_time);

        let Some(last_fire_time) = items.last().map(|item| item.fire_time) else {
            tracing::info!("📭 Nothing to schedule ({} ignored)", ignored.len());
            return Batch {
                state: BatchState::Done,
                items,
                ignored,
            };
        };

        let scheduled = items.len();
        let trailing_fire_time = last_fire_time
            .checked_add_signed(self.trailing_offset)
            .unwrap_or_else(|| {
                tracing::warn!("⚠️ Trailing offset overflows, completing right after the last item");
                last_fire_time
            });
        items.push(ScheduledItem {
            seq: scheduled + ignored.len(),
            fire_time: trailing_fire_time,
            payload: Payload::Complete(BatchSummary {
                scheduled,
                last_fire_time,
            }),
        });

        tracing::info!(
            "📅 Scheduled {} item(s), {} ignored, last at {}",
            scheduled,
            ignored.len(),
            last_fire_time
        );
        Batch {
            state: BatchState::Sorted,
            items,
            ignored,
        }
    }

    /// Release every item of `batch` at its fire time.
    ///
    /// `cancel` is checked before each wait and raced against it; once it
    /// fires, the rest of the batch is counted as pending and not released.
    pub async fn release<P, F, Fut, E>(
        &self,
        batch: Batch<P>,
        cancel: &CancellationToken,
        mut deliver: F,
    ) -> BatchOutcome<P>
    where
        F: FnMut(ScheduledItem<P>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let Batch {
            state,
            items,
            ignored,
        } = batch;
        let mut outcome = BatchOutcome::empty(ignored);
        if state == BatchState::Done {
            return outcome;
        }

        tracing::debug!("⏰ Batch {} → {}", BatchState::Sorted, BatchState::Releasing);
        let mut remaining = items.into_iter();
        while let Some(item) = remaining.next() {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                outcome.pending = 1 + remaining.len();
                break;
            }

            let wait = item.fire_time - self.clock.now();
            if wait > chrono::Duration::zero() {
                let wait = wait.to_std().unwrap_or_default();
                tracing::info!(
                    "⏳ Waiting {:.1}s until {} to release next item",
                    wait.as_secs_f64(),
                    item.fire_time
                );
                tokio::select! {
                    _ = cancel.cancelled() => {
                        outcome.cancelled = true;
                        outcome.pending = 1 + remaining.len();
                        break;
                    }
                    _ = tokio::time::sleep(wait) => {}
                }
            } else if wait < chrono::Duration::zero() {
                tracing::debug!(
                    "🏃 Releasing late by {}ms",
                    (-wait).num_milliseconds()
                );
            }

            let fire_time = item.fire_time;
            let terminal = item.is_terminal();
            if terminal {
                outcome.terminal_released = true;
            } else {
                outcome.released_count += 1;
            }

            if let Err(e) = deliver(item).await {
                tracing::warn!("⚠️ Delivery for item due at {fire_time} failed: {e}");
                outcome.failures.push(ReleaseFailure {
                    fire_time,
                    terminal,
                    error: e.to_string(),
                });
            }
        }

        if outcome.cancelled {
            tracing::warn!(
                "🛑 Batch cancelled with {} item(s) not released",
                outcome.pending
            );
        }
        tracing::info!(
            "✅ Batch done: {} released, {} failed, {} ignored",
            outcome.released_count,
            outcome.failures.len(),
            outcome.ignored_count()
        );
        outcome
    }

    /// Plan and release in one go.
    pub async fn run<P, F, Fut, E>(
        &self,
        events: Vec<RawEvent<P>>,
        cancel: &CancellationToken,
        deliver: F,
    ) -> BatchOutcome<P>
    where
        F: FnMut(ScheduledItem<P>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let batch = self.plan(events);
        self.release(batch, cancel, deliver).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use std::sync::{Arc, Mutex};

    fn minutes(m: i64) -> chrono::Duration {
        chrono::Duration::minutes(m)
    }

    fn scheduler(origin: DateTime<Utc>) -> DeferredScheduler<TokioClock> {
        DeferredScheduler::with_clock(TokioClock::new(origin), minutes(5))
    }

    fn event(name: &'static str, origin: DateTime<Utc>, offset: i64) -> RawEvent<&'static str> {
        RawEvent::at(name, origin + minutes(offset), origin + minutes(offset))
    }

    type Log = Arc<Mutex<Vec<(Payload<&'static str>, DateTime<Utc>)>>>;

    fn recorder(
        clock: TokioClock,
        log: Log,
    ) -> impl FnMut(ScheduledItem<&'static str>) -> std::future::Ready<Result<(), String>> {
        move |item| {
            log.lock().unwrap().push((item.payload, clock.now()));
            std::future::ready(Ok(()))
        }
    }

    fn assert_close(actual: DateTime<Utc>, expected: DateTime<Utc>) {
        let drift = actual - expected;
        assert!(
            drift >= chrono::Duration::zero() && drift < chrono::Duration::seconds(1),
            "released at {actual}, expected {expected}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_releases_in_fire_time_order_then_terminal() {
        let origin = Utc::now();
        let sched = scheduler(origin);
        let log: Log = Arc::default();
        let events = vec![
            event("t30", origin, 30),
            event("t5", origin, 5),
            event("t10", origin, 10),
        ];

        let outcome = sched
            .run(events, &CancellationToken::new(), recorder(sched.clock, log.clone()))
            .await;

        assert_eq!(outcome.released_count, 3);
        assert!(outcome.terminal_released);
        assert!(outcome.failures.is_empty());
        let log = log.lock().unwrap();
        let names: Vec<_> = log.iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(
            names,
            vec![
                Payload::Event("t5"),
                Payload::Event("t10"),
                Payload::Event("t30"),
                Payload::Complete(BatchSummary {
                    scheduled: 3,
                    last_fire_time: origin + minutes(30),
                }),
            ]
        );
        assert_close(log[0].1, origin + minutes(5));
        assert_close(log[1].1, origin + minutes(10));
        assert_close(log[2].1, origin + minutes(30));
        assert_close(log[3].1, origin + minutes(35));
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_due_events_are_ignored() {
        let origin = Utc::now();
        let sched = scheduler(origin);
        let log: Log = Arc::default();
        let events = vec![
            // Event in an hour, but the reminder was due 30 minutes ago.
            RawEvent::new("late", origin + minutes(60), minutes(90)).unwrap(),
            event("soon", origin, 1),
        ];

        let outcome = sched
            .run(events, &CancellationToken::new(), recorder(sched.clock, log.clone()))
            .await;

        assert_eq!(outcome.ignored_count(), 1);
        assert_eq!(outcome.ignored[0].payload, "late");
        assert_eq!(outcome.ignored[0].fire_time, origin - minutes(30));
        assert_eq!(outcome.released_count, 1);
        let log = log.lock().unwrap();
        assert!(log.iter().all(|(p, _)| *p != Payload::Event("late")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_batch_short_circuits() {
        let origin = Utc::now();
        let sched = scheduler(origin);
        let log: Log = Arc::default();

        let batch = sched.plan(vec![RawEvent::new("old", origin - minutes(1), minutes(0)).unwrap()]);
        assert_eq!(batch.state(), BatchState::Done);
        assert!(batch.items().is_empty());

        let outcome = sched
            .release(batch, &CancellationToken::new(), recorder(sched.clock, log.clone()))
            .await;
        assert_eq!(outcome.released_count, 0);
        assert!(!outcome.terminal_released);
        assert_eq!(outcome.ignored_count(), 1);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_fire_times_keep_submission_order() {
        let origin = Utc::now();
        let sched = scheduler(origin);
        let batch = sched.plan(vec![
            event("b", origin, 10),
            event("a", origin, 10),
            event("c", origin, 2),
        ]);
        let order: Vec<_> = batch.items().iter().map(|i| i.payload.clone()).collect();
        assert_eq!(order[0], Payload::Event("c"));
        assert_eq!(order[1], Payload::Event("b"));
        assert_eq!(order[2], Payload::Event("a"));
        assert!(batch.items()[3].is_terminal());
        assert_eq!(batch.scheduled_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trailing_offset_overflow_completes_with_last_item() {
        let origin = Utc::now();
        let sched = scheduler(origin);
        let edge = DateTime::<Utc>::MAX_UTC;
        let batch = sched.plan(vec![RawEvent::at("edge", edge, edge)]);
        assert_eq!(batch.items().len(), 2);
        assert!(batch.items()[1].is_terminal());
        assert_eq!(batch.items()[1].fire_time, edge);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_due_exactly_now_is_accepted() {
        let origin = Utc::now();
        let sched = scheduler(origin);
        let batch = sched.plan(vec![event("now", origin, 0)]);
        assert_eq!(batch.scheduled_count(), 1);
        assert!(batch.ignored().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_does_not_stop_batch() {
        let origin = Utc::now();
        let sched = scheduler(origin);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();

        let outcome = sched
            .run(
                vec![event("bad", origin, 1), event("good", origin, 2)],
                &CancellationToken::new(),
                move |item: ScheduledItem<&'static str>| {
                    seen2.lock().unwrap().push(item.payload.clone());
                    let result = match item.payload {
                        Payload::Event("bad") => Err("smtp rejected"),
                        _ => Ok(()),
                    };
                    std::future::ready(result)
                },
            )
            .await;

        assert_eq!(outcome.released_count, 2);
        assert_eq!(outcome.failures.len(), 1);
        assert!(!outcome.failures[0].terminal);
        assert!(outcome.terminal_released);
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_delivery_makes_next_item_late_not_skipped() {
        let origin = Utc::now();
        let sched = scheduler(origin);
        let clock = sched.clock;
        let log: Log = Arc::default();
        let log2 = log.clone();

        let outcome = sched
            .run(
                vec![event("slow", origin, 1), event("next", origin, 3)],
                &CancellationToken::new(),
                move |item: ScheduledItem<&'static str>| {
                    let log = log2.clone();
                    async move {
                        log.lock().unwrap().push((item.payload.clone(), clock.now()));
                        if item.payload == Payload::Event("slow") {
                            tokio::time::sleep(std::time::Duration::from_secs(600)).await;
                        }
                        Ok::<(), String>(())
                    }
                },
            )
            .await;

        assert_eq!(outcome.released_count, 2);
        let log = log.lock().unwrap();
        // "next" was due at +3 but the first delivery ran until +11.
        assert_close(log[1].1, origin + minutes(11));
        // Trailing item is still anchored to the last fire time.
        assert_close(log[2].1, origin + minutes(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_before_next_wait() {
        let origin = Utc::now();
        let sched = scheduler(origin);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let count = Arc::new(Mutex::new(0usize));
        let count2 = count.clone();

        let outcome = sched
            .run(
                vec![
                    event("one", origin, 1),
                    event("two", origin, 20),
                    event("three", origin, 40),
                ],
                &cancel,
                move |_item: ScheduledItem<&'static str>| {
                    *count2.lock().unwrap() += 1;
                    trigger.cancel();
                    std::future::ready(Ok::<(), String>(()))
                },
            )
            .await;

        assert!(outcome.cancelled);
        assert_eq!(outcome.released_count, 1);
        assert_eq!(outcome.pending, 3);
        assert!(!outcome.terminal_released);
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_a_long_wait() {
        let origin = Utc::now();
        let sched = scheduler(origin);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let outcome = sched
            .run(
                vec![event("far", origin, 24 * 60)],
                &cancel,
                |_item: ScheduledItem<&'static str>| std::future::ready(Ok::<(), String>(())),
            )
            .await;

        assert!(outcome.cancelled);
        assert_eq!(outcome.released_count, 0);
        assert_eq!(outcome.pending, 2);
        assert!(started.elapsed() < std::time::Duration::from_secs(120));
    }
}
