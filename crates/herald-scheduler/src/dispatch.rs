//! Notification dispatch — classify, dedup against the ledger, send, record.
//!
//! Dedup is send-idempotent on success, not crash-atomic: the ledger entry
//! is written after the transport accepted the message, so a crash (or a
//! failed ledger write) between the two can cause one duplicate next run.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use herald_core::config::DispatchConfig;
use herald_core::error::Result;
use herald_core::traits::{Ledger, Transport};
use herald_core::types::{
    BatchSummary, LedgerEntry, NotificationKind, NotificationRecord, SubjectKey,
};

use crate::classify::Classifier;

/// Result of one (record, kind) delivery attempt that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// Sent now. `recorded` is false when the ledger write failed afterwards.
    Sent { recipient: String, recorded: bool },
    /// The ledger already had this pair; nothing was sent.
    AlreadySent,
}

/// A record whose notification could not be built or sent.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchFailure {
    pub subject_id: String,
    pub kind: NotificationKind,
    pub error: String,
}

/// Totals of one `process_all` batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub processed: usize,
    pub sent: usize,
    /// Records with nothing due (unmapped status or already notified).
    pub skipped: usize,
    pub failed: Vec<DispatchFailure>,
    /// Sent, but the ledger write failed; may be re-sent next run.
    pub unrecorded: Vec<SubjectKey>,
}

impl DispatchReport {
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

/// The dispatcher. Sequential; one batch at a time.
pub struct Dispatcher {
    ledger: Arc<dyn Ledger>,
    transport: Arc<dyn Transport>,
    classifier: Classifier,
    limits: DispatchConfig,
    /// Consecutive successful sends since the last pause.
    streak: usize,
}

impl Dispatcher {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        transport: Arc<dyn Transport>,
        classifier: Classifier,
        limits: DispatchConfig,
    ) -> Self {
        Self {
            ledger,
            transport,
            classifier,
            limits,
            streak: 0,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Process every record in input order. Never stops early: a failed
    /// record is logged and counted, and the next one is attempted.
    pub async fn process_all(&mut self, records: &[NotificationRecord]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for record in records {
            report.processed += 1;
            let already_sent = self.ledger.sent_kinds(&record.subject_id);
            let Some(kind) = self.classifier.classify(record, &already_sent) else {
                tracing::debug!(
                    "⏭️ {} (status '{}'): nothing due",
                    record.subject_id,
                    record.status
                );
                report.skipped += 1;
                continue;
            };

            match self.deliver(record, kind).await {
                Ok(DeliveryOutcome::Sent { recorded, .. }) => {
                    report.sent += 1;
                    if !recorded {
                        report
                            .unrecorded
                            .push(SubjectKey::new(record.subject_id.clone(), kind));
                    }
                }
                Ok(DeliveryOutcome::AlreadySent) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!("⚠️ {} for {} failed: {e}", kind, record.subject_id);
                    report.failed.push(DispatchFailure {
                        subject_id: record.subject_id.clone(),
                        kind,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "📊 Dispatch batch: {} processed, {} sent, {} skipped, {} failed",
            report.processed,
            report.sent,
            report.skipped,
            report.failed_count()
        );
        report
    }

    /// Deliver `kind` about `record` unless the ledger already has it.
    ///
    /// Errors are build or send failures; a ledger write failure after a
    /// successful send is reported as `Sent { recorded: false }`.
    pub async fn deliver(
        &mut self,
        record: &NotificationRecord,
        kind: NotificationKind,
    ) -> Result<DeliveryOutcome> {
        let key = SubjectKey::new(record.subject_id.clone(), kind);
        if self.ledger.contains(&key) {
            tracing::debug!("⏭️ {key} already sent");
            return Ok(DeliveryOutcome::AlreadySent);
        }

        let message = match self.transport.build_message(kind, record) {
            Ok(message) => message,
            Err(e) => {
                self.streak = 0;
                return Err(e);
            }
        };
        if let Err(e) = self.transport.send(&message).await {
            self.streak = 0;
            return Err(e);
        }
        tracing::info!(
            "📤 Sent {} for {} to {} via {}",
            kind,
            record.subject_id,
            message.to,
            self.transport.name()
        );

        let recorded = match self
            .ledger
            .record(LedgerEntry::new(key.clone(), message.to.clone(), Utc::now()))
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("❌ {key} sent but not recorded, may be re-sent next run: {e}");
                false
            }
        };

        self.throttle().await;
        Ok(DeliveryOutcome::Sent {
            recipient: message.to,
            recorded,
        })
    }

    /// Send the operator's "batch complete" message. Not deduplicated.
    pub async fn announce(&self, summary: &BatchSummary) -> Result<()> {
        let message = self.transport.build_batch_summary(summary)?;
        self.transport.send(&message).await?;
        tracing::info!(
            "🏁 Batch summary sent to {} ({} reminder(s))",
            message.to,
            summary.scheduled
        );
        Ok(())
    }

    async fn throttle(&mut self) {
        self.streak += 1;
        if self.streak >= self.limits.rate_limit_batch_size.max(1) {
            let pause = self.limits.pause();
            tracing::info!(
                "💤 {} sends in a row, pausing {:.1}s",
                self.streak,
                pause.as_secs_f64()
            );
            tokio::time::sleep(pause).await;
            self.streak = 0;
        }
    }
}
