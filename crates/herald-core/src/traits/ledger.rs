//! Ledger trait — the durable "already notified" set.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::types::{LedgerEntry, NotificationKind, SubjectKey};

/// Append-only record of delivered (subject, kind) pairs.
///
/// Implementations must make `contains` reflect every successful `record`
/// in the same process, and durable ones every completed earlier run.
/// Recording a key that is already present is a no-op, never a second entry.
pub trait Ledger: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Whether this pair was already delivered.
    fn contains(&self, key: &SubjectKey) -> bool;

    /// Append a delivered pair. Fails with [`crate::HeraldError::Write`].
    fn record(&self, entry: LedgerEntry) -> Result<()>;

    /// All entries, oldest first.
    fn entries(&self) -> Vec<LedgerEntry>;

    /// Every kind already delivered for `subject_id`.
    fn sent_kinds(&self, subject_id: &str) -> BTreeSet<NotificationKind> {
        NotificationKind::ALL
            .into_iter()
            .filter(|kind| self.contains(&SubjectKey::new(subject_id, *kind)))
            .collect()
    }

    fn len(&self) -> usize {
        self.entries().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
