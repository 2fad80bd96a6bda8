//! In-process ledger. Nothing survives the process.

use std::collections::HashSet;
use std::sync::Mutex;

use herald_core::error::Result;
use herald_core::traits::Ledger;
use herald_core::types::{LedgerEntry, SubjectKey};

#[derive(Default)]
struct State {
    keys: HashSet<SubjectKey>,
    entries: Vec<LedgerEntry>,
}

/// Ledger backed by a `HashSet`.
#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<State>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with entries from elsewhere (duplicates are dropped).
    pub fn with_entries(entries: impl IntoIterator<Item = LedgerEntry>) -> Self {
        let ledger = Self::new();
        for entry in entries {
            ledger.insert(entry);
        }
        ledger
    }

    fn insert(&self, entry: LedgerEntry) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.keys.insert(entry.key()) {
            state.entries.push(entry);
            true
        } else {
            false
        }
    }
}

impl Ledger for MemoryLedger {
    fn name(&self) -> &str {
        "memory"
    }

    fn contains(&self, key: &SubjectKey) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.keys.contains(key)
    }

    fn record(&self, entry: LedgerEntry) -> Result<()> {
        if !self.insert(entry.clone()) {
            tracing::debug!("📒 {} already recorded", entry.key());
        }
        Ok(())
    }

    fn entries(&self) -> Vec<LedgerEntry> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.entries.clone()
    }

    fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use herald_core::types::NotificationKind;

    fn entry(id: &str, kind: NotificationKind) -> LedgerEntry {
        LedgerEntry::new(SubjectKey::new(id, kind), "ann@example.com", Utc::now())
    }

    #[test]
    fn test_record_then_contains() {
        let ledger = MemoryLedger::new();
        let key = SubjectKey::new("1001", NotificationKind::Confirmation);
        assert!(!ledger.contains(&key));
        ledger.record(entry("1001", NotificationKind::Confirmation)).unwrap();
        assert!(ledger.contains(&key));
        assert!(!ledger.contains(&SubjectKey::new("1001", NotificationKind::Shipping)));
    }

    #[test]
    fn test_duplicate_record_is_noop() {
        let ledger = MemoryLedger::new();
        ledger.record(entry("1001", NotificationKind::Delivery)).unwrap();
        ledger.record(entry("1001", NotificationKind::Delivery)).unwrap();
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_sent_kinds() {
        let ledger = MemoryLedger::with_entries([
            entry("7", NotificationKind::Confirmation),
            entry("7", NotificationKind::Delivery),
            entry("8", NotificationKind::Shipping),
        ]);
        let kinds: Vec<_> = ledger.sent_kinds("7").into_iter().collect();
        assert_eq!(
            kinds,
            vec![NotificationKind::Confirmation, NotificationKind::Delivery]
        );
        assert!(ledger.sent_kinds("9").is_empty());
    }
}
