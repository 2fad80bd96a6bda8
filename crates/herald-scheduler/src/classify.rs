//! Classifier — maps a record's status to the notification it is due, if any.
//! Pure: the caller supplies what was already sent, no ledger access here.

use std::collections::{BTreeSet, HashMap};

use herald_core::config::{StatusMapping, default_status_table};
use herald_core::types::{NotificationKind, NotificationRecord};

/// Status→kind lookup table.
#[derive(Debug, Clone)]
pub struct Classifier {
    table: HashMap<String, NotificationKind>,
}

impl Classifier {
    /// Build from config rows. Later rows win on a repeated status.
    pub fn new(mappings: &[StatusMapping]) -> Self {
        let table = mappings
            .iter()
            .map(|m| (normalize(&m.status), m.kind))
            .collect();
        Self { table }
    }

    /// Kind mapped to `status`, ignoring case and surrounding whitespace.
    pub fn kind_for(&self, status: &str) -> Option<NotificationKind> {
        self.table.get(&normalize(status)).copied()
    }

    /// The kind `record` is due, unless unmapped or already in `already_sent`.
    pub fn classify(
        &self,
        record: &NotificationRecord,
        already_sent: &BTreeSet<NotificationKind>,
    ) -> Option<NotificationKind> {
        self.kind_for(&record.status)
            .filter(|kind| !already_sent.contains(kind))
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&default_status_table())
    }
}

fn normalize(status: &str) -> String {
    status.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sent(kinds: &[NotificationKind]) -> BTreeSet<NotificationKind> {
        kinds.iter().copied().collect()
    }

    #[test]
    fn test_default_table() {
        let c = Classifier::default();
        let none = sent(&[]);
        assert_eq!(
            c.classify(&NotificationRecord::new("1", "new"), &none),
            Some(NotificationKind::Confirmation)
        );
        assert_eq!(
            c.classify(&NotificationRecord::new("1", "shipped"), &none),
            Some(NotificationKind::Shipping)
        );
        assert_eq!(
            c.classify(&NotificationRecord::new("1", "delivered"), &none),
            Some(NotificationKind::Delivery)
        );
    }

    #[test]
    fn test_already_sent_suppresses() {
        let c = Classifier::default();
        let record = NotificationRecord::new("1", "shipped");
        assert_eq!(
            c.classify(&record, &sent(&[NotificationKind::Shipping])),
            None
        );
        // Other kinds in the set do not matter.
        assert_eq!(
            c.classify(&record, &sent(&[NotificationKind::Confirmation])),
            Some(NotificationKind::Shipping)
        );
    }

    #[test]
    fn test_skipping_stages_is_allowed() {
        let c = Classifier::default();
        // Never confirmed or shipped, but delivered now.
        let record = NotificationRecord::new("9", "delivered");
        assert_eq!(
            c.classify(&record, &sent(&[])),
            Some(NotificationKind::Delivery)
        );
    }

    #[test]
    fn test_unknown_status_is_none() {
        let c = Classifier::default();
        assert_eq!(c.classify(&NotificationRecord::new("1", "refunded"), &sent(&[])), None);
        assert_eq!(c.classify(&NotificationRecord::new("1", ""), &sent(&[])), None);
    }

    #[test]
    fn test_status_matching_is_lenient() {
        let c = Classifier::default();
        assert_eq!(c.kind_for("  Shipped "), Some(NotificationKind::Shipping));
        assert_eq!(c.kind_for("NEW"), Some(NotificationKind::Confirmation));
    }

    #[test]
    fn test_custom_table() {
        let c = Classifier::new(&[
            StatusMapping::new("paid", NotificationKind::Confirmation),
            StatusMapping::new("in_transit", NotificationKind::Shipping),
        ]);
        assert_eq!(c.kind_for("paid"), Some(NotificationKind::Confirmation));
        assert_eq!(c.kind_for("new"), None);
    }
}
