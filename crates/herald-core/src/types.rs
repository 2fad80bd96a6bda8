//! Data model shared by sources, the dispatcher, ledgers and transports.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HeraldError;

/// One stage in a subject's notification sequence.
///
/// Variants are declared in sequence order, so the derived `Ord` is the
/// stage order. A subject gets at most one send per kind, ever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Order received.
    Confirmation,
    /// Order left the warehouse.
    Shipping,
    /// Order arrived.
    Delivery,
    /// Upcoming calendar event.
    Reminder,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 4] = [
        NotificationKind::Confirmation,
        NotificationKind::Shipping,
        NotificationKind::Delivery,
        NotificationKind::Reminder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Confirmation => "confirmation",
            NotificationKind::Shipping => "shipping",
            NotificationKind::Delivery => "delivery",
            NotificationKind::Reminder => "reminder",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = HeraldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirmation" => Ok(NotificationKind::Confirmation),
            "shipping" => Ok(NotificationKind::Shipping),
            "delivery" => Ok(NotificationKind::Delivery),
            "reminder" => Ok(NotificationKind::Reminder),
            other => Err(HeraldError::Config(format!(
                "unknown notification kind '{other}'"
            ))),
        }
    }
}

/// One row of source truth, as read from the record source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Stable identifier of the subject (order id, event id).
    pub subject_id: String,
    /// Current lifecycle state.
    pub status: String,
    /// Everything else on the row; only templates look inside.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl NotificationRecord {
    pub fn new(subject_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            status: status.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Attribute value, treating blank cells as absent.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Composite dedup key: one subject, one kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubjectKey {
    pub subject_id: String,
    pub kind: NotificationKind,
}

impl SubjectKey {
    pub fn new(subject_id: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            subject_id: subject_id.into(),
            kind,
        }
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subject_id, self.kind)
    }
}

/// A notification that has been delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub subject_id: String,
    pub kind: NotificationKind,
    pub recipient: String,
    pub sent_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(key: SubjectKey, recipient: impl Into<String>, sent_at: DateTime<Utc>) -> Self {
        Self {
            subject_id: key.subject_id,
            kind: key.kind,
            recipient: recipient.into(),
            sent_at,
        }
    }

    pub fn key(&self) -> SubjectKey {
        SubjectKey::new(self.subject_id.clone(), self.kind)
    }
}

/// A rendered message, ready for a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Recipient address.
    pub to: String,
    /// Display name of the recipient, if known.
    pub to_name: Option<String>,
    /// Sender display name; the transport's default when `None`.
    #[serde(default)]
    pub from_name: Option<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

/// One upcoming calendar event that wants a reminder ahead of time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventReminder {
    pub event_id: String,
    pub event_time: DateTime<Utc>,
    /// How long before `event_time` the reminder fires.
    pub lead_minutes: i64,
    /// `event_time - lead_minutes`, checked at construction.
    pub fire_time: DateTime<Utc>,
    pub details: String,
}

impl EventReminder {
    /// None when the lead is out of range or the fire time would overflow.
    pub fn new(
        event_id: impl Into<String>,
        event_time: DateTime<Utc>,
        lead_minutes: i64,
        details: impl Into<String>,
    ) -> Option<Self> {
        let lead = chrono::Duration::try_minutes(lead_minutes)?;
        let fire_time = event_time.checked_sub_signed(lead)?;
        Some(Self {
            event_id: event_id.into(),
            event_time,
            lead_minutes,
            fire_time,
            details: details.into(),
        })
    }

    /// The record form used when a reminder goes through the dispatcher.
    pub fn to_record(&self) -> NotificationRecord {
        NotificationRecord::new(self.event_id.clone(), "reminder_due")
            .with_attr("event_time", self.event_time.to_rfc3339())
            .with_attr("details", self.details.clone())
    }
}

/// Payload of the trailing "batch complete" item of a reminder batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Real items in the batch (the trailing item itself is not counted).
    pub scheduled: usize,
    /// Fire time of the last real item.
    pub last_fire_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_order_follows_stages() {
        assert!(NotificationKind::Confirmation < NotificationKind::Shipping);
        assert!(NotificationKind::Shipping < NotificationKind::Delivery);
        let mut kinds = vec![
            NotificationKind::Delivery,
            NotificationKind::Confirmation,
            NotificationKind::Shipping,
        ];
        kinds.sort();
        assert_eq!(kinds, NotificationKind::ALL[..3].to_vec());
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(
            " Shipping ".parse::<NotificationKind>().unwrap(),
            NotificationKind::Shipping
        );
        assert!("refund".parse::<NotificationKind>().is_err());
    }

    #[test]
    fn test_kind_serde_snake_case() {
        let json = serde_json::to_string(&NotificationKind::Delivery).unwrap();
        assert_eq!(json, "\"delivery\"");
    }

    #[test]
    fn test_subject_keys_do_not_collide() {
        // "a_b" + shipping vs "a" + "b_shipping" would collide as joined strings.
        let k1 = SubjectKey::new("a_b", NotificationKind::Shipping);
        let k2 = SubjectKey::new("a", NotificationKind::Shipping);
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_reminder_fire_time() {
        let at = DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let r = EventReminder::new("standup", at, 15, "Team standup").unwrap();
        assert_eq!(r.fire_time, at - chrono::Duration::minutes(15));
        let record = r.to_record();
        assert_eq!(record.subject_id, "standup");
        assert_eq!(record.attr("details"), Some("Team standup"));
    }

    #[test]
    fn test_reminder_with_out_of_range_lead_is_rejected() {
        let at = Utc::now();
        assert!(EventReminder::new("x", at, 999_999_999_999_999_999, "Huge").is_none());
        assert!(EventReminder::new("x", at, i64::MIN, "Huge").is_none());
        // In range for a Duration, but the fire time leaves chrono's calendar.
        assert!(EventReminder::new("x", at, 200_000_000_000, "Far").is_none());
        assert!(EventReminder::new("x", at, -15, "After").is_some());
    }

    #[test]
    fn test_blank_attr_is_absent() {
        let r = NotificationRecord::new("1", "new")
            .with_attr("tracking_number", "  ")
            .with_attr("customer_name", " Ann ");
        assert_eq!(r.attr("tracking_number"), None);
        assert_eq!(r.attr("customer_name"), Some("Ann"));
        assert_eq!(r.attr("missing"), None);
    }
}
