//! CSV sources — the orders sheet and the events sheet.
//!
//! A source location is either an `http(s)://` URL (a published spreadsheet
//! export, say) or a local file path. Parsing is split from loading so the
//! row handling can be tested without I/O.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use herald_core::config::OrdersConfig;
use herald_core::error::{HeraldError, Result};
use herald_core::traits::{EventSource, RecordSource};
use herald_core::types::{EventReminder, NotificationRecord};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const DATE_COLUMN: &str = "Date";
const TIME_COLUMN: &str = "Time";
const LEAD_COLUMN: &str = "Reminder Before (minutes)";
const DETAILS_COLUMN: &str = "Details";
const ID_COLUMN: &str = "Id";

/// Fetch the raw CSV text from a URL or a file.
async fn load(location: &str) -> Result<String> {
    if location.is_empty() {
        return Err(HeraldError::Fetch("no source configured".into()));
    }

    if location.starts_with("http://") || location.starts_with("https://") {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| HeraldError::Fetch(format!("HTTP client: {e}")))?;
        let resp = client
            .get(location)
            .send()
            .await
            .map_err(|e| HeraldError::Fetch(format!("GET {location}: {e}")))?;
        if !resp.status().is_success() {
            return Err(HeraldError::Fetch(format!(
                "GET {location}: HTTP {}",
                resp.status()
            )));
        }
        resp.text()
            .await
            .map_err(|e| HeraldError::Fetch(format!("read body: {e}")))
    } else {
        let path = shellexpand::tilde(location).to_string();
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| HeraldError::Fetch(format!("read {path}: {e}")))
    }
}

fn reader(text: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes())
}

// ── Orders ───────────────────────────────────────────────

/// Orders sheet: one row per order, every column kept as an attribute.
pub struct CsvRecordSource {
    location: String,
    id_column: String,
    status_column: String,
}

impl CsvRecordSource {
    pub fn new(config: &OrdersConfig) -> Self {
        Self {
            location: config.source.clone(),
            id_column: config.id_column.clone(),
            status_column: config.status_column.clone(),
        }
    }

    /// Rows without an id are skipped; a missing status reads as empty.
    pub fn parse(&self, text: &str) -> Result<Vec<NotificationRecord>> {
        let mut rdr = reader(text);
        let headers = rdr
            .headers()
            .map_err(|e| HeraldError::Fetch(format!("CSV header: {e}")))?
            .clone();

        let mut records = Vec::new();
        for (line, row) in rdr.records().enumerate() {
            let row = match row {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("⚠️ Skipping orders row {}: {e}", line + 2);
                    continue;
                }
            };

            let mut record = NotificationRecord::new("", "");
            for (name, value) in headers.iter().zip(row.iter()) {
                record = record.with_attr(name, value);
            }
            let Some(id) = record.attr(&self.id_column).map(String::from) else {
                tracing::warn!("⚠️ Skipping orders row {}: no '{}'", line + 2, self.id_column);
                continue;
            };
            record.subject_id = id;
            record.status = record
                .attr(&self.status_column)
                .unwrap_or_default()
                .to_string();
            records.push(record);
        }
        Ok(records)
    }
}

#[async_trait]
impl RecordSource for CsvRecordSource {
    fn name(&self) -> &str {
        "csv-orders"
    }

    async fn fetch_records(&self) -> Result<Vec<NotificationRecord>> {
        let text = load(&self.location).await?;
        let records = self.parse(&text)?;
        tracing::info!("📥 Loaded {} orders from {}", records.len(), self.location);
        Ok(records)
    }
}

// ── Events ───────────────────────────────────────────────

/// Events sheet: `Date`, `Time`, `Reminder Before (minutes)`, `Details`, optional `Id`.
pub struct CsvEventSource {
    location: String,
}

impl CsvEventSource {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    pub fn parse(text: &str) -> Result<Vec<EventReminder>> {
        let mut rdr = reader(text);
        let headers = rdr
            .headers()
            .map_err(|e| HeraldError::Fetch(format!("CSV header: {e}")))?
            .clone();
        let col = |name: &str| headers.iter().position(|h| h == name);

        let (Some(date_i), Some(time_i), Some(lead_i), Some(details_i)) = (
            col(DATE_COLUMN),
            col(TIME_COLUMN),
            col(LEAD_COLUMN),
            col(DETAILS_COLUMN),
        ) else {
            return Err(HeraldError::Fetch(format!(
                "events sheet needs columns {DATE_COLUMN}, {TIME_COLUMN}, {LEAD_COLUMN}, {DETAILS_COLUMN}"
            )));
        };
        let id_i = col(ID_COLUMN);

        let mut events = Vec::new();
        for (line, row) in rdr.records().enumerate() {
            let row = match row {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("⚠️ Skipping events row {}: {e}", line + 2);
                    continue;
                }
            };
            let get = |i: usize| row.get(i).unwrap_or_default();

            let Some(event_time) = parse_local(get(date_i), get(time_i)) else {
                tracing::warn!(
                    "⚠️ Skipping events row {}: bad date/time '{} {}'",
                    line + 2,
                    get(date_i),
                    get(time_i)
                );
                continue;
            };
            let Ok(lead_minutes) = get(lead_i).parse::<i64>() else {
                tracing::warn!(
                    "⚠️ Skipping events row {}: bad reminder lead '{}'",
                    line + 2,
                    get(lead_i)
                );
                continue;
            };
            let details = get(details_i);
            let event_id = match id_i.map(get).filter(|id| !id.is_empty()) {
                Some(id) => id.to_string(),
                None => format!("{}|{details}", event_time.to_rfc3339()),
            };

            let Some(event) = EventReminder::new(event_id, event_time, lead_minutes, details)
            else {
                tracing::warn!(
                    "⚠️ Skipping events row {}: reminder lead '{}' out of range",
                    line + 2,
                    get(lead_i)
                );
                continue;
            };
            events.push(event);
        }
        Ok(events)
    }
}

/// `%m/%d/%Y` + `%I:%M:%S %p` in local time, as UTC. None inside a DST gap.
fn parse_local(date: &str, time: &str) -> Option<chrono::DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date, "%m/%d/%Y").ok()?;
    let time = NaiveTime::parse_from_str(time, "%I:%M:%S %p").ok()?;
    Local
        .from_local_datetime(&NaiveDateTime::new(date, time))
        .earliest()
        .map(|t| t.with_timezone(&Utc))
}

#[async_trait]
impl EventSource for CsvEventSource {
    fn name(&self) -> &str {
        "csv-events"
    }

    async fn fetch_events(&self) -> Result<Vec<EventReminder>> {
        let text = load(&self.location).await?;
        let events = Self::parse(&text)?;
        tracing::info!("📥 Loaded {} events from {}", events.len(), self.location);
        Ok(events)
    }
}
