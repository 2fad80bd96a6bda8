//! SQLite-backed ledger — survives restarts, one row per (subject, kind).

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use herald_core::error::{HeraldError, Result};
use herald_core::traits::Ledger;
use herald_core::types::{LedgerEntry, NotificationKind, SubjectKey};

/// SQLite ledger store.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open or create the ledger database.
    ///
    /// A file that is not a usable database is logged and replaced by an
    /// in-memory database for this run, so the run still completes.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| HeraldError::Read(format!("DB open: {e}")))?;
        match Self::migrate(&conn) {
            Ok(()) => Ok(Self { conn: Mutex::new(conn) }),
            Err(e) => {
                tracing::error!(
                    "⚠️ Ledger database {} unusable ({e}), continuing with an empty ledger",
                    path.display()
                );
                Self::in_memory()
            }
        }
    }

    /// Fresh database that lives only as long as this value.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| HeraldError::Read(format!("DB open: {e}")))?;
        Self::migrate(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn migrate(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sent_notifications (
                subject_id TEXT NOT NULL,
                kind TEXT NOT NULL,              -- 'confirmation', 'shipping', 'delivery', 'reminder'
                recipient TEXT NOT NULL,
                sent_at TEXT NOT NULL,           -- RFC 3339
                PRIMARY KEY (subject_id, kind)
            );
            ",
        )
        .map_err(|e| HeraldError::Read(format!("Migration: {e}")))
    }
}

impl Ledger for SqliteLedger {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn contains(&self, key: &SubjectKey) -> bool {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let found = conn
            .query_row(
                "SELECT 1 FROM sent_notifications WHERE subject_id = ?1 AND kind = ?2",
                rusqlite::params![key.subject_id, key.kind.as_str()],
                |_| Ok(()),
            )
            .optional();
        match found {
            Ok(hit) => hit.is_some(),
            Err(e) => {
                tracing::warn!("⚠️ Ledger lookup for {key} failed: {e}");
                false
            }
        }
    }

    fn record(&self, entry: LedgerEntry) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT OR IGNORE INTO sent_notifications (subject_id, kind, recipient, sent_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                entry.subject_id,
                entry.kind.as_str(),
                entry.recipient,
                entry.sent_at.to_rfc3339(),
            ],
        )
        .map_err(|e| HeraldError::Write(format!("Record {}: {e}", entry.key())))?;
        Ok(())
    }

    fn entries(&self) -> Vec<LedgerEntry> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = match conn.prepare(
            "SELECT subject_id, kind, recipient, sent_at FROM sent_notifications ORDER BY sent_at",
        ) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("⚠️ Ledger listing failed: {e}");
                return Vec::new();
            }
        };

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        });

        let Ok(rows) = rows else {
            return Vec::new();
        };

        rows.filter_map(|r| r.ok())
            .filter_map(|(subject_id, kind, recipient, sent_at)| {
                let kind: NotificationKind = kind.parse().ok()?;
                let sent_at = DateTime::parse_from_rfc3339(&sent_at)
                    .ok()?
                    .with_timezone(&Utc);
                Some(LedgerEntry {
                    subject_id,
                    kind,
                    recipient,
                    sent_at,
                })
            })
            .collect()
    }

    fn len(&self) -> usize {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.query_row("SELECT COUNT(*) FROM sent_notifications", [], |r| {
            r.get::<_, i64>(0)
        })
        .unwrap_or(0) as usize
    }
}
