//! File-based ledger — one JSON entry per line, append-only.
//! Human-readable and easy to repair by hand: delete a line to allow a resend.
//! Loaded once at open; every record appends a line and updates the cache.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use herald_core::error::{HeraldError, Result};
use herald_core::traits::Ledger;
use herald_core::types::{LedgerEntry, SubjectKey};

use crate::memory::MemoryLedger;

/// JSON-lines ledger file.
pub struct FileLedger {
    path: PathBuf,
    cache: MemoryLedger,
    /// Serializes appends so lines never interleave.
    writer: Mutex<()>,
}

impl FileLedger {
    /// Open the ledger at `path`. A missing file is an empty ledger.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let cache = MemoryLedger::with_entries(Self::load(path));
        Ok(Self {
            path: path.to_path_buf(),
            cache,
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every well-formed line. Unreadable files and bad lines are skipped.
    fn load(path: &Path) -> Vec<LedgerEntry> {
        if !path.exists() {
            tracing::info!("📒 No ledger at {}, starting empty", path.display());
            return Vec::new();
        }
        // Lossy: a damaged byte costs only the line it sits on.
        let content = match std::fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                tracing::error!("⚠️ Failed to read ledger {}: {e}", path.display());
                return Vec::new();
            }
        };

        let mut entries = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LedgerEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(
                    "⚠️ Skipping malformed ledger line {} in {}: {e}",
                    lineno + 1,
                    path.display()
                ),
            }
        }
        tracing::debug!("📒 Loaded {} entries from {}", entries.len(), path.display());
        entries
    }

    fn append(&self, entry: &LedgerEntry) -> Result<()> {
        let line = serde_json::to_string(entry)
            .map_err(|e| HeraldError::Write(format!("Serialize entry: {e}")))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| HeraldError::Write(format!("Open {}: {e}", self.path.display())))?;
        writeln!(file, "{line}")
            .and_then(|_| file.flush())
            .map_err(|e| HeraldError::Write(format!("Append {}: {e}", self.path.display())))?;
        Ok(())
    }
}

impl Ledger for FileLedger {
    fn name(&self) -> &str {
        "file"
    }

    fn contains(&self, key: &SubjectKey) -> bool {
        self.cache.contains(key)
    }

    fn record(&self, entry: LedgerEntry) -> Result<()> {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if self.cache.contains(&entry.key()) {
            return Ok(());
        }
        self.append(&entry)?;
        self.cache.record(entry)
    }

    fn entries(&self) -> Vec<LedgerEntry> {
        self.cache.entries()
    }

    fn len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use herald_core::types::NotificationKind;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("herald-file-ledger-{name}"));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    fn entry(id: &str, kind: NotificationKind) -> LedgerEntry {
        LedgerEntry::new(SubjectKey::new(id, kind), "bob@example.com", Utc::now())
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = test_dir("missing");
        let ledger = FileLedger::open(&dir.join("sent.jsonl")).unwrap();
        assert!(ledger.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_survives_reopen() {
        let dir = test_dir("reopen");
        let path = dir.join("sent.jsonl");
        {
            let ledger = FileLedger::open(&path).unwrap();
            ledger.record(entry("42", NotificationKind::Shipping)).unwrap();
            ledger.record(entry("42", NotificationKind::Shipping)).unwrap();
        }
        let reopened = FileLedger::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.contains(&SubjectKey::new("42", NotificationKind::Shipping)));
        let lines = std::fs::read_to_string(&path).unwrap().lines().count();
        assert_eq!(lines, 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = test_dir("malformed");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sent.jsonl");
        let good = serde_json::to_string(&entry("5", NotificationKind::Confirmation)).unwrap();
        std::fs::write(&path, format!("not json\n{good}\n{{\"half\":\n")).unwrap();

        let ledger = FileLedger::open(&path).unwrap();
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains(&SubjectKey::new("5", NotificationKind::Confirmation)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_utf8_loses_only_its_line() {
        let dir = test_dir("utf8");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sent.jsonl");
        let first = serde_json::to_string(&entry("1", NotificationKind::Confirmation)).unwrap();
        let last = serde_json::to_string(&entry("3", NotificationKind::Delivery)).unwrap();
        let mut bytes = format!("{first}\n").into_bytes();
        bytes.extend_from_slice(b"{\"subject_id\":\"\xff\xfe\"}\n");
        bytes.extend_from_slice(format!("{last}\n").as_bytes());
        std::fs::write(&path, bytes).unwrap();

        let ledger = FileLedger::open(&path).unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.contains(&SubjectKey::new("1", NotificationKind::Confirmation)));
        assert!(ledger.contains(&SubjectKey::new("3", NotificationKind::Delivery)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unreadable_store_degrades_to_empty() {
        let dir = test_dir("unreadable");
        // A directory where the file should be cannot be read as text.
        let path = dir.join("sent.jsonl");
        std::fs::create_dir_all(&path).unwrap();
        let ledger = FileLedger::open(&path).unwrap();
        assert!(ledger.is_empty());
        let err = ledger
            .record(entry("1", NotificationKind::Delivery))
            .unwrap_err();
        assert!(matches!(err, HeraldError::Write(_)));
        assert!(!ledger.contains(&SubjectKey::new("1", NotificationKind::Delivery)));
        std::fs::remove_dir_all(&dir).ok();
    }
}
