//! # Herald Ledger
//!
//! Backends for the [`Ledger`] trait: the durable set of (subject, kind)
//! pairs that were already notified.
//!
//! ```text
//! MemoryLedger  — HashSet, gone at exit (tests, dry runs)
//! FileLedger    — JSON lines, one entry per line, append-only
//! SqliteLedger  — sent_notifications table keyed by (subject_id, kind)
//! ```
//!
//! All backends favour re-sending over crashing: an unreadable store loads
//! as empty and the run goes on.

pub mod file;
pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use herald_core::config::{LedgerBackend, LedgerConfig};
use herald_core::error::Result;
use herald_core::traits::Ledger;

pub use file::FileLedger;
pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;

/// Open the backend named in config.
pub fn open(config: &LedgerConfig) -> Result<Arc<dyn Ledger>> {
    let ledger: Arc<dyn Ledger> = match config.backend {
        LedgerBackend::Memory => Arc::new(MemoryLedger::new()),
        LedgerBackend::File => Arc::new(FileLedger::open(&config.resolved_path())?),
        LedgerBackend::Sqlite => Arc::new(SqliteLedger::open(&config.resolved_path())?),
    };
    tracing::info!(
        "📒 Ledger '{}' ready ({} entries)",
        ledger.name(),
        ledger.len()
    );
    Ok(ledger)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_memory_backend() {
        let config = LedgerConfig {
            backend: LedgerBackend::Memory,
            path: String::new(),
        };
        let ledger = open(&config).unwrap();
        assert_eq!(ledger.name(), "memory");
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_open_file_backend() {
        let dir = std::env::temp_dir().join("herald-ledger-open-test");
        let config = LedgerConfig {
            backend: LedgerBackend::File,
            path: dir.join("sent.jsonl").to_string_lossy().to_string(),
        };
        let ledger = open(&config).unwrap();
        assert_eq!(ledger.name(), "file");
        std::fs::remove_dir_all(&dir).ok();
    }
}
