//! # Herald Core
//!
//! Shared vocabulary for the Herald workspace: the record and ledger data
//! model, the collaborator traits (record sources, transports, ledgers),
//! the unified error type and the TOML configuration.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::HeraldConfig;
pub use error::{HeraldError, Result};
pub use types::{
    BatchSummary, EventReminder, LedgerEntry, Message, NotificationKind, NotificationRecord, SubjectKey,
};
