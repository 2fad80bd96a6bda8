//! # Herald Channels
//! The I/O edges of Herald: where rows come from and how messages leave.
//!
//! - [`source`] — orders and events sheets as CSV, over HTTP or from disk
//! - [`templates`] — per-kind subject, plain-text and HTML bodies
//! - [`email`] — SMTP delivery via lettre (STARTTLS)
//! - [`log`] — dry-run transport that only logs

pub mod email;
pub mod log;
pub mod source;
pub mod templates;

pub use email::EmailTransport;
pub use log::LogTransport;
pub use source::{CsvEventSource, CsvRecordSource};
pub use templates::MessageBuilder;
