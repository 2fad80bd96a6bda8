//! Collaborator traits: where records come from, how messages leave, and
//! where delivered notifications are remembered.

pub mod ledger;
pub mod source;
pub mod transport;

pub use ledger::Ledger;
pub use source::{EventSource, RecordSource};
pub use transport::Transport;
