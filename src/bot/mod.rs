//! Chat-facing side of the ledger: command parsing, dispatch to the
//! [`LedgerService`](crate::application::LedgerService) and delivery of the
//! queued replies. The chat platform itself stays behind [`Channel`] and
//! [`IncomingMessage`]; [`ConsoleSession`] drives the same handler from a
//! terminal.

pub mod command;
pub mod console;
pub mod handler;

pub use command::{Command, extract_mentions};
pub use console::{ConsoleSession, WriterChannel};
pub use handler::{Channel, CommandHandler, IncomingMessage};
