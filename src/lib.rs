pub mod application;
pub mod bot;
pub mod cli;
pub mod config;
pub mod domain;
pub mod logging;
pub mod storage;

pub use application::{LedgerError, LedgerService, LedgerSettings};
pub use domain::*;
pub use storage::Store;
