use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("User {0} never borrowed anything")]
    NotFound(String),

    #[error("Could not resolve user: {0}")]
    Resolution(String),

    #[error("Store did not respond within {0:?}")]
    Timeout(Duration),

    #[error("Store error: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

impl LedgerError {
    /// Errors caused by the request itself, as opposed to the store failing.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            LedgerError::Validation(_) | LedgerError::NotFound(_) | LedgerError::Resolution(_)
        )
    }
}
