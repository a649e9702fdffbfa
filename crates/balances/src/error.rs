use thiserror::Error;

/// Errors that can occur in the balance cache/snapshot layer.
#[derive(Debug, Error)]
pub enum BalanceError {
    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A ledger error occurred while reading entry data.
    #[error("ledger error: {0}")]
    Ledger(#[from] ledger::LedgerError),
}

/// Result type for balance operations.
pub type Result<T> = std::result::Result<T, BalanceError>;
