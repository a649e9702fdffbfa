use common::MoneyError;
use thiserror::Error;

/// Errors that can occur in the ledger posting engine.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// An entry's debits and credits do not sum to the same amount.
    /// Silently posting such an entry would corrupt financial state.
    #[error("unbalanced journal entry {entry_id}: debits {debits} != credits {credits}")]
    Unbalanced {
        entry_id: String,
        debits: i64,
        credits: i64,
    },

    /// An entry was built with no postings.
    #[error("journal entry {0} has no postings")]
    EmptyEntry(String),

    /// Postings within one entry mix currencies.
    #[error("money error in entry {entry_id}: {source}")]
    Money {
        entry_id: String,
        #[source]
        source: MoneyError,
    },

    /// A stored row contained a value outside the closed code sets.
    #[error("invalid stored value: {0}")]
    InvalidStored(String),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
