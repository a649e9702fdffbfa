//! Journal entries and postings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::Money;

use crate::account::Account;
use crate::error::{LedgerError, Result};

/// Posting direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Debit,
    Credit,
}

impl Direction {
    /// Returns the opposite direction.
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Debit => Direction::Credit,
            Direction::Credit => Direction::Debit,
        }
    }

    /// Returns the stable code used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Debit => "DEBIT",
            Direction::Credit => "CREDIT",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "DEBIT" => Ok(Direction::Debit),
            "CREDIT" => Ok(Direction::Credit),
            other => Err(LedgerError::InvalidStored(format!("direction {other}"))),
        }
    }
}

/// The business transaction a journal entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    AuthHold,
    Capture,
    Settlement,
    PspFee,
    Payout,
}

impl TransactionType {
    /// Returns the stable code used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::AuthHold => "AUTH_HOLD",
            TransactionType::Capture => "CAPTURE",
            TransactionType::Settlement => "SETTLEMENT",
            TransactionType::PspFee => "PSP_FEE",
            TransactionType::Payout => "PAYOUT",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TransactionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AUTH_HOLD" => Ok(TransactionType::AuthHold),
            "CAPTURE" => Ok(TransactionType::Capture),
            "SETTLEMENT" => Ok(TransactionType::Settlement),
            "PSP_FEE" => Ok(TransactionType::PspFee),
            "PAYOUT" => Ok(TransactionType::Payout),
            other => Err(LedgerError::InvalidStored(format!(
                "transaction type {other}"
            ))),
        }
    }
}

/// One leg of a journal entry: a debit or credit of an amount to an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub direction: Direction,
    pub account: Account,
    pub amount: Money,
}

impl Posting {
    /// Creates a debit posting.
    pub fn debit(account: Account, amount: Money) -> Self {
        Self {
            direction: Direction::Debit,
            account,
            amount,
        }
    }

    /// Creates a credit posting.
    pub fn credit(account: Account, amount: Money) -> Self {
        Self {
            direction: Direction::Credit,
            account,
            amount,
        }
    }

    /// Signed balance delta for the target account, in minor units.
    ///
    /// Positive when the direction matches the account's normal polarity
    /// (the balance grows), negative otherwise.
    pub fn signed_minor_units(&self) -> i64 {
        if self.direction == self.account.normal_side() {
            self.amount.minor_units()
        } else {
            -self.amount.minor_units()
        }
    }
}

/// A balanced set of postings recording one business transaction.
///
/// The entry id is deterministic (e.g. `"AUTH:<paymentId>"`) and doubles as
/// the natural dedup key at insert time. Entries are validated on
/// construction and re-verified before persist: total debits must equal
/// total credits and all postings must share one currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    entry_id: String,
    transaction_type: TransactionType,
    postings: Vec<Posting>,
}

impl JournalEntry {
    /// Builds a journal entry, verifying the balance invariant.
    pub fn new(
        entry_id: impl Into<String>,
        transaction_type: TransactionType,
        postings: Vec<Posting>,
    ) -> Result<Self> {
        let entry = Self {
            entry_id: entry_id.into(),
            transaction_type,
            postings,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Returns the deterministic entry id.
    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    /// Returns the transaction type.
    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    /// Returns the ordered postings.
    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    /// Returns the currency shared by all postings.
    pub fn currency(&self) -> common::Currency {
        // validated non-empty on construction
        self.postings[0].amount.currency()
    }

    /// Verifies the balance invariant: Σ debits == Σ credits, one currency.
    pub fn validate(&self) -> Result<()> {
        let Some(first) = self.postings.first() else {
            return Err(LedgerError::EmptyEntry(self.entry_id.clone()));
        };

        let mut debits: i64 = 0;
        let mut credits: i64 = 0;
        for posting in &self.postings {
            if let Err(source) = first.amount.ensure_same_currency(posting.amount) {
                return Err(LedgerError::Money {
                    entry_id: self.entry_id.clone(),
                    source,
                });
            }
            match posting.direction {
                Direction::Debit => debits += posting.amount.minor_units(),
                Direction::Credit => credits += posting.amount.minor_units(),
            }
        }

        if debits != credits {
            return Err(LedgerError::Unbalanced {
                entry_id: self.entry_id.clone(),
                debits,
                credits,
            });
        }
        Ok(())
    }
}

/// A journal entry that has been durably posted.
///
/// Pairs the generated numeric id with the entry; only handed to callers
/// after a successful atomic post. The numeric id is the watermark unit for
/// balance snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub ledger_entry_id: i64,
    pub journal: JournalEntry,
    pub created_at: DateTime<Utc>,
}
