//! Monetary amounts in integer minor units.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ISO 4217 currency code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    EUR,
    USD,
    GBP,
    SEK,
    NOK,
    DKK,
}

impl Currency {
    /// Returns the three-letter currency code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::EUR => "EUR",
            Currency::USD => "USD",
            Currency::GBP => "GBP",
            Currency::SEK => "SEK",
            Currency::NOK => "NOK",
            Currency::DKK => "DKK",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EUR" => Ok(Currency::EUR),
            "USD" => Ok(Currency::USD),
            "GBP" => Ok(Currency::GBP),
            "SEK" => Ok(Currency::SEK),
            "NOK" => Ok(Currency::NOK),
            "DKK" => Ok(Currency::DKK),
            other => Err(MoneyError::UnknownCurrency(other.to_string())),
        }
    }
}

/// Errors raised by money arithmetic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    /// Two amounts in different currencies were combined.
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: Currency, right: Currency },

    /// An unrecognized currency code was parsed.
    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),
}

/// A monetary amount in integer minor units (e.g. cents) with its currency.
///
/// Amounts are signed; ledger postings carry the absolute amount and encode
/// direction separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units (e.g. 1000 = EUR 10.00).
    minor_units: i64,
    currency: Currency,
}

impl Money {
    /// Creates a new amount from minor units.
    pub fn from_minor(minor_units: i64, currency: Currency) -> Self {
        Self {
            minor_units,
            currency,
        }
    }

    /// Returns zero in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self {
            minor_units: 0,
            currency,
        }
    }

    /// Returns the amount in minor units.
    pub fn minor_units(&self) -> i64 {
        self.minor_units
    }

    /// Returns the currency.
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.minor_units == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.minor_units < 0
    }

    /// Adds another amount, failing on currency mismatch.
    pub fn try_add(&self, other: Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(Money {
            minor_units: self.minor_units + other.minor_units,
            currency: self.currency,
        })
    }

    /// Subtracts another amount, failing on currency mismatch.
    pub fn try_sub(&self, other: Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(Money {
            minor_units: self.minor_units - other.minor_units,
            currency: self.currency,
        })
    }

    /// Returns an error if the two amounts have different currencies.
    pub fn ensure_same_currency(&self, other: Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.minor_units, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn money_from_minor() {
        let m = Money::from_minor(1234, Currency::EUR);
        assert_eq!(m.minor_units(), 1234);
        assert_eq!(m.currency(), Currency::EUR);
    }

    #[test]
    fn money_try_add_same_currency() {
        let a = Money::from_minor(1000, Currency::EUR);
        let b = Money::from_minor(500, Currency::EUR);
        assert_eq!(a.try_add(b).unwrap().minor_units(), 1500);
        assert_eq!(a.try_sub(b).unwrap().minor_units(), 500);
    }

    #[test]
    fn money_try_add_rejects_mismatch() {
        let a = Money::from_minor(1000, Currency::EUR);
        let b = Money::from_minor(500, Currency::USD);
        assert_eq!(
            a.try_add(b),
            Err(MoneyError::CurrencyMismatch {
                left: Currency::EUR,
                right: Currency::USD,
            })
        );
    }

    #[test]
    fn currency_parse_roundtrip() {
        assert_eq!(Currency::from_str("EUR").unwrap(), Currency::EUR);
        assert_eq!(Currency::from_str("SEK").unwrap(), Currency::SEK);
        assert!(Currency::from_str("XXX").is_err());
    }

    #[test]
    fn money_display() {
        assert_eq!(Money::from_minor(10000, Currency::EUR).to_string(), "10000 EUR");
        assert_eq!(Money::from_minor(-250, Currency::USD).to_string(), "-250 USD");
    }

    #[test]
    fn money_serialization_roundtrip() {
        let m = Money::from_minor(9800, Currency::EUR);
        let json = serde_json::to_string(&m).unwrap();
        let deserialized: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(m, deserialized);
    }
}
