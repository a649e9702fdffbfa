//! Chart of accounts.

use common::Currency;
use serde::{Deserialize, Serialize};

use crate::journal::Direction;

/// Accounting category of an account, fixing its normal-balance polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountCategory {
    Asset,
    Liability,
    Revenue,
    Expense,
}

impl AccountCategory {
    /// Returns the direction that increases balances in this category.
    pub fn normal_side(&self) -> Direction {
        match self {
            AccountCategory::Asset | AccountCategory::Expense => Direction::Debit,
            AccountCategory::Liability | AccountCategory::Revenue => Direction::Credit,
        }
    }
}

/// The account types touched by the settlement flows.
///
/// Each type carries a fixed category; the category determines whether a
/// debit or a credit increases the account's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    /// Funds authorized but not yet captured (our claim on the cardholder).
    AuthReceivable,
    /// The matching obligation for an open authorization hold.
    AuthLiability,
    /// Captured funds the PSP still owes us.
    PspReceivables,
    /// What we owe a merchant (payable).
    MerchantAccount,
    /// Our cash position at the acquiring bank.
    AcquirerAccount,
    /// Card scheme fees.
    SchemeFees,
    /// Interchange fees.
    InterchangeFees,
    /// Processing fees charged to merchants.
    ProcessingFeeRevenue,
}

impl AccountType {
    /// Returns the accounting category of this account type.
    pub fn category(&self) -> AccountCategory {
        match self {
            AccountType::AuthReceivable
            | AccountType::PspReceivables
            | AccountType::AcquirerAccount => AccountCategory::Asset,
            AccountType::AuthLiability | AccountType::MerchantAccount => {
                AccountCategory::Liability
            }
            AccountType::ProcessingFeeRevenue => AccountCategory::Revenue,
            AccountType::SchemeFees | AccountType::InterchangeFees => AccountCategory::Expense,
        }
    }

    /// Returns the direction that increases this account's balance.
    pub fn normal_side(&self) -> Direction {
        self.category().normal_side()
    }

    /// Returns the stable code used in account codes.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::AuthReceivable => "AUTH_RECEIVABLE",
            AccountType::AuthLiability => "AUTH_LIABILITY",
            AccountType::PspReceivables => "PSP_RECEIVABLES",
            AccountType::MerchantAccount => "MERCHANT_ACCOUNT",
            AccountType::AcquirerAccount => "ACQUIRER_ACCOUNT",
            AccountType::SchemeFees => "SCHEME_FEES",
            AccountType::InterchangeFees => "INTERCHANGE_FEES",
            AccountType::ProcessingFeeRevenue => "PROCESSING_FEE_REVENUE",
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An account instance: a type bound to an entity and a currency.
///
/// The account code `"{type}.{entityId}.{currency}"` is the stable natural
/// key used for posting rows and balance snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub account_type: AccountType,
    pub entity_id: String,
    pub currency: Currency,
}

impl Account {
    /// Creates an account for the given type, entity and currency.
    pub fn new(account_type: AccountType, entity_id: impl Into<String>, currency: Currency) -> Self {
        Self {
            account_type,
            entity_id: entity_id.into(),
            currency,
        }
    }

    /// Creates a platform-level account (entity `"platform"`).
    pub fn platform(account_type: AccountType, currency: Currency) -> Self {
        Self::new(account_type, "platform", currency)
    }

    /// Creates a merchant payable account for a seller.
    pub fn merchant(seller: impl Into<String>, currency: Currency) -> Self {
        Self::new(AccountType::MerchantAccount, seller, currency)
    }

    /// Creates a cash account at an acquiring bank.
    pub fn acquirer(acquirer: impl Into<String>, currency: Currency) -> Self {
        Self::new(AccountType::AcquirerAccount, acquirer, currency)
    }

    /// Returns the stable natural key `"{type}.{entityId}.{currency}"`.
    pub fn code(&self) -> String {
        format!(
            "{}.{}.{}",
            self.account_type.as_str(),
            self.entity_id,
            self.currency
        )
    }

    /// Returns the direction that increases this account's balance.
    pub fn normal_side(&self) -> Direction {
        self.account_type.normal_side()
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_polarity() {
        assert_eq!(AccountCategory::Asset.normal_side(), Direction::Debit);
        assert_eq!(AccountCategory::Expense.normal_side(), Direction::Debit);
        assert_eq!(AccountCategory::Liability.normal_side(), Direction::Credit);
        assert_eq!(AccountCategory::Revenue.normal_side(), Direction::Credit);
    }

    #[test]
    fn account_type_categories() {
        assert_eq!(AccountType::AuthReceivable.category(), AccountCategory::Asset);
        assert_eq!(AccountType::AuthLiability.category(), AccountCategory::Liability);
        assert_eq!(AccountType::MerchantAccount.category(), AccountCategory::Liability);
        assert_eq!(AccountType::SchemeFees.category(), AccountCategory::Expense);
        assert_eq!(
            AccountType::ProcessingFeeRevenue.category(),
            AccountCategory::Revenue
        );
    }

    #[test]
    fn account_code_is_stable_natural_key() {
        let account = Account::merchant("merchant-x", Currency::EUR);
        assert_eq!(account.code(), "MERCHANT_ACCOUNT.merchant-x.EUR");

        let platform = Account::platform(AccountType::AuthReceivable, Currency::EUR);
        assert_eq!(platform.code(), "AUTH_RECEIVABLE.platform.EUR");
    }

    #[test]
    fn same_type_different_entity_are_distinct_accounts() {
        let a = Account::merchant("merchant-x", Currency::EUR);
        let b = Account::merchant("merchant-y", Currency::EUR);
        assert_ne!(a.code(), b.code());
    }
}
