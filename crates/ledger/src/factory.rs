//! Journal entry factories: fixed posting shapes per transaction type.
//!
//! Entry ids are deterministic per payment (`"AUTH:<paymentId>"` etc.) so a
//! replayed business event maps to the same entry and dedups at insert time.

use common::{Money, PaymentOrderId, SellerId};

use crate::account::{Account, AccountType};
use crate::error::Result;
use crate::journal::{JournalEntry, Posting, TransactionType};

fn platform(account_type: AccountType, amount: Money) -> Account {
    Account::platform(account_type, amount.currency())
}

/// Records an authorization hold: funds reserved on the cardholder's card.
///
/// Dr AUTH_RECEIVABLE, Cr AUTH_LIABILITY.
pub fn auth_hold(payment_id: PaymentOrderId, amount: Money) -> Result<JournalEntry> {
    JournalEntry::new(
        format!("AUTH:{payment_id}"),
        TransactionType::AuthHold,
        vec![
            Posting::debit(platform(AccountType::AuthReceivable, amount), amount),
            Posting::credit(platform(AccountType::AuthLiability, amount), amount),
        ],
    )
}

/// Records a capture: the hold is unwound and the captured amount becomes a
/// PSP receivable owed onward to the merchant.
///
/// Cr AUTH_RECEIVABLE, Dr AUTH_LIABILITY, Dr PSP_RECEIVABLES, Cr MERCHANT_ACCOUNT.
pub fn capture(payment_id: PaymentOrderId, amount: Money, merchant: &SellerId) -> Result<JournalEntry> {
    JournalEntry::new(
        format!("CAPTURE:{payment_id}"),
        TransactionType::Capture,
        vec![
            Posting::credit(platform(AccountType::AuthReceivable, amount), amount),
            Posting::debit(platform(AccountType::AuthLiability, amount), amount),
            Posting::debit(platform(AccountType::PspReceivables, amount), amount),
            Posting::credit(Account::merchant(merchant.as_str(), amount.currency()), amount),
        ],
    )
}

/// Records a settlement from the PSP: gross clears the receivable, the net
/// lands at the acquirer, scheme and interchange fees are expensed.
///
/// Dr ACQUIRER_ACCOUNT(gross−fees), Cr PSP_RECEIVABLES(gross),
/// Dr SCHEME_FEES, Dr INTERCHANGE_FEES.
pub fn settlement(
    payment_id: PaymentOrderId,
    gross: Money,
    scheme_fee: Money,
    interchange_fee: Money,
    acquirer: &str,
) -> Result<JournalEntry> {
    let net = gross
        .try_sub(scheme_fee)
        .and_then(|m| m.try_sub(interchange_fee))
        .map_err(|source| crate::error::LedgerError::Money {
            entry_id: format!("SETTLE:{payment_id}"),
            source,
        })?;

    JournalEntry::new(
        format!("SETTLE:{payment_id}"),
        TransactionType::Settlement,
        vec![
            Posting::debit(Account::acquirer(acquirer, gross.currency()), net),
            Posting::credit(platform(AccountType::PspReceivables, gross), gross),
            Posting::debit(platform(AccountType::SchemeFees, scheme_fee), scheme_fee),
            Posting::debit(
                platform(AccountType::InterchangeFees, interchange_fee),
                interchange_fee,
            ),
        ],
    )
}

/// Records a processing fee charged to a merchant.
///
/// Dr MERCHANT_ACCOUNT, Cr PROCESSING_FEE_REVENUE.
pub fn fee_registered(
    payment_id: PaymentOrderId,
    fee: Money,
    merchant: &SellerId,
) -> Result<JournalEntry> {
    JournalEntry::new(
        format!("FEE:{payment_id}"),
        TransactionType::PspFee,
        vec![
            Posting::debit(Account::merchant(merchant.as_str(), fee.currency()), fee),
            Posting::credit(platform(AccountType::ProcessingFeeRevenue, fee), fee),
        ],
    )
}

/// Records a payout to a merchant: both the merchant payable and the
/// acquirer cash position decrease.
///
/// Dr MERCHANT_ACCOUNT, Cr ACQUIRER_ACCOUNT.
pub fn payout(
    payment_id: PaymentOrderId,
    amount: Money,
    merchant: &SellerId,
    acquirer: &str,
) -> Result<JournalEntry> {
    JournalEntry::new(
        format!("PAYOUT:{payment_id}"),
        TransactionType::Payout,
        vec![
            Posting::debit(Account::merchant(merchant.as_str(), amount.currency()), amount),
            Posting::credit(Account::acquirer(acquirer, amount.currency()), amount),
        ],
    )
}

/// Records an authorization immediately followed by its capture, as two
/// sequential entries.
pub fn auth_hold_and_capture(
    payment_id: PaymentOrderId,
    amount: Money,
    merchant: &SellerId,
) -> Result<Vec<JournalEntry>> {
    Ok(vec![
        auth_hold(payment_id, amount)?,
        capture(payment_id, amount, merchant)?,
    ])
}

/// A failed payment leaves the ledger untouched.
pub fn failed_payment() -> Vec<JournalEntry> {
    Vec::new()
}
