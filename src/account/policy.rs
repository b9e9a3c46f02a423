//! Account Policy
//!
//! Pure predicates over account state. No I/O, no errors: the executor turns
//! a `false` into the matching domain error.

use rust_decimal::Decimal;

use super::models::Account;

/// Active and holding at least `amount`.
#[inline]
pub fn can_debit(account: &Account, amount: Decimal) -> bool {
    account.is_active && account.balance >= amount
}

#[inline]
pub fn can_credit(account: &Account) -> bool {
    account.is_active
}

#[inline]
pub fn currencies_match(a: &Account, b: &Account) -> bool {
    a.currency == b.currency
}
