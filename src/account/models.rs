//! Data models for ledger accounts

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::validation::{AccountNumber, CurrencyCode};
use crate::core_types::{AccountId, UserId};

/// Account type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum AccountType {
    Checking = 1,
    Savings = 2,
    Credit = 3,
}

impl AccountType {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(AccountType::Checking),
            2 => Some(AccountType::Savings),
            3 => Some(AccountType::Credit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
            AccountType::Credit => "credit",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "checking" => Ok(AccountType::Checking),
            "savings" => Ok(AccountType::Savings),
            "credit" => Ok(AccountType::Credit),
            _ => Err(()),
        }
    }
}

/// Ledger account
///
/// `balance` is only ever written by a ledger unit of work (see
/// [`crate::store::UnitOfWork::apply_balance_delta`]); `version` increases by
/// one with every committed balance write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub owner_id: UserId,
    pub account_number: String,
    pub account_type: AccountType,
    pub currency: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
    pub is_active: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }
}

/// Parameters for opening an account; balance always starts at zero.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub owner_id: UserId,
    pub account_number: AccountNumber,
    pub account_type: AccountType,
    pub currency: CurrencyCode,
}

impl NewAccount {
    /// Account with a freshly generated account number
    pub fn new(owner_id: UserId, account_type: AccountType, currency: CurrencyCode) -> Self {
        Self {
            owner_id,
            account_number: AccountNumber::generate(),
            account_type,
            currency,
        }
    }

    /// Draw another account number after a uniqueness collision
    pub fn regenerate_number(&mut self) {
        self.account_number = AccountNumber::generate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_from_id() {
        assert_eq!(AccountType::from_id(1), Some(AccountType::Checking));
        assert_eq!(AccountType::from_id(3), Some(AccountType::Credit));
        assert_eq!(AccountType::from_id(0), None);
    }

    #[test]
    fn test_account_type_parse() {
        assert_eq!("Savings".parse(), Ok(AccountType::Savings));
        assert!("brokerage".parse::<AccountType>().is_err());
    }

    #[test]
    fn test_new_account_numbers_differ_after_regenerate() {
        let mut acct = NewAccount::new(7, AccountType::Checking, CurrencyCode::usd());
        let first = acct.account_number.clone();
        // 1 in 10^10 chance of drawing the same number twice
        acct.regenerate_number();
        assert_ne!(first, acct.account_number);
    }
}
