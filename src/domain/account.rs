use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Account identifier (RG): a string of 1 to 10 ASCII digits.
///
/// Construction is validating, so every `AccountId` in the system is
/// well-formed; the wire decoder can only produce valid ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    pub fn new(raw: impl Into<String>) -> Result<Self, AccountError> {
        let raw = raw.into();
        if raw.is_empty() || raw.len() > 10 || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AccountError::InvalidId(raw));
        }
        Ok(AccountId(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AccountId {
    type Error = AccountError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        AccountId::new(raw)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: Decimal,
}

impl Account {
    pub fn new(id: AccountId, balance: Decimal) -> Result<Self, AccountError> {
        if balance < Decimal::ZERO {
            return Err(AccountError::InvalidAmount(balance));
        }
        Ok(Account { id, balance })
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AccountError {
    #[error("Account not found")]
    NotFound,
    #[error("Transfer source account not found")]
    SourceNotFound,
    #[error("Transfer destination account not found")]
    DestinationNotFound,
    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },
    #[error("Cannot transfer from an account to itself")]
    SameAccount,
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),
    #[error("Invalid account id: {0:?}")]
    InvalidId(String),
}
