//! Line-oriented wire protocol.
//!
//! One message per line, `|`-separated fields, each field a `key:value`
//! pair with a literal key. Requests start with an `op:<code>` field,
//! responses with an `s:<status>` field. Matching is anchored: every
//! field must be present in order and nothing may trail the last one,
//! so a line with extra tokens is rejected as a whole.

use crate::domain::AccountId;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

pub const OP_BALANCE: &str = "1";
pub const OP_WITHDRAW: &str = "2";
pub const OP_DEPOSIT: &str = "3";
pub const OP_TRANSFER: &str = "4";
// Op code 5 is reserved and never emitted.
pub const OP_LOGIN: &str = "6";

pub const STATUS_SUCCESS: &str = "0";
pub const STATUS_FAILURE: &str = "1";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("message does not match any known operation: {0:?}")]
    Unrecognized(String),
}

/// A client request, one variant per wire operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Login {
        id: AccountId,
    },
    Balance {
        id: AccountId,
    },
    Withdraw {
        id: AccountId,
        amount: Decimal,
    },
    Deposit {
        id: AccountId,
        amount: Decimal,
    },
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    },
}

/// A server reply: success or failure, both carrying a human-readable message.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Success(String),
    Failure(String),
}

impl Request {
    pub fn encode(&self) -> String {
        match self {
            Request::Balance { id } => format!("op:{}|rg:{}", OP_BALANCE, id),
            Request::Withdraw { id, amount } => {
                format!("op:{}|rg:{}|valor:{}", OP_WITHDRAW, id, amount)
            }
            Request::Deposit { id, amount } => {
                format!("op:{}|rg:{}|valor:{}", OP_DEPOSIT, id, amount)
            }
            Request::Transfer { from, to, amount } => format!(
                "op:{}|rg_origem:{}|rg_destino:{}|valor:{}",
                OP_TRANSFER, from, to, amount
            ),
            Request::Login { id } => format!("op:{}|rg:{}", OP_LOGIN, id),
        }
    }

    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        let unrecognized = || ProtocolError::Unrecognized(line.to_string());
        let mut fields = line.split('|');
        let op = fields
            .next()
            .and_then(|f| strip_key(f, "op"))
            .ok_or_else(unrecognized)?;

        let request = match op {
            OP_BALANCE | OP_LOGIN => {
                let id = decode_id(fields.next(), "rg").ok_or_else(unrecognized)?;
                if op == OP_BALANCE {
                    Request::Balance { id }
                } else {
                    Request::Login { id }
                }
            }
            OP_WITHDRAW | OP_DEPOSIT => {
                let id = decode_id(fields.next(), "rg").ok_or_else(unrecognized)?;
                let amount = decode_amount(fields.next()).ok_or_else(unrecognized)?;
                if op == OP_WITHDRAW {
                    Request::Withdraw { id, amount }
                } else {
                    Request::Deposit { id, amount }
                }
            }
            OP_TRANSFER => {
                let from = decode_id(fields.next(), "rg_origem").ok_or_else(unrecognized)?;
                let to = decode_id(fields.next(), "rg_destino").ok_or_else(unrecognized)?;
                let amount = decode_amount(fields.next()).ok_or_else(unrecognized)?;
                Request::Transfer { from, to, amount }
            }
            _ => return Err(unrecognized()),
        };

        // Anchored match: trailing fields invalidate the whole line.
        if fields.next().is_some() {
            return Err(unrecognized());
        }
        Ok(request)
    }
}

impl Response {
    pub fn encode(&self) -> String {
        match self {
            Response::Success(msg) => format!("s:{}|resposta:{}", STATUS_SUCCESS, msg),
            Response::Failure(msg) => format!("s:{}|resposta:{}", STATUS_FAILURE, msg),
        }
    }

    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        let unrecognized = || ProtocolError::Unrecognized(line.to_string());
        // The response text is free-form and may itself contain `|`,
        // so only the first separator is structural.
        let (status_field, rest) = line.split_once('|').ok_or_else(unrecognized)?;
        let status = strip_key(status_field, "s").ok_or_else(unrecognized)?;
        let message = strip_key(rest, "resposta").ok_or_else(unrecognized)?;

        match status {
            STATUS_SUCCESS => Ok(Response::Success(message.to_string())),
            STATUS_FAILURE => Ok(Response::Failure(message.to_string())),
            _ => Err(unrecognized()),
        }
    }
}

fn strip_key<'a>(field: &'a str, key: &str) -> Option<&'a str> {
    field
        .strip_prefix(key)
        .and_then(|rest| rest.strip_prefix(':'))
}

fn decode_id(field: Option<&str>, key: &str) -> Option<AccountId> {
    AccountId::new(strip_key(field?, key)?).ok()
}

fn decode_amount(field: Option<&str>) -> Option<Decimal> {
    Decimal::from_str(strip_key(field?, "valor")?).ok()
}
