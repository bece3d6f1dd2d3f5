pub mod account;

pub use account::{Account, AccountError, AccountId};
