//! Account provisioning collaborator.
//!
//! Accounts are provisioned before the server starts; the ledger seeds
//! itself from the store once and owns the state from then on. The store
//! never sees balance mutations.

use crate::domain::{Account, AccountId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountStore: Send + Sync + 'static {
    /// Every provisioned account.
    async fn load_accounts(&self) -> Result<Vec<Account>>;

    /// A single account by id, `None` if not provisioned.
    async fn lookup(&self, id: &AccountId) -> Result<Option<Account>>;
}

/// Store backed by a JSON file: an array of `{ "id", "balance" }` objects,
/// balances serialized as strings.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AccountStore for JsonFileStore {
    async fn load_accounts(&self) -> Result<Vec<Account>> {
        let raw = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("reading accounts file {}", self.path.display()))?;
        let accounts: Vec<Account> = serde_json::from_slice(&raw)
            .with_context(|| format!("parsing accounts file {}", self.path.display()))?;
        Ok(accounts)
    }

    async fn lookup(&self, id: &AccountId) -> Result<Option<Account>> {
        let accounts = self.load_accounts().await?;
        Ok(accounts.into_iter().find(|account| &account.id == id))
    }
}

/// In-memory store, mainly for tests and fixtures.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    accounts: Vec<Account>,
}

impl MemoryStore {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn load_accounts(&self) -> Result<Vec<Account>> {
        Ok(self.accounts.clone())
    }

    async fn lookup(&self, id: &AccountId) -> Result<Option<Account>> {
        Ok(self
            .accounts
            .iter()
            .find(|account| &account.id == id)
            .cloned())
    }
}
