//! In-memory authoritative account ledger.
//!
//! Every operation, reads included, runs under one process-wide lock.
//! Coarse, but it makes the transfer debit+credit pair trivially atomic
//! and rules out lost updates between connections. The lock is a
//! `std::sync::Mutex` and is never held across an await point; the
//! critical sections are pure map work.

use crate::domain::{Account, AccountError, AccountId};
use crate::infrastructure::store::AccountStore;
use anyhow::{bail, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug)]
pub struct AccountLedger {
    accounts: Mutex<HashMap<AccountId, Decimal>>,
}

impl AccountLedger {
    /// Seeds the ledger from the provisioning store. Called once at
    /// startup; the ledger owns the state for the process lifetime and
    /// never creates accounts after this point.
    pub async fn from_store(store: &dyn AccountStore) -> Result<Self> {
        let accounts = store.load_accounts().await?;
        Self::with_accounts(accounts)
    }

    pub fn with_accounts(accounts: Vec<Account>) -> Result<Self> {
        let mut map = HashMap::with_capacity(accounts.len());
        for account in accounts {
            if map.insert(account.id.clone(), account.balance).is_some() {
                bail!("duplicate account id in store: {}", account.id);
            }
        }
        Ok(Self {
            accounts: Mutex::new(map),
        })
    }

    pub fn login(&self, id: &AccountId) -> Result<(), AccountError> {
        let accounts = self.lock();
        if accounts.contains_key(id) {
            Ok(())
        } else {
            Err(AccountError::NotFound)
        }
    }

    pub fn balance_of(&self, id: &AccountId) -> Result<Decimal, AccountError> {
        let accounts = self.lock();
        accounts.get(id).copied().ok_or(AccountError::NotFound)
    }

    pub fn withdraw(&self, id: &AccountId, amount: Decimal) -> Result<(), AccountError> {
        let mut accounts = self.lock();
        let balance = accounts.get_mut(id).ok_or(AccountError::NotFound)?;
        if *balance < amount {
            return Err(AccountError::InsufficientFunds {
                available: *balance,
                requested: amount,
            });
        }
        *balance -= amount;
        Ok(())
    }

    pub fn deposit(&self, id: &AccountId, amount: Decimal) -> Result<(), AccountError> {
        let mut accounts = self.lock();
        let balance = accounts.get_mut(id).ok_or(AccountError::NotFound)?;
        *balance += amount;
        Ok(())
    }

    pub fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Decimal,
    ) -> Result<(), AccountError> {
        if from == to {
            return Err(AccountError::SameAccount);
        }

        let mut accounts = self.lock();
        let available = *accounts.get(from).ok_or(AccountError::SourceNotFound)?;
        if !accounts.contains_key(to) {
            return Err(AccountError::DestinationNotFound);
        }
        if available < amount {
            return Err(AccountError::InsufficientFunds {
                available,
                requested: amount,
            });
        }

        // Both mutations happen under the same lock acquisition, so no
        // reader can observe the debit without the credit.
        *accounts.get_mut(from).ok_or(AccountError::SourceNotFound)? -= amount;
        *accounts.get_mut(to).ok_or(AccountError::DestinationNotFound)? += amount;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<AccountId, Decimal>> {
        // A panicked worker must not take the ledger down with it; the
        // map is consistent at every lock release, so recover the guard.
        self.accounts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn ledger(seed: &[(&str, Decimal)]) -> AccountLedger {
        let accounts = seed
            .iter()
            .map(|(id, balance)| Account::new(AccountId::new(*id).unwrap(), *balance).unwrap())
            .collect();
        AccountLedger::with_accounts(accounts).unwrap()
    }

    fn id(raw: &str) -> AccountId {
        AccountId::new(raw).unwrap()
    }

    #[test]
    fn deposit_then_withdraw_round_trips() {
        let ledger = ledger(&[("1", dec!(100))]);
        ledger.deposit(&id("1"), dec!(37.25)).unwrap();
        ledger.withdraw(&id("1"), dec!(37.25)).unwrap();
        assert_eq!(ledger.balance_of(&id("1")).unwrap(), dec!(100));
    }

    #[test]
    fn withdraw_rejects_insufficient_funds_and_leaves_balance_intact() {
        let ledger = ledger(&[("1", dec!(50))]);
        let err = ledger.withdraw(&id("1"), dec!(50.01)).unwrap_err();
        assert!(matches!(err, AccountError::InsufficientFunds { .. }));
        assert_eq!(ledger.balance_of(&id("1")).unwrap(), dec!(50));
    }

    #[test]
    fn operations_against_unknown_accounts_fail() {
        let ledger = ledger(&[("1", dec!(10))]);
        assert_eq!(ledger.login(&id("999")), Err(AccountError::NotFound));
        assert_eq!(ledger.balance_of(&id("999")), Err(AccountError::NotFound));
        assert_eq!(
            ledger.deposit(&id("999"), dec!(1)),
            Err(AccountError::NotFound)
        );
        assert_eq!(
            ledger.transfer(&id("999"), &id("1"), dec!(1)),
            Err(AccountError::SourceNotFound)
        );
        assert_eq!(
            ledger.transfer(&id("1"), &id("999"), dec!(1)),
            Err(AccountError::DestinationNotFound)
        );
    }

    #[test]
    fn transfer_preserves_the_sum_and_reverses_cleanly() {
        let ledger = ledger(&[("1", dec!(100)), ("2", dec!(0))]);
        ledger.transfer(&id("1"), &id("2"), dec!(50)).unwrap();
        assert_eq!(ledger.balance_of(&id("1")).unwrap(), dec!(50));
        assert_eq!(ledger.balance_of(&id("2")).unwrap(), dec!(50));

        ledger.transfer(&id("2"), &id("1"), dec!(50)).unwrap();
        assert_eq!(ledger.balance_of(&id("1")).unwrap(), dec!(100));
        assert_eq!(ledger.balance_of(&id("2")).unwrap(), dec!(0));
    }

    #[test]
    fn transfer_to_self_always_fails() {
        let ledger = ledger(&[("1", dec!(100))]);
        assert_eq!(
            ledger.transfer(&id("1"), &id("1"), dec!(1)),
            Err(AccountError::SameAccount)
        );
        assert_eq!(
            ledger.transfer(&id("1"), &id("1"), dec!(1000)),
            Err(AccountError::SameAccount)
        );
        assert_eq!(ledger.balance_of(&id("1")).unwrap(), dec!(100));
    }

    #[test]
    fn transfer_with_insufficient_funds_touches_neither_balance() {
        let ledger = ledger(&[("1", dec!(10)), ("2", dec!(5))]);
        let err = ledger.transfer(&id("1"), &id("2"), dec!(11)).unwrap_err();
        assert!(matches!(err, AccountError::InsufficientFunds { .. }));
        assert_eq!(ledger.balance_of(&id("1")).unwrap(), dec!(10));
        assert_eq!(ledger.balance_of(&id("2")).unwrap(), dec!(5));
    }

    #[test]
    fn concurrent_withdrawals_never_drive_a_balance_negative() {
        let ledger = Arc::new(ledger(&[("1", dec!(100))]));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || ledger.withdraw(&id("1"), dec!(60)))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 1, "exactly one withdrawal must win");
        assert_eq!(ledger.balance_of(&id("1")).unwrap(), dec!(40));
    }

    #[test]
    fn concurrent_transfers_preserve_the_total() {
        let ledger = Arc::new(ledger(&[("1", dec!(1000)), ("2", dec!(1000))]));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        if i % 2 == 0 {
                            let _ = ledger.transfer(&id("1"), &id("2"), dec!(3));
                        } else {
                            let _ = ledger.transfer(&id("2"), &id("1"), dec!(3));
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let total =
            ledger.balance_of(&id("1")).unwrap() + ledger.balance_of(&id("2")).unwrap();
        assert_eq!(total, dec!(2000));
        assert!(ledger.balance_of(&id("1")).unwrap() >= dec!(0));
        assert!(ledger.balance_of(&id("2")).unwrap() >= dec!(0));
    }

    #[tokio::test]
    async fn seeding_from_store_loads_every_account() {
        let mut store = crate::infrastructure::store::MockAccountStore::new();
        store.expect_load_accounts().returning(|| {
            Ok(vec![
                Account::new(AccountId::new("1").unwrap(), dec!(10)).unwrap(),
                Account::new(AccountId::new("2").unwrap(), dec!(0)).unwrap(),
            ])
        });

        let ledger = AccountLedger::from_store(&store).await.unwrap();
        assert_eq!(ledger.balance_of(&id("1")).unwrap(), dec!(10));
        assert_eq!(ledger.balance_of(&id("2")).unwrap(), dec!(0));
        assert_eq!(ledger.login(&id("3")), Err(AccountError::NotFound));
    }

    #[test]
    fn duplicate_store_ids_are_rejected() {
        let accounts = vec![
            Account::new(id("7"), dec!(1)).unwrap(),
            Account::new(id("7"), dec!(2)).unwrap(),
        ];
        assert!(AccountLedger::with_accounts(accounts).is_err());
    }
}
