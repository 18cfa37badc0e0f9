use super::ensure_active;
use super::locks::{LockKey, LockManager};
use crate::domain::account::{Account, AccountId, Balance, Locale};
use crate::domain::actor::Actor;
use crate::domain::ports::SharedLedgerStore;
use crate::error::Result;
use rust_decimal::Decimal;

/// Balance and reputation bookkeeping.
///
/// Every mutation runs under the account's lock as load, change, persist; the
/// caller sees success only after the store accepted the new record.
#[derive(Clone)]
pub struct AccountService {
    store: SharedLedgerStore,
    locks: LockManager,
}

impl AccountService {
    pub fn new(store: SharedLedgerStore, locks: LockManager) -> Self {
        Self { store, locks }
    }

    pub async fn get(&self, id: AccountId) -> Result<Account> {
        self.store.get_account(id).await
    }

    async fn mutate<T>(
        &self,
        id: AccountId,
        change: impl FnOnce(&mut Account) -> Result<T>,
    ) -> Result<(Account, T)> {
        let _held = self.locks.acquire([LockKey::Account(id)]).await?;
        let mut account = self.store.get_account(id).await?;
        let outcome = change(&mut account)?;
        self.store.put_account(account.clone()).await?;
        Ok((account, outcome))
    }

    /// Adds a signed delta; fails with `InsufficientFunds` instead of going negative.
    pub async fn adjust_balance(&self, id: AccountId, delta: Decimal) -> Result<Balance> {
        let (_, balance) = self
            .mutate(id, |account| account.adjust_balance(delta))
            .await?;
        tracing::info!(account = id, %delta, %balance, "balance adjusted");
        Ok(balance)
    }

    pub async fn increment_reputation(&self, id: AccountId) -> Result<u64> {
        let (_, count) = self
            .mutate(id, |account| Ok(account.record_settlement()))
            .await?;
        Ok(count)
    }

    /// Administrative override. Only non-negativity is enforced.
    pub async fn set_balance(&self, id: AccountId, value: Decimal) -> Result<Account> {
        let balance = Balance::new(value)?;
        let (account, _) = self
            .mutate(id, |account| {
                account.balance = balance;
                Ok(())
            })
            .await?;
        tracing::info!(account = id, %balance, "balance overridden");
        Ok(account)
    }

    /// Administrative override.
    pub async fn set_reputation(&self, id: AccountId, value: u64) -> Result<Account> {
        let (account, _) = self
            .mutate(id, |account| {
                account.reputation_count = value;
                Ok(())
            })
            .await?;
        tracing::info!(account = id, reputation = value, "reputation overridden");
        Ok(account)
    }

    /// An empty address clears it.
    pub async fn set_payout_address(&self, actor: &Actor, address: &str) -> Result<Account> {
        ensure_active(self.store.as_ref(), actor).await?;
        let address = address.trim();
        let (account, _) = self
            .mutate(actor.id, |account| {
                account.payout_address = (!address.is_empty()).then(|| address.to_string());
                Ok(())
            })
            .await?;
        Ok(account)
    }

    pub async fn set_locale(&self, actor: &Actor, locale: Locale) -> Result<Account> {
        ensure_active(self.store.as_ref(), actor).await?;
        let (account, _) = self
            .mutate(actor.id, |account| {
                account.locale = locale;
                Ok(())
            })
            .await?;
        Ok(account)
    }
}
