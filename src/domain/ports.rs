use super::account::{Account, AccountId};
use super::blacklist::BlacklistEntry;
use super::deal::{Deal, DealId};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>>;
    async fn put_account(&self, account: Account) -> Result<()>;
    async fn all_accounts(&self) -> Result<Vec<Account>>;

    /// Loads an account, handing back a zero-value record when none is stored.
    ///
    /// The fresh record is not written here; it is persisted by the first
    /// mutation that runs under the account's lock.
    async fn get_account(&self, id: AccountId) -> Result<Account> {
        Ok(self
            .find_account(id)
            .await?
            .unwrap_or_else(|| Account::new(id)))
    }
}

#[async_trait]
pub trait DealStore: Send + Sync {
    async fn get_deal(&self, id: &DealId) -> Result<Option<Deal>>;
    async fn put_deal(&self, deal: Deal) -> Result<()>;
    /// Returns whether a record was removed.
    async fn delete_deal(&self, id: &DealId) -> Result<bool>;
    async fn all_deals(&self) -> Result<Vec<Deal>>;
}

#[async_trait]
pub trait BlacklistStore: Send + Sync {
    async fn is_blacklisted(&self, id: AccountId) -> Result<bool>;
    async fn add_blacklist(&self, entry: BlacklistEntry) -> Result<()>;
    /// Returns whether an entry was removed.
    async fn remove_blacklist(&self, id: AccountId) -> Result<bool>;
    async fn blacklist_entry(&self, id: AccountId) -> Result<Option<BlacklistEntry>>;
}

/// Records that must become visible together or not at all.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WriteSet {
    pub accounts: Vec<Account>,
    pub deals: Vec<Deal>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(mut self, account: Account) -> Self {
        self.accounts.push(account);
        self
    }

    pub fn deal(mut self, deal: Deal) -> Self {
        self.deals.push(deal);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.deals.is_empty()
    }
}

/// The single source of truth for accounts, deals and the blacklist.
#[async_trait]
pub trait LedgerStore: AccountStore + DealStore + BlacklistStore {
    /// Atomically applies every record in `writes`.
    async fn commit(&self, writes: WriteSet) -> Result<()>;
}

pub type SharedLedgerStore = Arc<dyn LedgerStore>;
