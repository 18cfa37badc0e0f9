use crate::domain::account::{Account, AccountId};
use crate::domain::blacklist::BlacklistEntry;
use crate::domain::deal::{Deal, DealId};
use crate::domain::ports::{AccountStore, BlacklistStore, DealStore, LedgerStore, WriteSet};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    deals: HashMap<DealId, Deal>,
    blacklist: HashMap<AccountId, BlacklistEntry>,
}

/// A thread-safe in-memory ledger.
///
/// All three relations sit behind one `RwLock`, so a `commit` is applied
/// inside a single write section and readers never observe half of it.
/// Ideal for tests and for runs where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryLedgerStore {
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.get(&id).cloned())
    }

    async fn put_account(&self, account: Account) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.accounts.insert(account.id, account);
        Ok(())
    }

    async fn all_accounts(&self) -> Result<Vec<Account>> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.values().cloned().collect())
    }
}

#[async_trait]
impl DealStore for InMemoryLedgerStore {
    async fn get_deal(&self, id: &DealId) -> Result<Option<Deal>> {
        let tables = self.tables.read().await;
        Ok(tables.deals.get(id).cloned())
    }

    async fn put_deal(&self, deal: Deal) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.deals.insert(deal.id.clone(), deal);
        Ok(())
    }

    async fn delete_deal(&self, id: &DealId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.deals.remove(id).is_some())
    }

    async fn all_deals(&self) -> Result<Vec<Deal>> {
        let tables = self.tables.read().await;
        Ok(tables.deals.values().cloned().collect())
    }
}

#[async_trait]
impl BlacklistStore for InMemoryLedgerStore {
    async fn is_blacklisted(&self, id: AccountId) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables.blacklist.contains_key(&id))
    }

    async fn add_blacklist(&self, entry: BlacklistEntry) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.blacklist.insert(entry.account_id, entry);
        Ok(())
    }

    async fn remove_blacklist(&self, id: AccountId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.blacklist.remove(&id).is_some())
    }

    async fn blacklist_entry(&self, id: AccountId) -> Result<Option<BlacklistEntry>> {
        let tables = self.tables.read().await;
        Ok(tables.blacklist.get(&id).cloned())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn commit(&self, writes: WriteSet) -> Result<()> {
        let mut tables = self.tables.write().await;
        for account in writes.accounts {
            tables.accounts.insert(account.id, account);
        }
        for deal in writes.deals {
            tables.deals.insert(deal.id.clone(), deal);
        }
        Ok(())
    }
}
