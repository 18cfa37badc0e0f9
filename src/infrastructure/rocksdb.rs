use crate::domain::account::{Account, AccountId};
use crate::domain::blacklist::BlacklistEntry;
use crate::domain::deal::{Deal, DealId};
use crate::domain::ports::{AccountStore, BlacklistStore, DealStore, LedgerStore, WriteSet};
use crate::error::{EscrowError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch, WriteOptions};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

/// Column Family for account records.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for deal records.
pub const CF_DEALS: &str = "deals";
/// Column Family for blacklist entries.
pub const CF_BLACKLIST: &str = "blacklist";

/// A persistent ledger implementation using RocksDB.
///
/// Accounts, deals and blacklist entries live in separate Column Families and
/// are stored as JSON, so rows written before a field was added still decode.
/// Every write goes through the WAL; with `sync_writes` it is fsynced before
/// the call returns, so a reported success survives a crash.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    sync_writes: bool,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the "accounts", "deals" and "blacklist" column families exist.
    pub fn open<P: AsRef<Path>>(path: P, sync_writes: bool) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_ACCOUNTS, CF_DEALS, CF_BLACKLIST]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path.as_ref(), descriptors)?;
        tracing::info!(path = %path.as_ref().display(), sync_writes, "opened RocksDB ledger");

        Ok(Self {
            db: Arc::new(db),
            sync_writes,
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            EscrowError::StoreUnavailable(format!("{name} column family not found"))
        })
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }

    fn write(&self, cf_name: &str, key: &[u8], value: Vec<u8>) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf_opt(cf, key, value, &self.write_options())?;
        Ok(())
    }

    /// Deletes `key`, reporting whether it was present beforehand.
    fn remove(&self, cf_name: &str, key: &[u8]) -> Result<bool> {
        let cf = self.cf(cf_name)?;
        let existed = self.db.get_pinned_cf(cf, key)?.is_some();
        if existed {
            self.db.delete_cf_opt(cf, key, &self.write_options())?;
        }
        Ok(existed)
    }
}

fn account_key(id: AccountId) -> [u8; 8] {
    id.to_be_bytes()
}

#[async_trait]
impl AccountStore for RocksDBStore {
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>> {
        self.read(CF_ACCOUNTS, &account_key(id))
    }

    async fn put_account(&self, account: Account) -> Result<()> {
        let value = serde_json::to_vec(&account)?;
        self.write(CF_ACCOUNTS, &account_key(account.id), value)
    }

    async fn all_accounts(&self) -> Result<Vec<Account>> {
        self.scan(CF_ACCOUNTS)
    }
}

#[async_trait]
impl DealStore for RocksDBStore {
    async fn get_deal(&self, id: &DealId) -> Result<Option<Deal>> {
        self.read(CF_DEALS, id.as_str().as_bytes())
    }

    async fn put_deal(&self, deal: Deal) -> Result<()> {
        let value = serde_json::to_vec(&deal)?;
        self.write(CF_DEALS, deal.id.as_str().as_bytes(), value)
    }

    async fn delete_deal(&self, id: &DealId) -> Result<bool> {
        self.remove(CF_DEALS, id.as_str().as_bytes())
    }

    async fn all_deals(&self) -> Result<Vec<Deal>> {
        self.scan(CF_DEALS)
    }
}

#[async_trait]
impl BlacklistStore for RocksDBStore {
    async fn is_blacklisted(&self, id: AccountId) -> Result<bool> {
        let cf = self.cf(CF_BLACKLIST)?;
        Ok(self.db.get_pinned_cf(cf, account_key(id))?.is_some())
    }

    async fn add_blacklist(&self, entry: BlacklistEntry) -> Result<()> {
        let value = serde_json::to_vec(&entry)?;
        self.write(CF_BLACKLIST, &account_key(entry.account_id), value)
    }

    async fn remove_blacklist(&self, id: AccountId) -> Result<bool> {
        self.remove(CF_BLACKLIST, &account_key(id))
    }

    async fn blacklist_entry(&self, id: AccountId) -> Result<Option<BlacklistEntry>> {
        self.read(CF_BLACKLIST, &account_key(id))
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn commit(&self, writes: WriteSet) -> Result<()> {
        let accounts = self.cf(CF_ACCOUNTS)?;
        let deals = self.cf(CF_DEALS)?;

        // Encode everything first so a serialization failure writes nothing.
        let mut batch = WriteBatch::default();
        for account in &writes.accounts {
            batch.put_cf(accounts, account_key(account.id), serde_json::to_vec(account)?);
        }
        for deal in &writes.deals {
            batch.put_cf(deals, deal.id.as_str().as_bytes(), serde_json::to_vec(deal)?);
        }

        self.db.write_opt(batch, &self.write_options())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::Amount;
    use crate::domain::actor::Actor;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn paid_deal() -> Deal {
        let mut deal = Deal::purchase(
            20,
            10,
            Amount::new(dec!(42.5)).unwrap(),
            "TON".into(),
            "gift".into(),
            Utc::now(),
        );
        deal.seller_username = Some("seller".into());
        deal.confirm(&Actor::user(10), Utc::now()).unwrap();
        deal.mark_paid(Utc::now()).unwrap();
        deal
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path(), false).expect("Failed to open RocksDB");

        assert!(store.db.cf_handle(CF_ACCOUNTS).is_some());
        assert!(store.db.cf_handle(CF_DEALS).is_some());
        assert!(store.db.cf_handle(CF_BLACKLIST).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_account_round_trip() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path(), false).unwrap();

        let mut account = Account::new(-1001);
        account.adjust_balance(dec!(100.25)).unwrap();
        account.payout_address = Some("UQ-wallet".into());
        account.reputation_count = 3;

        store.put_account(account.clone()).await.unwrap();
        assert_eq!(store.find_account(-1001).await.unwrap(), Some(account.clone()));
        assert_eq!(store.all_accounts().await.unwrap(), vec![account]);
        assert!(store.find_account(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rocksdb_deal_round_trip_and_delete() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path(), false).unwrap();
        let deal = paid_deal();

        store.put_deal(deal.clone()).await.unwrap();
        assert_eq!(store.get_deal(&deal.id).await.unwrap(), Some(deal.clone()));

        assert!(store.delete_deal(&deal.id).await.unwrap());
        assert!(!store.delete_deal(&deal.id).await.unwrap());
        assert!(store.all_deals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rocksdb_blacklist() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path(), false).unwrap();
        let entry = BlacklistEntry::new(9, "", Utc::now());

        store.add_blacklist(entry.clone()).await.unwrap();
        assert!(store.is_blacklisted(9).await.unwrap());
        assert_eq!(store.blacklist_entry(9).await.unwrap(), Some(entry));
        assert!(store.remove_blacklist(9).await.unwrap());
        assert!(!store.is_blacklisted(9).await.unwrap());
    }

    #[tokio::test]
    async fn test_rocksdb_commit_survives_reopen() {
        let dir = tempdir().unwrap();
        let deal = paid_deal();
        {
            let store = RocksDBStore::open(dir.path(), true).unwrap();
            let writes = WriteSet::new()
                .account(Account::new(10))
                .account(Account::new(20))
                .deal(deal.clone());
            store.commit(writes).await.unwrap();
        }

        let reopened = RocksDBStore::open(dir.path(), true).unwrap();
        assert_eq!(reopened.all_accounts().await.unwrap().len(), 2);
        assert_eq!(reopened.get_deal(&deal.id).await.unwrap(), Some(deal));
    }
}
