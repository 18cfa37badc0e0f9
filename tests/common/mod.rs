#![allow(dead_code)]

use async_trait::async_trait;
use escrow_broker::application::deals::{NewOffer, NewPurchase};
use escrow_broker::application::engine::{Command, EscrowEngine, Outcome, Request};
use escrow_broker::config::Config;
use escrow_broker::domain::account::{Account, AccountId};
use escrow_broker::domain::blacklist::BlacklistEntry;
use escrow_broker::domain::deal::{Deal, DealId};
use escrow_broker::domain::ports::{AccountStore, BlacklistStore, DealStore, LedgerStore, WriteSet};
use escrow_broker::error::{EscrowError, Result};
use escrow_broker::infrastructure::in_memory::InMemoryLedgerStore;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub const ADMIN: AccountId = 100;

pub fn config() -> Config {
    Config {
        admin_ids: vec![ADMIN],
        ..Config::default()
    }
}

pub fn engine() -> EscrowEngine {
    engine_over(Arc::new(InMemoryLedgerStore::new()))
}

pub fn engine_over(store: Arc<dyn LedgerStore>) -> EscrowEngine {
    EscrowEngine::new(store, &config()).unwrap()
}

pub async fn run(engine: &EscrowEngine, actor: AccountId, command: Command) -> Result<Outcome> {
    engine
        .execute(Request {
            actor: engine.actor(actor),
            command,
        })
        .await
}

pub fn expect_deal(outcome: Outcome) -> Deal {
    match outcome {
        Outcome::Deal(deal) => deal,
        other => panic!("expected a deal, got {other:?}"),
    }
}

pub async fn offer(engine: &EscrowEngine, seller: AccountId, amount: Decimal) -> Deal {
    expect_deal(
        run(
            engine,
            seller,
            Command::Offer(NewOffer {
                amount,
                description: "test item".into(),
                seller_username: None,
            }),
        )
        .await
        .unwrap(),
    )
}

pub async fn purchase(engine: &EscrowEngine, buyer: AccountId, seller: AccountId, amount: Decimal) -> Deal {
    expect_deal(
        run(
            engine,
            buyer,
            Command::Purchase(NewPurchase {
                seller_id: seller,
                amount,
                description: String::new(),
                buyer_username: None,
                seller_username: None,
            }),
        )
        .await
        .unwrap(),
    )
}

pub async fn join(engine: &EscrowEngine, buyer: AccountId, deal: &DealId) -> Deal {
    expect_deal(
        run(
            engine,
            buyer,
            Command::Join {
                deal: deal.clone(),
                username: None,
            },
        )
        .await
        .unwrap(),
    )
}

pub async fn fund(engine: &EscrowEngine, account: AccountId, amount: Decimal) {
    run(
        engine,
        ADMIN,
        Command::SetBalance {
            target: account,
            value: amount,
        },
    )
    .await
    .unwrap();
}

pub async fn balance(engine: &EscrowEngine, account: AccountId) -> Decimal {
    engine.accounts().get(account).await.unwrap().balance.value()
}

/// An in-memory ledger whose writes can be switched off to simulate an outage.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryLedgerStore,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(EscrowError::StoreUnavailable("injected write failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AccountStore for FlakyStore {
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>> {
        self.inner.find_account(id).await
    }

    async fn put_account(&self, account: Account) -> Result<()> {
        self.check()?;
        self.inner.put_account(account).await
    }

    async fn all_accounts(&self) -> Result<Vec<Account>> {
        self.inner.all_accounts().await
    }
}

#[async_trait]
impl DealStore for FlakyStore {
    async fn get_deal(&self, id: &DealId) -> Result<Option<Deal>> {
        self.inner.get_deal(id).await
    }

    async fn put_deal(&self, deal: Deal) -> Result<()> {
        self.check()?;
        self.inner.put_deal(deal).await
    }

    async fn delete_deal(&self, id: &DealId) -> Result<bool> {
        self.check()?;
        self.inner.delete_deal(id).await
    }

    async fn all_deals(&self) -> Result<Vec<Deal>> {
        self.inner.all_deals().await
    }
}

#[async_trait]
impl BlacklistStore for FlakyStore {
    async fn is_blacklisted(&self, id: AccountId) -> Result<bool> {
        self.inner.is_blacklisted(id).await
    }

    async fn add_blacklist(&self, entry: BlacklistEntry) -> Result<()> {
        self.check()?;
        self.inner.add_blacklist(entry).await
    }

    async fn remove_blacklist(&self, id: AccountId) -> Result<bool> {
        self.check()?;
        self.inner.remove_blacklist(id).await
    }

    async fn blacklist_entry(&self, id: AccountId) -> Result<Option<BlacklistEntry>> {
        self.inner.blacklist_entry(id).await
    }
}

#[async_trait]
impl LedgerStore for FlakyStore {
    async fn commit(&self, writes: WriteSet) -> Result<()> {
        self.check()?;
        self.inner.commit(writes).await
    }
}
