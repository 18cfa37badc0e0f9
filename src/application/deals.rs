use super::currency::CurrencySetting;
use super::locks::{LockKey, LockManager};
use super::{ensure_active, ensure_admin};
use crate::domain::account::{Account, AccountId, Amount};
use crate::domain::actor::Actor;
use crate::domain::deal::{Deal, DealEvent, DealId};
use crate::domain::ports::{SharedLedgerStore, WriteSet};
use crate::error::{EscrowError, Result};
use chrono::Utc;
use rust_decimal::Decimal;

const DEFAULT_DESCRIPTION: &str = "No description";

/// A seller putting a deal up for a buyer to join.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOffer {
    pub amount: Decimal,
    pub description: String,
    pub seller_username: Option<String>,
}

/// A buyer opening a deal against a named seller, settled by private code.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPurchase {
    pub seller_id: AccountId,
    pub amount: Decimal,
    pub description: String,
    pub buyer_username: Option<String>,
    pub seller_username: Option<String>,
}

/// Owns the deal lifecycle outside of settlement.
///
/// Each operation takes the deal's lock, reloads the record, lets the deal
/// validate and apply the event, and persists it before returning.
#[derive(Clone)]
pub struct DealService {
    store: SharedLedgerStore,
    locks: LockManager,
    currency: CurrencySetting,
}

impl DealService {
    pub fn new(store: SharedLedgerStore, locks: LockManager, currency: CurrencySetting) -> Self {
        Self {
            store,
            locks,
            currency,
        }
    }

    pub async fn get(&self, id: &DealId) -> Result<Deal> {
        self.store
            .get_deal(id)
            .await?
            .ok_or_else(|| EscrowError::not_found("deal", id))
    }

    pub async fn create_offer(&self, actor: &Actor, offer: NewOffer) -> Result<Deal> {
        ensure_active(self.store.as_ref(), actor).await?;
        let amount = Amount::new(offer.amount)?;

        let _held = self.locks.acquire([LockKey::Account(actor.id)]).await?;
        let mut deal = Deal::offer(
            actor.id,
            amount,
            self.currency.current().await,
            offer.description.trim().to_string(),
            Utc::now(),
        );
        deal.seller_username = offer.seller_username;

        let writes = self
            .materialize(WriteSet::new().deal(deal.clone()), &[actor.id])
            .await?;
        self.store.commit(writes).await?;

        tracing::info!(deal_id = %deal.id, seller = actor.id, amount = %deal.amount, currency = %deal.currency, "offer created");
        Ok(deal)
    }

    pub async fn create_purchase(&self, actor: &Actor, purchase: NewPurchase) -> Result<Deal> {
        ensure_active(self.store.as_ref(), actor).await?;
        if purchase.seller_id == actor.id {
            return Err(EscrowError::ValidationError(
                "buyer and seller must be different accounts".to_string(),
            ));
        }
        let amount = Amount::new(purchase.amount)?;
        let description = match purchase.description.trim() {
            "" => DEFAULT_DESCRIPTION.to_string(),
            text => text.to_string(),
        };

        let _held = self
            .locks
            .acquire([LockKey::Account(actor.id), LockKey::Account(purchase.seller_id)])
            .await?;
        let mut deal = Deal::purchase(
            actor.id,
            purchase.seller_id,
            amount,
            self.currency.current().await,
            description,
            Utc::now(),
        );
        deal.buyer_username = purchase.buyer_username;
        deal.seller_username = purchase.seller_username;

        let writes = self
            .materialize(
                WriteSet::new().deal(deal.clone()),
                &[actor.id, purchase.seller_id],
            )
            .await?;
        self.store.commit(writes).await?;

        tracing::info!(deal_id = %deal.id, buyer = actor.id, seller = deal.seller_id, amount = %deal.amount, "purchase created");
        Ok(deal)
    }

    // Adds zero-value records for accounts referenced for the first time.
    async fn materialize(&self, mut writes: WriteSet, ids: &[AccountId]) -> Result<WriteSet> {
        for &id in ids {
            if self.store.find_account(id).await?.is_none() {
                writes = writes.account(Account::new(id));
            }
        }
        Ok(writes)
    }

    /// Attaches the actor as buyer; first claim wins.
    pub async fn join(&self, actor: &Actor, id: &DealId, username: Option<String>) -> Result<Deal> {
        self.transition(actor, id, DealEvent::Join, |deal| {
            deal.attach_buyer(actor, username).map(|_| ())
        })
        .await
    }

    pub async fn confirm(&self, actor: &Actor, id: &DealId) -> Result<Deal> {
        self.transition(actor, id, DealEvent::Confirm, |deal| {
            deal.confirm(actor, Utc::now())
        })
        .await
    }

    pub async fn cancel(&self, actor: &Actor, id: &DealId) -> Result<Deal> {
        self.transition(actor, id, DealEvent::Cancel, |deal| {
            deal.cancel(actor, Utc::now())
        })
        .await
    }

    async fn transition(
        &self,
        actor: &Actor,
        id: &DealId,
        event: DealEvent,
        apply: impl FnOnce(&mut Deal) -> Result<()>,
    ) -> Result<Deal> {
        ensure_active(self.store.as_ref(), actor).await?;
        let _held = self.locks.acquire([LockKey::Deal(id.clone())]).await?;

        let mut deal = self.get(id).await?;
        let before = deal.clone();
        if let Err(err) = apply(&mut deal) {
            tracing::debug!(deal_id = %id, actor = actor.id, %event, error = %err, "deal event rejected");
            return Err(err);
        }
        if deal != before {
            self.store.put_deal(deal.clone()).await?;
        }

        tracing::info!(deal_id = %id, actor = actor.id, %event, status = %deal.status, "deal updated");
        Ok(deal)
    }

    /// Administrative purge. Returns the removed record.
    pub async fn purge(&self, actor: &Actor, id: &DealId) -> Result<Deal> {
        ensure_admin(actor, "purge deals")?;
        let _held = self.locks.acquire([LockKey::Deal(id.clone())]).await?;
        let deal = self.get(id).await?;
        self.store.delete_deal(id).await?;
        tracing::warn!(deal_id = %id, admin = actor.id, status = %deal.status, "deal purged");
        Ok(deal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::blacklist::BlacklistEntry;
    use crate::domain::deal::DealStatus;
    use crate::domain::ports::{AccountStore, BlacklistStore, DealStore};
    use crate::infrastructure::in_memory::InMemoryLedgerStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::time::Duration;

    const SELLER: AccountId = 100;
    const BUYER: AccountId = 200;

    fn service() -> (DealService, Arc<InMemoryLedgerStore>, CurrencySetting) {
        let store = Arc::new(InMemoryLedgerStore::new());
        let currency = CurrencySetting::new("TON").unwrap();
        let service = DealService::new(
            store.clone(),
            LockManager::new(Duration::from_secs(1)),
            currency.clone(),
        );
        (service, store, currency)
    }

    fn offer(amount: Decimal) -> NewOffer {
        NewOffer {
            amount,
            description: "  vintage book ".to_string(),
            seller_username: Some("seller".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_offer_persists_deal_and_seller() {
        let (service, store, _) = service();
        let deal = service
            .create_offer(&Actor::user(SELLER), offer(dec!(50)))
            .await
            .unwrap();

        assert_eq!(deal.description, "vintage book");
        assert_eq!(deal.currency, "TON");
        assert_eq!(store.get_deal(&deal.id).await.unwrap(), Some(deal));
        assert_eq!(store.find_account(SELLER).await.unwrap(), Some(Account::new(SELLER)));
    }

    #[tokio::test]
    async fn test_create_offer_rejects_non_positive_amount() {
        let (service, store, _) = service();
        let err = service
            .create_offer(&Actor::user(SELLER), offer(dec!(0)))
            .await
            .unwrap_err();
        assert!(matches!(err, EscrowError::ValidationError(_)));
        assert!(store.all_deals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purchase_carries_code_and_buyer() {
        let (service, store, _) = service();
        let deal = service
            .create_purchase(
                &Actor::user(BUYER),
                NewPurchase {
                    seller_id: SELLER,
                    amount: dec!(12),
                    description: String::new(),
                    buyer_username: Some("bob".into()),
                    seller_username: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(deal.buyer_id, Some(BUYER));
        assert_eq!(deal.description, DEFAULT_DESCRIPTION);
        assert_eq!(deal.private_code.as_ref().map(String::len), Some(8));
        assert_eq!(store.all_accounts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_purchase_from_self_is_rejected() {
        let (service, _, _) = service();
        let err = service
            .create_purchase(
                &Actor::user(SELLER),
                NewPurchase {
                    seller_id: SELLER,
                    amount: dec!(12),
                    description: "x".into(),
                    buyer_username: None,
                    seller_username: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EscrowError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_join_confirm_cancel_are_persisted() {
        let (service, store, _) = service();
        let deal = service
            .create_offer(&Actor::user(SELLER), offer(dec!(5)))
            .await
            .unwrap();

        service.join(&Actor::user(BUYER), &deal.id, None).await.unwrap();
        let err = service.join(&Actor::user(300), &deal.id, None).await.unwrap_err();
        assert!(matches!(err, EscrowError::DealAlreadyClaimed { .. }));

        service.confirm(&Actor::user(SELLER), &deal.id).await.unwrap();
        let canceled = service.cancel(&Actor::user(BUYER), &deal.id).await.unwrap();
        assert_eq!(canceled.status, DealStatus::Canceled);

        let stored = store.get_deal(&deal.id).await.unwrap().unwrap();
        assert_eq!(stored, canceled);
        assert_eq!(stored.buyer_id, Some(BUYER));
        assert!(stored.confirmed_at.is_some() && stored.canceled_at.is_some());
    }

    #[tokio::test]
    async fn test_unknown_deal_is_not_found() {
        let (service, _, _) = service();
        let err = service
            .confirm(&Actor::admin(1), &DealId::from("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, EscrowError::NotFound { kind: "deal", .. }));
    }

    #[tokio::test]
    async fn test_currency_change_is_not_retroactive() {
        let (service, store, currency) = service();
        let old = service
            .create_offer(&Actor::user(SELLER), offer(dec!(5)))
            .await
            .unwrap();
        currency.set("usdt").await.unwrap();
        let new = service
            .create_offer(&Actor::user(SELLER), offer(dec!(5)))
            .await
            .unwrap();

        assert_eq!(store.get_deal(&old.id).await.unwrap().unwrap().currency, "TON");
        assert_eq!(new.currency, "USDT");
    }

    #[tokio::test]
    async fn test_blacklisted_actor_cannot_mutate() {
        let (service, store, _) = service();
        let deal = service
            .create_offer(&Actor::user(SELLER), offer(dec!(5)))
            .await
            .unwrap();
        store
            .add_blacklist(BlacklistEntry::new(SELLER, "fraud", Utc::now()))
            .await
            .unwrap();

        assert!(matches!(
            service.confirm(&Actor::user(SELLER), &deal.id).await,
            Err(EscrowError::Blacklisted(SELLER))
        ));
        assert!(matches!(
            service.create_offer(&Actor::user(SELLER), offer(dec!(1))).await,
            Err(EscrowError::Blacklisted(SELLER))
        ));
        assert_eq!(
            store.get_deal(&deal.id).await.unwrap().unwrap().status,
            DealStatus::Created
        );
    }

    #[tokio::test]
    async fn test_purge_is_admin_only() {
        let (service, store, _) = service();
        let deal = service
            .create_offer(&Actor::user(SELLER), offer(dec!(5)))
            .await
            .unwrap();

        assert!(matches!(
            service.purge(&Actor::user(SELLER), &deal.id).await,
            Err(EscrowError::Unauthorized { .. })
        ));
        assert_eq!(service.purge(&Actor::admin(1), &deal.id).await.unwrap().id, deal.id);
        assert!(store.get_deal(&deal.id).await.unwrap().is_none());
        assert!(matches!(
            service.purge(&Actor::admin(1), &deal.id).await,
            Err(EscrowError::NotFound { .. })
        ));
    }
}
