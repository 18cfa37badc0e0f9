use super::ensure_active;
use super::locks::{LockKey, LockManager};
use crate::domain::actor::Actor;
use crate::domain::deal::{Deal, DealEvent, DealId};
use crate::domain::ports::{SharedLedgerStore, WriteSet};
use crate::error::{EscrowError, Result};
use chrono::Utc;

/// Executes the two ways a deal reaches `paid`.
///
/// Both paths lock the deal and every account they touch, re-check the deal's
/// guard under those locks, and persist all changed records in one atomic
/// commit. A failure at any point leaves the store exactly as it was.
#[derive(Clone)]
pub struct SettlementEngine {
    store: SharedLedgerStore,
    locks: LockManager,
}

impl SettlementEngine {
    pub fn new(store: SharedLedgerStore, locks: LockManager) -> Self {
        Self { store, locks }
    }

    async fn load(&self, id: &DealId) -> Result<Deal> {
        self.store
            .get_deal(id)
            .await?
            .ok_or_else(|| EscrowError::not_found("deal", id))
    }

    /// Pays the deal from the buyer's internal balance.
    ///
    /// Moves `amount` from buyer to seller, credits the seller one reputation
    /// point and marks the deal paid.
    pub async fn settle_balance(&self, actor: &Actor, id: &DealId) -> Result<Deal> {
        ensure_active(self.store.as_ref(), actor).await?;

        // The seller never changes, so an unlocked read is enough to name the locks.
        let seller_id = self.load(id).await?.seller_id;
        if seller_id == actor.id {
            return Err(EscrowError::Unauthorized {
                actor: actor.id,
                action: "pay for their own deal",
            });
        }
        let _held = self
            .locks
            .acquire([
                LockKey::Deal(id.clone()),
                LockKey::Account(actor.id),
                LockKey::Account(seller_id),
            ])
            .await?;

        let mut deal = self.load(id).await?;
        if let Err(err) = deal.authorize_balance_settlement(actor) {
            tracing::debug!(deal_id = %id, actor = actor.id, error = %err, "balance settlement rejected");
            return Err(err);
        }

        let mut buyer = self.store.get_account(actor.id).await?;
        let mut seller = self.store.get_account(deal.seller_id).await?;
        if let Err(err) = buyer.debit(deal.amount) {
            tracing::debug!(deal_id = %id, buyer = actor.id, error = %err, "balance settlement rejected");
            return Err(err);
        }
        if let Err(err) = seller.credit(deal.amount) {
            tracing::debug!(deal_id = %id, seller = deal.seller_id, error = %err, "balance settlement rejected");
            return Err(err);
        }
        seller.record_settlement();
        deal.mark_paid(Utc::now())?;

        self.store
            .commit(
                WriteSet::new()
                    .account(buyer)
                    .account(seller)
                    .deal(deal.clone()),
            )
            .await?;

        tracing::info!(
            deal_id = %id,
            buyer = actor.id,
            seller = deal.seller_id,
            amount = %deal.amount,
            event = %DealEvent::SettleBalance,
            "deal paid"
        );
        Ok(deal)
    }

    /// Marks the deal paid on the strength of the private code.
    ///
    /// An attestation of an out-of-band transfer: no balance changes, the
    /// seller still gains one reputation point.
    pub async fn settle_code(&self, actor: &Actor, id: &DealId, code: &str) -> Result<Deal> {
        ensure_active(self.store.as_ref(), actor).await?;

        let seller_id = self.load(id).await?.seller_id;
        let _held = self
            .locks
            .acquire([LockKey::Deal(id.clone()), LockKey::Account(seller_id)])
            .await?;

        let mut deal = self.load(id).await?;
        if let Err(err) = deal.verify_code(actor, code) {
            tracing::debug!(deal_id = %id, actor = actor.id, error = %err, "code settlement rejected");
            return Err(err);
        }

        let mut seller = self.store.get_account(deal.seller_id).await?;
        seller.record_settlement();
        deal.mark_paid(Utc::now())?;

        self.store
            .commit(WriteSet::new().account(seller).deal(deal.clone()))
            .await?;

        tracing::info!(
            deal_id = %id,
            actor = actor.id,
            seller = deal.seller_id,
            amount = %deal.amount,
            event = %DealEvent::SettleCode,
            "deal paid"
        );
        Ok(deal)
    }
}
