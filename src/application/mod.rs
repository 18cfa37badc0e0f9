//! Application layer orchestrating the escrow ledger.
//!
//! The services here own the ledger's rules end to end: they take the per-key
//! locks an operation needs, re-validate the domain guards under those locks,
//! and persist through the storage ports. `EscrowEngine` bundles them behind a
//! single command entry point.

pub mod accounts;
pub mod admin;
pub mod currency;
pub mod deals;
pub mod engine;
pub mod locks;
pub mod reporting;
pub mod settlement;

use crate::domain::actor::Actor;
use crate::domain::ports::{BlacklistStore, LedgerStore};
use crate::error::{EscrowError, Result};

/// Rejects blacklisted actors. Admins are never blocked.
pub(crate) async fn ensure_active(store: &dyn LedgerStore, actor: &Actor) -> Result<()> {
    if actor.is_admin {
        return Ok(());
    }
    if store.is_blacklisted(actor.id).await? {
        tracing::debug!(actor = actor.id, "blacklisted actor rejected");
        return Err(EscrowError::Blacklisted(actor.id));
    }
    Ok(())
}

pub(crate) fn ensure_admin(actor: &Actor, action: &'static str) -> Result<()> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(EscrowError::Unauthorized {
            actor: actor.id,
            action,
        })
    }
}
