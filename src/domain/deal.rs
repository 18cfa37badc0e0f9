use super::account::{AccountId, Amount};
use super::actor::Actor;
use crate::error::{EscrowError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Globally unique deal identifier, generated at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DealId(String);

impl DealId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DealId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for DealId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for DealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum DealStatus {
    Created,
    Confirmed,
    Paid,
    Canceled,
}

impl DealStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Canceled)
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Confirmed => "confirmed",
            Self::Paid => "paid",
            Self::Canceled => "canceled",
        })
    }
}

/// Events a deal reacts to after creation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DealEvent {
    Join,
    Confirm,
    SettleBalance,
    SettleCode,
    Cancel,
}

impl fmt::Display for DealEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Join => "join",
            Self::Confirm => "confirm",
            Self::SettleBalance => "settle from balance",
            Self::SettleCode => "settle by code",
            Self::Cancel => "cancel",
        })
    }
}

/// Short secret handed to the buyer of a purchase.
pub fn generate_private_code() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

/// One escrow transaction between a seller and a buyer.
///
/// Amount, currency, description, seller and private code never change after
/// creation. Status and the lifecycle timestamps only move through the
/// transition methods below, each of which validates before it mutates.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Deal {
    pub id: DealId,
    pub amount: Amount,
    pub currency: String,
    #[serde(default)]
    pub description: String,
    pub seller_id: AccountId,
    #[serde(default)]
    pub buyer_id: Option<AccountId>,
    #[serde(default)]
    pub private_code: Option<String>,
    pub status: DealStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub canceled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seller_username: Option<String>,
    #[serde(default)]
    pub buyer_username: Option<String>,
}

impl Deal {
    /// A seller-initiated offer: no buyer yet, no private code.
    pub fn offer(
        seller_id: AccountId,
        amount: Amount,
        currency: String,
        description: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DealId::generate(),
            amount,
            currency,
            description,
            seller_id,
            buyer_id: None,
            private_code: None,
            status: DealStatus::Created,
            created_at: now,
            confirmed_at: None,
            paid_at: None,
            canceled_at: None,
            seller_username: None,
            buyer_username: None,
        }
    }

    /// A buyer-initiated purchase, settled out of band against `private_code`.
    pub fn purchase(
        buyer_id: AccountId,
        seller_id: AccountId,
        amount: Amount,
        currency: String,
        description: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            buyer_id: Some(buyer_id),
            private_code: Some(generate_private_code()),
            ..Self::offer(seller_id, amount, currency, description, now)
        }
    }

    pub fn is_party(&self, account: AccountId) -> bool {
        self.seller_id == account || self.buyer_id == Some(account)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(EscrowError::AlreadyTerminal {
                deal: self.id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }

    // Timestamps never run backwards, even if the wall clock does.
    fn stamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        [Some(self.created_at), self.confirmed_at]
            .into_iter()
            .flatten()
            .fold(now, |latest, ts| latest.max(ts))
    }

    /// Attaches `actor` as buyer. Returns `false` when the actor already is the buyer.
    pub fn attach_buyer(&mut self, actor: &Actor, username: Option<String>) -> Result<bool> {
        if actor.id == self.seller_id {
            return Err(EscrowError::Unauthorized {
                actor: actor.id,
                action: "join their own deal",
            });
        }
        self.ensure_open()?;
        match self.buyer_id {
            Some(buyer) if buyer == actor.id => Ok(false),
            Some(_) => Err(EscrowError::DealAlreadyClaimed {
                deal: self.id.clone(),
            }),
            None if self.status != DealStatus::Created => Err(EscrowError::InvalidTransition {
                deal: self.id.clone(),
                status: self.status,
                event: DealEvent::Join,
            }),
            None => {
                self.buyer_id = Some(actor.id);
                self.buyer_username = username;
                Ok(true)
            }
        }
    }

    pub fn confirm(&mut self, actor: &Actor, now: DateTime<Utc>) -> Result<()> {
        if actor.id != self.seller_id && !actor.is_admin {
            return Err(EscrowError::Unauthorized {
                actor: actor.id,
                action: "confirm this deal",
            });
        }
        self.ensure_open()?;
        if self.status != DealStatus::Created {
            return Err(EscrowError::InvalidTransition {
                deal: self.id.clone(),
                status: self.status,
                event: DealEvent::Confirm,
            });
        }
        self.confirmed_at = Some(self.stamp(now));
        self.status = DealStatus::Confirmed;
        Ok(())
    }

    pub fn cancel(&mut self, actor: &Actor, now: DateTime<Utc>) -> Result<()> {
        if !self.is_party(actor.id) && !actor.is_admin {
            return Err(EscrowError::Unauthorized {
                actor: actor.id,
                action: "cancel this deal",
            });
        }
        self.ensure_open()?;
        self.canceled_at = Some(self.stamp(now));
        self.status = DealStatus::Canceled;
        Ok(())
    }

    /// Guard for paying from the internal balance: only the attached buyer may.
    pub fn authorize_balance_settlement(&self, actor: &Actor) -> Result<()> {
        if self.buyer_id != Some(actor.id) {
            return Err(EscrowError::Unauthorized {
                actor: actor.id,
                action: "settle this deal from balance",
            });
        }
        self.ensure_open()
    }

    /// Guard for code settlement: buyer or admin, and a case-insensitive code match.
    pub fn verify_code(&self, actor: &Actor, code: &str) -> Result<()> {
        if self.buyer_id != Some(actor.id) && !actor.is_admin {
            return Err(EscrowError::Unauthorized {
                actor: actor.id,
                action: "settle this deal by code",
            });
        }
        self.ensure_open()?;
        match &self.private_code {
            Some(expected) if expected.to_uppercase() == code.trim().to_uppercase() => Ok(()),
            _ => Err(EscrowError::CodeMismatch {
                deal: self.id.clone(),
            }),
        }
    }

    /// The record as `actor` may see it. The private code stays with the buyer and admins.
    pub fn visible_to(mut self, actor: &Actor) -> Self {
        if self.buyer_id != Some(actor.id) && !actor.is_admin {
            self.private_code = None;
        }
        self
    }

    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_open()?;
        self.paid_at = Some(self.stamp(now));
        self.status = DealStatus::Paid;
        Ok(())
    }
}
