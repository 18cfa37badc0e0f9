use super::accounts::AccountService;
use super::currency::CurrencySetting;
use super::ensure_admin;
use crate::domain::account::{Account, AccountId, Balance};
use crate::domain::actor::Actor;
use crate::domain::blacklist::BlacklistEntry;
use crate::domain::ports::SharedLedgerStore;
use crate::error::{EscrowError, Result};
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// The override an admin has started and will finish with one more input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAdminOp {
    /// Expects `"<user_id> <balance>"`.
    SetBalance,
    /// Expects `"<user_id> <count>"`.
    SetReputation,
    /// Expects the new currency tag.
    SetCurrency,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdminOutcome {
    Account(Account),
    Currency(String),
}

struct PendingStep {
    op: PendingAdminOp,
    started: Instant,
}

/// Per-admin pending steps with a time limit.
///
/// A step is consumed by the next input from the same admin whatever that
/// input turns out to be; a malformed line does not leave it armed.
#[derive(Clone)]
pub struct AdminSessions {
    pending: Arc<DashMap<AccountId, PendingStep>>,
    ttl: Duration,
}

impl AdminSessions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Arms `op` for `actor`, replacing any step already pending.
    pub fn begin(&self, actor: &Actor, op: PendingAdminOp) -> Result<()> {
        ensure_admin(actor, "start an admin step")?;
        self.pending.insert(
            actor.id,
            PendingStep {
                op,
                started: Instant::now(),
            },
        );
        tracing::debug!(actor = actor.id, ?op, "admin step started");
        Ok(())
    }

    pub fn pending(&self, actor: AccountId) -> Option<PendingAdminOp> {
        let step = self.pending.get(&actor)?;
        (step.started.elapsed() < self.ttl).then_some(step.op)
    }

    /// Removes and returns the live step for `actor`. Expired steps are dropped.
    pub fn take(&self, actor: AccountId) -> Option<PendingAdminOp> {
        let (_, step) = self.pending.remove(&actor)?;
        if step.started.elapsed() < self.ttl {
            Some(step.op)
        } else {
            tracing::debug!(actor, op = ?step.op, "admin step expired");
            None
        }
    }
}

/// Privileged overrides, all gated on the admin flag alone.
#[derive(Clone)]
pub struct AdminService {
    store: SharedLedgerStore,
    accounts: AccountService,
    currency: CurrencySetting,
    sessions: AdminSessions,
}

impl AdminService {
    pub fn new(
        store: SharedLedgerStore,
        accounts: AccountService,
        currency: CurrencySetting,
        sessions: AdminSessions,
    ) -> Self {
        Self {
            store,
            accounts,
            currency,
            sessions,
        }
    }

    pub fn sessions(&self) -> &AdminSessions {
        &self.sessions
    }

    pub async fn set_balance(&self, actor: &Actor, target: AccountId, value: Decimal) -> Result<Account> {
        ensure_admin(actor, "set balances")?;
        self.accounts.set_balance(target, value).await
    }

    /// Credits or debits `target`; a debit below zero fails with `InsufficientFunds`.
    pub async fn adjust_balance(&self, actor: &Actor, target: AccountId, delta: Decimal) -> Result<Balance> {
        ensure_admin(actor, "adjust balances")?;
        self.accounts.adjust_balance(target, delta).await
    }

    pub async fn set_reputation(&self, actor: &Actor, target: AccountId, value: u64) -> Result<Account> {
        ensure_admin(actor, "set reputation")?;
        self.accounts.set_reputation(target, value).await
    }

    pub async fn set_currency(&self, actor: &Actor, tag: &str) -> Result<String> {
        ensure_admin(actor, "change the currency")?;
        let tag = self.currency.set(tag).await?;
        tracing::info!(actor = actor.id, currency = %tag, "currency changed");
        Ok(tag)
    }

    pub async fn ban(&self, actor: &Actor, target: AccountId, reason: &str) -> Result<BlacklistEntry> {
        ensure_admin(actor, "ban accounts")?;
        let entry = BlacklistEntry::new(target, reason, Utc::now());
        self.store.add_blacklist(entry.clone()).await?;
        tracing::info!(actor = actor.id, account = target, reason = %entry.reason, "account banned");
        Ok(entry)
    }

    /// Returns whether the account was listed.
    pub async fn unban(&self, actor: &Actor, target: AccountId) -> Result<bool> {
        ensure_admin(actor, "unban accounts")?;
        let removed = self.store.remove_blacklist(target).await?;
        tracing::info!(actor = actor.id, account = target, removed, "account unbanned");
        Ok(removed)
    }

    /// Finishes the actor's pending step with `input`.
    pub async fn complete(&self, actor: &Actor, input: &str) -> Result<AdminOutcome> {
        ensure_admin(actor, "complete an admin step")?;
        let op = self.sessions.take(actor.id).ok_or_else(|| {
            EscrowError::ValidationError("no pending admin step".to_string())
        })?;

        match op {
            PendingAdminOp::SetBalance => {
                let (target, value) = parse_target_and_value::<Decimal>(input, "user_id balance")?;
                self.set_balance(actor, target, value).await.map(AdminOutcome::Account)
            }
            PendingAdminOp::SetReputation => {
                let (target, value) = parse_target_and_value::<u64>(input, "user_id count")?;
                self.set_reputation(actor, target, value).await.map(AdminOutcome::Account)
            }
            PendingAdminOp::SetCurrency => self.set_currency(actor, input).await.map(AdminOutcome::Currency),
        }
    }
}

fn parse_target_and_value<T: FromStr>(input: &str, expected: &str) -> Result<(AccountId, T)> {
    let malformed = || EscrowError::ValidationError(format!("expected \"{expected}\", got {input:?}"));
    let mut parts = input.split_whitespace();
    let target = parts.next().and_then(|s| s.parse().ok()).ok_or_else(malformed)?;
    let value = parts.next().and_then(|s| s.parse().ok()).ok_or_else(malformed)?;
    Ok((target, value))
}
