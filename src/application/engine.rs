use super::accounts::AccountService;
use super::admin::{AdminOutcome, AdminService, AdminSessions, PendingAdminOp};
use super::currency::CurrencySetting;
use super::deals::{DealService, NewOffer, NewPurchase};
use super::locks::LockManager;
use super::reporting::ReportingEngine;
use super::settlement::SettlementEngine;
use crate::config::Config;
use crate::domain::account::{Account, AccountId, Balance, Locale};
use crate::domain::actor::Actor;
use crate::domain::blacklist::BlacklistEntry;
use crate::domain::deal::{Deal, DealId};
use crate::domain::ports::SharedLedgerStore;
use crate::error::Result;
use rust_decimal::Decimal;

/// One operation requested by the transport layer on behalf of an actor.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Offer(NewOffer),
    Purchase(NewPurchase),
    Join { deal: DealId, username: Option<String> },
    Confirm { deal: DealId },
    Cancel { deal: DealId },
    SettleBalance { deal: DealId },
    SettleCode { deal: DealId, code: String },
    SetPayoutAddress { address: String },
    SetLocale { locale: Locale },
    SetBalance { target: AccountId, value: Decimal },
    AdjustBalance { target: AccountId, delta: Decimal },
    SetReputation { target: AccountId, value: u64 },
    SetCurrency { tag: String },
    Ban { target: AccountId, reason: String },
    Unban { target: AccountId },
    PurgeDeal { deal: DealId },
    BeginAdminStep { op: PendingAdminOp },
    AdminInput { input: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub actor: Actor,
    pub command: Command,
}

/// The snapshot a successful command hands back.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Deal(Deal),
    Account(Account),
    Balance { account: AccountId, balance: Balance },
    Currency(String),
    Banned(BlacklistEntry),
    Unbanned { account: AccountId, was_listed: bool },
    AdminStepStarted(PendingAdminOp),
}

/// The escrow core behind a single request/response entry point.
///
/// `EscrowEngine` wires every service to one ledger store and one lock
/// manager, so per-key exclusion holds across all of them. It is cheap to
/// clone and safe to share between concurrent command handlers.
#[derive(Clone)]
pub struct EscrowEngine {
    store: SharedLedgerStore,
    config: Config,
    accounts: AccountService,
    deals: DealService,
    settlement: SettlementEngine,
    reporting: ReportingEngine,
    admin: AdminService,
}

impl EscrowEngine {
    /// Creates a new `EscrowEngine` over `store`.
    ///
    /// # Arguments
    ///
    /// * `store` - The ledger store every service reads and writes.
    /// * `config` - Admin ids, initial currency, lock timeout and reporting limits.
    pub fn new(store: SharedLedgerStore, config: &Config) -> Result<Self> {
        let locks = LockManager::new(config.lock_timeout());
        let currency = CurrencySetting::new(&config.currency)?;
        let accounts = AccountService::new(store.clone(), locks.clone());

        Ok(Self {
            config: config.clone(),
            deals: DealService::new(store.clone(), locks.clone(), currency.clone()),
            settlement: SettlementEngine::new(store.clone(), locks),
            reporting: ReportingEngine::new(store.clone(), config.history_limit),
            admin: AdminService::new(
                store.clone(),
                accounts.clone(),
                currency,
                AdminSessions::new(config.admin_session_ttl()),
            ),
            accounts,
            store,
        })
    }

    /// Resolves an actor id to an actor, attaching the admin flag from config.
    pub fn actor(&self, id: AccountId) -> Actor {
        if self.config.is_admin(id) {
            Actor::admin(id)
        } else {
            Actor::user(id)
        }
    }

    pub async fn execute(&self, request: Request) -> Result<Outcome> {
        let Request { actor, command } = request;
        tracing::debug!(actor = actor.id, admin = actor.is_admin, ?command, "executing command");

        let outcome = match command {
            Command::Offer(offer) => Outcome::Deal(self.deals.create_offer(&actor, offer).await?),
            Command::Purchase(purchase) => {
                Outcome::Deal(self.deals.create_purchase(&actor, purchase).await?)
            }
            Command::Join { deal, username } => {
                Outcome::Deal(self.deals.join(&actor, &deal, username).await?)
            }
            Command::Confirm { deal } => Outcome::Deal(self.deals.confirm(&actor, &deal).await?),
            Command::Cancel { deal } => Outcome::Deal(self.deals.cancel(&actor, &deal).await?),
            Command::SettleBalance { deal } => {
                Outcome::Deal(self.settlement.settle_balance(&actor, &deal).await?)
            }
            Command::SettleCode { deal, code } => {
                Outcome::Deal(self.settlement.settle_code(&actor, &deal, &code).await?)
            }
            Command::SetPayoutAddress { address } => {
                Outcome::Account(self.accounts.set_payout_address(&actor, &address).await?)
            }
            Command::SetLocale { locale } => {
                Outcome::Account(self.accounts.set_locale(&actor, locale).await?)
            }
            Command::SetBalance { target, value } => {
                Outcome::Account(self.admin.set_balance(&actor, target, value).await?)
            }
            Command::AdjustBalance { target, delta } => Outcome::Balance {
                account: target,
                balance: self.admin.adjust_balance(&actor, target, delta).await?,
            },
            Command::SetReputation { target, value } => {
                Outcome::Account(self.admin.set_reputation(&actor, target, value).await?)
            }
            Command::SetCurrency { tag } => {
                Outcome::Currency(self.admin.set_currency(&actor, &tag).await?)
            }
            Command::Ban { target, reason } => {
                Outcome::Banned(self.admin.ban(&actor, target, &reason).await?)
            }
            Command::Unban { target } => Outcome::Unbanned {
                account: target,
                was_listed: self.admin.unban(&actor, target).await?,
            },
            Command::PurgeDeal { deal } => Outcome::Deal(self.deals.purge(&actor, &deal).await?),
            Command::BeginAdminStep { op } => {
                self.admin.sessions().begin(&actor, op)?;
                Outcome::AdminStepStarted(op)
            }
            Command::AdminInput { input } => match self.admin.complete(&actor, &input).await? {
                AdminOutcome::Account(account) => Outcome::Account(account),
                AdminOutcome::Currency(tag) => Outcome::Currency(tag),
            },
        };
        Ok(match outcome {
            Outcome::Deal(deal) => Outcome::Deal(deal.visible_to(&actor)),
            other => other,
        })
    }

    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    pub fn deals(&self) -> &DealService {
        &self.deals
    }

    pub fn settlement(&self) -> &SettlementEngine {
        &self.settlement
    }

    pub fn reporting(&self) -> &ReportingEngine {
        &self.reporting
    }

    pub fn admin(&self) -> &AdminService {
        &self.admin
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Every stored account, ordered by id.
    pub async fn all_accounts(&self) -> Result<Vec<Account>> {
        let mut accounts = self.store.all_accounts().await?;
        accounts.sort_by_key(|account| account.id);
        Ok(accounts)
    }
}
