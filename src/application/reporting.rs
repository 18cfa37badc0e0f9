use crate::domain::account::AccountId;
use crate::domain::deal::{Deal, DealStatus};
use crate::domain::ports::SharedLedgerStore;
use crate::error::{EscrowError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Reverse;

/// Narrows history and stats to paid deals in a date window and/or touching one account.
///
/// Both date bounds are inclusive and compare against the UTC calendar date of `paid_at`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub account: Option<AccountId>,
}

impl ReportFilter {
    pub fn matches(&self, deal: &Deal) -> bool {
        if deal.status != DealStatus::Paid {
            return false;
        }
        let Some(paid_on) = deal.paid_at.map(|at| at.date_naive()) else {
            return false;
        };
        if self.from.is_some_and(|from| paid_on < from) {
            return false;
        }
        if self.to.is_some_and(|to| paid_on > to) {
            return false;
        }
        match self.account {
            Some(account) => deal.seller_id == account || deal.buyer_id == Some(account),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub deal: Deal,
    /// Sum of `amount` over this entry and every entry listed before it.
    pub running_total: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct History {
    pub entries: Vec<HistoryEntry>,
    pub total: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub count: usize,
    pub total: Decimal,
}

/// Read-only queries over stored deals. Never takes a ledger lock.
#[derive(Clone)]
pub struct ReportingEngine {
    store: SharedLedgerStore,
    history_limit: usize,
}

impl ReportingEngine {
    pub fn new(store: SharedLedgerStore, history_limit: usize) -> Self {
        Self {
            store,
            history_limit,
        }
    }

    pub async fn list_recent(&self, limit: usize) -> Result<Vec<Deal>> {
        let mut deals = self.store.all_deals().await?;
        deals.sort_by_key(|deal| Reverse(deal.created_at));
        deals.truncate(limit);
        Ok(deals)
    }

    /// Paid deals, latest payment first, capped at the configured history limit.
    pub async fn history(&self, filter: &ReportFilter) -> Result<History> {
        let mut deals = self.paid(filter).await?;
        deals.truncate(self.history_limit);

        let mut total = Decimal::ZERO;
        let entries = deals
            .into_iter()
            .map(|deal| {
                total = accumulate(total, &deal)?;
                Ok(HistoryEntry {
                    deal,
                    running_total: total,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(History { entries, total })
    }

    /// Count and turnover over the same filtered set as `history`, without the cap.
    pub async fn stats(&self, filter: &ReportFilter) -> Result<Stats> {
        let deals = self.paid(filter).await?;
        Ok(Stats {
            count: deals.len(),
            total: deals.iter().try_fold(Decimal::ZERO, accumulate)?,
        })
    }

    async fn paid(&self, filter: &ReportFilter) -> Result<Vec<Deal>> {
        let mut deals: Vec<Deal> = self
            .store
            .all_deals()
            .await?
            .into_iter()
            .filter(|deal| filter.matches(deal))
            .collect();
        deals.sort_by_key(|deal| Reverse(deal.paid_at));
        Ok(deals)
    }
}

fn accumulate(total: Decimal, deal: &Deal) -> Result<Decimal> {
    total.checked_add(deal.amount.value()).ok_or_else(|| {
        EscrowError::ValidationError(format!("turnover overflow at deal {}", deal.id))
    })
}
