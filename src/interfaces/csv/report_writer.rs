use crate::application::reporting::{History, Stats};
use crate::domain::account::{Account, AccountId, Locale};
use crate::domain::deal::{Deal, DealStatus};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct AccountRow<'a> {
    account: AccountId,
    balance: Decimal,
    reputation: u64,
    locale: Locale,
    payout_address: &'a str,
}

#[derive(Serialize)]
struct DealRow<'a> {
    deal: &'a str,
    status: DealStatus,
    amount: Decimal,
    currency: &'a str,
    seller: AccountId,
    buyer: Option<AccountId>,
    description: &'a str,
    created_at: String,
}

#[derive(Serialize)]
struct HistoryRow<'a> {
    deal: &'a str,
    paid_at: String,
    amount: Decimal,
    currency: &'a str,
    buyer: Option<AccountId>,
    seller: AccountId,
    running_total: Decimal,
}

/// Writes reports as CSV, one header row followed by one row per record.
///
/// Decimals are written normalized, so `3.0` is printed as `3`.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_accounts(&mut self, accounts: &[Account]) -> Result<()> {
        for account in accounts {
            self.writer.serialize(AccountRow {
                account: account.id,
                balance: account.balance.value().normalize(),
                reputation: account.reputation_count,
                locale: account.locale,
                payout_address: account.payout_address.as_deref().unwrap_or_default(),
            })?;
        }
        self.finish(accounts.is_empty(), &["account", "balance", "reputation", "locale", "payout_address"])
    }

    pub fn write_deals(&mut self, deals: &[Deal]) -> Result<()> {
        for deal in deals {
            self.writer.serialize(DealRow {
                deal: deal.id.as_str(),
                status: deal.status,
                amount: deal.amount.value().normalize(),
                currency: &deal.currency,
                seller: deal.seller_id,
                buyer: deal.buyer_id,
                description: &deal.description,
                created_at: deal.created_at.to_rfc3339(),
            })?;
        }
        self.finish(
            deals.is_empty(),
            &["deal", "status", "amount", "currency", "seller", "buyer", "description", "created_at"],
        )
    }

    pub fn write_history(&mut self, history: &History) -> Result<()> {
        for entry in &history.entries {
            let deal = &entry.deal;
            self.writer.serialize(HistoryRow {
                deal: deal.id.as_str(),
                paid_at: deal.paid_at.map(|at| at.to_rfc3339()).unwrap_or_default(),
                amount: deal.amount.value().normalize(),
                currency: &deal.currency,
                buyer: deal.buyer_id,
                seller: deal.seller_id,
                running_total: entry.running_total.normalize(),
            })?;
        }
        self.finish(
            history.entries.is_empty(),
            &["deal", "paid_at", "amount", "currency", "buyer", "seller", "running_total"],
        )
    }

    pub fn write_stats(&mut self, stats: &Stats) -> Result<()> {
        self.writer.serialize(Stats {
            total: stats.total.normalize(),
            ..*stats
        })?;
        self.writer.flush()?;
        Ok(())
    }

    // serde only emits the header with the first row, so an empty report writes it by hand.
    fn finish(&mut self, empty: bool, header: &[&str]) -> Result<()> {
        if empty {
            self.writer.write_record(header)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
