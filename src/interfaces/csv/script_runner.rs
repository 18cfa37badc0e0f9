use super::command_reader::{CommandKind, CommandRow};
use crate::application::admin::PendingAdminOp;
use crate::application::deals::{NewOffer, NewPurchase};
use crate::application::engine::{Command, EscrowEngine, Outcome, Request};
use crate::domain::deal::DealId;
use crate::error::{EscrowError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;

/// Totals for one replayed script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptSummary {
    pub applied: usize,
    pub rejected: usize,
    pub malformed: usize,
}

/// Replays command rows through an `EscrowEngine`.
///
/// `offer` and `buy` rows may name their deal in the `deal` column; the name
/// is bound to the generated id and later rows can use it in place of the id.
pub struct ScriptRunner {
    engine: EscrowEngine,
    aliases: HashMap<String, DealId>,
}

impl ScriptRunner {
    pub fn new(engine: EscrowEngine) -> Self {
        Self {
            engine,
            aliases: HashMap::new(),
        }
    }

    pub fn engine(&self) -> &EscrowEngine {
        &self.engine
    }

    pub fn deal_id(&self, alias: &str) -> Option<&DealId> {
        self.aliases.get(alias)
    }

    /// Applies every row in order. Failures are logged and never stop the run.
    pub async fn run(&mut self, rows: impl Iterator<Item = Result<CommandRow>>) -> ScriptSummary {
        let mut summary = ScriptSummary::default();
        for (line, row) in rows.enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(err) => {
                    tracing::warn!(line = line + 1, error = %err, "Error reading command");
                    summary.malformed += 1;
                    continue;
                }
            };
            let command = row.command;
            match self.apply(row).await {
                Ok(outcome) => {
                    tracing::info!(line = line + 1, ?command, outcome = %describe(&outcome), "command applied");
                    summary.applied += 1;
                }
                Err(err) => {
                    tracing::warn!(line = line + 1, ?command, error = %err, "Error processing command");
                    summary.rejected += 1;
                }
            }
        }
        summary
    }

    pub async fn apply(&mut self, row: CommandRow) -> Result<Outcome> {
        let alias = match row.command {
            CommandKind::Offer | CommandKind::Buy => row.deal.clone(),
            _ => None,
        };
        let request = Request {
            actor: self.engine.actor(row.actor),
            command: self.to_command(row).await?,
        };
        let outcome = self.engine.execute(request).await?;
        if let (Some(alias), Outcome::Deal(deal)) = (alias, &outcome) {
            self.aliases.insert(alias, deal.id.clone());
        }
        Ok(outcome)
    }

    async fn to_command(&self, row: CommandRow) -> Result<Command> {
        let command = match row.command {
            CommandKind::Offer => Command::Offer(NewOffer {
                amount: required(row.amount, "amount", row.command)?,
                description: row.text.unwrap_or_default(),
                seller_username: None,
            }),
            CommandKind::Buy => Command::Purchase(NewPurchase {
                seller_id: required(row.target, "target", row.command)?,
                amount: required(row.amount, "amount", row.command)?,
                description: row.text.unwrap_or_default(),
                buyer_username: None,
                seller_username: None,
            }),
            CommandKind::Join => Command::Join {
                deal: self.resolve(&row)?,
                username: row.text,
            },
            CommandKind::Confirm => Command::Confirm {
                deal: self.resolve(&row)?,
            },
            CommandKind::Cancel => Command::Cancel {
                deal: self.resolve(&row)?,
            },
            CommandKind::SettleBalance => Command::SettleBalance {
                deal: self.resolve(&row)?,
            },
            CommandKind::SettleCode => {
                let deal = self.resolve(&row)?;
                let code = match row.text {
                    Some(code) => code,
                    // The buyer was handed the code out of band; replay it from the record.
                    None => self
                        .engine
                        .deals()
                        .get(&deal)
                        .await?
                        .private_code
                        .unwrap_or_default(),
                };
                Command::SettleCode { deal, code }
            }
            CommandKind::SetPayout => Command::SetPayoutAddress {
                address: row.text.unwrap_or_default(),
            },
            CommandKind::SetLocale => Command::SetLocale {
                locale: required(row.text, "text", row.command)?.parse()?,
            },
            CommandKind::SetBalance => Command::SetBalance {
                target: required(row.target, "target", row.command)?,
                value: required(row.amount, "amount", row.command)?,
            },
            CommandKind::AdjustBalance => Command::AdjustBalance {
                target: required(row.target, "target", row.command)?,
                delta: required(row.amount, "amount", row.command)?,
            },
            CommandKind::SetReputation => Command::SetReputation {
                target: required(row.target, "target", row.command)?,
                value: count(required(row.amount, "amount", row.command)?)?,
            },
            CommandKind::SetCurrency => Command::SetCurrency {
                tag: required(row.text, "text", row.command)?,
            },
            CommandKind::Ban => Command::Ban {
                target: required(row.target, "target", row.command)?,
                reason: row.text.unwrap_or_default(),
            },
            CommandKind::Unban => Command::Unban {
                target: required(row.target, "target", row.command)?,
            },
            CommandKind::Purge => Command::PurgeDeal {
                deal: self.resolve(&row)?,
            },
            CommandKind::AdminBegin => Command::BeginAdminStep {
                op: admin_op(&required(row.text, "text", row.command)?)?,
            },
            CommandKind::AdminInput => Command::AdminInput {
                input: row.text.unwrap_or_default(),
            },
        };
        Ok(command)
    }

    fn resolve(&self, row: &CommandRow) -> Result<DealId> {
        let name = row
            .deal
            .as_deref()
            .ok_or_else(|| missing("deal", row.command))?;
        Ok(self
            .aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| DealId::from(name)))
    }
}

fn required<T>(value: Option<T>, column: &str, command: CommandKind) -> Result<T> {
    value.ok_or_else(|| missing(column, command))
}

fn missing(column: &str, command: CommandKind) -> EscrowError {
    EscrowError::ValidationError(format!("{command:?} requires the {column} column"))
}

fn count(value: Decimal) -> Result<u64> {
    value
        .is_integer()
        .then(|| value.to_u64())
        .flatten()
        .ok_or_else(|| EscrowError::ValidationError(format!("not a count: {value}")))
}

fn admin_op(name: &str) -> Result<PendingAdminOp> {
    match name.to_ascii_lowercase().as_str() {
        "balance" => Ok(PendingAdminOp::SetBalance),
        "reputation" => Ok(PendingAdminOp::SetReputation),
        "currency" => Ok(PendingAdminOp::SetCurrency),
        other => Err(EscrowError::ValidationError(format!(
            "unknown admin step: {other}"
        ))),
    }
}

fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Deal(deal) => format!("deal {} {}", deal.id, deal.status),
        Outcome::Account(account) => format!("account {} balance {}", account.id, account.balance),
        Outcome::Balance { account, balance } => format!("account {account} balance {balance}"),
        Outcome::Currency(tag) => format!("currency {tag}"),
        Outcome::Banned(entry) => format!("account {} banned", entry.account_id),
        Outcome::Unbanned { account, .. } => format!("account {account} unbanned"),
        Outcome::AdminStepStarted(op) => format!("admin step {op:?}"),
    }
}
