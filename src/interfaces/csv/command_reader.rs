use crate::domain::account::AccountId;
use crate::error::{EscrowError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Offer,
    Buy,
    Join,
    Confirm,
    SettleBalance,
    SettleCode,
    Cancel,
    SetPayout,
    SetLocale,
    SetBalance,
    AdjustBalance,
    SetReputation,
    SetCurrency,
    Ban,
    Unban,
    Purge,
    AdminBegin,
    AdminInput,
}

/// One line of a command script.
///
/// Which optional columns a row needs depends on `command`; the script
/// runner reports a missing one as a validation error.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandRow {
    pub command: CommandKind,
    pub actor: AccountId,
    #[serde(default)]
    pub deal: Option<String>,
    #[serde(default)]
    pub target: Option<AccountId>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Reads command rows from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<CommandRow>`.
/// It handles whitespace trimming and flexible record lengths automatically.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and deserializes rows, so large scripts stream.
    pub fn commands(self) -> impl Iterator<Item = Result<CommandRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(EscrowError::from))
    }
}
