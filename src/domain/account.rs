use crate::error::{EscrowError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Externally assigned actor identifier (the chat platform's user id).
pub type AccountId = i64;

/// A non-negative, currency-denominated account balance.
///
/// Wraps `rust_decimal::Decimal` so that a negative balance cannot be
/// constructed, deserialized or produced by arithmetic on an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Balance(Decimal);

/// A strictly positive amount, used for deal prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(EscrowError::ValidationError(format!(
                "amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = EscrowError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self> {
        if value >= Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(EscrowError::ValidationError(format!(
                "balance cannot be negative, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Sum of two balances, or a `ValidationError` once it exceeds what `Decimal` can hold.
    pub fn checked_add(self, rhs: Self) -> Result<Self> {
        self.0.checked_add(rhs.0).map(Self).ok_or_else(overflow)
    }
}

impl TryFrom<Decimal> for Balance {
    type Error = EscrowError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Balance> for Decimal {
    fn from(balance: Balance) -> Self {
        balance.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

fn overflow() -> EscrowError {
    EscrowError::ValidationError("balance overflow".to_string())
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Display language of an account. Carries no ledger invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Ru,
    En,
}

impl FromStr for Locale {
    type Err = EscrowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ru" => Ok(Self::Ru),
            "en" => Ok(Self::En),
            other => Err(EscrowError::ValidationError(format!(
                "unsupported locale: {other}"
            ))),
        }
    }
}

/// Balance, reputation and profile of one actor.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub id: AccountId,
    #[serde(default)]
    pub payout_address: Option<String>,
    #[serde(default)]
    pub balance: Balance,
    /// Deals settled with this account as seller.
    #[serde(default)]
    pub reputation_count: u64,
    #[serde(default)]
    pub locale: Locale,
}

impl Account {
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            payout_address: None,
            balance: Balance::ZERO,
            reputation_count: 0,
            locale: Locale::default(),
        }
    }

    /// Applies a signed delta, refusing any result below zero.
    pub fn adjust_balance(&mut self, delta: Decimal) -> Result<Balance> {
        let next = self.balance.value().checked_add(delta).ok_or_else(overflow)?;
        if next < Decimal::ZERO {
            return Err(EscrowError::InsufficientFunds {
                account: self.id,
                available: self.balance.value(),
                required: -delta,
            });
        }
        self.balance = Balance(next);
        Ok(self.balance)
    }

    pub fn debit(&mut self, amount: Amount) -> Result<Balance> {
        self.adjust_balance(-amount.value())
    }

    pub fn credit(&mut self, amount: Amount) -> Result<Balance> {
        self.balance = self.balance.checked_add(amount.into())?;
        Ok(self.balance)
    }

    pub fn record_settlement(&mut self) -> u64 {
        self.reputation_count += 1;
        self.reputation_count
    }
}
