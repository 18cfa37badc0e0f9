use crate::domain::account::AccountId;
use crate::domain::deal::{DealEvent, DealId, DealStatus};
use rust_decimal::Decimal;
use thiserror::Error;

/// Typed outcome of every failed core operation.
///
/// Nothing in the core panics or returns an untyped failure across the
/// engine boundary; the transport maps each variant to its own message.
#[derive(Error, Debug)]
pub enum EscrowError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("account {actor} is not allowed to {action}")]
    Unauthorized { actor: AccountId, action: &'static str },
    #[error("deal {deal} is already {status}")]
    AlreadyTerminal { deal: DealId, status: DealStatus },
    #[error("cannot {event} deal {deal} while it is {status}")]
    InvalidTransition {
        deal: DealId,
        status: DealStatus,
        event: DealEvent,
    },
    #[error("deal {deal} already has a buyer")]
    DealAlreadyClaimed { deal: DealId },
    #[error("insufficient funds on account {account}: available {available}, required {required}")]
    InsufficientFunds {
        account: AccountId,
        available: Decimal,
        required: Decimal,
    },
    #[error("private code does not match for deal {deal}")]
    CodeMismatch { deal: DealId },
    #[error("account {0} is blacklisted")]
    Blacklisted(AccountId),
    #[error("resource busy: {0}")]
    Busy(String),
    #[error("ledger store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EscrowError>;

impl EscrowError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Only contention is worth retrying; every other failure is final for the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}

impl From<serde_json::Error> for EscrowError {
    fn from(err: serde_json::Error) -> Self {
        Self::StoreUnavailable(format!("record encoding: {err}"))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for EscrowError {
    fn from(err: rocksdb::Error) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}
