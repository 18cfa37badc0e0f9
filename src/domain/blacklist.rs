use super::account::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An account barred from mutating operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub account_id: AccountId,
    pub reason: String,
    pub added_at: DateTime<Utc>,
}

impl BlacklistEntry {
    pub const DEFAULT_REASON: &'static str = "no reason";

    pub fn new(account_id: AccountId, reason: &str, added_at: DateTime<Utc>) -> Self {
        let reason = reason.trim();
        Self {
            account_id,
            reason: if reason.is_empty() {
                Self::DEFAULT_REASON.to_string()
            } else {
                reason.to_string()
            },
            added_at,
        }
    }
}
