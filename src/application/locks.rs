use crate::domain::account::AccountId;
use crate::domain::deal::DealId;
use crate::error::{EscrowError, Result};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{Instant, timeout_at};

/// A lockable ledger resource.
///
/// The derived `Ord` is the global acquisition order: accounts by id, then deals by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    Account(AccountId),
    Deal(DealId),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account(id) => write!(f, "account {id}"),
            Self::Deal(id) => write!(f, "deal {id}"),
        }
    }
}

type Slots = DashMap<LockKey, Arc<Mutex<()>>>;

/// Per-key exclusive locks with a bounded wait.
///
/// Callers name every key an operation touches up front; `acquire` sorts them
/// and takes them in order, so two operations can never wait on each other in
/// a cycle. A key that cannot be taken before the deadline yields `Busy`.
#[derive(Clone)]
pub struct LockManager {
    slots: Arc<Slots>,
    timeout: Duration,
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            timeout,
        }
    }

    pub async fn acquire(&self, keys: impl IntoIterator<Item = LockKey>) -> Result<LockSet> {
        let mut keys: Vec<LockKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let deadline = Instant::now() + self.timeout;
        let mut held = LockSet {
            slots: Arc::clone(&self.slots),
            guards: Vec::with_capacity(keys.len()),
        };

        for key in keys {
            let slot = self.slots.entry(key.clone()).or_default().value().clone();
            match timeout_at(deadline, slot.lock_owned()).await {
                Ok(guard) => held.guards.push((key, guard)),
                Err(_) => {
                    tracing::warn!(%key, "lock wait timed out");
                    return Err(EscrowError::Busy(key.to_string()));
                }
            }
        }

        Ok(held)
    }

    /// Number of keys currently tracked; idle keys are dropped on release.
    pub fn tracked(&self) -> usize {
        self.slots.len()
    }
}

/// Guards held by one operation. Released together on drop.
pub struct LockSet {
    slots: Arc<Slots>,
    guards: Vec<(LockKey, OwnedMutexGuard<()>)>,
}

impl LockSet {
    pub fn holds(&self, key: &LockKey) -> bool {
        self.guards.iter().any(|(held, _)| held == key)
    }
}

impl Drop for LockSet {
    fn drop(&mut self) {
        for (key, guard) in self.guards.drain(..) {
            drop(guard);
            // Clones of a slot are only taken under the map's shard lock, so a
            // count of one here means nobody is holding or waiting on it.
            self.slots
                .remove_if(&key, |_, slot| Arc::strong_count(slot) == 1);
        }
    }
}
