use crate::error::{EscrowError, Result};
use std::sync::Arc;
use tokio::sync::RwLock;

/// The currency tag stamped onto deals at creation time.
///
/// Changing it affects only deals created afterwards; a deal keeps the tag it
/// was created with.
#[derive(Clone)]
pub struct CurrencySetting {
    current: Arc<RwLock<String>>,
}

impl CurrencySetting {
    pub fn new(initial: &str) -> Result<Self> {
        Ok(Self {
            current: Arc::new(RwLock::new(normalize(initial)?)),
        })
    }

    pub async fn current(&self) -> String {
        self.current.read().await.clone()
    }

    /// Returns the normalized tag now in effect.
    pub async fn set(&self, tag: &str) -> Result<String> {
        let tag = normalize(tag)?;
        *self.current.write().await = tag.clone();
        Ok(tag)
    }
}

fn normalize(tag: &str) -> Result<String> {
    let tag = tag.trim().to_uppercase();
    if tag.is_empty() || tag.chars().any(char::is_whitespace) {
        return Err(EscrowError::ValidationError(format!(
            "invalid currency tag: {tag:?}"
        )));
    }
    Ok(tag)
}
