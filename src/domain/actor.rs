use super::account::AccountId;

/// The resolved identity behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: AccountId,
    pub is_admin: bool,
}

impl Actor {
    pub fn user(id: AccountId) -> Self {
        Self {
            id,
            is_admin: false,
        }
    }

    pub fn admin(id: AccountId) -> Self {
        Self { id, is_admin: true }
    }
}
