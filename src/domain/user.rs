use serde::{Deserialize, Serialize};
use std::fmt;

const SYSTEM_ID: &str = "SYSTEM";

/// Opaque user identifier. Wallet existence is implied by a registered user.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The reserved sender of minted supply. Never a real wallet.
    pub fn system() -> Self {
        Self(SYSTEM_ID.to_string())
    }

    pub fn is_system(&self) -> bool {
        self.0 == SYSTEM_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A registered identity as kept by the user registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Registration time, unix milliseconds.
    pub created_at: i64,
}

impl User {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            created_at: super::transaction::now_millis(),
        }
    }
}
