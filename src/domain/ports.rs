use super::block::Block;
use super::transaction::Transaction;
use super::user::{User, UserId};
use crate::error::Result;
use async_trait::async_trait;

/// Registry of known identities. A wallet exists iff its user exists.
#[async_trait]
pub trait UserRegistry: Send + Sync {
    async fn exists(&self, user_id: &UserId) -> Result<bool>;
    /// Fails with `AlreadyExists` if the identity is taken.
    async fn register(&self, user_id: &UserId) -> Result<User>;
    async fn all_users(&self) -> Result<Vec<User>>;
}

/// Append-only, ordered transaction log. An `Ok` from `append_transaction`
/// means the record is durable.
#[async_trait]
pub trait TransactionLog: Send + Sync {
    async fn append_transaction(&self, tx: &Transaction) -> Result<()>;
    async fn list_transactions(&self) -> Result<Vec<Transaction>>;
}

#[async_trait]
pub trait ChainStore: Send + Sync {
    /// Returns an empty vector when nothing was persisted yet.
    async fn load_chain(&self) -> Result<Vec<Block>>;
    async fn save_chain(&self, chain: &[Block]) -> Result<()>;
}

pub type UserRegistryBox = Box<dyn UserRegistry>;
pub type TransactionLogBox = Box<dyn TransactionLog>;
pub type ChainStoreBox = Box<dyn ChainStore>;
