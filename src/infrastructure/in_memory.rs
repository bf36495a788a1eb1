use crate::domain::block::Block;
use crate::domain::ports::{ChainStore, TransactionLog, UserRegistry};
use crate::domain::transaction::Transaction;
use crate::domain::user::{User, UserId};
use crate::error::{CoinError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory user registry.
///
/// Clones share the same underlying map, which lets tests keep a handle on
/// a registry after handing it to an engine.
#[derive(Default, Clone)]
pub struct InMemoryUserRegistry {
    users: Arc<RwLock<BTreeMap<UserId, User>>>,
}

impl InMemoryUserRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRegistry for InMemoryUserRegistry {
    async fn exists(&self, user_id: &UserId) -> Result<bool> {
        Ok(self.users.read().await.contains_key(user_id))
    }

    async fn register(&self, user_id: &UserId) -> Result<User> {
        let mut users = self.users.write().await;
        if users.contains_key(user_id) {
            return Err(CoinError::AlreadyExists(user_id.clone()));
        }
        let user = User::new(user_id.clone());
        users.insert(user_id.clone(), user.clone());
        Ok(user)
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        Ok(self.users.read().await.values().cloned().collect())
    }
}

/// A thread-safe in-memory transaction log preserving append order.
#[derive(Default, Clone)]
pub struct InMemoryTransactionLog {
    transactions: Arc<RwLock<Vec<Transaction>>>,
}

impl InMemoryTransactionLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionLog for InMemoryTransactionLog {
    async fn append_transaction(&self, tx: &Transaction) -> Result<()> {
        self.transactions.write().await.push(tx.clone());
        Ok(())
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.transactions.read().await.clone())
    }
}

/// A thread-safe in-memory chain store.
#[derive(Default, Clone)]
pub struct InMemoryChainStore {
    blocks: Arc<RwLock<Vec<Block>>>,
}

impl InMemoryChainStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChainStore for InMemoryChainStore {
    async fn load_chain(&self) -> Result<Vec<Block>> {
        Ok(self.blocks.read().await.clone())
    }

    async fn save_chain(&self, chain: &[Block]) -> Result<()> {
        *self.blocks.write().await = chain.to_vec();
        Ok(())
    }
}
