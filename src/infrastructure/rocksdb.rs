use crate::domain::block::Block;
use crate::domain::ports::{ChainStore, TransactionLog, UserRegistry};
use crate::domain::transaction::Transaction;
use crate::domain::user::{User, UserId};
use crate::error::{CoinError, Result};
use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch, WriteOptions,
};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Column Family for registered users.
pub const CF_USERS: &str = "users";
/// Column Family for the transaction log, keyed by append sequence.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family for sealed blocks, keyed by block index.
pub const CF_CHAIN: &str = "chain";

/// A persistent store implementation using RocksDB.
///
/// Users, transactions and blocks live in separate Column Families. Keys
/// are big-endian so iteration follows append order. Every write is synced
/// before it is acknowledged.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    next_sequence: Arc<AtomicU64>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist and resumes the
    /// transaction sequence after the last stored entry.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_USERS, CF_TRANSACTIONS, CF_CHAIN]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        let next_sequence = {
            let cf = cf(&db, CF_TRANSACTIONS)?;
            match db.iterator_cf(cf, IteratorMode::End).next() {
                Some(item) => {
                    let (key, _) = item?;
                    decode_key(&key)? + 1
                }
                None => 0,
            }
        };

        Ok(Self {
            db: Arc::new(db),
            next_sequence: Arc::new(AtomicU64::new(next_sequence)),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        cf(&self.db, name)
    }

    fn scan<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let handle = self.cf(name)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(handle, IteratorMode::Start) {
            let (_key, value) = item?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }
}

fn cf<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily> {
    db.cf_handle(name).ok_or_else(|| {
        CoinError::persistence(std::io::Error::other(format!(
            "{name} column family not found"
        )))
    })
}

fn decode_key(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key.try_into().map_err(|_| {
        CoinError::persistence(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "malformed sequence key",
        ))
    })?;
    Ok(u64::from_be_bytes(bytes))
}

fn synced() -> WriteOptions {
    let mut opts = WriteOptions::default();
    opts.set_sync(true);
    opts
}

#[async_trait]
impl UserRegistry for RocksDBStore {
    async fn exists(&self, user_id: &UserId) -> Result<bool> {
        let cf = self.cf(CF_USERS)?;
        Ok(self.db.get_pinned_cf(cf, user_id.as_str())?.is_some())
    }

    async fn register(&self, user_id: &UserId) -> Result<User> {
        if self.exists(user_id).await? {
            return Err(CoinError::AlreadyExists(user_id.clone()));
        }
        let user = User::new(user_id.clone());
        let value = serde_json::to_vec(&user)?;
        self.db
            .put_cf_opt(self.cf(CF_USERS)?, user_id.as_str(), value, &synced())?;
        Ok(user)
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        self.scan(CF_USERS)
    }
}

#[async_trait]
impl TransactionLog for RocksDBStore {
    async fn append_transaction(&self, tx: &Transaction) -> Result<()> {
        let value = serde_json::to_vec(tx)?;
        // Reserve the key up front; a failed put leaves a gap, never a clash.
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        self.db.put_cf_opt(
            self.cf(CF_TRANSACTIONS)?,
            sequence.to_be_bytes(),
            value,
            &synced(),
        )?;
        Ok(())
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>> {
        self.scan(CF_TRANSACTIONS)
    }
}

#[async_trait]
impl ChainStore for RocksDBStore {
    async fn load_chain(&self) -> Result<Vec<Block>> {
        self.scan(CF_CHAIN)
    }

    async fn save_chain(&self, chain: &[Block]) -> Result<()> {
        let cf = self.cf(CF_CHAIN)?;
        let mut batch = WriteBatch::default();
        for block in chain {
            batch.put_cf(cf, block.index.to_be_bytes(), serde_json::to_vec(block)?);
        }
        self.db.write_opt(batch, &synced())?;
        Ok(())
    }
}
