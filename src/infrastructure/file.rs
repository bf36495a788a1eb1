use crate::domain::block::Block;
use crate::domain::ports::{ChainStore, TransactionLog, UserRegistry};
use crate::domain::transaction::Transaction;
use crate::domain::user::{User, UserId};
use crate::error::{CoinError, Result};
use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

pub const USERS_FILE: &str = "users.json";
pub const LEDGER_FILE: &str = "ledger.jsonl";
pub const CHAIN_FILE: &str = "chain.json";

/// A JSON-on-disk store for users, the transaction log and the chain.
///
/// `users.json` and `chain.json` are rewritten atomically through a synced
/// temporary file and a rename. The ledger is JSON Lines, appended and
/// synced one transaction at a time.
///
/// `Clone` shares the write lock, so one clone may serve as registry and
/// another as log.
#[derive(Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn read_json<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        let path = self.path(name);
        if !path.exists() {
            return Ok(T::default());
        }
        let bytes = fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write_json_atomic<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(&mut tmp, value)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path(name))?;
        debug!("wrote {}", self.path(name).display());
        Ok(())
    }
}

#[async_trait]
impl UserRegistry for JsonFileStore {
    async fn exists(&self, user_id: &UserId) -> Result<bool> {
        let users: Vec<User> = self.read_json(USERS_FILE)?;
        Ok(users.iter().any(|u| &u.id == user_id))
    }

    async fn register(&self, user_id: &UserId) -> Result<User> {
        let _guard = self.write_lock.lock().await;
        let mut users: Vec<User> = self.read_json(USERS_FILE)?;
        if users.iter().any(|u| &u.id == user_id) {
            return Err(CoinError::AlreadyExists(user_id.clone()));
        }
        let user = User::new(user_id.clone());
        users.push(user.clone());
        self.write_json_atomic(USERS_FILE, &users)?;
        Ok(user)
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        self.read_json(USERS_FILE)
    }
}

#[async_trait]
impl TransactionLog for JsonFileStore {
    async fn append_transaction(&self, tx: &Transaction) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut line = serde_json::to_vec(tx)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(LEDGER_FILE))?;
        let prev_len = file.metadata()?.len();
        if let Err(e) = file.write_all(&line).and_then(|()| file.sync_data()) {
            // An unacknowledged line must not survive into the next replay.
            if let Err(rollback) = file.set_len(prev_len) {
                warn!("could not roll back partial ledger append: {rollback}");
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Replays the ledger. A final line without its newline was never
    /// acknowledged; it is dropped and truncated away.
    async fn list_transactions(&self) -> Result<Vec<Transaction>> {
        let _guard = self.write_lock.lock().await;
        let path = self.path(LEDGER_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let raw = fs::read(&path)?;
        let complete = match raw.iter().rposition(|b| *b == b'\n') {
            Some(pos) => pos + 1,
            None => 0,
        };
        if complete < raw.len() {
            warn!(
                "dropping {} byte(s) of unacknowledged ledger tail",
                raw.len() - complete
            );
            OpenOptions::new()
                .write(true)
                .open(&path)?
                .set_len(complete as u64)?;
        }

        let mut transactions = Vec::new();
        for line in raw[..complete].split(|b| *b == b'\n') {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            transactions.push(serde_json::from_slice(line)?);
        }
        Ok(transactions)
    }
}

#[async_trait]
impl ChainStore for JsonFileStore {
    async fn load_chain(&self) -> Result<Vec<Block>> {
        self.read_json(CHAIN_FILE)
    }

    async fn save_chain(&self, chain: &[Block]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_json_atomic(CHAIN_FILE, chain)
    }
}
