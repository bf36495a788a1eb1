use crate::config::EngineConfig;
use crate::domain::block::{Block, BlockFields, Difficulty};
use crate::domain::ports::ChainStoreBox;
use crate::domain::transaction::{Transaction, now_millis};
use crate::error::{CoinError, Result};
use log::{debug, info, warn};
use std::collections::HashSet;
use tokio::sync::{Mutex, RwLock};

/// Why a block failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Stored hash differs from the hash of the block's own fields.
    HashMismatch,
    /// `previous_hash` differs from the prior block's stored hash.
    BrokenLink,
    /// Index is not the prior block's index plus one.
    IndexGap,
    /// A sealed transaction carries a zero or negative amount.
    InvalidAmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockFault {
    pub index: u64,
    pub kind: FaultKind,
}

/// Outcome of a full chain scan. Corruption is reported, never repaired.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainReport {
    pub blocks_checked: usize,
    pub faults: Vec<BlockFault>,
}

impl ChainReport {
    pub fn is_valid(&self) -> bool {
        self.faults.is_empty()
    }

    pub fn first_invalid_index(&self) -> Option<u64> {
        self.faults.first().map(|f| f.index)
    }

    /// Turns the first fault into `ChainCorrupted` for callers that halt on it.
    pub fn into_result(self) -> Result<()> {
        match self.first_invalid_index() {
            Some(index) => Err(CoinError::ChainCorrupted { index }),
            None => Ok(()),
        }
    }
}

/// Scans every block after genesis. Does not stop at the first fault.
pub fn verify_chain(chain: &[Block]) -> ChainReport {
    let mut report = ChainReport {
        blocks_checked: chain.len(),
        faults: Vec::new(),
    };

    for pair in chain.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        let mut fault = |kind| {
            report.faults.push(BlockFault {
                index: current.index,
                kind,
            })
        };

        if !current.has_consistent_hash() {
            fault(FaultKind::HashMismatch);
        }
        if current.previous_hash != previous.hash {
            fault(FaultKind::BrokenLink);
        }
        if current.index != previous.index + 1 {
            fault(FaultKind::IndexGap);
        }
        if current.transactions.iter().any(|tx| !tx.amount.is_positive()) {
            fault(FaultKind::InvalidAmount);
        }
    }

    report
}

#[derive(Debug)]
struct ChainState {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
}

impl ChainState {
    fn latest(&self) -> &Block {
        // `ChainEngine::open` guarantees a genesis block.
        &self.chain[self.chain.len() - 1]
    }

    fn is_known(&self, tx: &Transaction) -> bool {
        self.pending.iter().any(|p| p.id == tx.id)
            || self
                .chain
                .iter()
                .any(|b| b.transactions.iter().any(|t| t.id == tx.id))
    }
}

/// Seals pending transactions into a proof-of-work hash chain.
///
/// The chain and the pending pool sit behind one `RwLock`, so readers always
/// see a consistent tail. Seals are serialized by `seal_lock` and run the
/// nonce search without holding the state lock.
pub struct ChainEngine {
    store: ChainStoreBox,
    difficulty: Difficulty,
    state: RwLock<ChainState>,
    seal_lock: Mutex<()>,
}

impl ChainEngine {
    /// Loads the persisted chain, creating and saving a genesis block when
    /// nothing was stored yet.
    pub async fn open(store: ChainStoreBox, config: &EngineConfig) -> Result<Self> {
        let mut chain = store.load_chain().await?;

        if chain.is_empty() {
            let genesis = Block::genesis(now_millis(), config.difficulty);
            info!("created genesis block {}", genesis.hash);
            chain.push(genesis);
            store.save_chain(&chain).await?;
        } else {
            let report = verify_chain(&chain);
            if !report.is_valid() {
                warn!(
                    "loaded chain is corrupted, first fault at block {:?}",
                    report.first_invalid_index()
                );
            }
            info!("loaded chain with {} block(s)", chain.len());
        }

        Ok(Self {
            store,
            difficulty: config.difficulty,
            state: RwLock::new(ChainState {
                chain,
                pending: Vec::new(),
            }),
            seal_lock: Mutex::new(()),
        })
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Adds a transaction to the pending pool, stamping it if it has no
    /// timestamp. The transaction is trusted as-is.
    pub async fn add_transaction(&self, mut tx: Transaction) {
        if tx.timestamp == 0 {
            tx.timestamp = now_millis();
        }
        debug!("queued transaction {} for sealing", tx.id);
        self.state.write().await.pending.push(tx);
    }

    /// Queues every transaction of `ledger` that is neither sealed nor
    /// already pending. Returns how many were queued.
    pub async fn sync_from_ledger(&self, ledger: &[Transaction]) -> usize {
        let mut state = self.state.write().await;
        let known: HashSet<_> = state
            .chain
            .iter()
            .flat_map(|b| b.transactions.iter())
            .chain(state.pending.iter())
            .map(|tx| tx.id)
            .collect();

        let missing: Vec<_> = ledger
            .iter()
            .filter(|tx| !known.contains(&tx.id))
            .cloned()
            .collect();
        let queued = missing.len();
        state.pending.extend(missing);

        if queued > 0 {
            info!("queued {queued} unsealed ledger transaction(s)");
        }
        queued
    }

    /// Seals the current pending pool into a new block, persists the chain
    /// and clears the sealed transactions from the pool.
    pub async fn seal_pending_transactions(&self) -> Result<Block> {
        let _seal = self.seal_lock.lock().await;

        loop {
            let (fields, batch_len) = {
                let state = self.state.read().await;
                let tail = state.latest();
                let fields = BlockFields {
                    index: tail.index + 1,
                    timestamp: now_millis().max(tail.timestamp),
                    transactions: state.pending.clone(),
                    previous_hash: tail.hash.clone(),
                };
                (fields, state.pending.len())
            };

            let difficulty = self.difficulty;
            let block = tokio::task::spawn_blocking(move || fields.seal(difficulty)).await?;

            let mut state = self.state.write().await;
            let tail = state.latest();
            if tail.hash != block.previous_hash || tail.index + 1 != block.index {
                warn!(
                    "chain tail moved to block {} during proof-of-work, retrying",
                    tail.index
                );
                continue;
            }

            state.chain.push(block.clone());
            if let Err(e) = self.store.save_chain(&state.chain).await {
                state.chain.pop();
                return Err(e);
            }
            state.pending.drain(..batch_len);

            info!(
                "sealed block {} with {} transaction(s), nonce {}",
                block.index,
                block.transactions.len(),
                block.nonce
            );
            return Ok(block);
        }
    }

    pub async fn verify(&self) -> ChainReport {
        verify_chain(&self.state.read().await.chain)
    }

    pub async fn is_chain_valid(&self) -> bool {
        self.verify().await.is_valid()
    }

    pub async fn get_latest_block(&self) -> Block {
        self.state.read().await.latest().clone()
    }

    pub async fn chain(&self) -> Vec<Block> {
        self.state.read().await.chain.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.chain.len()
    }

    pub async fn pending_transactions(&self) -> Vec<Transaction> {
        self.state.read().await.pending.clone()
    }

    /// Whether `tx` is already pending or sealed.
    pub async fn contains(&self, tx: &Transaction) -> bool {
        self.state.read().await.is_known(tx)
    }
}
