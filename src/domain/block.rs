use super::transaction::{Transaction, write_field};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Proof-of-work target: the number of leading `'0'` hex digits a block hash
/// must start with. Fixed for the lifetime of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Difficulty(u8);

impl Difficulty {
    pub const fn new(leading_zeros: u8) -> Self {
        Self(leading_zeros)
    }

    pub fn is_satisfied_by(&self, hash: &str) -> bool {
        let zeros = self.0 as usize;
        hash.len() >= zeros && hash.bytes().take(zeros).all(|b| b == b'0')
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::new(4)
    }
}

/// Everything a block commits to apart from its nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockFields {
    pub index: u64,
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
}

impl BlockFields {
    /// A SHA-256 state already fed with every field except the nonce.
    fn prefix_hasher(&self) -> Sha256 {
        prefix_hasher(
            self.index,
            self.timestamp,
            &self.transactions,
            &self.previous_hash,
        )
    }

    pub fn hash_with_nonce(&self, nonce: u64) -> String {
        finish(self.prefix_hasher(), nonce)
    }

    /// Runs [`search`] and assembles the sealed block.
    pub fn seal(self, difficulty: Difficulty) -> Block {
        let (nonce, hash) = search(&self, difficulty);
        Block {
            index: self.index,
            timestamp: self.timestamp,
            transactions: self.transactions,
            previous_hash: self.previous_hash,
            nonce,
            hash,
        }
    }
}

fn prefix_hasher(
    index: u64,
    timestamp: i64,
    transactions: &[Transaction],
    previous_hash: &str,
) -> Sha256 {
    let mut hasher = Sha256::new();
    hasher.update(index.to_be_bytes());
    hasher.update(timestamp.to_be_bytes());
    hasher.update((transactions.len() as u64).to_be_bytes());
    for tx in transactions {
        tx.write_canonical(&mut hasher);
    }
    write_field(&mut hasher, previous_hash.as_bytes());
    hasher
}

fn finish(mut hasher: Sha256, nonce: u64) -> String {
    hasher.update(nonce.to_be_bytes());
    hex::encode(hasher.finalize())
}

/// Finds the smallest nonce whose hash satisfies `difficulty`.
///
/// Pure and exhaustive over increasing nonces; no shared state is touched,
/// so it can run on any worker thread.
pub fn search(fields: &BlockFields, difficulty: Difficulty) -> (u64, String) {
    let prefix = fields.prefix_hasher();
    let mut nonce = 0u64;
    loop {
        let hash = finish(prefix.clone(), nonce);
        if difficulty.is_satisfied_by(&hash) {
            log::debug!(
                "block {} sealed after {} attempts: {}",
                fields.index,
                nonce + 1,
                hash
            );
            return (nonce, hash);
        }
        nonce += 1;
    }
}

/// Computes the hash of a block from its committed fields.
pub fn calculate_hash(
    index: u64,
    timestamp: i64,
    transactions: &[Transaction],
    previous_hash: &str,
    nonce: u64,
) -> String {
    finish(
        prefix_hasher(index, timestamp, transactions, previous_hash),
        nonce,
    )
}

/// A sealed block. Never mutated once appended to a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// 1-based position in the chain.
    pub index: u64,
    pub timestamp: i64,
    #[serde(deserialize_with = "crate::domain::transaction::deserialize_sealed")]
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub nonce: u64,
    pub hash: String,
}

impl Block {
    /// Mines the first block of a new chain.
    pub fn genesis(timestamp: i64, difficulty: Difficulty) -> Self {
        BlockFields {
            index: 1,
            timestamp,
            transactions: Vec::new(),
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
        }
        .seal(difficulty)
    }

    pub fn compute_hash(&self) -> String {
        calculate_hash(
            self.index,
            self.timestamp,
            &self.transactions,
            &self.previous_hash,
            self.nonce,
        )
    }

    /// Whether the stored hash still matches the block's own fields.
    pub fn has_consistent_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }
}
