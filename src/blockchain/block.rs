use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::transaction::TransactionRecord;

/// Sentinel `previous_hash` carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// A block that has not been accepted yet: every field except the final hash.
/// Built by the ledger when mining starts; the proof-of-work search takes it
/// by value and hands it back with the winning nonce. Only `add_block` can
/// turn one into a sealed [`Block`].
#[derive(Debug, Clone)]
pub struct CandidateBlock {
    pub(crate) index: u64,
    pub(crate) timestamp: i64, // Unix timestamp in milliseconds (UTC)
    pub(crate) previous_hash: String,
    pub(crate) nonce: u64,
    pub(crate) transactions: Vec<TransactionRecord>,
}

impl CandidateBlock {
    /// Create an unsealed candidate timestamped now, with nonce 0.
    pub fn new(index: u64, previous_hash: String, transactions: Vec<TransactionRecord>) -> Self {
        Self::with_timestamp(
            index,
            previous_hash,
            transactions,
            Utc::now().timestamp_millis(),
        )
    }

    /// Like [`CandidateBlock::new`] with an explicit timestamp.
    pub fn with_timestamp(
        index: u64,
        previous_hash: String,
        transactions: Vec<TransactionRecord>,
        timestamp: i64,
    ) -> Self {
        Self {
            index,
            timestamp,
            previous_hash,
            nonce: 0,
            transactions,
        }
    }

    /// Compute the SHA-256 hash of this candidate's fields. Pure: each call
    /// reflects whatever the nonce is at the time.
    pub fn compute_hash(&self) -> String {
        digest_hex(&hash_preimage(
            self.index,
            self.timestamp,
            &self.previous_hash,
            self.nonce,
            &self.transactions,
        ))
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    /// Assign the hash exactly once, producing the immutable accepted form.
    pub(crate) fn seal(self, hash: String) -> Block {
        Block {
            index: self.index,
            timestamp: self.timestamp,
            previous_hash: self.previous_hash,
            nonce: self.nonce,
            hash,
            transactions: self.transactions,
        }
    }
}

/// An accepted block in the chain. Sealed: the hash was assigned when the
/// ledger accepted it and no field changes afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Block {
    index: u64,
    timestamp: i64,
    previous_hash: String,
    nonce: u64,
    hash: String,
    transactions: Vec<TransactionRecord>,
}

impl Block {
    /// The genesis block (first block in the chain): empty transactions,
    /// sentinel previous-hash, hash computed directly without proof-of-work.
    pub fn genesis() -> Self {
        let candidate = CandidateBlock::new(0, GENESIS_PREVIOUS_HASH.to_string(), Vec::new());
        let hash = candidate.compute_hash();
        candidate.seal(hash)
    }

    /// Recompute the SHA-256 hash of this block's fields, excluding the
    /// stored `hash` itself.
    pub fn compute_hash(&self) -> String {
        digest_hex(&hash_preimage(
            self.index,
            self.timestamp,
            &self.previous_hash,
            self.nonce,
            &self.transactions,
        ))
    }

    /// Validate that the stored hash matches the block's content and
    /// satisfies the PoW difficulty. (Does NOT validate chain linkage.)
    pub fn is_valid(&self, difficulty: u32) -> bool {
        self.hash == self.compute_hash() && meets_difficulty(&self.hash, difficulty)
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn transactions(&self) -> &[TransactionRecord] {
        &self.transactions
    }
}

/// True when the first `difficulty` hex digits of `hash` are all `'0'`.
pub(crate) fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    hash.len() >= difficulty as usize && hash.bytes().take(difficulty as usize).all(|b| b == b'0')
}

/// Canonical JSON preimage of a block's hashable fields. `serde_json` maps
/// are backed by a `BTreeMap`, so object keys come out lexicographically
/// sorted at every nesting level and a given field set always serializes to
/// the same bytes.
fn hash_preimage(
    index: u64,
    timestamp: i64,
    previous_hash: &str,
    nonce: u64,
    transactions: &[TransactionRecord],
) -> String {
    serde_json::json!({
        "index": index,
        "nonce": nonce,
        "previous_hash": previous_hash,
        "timestamp": timestamp,
        "transactions": transactions,
    })
    .to_string()
}

fn digest_hex(preimage: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(preimage.as_bytes());
    hex::encode(hasher.finalize())
}
