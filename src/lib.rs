//! A minimal single-process ledger: an append-only chain of blocks linked by
//! SHA-256 hashes and secured by a brute-force proof-of-work puzzle.
//!
//! Callers submit opaque transaction records into a pending pool, ask the
//! [`Ledger`] to mine them into the next block, and read the chain back.
//! Everything lives in process memory; networking, persistence and consensus
//! belong to whatever boundary layer drives the engine.

pub mod blockchain;
pub mod transaction;

pub use blockchain::{Block, CandidateBlock, DEFAULT_DIFFICULTY, Ledger, MineError, RejectReason};
pub use transaction::TransactionRecord;
