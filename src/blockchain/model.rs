use log::{debug, info, warn};
use thiserror::Error;

use super::block::{Block, CandidateBlock, GENESIS_PREVIOUS_HASH, meets_difficulty};
use crate::transaction::TransactionRecord;

/// Why `add_block` refused a candidate. Rejections are routine results, not
/// failures: the chain is left exactly as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("previous_hash does not match the chain tip")]
    LinkageMismatch,
    #[error("proof does not satisfy the difficulty or the block contents")]
    InvalidProof,
}

/// `mine` built a block that its own ledger then refused. Under a single
/// mutator this cannot happen; seeing it means the chain was mutated while
/// the proof-of-work search ran.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("freshly mined block #{index} was rejected: {reason}")]
pub struct MineError {
    pub index: u64,
    pub reason: RejectReason,
}

/// Simple in-memory ledger with Proof-of-Work.
///
/// Owns the append-only chain (index 0 is always genesis), the pool of
/// not-yet-mined transaction records, and the difficulty parameter. All
/// mutators take `&mut self`; the ledger assumes a single logical mutator at
/// a time. A boundary layer serving concurrent requests must wrap the whole
/// ledger in a `Mutex` so that two `mine` calls cannot race on the same pool
/// snapshot and chain tip.
#[derive(Debug)]
pub struct Ledger {
    chain: Vec<Block>,
    pending: Vec<TransactionRecord>,
    difficulty: u32,
}

impl Ledger {
    /// Initialize a ledger holding only the genesis block. `difficulty` is
    /// the number of leading zero hex digits an accepted block hash must
    /// carry; it is fixed for the lifetime of the ledger.
    pub fn new(difficulty: u32) -> Self {
        Self {
            chain: vec![Block::genesis()],
            pending: Vec::new(),
            difficulty,
        }
    }

    /// Return the last block in the chain.
    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("ledger always holds at least the genesis block")
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        // A ledger always carries its genesis block.
        false
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Append `record` to the pending pool. Records are opaque to the
    /// engine: no dedup, no field validation — shape checks belong to the
    /// boundary layer that accepted the record.
    pub fn submit_transaction(&mut self, record: TransactionRecord) {
        self.pending.push(record);
        debug!(
            "transaction accepted into pending pool (size: {})",
            self.pending.len()
        );
    }

    /// The full chain, genesis first.
    pub fn read_chain(&self) -> &[Block] {
        &self.chain
    }

    /// Records submitted but not yet mined into a block, in submission order.
    pub fn read_pending(&self) -> &[TransactionRecord] {
        &self.pending
    }

    /// Brute-force the nonce until the candidate's hash carries the
    /// difficulty prefix. The scan starts at nonce 0 and ascends, so the
    /// returned nonce is the smallest qualifying one and field-identical
    /// inputs always find the same proof. Unbounded by design: expected cost
    /// grows as 16^difficulty.
    pub fn find_proof(&self, mut candidate: CandidateBlock) -> (CandidateBlock, String) {
        candidate.nonce = 0;
        let mut computed = candidate.compute_hash();
        while !meets_difficulty(&computed, self.difficulty) {
            candidate.nonce += 1;
            computed = candidate.compute_hash();
        }
        (candidate, computed)
    }

    /// `proof` must carry the difficulty prefix and equal a fresh hash of
    /// the candidate's current fields. Recomputing guards against a stale or
    /// forged proof that no longer matches the block.
    pub fn is_valid_proof(&self, candidate: &CandidateBlock, proof: &str) -> bool {
        meets_difficulty(proof, self.difficulty) && proof == candidate.compute_hash()
    }

    /// Validate `candidate` against the chain tip and `proof`, then seal it
    /// with `proof` as its hash and append it. Accept-or-reject is atomic:
    /// on rejection the chain is untouched. The pending pool is never
    /// touched here; clearing it is `mine`'s job.
    pub fn add_block(
        &mut self,
        candidate: CandidateBlock,
        proof: String,
    ) -> Result<u64, RejectReason> {
        if candidate.previous_hash != self.last_block().hash() {
            warn!(
                "rejected block #{}: previous_hash does not match tip",
                candidate.index
            );
            return Err(RejectReason::LinkageMismatch);
        }
        if !self.is_valid_proof(&candidate, &proof) {
            warn!("rejected block #{}: invalid proof", candidate.index);
            return Err(RejectReason::InvalidProof);
        }

        let block = candidate.seal(proof);
        let index = block.index();
        self.chain.push(block);
        Ok(index)
    }

    /// Mine the pending pool into the next block:
    /// - `Ok(None)` when the pool is empty (nothing to mine — not an error)
    /// - otherwise snapshot the pool into a candidate linked to the tip, run
    ///   the proof-of-work search and append the result.
    ///
    /// The pool is cleared only after `add_block` accepted the block;
    /// records submitted after the snapshot stay pending for the next mine.
    /// A rejection here is surfaced as [`MineError`] rather than swallowed,
    /// since a block built against the tip can only be refused if the chain
    /// moved underneath us.
    pub fn mine(&mut self) -> Result<Option<u64>, MineError> {
        if self.pending.is_empty() {
            return Ok(None);
        }

        let tip = self.last_block();
        let candidate = CandidateBlock::new(
            tip.index() + 1,
            tip.hash().to_owned(),
            self.pending.clone(),
        );
        let (candidate, proof) = self.find_proof(candidate);
        let index = candidate.index();
        let nonce = candidate.nonce();

        match self.add_block(candidate, proof) {
            Ok(index) => {
                self.pending.clear();
                info!(
                    "sealed block #{} (hash={}, nonce={})",
                    index,
                    self.last_block().hash(),
                    nonce
                );
                Ok(Some(index))
            }
            Err(reason) => Err(MineError { index, reason }),
        }
    }

    /// Validate the entire chain: genesis shape, linkage, index sequence,
    /// hash integrity and PoW.
    pub fn is_valid_chain(&self) -> bool {
        let Some(genesis) = self.chain.first() else {
            return false;
        };
        if genesis.index() != 0
            || genesis.previous_hash() != GENESIS_PREVIOUS_HASH
            || genesis.hash() != genesis.compute_hash()
        {
            return false;
        }

        for pair in self.chain.windows(2) {
            let (prev, current) = (&pair[0], &pair[1]);
            if current.previous_hash() != prev.hash() {
                return false;
            }
            if current.index() != prev.index() + 1 {
                return false;
            }
            if !current.is_valid(self.difficulty) {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::{Ledger, MineError, RejectReason};
    use crate::blockchain::block::{CandidateBlock, GENESIS_PREVIOUS_HASH};
    use crate::transaction::TransactionRecord;
    use serde_json::json;

    fn record(author: &str, content: &str) -> TransactionRecord {
        TransactionRecord::new(json!({ "author": author, "content": content }))
    }

    fn candidate_for(ledger: &Ledger) -> CandidateBlock {
        CandidateBlock::with_timestamp(
            ledger.last_block().index() + 1,
            ledger.last_block().hash().to_owned(),
            vec![record("a", "hello")],
            1_600_000_000_000,
        )
    }

    #[test]
    fn new_ledger_holds_only_genesis() {
        let ledger = Ledger::new(2);
        assert_eq!(ledger.len(), 1);
        let genesis = ledger.last_block();
        assert_eq!(genesis.index(), 0);
        assert_eq!(genesis.previous_hash(), GENESIS_PREVIOUS_HASH);
        assert!(genesis.transactions().is_empty());
        assert_eq!(genesis.hash(), genesis.compute_hash());
        assert!(ledger.read_pending().is_empty());
    }

    #[test]
    fn find_proof_meets_difficulty_with_minimal_nonce() {
        let ledger = Ledger::new(2);
        let template = candidate_for(&ledger);

        let (mined, proof) = ledger.find_proof(template.clone());
        assert!(proof.starts_with("00"));
        assert_eq!(proof, mined.compute_hash());

        // Every nonce below the winner must fail the predicate.
        let mut probe = template;
        for n in 0..mined.nonce() {
            probe.nonce = n;
            assert!(!probe.compute_hash().starts_with("00"));
        }
    }

    #[test]
    fn find_proof_is_deterministic() {
        let ledger = Ledger::new(2);
        let (first, first_proof) = ledger.find_proof(candidate_for(&ledger));
        let (second, second_proof) = ledger.find_proof(candidate_for(&ledger));
        assert_eq!(first.nonce(), second.nonce());
        assert_eq!(first_proof, second_proof);
    }

    #[test]
    fn add_block_rejects_broken_linkage() {
        let mut ledger = Ledger::new(1);
        let candidate = CandidateBlock::with_timestamp(
            1,
            "deadbeef".into(),
            vec![record("a", "hello")],
            1_600_000_000_000,
        );
        let (candidate, proof) = ledger.find_proof(candidate);

        let result = ledger.add_block(candidate, proof);
        assert_eq!(result, Err(RejectReason::LinkageMismatch));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn add_block_rejects_forged_proof() {
        let mut ledger = Ledger::new(2);
        let candidate = candidate_for(&ledger);

        // Looks like it qualifies but was never computed from the block.
        let forged = format!("00{}", "a".repeat(62));
        let result = ledger.add_block(candidate, forged);
        assert_eq!(result, Err(RejectReason::InvalidProof));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn add_block_rejects_stale_proof() {
        let mut ledger = Ledger::new(2);
        let (mut candidate, proof) = ledger.find_proof(candidate_for(&ledger));

        // Fields moved after the search finished; the proof no longer matches.
        candidate.nonce += 1;
        let result = ledger.add_block(candidate, proof);
        assert_eq!(result, Err(RejectReason::InvalidProof));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn add_block_accepts_a_fresh_proof() {
        let mut ledger = Ledger::new(2);
        let (candidate, proof) = ledger.find_proof(candidate_for(&ledger));

        let index = ledger.add_block(candidate, proof).expect("accepted");
        assert_eq!(index, 1);
        assert_eq!(ledger.len(), 2);
        // The pending pool is not add_block's business.
        assert!(ledger.read_pending().is_empty());
    }

    #[test]
    fn mine_end_to_end_at_difficulty_two() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut ledger = Ledger::new(2);
        ledger.submit_transaction(record("a", "hello"));
        ledger.submit_transaction(record("b", "world"));
        assert_eq!(ledger.read_pending().len(), 2);

        let mined = ledger.mine().expect("mining must not fail");
        assert_eq!(mined, Some(1));

        assert_eq!(ledger.len(), 2);
        assert!(ledger.read_pending().is_empty());

        let block = &ledger.read_chain()[1];
        assert!(block.hash().starts_with("00"));
        assert_eq!(block.hash(), block.compute_hash());
        assert_eq!(block.previous_hash(), ledger.read_chain()[0].hash());
        assert_eq!(
            block.transactions(),
            &[record("a", "hello"), record("b", "world")]
        );
        assert!(ledger.is_valid_chain());
    }

    #[test]
    fn mine_with_empty_pool_is_a_noop() {
        let mut ledger = Ledger::new(2);
        assert_eq!(ledger.mine(), Ok(None));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn records_submitted_after_a_mine_wait_for_the_next_block() {
        let mut ledger = Ledger::new(1);
        ledger.submit_transaction(record("a", "hello"));
        assert_eq!(ledger.mine(), Ok(Some(1)));

        ledger.submit_transaction(record("c", "later"));
        assert_eq!(ledger.mine(), Ok(Some(2)));

        assert_eq!(ledger.read_chain()[1].transactions(), &[record("a", "hello")]);
        assert_eq!(ledger.read_chain()[2].transactions(), &[record("c", "later")]);
    }

    #[test]
    fn reads_are_idempotent() {
        let mut ledger = Ledger::new(1);
        ledger.submit_transaction(record("a", "hello"));
        ledger.submit_transaction(record("b", "world"));
        ledger.mine().expect("mining must not fail");
        ledger.submit_transaction(record("c", "pending"));

        let first = serde_json::to_value(ledger.read_chain()).unwrap();
        let second = serde_json::to_value(ledger.read_chain()).unwrap();
        assert_eq!(first, second);
        assert_eq!(ledger.read_pending(), ledger.read_pending());
    }

    #[test]
    fn chain_validation_catches_tampering() {
        let mut ledger = Ledger::new(1);
        ledger.submit_transaction(record("a", "hello"));
        ledger.submit_transaction(record("b", "world"));
        ledger.mine().expect("mining must not fail");
        ledger.submit_transaction(record("c", "again"));
        ledger.mine().expect("mining must not fail");
        assert!(ledger.is_valid_chain());

        // Splice in a block whose linkage is broken.
        let orphan = CandidateBlock::with_timestamp(
            3,
            "deadbeef".into(),
            vec![record("x", "tamper")],
            1_600_000_000_000,
        );
        let (orphan, proof) = ledger.find_proof(orphan);
        ledger.chain.push(orphan.seal(proof));
        assert!(!ledger.is_valid_chain());
    }

    #[test]
    fn mine_error_carries_the_rejection() {
        let err = MineError {
            index: 7,
            reason: RejectReason::LinkageMismatch,
        };
        assert_eq!(
            err.to_string(),
            "freshly mined block #7 was rejected: previous_hash does not match the chain tip"
        );
    }
}
