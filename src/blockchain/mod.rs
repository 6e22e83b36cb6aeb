pub mod block;
pub mod model;

pub use block::{Block, CandidateBlock, GENESIS_PREVIOUS_HASH};
pub use model::{Ledger, MineError, RejectReason};

/// Default Proof-of-Work difficulty (number of leading zero hex digits).
pub const DEFAULT_DIFFICULTY: u32 = 2;
