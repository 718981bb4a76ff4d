pub mod block;
pub mod error;
pub mod model;
pub mod pow;

use std::time::Duration;

pub use block::Block;
pub use error::{LedgerError, PowError};
pub use model::Ledger;
pub use pow::MiningLimits;

/// Default Proof-of-Work difficulty (number of leading zero bits).
pub const DEFAULT_DIFFICULTY: u32 = 12;

/// Highest difficulty a 256-bit digest can express.
pub const MAX_DIFFICULTY: u32 = 256;

/// Record carried by the genesis block.
pub const GENESIS_DATA: &str = "Genesis Block";

/// Attempt cap for a single nonce search.
pub const MAX_NONCE_ATTEMPTS: u64 = 1_000_000;

/// Wall-clock ceiling for a single nonce search (CPU protection).
pub const MINING_TIME_BUDGET: Duration = Duration::from_secs(1);
