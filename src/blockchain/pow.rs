use std::time::{Duration, Instant};

use log::debug;
use num_bigint::BigUint;

use super::{Block, MAX_DIFFICULTY, MAX_NONCE_ATTEMPTS, MINING_TIME_BUDGET, PowError};

/// Threshold a digest must stay strictly below: `1 << (256 - difficulty)`.
/// Larger difficulty means a smaller target.
pub fn derive_target(difficulty: u32) -> Result<BigUint, PowError> {
    if difficulty > MAX_DIFFICULTY {
        return Err(PowError::DifficultyOutOfRange(difficulty));
    }
    Ok(BigUint::from(1u8) << (MAX_DIFFICULTY - difficulty))
}

/// Termination policy for the nonce search. Whichever limit is hit first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningLimits {
    pub max_attempts: u64,
    pub time_budget: Duration,
}

impl Default for MiningLimits {
    fn default() -> Self {
        Self {
            max_attempts: MAX_NONCE_ATTEMPTS,
            time_budget: MINING_TIME_BUDGET,
        }
    }
}

/// Proof-of-Work context for one block. Ephemeral: built when mining or validating.
#[derive(Debug)]
pub struct ProofOfWork<'a> {
    block: &'a Block,
    target: BigUint,
}

impl<'a> ProofOfWork<'a> {
    pub fn new(block: &'a Block, difficulty: u32) -> Result<Self, PowError> {
        Ok(Self {
            block,
            target: derive_target(difficulty)?,
        })
    }

    /// Search nonces 1, 2, 3, ... for a digest below the target.
    /// Gives up on the attempt cap or once the time budget is spent.
    pub fn run(&self, limits: &MiningLimits) -> Result<(u64, [u8; 32]), PowError> {
        let started = Instant::now();
        let mut attempts: u64 = 0;

        while attempts < limits.max_attempts {
            let elapsed = started.elapsed();
            if elapsed >= limits.time_budget {
                return Err(PowError::TimedOut {
                    attempts,
                    elapsed_ms: elapsed.as_millis(),
                });
            }

            attempts += 1;
            let digest = self.block.digest(attempts);
            if self.meets_target(&digest) {
                debug!(
                    "POW - nonce {} found after {} ms",
                    attempts,
                    started.elapsed().as_millis()
                );
                return Ok((attempts, digest));
            }
        }

        Err(PowError::AttemptsExhausted { attempts })
    }

    /// Recheck the block's stored nonce against the target. No side effects.
    pub fn validate(&self) -> bool {
        self.meets_target(&self.block.digest(self.block.nonce))
    }

    fn meets_target(&self, digest: &[u8; 32]) -> bool {
        BigUint::from_bytes_be(digest) < self.target
    }
}

/// Mine `block` under `difficulty` and return it sealed.
pub fn seal_block(
    mut block: Block,
    difficulty: u32,
    limits: &MiningLimits,
) -> Result<Block, PowError> {
    let (nonce, digest) = ProofOfWork::new(&block, difficulty)?.run(limits)?;
    block.seal(nonce, digest);
    Ok(block)
}
