/// Failures of the nonce search or of target derivation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PowError {
    #[error("difficulty {0} is outside 0..=256")]
    DifficultyOutOfRange(u32),

    /// The wall-clock budget ran out before a nonce was found.
    #[error("mining timed out after {elapsed_ms} ms ({attempts} attempts)")]
    TimedOut { attempts: u64, elapsed_ms: u128 },

    /// Every nonce up to the attempt cap missed the target.
    #[error("no valid nonce within {attempts} attempts")]
    AttemptsExhausted { attempts: u64 },
}

impl PowError {
    /// True for the two "search gave up" outcomes.
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            PowError::TimedOut { .. } | PowError::AttemptsExhausted { .. }
        )
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("proof-of-work failed: {0}")]
    Pow(#[from] PowError),

    /// The block does not point at the current tip.
    #[error("block does not extend the tip: expected prev_hash {expected:?}, got {actual:?}")]
    Discontinuous { expected: String, actual: String },

    /// The stored hash or nonce does not satisfy the proof-of-work.
    #[error("invalid seal: nonce={nonce} hash={hash:?}")]
    InvalidSeal { nonce: u64, hash: String },
}
