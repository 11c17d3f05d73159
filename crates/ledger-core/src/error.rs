use thiserror::Error;

use crate::constants::HASH_HEX_SIZE;

/// Errors raised while pooling, sealing or editing blocks.
///
/// A failed chain verification is not an error: it is reported through
/// [`crate::chain::Verification`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("difficulty {0} exceeds the {max} hex digits of a digest", max = HASH_HEX_SIZE)]
    InvalidDifficulty(u32),

    #[error("mining needs at least one thread")]
    NoMiningThreads,

    #[error("transaction index {index} out of range (pool holds {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("block {0} not found")]
    BlockNotFound(usize),

    #[error("block has no transaction to replace")]
    EmptyBlock,

    #[error("mining cancelled after {attempts} attempts")]
    MiningCancelled { attempts: u64 },

    #[error("mining timed out after {attempts} attempts")]
    MiningTimedOut { attempts: u64 },

    #[error("no nonce satisfied the difficulty within {attempts} attempts")]
    NonceBudgetExhausted { attempts: u64 },

    #[error("could not build mining thread pool: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
