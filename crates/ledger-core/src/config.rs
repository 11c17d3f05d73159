//! Mining configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{DEFAULT_DIFFICULTY, HASH_HEX_SIZE};
use crate::{LedgerError, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Leading `0` hex digits required of a sealed block's hash.
    pub difficulty: u32,
    /// 1 searches on the calling thread; more spreads the nonce range over a
    /// rayon pool.
    pub threads: usize,
    /// Upper bound on nonces tried before giving up.
    pub max_attempts: Option<u64>,
    /// Wall-clock limit a host applies before cancelling a search.
    pub timeout_ms: Option<u64>,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            threads: 1,
            max_attempts: None,
            timeout_ms: None,
        }
    }
}

impl MinerConfig {
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn validate(&self) -> Result<()> {
        if self.difficulty as usize > HASH_HEX_SIZE {
            return Err(LedgerError::InvalidDifficulty(self.difficulty));
        }
        if self.threads == 0 {
            return Err(LedgerError::NoMiningThreads);
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = MinerConfig::default();
        assert_eq!(cfg.difficulty, 2);
        assert_eq!(cfg.threads, 1);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.timeout(), None);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = MinerConfig::from_json_str(r#"{"difficulty":3,"timeout_ms":250}"#).unwrap();
        assert_eq!(cfg.difficulty, 3);
        assert_eq!(cfg.threads, 1);
        assert_eq!(cfg.max_attempts, None);
        assert_eq!(cfg.timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn rejects_impossible_difficulty() {
        let cfg = MinerConfig {
            difficulty: 65,
            ..MinerConfig::default()
        };
        assert_eq!(cfg.validate(), Err(LedgerError::InvalidDifficulty(65)));
    }

    #[test]
    fn rejects_zero_threads() {
        let cfg = MinerConfig {
            threads: 0,
            ..MinerConfig::default()
        };
        assert_eq!(cfg.validate(), Err(LedgerError::NoMiningThreads));
    }
}
