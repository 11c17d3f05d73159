use crate::{
    constants::CANCEL_POLL_INTERVAL,
    pow::{count_leading_zero_nibbles, hash_attempt},
    Block, LedgerError, MinerConfig, Result,
};
use rayon::prelude::*;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Shared stop switch for a running search. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A sealed block and how many nonces were hashed to find it.
#[derive(Clone, Debug)]
pub struct Mined {
    pub block: Block,
    pub attempts: u64,
}

enum Search {
    Found { nonce: u64, attempts: u64 },
    Cancelled { attempts: u64 },
    TimedOut { attempts: u64 },
    Exhausted { attempts: u64 },
}

enum Stop {
    Cancelled,
    TimedOut,
}

/// Proof-of-work search that can be bounded, cancelled and spread over
/// several threads.
#[derive(Clone, Debug)]
pub struct Miner {
    config: MinerConfig,
    cancel: CancelFlag,
}

impl Miner {
    pub fn new(difficulty: u32) -> Self {
        Self {
            config: MinerConfig {
                difficulty,
                ..MinerConfig::default()
            },
            cancel: CancelFlag::new(),
        }
    }

    pub fn from_config(config: MinerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancelFlag::new(),
        })
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.config.threads = threads;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.config.max_attempts = Some(max_attempts);
        self
    }

    /// Limits each search to `timeout`, counted from the moment [`Miner::seal`]
    /// starts hashing.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Searches nonces until the candidate's hex hash has `difficulty`
    /// leading zeros, then seals it.
    ///
    /// With one thread nonces are tried in order from 0, so the result is the
    /// smallest valid nonce. With more threads any valid nonce may win.
    ///
    /// The configured timeout starts here, so time a caller spent waiting for
    /// a lock before calling does not count against it.
    pub fn seal(&self, mut candidate: Block) -> Result<Mined> {
        self.config.validate()?;
        let body = candidate.body();
        let limit = self.config.max_attempts.unwrap_or(u64::MAX);
        let deadline = self.config.timeout().map(|t| Instant::now() + t);

        let outcome = if self.config.threads <= 1 {
            self.search(body.as_bytes(), limit, deadline)
        } else {
            self.search_parallel(body.as_bytes(), limit, deadline)?
        };

        match outcome {
            Search::Found { nonce, attempts } => {
                candidate.seal(nonce);
                info!(
                    nonce,
                    attempts,
                    difficulty = self.config.difficulty,
                    hash = %candidate.hash(),
                    "sealed block"
                );
                Ok(Mined {
                    block: candidate,
                    attempts,
                })
            }
            Search::Cancelled { attempts } => {
                warn!(attempts, "mining cancelled");
                Err(LedgerError::MiningCancelled { attempts })
            }
            Search::TimedOut { attempts } => {
                warn!(attempts, timeout_ms = self.config.timeout_ms, "mining timed out");
                Err(LedgerError::MiningTimedOut { attempts })
            }
            Search::Exhausted { attempts } => {
                warn!(attempts, difficulty = self.config.difficulty, "nonce budget exhausted");
                Err(LedgerError::NonceBudgetExhausted { attempts })
            }
        }
    }

    fn should_stop(&self, deadline: Option<Instant>) -> Option<Stop> {
        if self.cancel.is_cancelled() {
            Some(Stop::Cancelled)
        } else if deadline.is_some_and(|d| Instant::now() >= d) {
            Some(Stop::TimedOut)
        } else {
            None
        }
    }

    fn search(&self, body: &[u8], limit: u64, deadline: Option<Instant>) -> Search {
        let difficulty = self.config.difficulty;
        for nonce in 0..limit {
            if nonce % CANCEL_POLL_INTERVAL == 0 {
                match self.should_stop(deadline) {
                    Some(Stop::Cancelled) => return Search::Cancelled { attempts: nonce },
                    Some(Stop::TimedOut) => return Search::TimedOut { attempts: nonce },
                    None => {}
                }
            }
            if count_leading_zero_nibbles(&hash_attempt(nonce, body)) >= difficulty {
                return Search::Found {
                    nonce,
                    attempts: nonce + 1,
                };
            }
        }
        Search::Exhausted { attempts: limit }
    }

    fn search_parallel(
        &self,
        body: &[u8],
        limit: u64,
        deadline: Option<Instant>,
    ) -> Result<Search> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
            .map_err(|e| LedgerError::ThreadPool(e.to_string()))?;
        let difficulty = self.config.difficulty;
        let attempts = AtomicU64::new(0);
        let timed_out = AtomicBool::new(false);

        // A stop request satisfies the predicate so find_any unwinds every
        // worker; the winner is re-checked below.
        let found = pool.install(|| {
            (0..limit).into_par_iter().find_any(|nonce| {
                if nonce % CANCEL_POLL_INTERVAL == 0 {
                    if let Some(Stop::TimedOut) = self.should_stop(deadline) {
                        timed_out.store(true, Ordering::Relaxed);
                    }
                }
                if self.cancel.is_cancelled() || timed_out.load(Ordering::Relaxed) {
                    return true;
                }
                attempts.fetch_add(1, Ordering::Relaxed);
                count_leading_zero_nibbles(&hash_attempt(*nonce, body)) >= difficulty
            })
        });

        let attempts = attempts.into_inner();
        Ok(match found {
            Some(nonce) if count_leading_zero_nibbles(&hash_attempt(nonce, body)) >= difficulty => {
                Search::Found { nonce, attempts }
            }
            Some(_) if timed_out.into_inner() => Search::TimedOut { attempts },
            Some(_) => Search::Cancelled { attempts },
            None => Search::Exhausted { attempts },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pow, Transaction};

    fn a_to_b() -> Block {
        Block::candidate("", vec![Transaction::new("A", "B", 1.0)])
    }

    #[test]
    fn sequential_matches_plain_search() {
        let mined = Miner::new(1).seal(a_to_b()).unwrap();
        let plain = pow::mine_block(a_to_b(), 1);
        assert_eq!(mined.block, plain);
        assert_eq!(mined.block.nonce(), 10);
        assert_eq!(mined.attempts, 11);
    }

    #[test]
    fn parallel_search_finds_a_valid_nonce() {
        let mined = Miner::new(2).with_threads(4).seal(a_to_b()).unwrap();
        assert!(mined.block.hash().starts_with("00"));
        assert!(mined.block.verify_nonce(2));
        assert!(mined.attempts >= 1);
    }

    #[test]
    fn zero_difficulty_takes_the_first_nonce() {
        let mined = Miner::new(0).seal(a_to_b()).unwrap();
        assert_eq!(mined.block.nonce(), 0);
        assert_eq!(mined.attempts, 1);
    }

    #[test]
    fn cancelled_before_start() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let miner = Miner::new(4).with_cancel_flag(cancel.clone());
        assert_eq!(
            miner.seal(a_to_b()).unwrap_err(),
            LedgerError::MiningCancelled { attempts: 0 }
        );
        assert!(miner.cancel_flag().is_cancelled());
    }

    #[test]
    fn cancelled_parallel_search() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let miner = Miner::new(8).with_threads(2).with_cancel_flag(cancel);
        assert!(matches!(
            miner.seal(a_to_b()),
            Err(LedgerError::MiningCancelled { .. })
        ));
    }

    #[test]
    fn timeout_stops_a_hopeless_search() {
        let started = Instant::now();
        let err = Miner::new(64)
            .with_timeout(Duration::from_millis(20))
            .seal(a_to_b())
            .unwrap_err();
        assert!(matches!(err, LedgerError::MiningTimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn timeout_stops_a_parallel_search() {
        let err = Miner::new(64)
            .with_threads(2)
            .with_timeout(Duration::from_millis(20))
            .seal(a_to_b())
            .unwrap_err();
        assert!(matches!(err, LedgerError::MiningTimedOut { .. }));
    }

    #[test]
    fn generous_timeout_does_not_interfere() {
        let mined = Miner::new(1)
            .with_timeout(Duration::from_secs(30))
            .seal(a_to_b())
            .unwrap();
        assert_eq!(mined.block.nonce(), 10);
    }

    #[test]
    fn attempt_budget_is_enforced() {
        // The first valid nonce at difficulty 1 is 10.
        let miner = Miner::new(1).with_max_attempts(5);
        assert_eq!(
            miner.seal(a_to_b()).unwrap_err(),
            LedgerError::NonceBudgetExhausted { attempts: 5 }
        );
        assert!(Miner::new(1).with_max_attempts(11).seal(a_to_b()).is_ok());
    }

    #[test]
    fn impossible_difficulty_is_rejected() {
        assert_eq!(
            Miner::new(65).seal(a_to_b()).unwrap_err(),
            LedgerError::InvalidDifficulty(65)
        );
        assert!(Miner::from_config(MinerConfig {
            difficulty: 100,
            ..MinerConfig::default()
        })
        .is_err());
    }

    #[test]
    fn higher_difficulty_never_needs_fewer_attempts() {
        let (mut easy, mut hard) = (0u64, 0u64);
        for i in 0..24 {
            let candidate = Block::candidate(format!("prev-{i}"), vec![]);
            let d1 = Miner::new(1).seal(candidate.clone()).unwrap().attempts;
            let d2 = Miner::new(2).seal(candidate).unwrap().attempts;
            assert!(d2 >= d1);
            easy += d1;
            hard += d2;
        }
        assert!(hard > easy);
    }
}
