//! Hash-linked sequence of sealed blocks plus the pool feeding it.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use crate::{Block, Miner, Result, Transaction, TransactionPool};
#[cfg(any(test, feature = "tamper"))]
use crate::LedgerError;

/// Outcome of walking the chain backward from a trusted digest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verification {
    /// Every recomputed hash matched; `links` previous-hash links were followed.
    Valid { links: usize },
    /// The block at `index` does not hash to the digest its successor (or the
    /// caller, for the head) expected.
    Invalid { index: usize },
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid { .. })
    }

    pub fn failure_index(&self) -> Option<usize> {
        match self {
            Verification::Valid { .. } => None,
            Verification::Invalid { index } => Some(*index),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Chain {
    blocks: Vec<Block>,
    pool: TransactionPool,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty chain whose pool already holds `pool`.
    pub fn with_pool(pool: TransactionPool) -> Self {
        Self {
            blocks: Vec::new(),
            pool,
        }
    }

    pub fn add_transaction(
        &mut self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        value: f32,
    ) -> &Transaction {
        self.pool.add_transaction(sender, recipient, value)
    }

    pub fn pool(&self) -> &TransactionPool {
        &self.pool
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Stored hash of the last block, or `""` for an empty chain so the next
    /// block becomes genesis.
    pub fn head_hash(&self) -> &str {
        self.blocks.last().map_or("", |b| b.hash())
    }

    /// Seals a block over `selected` that points at `previous_hash` and
    /// appends it.
    pub fn build_block(
        &mut self,
        previous_hash: &str,
        selected: Vec<Transaction>,
        difficulty: u32,
    ) -> Result<&Block> {
        self.build_block_with(previous_hash, selected, &Miner::new(difficulty))
    }

    pub fn build_block_with(
        &mut self,
        previous_hash: &str,
        selected: Vec<Transaction>,
        miner: &Miner,
    ) -> Result<&Block> {
        let mined = miner.seal(Block::candidate(previous_hash, selected))?;
        Ok(self.append(mined.block))
    }

    /// Seals the pool transactions at zero-based `indices` on top of the
    /// current head. The pool is left untouched.
    pub fn mine_next(&mut self, indices: &[usize], miner: &Miner) -> Result<&Block> {
        let selected = self.pool.select(indices)?;
        let previous = self.head_hash().to_owned();
        self.build_block_with(&previous, selected, miner)
    }

    fn append(&mut self, block: Block) -> &Block {
        info!(
            index = self.blocks.len(),
            nonce = block.nonce(),
            txs = block.transactions().len(),
            hash = %block.hash(),
            "block appended"
        );
        self.blocks.push(block);
        &self.blocks[self.blocks.len() - 1]
    }

    /// Walks from the head back to genesis. The head must hash to
    /// `last_known`; each earlier block must hash to its successor's previous
    /// hash. Genesis's own (empty) previous hash is not followed.
    ///
    /// An empty chain is trivially valid.
    pub fn verify_from(&self, last_known: &str) -> Verification {
        let mut expected = last_known;
        for (index, block) in self.blocks.iter().enumerate().rev() {
            if block.compute_hash() != expected {
                warn!(index, "chain invalid");
                return Verification::Invalid { index };
            }
            expected = block.previous_hash();
        }
        let links = self.blocks.len().saturating_sub(1);
        info!(links, "chain verified: all blocks are connected and valid");
        Verification::Valid { links }
    }

    /// Same walk anchored on the chain's own stored head hash.
    pub fn verify(&self) -> Verification {
        self.verify_from(self.head_hash())
    }

    /// Replaces the first transaction of block `index` and rehashes only that
    /// block, leaving its successor's link stale.
    #[cfg(any(test, feature = "tamper"))]
    pub fn tamper_first_transaction(&mut self, index: usize, tx: Transaction) -> Result<()> {
        self.blocks
            .get_mut(index)
            .ok_or(LedgerError::BlockNotFound(index))?
            .replace_first_transaction(tx)
    }
}

/// One chain shared by several callers. Reading the head, sealing and
/// appending happen under a single lock, so no two callers ever mine on the
/// same head.
#[derive(Clone, Debug, Default)]
pub struct SharedChain {
    inner: Arc<Mutex<Chain>>,
}

impl SharedChain {
    pub fn new(chain: Chain) -> Self {
        Self {
            inner: Arc::new(Mutex::new(chain)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Chain> {
        // Blocks are appended only after a successful seal, so a panicking
        // holder cannot leave a half-written chain behind.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_transaction(
        &self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        value: f32,
    ) {
        self.lock().add_transaction(sender, recipient, value);
    }

    /// Picks transactions with `select`, seals them on the current head and
    /// appends. Returns the new block's index and a copy of it.
    pub fn mine_next<F>(&self, select: F, miner: &Miner) -> Result<(usize, Block)>
    where
        F: FnOnce(&TransactionPool) -> Result<Vec<Transaction>>,
    {
        let mut chain = self.lock();
        let selected = select(chain.pool())?;
        let previous = chain.head_hash().to_owned();
        let block = chain.build_block_with(&previous, selected, miner)?.clone();
        Ok((chain.len() - 1, block))
    }

    pub fn head_hash(&self) -> String {
        self.lock().head_hash().to_owned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn pool_len(&self) -> usize {
        self.lock().pool().len()
    }

    /// Point-in-time copy for reporting.
    pub fn snapshot(&self) -> Chain {
        self.lock().clone()
    }

    pub fn verify_from(&self, last_known: &str) -> Verification {
        self.lock().verify_from(last_known)
    }
}

impl From<Chain> for SharedChain {
    fn from(chain: Chain) -> Self {
        Self::new(chain)
    }
}
