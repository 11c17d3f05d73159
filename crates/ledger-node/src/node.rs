use anyhow::{Context, Result};
use ledger_core::{Block, Miner, MinerConfig, SharedChain};
use tracing::info;

/// A caller that mines onto the shared chain. Nodes own nothing but a handle;
/// the chain serialises their appends.
pub struct Node {
    id: usize,
    chain: SharedChain,
    config: MinerConfig,
}

impl Node {
    pub fn new(id: usize, chain: SharedChain, config: MinerConfig) -> Self {
        Self { id, chain, config }
    }

    /// Seals the pool transactions at `picks` (zero-based) onto the head.
    /// The search runs on the blocking pool. The configured timeout covers
    /// the search only, not the wait for the chain lock.
    pub async fn mine_block(&self, picks: Vec<usize>) -> Result<(usize, Block)> {
        info!(node = self.id, ?picks, "node is mining a new block");

        let miner = Miner::from_config(self.config.clone())?;
        let chain = self.chain.clone();
        let (index, block) = tokio::task::spawn_blocking(move || {
            chain.mine_next(|pool| pool.select(&picks), &miner)
        })
        .await
        .context("mining task panicked")??;

        if !block.verify_nonce(self.config.difficulty) {
            anyhow::bail!("node {} sealed block {index} with an invalid nonce", self.id);
        }
        info!(
            node = self.id,
            index,
            nonce = block.nonce(),
            hash = %block.hash(),
            "node mined a new block"
        );
        Ok((index, block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::{Chain, LedgerError, TransactionPool};
    use std::time::Duration;

    fn reference_chain() -> SharedChain {
        SharedChain::new(Chain::with_pool(TransactionPool::reference()))
    }

    fn config(difficulty: u32, timeout_ms: Option<u64>) -> MinerConfig {
        MinerConfig {
            difficulty,
            timeout_ms,
            ..MinerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_mined_block_is_sealed_and_linked() -> anyhow::Result<()> {
        let chain = reference_chain();
        let node = Node::new(1, chain.clone(), config(2, None));
        let (i0, b0) = node.mine_block(vec![0, 1]).await?;
        let (i1, b1) = node.mine_block(vec![2]).await?;
        assert_eq!((i0, i1), (0, 1));
        assert!(b0.hash().starts_with("00") && b1.hash().starts_with("00"));
        assert_eq!(b1.previous_hash(), b0.hash());
        assert_eq!(b1.transactions()[0].sender(), "Mia");
        assert!(chain.verify_from(b1.hash()).is_valid());
        Ok(())
    }

    #[tokio::test]
    async fn test_timeout_cancels_own_search() -> anyhow::Result<()> {
        let chain = reference_chain();
        let node = Node::new(1, chain.clone(), config(64, Some(50)));
        let err = node.mine_block(vec![0]).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LedgerError>(),
            Some(LedgerError::MiningTimedOut { .. })
        ));
        assert!(chain.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_waiting_for_the_lock_does_not_count_against_timeout() -> anyhow::Result<()> {
        let chain = reference_chain();

        // Holds the chain lock for about 300ms, then gives up.
        let slow = Node::new(1, chain.clone(), config(64, Some(300)));
        let slow_task = tokio::spawn(async move { slow.mine_block(vec![0]).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Needs a single hash, but queues behind the slow node longer than
        // its own timeout.
        let fast = Node::new(2, chain.clone(), config(0, Some(100)));
        let (index, block) = fast.mine_block(vec![1]).await?;
        assert_eq!(index, 0);
        assert_eq!(block.nonce(), 0);

        assert!(slow_task.await?.is_err());
        assert_eq!(chain.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_pick_is_reported() -> anyhow::Result<()> {
        let node = Node::new(1, reference_chain(), config(1, None));
        let err = node.mine_block(vec![10]).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<LedgerError>(),
            Some(&LedgerError::IndexOutOfRange { index: 10, len: 10 })
        );
        Ok(())
    }
}
