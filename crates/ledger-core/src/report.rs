//! Read-only views of blocks and chains for printing.

use serde::Serialize;
use std::fmt;

use crate::{Block, Chain, Transaction};

const RULE_WIDTH: usize = 25;
const TX_RULE_WIDTH: usize = 40;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactionView<'a> {
    pub id: &'a str,
    pub sender: &'a str,
    pub recipient: &'a str,
    pub value: f32,
}

impl<'a> From<&'a Transaction> for TransactionView<'a> {
    fn from(tx: &'a Transaction) -> Self {
        Self {
            id: tx.id(),
            sender: tx.sender(),
            recipient: tx.recipient(),
            value: tx.value(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockView<'a> {
    pub nonce: u64,
    pub previous_hash: &'a str,
    pub hash: &'a str,
    pub transactions: Vec<TransactionView<'a>>,
}

impl<'a> From<&'a Block> for BlockView<'a> {
    fn from(block: &'a Block) -> Self {
        Self {
            nonce: block.nonce(),
            previous_hash: block.previous_hash(),
            hash: block.hash(),
            transactions: block.transactions().iter().map(TransactionView::from).collect(),
        }
    }
}

impl fmt::Display for BlockView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(RULE_WIDTH);
        writeln!(f, "{rule}  Block  {rule}")?;
        writeln!(f, "Nonce: {}", self.nonce)?;
        writeln!(f, "PreviousHash: {}", self.previous_hash)?;
        writeln!(f, "Hash: {}", self.hash)?;
        writeln!(f, "Transactions:")?;
        for tx in &self.transactions {
            writeln!(f, "  TX ID: {}", tx.id)?;
            writeln!(f, "  Sender: {}", tx.sender)?;
            writeln!(f, "  Recipient: {}", tx.recipient)?;
            writeln!(f, "  Value: {:.2}", tx.value)?;
            writeln!(f, "{}", "-".repeat(TX_RULE_WIDTH))?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChainView<'a> {
    pub blocks: Vec<BlockView<'a>>,
    pub pending: usize,
}

impl<'a> From<&'a Chain> for ChainView<'a> {
    fn from(chain: &'a Chain) -> Self {
        Self {
            blocks: chain.blocks().iter().map(BlockView::from).collect(),
            pending: chain.pool().len(),
        }
    }
}

impl fmt::Display for ChainView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let banner = "*".repeat(82);
        writeln!(f, "{banner}")?;
        writeln!(f, "{:^82}", "Blockchain")?;
        writeln!(f, "{banner}")?;
        for block in &self.blocks {
            write!(f, "{block}")?;
        }
        Ok(())
    }
}

/// Pretty JSON of a block: nonce, previous hash, hash and transactions.
pub fn block_json(block: &Block) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&BlockView::from(block))
}

pub fn chain_json(chain: &Chain) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&ChainView::from(chain))
}

pub fn render_block(block: &Block) -> String {
    BlockView::from(block).to_string()
}

pub fn render_chain(chain: &Chain) -> String {
    ChainView::from(chain).to_string()
}
