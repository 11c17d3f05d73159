use serde::Serialize;
use sha2::{Digest, Sha256};

pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod mine;
pub mod pool;
pub mod report;
pub mod select;

pub use chain::{Chain, SharedChain, Verification};
pub use config::MinerConfig;
pub use error::{LedgerError, Result};
pub use mine::{CancelFlag, Mined, Miner};
pub use pool::TransactionPool;

pub type Hash = [u8; 32];

/// Raw SHA-256 of `bytes`.
pub fn hash_bytes(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

/// Lowercase hex SHA-256 of `bytes`. Transaction ids and block hashes are all
/// produced here.
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(hash_bytes(bytes))
}

/// Shortest fixed-point text that reads back as the same `f32`.
///
/// Non-finite values print as `inf`, `-inf` and `NaN`; a formatter that
/// writes `+Inf` gives different ids for them.
///
/// Transaction ids and block hashes both embed values through this function;
/// using any other formatting in one place breaks recomputation in the other.
pub fn format_value(value: f32) -> String {
    // `Display` for floats never switches to exponent notation.
    format!("{value}")
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Transaction {
    id: String,
    sender: String,
    recipient: String,
    value: f32,
}

impl Transaction {
    /// Builds a transfer and fixes its id as the digest of
    /// `recipient ‖ sender ‖ value`.
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, value: f32) -> Self {
        let sender = sender.into();
        let recipient = recipient.into();
        let id = digest(Self::id_preimage(&sender, &recipient, value).as_bytes());
        Self {
            id,
            sender,
            recipient,
            value,
        }
    }

    fn id_preimage(sender: &str, recipient: &str, value: f32) -> String {
        format!("{recipient}{sender}{}", format_value(value))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    fn write_block_fields(&self, out: &mut String) {
        out.push_str(&self.id);
        out.push_str(&self.sender);
        out.push_str(&self.recipient);
        out.push_str(&format_value(self.value));
    }
}

/// A block is a candidate until proof-of-work assigns its hash; after that it
/// is sealed and only read.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Block {
    nonce: u64,
    previous_hash: String,
    transactions: Vec<Transaction>,
    hash: String,
}

impl Block {
    /// Unsealed block with nonce 0. An empty `previous_hash` marks genesis.
    pub fn candidate(previous_hash: impl Into<String>, transactions: Vec<Transaction>) -> Self {
        Self {
            nonce: 0,
            previous_hash: previous_hash.into(),
            transactions,
            hash: String::new(),
        }
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Hash assigned at sealing time; empty while the block is a candidate.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn is_sealed(&self) -> bool {
        !self.hash.is_empty()
    }

    /// Everything after the nonce in the hashed text: each transaction's
    /// `id ‖ sender ‖ recipient ‖ value`, then the previous hash.
    pub(crate) fn body(&self) -> String {
        let mut out = String::new();
        for tx in &self.transactions {
            tx.write_block_fields(&mut out);
        }
        out.push_str(&self.previous_hash);
        out
    }

    /// `nonce ‖ body`, the exact text the block hash is taken over.
    pub fn preimage(&self) -> String {
        format!("{}{}", self.nonce, self.body())
    }

    /// Recomputes the hash from current content, ignoring the stored one.
    pub fn compute_hash(&self) -> String {
        hex::encode(pow::hash_attempt(self.nonce, self.body().as_bytes()))
    }

    /// Re-derives the hash and checks it against `difficulty` without
    /// touching the block.
    pub fn verify_nonce(&self, difficulty: u32) -> bool {
        let valid = pow::meets_difficulty(&self.compute_hash(), difficulty);
        if valid {
            tracing::debug!(nonce = self.nonce, difficulty, "nonce is valid for the block");
        } else {
            tracing::debug!(nonce = self.nonce, difficulty, "nonce is not valid for the block");
        }
        valid
    }

    pub(crate) fn seal(&mut self, nonce: u64) {
        self.nonce = nonce;
        self.hash = self.compute_hash();
    }

    /// Overwrites the first transaction of a sealed block and rehashes it.
    /// The new hash is not mined and the next block's link no longer matches.
    #[cfg(any(test, feature = "tamper"))]
    pub fn replace_first_transaction(&mut self, tx: Transaction) -> Result<()> {
        let slot = self.transactions.first_mut().ok_or(LedgerError::EmptyBlock)?;
        *slot = tx;
        self.hash = self.compute_hash();
        Ok(())
    }
}

pub mod pow {
    use super::{Block, Hash};
    use sha2::{Digest, Sha256};

    /// Mine the block by incrementing the nonce from 0 until its hex hash
    /// starts with `difficulty` zeros. Runs unbounded on the calling thread;
    /// see [`crate::Miner`] for a bounded, cancellable search.
    pub fn mine_block(mut block: Block, difficulty: u32) -> Block {
        let body = block.body();
        let mut nonce = 0u64;
        loop {
            let h = hash_attempt(nonce, body.as_bytes());
            if count_leading_zero_nibbles(&h) >= difficulty {
                block.seal(nonce);
                return block;
            }
            nonce = nonce.wrapping_add(1);
        }
    }

    pub(crate) fn hash_attempt(nonce: u64, body: &[u8]) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(nonce.to_string().as_bytes());
        hasher.update(body);
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest[..]);
        out
    }

    /// Leading `0` characters in the hex form of `hash`.
    pub fn count_leading_zero_nibbles(hash: &Hash) -> u32 {
        let mut total = 0u32;
        for b in hash {
            if *b == 0 {
                total += 2;
            } else {
                if *b < 0x10 {
                    total += 1;
                }
                break;
            }
        }
        total
    }

    pub fn meets_difficulty(hash_hex: &str, difficulty: u32) -> bool {
        let wanted = difficulty as usize;
        hash_hex.len() >= wanted && hash_hex.as_bytes()[..wanted].iter().all(|c| *c == b'0')
    }
}
