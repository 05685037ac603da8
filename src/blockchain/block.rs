use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use std::fmt::{self, Write};

use super::transaction::{Amount, Transaction};

/// SHA-256 digest identifying a block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockHash(#[serde(with = "hex::serde")] pub [u8; 32]);

impl BlockHash {
    /// The all-zero digest
    pub const fn zero() -> Self {
        BlockHash([0u8; 32])
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hexadecimal rendering (64 characters)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Checks that the hex rendering starts with `difficulty` `'0'` characters
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        self.to_hex().starts_with(&"0".repeat(difficulty))
    }
}

impl From<[u8; 32]> for BlockHash {
    fn from(bytes: [u8; 32]) -> Self {
        BlockHash(bytes)
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Represents a block in the blockchain
///
/// A block is sealed once, at mining time. Its hash is never stored: it is
/// recomputed from the canonical encoding of the four fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Creation time in nanoseconds since the Unix epoch
    timestamp: i64,

    /// Proof of work
    nonce: u64,

    /// Hash of the previous block
    previous_hash: BlockHash,

    /// Transactions sealed into this block, in pool order
    transactions: Vec<Transaction>,
}

impl Block {
    /// Creates a new block stamped with the current time
    ///
    /// # Arguments
    ///
    /// * `nonce` - The proof of work
    /// * `previous_hash` - The hash of the previous block
    /// * `transactions` - The transactions to seal
    pub fn new(nonce: u64, previous_hash: BlockHash, transactions: Vec<Transaction>) -> Self {
        // outside the i64 nanosecond range (years 1677..2262) the block is stamped 0
        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        Block::from_parts(timestamp, nonce, previous_hash, transactions)
    }

    /// Creates a block from explicit field values
    pub fn from_parts(
        timestamp: i64,
        nonce: u64,
        previous_hash: BlockHash,
        transactions: Vec<Transaction>,
    ) -> Self {
        Block {
            timestamp,
            nonce,
            previous_hash,
            transactions,
        }
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn previous_hash(&self) -> &BlockHash {
        &self.previous_hash
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Canonical encoding the block hash is computed over
    ///
    /// Compact JSON text with the fields in a fixed order: timestamp, nonce,
    /// previous_hash (hex), transactions. Renaming or reordering a field is a
    /// breaking format change.
    pub fn canonical_encoding(&self) -> String {
        encode_fields(
            self.timestamp,
            self.nonce,
            &self.previous_hash,
            &self.transactions,
        )
    }

    /// Calculates the SHA-256 hash of the block
    pub fn hash(&self) -> BlockHash {
        hash_fields(
            self.timestamp,
            self.nonce,
            &self.previous_hash,
            &self.transactions,
        )
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "timestamp        {}", self.timestamp)?;
        writeln!(f, "nonce            {}", self.nonce)?;
        writeln!(f, "previous_hash    {}", self.previous_hash)?;
        for transaction in &self.transactions {
            write!(f, "{}", transaction)?;
        }
        Ok(())
    }
}

/// Encodes block fields without materialising a `Block`
pub(crate) fn encode_fields(
    timestamp: i64,
    nonce: u64,
    previous_hash: &BlockHash,
    transactions: &[Transaction],
) -> String {
    let encoded_transactions = encode_transactions(transactions);
    let mut out = encode_header(timestamp, nonce, previous_hash);
    out.push_str(&encoded_transactions);
    out.push('}');
    out
}

/// Hashes block fields exactly as `Block::hash` would
pub(crate) fn hash_fields(
    timestamp: i64,
    nonce: u64,
    previous_hash: &BlockHash,
    transactions: &[Transaction],
) -> BlockHash {
    hash_encoded(timestamp, nonce, previous_hash, &encode_transactions(transactions))
}

/// Hashes a block whose transaction list was encoded up front
///
/// Lets the nonce search encode the snapshot once instead of per attempt.
pub(crate) fn hash_encoded(
    timestamp: i64,
    nonce: u64,
    previous_hash: &BlockHash,
    encoded_transactions: &str,
) -> BlockHash {
    let mut hasher = Sha256::new();
    hasher.update(encode_header(timestamp, nonce, previous_hash).as_bytes());
    hasher.update(encoded_transactions.as_bytes());
    hasher.update(b"}");
    BlockHash(hasher.finalize().into())
}

/// Everything before the transaction list
fn encode_header(timestamp: i64, nonce: u64, previous_hash: &BlockHash) -> String {
    format!(
        "{{\"timestamp\":{},\"nonce\":{},\"previous_hash\":\"{}\",\"transactions\":",
        timestamp, nonce, previous_hash
    )
}

/// The transaction list as a JSON array
pub(crate) fn encode_transactions(transactions: &[Transaction]) -> String {
    let mut out = String::with_capacity(2 + transactions.len() * 96);
    out.push('[');
    for (i, transaction) in transactions.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        transaction.encode_canonical(&mut out);
    }
    out.push(']');
    out
}

/// Appends `value` as a quoted JSON string
pub(crate) fn push_json_string(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Appends an amount using the shortest round-trip rendering (`5` -> `5.0`)
///
/// `-0.0` is written as `0.0` so amounts equal under `==` encode identically.
pub(crate) fn push_amount(out: &mut String, amount: Amount) {
    let amount = if amount == 0.0 { 0.0 } else { amount };
    let _ = write!(out, "{:?}", amount);
}
