use thiserror::Error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::block::{encode_transactions, hash_encoded, hash_fields, BlockHash};
use super::transaction::Transaction;

/// Default mining difficulty (number of leading zero hex digits)
pub const MINING_DIFFICULTY: usize = 3;

/// Errors that can end a proof-of-work search without a nonce
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofOfWorkError {
    #[error("Proof-of-work search cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("Proof-of-work search exhausted after {attempts} attempts")]
    Exhausted { attempts: u64 },
}

/// Shared flag used to stop a running search
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every search observing this flag to stop
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Checks whether `nonce` solves the puzzle for the given block contents
///
/// The candidate is hashed with a zero timestamp, so the sealed block's
/// creation time never influences the puzzle.
pub fn valid_proof(
    nonce: u64,
    previous_hash: &BlockHash,
    transactions: &[Transaction],
    difficulty: usize,
) -> bool {
    hash_fields(0, nonce, previous_hash, transactions).meets_difficulty(difficulty)
}

/// Brute-force nonce search over a fixed pool snapshot and previous hash
///
/// The snapshot is encoded once at construction.
#[derive(Debug)]
pub struct ProofOfWork {
    previous_hash: BlockHash,
    encoded_transactions: String,
    difficulty: usize,
    max_attempts: Option<u64>,
}

impl ProofOfWork {
    pub fn new(previous_hash: BlockHash, transactions: &[Transaction], difficulty: usize) -> Self {
        ProofOfWork {
            previous_hash,
            encoded_transactions: encode_transactions(transactions),
            difficulty,
            max_attempts: None,
        }
    }

    /// Same predicate as `valid_proof`, over the cached snapshot encoding
    fn accepts(&self, nonce: u64) -> bool {
        hash_encoded(0, nonce, &self.previous_hash, &self.encoded_transactions)
            .meets_difficulty(self.difficulty)
    }

    /// Caps the number of nonces tried; `None` searches without bound
    pub fn with_max_attempts(mut self, max_attempts: Option<u64>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Runs the search from nonce 0 upwards
    ///
    /// # Returns
    ///
    /// The first nonce satisfying `valid_proof`, or why the search stopped
    pub fn run(&self, cancel: Option<&CancelFlag>) -> Result<u64, ProofOfWorkError> {
        let mut nonce: u64 = 0;

        loop {
            if self.max_attempts.is_some_and(|max| nonce >= max) {
                return Err(ProofOfWorkError::Exhausted { attempts: nonce });
            }

            if cancel.is_some_and(CancelFlag::is_cancelled) {
                return Err(ProofOfWorkError::Cancelled { attempts: nonce });
            }

            if self.accepts(nonce) {
                return Ok(nonce);
            }

            nonce = nonce
                .checked_add(1)
                .ok_or(ProofOfWorkError::Exhausted { attempts: u64::MAX })?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Block;

    fn snapshot() -> Vec<Transaction> {
        vec![
            Transaction::new("X", "Y", 5.0),
            Transaction::new_reward("A", 1.0),
        ]
    }

    #[test]
    fn test_search_finds_first_valid_nonce() {
        let transactions = snapshot();
        let previous_hash = Block::default().hash();

        let nonce = ProofOfWork::new(previous_hash, &transactions, 2).run(None).unwrap();

        assert!(valid_proof(nonce, &previous_hash, &transactions, 2));
        assert!((0..nonce).all(|n| !valid_proof(n, &previous_hash, &transactions, 2)));
    }

    #[test]
    fn test_valid_proof_ignores_sealed_timestamp() {
        let transactions = snapshot();
        let previous_hash = BlockHash::zero();
        let nonce = ProofOfWork::new(previous_hash, &transactions, 2).run(None).unwrap();

        let candidate = Block::from_parts(0, nonce, previous_hash, transactions.clone());
        assert!(candidate.hash().meets_difficulty(2));
        assert!(valid_proof(nonce, &previous_hash, &transactions, 2));
    }

    #[test]
    fn test_difficulty_zero_accepts_first_nonce() {
        let transactions = snapshot();
        let result = ProofOfWork::new(BlockHash::zero(), &transactions, 0).run(None);
        assert_eq!(result, Ok(0));
    }

    #[test]
    fn test_exhausted_search() {
        let transactions = snapshot();
        // no SHA-256 digest has 64 leading zero hex digits in practice
        let search = ProofOfWork::new(BlockHash::zero(), &transactions, 64).with_max_attempts(Some(50));

        assert_eq!(search.run(None), Err(ProofOfWorkError::Exhausted { attempts: 50 }));
    }

    #[test]
    fn test_zero_attempt_cap() {
        let transactions = snapshot();
        let search = ProofOfWork::new(BlockHash::zero(), &transactions, 0).with_max_attempts(Some(0));

        assert_eq!(search.run(None), Err(ProofOfWorkError::Exhausted { attempts: 0 }));
    }

    #[test]
    fn test_cancelled_search() {
        let transactions = snapshot();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let result = ProofOfWork::new(BlockHash::zero(), &transactions, 64).run(Some(&cancel));
        assert_eq!(result, Err(ProofOfWorkError::Cancelled { attempts: 0 }));
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let observer = flag.clone();
        assert!(!observer.is_cancelled());

        flag.cancel();
        assert!(observer.is_cancelled());
    }
}
