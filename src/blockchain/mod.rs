// Blockchain module
//
// This module contains the ledger implementation including:
// - Transaction structure
// - Block structure and canonical hashing
// - Proof of work search
// - Blockchain structure (pool, mining, balances)
// - Wallets and address derivation

pub mod block;
pub mod chain;
pub mod crypto;
pub mod pow;
pub mod transaction;

// Re-export main components for easier access
pub use block::{Block, BlockHash};
pub use chain::{verify_blocks, Blockchain, BlockchainError, MINING_REWARD};
pub use crypto::{Address, Wallet, WalletError};
pub use pow::{valid_proof, CancelFlag, ProofOfWork, ProofOfWorkError, MINING_DIFFICULTY};
pub use transaction::{Amount, Transaction, MINING_SENDER};
