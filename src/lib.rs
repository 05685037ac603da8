//! An educational single-process ledger
//!
//! A proof-of-work chain of blocks with a pending transaction pool and
//! replayed balances, plus wallets whose addresses are derived from P-256
//! public keys with the SHA-256 / RIPEMD-160 / Base58Check pipeline.

pub mod blockchain;
pub mod config;
pub mod telemetry;

pub use blockchain::{Address, Block, Blockchain, BlockchainError, Transaction, Wallet};
pub use config::ChainConfig;
pub use telemetry::Telemetry;
