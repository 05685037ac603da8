use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use std::fmt;
use std::sync::Arc;

use super::block::{Block, BlockHash};
use super::crypto::Address;
use super::pow::{valid_proof, CancelFlag, ProofOfWork, ProofOfWorkError};
use super::transaction::{Amount, Transaction};
use crate::config::{ChainConfig, ConfigError};
use crate::telemetry::Telemetry;

/// Default reward minted for every mined block
pub const MINING_REWARD: Amount = 1.0;

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Proof of work failed: {0}")]
    ProofOfWork(#[from] ProofOfWorkError),

    #[error("Mining already in progress")]
    MiningInProgress,

    #[error("Broken chain link at block {index}: expected previous hash {expected}, found {found}")]
    BrokenLink {
        index: usize,
        expected: BlockHash,
        found: BlockHash,
    },

    #[error("Invalid proof of work at block {index}")]
    InvalidProof { index: usize },

    #[error("Mining worker failed: {0}")]
    Worker(String),
}

/// Represents the blockchain
///
/// Clones share the same chain and pool, so a clone can be handed to a
/// mining worker while other clones keep accepting transactions.
#[derive(Debug, Clone)]
pub struct Blockchain {
    /// The chain of blocks, never empty
    chain: Arc<RwLock<Vec<Block>>>,

    /// Pending transactions to be included in the next block
    pending_transactions: Arc<Mutex<Vec<Transaction>>>,

    /// Held for the whole of a mining round
    mining: Arc<Mutex<()>>,

    /// Address receiving mining rewards
    address: Address,

    config: ChainConfig,

    telemetry: Telemetry,
}

impl Blockchain {
    /// Creates a new blockchain with a genesis block
    ///
    /// # Arguments
    ///
    /// * `address` - The operator address receiving mining rewards
    pub fn new(address: impl Into<Address>) -> Self {
        Self::with_telemetry(address, Telemetry::default().child("blockchain"))
    }

    /// Like `new`, logging through `telemetry`
    pub fn with_telemetry(address: impl Into<Address>, telemetry: Telemetry) -> Self {
        Self::build(address.into(), ChainConfig::default(), telemetry)
    }

    /// Creates a new blockchain with explicit tunables
    ///
    /// # Returns
    ///
    /// The blockchain, or the reason `config` is unusable
    pub fn with_config(
        address: impl Into<Address>,
        config: ChainConfig,
        telemetry: Telemetry,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(address.into(), config, telemetry))
    }

    fn build(address: Address, config: ChainConfig, telemetry: Telemetry) -> Self {
        // genesis links to the hash of an empty sentinel block
        let genesis_block = Block::new(0, Block::default().hash(), Vec::new());
        info!(
            target: telemetry.target(),
            "Created blockchain for {} with difficulty {}", address, config.difficulty
        );

        Blockchain {
            chain: Arc::new(RwLock::new(vec![genesis_block])),
            pending_transactions: Arc::new(Mutex::new(Vec::new())),
            mining: Arc::new(Mutex::new(())),
            address,
            config,
            telemetry,
        }
    }

    /// Address receiving mining rewards
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Number of blocks, genesis included
    pub fn len(&self) -> usize {
        self.chain.read().len()
    }

    /// Always false: the genesis block exists from construction
    pub fn is_empty(&self) -> bool {
        self.chain.read().is_empty()
    }

    /// Gets the last block in the chain
    pub fn last_block(&self) -> Block {
        let chain = self.chain.read();
        chain[chain.len() - 1].clone()
    }

    /// Gets a copy of the entire chain
    pub fn chain(&self) -> Vec<Block> {
        self.chain.read().clone()
    }

    pub fn pending_len(&self) -> usize {
        self.pending_transactions.lock().len()
    }

    /// Adds a new transaction to the pending pool
    ///
    /// Nothing is validated: transactions are unauthenticated and balances
    /// may go negative.
    pub fn add_transaction(
        &self,
        sender: impl Into<Address>,
        recipient: impl Into<Address>,
        amount: Amount,
    ) {
        let transaction = Transaction::new(sender, recipient, amount);
        debug!(
            target: self.telemetry.target(),
            "Queued transaction {} -> {} ({})", transaction.sender, transaction.recipient, amount
        );
        self.pending_transactions.lock().push(transaction);
    }

    /// Returns an independent copy of the pending pool
    pub fn copy_pending_pool(&self) -> Vec<Transaction> {
        self.pending_transactions.lock().clone()
    }

    /// Searches a nonce for the current pool snapshot on top of the last block
    ///
    /// Nothing is sealed; `mine` is the operation that appends a block.
    pub fn proof_of_work(&self) -> Result<u64, ProofOfWorkError> {
        let transactions = self.copy_pending_pool();
        let previous_hash = self.last_block().hash();
        self.search(previous_hash, &transactions, None)
    }

    fn search(
        &self,
        previous_hash: BlockHash,
        transactions: &[Transaction],
        cancel: Option<&CancelFlag>,
    ) -> Result<u64, ProofOfWorkError> {
        ProofOfWork::new(previous_hash, transactions, self.config.difficulty)
            .with_max_attempts(self.config.max_nonce)
            .run(cancel)
    }

    /// Mines a new block with the pending transactions
    ///
    /// Waits for any other mining round on this chain to finish first. With
    /// the default configuration the search is unbounded and this never
    /// fails.
    ///
    /// # Returns
    ///
    /// Result with the newly mined block
    pub fn mine(&self) -> Result<Block, BlockchainError> {
        let _round = self.mining.lock();
        self.mine_round(None)
    }

    /// Like `mine`, but rejects instead of waiting when another round runs
    pub fn try_mine(&self) -> Result<Block, BlockchainError> {
        let _round = self
            .mining
            .try_lock()
            .ok_or(BlockchainError::MiningInProgress)?;
        self.mine_round(None)
    }

    /// Like `mine`, stopping the search once `cancel` is raised
    pub fn mine_with_cancel(&self, cancel: &CancelFlag) -> Result<Block, BlockchainError> {
        let _round = self.mining.lock();
        self.mine_round(Some(cancel))
    }

    /// Mines on a blocking worker thread so callers keep submitting
    /// transactions while the search runs
    pub async fn mine_in_background(&self, cancel: CancelFlag) -> Result<Block, BlockchainError> {
        let chain = self.clone();
        tokio::task::spawn_blocking(move || chain.mine_with_cancel(&cancel))
            .await
            .map_err(|e| BlockchainError::Worker(e.to_string()))?
    }

    /// One mining round; the caller holds `self.mining`
    fn mine_round(&self, cancel: Option<&CancelFlag>) -> Result<Block, BlockchainError> {
        let reward = Transaction::new_reward(self.address.clone(), self.config.mining_reward);

        let (transactions, taken) = {
            let mut pending = self.pending_transactions.lock();
            pending.push(reward);
            (pending.clone(), pending.len())
        };
        let previous_hash = self.last_block().hash();

        let nonce = match self.search(previous_hash, &transactions, cancel) {
            Ok(nonce) => nonce,
            Err(err) => {
                // only miners remove entries, so the reward is still at taken - 1
                self.pending_transactions.lock().remove(taken - 1);
                warn!(target: self.telemetry.target(), "action=mining, status=failed, reason={}", err);
                return Err(err.into());
            }
        };

        let block = Block::new(nonce, previous_hash, transactions);
        let height = {
            let mut chain = self.chain.write();
            let mut pending = self.pending_transactions.lock();
            chain.push(block.clone());
            // entries queued during the search stay for the next round
            pending.drain(..taken);
            chain.len() - 1
        };

        info!(
            target: self.telemetry.target(),
            "action=mining, status=success, height={}, nonce={}, transactions={}",
            height,
            nonce,
            taken
        );

        Ok(block)
    }

    /// Calculates the balance of an address by replaying the whole chain
    ///
    /// Unknown addresses have a balance of zero.
    pub fn calculate_total_amount(&self, address: impl AsRef<str>) -> Amount {
        let address = address.as_ref();
        let chain = self.chain.read();

        let mut total_amount = 0.0;
        for block in chain.iter() {
            for transaction in block.transactions() {
                if transaction.recipient.as_str() == address {
                    total_amount += transaction.amount;
                }
                if transaction.sender.as_str() == address {
                    total_amount -= transaction.amount;
                }
            }
        }

        total_amount
    }

    /// Checks linkage and proof of work of every block after genesis
    ///
    /// # Returns
    ///
    /// The first integrity fault found. Faults are reported, never repaired.
    pub fn verify(&self) -> Result<(), BlockchainError> {
        let result = verify_blocks(&self.chain.read(), self.config.difficulty);
        if let Err(err) = &result {
            error!(target: self.telemetry.target(), "Chain verification failed: {}", err);
        }
        result
    }

    /// Validates the blockchain
    ///
    /// # Returns
    ///
    /// true if the blockchain is valid, false otherwise
    pub fn is_valid(&self) -> bool {
        self.verify().is_ok()
    }
}

/// Verifies a sequence of blocks mined at `difficulty`
///
/// Block 0 is treated as genesis and exempt from the proof check.
pub fn verify_blocks(blocks: &[Block], difficulty: usize) -> Result<(), BlockchainError> {
    for (offset, pair) in blocks.windows(2).enumerate() {
        let index = offset + 1;
        let (previous, current) = (&pair[0], &pair[1]);

        let expected = previous.hash();
        if current.previous_hash() != &expected {
            return Err(BlockchainError::BrokenLink {
                index,
                expected,
                found: *current.previous_hash(),
            });
        }

        if !valid_proof(
            current.nonce(),
            current.previous_hash(),
            current.transactions(),
            difficulty,
        ) {
            return Err(BlockchainError::InvalidProof { index });
        }
    }

    Ok(())
}

impl fmt::Display for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chain = self.chain.read();
        for (i, block) in chain.iter().enumerate() {
            writeln!(f, "{} Chain {} {}", "=".repeat(25), i, "=".repeat(25))?;
            write!(f, "{}", block)?;
        }
        writeln!(f, "{}", "*".repeat(25))
    }
}
