use serde::{Deserialize, Serialize};

use std::fmt;

use super::block::{push_amount, push_json_string};
use super::crypto::Address;

/// Ledger amount
pub type Amount = f64;

/// Reserved sender of mining reward transactions
pub const MINING_SENDER: &str = "THE BLOCKCHAIN";

/// Represents a transfer between two addresses
///
/// Transactions are plain values: nothing is signed and nothing is validated
/// on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender's address
    pub sender: Address,

    /// Recipient's address
    pub recipient: Address,

    /// Amount being transferred
    pub amount: Amount,
}

impl Transaction {
    /// Creates a new transaction
    ///
    /// # Arguments
    ///
    /// * `sender` - The address of the sender
    /// * `recipient` - The address of the recipient
    /// * `amount` - The amount to transfer
    pub fn new(sender: impl Into<Address>, recipient: impl Into<Address>, amount: Amount) -> Self {
        Transaction {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    /// Creates a mining reward transaction crediting `recipient`
    pub fn new_reward(recipient: impl Into<Address>, amount: Amount) -> Self {
        Transaction::new(MINING_SENDER, recipient, amount)
    }

    /// Checks if the transaction mints a mining reward
    pub fn is_reward(&self) -> bool {
        self.sender.as_str() == MINING_SENDER
    }

    /// Appends the canonical encoding: sender, recipient, amount, in that order
    pub(crate) fn encode_canonical(&self, out: &mut String) {
        out.push_str("{\"sender\":");
        push_json_string(out, self.sender.as_str());
        out.push_str(",\"recipient\":");
        push_json_string(out, self.recipient.as_str());
        out.push_str(",\"amount\":");
        push_amount(out, self.amount);
        out.push('}');
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "-".repeat(40))?;
        writeln!(f, " sender_blockchain_address    {}", self.sender)?;
        writeln!(f, " recipient_blockchain_address {}", self.recipient)?;
        writeln!(f, " value                        {:.1}", self.amount)
    }
}
