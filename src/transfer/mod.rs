//! Transfer Gateway
//!
//! Outbound value transfers leaving custody. A recipient may run code while
//! it receives funds; the calls it makes back into the processor are
//! returned in the receipt and executed before the outer operation returns.

mod recording;

use serde::{Deserialize, Serialize};

use crate::commands::Command;
use crate::domain::{Amount, Identity};

pub use recording::RecordingGateway;

/// How much work the recipient may do while receiving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferBudget {
    /// Enough to acknowledge receipt, nothing more
    Stipend,
    Unbounded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferPurpose {
    Refund,
    Withdrawal,
    EmergencySweep,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundTransfer {
    pub recipient: Identity,
    pub amount: Amount,
    pub budget: TransferBudget,
    pub purpose: TransferPurpose,
}

/// Result of a delivered transfer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferReceipt {
    /// Calls the recipient made back into the processor while receiving
    pub callbacks: Vec<Command>,
}

impl TransferReceipt {
    pub fn delivered() -> Self {
        Self::default()
    }

    pub fn with_callbacks(callbacks: Vec<Command>) -> Self {
        Self { callbacks }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransferError {
    #[error("Recipient rejected the transfer: {0}")]
    Rejected(String),

    #[error("Recipient exceeded the transfer stipend")]
    StipendExceeded,
}

/// Outbound value transfer capability
pub trait TransferGateway: Send {
    fn send(&mut self, transfer: &OutboundTransfer) -> Result<TransferReceipt, TransferError>;
}
