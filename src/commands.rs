//! Command definitions
//!
//! Commands represent intentions to change (or read) the ledger. They are
//! the operation-call boundary used by the dispatcher, the shared service,
//! reentrant callbacks and replay scripts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::Merchant;
use crate::domain::{Identity, MerchantId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    // Owner
    RegisterMerchant {
        name: String,
        custodial_wallet: Identity,
    },
    GetMerchantById {
        merchant_id: MerchantId,
    },
    SetLendingThreshold {
        value: Decimal,
    },
    SetRetrieveThreshold {
        value: Decimal,
    },
    LendFundsBatch,
    RetrieveLentFundsBatch {
        amount: Decimal,
    },
    CollectAaveInterest,
    EmergencyWithdraw,

    // Merchant
    IssueRefund {
        customer: Identity,
        amount: Decimal,
    },
    WithdrawFunds {
        recipient: Identity,
        amount: Decimal,
    },
    RequestRetrieveFunds {
        amount: Decimal,
    },

    // Anyone
    ProcessPayment {
        merchant: Identity,
        amount: Decimal,
    },
    /// Bare value transfer
    Receive {
        amount: Decimal,
    },
    /// Any call that matches no declared operation
    Fallback {
        selector: String,
        #[serde(default)]
        amount: Decimal,
    },
}

impl Command {
    /// Operation name as used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::RegisterMerchant { .. } => "register_merchant",
            Command::GetMerchantById { .. } => "get_merchant_by_id",
            Command::SetLendingThreshold { .. } => "set_lending_threshold",
            Command::SetRetrieveThreshold { .. } => "set_retrieve_threshold",
            Command::LendFundsBatch => "lend_funds_batch",
            Command::RetrieveLentFundsBatch { .. } => "retrieve_lent_funds_batch",
            Command::CollectAaveInterest => "collect_aave_interest",
            Command::EmergencyWithdraw => "emergency_withdraw",
            Command::IssueRefund { .. } => "issue_refund",
            Command::WithdrawFunds { .. } => "withdraw_funds",
            Command::RequestRetrieveFunds { .. } => "request_retrieve_funds",
            Command::ProcessPayment { .. } => "process_payment",
            Command::Receive { .. } => "receive",
            Command::Fallback { .. } => "fallback",
        }
    }
}

/// Result of a successful command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Merchant { merchant: Merchant },
    Lent { amount: Decimal },
    Retrieved { amount: Decimal },
    Interest { amount: Decimal },
    Swept { amount: Decimal },
}
