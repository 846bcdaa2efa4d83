//! Domain Events
//!
//! The fixed set of events the processor emits for every committed state
//! transition. Events are immutable facts; they are never emitted for a
//! failed operation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Identity, MerchantId};

/// Processor events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProcessorEvent {
    /// Owner registered a merchant
    MerchantRegistered {
        merchant: String,
        merchant_id: MerchantId,
        custodial_wallet: Identity,
    },

    /// Funds moved between a customer and a merchant balance
    PaymentProcessed {
        merchant: Identity,
        customer: Identity,
        amount: Decimal,
    },

    /// Funds left custody from a merchant balance
    FundsWithdrawn {
        merchant: Identity,
        amount: Decimal,
        recipient: Identity,
    },

    /// Idle reserves were deposited at the lending venue
    FundsLentToAave { amount: Decimal },

    /// Lent principal was pulled back from the lending venue
    FundsRetrievedFromAave { amount: Decimal },

    /// Unsolicited value arrived; no merchant was credited
    FundsReceived { amount: Decimal, sender: Identity },

    /// Owner swept all on-hand custody
    EmergencyWithdrawalActivated { amount: Decimal },
}

impl ProcessorEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            ProcessorEvent::MerchantRegistered { .. } => "MerchantRegistered",
            ProcessorEvent::PaymentProcessed { .. } => "PaymentProcessed",
            ProcessorEvent::FundsWithdrawn { .. } => "FundsWithdrawn",
            ProcessorEvent::FundsLentToAave { .. } => "FundsLentToAave",
            ProcessorEvent::FundsRetrievedFromAave { .. } => "FundsRetrievedFromAave",
            ProcessorEvent::FundsReceived { .. } => "FundsReceived",
            ProcessorEvent::EmergencyWithdrawalActivated { .. } => "EmergencyWithdrawalActivated",
        }
    }

    /// Amount carried by the event, if any
    pub fn amount(&self) -> Option<Decimal> {
        match self {
            ProcessorEvent::MerchantRegistered { .. } => None,
            ProcessorEvent::PaymentProcessed { amount, .. }
            | ProcessorEvent::FundsWithdrawn { amount, .. }
            | ProcessorEvent::FundsLentToAave { amount }
            | ProcessorEvent::FundsRetrievedFromAave { amount }
            | ProcessorEvent::FundsReceived { amount, .. }
            | ProcessorEvent::EmergencyWithdrawalActivated { amount } => Some(*amount),
        }
    }
}

/// Envelope delivered to the event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Position in the processor's event stream, starting at 1
    pub sequence: u64,
    pub correlation_id: Option<Uuid>,
    /// Identity that invoked the operation that emitted the event
    pub caller: Identity,
    pub event: ProcessorEvent,
    pub recorded_at: DateTime<Utc>,
}
