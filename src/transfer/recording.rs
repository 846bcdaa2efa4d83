//! Recording gateway
//!
//! Keeps every delivered transfer in memory. Recipients can be scripted to
//! reject transfers or to call back into the processor when paid.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use rust_decimal::Decimal;

use crate::commands::Command;
use crate::domain::Identity;

use super::{OutboundTransfer, TransferBudget, TransferError, TransferGateway, TransferReceipt};

#[derive(Debug, Default)]
struct GatewayState {
    delivered: Vec<OutboundTransfer>,
    fail_next: Option<String>,
    rejecting: HashSet<Identity>,
    callbacks: HashMap<Identity, VecDeque<Vec<Command>>>,
}

/// In-memory gateway. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail the next transfer regardless of recipient
    pub fn fail_next(&self, reason: &str) {
        self.state().fail_next = Some(reason.to_string());
    }

    /// Make `recipient` reject every transfer
    pub fn reject_recipient(&self, recipient: Identity) {
        self.state().rejecting.insert(recipient);
    }

    /// When `recipient` is next paid it calls back with `calls`
    pub fn on_receive(&self, recipient: Identity, calls: Vec<Command>) {
        self.state()
            .callbacks
            .entry(recipient)
            .or_default()
            .push_back(calls);
    }

    pub fn delivered(&self) -> Vec<OutboundTransfer> {
        self.state().delivered.clone()
    }

    pub fn total_delivered_to(&self, recipient: Identity) -> Decimal {
        self.state()
            .delivered
            .iter()
            .filter(|t| t.recipient == recipient)
            .map(|t| t.amount.value())
            .sum()
    }
}

impl TransferGateway for RecordingGateway {
    fn send(&mut self, transfer: &OutboundTransfer) -> Result<TransferReceipt, TransferError> {
        let mut state = self.state();

        if let Some(reason) = state.fail_next.take() {
            return Err(TransferError::Rejected(reason));
        }
        if state.rejecting.contains(&transfer.recipient) {
            return Err(TransferError::Rejected(format!(
                "{} does not accept funds",
                transfer.recipient
            )));
        }

        let callbacks = state
            .callbacks
            .get_mut(&transfer.recipient)
            .and_then(VecDeque::pop_front)
            .unwrap_or_default();

        if transfer.budget == TransferBudget::Stipend && !callbacks.is_empty() {
            return Err(TransferError::StipendExceeded);
        }

        state.delivered.push(transfer.clone());
        Ok(TransferReceipt::with_callbacks(callbacks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Amount;
    use crate::transfer::TransferPurpose;
    use rust_decimal_macros::dec;

    fn transfer(recipient: Identity, budget: TransferBudget) -> OutboundTransfer {
        OutboundTransfer {
            recipient,
            amount: Amount::new(dec!(1)).unwrap(),
            budget,
            purpose: TransferPurpose::Withdrawal,
        }
    }

    #[test]
    fn test_delivered_transfers_are_recorded() {
        let mut gateway = RecordingGateway::new();
        let recipient = Identity::random();

        gateway.send(&transfer(recipient, TransferBudget::Stipend)).unwrap();
        gateway.send(&transfer(recipient, TransferBudget::Unbounded)).unwrap();

        assert_eq!(gateway.delivered().len(), 2);
        assert_eq!(gateway.total_delivered_to(recipient), dec!(2));
    }

    #[test]
    fn test_rejecting_recipient() {
        let mut gateway = RecordingGateway::new();
        let recipient = Identity::random();
        gateway.reject_recipient(recipient);

        let result = gateway.send(&transfer(recipient, TransferBudget::Unbounded));
        assert!(matches!(result, Err(TransferError::Rejected(_))));
        assert!(gateway.delivered().is_empty());
    }

    #[test]
    fn test_callbacks_under_stipend_fail() {
        let mut gateway = RecordingGateway::new();
        let recipient = Identity::random();
        gateway.on_receive(recipient, vec![Command::LendFundsBatch]);

        let result = gateway.send(&transfer(recipient, TransferBudget::Stipend));
        assert_eq!(result, Err(TransferError::StipendExceeded));
        assert!(gateway.delivered().is_empty());
    }

    #[test]
    fn test_callbacks_returned_once() {
        let mut gateway = RecordingGateway::new();
        let recipient = Identity::random();
        gateway.on_receive(recipient, vec![Command::LendFundsBatch]);

        let receipt = gateway.send(&transfer(recipient, TransferBudget::Unbounded)).unwrap();
        assert_eq!(receipt.callbacks, vec![Command::LendFundsBatch]);

        let receipt = gateway.send(&transfer(recipient, TransferBudget::Unbounded)).unwrap();
        assert!(receipt.callbacks.is_empty());
    }
}
