//! Scripted venue
//!
//! Deterministic lending venue double. Clones share state so a test can keep
//! a handle after moving the venue into the processor.

use std::sync::{Arc, Mutex, MutexGuard};

use rust_decimal::Decimal;

use crate::domain::{Amount, Identity};

use super::{LendingVenue, VenueError};

/// A call observed by the scripted venue
#[derive(Debug, Clone, PartialEq)]
pub enum VenueCall {
    Deposit(Decimal),
    Withdraw {
        caller: Identity,
        amount: Decimal,
        recipient: Identity,
    },
    QueryYieldIndex,
}

#[derive(Debug, Default)]
struct ScriptedState {
    position: Decimal,
    fail_next_deposit: Option<String>,
    fail_next_withdraw: Option<String>,
    withhold_next_withdrawal: bool,
    calls: Vec<VenueCall>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedVenue {
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedVenue {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ScriptedState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add yield to the position
    pub fn accrue(&self, interest: Decimal) {
        self.state().position += interest;
    }

    pub fn fail_next_deposit(&self, reason: &str) {
        self.state().fail_next_deposit = Some(reason.to_string());
    }

    pub fn fail_next_withdraw(&self, reason: &str) {
        self.state().fail_next_withdraw = Some(reason.to_string());
    }

    /// Next withdrawal reports success but delivers nothing
    pub fn withhold_next_withdrawal(&self) {
        self.state().withhold_next_withdrawal = true;
    }

    pub fn position(&self) -> Decimal {
        self.state().position
    }

    pub fn calls(&self) -> Vec<VenueCall> {
        self.state().calls.clone()
    }
}

impl LendingVenue for ScriptedVenue {
    fn deposit(&mut self, amount: &Amount) -> Result<(), VenueError> {
        let mut state = self.state();
        state.calls.push(VenueCall::Deposit(amount.value()));

        if let Some(reason) = state.fail_next_deposit.take() {
            return Err(VenueError::Rejected(reason));
        }

        state.position += amount.value();
        Ok(())
    }

    fn withdraw(
        &mut self,
        caller: Identity,
        amount: &Amount,
        recipient: Identity,
    ) -> Result<Decimal, VenueError> {
        let mut state = self.state();
        state.calls.push(VenueCall::Withdraw {
            caller,
            amount: amount.value(),
            recipient,
        });

        if let Some(reason) = state.fail_next_withdraw.take() {
            return Err(VenueError::Rejected(reason));
        }
        if amount.value() > state.position {
            return Err(VenueError::InsufficientPosition {
                requested: amount.value(),
                available: state.position,
            });
        }
        if std::mem::take(&mut state.withhold_next_withdrawal) {
            return Ok(Decimal::ZERO);
        }

        state.position -= amount.value();
        Ok(amount.value())
    }

    fn query_yield_index(&self) -> Result<Decimal, VenueError> {
        let mut state = self.state();
        state.calls.push(VenueCall::QueryYieldIndex);
        Ok(state.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_scripted_failures_are_one_shot() {
        let mut venue = ScriptedVenue::new();
        let handle = venue.clone();
        let amount = Amount::new(dec!(1)).unwrap();

        handle.fail_next_deposit("paused");
        assert_eq!(
            venue.deposit(&amount),
            Err(VenueError::Rejected("paused".to_string()))
        );
        assert!(venue.deposit(&amount).is_ok());
        assert_eq!(handle.position(), dec!(1));
        assert_eq!(handle.calls().len(), 2);
    }

    #[test]
    fn test_withheld_withdrawal_delivers_nothing() {
        let mut venue = ScriptedVenue::new();
        let me = Identity::random();
        let amount = Amount::new(dec!(1)).unwrap();
        venue.deposit(&amount).unwrap();

        venue.withhold_next_withdrawal();
        assert_eq!(venue.withdraw(me, &amount, me).unwrap(), Decimal::ZERO);
        assert_eq!(venue.position(), dec!(1));

        assert_eq!(venue.withdraw(me, &amount, me).unwrap(), dec!(1));
        assert!(venue.position().is_zero());
    }

    #[test]
    fn test_accrue_raises_yield_index() {
        let mut venue = ScriptedVenue::new();
        venue.deposit(&Amount::new(dec!(1.9)).unwrap()).unwrap();
        venue.accrue(dec!(0.05));
        assert_eq!(venue.query_yield_index().unwrap(), dec!(1.95));
    }
}
