//! Lending Venue
//!
//! Capability interface to the external yield venue. Every call either
//! completes fully or fails; partial fills are not modelled.

mod accruing;
mod scripted;

use rust_decimal::Decimal;

use crate::domain::{Amount, DomainError, Identity};

pub use accruing::AccruingVenue;
pub use scripted::{ScriptedVenue, VenueCall};

/// Errors reported by a lending venue
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VenueError {
    #[error("Venue rejected the call: {0}")]
    Rejected(String),

    #[error("Venue position too small: requested {requested}, available {available}")]
    InsufficientPosition { requested: Decimal, available: Decimal },

    #[error("Caller {0} is not trusted by the venue")]
    UntrustedCaller(Identity),
}

impl From<VenueError> for DomainError {
    fn from(err: VenueError) -> Self {
        DomainError::ExternalTransferFailed(err.to_string())
    }
}

/// External lending venue
pub trait LendingVenue: Send {
    /// Take custody of `amount` and deposit it at the venue
    fn deposit(&mut self, amount: &Amount) -> Result<(), VenueError>;

    /// Return `amount` of the position to `recipient`.
    ///
    /// Only the processor's trusted identity may call this. Returns the
    /// amount actually delivered.
    fn withdraw(
        &mut self,
        caller: Identity,
        amount: &Amount,
        recipient: Identity,
    ) -> Result<Decimal, VenueError>;

    /// Current value of the position including accrued yield
    fn query_yield_index(&self) -> Result<Decimal, VenueError>;
}
