//! Aggregate module
//!
//! Aggregate roots for the ledger. Commands are validated against the current
//! state and produce a change; the change is then applied to yield the next
//! state. Validation never mutates.

pub mod merchant;
pub mod reserve;

pub use merchant::{Merchant, MerchantChange};
pub use reserve::{ReserveChange, ReserveState};

/// Aggregate trait that all aggregates must implement
pub trait Aggregate: Sized {
    /// The type of changes this aggregate accepts
    type Change;

    /// Get the aggregate type name (for logging)
    fn aggregate_type() -> &'static str;

    /// Get the current version (number of changes applied)
    fn version(&self) -> u64;

    /// Apply a change to update the aggregate state
    fn apply(self, change: Self::Change) -> Self;
}
