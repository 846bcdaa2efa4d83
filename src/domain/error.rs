//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use super::{AmountError, Identity, Role};

/// Ledger errors.
///
/// Every variant aborts the whole operation; no partial state survives.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Caller does not hold the role the operation requires
    #[error("Unauthorized: {caller} is not {required}")]
    Unauthorized { caller: Identity, required: Role },

    /// Custodial identity already owns a registered merchant record
    #[error("Merchant already registered: {0}")]
    AlreadyRegistered(Identity),

    /// Merchant not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid amount or argument (zero, negative, null identity)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Merchant ledger balance cannot cover the debit
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },

    /// Ledger balance suffices but the funds are lent out
    #[error("Liquidity shortfall: required {required}, on hand {on_hand}")]
    LiquidityShortfall { required: Decimal, on_hand: Decimal },

    /// Rate gate is still closed
    #[error("Rate limited: next allowed at {next_allowed_at}")]
    RateLimited { next_allowed_at: DateTime<Utc> },

    /// Amount or reserve is below the configured threshold
    #[error("Threshold not met: required {required}, got {actual}")]
    ThresholdNotMet { required: Decimal, actual: Decimal },

    /// Outbound transfer or lending venue call failed
    #[error("External transfer failed: {0}")]
    ExternalTransferFailed(String),

    /// Venue withdrawal did not increase on-hand custody
    #[error("Retrieval verification failed: on hand {before} before, {after} after")]
    RetrievalVerificationFailed { before: Decimal, after: Decimal },

    #[error("No funds available")]
    NoFundsAvailable,

    #[error("No interest available")]
    NoInterestAvailable,
}

impl DomainError {
    pub fn unauthorized(caller: Identity, required: Role) -> Self {
        Self::Unauthorized { caller, required }
    }

    /// Create an insufficient balance error
    pub fn insufficient_balance(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientBalance { required, available }
    }

    pub fn liquidity_shortfall(required: Decimal, on_hand: Decimal) -> Self {
        Self::LiquidityShortfall { required, on_hand }
    }

    pub fn threshold_not_met(required: Decimal, actual: Decimal) -> Self {
        Self::ThresholdNotMet { required, actual }
    }

    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized { .. }
                | Self::AlreadyRegistered(_)
                | Self::NotFound(_)
                | Self::InvalidAmount(_)
                | Self::InsufficientBalance { .. }
                | Self::ThresholdNotMet { .. }
        )
    }

    /// Check if the same call may succeed later without caller changes
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::LiquidityShortfall { .. }
                | Self::ExternalTransferFailed(_)
        )
    }
}

impl From<AmountError> for DomainError {
    fn from(err: AmountError) -> Self {
        Self::InvalidAmount(err.to_string())
    }
}
