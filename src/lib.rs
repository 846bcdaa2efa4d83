//! custody_ledger Library
//!
//! Custodial payment ledger: merchant balances, pooled reserve and lending
//! venue integration behind a single operation-call boundary.

pub mod access;
pub mod aggregate;
pub mod audit;
pub mod clock;
pub mod commands;
pub mod domain;
pub mod event_log;
pub mod processor;
pub mod registry;
pub mod service;
pub mod transfer;
pub mod venue;

pub mod config;
mod error;

pub use commands::{Command, Outcome};
pub use config::{Config, ProcessorConfig};
pub use domain::{Amount, AmountError, Balance, DomainError, Identity, MerchantId, OperationContext};
pub use domain::{ProcessorEvent, RecordedEvent};
pub use error::{AppError, AppResult};
pub use processor::{LedgerSnapshot, PaymentProcessor};
pub use service::LedgerService;
