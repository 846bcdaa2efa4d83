//! Ledger Service
//!
//! Cloneable handle for concurrent hosts. Every call takes the single
//! processor lock, so operations never interleave.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::commands::{Command, Outcome};
use crate::domain::{DomainError, OperationContext};
use crate::processor::{LedgerSnapshot, PaymentProcessor};

#[derive(Clone)]
pub struct LedgerService {
    processor: Arc<Mutex<PaymentProcessor>>,
}

impl LedgerService {
    pub fn new(processor: PaymentProcessor) -> Self {
        Self {
            processor: Arc::new(Mutex::new(processor)),
        }
    }

    /// Execute one command with exclusive access to the ledger
    pub async fn execute(
        &self,
        ctx: &OperationContext,
        command: Command,
    ) -> Result<Outcome, DomainError> {
        let mut processor = self.processor.lock().await;
        processor.execute(ctx, command)
    }

    /// Execute commands back to back without another caller in between
    pub async fn execute_all(
        &self,
        ctx: &OperationContext,
        commands: Vec<Command>,
    ) -> Vec<Result<Outcome, DomainError>> {
        let mut processor = self.processor.lock().await;
        commands
            .into_iter()
            .map(|command| processor.execute(ctx, command))
            .collect()
    }

    pub async fn snapshot(&self) -> LedgerSnapshot {
        self.processor.lock().await.snapshot()
    }
}
