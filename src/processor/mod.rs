//! Payment Processor
//!
//! Owns the merchant registry and the reserve, and runs every public
//! operation against them. Each operation is atomic: mutations are journaled
//! and undone if the operation fails, and events are staged until the
//! outermost operation commits.
//!
//! Operations that send value out of custody commit their debits first and
//! only then call the transfer gateway. Calls a recipient makes back into the
//! processor while receiving are executed in-line against the committed
//! state.

mod ledger;
mod merchants;
mod reserve;


use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::access::AccessControl;
use crate::aggregate::{Aggregate, Merchant, MerchantChange, ReserveChange, ReserveState};
use crate::clock::Clock;
use crate::commands::{Command, Outcome};
use crate::config::ProcessorConfig;
use crate::domain::{
    DomainError, Identity, MerchantId, OperationContext, ProcessorEvent, RecordedEvent, Role,
};
use crate::event_log::EventSink;
use crate::registry::MerchantRegistry;
use crate::transfer::{OutboundTransfer, TransferBudget, TransferError, TransferGateway};
use crate::venue::LendingVenue;

/// Deepest chain of calls recipients may make back into the processor
pub const MAX_REENTRY_DEPTH: usize = 8;

/// State captured when an operation starts
#[derive(Debug)]
struct Checkpoint {
    reserve: ReserveState,
    next_id: MerchantId,
    emergency_swept: bool,
    staged_len: usize,
    sequence: u64,
    /// Merchant records as they were before this operation touched them
    merchants: Vec<(Identity, Option<Merchant>)>,
}

/// Point-in-time view of the ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerSnapshot {
    pub owner: Identity,
    pub on_hand: Decimal,
    pub lent_principal: Decimal,
    pub custody_total: Decimal,
    pub total_merchant_balance: Decimal,
    pub lending_threshold: Decimal,
    pub retrieve_threshold: Decimal,
    pub reserve_margin: Decimal,
    pub last_lend_at: Option<DateTime<Utc>>,
    pub last_retrieve_at: Option<DateTime<Utc>>,
    pub next_merchant_id: MerchantId,
    pub events_published: u64,
    pub emergency_swept: bool,
    pub merchants: Vec<Merchant>,
}

impl LedgerSnapshot {
    /// Merchant balances are backed by custody
    pub fn is_conserved(&self) -> bool {
        self.total_merchant_balance <= self.custody_total
    }
}

pub struct PaymentProcessor {
    access: AccessControl,
    config: ProcessorConfig,
    registry: MerchantRegistry,
    reserve: ReserveState,
    venue: Box<dyn LendingVenue>,
    gateway: Box<dyn TransferGateway>,
    clock: Arc<dyn Clock>,
    events: Box<dyn EventSink>,
    staged: Vec<RecordedEvent>,
    sequence: u64,
    journal: Vec<Checkpoint>,
    reentry_depth: usize,
    emergency_swept: bool,
}

impl PaymentProcessor {
    pub fn new(
        config: ProcessorConfig,
        venue: impl LendingVenue + 'static,
        gateway: impl TransferGateway + 'static,
        clock: Arc<dyn Clock>,
        events: impl EventSink + 'static,
    ) -> Self {
        let reserve = ReserveState::new(
            config.lending_threshold,
            config.retrieve_threshold,
            config.reserve_margin,
        );

        tracing::info!(
            owner = %config.owner,
            custody = %config.custody_identity,
            lending_threshold = %config.lending_threshold,
            retrieve_threshold = %config.retrieve_threshold,
            reserve_margin = %config.reserve_margin,
            rate_window_secs = config.rate_window.num_seconds(),
            merchant_retrieval_rate_gated = config.merchant_retrieval_rate_gated,
            "Payment processor initialised"
        );

        Self {
            access: AccessControl::new(config.owner),
            config,
            registry: MerchantRegistry::new(),
            reserve,
            venue: Box::new(venue),
            gateway: Box::new(gateway),
            clock,
            events: Box::new(events),
            staged: Vec::new(),
            sequence: 0,
            journal: Vec::new(),
            reentry_depth: 0,
            emergency_swept: false,
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Execute a command on behalf of `ctx.caller`
    pub fn execute(
        &mut self,
        ctx: &OperationContext,
        command: Command,
    ) -> Result<Outcome, DomainError> {
        let mut ctx = ctx.clone();
        let correlation_id = ctx.ensure_correlation_id();
        let operation = command.name();

        match self.dispatch(&ctx, command) {
            Ok(outcome) => {
                tracing::info!(
                    operation,
                    caller = %ctx.caller,
                    correlation_id = %correlation_id,
                    "Operation committed"
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(
                    operation,
                    caller = %ctx.caller,
                    correlation_id = %correlation_id,
                    error = %e,
                    "Operation rejected"
                );
                Err(e)
            }
        }
    }

    fn dispatch(&mut self, ctx: &OperationContext, command: Command) -> Result<Outcome, DomainError> {
        match command {
            Command::RegisterMerchant {
                name,
                custodial_wallet,
            } => self
                .register_merchant(ctx, name, custodial_wallet)
                .map(|merchant| Outcome::Merchant { merchant }),
            Command::GetMerchantById { merchant_id } => self
                .get_merchant_by_id(ctx, merchant_id)
                .map(|merchant| Outcome::Merchant { merchant }),
            Command::SetLendingThreshold { value } => self
                .set_lending_threshold(ctx, value)
                .map(|_| Outcome::Completed),
            Command::SetRetrieveThreshold { value } => self
                .set_retrieve_threshold(ctx, value)
                .map(|_| Outcome::Completed),
            Command::LendFundsBatch => self
                .lend_funds_batch(ctx)
                .map(|amount| Outcome::Lent { amount }),
            Command::RetrieveLentFundsBatch { amount } => self
                .retrieve_lent_funds_batch(ctx, amount)
                .map(|amount| Outcome::Retrieved { amount }),
            Command::CollectAaveInterest => self
                .collect_aave_interest(ctx)
                .map(|amount| Outcome::Interest { amount }),
            Command::EmergencyWithdraw => self
                .emergency_withdraw(ctx)
                .map(|amount| Outcome::Swept { amount }),
            Command::IssueRefund { customer, amount } => self
                .issue_refund(ctx, customer, amount)
                .map(|_| Outcome::Completed),
            Command::WithdrawFunds { recipient, amount } => self
                .withdraw_funds(ctx, recipient, amount)
                .map(|_| Outcome::Completed),
            Command::RequestRetrieveFunds { amount } => self
                .request_retrieve_funds(ctx, amount)
                .map(|amount| Outcome::Retrieved { amount }),
            Command::ProcessPayment { merchant, amount } => self
                .process_payment(ctx, merchant, amount)
                .map(|_| Outcome::Completed),
            Command::Receive { amount } => self.receive(ctx, amount).map(|_| Outcome::Completed),
            Command::Fallback { selector, amount } => self
                .fallback(ctx, &selector, amount)
                .map(|_| Outcome::Completed),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn owner(&self) -> Identity {
        self.access.owner()
    }

    pub fn reserve(&self) -> &ReserveState {
        &self.reserve
    }

    pub fn registry(&self) -> &MerchantRegistry {
        &self.registry
    }

    pub fn merchant(&self, custodial_wallet: &Identity) -> Option<&Merchant> {
        self.registry.get(custodial_wallet)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            owner: self.access.owner(),
            on_hand: self.reserve.on_hand().value(),
            lent_principal: self.reserve.lent_principal().value(),
            custody_total: self.reserve.custody_total(),
            total_merchant_balance: self.registry.total_balance(),
            lending_threshold: self.reserve.lending_threshold().value(),
            retrieve_threshold: self.reserve.retrieve_threshold().value(),
            reserve_margin: self.reserve.reserve_margin().value(),
            last_lend_at: self.reserve.last_lend_at(),
            last_retrieve_at: self.reserve.last_retrieve_at(),
            next_merchant_id: self.registry.next_id(),
            events_published: self.sequence,
            emergency_swept: self.emergency_swept,
            merchants: self.registry.merchants().cloned().collect(),
        }
    }

    // =========================================================================
    // Internals shared by the operations
    // =========================================================================

    fn authorize(&self, ctx: &OperationContext, required: Role) -> Result<(), DomainError> {
        self.access.authorize(&ctx.caller, required, &self.registry)
    }

    /// Run `op` as one all-or-nothing unit.
    ///
    /// Nested calls fold into the enclosing unit on success. Staged events
    /// reach the sink only when the outermost unit commits.
    fn atomically<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, DomainError>,
    ) -> Result<T, DomainError> {
        self.journal.push(Checkpoint {
            reserve: self.reserve.clone(),
            next_id: self.registry.next_id(),
            emergency_swept: self.emergency_swept,
            staged_len: self.staged.len(),
            sequence: self.sequence,
            merchants: Vec::new(),
        });

        let result = op(self);

        let Some(checkpoint) = self.journal.pop() else {
            tracing::error!("Journal checkpoint missing at end of operation");
            return result;
        };

        match &result {
            Ok(_) => match self.journal.last_mut() {
                Some(parent) => parent.merchants.extend(checkpoint.merchants),
                None => self.commit(),
            },
            Err(e) => {
                tracing::debug!(error = %e, depth = self.journal.len(), "Rolling back");
                self.rollback(checkpoint);
            }
        }

        result
    }

    fn commit(&mut self) {
        for event in std::mem::take(&mut self.staged) {
            self.events.publish(event);
        }

        // A sweep excuses the shortfall only until custody covers balances again
        let total = self.registry.total_balance();
        let custody = self.reserve.custody_total();
        if total <= custody {
            self.emergency_swept = false;
        } else if !self.emergency_swept {
            tracing::error!(
                total_merchant_balance = %total,
                custody_total = %custody,
                "Merchant balances exceed custody"
            );
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        for (wallet, prior) in checkpoint.merchants.into_iter().rev() {
            self.registry.restore(wallet, prior);
        }
        self.registry.rewind_next_id(checkpoint.next_id);
        self.reserve = checkpoint.reserve;
        self.emergency_swept = checkpoint.emergency_swept;
        self.staged.truncate(checkpoint.staged_len);
        self.sequence = checkpoint.sequence;
    }

    /// Note the prior state of a merchant record in the open checkpoint
    fn journal_merchant(&mut self, wallet: Identity, prior: Option<Merchant>) {
        if let Some(checkpoint) = self.journal.last_mut() {
            checkpoint.merchants.push((wallet, prior));
        }
    }

    fn apply_merchant(&mut self, merchant: Merchant, change: MerchantChange) {
        let wallet = merchant.custodial_wallet();
        let prior = self.registry.update(merchant.apply(change));
        self.journal_merchant(wallet, prior);
    }

    fn apply_reserve(&mut self, change: ReserveChange) -> Result<(), DomainError> {
        self.reserve = self.reserve.clone().try_apply(change)?;
        Ok(())
    }

    /// Registered merchant record for `wallet`, cloned for mutation
    fn registered_merchant(&self, wallet: &Identity) -> Result<Merchant, DomainError> {
        self.registry
            .get(wallet)
            .filter(|merchant| merchant.is_registered())
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("merchant {}", wallet)))
    }

    fn stage_event(&mut self, ctx: &OperationContext, event: ProcessorEvent) {
        self.sequence += 1;
        self.staged.push(RecordedEvent {
            sequence: self.sequence,
            correlation_id: ctx.correlation_id,
            caller: ctx.caller,
            event,
            recorded_at: self.clock.now(),
        });
    }

    /// Send value out of custody. Debits must already be applied.
    ///
    /// Under an unbounded budget the recipient's own calls back into the
    /// processor may fail without failing the transfer: the recipient is
    /// expected to handle its rejected callbacks, and the value counts as
    /// delivered either way.
    fn transfer_out(
        &mut self,
        ctx: &OperationContext,
        transfer: OutboundTransfer,
    ) -> Result<(), DomainError> {
        let receipt = self
            .gateway
            .send(&transfer)
            .map_err(|e| DomainError::ExternalTransferFailed(e.to_string()))?;

        if transfer.budget == TransferBudget::Stipend && !receipt.callbacks.is_empty() {
            return Err(DomainError::ExternalTransferFailed(
                TransferError::StipendExceeded.to_string(),
            ));
        }

        tracing::debug!(
            recipient = %transfer.recipient,
            amount = %transfer.amount,
            purpose = ?transfer.purpose,
            callbacks = receipt.callbacks.len(),
            "Transfer delivered"
        );

        self.run_reentrant_calls(ctx, transfer.recipient, receipt.callbacks);
        Ok(())
    }

    /// Execute calls a recipient made while receiving. A failed call is
    /// reported to the recipient and leaves the outer operation intact.
    fn run_reentrant_calls(
        &mut self,
        ctx: &OperationContext,
        recipient: Identity,
        calls: Vec<Command>,
    ) {
        if calls.is_empty() {
            return;
        }
        if self.reentry_depth >= MAX_REENTRY_DEPTH {
            tracing::warn!(
                recipient = %recipient,
                dropped = calls.len(),
                "Reentry depth exceeded"
            );
            return;
        }

        self.reentry_depth += 1;
        let reentrant_ctx = ctx.reentrant_from(recipient);

        for call in calls {
            let operation = call.name();
            tracing::debug!(
                caller = %recipient,
                operation,
                depth = self.reentry_depth,
                "Reentrant call"
            );

            if let Err(e) = self.dispatch(&reentrant_ctx, call) {
                tracing::warn!(
                    caller = %recipient,
                    operation,
                    error = %e,
                    "Reentrant call rejected"
                );
            }
        }

        self.reentry_depth -= 1;
    }
}
