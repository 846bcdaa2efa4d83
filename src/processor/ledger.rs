//! Balance ledger operations
//!
//! Payments credit a merchant and on-hand custody together. Refunds and
//! withdrawals debit both before value leaves custody.

use rust_decimal::Decimal;

use crate::aggregate::ReserveChange;
use crate::domain::{Amount, DomainError, Identity, OperationContext, ProcessorEvent, Role};
use crate::transfer::{OutboundTransfer, TransferBudget, TransferPurpose};

use super::PaymentProcessor;

impl PaymentProcessor {
    /// Customer payment to `merchant`. Open to any caller; the caller is
    /// recorded as the customer.
    pub fn process_payment(
        &mut self,
        ctx: &OperationContext,
        merchant: Identity,
        amount: Decimal,
    ) -> Result<(), DomainError> {
        let record = self.registered_merchant(&merchant)?;
        let amount = Amount::new(amount)?;

        self.atomically(|p| {
            let change = record.credit(&amount)?;
            p.apply_merchant(record, change);
            p.apply_reserve(ReserveChange::Inflow(amount))?;

            p.stage_event(
                ctx,
                ProcessorEvent::PaymentProcessed {
                    merchant,
                    customer: ctx.caller,
                    amount: amount.value(),
                },
            );
            Ok(())
        })
    }

    /// Refund a customer from the calling merchant's balance.
    ///
    /// The balance and on-hand custody are debited before the transfer. A
    /// failed transfer fails the refund and undoes the debit.
    pub fn issue_refund(
        &mut self,
        ctx: &OperationContext,
        customer: Identity,
        amount: Decimal,
    ) -> Result<(), DomainError> {
        self.authorize(ctx, Role::Merchant)?;
        if customer.is_nil() {
            return Err(DomainError::InvalidAmount(
                "customer is the null identity".to_string(),
            ));
        }
        let amount = Amount::new(amount)?;

        self.atomically(|p| {
            let merchant = p.registered_merchant(&ctx.caller)?;
            let change = merchant.debit(&amount)?;

            if p.reserve.ensure_liquidity(&amount).is_err() {
                return Err(DomainError::ExternalTransferFailed(format!(
                    "on-hand custody {} cannot fund refund of {}",
                    p.reserve.on_hand(),
                    amount
                )));
            }

            p.apply_merchant(merchant, change);
            p.apply_reserve(ReserveChange::Outflow(amount))?;

            p.transfer_out(
                ctx,
                OutboundTransfer {
                    recipient: customer,
                    amount,
                    budget: TransferBudget::Unbounded,
                    purpose: TransferPurpose::Refund,
                },
            )?;

            p.stage_event(
                ctx,
                ProcessorEvent::PaymentProcessed {
                    merchant: ctx.caller,
                    customer,
                    amount: amount.value(),
                },
            );
            p.stage_event(
                ctx,
                ProcessorEvent::FundsWithdrawn {
                    merchant: ctx.caller,
                    amount: amount.value(),
                    recipient: customer,
                },
            );
            Ok(())
        })
    }

    /// Withdraw from the calling merchant's balance to `recipient`.
    ///
    /// The recipient only gets a stipend: any attempt to call back into the
    /// processor while receiving fails the withdrawal.
    ///
    /// # Errors
    /// - `InsufficientBalance` if the ledger balance cannot cover `amount`
    /// - `LiquidityShortfall` if the balance suffices but the funds are lent
    pub fn withdraw_funds(
        &mut self,
        ctx: &OperationContext,
        recipient: Identity,
        amount: Decimal,
    ) -> Result<(), DomainError> {
        self.authorize(ctx, Role::Merchant)?;
        if recipient.is_nil() {
            return Err(DomainError::InvalidAmount(
                "recipient is the null identity".to_string(),
            ));
        }
        let amount = Amount::new(amount)?;

        self.atomically(|p| {
            let merchant = p.registered_merchant(&ctx.caller)?;
            let change = merchant.debit(&amount)?;
            p.reserve.ensure_liquidity(&amount)?;

            p.apply_merchant(merchant, change);
            p.apply_reserve(ReserveChange::Outflow(amount))?;

            p.transfer_out(
                ctx,
                OutboundTransfer {
                    recipient,
                    amount,
                    budget: TransferBudget::Stipend,
                    purpose: TransferPurpose::Withdrawal,
                },
            )?;

            p.stage_event(
                ctx,
                ProcessorEvent::FundsWithdrawn {
                    merchant: ctx.caller,
                    amount: amount.value(),
                    recipient,
                },
            );
            Ok(())
        })
    }

    /// Bare value transfer into custody. Credits no merchant.
    pub fn receive(&mut self, ctx: &OperationContext, amount: Decimal) -> Result<(), DomainError> {
        if amount.is_zero() {
            return Ok(());
        }
        let amount = Amount::new(amount)?;

        self.atomically(|p| {
            p.apply_reserve(ReserveChange::Inflow(amount))?;
            p.stage_event(
                ctx,
                ProcessorEvent::FundsReceived {
                    amount: amount.value(),
                    sender: ctx.caller,
                },
            );

            tracing::info!(
                sender = %ctx.caller,
                amount = %amount,
                "Unsolicited funds received, reconcile manually"
            );
            Ok(())
        })
    }

    /// Call matching no declared operation. Any value it carries is kept.
    pub fn fallback(
        &mut self,
        ctx: &OperationContext,
        selector: &str,
        amount: Decimal,
    ) -> Result<(), DomainError> {
        tracing::debug!(caller = %ctx.caller, selector, "Unrecognised call");
        self.receive(ctx, amount)
    }
}
