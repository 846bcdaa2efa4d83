//! Reserve operations
//!
//! Moves idle on-hand custody to the lending venue and back, behind the
//! lend and retrieve rate gates.

use rust_decimal::Decimal;

use crate::aggregate::ReserveChange;
use crate::domain::{Amount, Balance, DomainError, OperationContext, ProcessorEvent, Role};
use crate::transfer::{OutboundTransfer, TransferBudget, TransferPurpose};

use super::PaymentProcessor;

impl PaymentProcessor {
    pub fn set_lending_threshold(
        &mut self,
        ctx: &OperationContext,
        value: Decimal,
    ) -> Result<(), DomainError> {
        self.authorize(ctx, Role::Owner)?;
        let value = Balance::new(value)?;

        self.atomically(|p| {
            p.apply_reserve(ReserveChange::LendingThresholdSet(value))?;
            tracing::info!(lending_threshold = %value, "Lending threshold set");
            Ok(())
        })
    }

    pub fn set_retrieve_threshold(
        &mut self,
        ctx: &OperationContext,
        value: Decimal,
    ) -> Result<(), DomainError> {
        self.authorize(ctx, Role::Owner)?;
        let value = Balance::new(value)?;

        self.atomically(|p| {
            p.apply_reserve(ReserveChange::RetrieveThresholdSet(value))?;
            tracing::info!(retrieve_threshold = %value, "Retrieve threshold set");
            Ok(())
        })
    }

    /// Deposit everything above the reserve margin at the venue.
    ///
    /// # Errors
    /// - `RateLimited` within one window of the previous lend
    /// - `ThresholdNotMet` unless on-hand covers threshold plus margin
    /// - `ExternalTransferFailed` if the venue rejects the deposit
    pub fn lend_funds_batch(&mut self, ctx: &OperationContext) -> Result<Decimal, DomainError> {
        self.authorize(ctx, Role::Owner)?;

        self.atomically(|p| {
            let now = p.clock.now();
            p.reserve.check_lend_gate(now, p.config.rate_window)?;
            let amount = p.reserve.lendable_amount()?;

            p.venue.deposit(&amount)?;
            p.apply_reserve(ReserveChange::Lent { amount, at: now })?;

            p.stage_event(
                ctx,
                ProcessorEvent::FundsLentToAave {
                    amount: amount.value(),
                },
            );

            tracing::info!(
                amount = %amount,
                on_hand = %p.reserve.on_hand(),
                lent_principal = %p.reserve.lent_principal(),
                "Funds lent"
            );
            Ok(amount.value())
        })
    }

    /// Pull `amount` of principal back from the venue (owner only)
    pub fn retrieve_lent_funds_batch(
        &mut self,
        ctx: &OperationContext,
        amount: Decimal,
    ) -> Result<Decimal, DomainError> {
        self.authorize(ctx, Role::Owner)?;
        let amount = Amount::new(amount)?;

        self.atomically(|p| {
            let now = p.clock.now();
            p.reserve.check_retrieve_gate(now, p.config.rate_window)?;
            p.reserve.check_retrieve_threshold(&amount)?;

            let delivered = p.withdraw_from_venue(&amount)?;
            p.apply_reserve(ReserveChange::Retrieved {
                principal: amount,
                at: Some(now),
            })?;

            p.stage_event(
                ctx,
                ProcessorEvent::FundsRetrievedFromAave {
                    amount: amount.value(),
                },
            );

            tracing::info!(
                amount = %amount,
                delivered = %delivered,
                lent_principal = %p.reserve.lent_principal(),
                "Lent funds retrieved"
            );
            Ok(delivered)
        })
    }

    /// Merchant-initiated retrieval from the venue.
    ///
    /// Unless `merchant_retrieval_rate_gated` is set this neither checks nor
    /// stamps the retrieve gate, so a batch lend may redeposit the funds
    /// before the merchant withdraws them.
    pub fn request_retrieve_funds(
        &mut self,
        ctx: &OperationContext,
        amount: Decimal,
    ) -> Result<Decimal, DomainError> {
        self.authorize(ctx, Role::Merchant)?;
        let amount = Amount::new(amount)?;
        let gated = self.config.merchant_retrieval_rate_gated;

        self.atomically(|p| {
            let now = p.clock.now();
            if gated {
                p.reserve.check_retrieve_gate(now, p.config.rate_window)?;
            }
            p.reserve.check_retrieve_threshold(&amount)?;

            let delivered = p.withdraw_from_venue(&amount)?;
            p.apply_reserve(ReserveChange::Retrieved {
                principal: amount,
                at: gated.then_some(now),
            })?;

            p.stage_event(
                ctx,
                ProcessorEvent::FundsRetrievedFromAave {
                    amount: amount.value(),
                },
            );

            tracing::info!(
                merchant = %ctx.caller,
                amount = %amount,
                delivered = %delivered,
                gated,
                "Merchant retrieval from venue"
            );
            Ok(delivered)
        })
    }

    /// Yield accrued above lent principal. Read-only.
    pub fn collect_aave_interest(&self, ctx: &OperationContext) -> Result<Decimal, DomainError> {
        self.authorize(ctx, Role::Owner)?;

        let principal = self.reserve.lent_principal();
        if principal.is_zero() {
            return Err(DomainError::NoInterestAvailable);
        }

        let index = self.venue.query_yield_index()?;
        let interest = index - principal.value();
        if interest <= Decimal::ZERO {
            return Err(DomainError::NoInterestAvailable);
        }

        tracing::info!(yield_index = %index, principal = %principal, interest = %interest, "Interest available");
        Ok(interest)
    }

    /// Sweep all on-hand custody to the owner, ignoring merchant balances
    pub fn emergency_withdraw(&mut self, ctx: &OperationContext) -> Result<Decimal, DomainError> {
        self.authorize(ctx, Role::Owner)?;

        self.atomically(|p| {
            let on_hand = p.reserve.on_hand();
            if on_hand.is_zero() {
                return Err(DomainError::NoFundsAvailable);
            }
            let amount = Amount::new(on_hand.value())?;

            p.apply_reserve(ReserveChange::Outflow(amount))?;
            p.emergency_swept = true;

            let owner = p.access.owner();
            p.transfer_out(
                ctx,
                OutboundTransfer {
                    recipient: owner,
                    amount,
                    budget: TransferBudget::Unbounded,
                    purpose: TransferPurpose::EmergencySweep,
                },
            )?;

            p.stage_event(
                ctx,
                ProcessorEvent::EmergencyWithdrawalActivated {
                    amount: amount.value(),
                },
            );

            tracing::warn!(
                amount = %amount,
                owner = %owner,
                merchant_balances = %p.registry.total_balance(),
                "Emergency withdrawal activated"
            );
            Ok(amount.value())
        })
    }

    /// Withdraw from the venue into custody and credit on-hand with what
    /// actually arrived. Fails unless on-hand grew.
    fn withdraw_from_venue(&mut self, amount: &Amount) -> Result<Decimal, DomainError> {
        let before = self.reserve.on_hand().value();
        let custody = self.config.custody_identity;

        let delivered = self.venue.withdraw(custody, amount, custody)?;
        if delivered > Decimal::ZERO {
            self.apply_reserve(ReserveChange::Inflow(Amount::new(delivered)?))?;
        }

        let after = self.reserve.on_hand().value();
        if after <= before {
            return Err(DomainError::RetrievalVerificationFailed { before, after });
        }

        Ok(after - before)
    }
}
