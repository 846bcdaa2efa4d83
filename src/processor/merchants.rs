//! Merchant administration

use crate::aggregate::Merchant;
use crate::domain::{DomainError, Identity, MerchantId, OperationContext, ProcessorEvent, Role};

use super::PaymentProcessor;

impl PaymentProcessor {
    /// Register a merchant under its custodial identity (owner only).
    ///
    /// # Errors
    /// - `Unauthorized` if the caller is not the owner
    /// - `AlreadyRegistered` if the identity already owns a record
    /// - `InvalidAmount` for a blank name or the null identity
    pub fn register_merchant(
        &mut self,
        ctx: &OperationContext,
        name: String,
        custodial_wallet: Identity,
    ) -> Result<Merchant, DomainError> {
        self.authorize(ctx, Role::Owner)?;

        self.atomically(|p| {
            let merchant = p.registry.register(name, custodial_wallet, p.clock.now())?;
            p.journal_merchant(custodial_wallet, None);

            p.stage_event(
                ctx,
                ProcessorEvent::MerchantRegistered {
                    merchant: merchant.name().to_string(),
                    merchant_id: merchant.id(),
                    custodial_wallet,
                },
            );

            tracing::info!(
                merchant_id = %merchant.id(),
                custodial_wallet = %custodial_wallet,
                "Merchant registered"
            );

            Ok(merchant)
        })
    }

    /// Look up a registered merchant by id (owner only)
    pub fn get_merchant_by_id(
        &self,
        ctx: &OperationContext,
        merchant_id: MerchantId,
    ) -> Result<Merchant, DomainError> {
        self.authorize(ctx, Role::Owner)?;

        self.registry
            .get_by_id(merchant_id)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("merchant id {}", merchant_id)))
    }
}
