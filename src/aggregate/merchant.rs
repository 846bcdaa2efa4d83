//! Merchant Aggregate
//!
//! A merchant's logical entitlement to custody funds. The balance is
//! independent of where the backing funds physically sit (on hand or lent).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Amount, Balance, DomainError, Identity, MerchantId};

use super::Aggregate;

/// Balance-affecting change for a merchant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MerchantChange {
    Credited(Amount),
    Debited(Amount),
}

/// Merchant Aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Merchant {
    id: MerchantId,
    name: String,
    custodial_wallet: Identity,
    balance: Balance,
    registered: bool,
    registered_at: DateTime<Utc>,
    version: u64,
}

impl Merchant {
    /// Create a freshly registered merchant with a zero balance
    pub fn register(
        id: MerchantId,
        name: String,
        custodial_wallet: Identity,
        registered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            custodial_wallet,
            balance: Balance::zero(),
            registered: true,
            registered_at,
            version: 1,
        }
    }

    /// Credit a payment to the merchant balance
    pub fn credit(&self, amount: &Amount) -> Result<MerchantChange, DomainError> {
        if !self.registered {
            return Err(DomainError::NotFound(self.custodial_wallet.to_string()));
        }

        self.balance.credit(amount)?;
        Ok(MerchantChange::Credited(*amount))
    }

    /// Debit the merchant balance
    pub fn debit(&self, amount: &Amount) -> Result<MerchantChange, DomainError> {
        if !self.registered {
            return Err(DomainError::NotFound(self.custodial_wallet.to_string()));
        }

        if !self.balance.is_sufficient_for(amount) {
            return Err(DomainError::insufficient_balance(
                amount.value(),
                self.balance.value(),
            ));
        }

        Ok(MerchantChange::Debited(*amount))
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn id(&self) -> MerchantId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn custodial_wallet(&self) -> Identity {
        self.custodial_wallet
    }

    pub fn balance(&self) -> Balance {
        self.balance
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }
}

impl Aggregate for Merchant {
    type Change = MerchantChange;

    fn aggregate_type() -> &'static str {
        "Merchant"
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn apply(mut self, change: Self::Change) -> Self {
        let result = match change {
            MerchantChange::Credited(amount) => self.balance.credit(&amount),
            MerchantChange::Debited(amount) => self.balance.debit(&amount),
        };

        match result {
            Ok(balance) => self.balance = balance,
            Err(e) => {
                // Changes are validated before they are applied
                tracing::error!(
                    merchant_id = %self.id,
                    error = %e,
                    "Rejected unvalidated merchant change"
                );
            }
        }

        self.version += 1;
        self
    }
}
