//! Access Control
//!
//! Guards every privileged operation. The owner is a single identity fixed
//! at construction; the merchant role is derived from the caller's own
//! registration, never from an identity passed as a parameter.

use crate::domain::{DomainError, Identity, Role};
use crate::registry::MerchantRegistry;

/// Caller authorization against the owner and merchant roles
#[derive(Debug, Clone)]
pub struct AccessControl {
    owner: Identity,
}

impl AccessControl {
    pub fn new(owner: Identity) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> Identity {
        self.owner
    }

    /// Check that `caller` holds `required`
    pub fn authorize(
        &self,
        caller: &Identity,
        required: Role,
        registry: &MerchantRegistry,
    ) -> Result<(), DomainError> {
        let allowed = match required {
            Role::Owner => *caller == self.owner,
            Role::Merchant => registry.is_registered(caller),
        };

        if allowed {
            Ok(())
        } else {
            tracing::warn!(caller = %caller, required = %required, "Permission denied");
            Err(DomainError::unauthorized(*caller, required))
        }
    }
}
