//! Operation Context
//!
//! Carries the caller of an operation plus metadata used for auditing and
//! tracing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Identity;

/// Context for an operation, used for authorization, auditing and tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    /// Identity invoking the operation
    pub caller: Identity,

    /// Correlation ID for request tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,

    /// Set when the call is made by a transfer recipient while it is
    /// receiving funds from the processor
    #[serde(default)]
    pub reentrant: bool,
}

impl OperationContext {
    /// Create a context for the given caller
    pub fn new(caller: Identity) -> Self {
        Self {
            caller,
            correlation_id: None,
            reentrant: false,
        }
    }

    /// Create context with correlation ID
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Context for a call made back into the processor by a transfer recipient.
    /// Inherits the correlation ID of the outer operation.
    pub fn reentrant_from(&self, caller: Identity) -> Self {
        Self {
            caller,
            correlation_id: self.correlation_id,
            reentrant: true,
        }
    }

    /// Generate a new correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }
}
