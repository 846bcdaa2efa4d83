//! Reserve Aggregate
//!
//! Pooled custody split into on-hand funds and principal lent to the venue,
//! together with the lending thresholds and the two rate gates.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Amount, Balance, DomainError};

use super::Aggregate;

/// Reserve change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveChange {
    /// Value arrived in custody
    Inflow(Amount),
    /// Value left custody
    Outflow(Amount),
    /// On-hand funds deposited at the venue
    Lent { amount: Amount, at: DateTime<Utc> },
    /// Principal pulled back from the venue. `at` stamps the retrieval gate;
    /// `None` leaves the gate untouched.
    Retrieved {
        principal: Amount,
        at: Option<DateTime<Utc>>,
    },
    LendingThresholdSet(Balance),
    RetrieveThresholdSet(Balance),
}

/// Reserve Aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveState {
    on_hand: Balance,
    lent_principal: Balance,
    lending_threshold: Balance,
    retrieve_threshold: Balance,
    reserve_margin: Balance,
    last_lend_at: Option<DateTime<Utc>>,
    last_retrieve_at: Option<DateTime<Utc>>,
    version: u64,
}

impl ReserveState {
    pub fn new(lending_threshold: Balance, retrieve_threshold: Balance, reserve_margin: Balance) -> Self {
        Self {
            on_hand: Balance::zero(),
            lent_principal: Balance::zero(),
            lending_threshold,
            retrieve_threshold,
            reserve_margin,
            last_lend_at: None,
            last_retrieve_at: None,
            version: 0,
        }
    }

    /// Fails with `LiquidityShortfall` when on-hand custody cannot fund `amount`
    pub fn ensure_liquidity(&self, amount: &Amount) -> Result<(), DomainError> {
        if !self.on_hand.is_sufficient_for(amount) {
            return Err(DomainError::liquidity_shortfall(
                amount.value(),
                self.on_hand.value(),
            ));
        }
        Ok(())
    }

    pub fn check_lend_gate(&self, now: DateTime<Utc>, window: Duration) -> Result<(), DomainError> {
        check_gate(self.last_lend_at, now, window)
    }

    pub fn check_retrieve_gate(&self, now: DateTime<Utc>, window: Duration) -> Result<(), DomainError> {
        check_gate(self.last_retrieve_at, now, window)
    }

    /// Amount a batch lend would move: everything above the reserve margin.
    ///
    /// Fails with `ThresholdNotMet` unless on-hand covers the lending
    /// threshold plus the margin.
    pub fn lendable_amount(&self) -> Result<Amount, DomainError> {
        let required = self.lending_threshold.value() + self.reserve_margin.value();
        if self.on_hand.value() < required {
            return Err(DomainError::threshold_not_met(required, self.on_hand.value()));
        }

        let surplus = self.on_hand.value() - self.reserve_margin.value();
        Amount::new(surplus).map_err(|_| DomainError::threshold_not_met(required, self.on_hand.value()))
    }

    pub fn check_retrieve_threshold(&self, amount: &Amount) -> Result<(), DomainError> {
        if amount.value() < self.retrieve_threshold.value() {
            return Err(DomainError::threshold_not_met(
                self.retrieve_threshold.value(),
                amount.value(),
            ));
        }
        Ok(())
    }

    /// Total custody the processor accounts for: on hand plus lent
    pub fn custody_total(&self) -> Decimal {
        self.on_hand.value() + self.lent_principal.value()
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn on_hand(&self) -> Balance {
        self.on_hand
    }

    pub fn lent_principal(&self) -> Balance {
        self.lent_principal
    }

    pub fn lending_threshold(&self) -> Balance {
        self.lending_threshold
    }

    pub fn retrieve_threshold(&self) -> Balance {
        self.retrieve_threshold
    }

    pub fn reserve_margin(&self) -> Balance {
        self.reserve_margin
    }

    pub fn last_lend_at(&self) -> Option<DateTime<Utc>> {
        self.last_lend_at
    }

    pub fn last_retrieve_at(&self) -> Option<DateTime<Utc>> {
        self.last_retrieve_at
    }
}

/// A gate stamped at `last` stays closed until `last + window`
fn check_gate(
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<(), DomainError> {
    match last {
        Some(last) if now < last + window => Err(DomainError::RateLimited {
            next_allowed_at: last + window,
        }),
        _ => Ok(()),
    }
}

impl Aggregate for ReserveState {
    type Change = ReserveChange;

    fn aggregate_type() -> &'static str {
        "Reserve"
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn apply(self, change: Self::Change) -> Self {
        match self.clone().try_apply(change) {
            Ok(next) => next,
            Err(e) => {
                // Changes are validated before they are applied
                tracing::error!(error = %e, change = ?change, "Rejected unvalidated reserve change");
                self
            }
        }
    }
}

impl ReserveState {
    /// Apply a change, failing without side effects when the buckets cannot
    /// take it. Gates are stamped only when the balances move.
    pub fn try_apply(mut self, change: ReserveChange) -> Result<Self, DomainError> {
        match change {
            ReserveChange::Inflow(amount) => {
                self.on_hand = self.on_hand.credit(&amount)?;
            }
            ReserveChange::Outflow(amount) => {
                self.ensure_liquidity(&amount)?;
                self.on_hand = self.on_hand.debit(&amount)?;
            }
            ReserveChange::Lent { amount, at } => {
                self.ensure_liquidity(&amount)?;
                let on_hand = self.on_hand.debit(&amount)?;
                let lent = self.lent_principal.credit(&amount)?;
                self.on_hand = on_hand;
                self.lent_principal = lent;
                self.last_lend_at = Some(at);
            }
            ReserveChange::Retrieved { principal, at } => {
                self.lent_principal = self.lent_principal.saturating_debit(principal.value());
                if let Some(at) = at {
                    self.last_retrieve_at = Some(at);
                }
            }
            ReserveChange::LendingThresholdSet(value) => self.lending_threshold = value,
            ReserveChange::RetrieveThresholdSet(value) => self.retrieve_threshold = value,
        }

        self.version += 1;
        Ok(self)
    }
}
