//! Accruing venue
//!
//! In-process venue position that earns simple interest at a fixed annual
//! rate, measured against the injected clock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::clock::Clock;
use crate::domain::{Amount, Identity};

use super::{LendingVenue, VenueError};

const SECONDS_PER_YEAR: i64 = 365 * 24 * 60 * 60;
const BASIS_POINTS: i64 = 10_000;

pub struct AccruingVenue {
    trusted_caller: Identity,
    annual_rate: Decimal,
    clock: Arc<dyn Clock>,
    position: Decimal,
    last_accrual: DateTime<Utc>,
}

impl AccruingVenue {
    /// `annual_rate_bps` is the simple annual rate in basis points
    pub fn new(trusted_caller: Identity, annual_rate_bps: u32, clock: Arc<dyn Clock>) -> Self {
        let last_accrual = clock.now();
        Self {
            trusted_caller,
            annual_rate: Decimal::from(annual_rate_bps) / Decimal::from(BASIS_POINTS),
            clock,
            position: Decimal::ZERO,
            last_accrual,
        }
    }

    fn interest_since_accrual(&self, now: DateTime<Utc>) -> Decimal {
        let elapsed = (now - self.last_accrual).num_seconds();
        if elapsed <= 0 || self.position.is_zero() {
            return Decimal::ZERO;
        }

        (self.position * self.annual_rate * Decimal::from(elapsed) / Decimal::from(SECONDS_PER_YEAR))
            .round_dp(18)
    }

    fn accrue(&mut self) {
        let now = self.clock.now();
        self.position += self.interest_since_accrual(now);
        self.last_accrual = now;
    }
}

impl LendingVenue for AccruingVenue {
    fn deposit(&mut self, amount: &Amount) -> Result<(), VenueError> {
        self.accrue();
        self.position += amount.value();
        tracing::debug!(amount = %amount, position = %self.position, "Venue deposit");
        Ok(())
    }

    fn withdraw(
        &mut self,
        caller: Identity,
        amount: &Amount,
        recipient: Identity,
    ) -> Result<Decimal, VenueError> {
        if caller != self.trusted_caller {
            return Err(VenueError::UntrustedCaller(caller));
        }

        self.accrue();
        if amount.value() > self.position {
            return Err(VenueError::InsufficientPosition {
                requested: amount.value(),
                available: self.position,
            });
        }

        self.position -= amount.value();
        tracing::debug!(amount = %amount, recipient = %recipient, position = %self.position, "Venue withdrawal");
        Ok(amount.value())
    }

    fn query_yield_index(&self) -> Result<Decimal, VenueError> {
        Ok(self.position + self.interest_since_accrual(self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn venue(rate_bps: u32) -> (AccruingVenue, ManualClock, Identity) {
        let clock = ManualClock::new(Utc::now());
        let trusted = Identity::random();
        let venue = AccruingVenue::new(trusted, rate_bps, Arc::new(clock.clone()));
        (venue, clock, trusted)
    }

    #[test]
    fn test_interest_accrues_over_a_year() {
        let (mut venue, clock, _) = venue(500);
        venue.deposit(&Amount::new(dec!(100)).unwrap()).unwrap();

        clock.advance(Duration::days(365));
        assert_eq!(venue.query_yield_index().unwrap(), dec!(105));
    }

    #[test]
    fn test_withdraw_reduces_position() {
        let (mut venue, _, trusted) = venue(0);
        venue.deposit(&Amount::new(dec!(1.9)).unwrap()).unwrap();

        let delivered = venue
            .withdraw(trusted, &Amount::new(dec!(1.0)).unwrap(), trusted)
            .unwrap();
        assert_eq!(delivered, dec!(1.0));
        assert_eq!(venue.query_yield_index().unwrap(), dec!(0.9));
    }

    #[test]
    fn test_withdraw_rejects_untrusted_caller() {
        let (mut venue, _, _) = venue(0);
        venue.deposit(&Amount::new(dec!(1)).unwrap()).unwrap();

        let intruder = Identity::random();
        let result = venue.withdraw(intruder, &Amount::new(dec!(1)).unwrap(), intruder);
        assert_eq!(result, Err(VenueError::UntrustedCaller(intruder)));
    }

    #[test]
    fn test_withdraw_more_than_position() {
        let (mut venue, _, trusted) = venue(0);
        venue.deposit(&Amount::new(dec!(1)).unwrap()).unwrap();

        let result = venue.withdraw(trusted, &Amount::new(dec!(2)).unwrap(), trusted);
        assert!(matches!(result, Err(VenueError::InsufficientPosition { .. })));
    }
}
