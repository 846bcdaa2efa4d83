//! Integration tests for the reserve manager and the lending venue

use chrono::Duration;
use custody_ledger::transfer::TransferPurpose;
use custody_ledger::venue::VenueCall;
use custody_ledger::{DomainError, Identity, OperationContext, ProcessorEvent};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

mod common;

use common::Ledger;

// =========================================================================
// Batch lending
// =========================================================================

#[test]
fn test_lend_batch_leaves_reserve_margin() {
    let mut ledger = Ledger::new();
    let owner = ledger.as_owner();
    let wallet = ledger.funded_merchant(dec!(2.0));

    let lent = ledger.processor.lend_funds_batch(&owner).unwrap();

    assert_eq!(lent, dec!(1.9));
    assert_eq!(ledger.on_hand(), dec!(0.1));
    assert_eq!(ledger.lent(), dec!(1.9));
    assert_eq!(ledger.balance(&wallet), dec!(2.0));
    assert_eq!(ledger.venue.position(), dec!(1.9));
    assert_eq!(
        ledger.log.events().last(),
        Some(&ProcessorEvent::FundsLentToAave { amount: dec!(1.9) })
    );

    let repeat = ledger.processor.lend_funds_batch(&owner);
    assert!(matches!(repeat, Err(DomainError::RateLimited { .. })));
}

#[test]
fn test_lend_batch_gate_window() {
    let mut ledger = Ledger::new();
    let owner = ledger.as_owner();
    let wallet = ledger.funded_merchant(dec!(2.0));
    ledger.processor.lend_funds_batch(&owner).unwrap();
    let lent_at = ledger.processor.reserve().last_lend_at().unwrap();

    ledger.pay(wallet, dec!(3.0));
    ledger.clock.advance(Duration::minutes(59));
    assert_eq!(
        ledger.processor.lend_funds_batch(&owner),
        Err(DomainError::RateLimited {
            next_allowed_at: lent_at + Duration::hours(1)
        })
    );

    ledger.clock.advance(Duration::minutes(1));
    assert_eq!(ledger.processor.lend_funds_batch(&owner).unwrap(), dec!(3.0));
    assert_eq!(ledger.lent(), dec!(4.9));
}

#[test]
fn test_lend_batch_threshold_not_met() {
    let mut ledger = Ledger::new();
    let owner = ledger.as_owner();
    ledger.funded_merchant(dec!(1.05));

    assert_eq!(
        ledger.processor.lend_funds_batch(&owner),
        Err(DomainError::threshold_not_met(dec!(1.1), dec!(1.05)))
    );
    // A rejected lend does not close the gate
    assert_eq!(ledger.processor.reserve().last_lend_at(), None);
}

#[test]
fn test_lend_batch_venue_failure_changes_nothing() {
    let mut ledger = Ledger::new();
    let owner = ledger.as_owner();
    ledger.funded_merchant(dec!(2.0));
    let before = ledger.processor.snapshot();
    let events_before = ledger.log.len();

    ledger.venue.fail_next_deposit("venue paused");
    let result = ledger.processor.lend_funds_batch(&owner);

    assert!(matches!(result, Err(DomainError::ExternalTransferFailed(_))));
    assert_eq!(ledger.processor.snapshot(), before);
    assert_eq!(ledger.log.len(), events_before);

    // Gate stayed open, so the retry goes through
    assert_eq!(ledger.processor.lend_funds_batch(&owner).unwrap(), dec!(1.9));
}

#[test]
fn test_lend_batch_owner_only() {
    let mut ledger = Ledger::new();
    let wallet = ledger.funded_merchant(dec!(2.0));

    let result = ledger
        .processor
        .lend_funds_batch(&OperationContext::new(wallet));
    assert!(matches!(result, Err(DomainError::Unauthorized { .. })));
    assert!(ledger.venue.calls().is_empty());
}

#[test]
fn test_thresholds_are_owner_settable() {
    let mut ledger = Ledger::new();
    let owner = ledger.as_owner();
    let wallet = ledger.funded_merchant(dec!(2.0));

    ledger.processor.set_lending_threshold(&owner, dec!(5)).unwrap();
    assert!(matches!(
        ledger.processor.lend_funds_batch(&owner),
        Err(DomainError::ThresholdNotMet { .. })
    ));

    ledger.processor.set_retrieve_threshold(&owner, dec!(0.5)).unwrap();
    assert_eq!(
        ledger.processor.reserve().retrieve_threshold().value(),
        dec!(0.5)
    );

    assert!(matches!(
        ledger.processor.set_lending_threshold(&owner, dec!(-1)),
        Err(DomainError::InvalidAmount(_))
    ));
    assert!(matches!(
        ledger
            .processor
            .set_retrieve_threshold(&OperationContext::new(wallet), dec!(0)),
        Err(DomainError::Unauthorized { .. })
    ));
}

// =========================================================================
// Batch retrieval
// =========================================================================

#[test]
fn test_lend_then_retrieve_round_trip() {
    let mut ledger = Ledger::new();
    let owner = ledger.as_owner();
    ledger.funded_merchant(dec!(2.0));
    let on_hand_before = ledger.on_hand();

    let lent = ledger.processor.lend_funds_batch(&owner).unwrap();
    ledger.advance_hours(1);
    let retrieved = ledger
        .processor
        .retrieve_lent_funds_batch(&owner, lent)
        .unwrap();

    assert_eq!(retrieved, lent);
    assert_eq!(ledger.on_hand(), on_hand_before);
    assert_eq!(ledger.lent(), Decimal::ZERO);
    assert_eq!(
        ledger.log.events().last(),
        Some(&ProcessorEvent::FundsRetrievedFromAave { amount: dec!(1.9) })
    );
    assert_eq!(
        ledger.venue.calls().last(),
        Some(&VenueCall::Withdraw {
            caller: ledger.custody,
            amount: dec!(1.9),
            recipient: ledger.custody,
        })
    );
}

#[test]
fn test_retrieve_batch_rate_limited() {
    let mut ledger = Ledger::new();
    let owner = ledger.as_owner();
    ledger.funded_merchant(dec!(2.0));
    ledger.processor.lend_funds_batch(&owner).unwrap();

    ledger
        .processor
        .retrieve_lent_funds_batch(&owner, dec!(0.5))
        .unwrap();
    assert!(matches!(
        ledger.processor.retrieve_lent_funds_batch(&owner, dec!(0.5)),
        Err(DomainError::RateLimited { .. })
    ));

    ledger.advance_hours(1);
    ledger
        .processor
        .retrieve_lent_funds_batch(&owner, dec!(0.5))
        .unwrap();
    assert_eq!(ledger.lent(), dec!(0.9));
}

#[test]
fn test_retrieve_batch_below_threshold() {
    let mut ledger = Ledger::new();
    let owner = ledger.as_owner();
    ledger.funded_merchant(dec!(2.0));
    ledger.processor.lend_funds_batch(&owner).unwrap();

    assert_eq!(
        ledger.processor.retrieve_lent_funds_batch(&owner, dec!(0.05)),
        Err(DomainError::threshold_not_met(dec!(0.1), dec!(0.05)))
    );
}

#[test]
fn test_retrieve_batch_verification_failure() {
    let mut ledger = Ledger::new();
    let owner = ledger.as_owner();
    ledger.funded_merchant(dec!(2.0));
    ledger.processor.lend_funds_batch(&owner).unwrap();
    let before = ledger.processor.snapshot();

    ledger.venue.withhold_next_withdrawal();
    let result = ledger.processor.retrieve_lent_funds_batch(&owner, dec!(1.0));

    assert_eq!(
        result,
        Err(DomainError::RetrievalVerificationFailed {
            before: dec!(0.1),
            after: dec!(0.1),
        })
    );
    assert_eq!(ledger.processor.snapshot(), before);
}

#[test]
fn test_retrieve_batch_venue_failure() {
    let mut ledger = Ledger::new();
    let owner = ledger.as_owner();
    ledger.funded_merchant(dec!(2.0));
    ledger.processor.lend_funds_batch(&owner).unwrap();

    // More than the venue holds
    let result = ledger.processor.retrieve_lent_funds_batch(&owner, dec!(5.0));
    assert!(matches!(result, Err(DomainError::ExternalTransferFailed(_))));
    assert_eq!(ledger.lent(), dec!(1.9));
    assert_eq!(ledger.processor.reserve().last_retrieve_at(), None);
}

#[test]
fn test_retrieving_yield_floors_principal() {
    let mut ledger = Ledger::new();
    let owner = ledger.as_owner();
    ledger.funded_merchant(dec!(2.0));
    ledger.processor.lend_funds_batch(&owner).unwrap();
    ledger.venue.accrue(dec!(0.5));

    ledger
        .processor
        .retrieve_lent_funds_batch(&owner, dec!(2.4))
        .unwrap();

    assert_eq!(ledger.lent(), Decimal::ZERO);
    assert_eq!(ledger.on_hand(), dec!(2.5));
    ledger.assert_conserved();
}

// =========================================================================
// Merchant retrieval
// =========================================================================

#[test]
fn test_request_retrieve_ignores_gate_by_default() {
    let mut ledger = Ledger::new();
    let owner = ledger.as_owner();
    let wallet = ledger.funded_merchant(dec!(2.0));
    let merchant = OperationContext::new(wallet);
    ledger.processor.lend_funds_batch(&owner).unwrap();
    ledger
        .processor
        .retrieve_lent_funds_batch(&owner, dec!(0.4))
        .unwrap();
    let stamped = ledger.processor.reserve().last_retrieve_at();

    // Inside the owner's retrieval window, twice in a row
    ledger
        .processor
        .request_retrieve_funds(&merchant, dec!(0.5))
        .unwrap();
    ledger
        .processor
        .request_retrieve_funds(&merchant, dec!(0.5))
        .unwrap();

    assert_eq!(ledger.processor.reserve().last_retrieve_at(), stamped);
    assert_eq!(ledger.lent(), dec!(0.5));
    assert_eq!(ledger.on_hand(), dec!(1.5));
}

#[test]
fn test_request_retrieve_race_with_batch_lend() {
    let mut ledger = Ledger::new();
    let owner = ledger.as_owner();
    let wallet = ledger.funded_merchant(dec!(2.0));
    let merchant = OperationContext::new(wallet);
    ledger.processor.lend_funds_batch(&owner).unwrap();
    ledger.advance_hours(1);

    // The merchant pulls funds back to withdraw them...
    ledger
        .processor
        .request_retrieve_funds(&merchant, dec!(1.9))
        .unwrap();
    assert_eq!(ledger.on_hand(), dec!(2.0));

    // ...but a scheduled lend re-deposits them first
    ledger.processor.lend_funds_batch(&owner).unwrap();

    let result = ledger
        .processor
        .withdraw_funds(&merchant, Identity::random(), dec!(2.0));
    assert!(matches!(result, Err(DomainError::LiquidityShortfall { .. })));
}

#[test]
fn test_request_retrieve_gated_when_configured() {
    let mut ledger = Ledger::with_config(|config| config.merchant_retrieval_rate_gated = true);
    let owner = ledger.as_owner();
    let wallet = ledger.funded_merchant(dec!(2.0));
    let merchant = OperationContext::new(wallet);
    ledger.processor.lend_funds_batch(&owner).unwrap();

    ledger
        .processor
        .retrieve_lent_funds_batch(&owner, dec!(0.4))
        .unwrap();
    assert!(matches!(
        ledger.processor.request_retrieve_funds(&merchant, dec!(0.5)),
        Err(DomainError::RateLimited { .. })
    ));

    ledger.advance_hours(1);
    ledger
        .processor
        .request_retrieve_funds(&merchant, dec!(0.5))
        .unwrap();

    // The merchant retrieval closes the gate for the owner too
    assert_eq!(
        ledger.processor.reserve().last_retrieve_at(),
        Some(ledger.now())
    );
    assert!(matches!(
        ledger.processor.retrieve_lent_funds_batch(&owner, dec!(0.5)),
        Err(DomainError::RateLimited { .. })
    ));
}

#[test]
fn test_request_retrieve_merchant_only() {
    let mut ledger = Ledger::new();
    let owner = ledger.as_owner();
    let wallet = ledger.funded_merchant(dec!(2.0));
    ledger.processor.lend_funds_batch(&owner).unwrap();

    assert!(matches!(
        ledger.processor.request_retrieve_funds(&owner, dec!(1.0)),
        Err(DomainError::Unauthorized { .. })
    ));
    assert!(matches!(
        ledger
            .processor
            .request_retrieve_funds(&OperationContext::new(wallet), dec!(0.01)),
        Err(DomainError::ThresholdNotMet { .. })
    ));
    assert_eq!(ledger.lent(), dec!(1.9));
}

// =========================================================================
// Interest
// =========================================================================

#[test]
fn test_collect_interest() {
    let mut ledger = Ledger::new();
    let owner = ledger.as_owner();
    ledger.funded_merchant(dec!(2.0));

    assert_eq!(
        ledger.processor.collect_aave_interest(&owner),
        Err(DomainError::NoInterestAvailable)
    );

    ledger.processor.lend_funds_batch(&owner).unwrap();
    assert_eq!(
        ledger.processor.collect_aave_interest(&owner),
        Err(DomainError::NoInterestAvailable)
    );

    ledger.venue.accrue(dec!(0.05));
    let before = ledger.processor.snapshot();
    assert_eq!(ledger.processor.collect_aave_interest(&owner), Ok(dec!(0.05)));

    // Purely observational
    assert_eq!(ledger.processor.snapshot(), before);
}

// =========================================================================
// Emergency withdrawal
// =========================================================================

#[test]
fn test_emergency_withdraw_sweeps_on_hand() {
    let mut ledger = Ledger::new();
    let owner = ledger.as_owner();
    let wallet = ledger.funded_merchant(dec!(2.0));
    ledger.processor.lend_funds_batch(&owner).unwrap();

    let swept = ledger.processor.emergency_withdraw(&owner).unwrap();

    assert_eq!(swept, dec!(0.1));
    assert_eq!(ledger.on_hand(), Decimal::ZERO);
    assert_eq!(ledger.balance(&wallet), dec!(2.0));
    assert_eq!(ledger.gateway.total_delivered_to(ledger.owner), dec!(0.1));
    assert_eq!(
        ledger.gateway.delivered()[0].purpose,
        TransferPurpose::EmergencySweep
    );
    assert_eq!(
        ledger.log.events().last(),
        Some(&ProcessorEvent::EmergencyWithdrawalActivated { amount: dec!(0.1) })
    );

    assert_eq!(
        ledger.processor.emergency_withdraw(&owner),
        Err(DomainError::NoFundsAvailable)
    );
}

#[test]
fn test_emergency_withdraw_owner_only() {
    let mut ledger = Ledger::new();
    let wallet = ledger.funded_merchant(dec!(2.0));

    assert!(matches!(
        ledger
            .processor
            .emergency_withdraw(&OperationContext::new(wallet)),
        Err(DomainError::Unauthorized { .. })
    ));
    assert_eq!(ledger.on_hand(), dec!(2.0));
}
