//! Common test utilities
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use custody_ledger::audit::AuditChain;
use custody_ledger::clock::{Clock, ManualClock};
use custody_ledger::event_log::{FanoutSink, InMemoryEventLog};
use custody_ledger::transfer::RecordingGateway;
use custody_ledger::venue::ScriptedVenue;
use custody_ledger::{Identity, OperationContext, PaymentProcessor, ProcessorConfig};

/// Processor wired to inspectable doubles
pub struct Ledger {
    pub processor: PaymentProcessor,
    pub owner: Identity,
    pub custody: Identity,
    pub clock: ManualClock,
    pub venue: ScriptedVenue,
    pub gateway: RecordingGateway,
    pub log: InMemoryEventLog,
    pub audit: AuditChain,
}

impl Ledger {
    /// Default settings: lending threshold 1.0, retrieve threshold 0.1,
    /// reserve margin 0.1, one hour rate window
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut ProcessorConfig)) -> Self {
        let owner = Identity::random();
        let mut config = ProcessorConfig::new(owner);
        adjust(&mut config);
        let custody = config.custody_identity;

        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
        let venue = ScriptedVenue::new();
        let gateway = RecordingGateway::new();
        let log = InMemoryEventLog::new();
        let audit = AuditChain::new();

        let processor = PaymentProcessor::new(
            config,
            venue.clone(),
            gateway.clone(),
            Arc::new(clock.clone()),
            FanoutSink::new().with(log.clone()).with(audit.clone()),
        );

        Self {
            processor,
            owner,
            custody,
            clock,
            venue,
            gateway,
            log,
            audit,
        }
    }

    pub fn as_owner(&self) -> OperationContext {
        OperationContext::new(self.owner)
    }

    /// Register a merchant with a fresh custodial identity
    pub fn register(&mut self, name: &str) -> Identity {
        let wallet = Identity::random();
        let ctx = self.as_owner();
        self.processor
            .register_merchant(&ctx, name.to_string(), wallet)
            .expect("Failed to register merchant");
        wallet
    }

    /// Register a merchant and pay it `amount` from a random customer
    pub fn funded_merchant(&mut self, amount: Decimal) -> Identity {
        let wallet = self.register("Test Merchant");
        self.pay(wallet, amount);
        wallet
    }

    pub fn pay(&mut self, merchant: Identity, amount: Decimal) {
        self.processor
            .process_payment(&OperationContext::new(Identity::random()), merchant, amount)
            .expect("Failed to process payment");
    }

    pub fn balance(&self, merchant: &Identity) -> Decimal {
        self.processor
            .merchant(merchant)
            .map(|m| m.balance().value())
            .unwrap_or_default()
    }

    pub fn on_hand(&self) -> Decimal {
        self.processor.reserve().on_hand().value()
    }

    pub fn lent(&self) -> Decimal {
        self.processor.reserve().lent_principal().value()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn advance_hours(&self, hours: i64) {
        self.clock.advance(Duration::hours(hours));
    }

    /// Merchant balances are backed by custody
    pub fn assert_conserved(&self) {
        let snapshot = self.processor.snapshot();
        assert!(
            snapshot.is_conserved(),
            "merchant balances {} exceed custody {}",
            snapshot.total_merchant_balance,
            snapshot.custody_total
        );
    }
}
