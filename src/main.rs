//! custody_ledger - script runner
//!
//! Builds a processor from environment configuration, replays a JSON script
//! of operations against it and prints each outcome followed by the final
//! ledger snapshot.
//!
//! Usage: `custody_ledger [script.json]` (reads stdin when no path is given)

use std::io::Read;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use custody_ledger::audit::AuditChain;
use custody_ledger::clock::ManualClock;
use custody_ledger::config::LogFormat;
use custody_ledger::event_log::{FanoutSink, TracingEventSink};
use custody_ledger::transfer::RecordingGateway;
use custody_ledger::venue::AccruingVenue;
use custody_ledger::{
    AppError, AppResult, Command, Config, Identity, LedgerService, OperationContext,
    PaymentProcessor,
};

/// One scripted call
#[derive(Debug, Deserialize)]
struct Step {
    /// Caller identity, or `owner`
    caller: String,
    /// Seconds to move the clock forward before the call
    #[serde(default)]
    advance_secs: Option<i64>,
    #[serde(flatten)]
    command: Command,
}

/// Initialize tracing/logging
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "custody_ledger=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

fn load_script() -> AppResult<Vec<Step>> {
    let raw = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            raw
        }
    };

    Ok(serde_json::from_str(&raw)?)
}

fn resolve_caller(caller: &str, owner: Identity) -> AppResult<Identity> {
    if caller == "owner" {
        return Ok(owner);
    }
    caller
        .parse()
        .map_err(|_| AppError::Script(format!("invalid caller identity: {}", caller)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.log_format);

    tracing::info!(environment = %config.environment, "Starting custody ledger");

    let steps = load_script()?;

    let clock = ManualClock::new(Utc::now());
    let audit = AuditChain::new();
    let venue = AccruingVenue::new(
        config.custody_identity,
        config.venue_annual_rate_bps,
        Arc::new(clock.clone()),
    );
    let events = FanoutSink::new()
        .with(TracingEventSink)
        .with(audit.clone());

    let service = LedgerService::new(PaymentProcessor::new(
        config.processor_config(),
        venue,
        RecordingGateway::new(),
        Arc::new(clock.clone()),
        events,
    ));

    for (index, step) in steps.into_iter().enumerate() {
        if let Some(secs) = step.advance_secs {
            if secs < 0 {
                return Err(AppError::Script(format!("step {}: negative advance_secs", index)).into());
            }
            clock.advance(Duration::seconds(secs));
        }

        let caller = resolve_caller(&step.caller, config.owner)?;
        let op = step.command.name();
        let line = match service
            .execute(&OperationContext::new(caller), step.command)
            .await
        {
            Ok(outcome) => json!({ "step": index, "op": op, "result": outcome }),
            Err(e) => json!({ "step": index, "op": op, "error": e.to_string() }),
        };
        println!("{}", line);
    }

    let snapshot = service.snapshot().await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    let verification = audit.verify();
    if !verification.is_valid {
        tracing::error!(
            first_invalid_sequence = ?verification.first_invalid_sequence,
            "Audit chain verification failed"
        );
        return Err(anyhow::anyhow!("audit chain verification failed"));
    }
    tracing::info!(
        entries = verification.entries_checked,
        head = %audit.head(),
        "Audit chain verified"
    );

    Ok(())
}
