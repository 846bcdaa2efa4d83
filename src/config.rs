//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;

use chrono::Duration;
use rust_decimal::Decimal;

use crate::domain::{Balance, Identity};

const DEFAULT_LENDING_THRESHOLD: &str = "1";
const DEFAULT_RETRIEVE_THRESHOLD: &str = "0.1";
const DEFAULT_RESERVE_MARGIN: &str = "0.1";
const DEFAULT_RATE_WINDOW_SECS: i64 = 60 * 60;
const DEFAULT_VENUE_ANNUAL_RATE_BPS: u32 = 300;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Owner identity (immutable for the life of the processor)
    pub owner: Identity,

    /// Identity the processor itself uses towards the lending venue
    pub custody_identity: Identity,

    /// Minimum on-hand surplus (above the reserve margin) before lending
    pub lending_threshold: Balance,

    /// Minimum amount a retrieval may request
    pub retrieve_threshold: Balance,

    /// Amount always left on hand when lending
    pub reserve_margin: Balance,

    /// Rate gate window in seconds
    pub rate_window_secs: i64,

    /// Make merchant retrievals honour the batch retrieval gate
    pub merchant_retrieval_rate_gated: bool,

    /// Annual rate of the in-process lending venue, in basis points
    pub venue_annual_rate_bps: u32,

    /// Environment (development, production)
    pub environment: String,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let owner = lookup("OWNER_IDENTITY")
            .ok_or(ConfigError::MissingEnv("OWNER_IDENTITY"))?
            .parse::<Identity>()
            .map_err(|_| ConfigError::InvalidValue("OWNER_IDENTITY"))?;

        let custody_identity = match lookup("CUSTODY_IDENTITY") {
            Some(raw) => raw
                .parse::<Identity>()
                .map_err(|_| ConfigError::InvalidValue("CUSTODY_IDENTITY"))?,
            None => Identity::random(),
        };

        let lending_threshold =
            parse_balance(&lookup, "LENDING_THRESHOLD", DEFAULT_LENDING_THRESHOLD)?;
        let retrieve_threshold =
            parse_balance(&lookup, "RETRIEVE_THRESHOLD", DEFAULT_RETRIEVE_THRESHOLD)?;
        let reserve_margin = parse_balance(&lookup, "RESERVE_MARGIN", DEFAULT_RESERVE_MARGIN)?;

        let rate_window_secs = lookup("RATE_WINDOW_SECS")
            .map(|raw| raw.parse::<i64>())
            .transpose()
            .map_err(|_| ConfigError::InvalidValue("RATE_WINDOW_SECS"))?
            .unwrap_or(DEFAULT_RATE_WINDOW_SECS);
        if rate_window_secs < 0 {
            return Err(ConfigError::InvalidValue("RATE_WINDOW_SECS"));
        }

        let merchant_retrieval_rate_gated = lookup("MERCHANT_RETRIEVAL_RATE_GATED")
            .map(|raw| raw.parse::<bool>())
            .transpose()
            .map_err(|_| ConfigError::InvalidValue("MERCHANT_RETRIEVAL_RATE_GATED"))?
            .unwrap_or(false);

        let venue_annual_rate_bps = lookup("VENUE_ANNUAL_RATE_BPS")
            .map(|raw| raw.parse::<u32>())
            .transpose()
            .map_err(|_| ConfigError::InvalidValue("VENUE_ANNUAL_RATE_BPS"))?
            .unwrap_or(DEFAULT_VENUE_ANNUAL_RATE_BPS);

        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(_) => return Err(ConfigError::InvalidValue("LOG_FORMAT")),
        };

        Ok(Self {
            owner,
            custody_identity,
            lending_threshold,
            retrieve_threshold,
            reserve_margin,
            rate_window_secs,
            merchant_retrieval_rate_gated,
            venue_annual_rate_bps,
            environment,
            log_format,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Settings the processor is constructed with
    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            owner: self.owner,
            custody_identity: self.custody_identity,
            lending_threshold: self.lending_threshold,
            retrieve_threshold: self.retrieve_threshold,
            reserve_margin: self.reserve_margin,
            rate_window: Duration::seconds(self.rate_window_secs),
            merchant_retrieval_rate_gated: self.merchant_retrieval_rate_gated,
        }
    }
}

fn parse_balance<F>(lookup: &F, key: &'static str, default: &str) -> Result<Balance, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    let value = Decimal::from_str(&raw).map_err(|_| ConfigError::InvalidValue(key))?;
    Balance::new(value).map_err(|_| ConfigError::InvalidValue(key))
}

/// Processor settings
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub owner: Identity,
    pub custody_identity: Identity,
    pub lending_threshold: Balance,
    pub retrieve_threshold: Balance,
    pub reserve_margin: Balance,
    pub rate_window: Duration,
    pub merchant_retrieval_rate_gated: bool,
}

impl ProcessorConfig {
    /// Settings with the default thresholds, margin and a one hour window
    pub fn new(owner: Identity) -> Self {
        let default = |raw: &str| {
            Decimal::from_str(raw)
                .ok()
                .and_then(|value| Balance::new(value).ok())
                .unwrap_or_default()
        };

        Self {
            owner,
            custody_identity: Identity::random(),
            lending_threshold: default(DEFAULT_LENDING_THRESHOLD),
            retrieve_threshold: default(DEFAULT_RETRIEVE_THRESHOLD),
            reserve_margin: default(DEFAULT_RESERVE_MARGIN),
            rate_window: Duration::seconds(DEFAULT_RATE_WINDOW_SECS),
            merchant_retrieval_rate_gated: false,
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    const OWNER: &str = "6f1c2b7e-3a51-4c39-9a8e-0d4f52f1b0aa";

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("OWNER_IDENTITY", OWNER)]).unwrap();

        assert_eq!(config.owner.to_string(), OWNER);
        assert_eq!(config.lending_threshold.value(), dec!(1));
        assert_eq!(config.retrieve_threshold.value(), dec!(0.1));
        assert_eq!(config.reserve_margin.value(), dec!(0.1));
        assert_eq!(config.rate_window_secs, 3600);
        assert!(!config.merchant_retrieval_rate_gated);
        assert_eq!(config.venue_annual_rate_bps, 300);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(!config.is_production());
    }

    #[test]
    fn test_missing_owner() {
        assert!(matches!(
            load(&[]),
            Err(ConfigError::MissingEnv("OWNER_IDENTITY"))
        ));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("OWNER_IDENTITY", "nope")]),
            Err(ConfigError::InvalidValue("OWNER_IDENTITY"))
        ));
        assert!(matches!(
            load(&[("OWNER_IDENTITY", OWNER), ("RESERVE_MARGIN", "-1")]),
            Err(ConfigError::InvalidValue("RESERVE_MARGIN"))
        ));
        assert!(matches!(
            load(&[("OWNER_IDENTITY", OWNER), ("RATE_WINDOW_SECS", "-5")]),
            Err(ConfigError::InvalidValue("RATE_WINDOW_SECS"))
        ));
        assert!(matches!(
            load(&[("OWNER_IDENTITY", OWNER), ("LOG_FORMAT", "xml")]),
            Err(ConfigError::InvalidValue("LOG_FORMAT"))
        ));
    }

    #[test]
    fn test_overrides_flow_into_processor_config() {
        let config = load(&[
            ("OWNER_IDENTITY", OWNER),
            ("LENDING_THRESHOLD", "5"),
            ("RATE_WINDOW_SECS", "60"),
            ("MERCHANT_RETRIEVAL_RATE_GATED", "true"),
            ("ENVIRONMENT", "production"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert!(config.is_production());
        assert_eq!(config.log_format, LogFormat::Json);

        let processor = config.processor_config();
        assert_eq!(processor.lending_threshold.value(), dec!(5));
        assert_eq!(processor.rate_window, Duration::seconds(60));
        assert!(processor.merchant_retrieval_rate_gated);
    }

    #[test]
    fn test_processor_config_defaults() {
        let owner = Identity::random();
        let config = ProcessorConfig::new(owner);
        assert_eq!(config.owner, owner);
        assert_eq!(config.lending_threshold.value(), dec!(1));
        assert_eq!(config.rate_window, Duration::hours(1));
    }
}
