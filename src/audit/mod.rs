//! Audit Chain
//!
//! Tamper-evident record of every published processor event. Each entry
//! commits to its predecessor through a SHA-256 hash chain.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::domain::RecordedEvent;
use crate::event_log::EventSink;

const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Audit chain entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub sequence: u64,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub previous_hash: String,
    pub current_hash: String,
}

impl AuditEntry {
    fn compute_hash(sequence: u64, event_type: &str, payload: &serde_json::Value, previous_hash: &str) -> String {
        sha256_hex(&format!("{}{}{}{}", sequence, event_type, payload, previous_hash))
    }
}

/// Result of hash chain verification
#[derive(Debug, Clone, PartialEq)]
pub struct ChainVerificationResult {
    pub is_valid: bool,
    pub entries_checked: u64,
    pub first_invalid_sequence: Option<u64>,
    pub expected_hash: Option<String>,
    pub actual_hash: Option<String>,
}

impl ChainVerificationResult {
    fn valid(entries_checked: u64) -> Self {
        Self {
            is_valid: true,
            entries_checked,
            first_invalid_sequence: None,
            expected_hash: None,
            actual_hash: None,
        }
    }

    fn broken(entries_checked: u64, sequence: u64, expected: String, actual: String) -> Self {
        Self {
            is_valid: false,
            entries_checked,
            first_invalid_sequence: Some(sequence),
            expected_hash: Some(expected),
            actual_hash: Some(actual),
        }
    }
}

/// Hash-chained event sink. Clones share the same chain.
#[derive(Debug, Clone, Default)]
pub struct AuditChain {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl AuditChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<AuditEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.guard().clone()
    }

    /// Hash of the newest entry (genesis hash when empty)
    pub fn head(&self) -> String {
        self.guard()
            .last()
            .map(|entry| entry.current_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string())
    }

    /// Verify the integrity of the chain
    pub fn verify(&self) -> ChainVerificationResult {
        let entries = self.guard();
        let mut previous_hash = GENESIS_HASH.to_string();

        for (checked, entry) in entries.iter().enumerate() {
            let checked = checked as u64 + 1;

            if entry.previous_hash != previous_hash {
                return ChainVerificationResult::broken(
                    checked,
                    entry.sequence,
                    previous_hash,
                    entry.previous_hash.clone(),
                );
            }

            let calculated = AuditEntry::compute_hash(
                entry.sequence,
                &entry.event_type,
                &entry.payload,
                &entry.previous_hash,
            );
            if calculated != entry.current_hash {
                return ChainVerificationResult::broken(
                    checked,
                    entry.sequence,
                    calculated,
                    entry.current_hash.clone(),
                );
            }

            previous_hash = entry.current_hash.clone();
        }

        ChainVerificationResult::valid(entries.len() as u64)
    }
}

impl EventSink for AuditChain {
    fn publish(&mut self, event: RecordedEvent) {
        let payload = match serde_json::to_value(&event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(sequence = event.sequence, error = %e, "Failed to serialize audited event");
                return;
            }
        };

        let mut entries = self.guard();
        let previous_hash = entries
            .last()
            .map(|entry| entry.current_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        let event_type = event.event.event_type().to_string();
        let current_hash = AuditEntry::compute_hash(event.sequence, &event_type, &payload, &previous_hash);

        tracing::debug!(sequence = event.sequence, hash = %current_hash, "Audit entry appended");

        entries.push(AuditEntry {
            sequence: event.sequence,
            event_type,
            payload,
            previous_hash,
            current_hash,
        });
    }
}

/// Calculate SHA-256 hash and return as hex string
fn sha256_hex(input: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
