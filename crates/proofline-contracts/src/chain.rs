//! Ledgers and chain-integrity reports.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{ProoflineError, ProoflineResult},
    event::{Event, Tombstone},
};

/// All records of one chain identifier, in ledger order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    pub chain_id: String,
    pub events: Vec<Event>,
    #[serde(default)]
    pub tombstones: Vec<Tombstone>,
    /// The records exactly as read, when the ledger came from storage.
    #[serde(skip)]
    pub stored: StoredRecords,
}

/// Stored JSON of each record, parallel to `Ledger::events` and
/// `Ledger::tombstones`.  Record digests are computed over these values, so
/// explicit nulls and fields this crate does not model stay covered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredRecords {
    pub events: Vec<Value>,
    pub tombstones: Vec<Value>,
}

impl Ledger {
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            events: Vec::new(),
            tombstones: Vec::new(),
            stored: StoredRecords::default(),
        }
    }

    /// The stored form of event `index`, when every event has one.
    pub fn stored_event(&self, index: usize) -> Option<&Value> {
        if self.stored.events.len() != self.events.len() {
            return None;
        }
        self.stored.events.get(index)
    }

    /// The stored form of tombstone `index`, when every tombstone has one.
    pub fn stored_tombstone(&self, index: usize) -> Option<&Value> {
        if self.stored.tombstones.len() != self.tombstones.len() {
            return None;
        }
        self.stored.tombstones.get(index)
    }

    /// Like [`Ledger::partition`], for records read as raw JSON.  Each ledger
    /// keeps the stored value of every record next to its typed form.
    pub fn partition_stored(
        events: Vec<Value>,
        tombstones: Vec<Value>,
    ) -> ProoflineResult<Vec<Ledger>> {
        let mut chains: BTreeMap<String, Ledger> = BTreeMap::new();
        for (index, raw) in events.into_iter().enumerate() {
            let event: Event = serde_json::from_value(raw.clone()).map_err(|e| {
                ProoflineError::Parse {
                    reason: format!("ledger event {index}: {e}"),
                }
            })?;
            let ledger = chains
                .entry(event.chain_id.clone())
                .or_insert_with(|| Ledger::new(event.chain_id.clone()));
            ledger.events.push(event);
            ledger.stored.events.push(raw);
        }
        for (index, raw) in tombstones.into_iter().enumerate() {
            let tombstone: Tombstone = serde_json::from_value(raw.clone()).map_err(|e| {
                ProoflineError::Parse {
                    reason: format!("ledger tombstone {index}: {e}"),
                }
            })?;
            let ledger = chains
                .entry(tombstone.chain_id.clone())
                .or_insert_with(|| Ledger::new(tombstone.chain_id.clone()));
            ledger.tombstones.push(tombstone);
            ledger.stored.tombstones.push(raw);
        }
        Ok(chains.into_values().collect())
    }

    /// Group mixed records into one ledger per chain identifier, preserving
    /// the relative order of records within each chain.  Chains come out
    /// sorted by identifier.
    pub fn partition(events: Vec<Event>, tombstones: Vec<Tombstone>) -> Vec<Ledger> {
        let mut chains: BTreeMap<String, Ledger> = BTreeMap::new();
        for event in events {
            chains
                .entry(event.chain_id.clone())
                .or_insert_with(|| Ledger::new(event.chain_id.clone()))
                .events
                .push(event);
        }
        for tombstone in tombstones {
            chains
                .entry(tombstone.chain_id.clone())
                .or_insert_with(|| Ledger::new(tombstone.chain_id.clone()))
                .tombstones
                .push(tombstone);
        }
        chains.into_values().collect()
    }
}

/// Typed chain-integrity finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChainIssueCode {
    PrevHashMismatch,
    EventHashMismatch,
    SignatureInvalid,
    TombstoneTargetMismatch,
    OrphanedTombstone,
    TimestampAnomaly,
    DeletedEventGap,
    ChainIdMismatch,
}

impl ChainIssueCode {
    /// Severity is fixed per code.
    pub fn severity(&self) -> Severity {
        match self {
            ChainIssueCode::TimestampAnomaly | ChainIssueCode::DeletedEventGap => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Which kind of record an issue concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Event,
    Tombstone,
}

/// One finding, tagged with where it was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainIssue {
    pub code: ChainIssueCode,
    pub severity: Severity,
    pub record: RecordKind,
    /// Position in the ledger's event or tombstone list.
    pub index: usize,
    /// Identifier of the record concerned.
    pub record_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    pub message: String,
}

/// Result of walking one ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainIntegrityReport {
    pub chain_id: String,
    pub events_checked: usize,
    pub tombstones_checked: usize,
    /// Events that are the verified target of a tombstone.
    pub invalidated_events: usize,
    pub issues: Vec<ChainIssue>,
    /// No errors and no warnings.
    pub valid: bool,
    /// No errors; warnings allowed.
    pub valid_ignoring_warnings: bool,
}

impl ChainIntegrityReport {
    pub fn errors(&self) -> impl Iterator<Item = &ChainIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ChainIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// Issues carrying `code`.
    pub fn issues_with(&self, code: ChainIssueCode) -> Vec<&ChainIssue> {
        self.issues.iter().filter(|i| i.code == code).collect()
    }
}
