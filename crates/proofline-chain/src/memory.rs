//! In-memory ledger writer.
//!
//! `InMemoryLedger` appends events and tombstones to one chain, filling in
//! `prevHash`, the record digest and the signature.  Signing is delegated to
//! an [`EventSigner`], so the key never has to live in this process.
//!
//! Use `export()` to obtain a [`Ledger`] for storage or for the walker, and
//! `verify_integrity()` to walk what has been written so far.

use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};
use uuid::Uuid;

use proofline_contracts::{
    chain::{ChainIntegrityReport, Ledger},
    error::{ProoflineError, ProoflineResult},
    event::{
        AssetInfo, CameraSettings, CaptureContext, Event, RecordSignature, SensorData, Tombstone,
        TombstoneExecutor, TombstoneReason,
    },
};
use proofline_core::{
    record::{event_digest, tombstone_digest},
    signature::encode_base64,
    traits::EventSigner,
};

use crate::walker::verify_ledger;

// ── Drafts ────────────────────────────────────────────────────────────────────

/// The caller-supplied part of a new event.  Identifier, chain, link, digest
/// and signature are filled by the ledger; the key attestation's public key
/// is overwritten with the signer's key.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub timestamp: String,
    pub asset: AssetInfo,
    pub capture_context: CaptureContext,
    pub sensor_data: Option<SensorData>,
    pub camera_settings: Option<CameraSettings>,
}

// ── Internal mutable state ────────────────────────────────────────────────────

struct LedgerState {
    events: Vec<Event>,
    tombstones: Vec<Tombstone>,
    /// Digest of the last record written, event or tombstone.  Empty before
    /// the first record.
    head: String,
}

// ── Public writer ─────────────────────────────────────────────────────────────

/// An append-only, single-chain ledger held in memory.
///
/// # Thread safety
///
/// Appends take an internal `Mutex`, so one ledger may be shared between
/// capture threads.
pub struct InMemoryLedger {
    chain_id: String,
    signer: Box<dyn EventSigner>,
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(chain_id: impl Into<String>, signer: Box<dyn EventSigner>) -> Self {
        Self {
            chain_id: chain_id.into(),
            signer,
            state: Mutex::new(LedgerState {
                events: Vec::new(),
                tombstones: Vec::new(),
                head: String::new(),
            }),
        }
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Digest of the most recent record, or empty for an empty ledger.
    pub fn head(&self) -> String {
        self.read().head.clone()
    }

    /// Append one event after the current head.
    pub fn append_event(&self, draft: EventDraft) -> ProoflineResult<Event> {
        let mut state = self.write()?;

        let mut capture_context = draft.capture_context;
        capture_context.key_attestation.public_key = encode_base64(&self.signer.public_key());

        let mut event = Event {
            event_id: Uuid::now_v7().to_string(),
            chain_id: self.chain_id.clone(),
            prev_hash: state.head.clone(),
            timestamp: draft.timestamp,
            asset: draft.asset,
            capture_context,
            sensor_data: draft.sensor_data,
            camera_settings: draft.camera_settings,
            event_hash: String::new(),
            signature: unsigned(),
        };
        let digest = event_digest(&event)?;
        event.event_hash = digest.to_string();
        event.signature = RecordSignature {
            algorithm: self.signer.algorithm().to_string(),
            value: encode_base64(&self.signer.sign_digest(&digest)?),
        };

        state.head = event.event_hash.clone();
        state.events.push(event.clone());

        debug!(
            chain_id = %self.chain_id,
            event_id = %event.event_id,
            event_hash = %event.event_hash,
            "event appended"
        );
        Ok(event)
    }

    /// Invalidate an event already in this ledger.  The event itself is kept.
    pub fn invalidate(
        &self,
        target_event_id: &str,
        reason: TombstoneReason,
        executor: TombstoneExecutor,
        timestamp: impl Into<String>,
    ) -> ProoflineResult<Tombstone> {
        let mut state = self.write()?;

        let target_event_hash = state
            .events
            .iter()
            .find(|e| e.event_id == target_event_id)
            .map(|e| e.event_hash.clone())
            .ok_or_else(|| ProoflineError::LedgerWrite {
                reason: format!("no event '{target_event_id}' in chain '{}'", self.chain_id),
            })?;
        if state
            .tombstones
            .iter()
            .any(|t| t.target_event_id == target_event_id)
        {
            return Err(ProoflineError::LedgerWrite {
                reason: format!("event '{target_event_id}' is already invalidated"),
            });
        }

        let mut tombstone = Tombstone {
            tombstone_id: Uuid::now_v7().to_string(),
            chain_id: self.chain_id.clone(),
            target_event_id: target_event_id.to_string(),
            target_event_hash,
            reason,
            executor,
            timestamp: timestamp.into(),
            prev_hash: state.head.clone(),
            public_key: encode_base64(&self.signer.public_key()),
            tombstone_hash: String::new(),
            signature: unsigned(),
        };
        let digest = tombstone_digest(&tombstone)?;
        tombstone.tombstone_hash = digest.to_string();
        tombstone.signature = RecordSignature {
            algorithm: self.signer.algorithm().to_string(),
            value: encode_base64(&self.signer.sign_digest(&digest)?),
        };

        state.head = tombstone.tombstone_hash.clone();
        state.tombstones.push(tombstone.clone());

        info!(
            chain_id = %self.chain_id,
            target_event_id,
            tombstone_id = %tombstone.tombstone_id,
            "event invalidated"
        );
        Ok(tombstone)
    }

    /// A snapshot of everything written so far.
    pub fn export(&self) -> Ledger {
        let state = self.read();
        Ledger {
            events: state.events.clone(),
            tombstones: state.tombstones.clone(),
            ..Ledger::new(self.chain_id.clone())
        }
    }

    /// Walk the ledger as written, pinned to the signer's key.
    pub fn verify_integrity(&self) -> ChainIntegrityReport {
        let key = self.signer.public_key();
        verify_ledger(&self.export(), Some(&key))
    }

    fn write(&self) -> ProoflineResult<MutexGuard<'_, LedgerState>> {
        self.state.lock().map_err(|e| ProoflineError::LedgerWrite {
            reason: format!("ledger state lock poisoned: {e}"),
        })
    }

    /// Readers see the last consistent state even after a panicked writer.
    fn read(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn unsigned() -> RecordSignature {
    RecordSignature {
        algorithm: String::new(),
        value: String::new(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
