//! The normalized in-memory shape of a parsed proof document.
//!
//! Two wire variants exist (a full one and a minimal, shareable one).  Only the
//! parser knows about them; everything downstream works on `ParsedProof`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    anchor::Anchor,
    event::{AssetKind, CameraSettings, HumanAttestation, Location, Tombstone},
};

/// Which wire variant a proof was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WireVariant {
    /// Redacted, shareable form carrying the raw pre-signature event bytes.
    Minimal,
    /// Complete form exposing every event field.
    Full,
}

impl fmt::Display for WireVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireVariant::Minimal => f.write_str("minimal"),
            WireVariant::Full => f.write_str("full"),
        }
    }
}

/// Where the pre-signature event bytes came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    /// Carried verbatim in the document (minimal variant).
    Carried(Vec<u8>),
    /// Rebuilt by canonicalizing the structured event (full variant).
    Reconstructed(Vec<u8>),
    /// The document should have carried the bytes but did not.
    Missing,
}

impl RawEvent {
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            RawEvent::Carried(b) | RawEvent::Reconstructed(b) => Some(b),
            RawEvent::Missing => None,
        }
    }
}

/// Event fields carried outside the signed bytes, for display and
/// cross-checking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventSummary {
    pub event_id: String,
    pub timestamp: String,
    pub asset_hash: String,
    pub asset_type: Option<AssetKind>,
    pub mime_type: Option<String>,
    pub camera: Option<CameraSettings>,
    pub flash_mode: Option<String>,
    pub device_model: Option<String>,
    pub location: Option<Location>,
}

/// Human-attestation information as exposed by either variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttestationInfo {
    /// True when the capture was gated by a successful biometric attempt.
    pub human_attested: bool,
    /// Full record, only available from the full variant.
    pub record: Option<HumanAttestation>,
}

/// A proof document normalized from either wire variant.
#[derive(Debug, Clone)]
pub struct ParsedProof {
    pub variant: WireVariant,
    pub proof_version: Option<String>,
    pub summary: EventSummary,
    pub raw_event: RawEvent,
    /// The structured event, for the full variant.
    pub event: Option<Value>,
    /// Digest the document claims for the event.  Never trusted for
    /// signature verification.
    pub claimed_event_hash: String,
    /// Algorithm label carried next to the signature.
    pub signature_algorithm: Option<String>,
    pub signature: Option<Vec<u8>>,
    /// Key carried at document level.
    pub public_key: Option<Vec<u8>>,
    /// Key recorded inside the signed event (full variant only).
    pub attested_public_key: Option<Vec<u8>>,
    pub anchor: Option<Anchor>,
    pub attestation: AttestationInfo,
    pub signer_name: Option<String>,
    pub tombstone: Option<Tombstone>,
}

impl ParsedProof {
    /// The key signature verification should use: the attested key when the
    /// event carries one, otherwise the document-level key.
    pub fn verification_key(&self) -> Option<&[u8]> {
        self.attested_public_key
            .as_deref()
            .or(self.public_key.as_deref())
    }
}
