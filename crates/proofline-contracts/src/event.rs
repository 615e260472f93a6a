//! Capture events and tombstones: the records that make up a ledger.
//!
//! Both record kinds are created once, signed once, and never mutated.  Each
//! carries its own digest (`eventHash` / `tombstoneHash`) computed over the
//! canonical bytes of every other field except the signature, and a signature
//! over that digest.  Field names on the wire are camelCase.
//!
//! Timestamps are kept as the exact strings that were signed.  Re-rendering
//! them through a date type would change the canonical bytes of records
//! produced by other implementations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Media kind of a captured asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Video,
}

/// Descriptor of the captured media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    /// Digest of the media bytes, rendered `sha256:<hex>`.
    pub asset_hash: String,
    /// Size of the media in bytes.
    pub asset_size: u64,
    /// MIME type, e.g. `image/jpeg`.
    pub mime_type: String,
    pub asset_type: AssetKind,
}

/// Record of the hardware-backed key that signed the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyAttestation {
    /// Base64 Ed25519 public key.  Covered by the event digest, so a verifier
    /// can detect a substituted key.
    pub public_key: String,
    /// Where the key lives, e.g. `secureEnclave`.
    pub attestation_type: String,
    /// Opaque platform attestation blob (base64), if the device produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation_data: Option<String>,
}

/// A recorded biometric-gate attempt bound to one capture.
///
/// This is an immutable record of an outcome, never a live capability:
/// verification only inspects what was recorded and never re-prompts.  No
/// biometric data is stored, only the boolean outcome and the method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanAttestation {
    pub verified: bool,
    /// Method used, e.g. `faceID`, `touchID`, `passcode`.
    pub method: String,
    /// When the authentication attempt happened.
    pub attempted_at: String,
    /// Milliseconds between the attempt and the capture instant.
    pub capture_offset_ms: i64,
    /// Nonce binding the attempt to this capture session.
    pub session_nonce: String,
}

/// Device and software context of a capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureContext {
    pub device_model: String,
    pub os_version: String,
    pub app_version: String,
    pub key_attestation: KeyAttestation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_attestation: Option<HumanAttestation>,
}

/// Geographic position recorded at capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal_accuracy: Option<f64>,
}

/// Sensor readings captured alongside the media.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerometer: Option<Vec<f64>>,
}

/// Camera configuration at capture time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens: Option<String>,
}

/// Signature over a record digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSignature {
    /// Signature algorithm label, `Ed25519`.
    pub algorithm: String,
    /// Base64 signature bytes.
    pub value: String,
}

/// One capture action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Time-sortable unique identifier (UUIDv7 in practice).
    pub event_id: String,
    /// Ledger this event belongs to.
    pub chain_id: String,
    /// Digest of the predecessor record, or empty / all-zero for the first.
    pub prev_hash: String,
    /// Capture instant, RFC 3339.
    pub timestamp: String,
    pub asset: AssetInfo,
    pub capture_context: CaptureContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_data: Option<SensorData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_settings: Option<CameraSettings>,
    /// Digest over every other field except `signature`.
    pub event_hash: String,
    pub signature: RecordSignature,
}

impl Event {
    /// Wire names of the fields excluded from the event digest.
    pub const UNSIGNED_FIELDS: [&'static str; 2] = ["eventHash", "signature"];

    /// The capture instant, if the stored string is valid RFC 3339.
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }

    /// The base64 public key recorded in the key attestation.
    pub fn attested_public_key(&self) -> &str {
        &self.capture_context.key_attestation.public_key
    }
}

/// Why an event was invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TombstoneReason {
    UserRequest,
    PrivacyRemoval,
    ErroneousCapture,
    Duplicate,
    LegalRequirement,
    Other,
}

/// Who initiated an invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TombstoneExecutor {
    User,
    System,
}

/// An immutable record that an event was invalidated without deletion.
///
/// Tombstones share the event hash chain: `prevHash` links to the chain head
/// at the time the tombstone was written, and the next event links to the
/// tombstone's own digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    pub tombstone_id: String,
    pub chain_id: String,
    pub target_event_id: String,
    /// Must equal the target event's `eventHash` exactly.
    pub target_event_hash: String,
    pub reason: TombstoneReason,
    pub executor: TombstoneExecutor,
    pub timestamp: String,
    pub prev_hash: String,
    /// Base64 public key of the signer.
    pub public_key: String,
    pub tombstone_hash: String,
    pub signature: RecordSignature,
}

impl Tombstone {
    /// Wire names of the fields excluded from the tombstone digest.
    pub const UNSIGNED_FIELDS: [&'static str; 2] = ["tombstoneHash", "signature"];

    pub fn invalidated_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
