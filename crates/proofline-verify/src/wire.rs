//! Wire shapes of the two proof document variants.
//!
//! Only the parser uses these types.  The minimal ("shareable") variant uses
//! snake_case field names and carries the signed event as raw bytes; the full
//! variant uses camelCase and embeds the complete event record.

use serde::Deserialize;
use serde_json::{json, Value};

use proofline_contracts::event::{AssetKind, RecordSignature, Tombstone};

// ── Minimal variant ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MinimalProof {
    #[serde(default)]
    pub proof_version: Option<String>,
    #[serde(default)]
    pub proof_type: Option<String>,
    pub event: MinimalEvent,
    /// Base64 canonical pre-signature event bytes.
    #[serde(default)]
    pub raw_event: Option<String>,
    pub event_hash: String,
    pub signature: RecordSignature,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub anchor: Option<MinimalAnchor>,
    #[serde(default)]
    pub human_attested: bool,
    #[serde(default)]
    pub tombstone: Option<Tombstone>,
}

#[derive(Debug, Deserialize)]
pub struct MinimalEvent {
    pub event_id: String,
    pub timestamp: String,
    pub asset_hash: String,
    #[serde(default)]
    pub asset_type: Option<AssetKind>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub camera: Option<MinimalCamera>,
    #[serde(default)]
    pub location: Option<MinimalLocation>,
}

#[derive(Debug, Deserialize)]
pub struct MinimalCamera {
    #[serde(default)]
    pub flash_mode: Option<String>,
    #[serde(default)]
    pub iso: Option<u32>,
    #[serde(default)]
    pub focal_length: Option<f64>,
    #[serde(default)]
    pub exposure_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct MinimalLocation {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinimalGranularity {
    MerkleRoot,
    EventHash,
}

#[derive(Debug, Deserialize)]
pub struct MinimalAnchor {
    pub granularity: MinimalGranularity,
    #[serde(default)]
    pub merkle_root: Option<String>,
    #[serde(default)]
    pub merkle_proof: Vec<String>,
    #[serde(default)]
    pub merkle_index: Option<u64>,
    #[serde(default)]
    pub tree_size: Option<u64>,
    pub tsa_token: String,
    #[serde(default)]
    pub tsa_service: Option<String>,
    #[serde(default)]
    pub tsa_time: Option<String>,
}

// ── Full variant ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullProof {
    #[serde(default)]
    pub proof_version: Option<String>,
    #[serde(default)]
    pub proof_type: Option<String>,
    /// Kept as parsed JSON so the digest is recomputed from exactly what was
    /// received.
    pub event: Value,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub anchor: Option<FullAnchor>,
    #[serde(default)]
    pub signer: Option<SignerInfo>,
    #[serde(default)]
    pub tombstone: Option<Tombstone>,
}

#[derive(Debug, Deserialize)]
pub struct SignerInfo {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FullGranularity {
    MerkleRoot,
    EventHash,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullAnchor {
    pub granularity: FullGranularity,
    #[serde(default)]
    pub merkle_root: Option<String>,
    #[serde(default)]
    pub merkle_proof: Vec<String>,
    #[serde(default)]
    pub merkle_index: Option<u64>,
    #[serde(default)]
    pub tree_size: Option<u64>,
    pub tsa_token: String,
    #[serde(default)]
    pub tsa_service: Option<String>,
    #[serde(default)]
    pub tsa_time: Option<String>,
}

// ── Schemas ───────────────────────────────────────────────────────────────────

/// Structural schema of the minimal variant.
pub fn minimal_schema() -> Value {
    json!({
        "type": "object",
        "required": ["event", "event_hash", "signature"],
        "properties": {
            "proof_version": { "type": "string" },
            "proof_type": { "type": "string" },
            "event": {
                "type": "object",
                "required": ["event_id", "timestamp", "asset_hash"],
                "properties": {
                    "event_id": { "type": "string" },
                    "timestamp": { "type": "string" },
                    "asset_hash": { "type": "string" },
                    "asset_type": { "enum": ["image", "video"] },
                    "mime_type": { "type": "string" },
                    "camera": { "type": "object" },
                    "location": {
                        "type": "object",
                        "required": ["latitude", "longitude"]
                    }
                }
            },
            "raw_event": { "type": "string" },
            "event_hash": { "type": "string" },
            "signature": {
                "type": "object",
                "required": ["algorithm", "value"],
                "properties": {
                    "algorithm": { "type": "string" },
                    "value": { "type": "string" }
                }
            },
            "public_key": { "type": "string" },
            "anchor": {
                "type": "object",
                "required": ["granularity", "tsa_token"],
                "properties": {
                    "granularity": { "enum": ["merkle_root", "event_hash"] },
                    "merkle_root": { "type": "string" },
                    "merkle_proof": { "type": "array", "items": { "type": "string" } },
                    "merkle_index": { "type": "integer", "minimum": 0 },
                    "tree_size": { "type": "integer", "minimum": 0 },
                    "tsa_token": { "type": "string" }
                }
            },
            "human_attested": { "type": "boolean" },
            "tombstone": { "type": "object" }
        }
    })
}

/// Structural schema of the full variant.
pub fn full_schema() -> Value {
    json!({
        "type": "object",
        "required": ["event"],
        "properties": {
            "proofVersion": { "type": "string" },
            "proofType": { "type": "string" },
            "event": {
                "type": "object",
                "required": [
                    "eventId", "chainId", "prevHash", "timestamp", "asset",
                    "captureContext", "eventHash", "signature"
                ],
                "properties": {
                    "eventId": { "type": "string" },
                    "eventHash": { "type": "string" },
                    "asset": { "type": "object", "required": ["assetHash"] },
                    "captureContext": { "type": "object", "required": ["keyAttestation"] },
                    "signature": { "type": "object", "required": ["algorithm", "value"] }
                }
            },
            "publicKey": { "type": "string" },
            "anchor": {
                "type": "object",
                "required": ["granularity", "tsaToken"],
                "properties": {
                    "granularity": { "enum": ["merkleRoot", "eventHash"] },
                    "merkleRoot": { "type": "string" },
                    "merkleProof": { "type": "array", "items": { "type": "string" } },
                    "merkleIndex": { "type": "integer", "minimum": 0 },
                    "treeSize": { "type": "integer", "minimum": 0 },
                    "tsaToken": { "type": "string" }
                }
            },
            "signer": { "type": "object", "required": ["name"] },
            "tombstone": { "type": "object" }
        }
    })
}
