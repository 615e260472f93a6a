//! Verifier configuration schema.
//!
//! A `VerifierConfig` is deserialized from TOML.  Every field has a default,
//! so an empty document is a valid configuration equal to the `default`
//! preset with no trust anchors and no revocation entries.
//!
//! Example:
//! ```toml
//! preset = "strict"
//! supported_proof_versions = ["1.0", "1.1"]
//! asset_chunk_size = 65536
//!
//! [anchor]
//! revocation = "warn-only"       # overrides the preset for this layer only
//!
//! [[trust_anchors]]
//! name = "Example Root CA"
//! public_key = "base64..."
//!
//! [[revoked]]
//! serial_number = "1001"
//! issuer = "Example Root CA"
//! revoked_at = "2025-03-01T00:00:00Z"
//! reason = "keyCompromise"
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use proofline_contracts::policy::{AnchorPolicy, LayerMode, PolicyPreset};
use proofline_core::DEFAULT_CHUNK_SIZE;

/// Proof format versions accepted when the configuration does not say.
pub const DEFAULT_PROOF_VERSIONS: [&str; 2] = ["1.0", "1.1"];

/// Per-layer overrides applied on top of the preset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnchorOverrides {
    #[serde(default)]
    pub chain_validation: Option<LayerMode>,
    #[serde(default)]
    pub revocation: Option<LayerMode>,
}

/// A trusted root as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrustAnchorEntry {
    /// Subject name certificates must name as their issuer.
    pub name: String,
    /// Base64 Ed25519 public key.
    pub public_key: String,
}

/// One revoked certificate, identified by issuer and serial number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RevokedEntry {
    pub serial_number: String,
    pub issuer: String,
    pub revoked_at: DateTime<Utc>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// The complete verifier configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifierConfig {
    #[serde(default)]
    pub preset: PolicyPreset,

    #[serde(default)]
    pub anchor: AnchorOverrides,

    #[serde(default = "default_versions")]
    pub supported_proof_versions: Vec<String>,

    /// Read size for streamed media digests, in bytes.
    #[serde(default = "default_chunk_size")]
    pub asset_chunk_size: usize,

    #[serde(default)]
    pub trust_anchors: Vec<TrustAnchorEntry>,

    #[serde(default)]
    pub revoked: Vec<RevokedEntry>,
}

fn default_versions() -> Vec<String> {
    DEFAULT_PROOF_VERSIONS.iter().map(|v| v.to_string()).collect()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            preset: PolicyPreset::default(),
            anchor: AnchorOverrides::default(),
            supported_proof_versions: default_versions(),
            asset_chunk_size: default_chunk_size(),
            trust_anchors: Vec::new(),
            revoked: Vec::new(),
        }
    }
}

impl VerifierConfig {
    /// The preset's layer modes with any per-layer overrides applied.
    pub fn anchor_policy(&self) -> AnchorPolicy {
        let mut policy = AnchorPolicy::from_preset(self.preset);
        if let Some(mode) = self.anchor.chain_validation {
            policy.chain_validation = mode;
        }
        if let Some(mode) = self.anchor.revocation {
            policy.revocation = mode;
        }
        policy
    }
}
