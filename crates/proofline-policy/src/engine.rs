//! Loading and validating verifier configuration.
//!
//! `VerifierPolicy` is the validated, ready-to-use form of a
//! `VerifierConfig`: trust-anchor keys are decoded, the preset and overrides
//! are folded into one `AnchorPolicy`, and the revocation entries are
//! indexed.  Construct via `from_toml_str` or `from_file`, or start from
//! `VerifierPolicy::default()` and adjust.

use std::path::Path;

use tracing::{debug, info};

use proofline_contracts::{
    error::{ProoflineError, ProoflineResult},
    policy::{AnchorPolicy, PolicyPreset},
};
use proofline_core::signature::{decode_base64, parse_public_key};

use crate::{
    config::VerifierConfig,
    trust::{RevocationList, TrustAnchor, TrustStore},
};

/// Largest accepted `asset_chunk_size`: 64 MiB.  One chunk is held in memory
/// per media file being hashed.
pub const MAX_ASSET_CHUNK_SIZE: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct VerifierPolicy {
    pub anchor: AnchorPolicy,
    pub supported_versions: Vec<String>,
    pub asset_chunk_size: usize,
    pub trust_store: TrustStore,
    pub revocation: RevocationList,
}

impl Default for VerifierPolicy {
    fn default() -> Self {
        // The default config has no keys to decode and a positive chunk size.
        let config = VerifierConfig::default();
        Self {
            anchor: config.anchor_policy(),
            supported_versions: config.supported_proof_versions,
            asset_chunk_size: config.asset_chunk_size,
            trust_store: TrustStore::default(),
            revocation: RevocationList::default(),
        }
    }
}

impl VerifierPolicy {
    /// Parse `s` as TOML and validate it.
    ///
    /// Returns `ProoflineError::Config` if the TOML is malformed, does not
    /// match `VerifierConfig`, or fails validation.
    pub fn from_toml_str(s: &str) -> ProoflineResult<Self> {
        let config: VerifierConfig = toml::from_str(s).map_err(|e| ProoflineError::Config {
            reason: format!("failed to parse verifier TOML: {}", e),
        })?;
        Self::from_config(config)
    }

    /// Read the file at `path` and parse it as verifier configuration.
    pub fn from_file(path: &Path) -> ProoflineResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ProoflineError::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        let policy = Self::from_toml_str(&contents)?;
        info!(
            path = %path.display(),
            anchor_policy = %policy.anchor,
            trust_anchors = policy.trust_store.len(),
            revoked = policy.revocation.len(),
            "verifier configuration loaded"
        );
        Ok(policy)
    }

    /// Validate a deserialized configuration.
    pub fn from_config(config: VerifierConfig) -> ProoflineResult<Self> {
        if config.asset_chunk_size == 0 {
            return Err(ProoflineError::Config {
                reason: "asset_chunk_size must be greater than zero".to_string(),
            });
        }
        if config.asset_chunk_size > MAX_ASSET_CHUNK_SIZE {
            return Err(ProoflineError::Config {
                reason: format!(
                    "asset_chunk_size {} exceeds the maximum of {MAX_ASSET_CHUNK_SIZE} bytes",
                    config.asset_chunk_size
                ),
            });
        }
        if config.supported_proof_versions.is_empty() {
            return Err(ProoflineError::Config {
                reason: "supported_proof_versions must list at least one version".to_string(),
            });
        }

        let mut trust_store = TrustStore::default();
        for entry in &config.trust_anchors {
            let key = decode_base64(&entry.public_key).map_err(|e| ProoflineError::Config {
                reason: format!("trust anchor '{}' has a non-base64 key: {}", entry.name, e),
            })?;
            parse_public_key(&key).map_err(|e| ProoflineError::Config {
                reason: format!("trust anchor '{}': {}", entry.name, e),
            })?;
            debug!(name = %entry.name, "trust anchor registered");
            trust_store.add(TrustAnchor {
                name: entry.name.clone(),
                public_key: key,
            });
        }

        Ok(Self {
            anchor: config.anchor_policy(),
            supported_versions: config.supported_proof_versions,
            asset_chunk_size: config.asset_chunk_size,
            trust_store,
            revocation: RevocationList::new(config.revoked),
        })
    }

    /// Replace the anchor policy with a named preset for one call.
    pub fn with_preset(mut self, preset: PolicyPreset) -> Self {
        self.anchor = AnchorPolicy::from_preset(preset);
        self
    }

    pub fn with_anchor_policy(mut self, anchor: AnchorPolicy) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_trust_anchor(mut self, name: impl Into<String>, public_key: Vec<u8>) -> Self {
        self.trust_store.add(TrustAnchor {
            name: name.into(),
            public_key,
        });
        self
    }

    pub fn supports_version(&self, version: &str) -> bool {
        self.supported_versions.iter().any(|v| v == version)
    }
}
