//! Anchor verification policy.
//!
//! Layer 1 (imprint, token signature, certificate validity at the token's
//! generation time) is always enforced and has no knob here.  Only the Layer 2
//! checks, chain-to-root validation and revocation, are configurable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a Layer 2 check affects the anchor outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerMode {
    /// A failure fails the whole anchor verification.
    Required,
    /// A failure downgrades the outcome to "verified with warnings".
    WarnOnly,
    /// The check is not attempted.
    Skip,
}

impl fmt::Display for LayerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LayerMode::Required => "required",
            LayerMode::WarnOnly => "warn-only",
            LayerMode::Skip => "skip",
        };
        f.write_str(label)
    }
}

/// Named policy bundles selectable per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyPreset {
    /// Chain validation warn-only, revocation best-effort.
    #[default]
    Default,
    /// Chain validation and revocation both required.
    Strict,
    /// Layer 2 skipped entirely.
    Permissive,
}

impl fmt::Display for PolicyPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PolicyPreset::Default => "default",
            PolicyPreset::Strict => "strict",
            PolicyPreset::Permissive => "permissive",
        };
        f.write_str(label)
    }
}

/// The effective Layer 2 settings for one anchor verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorPolicy {
    pub chain_validation: LayerMode,
    pub revocation: LayerMode,
}

impl AnchorPolicy {
    pub fn from_preset(preset: PolicyPreset) -> Self {
        match preset {
            PolicyPreset::Default => Self {
                chain_validation: LayerMode::WarnOnly,
                revocation: LayerMode::WarnOnly,
            },
            PolicyPreset::Strict => Self {
                chain_validation: LayerMode::Required,
                revocation: LayerMode::Required,
            },
            PolicyPreset::Permissive => Self {
                chain_validation: LayerMode::Skip,
                revocation: LayerMode::Skip,
            },
        }
    }

    pub fn strict() -> Self {
        Self::from_preset(PolicyPreset::Strict)
    }

    pub fn permissive() -> Self {
        Self::from_preset(PolicyPreset::Permissive)
    }
}

impl Default for AnchorPolicy {
    fn default() -> Self {
        Self::from_preset(PolicyPreset::Default)
    }
}

impl fmt::Display for AnchorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chain validation {}, revocation {}",
            self.chain_validation, self.revocation
        )
    }
}
