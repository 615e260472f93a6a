//! Verification results produced by the orchestrator.
//!
//! Every check always appears in `VerificationResult::checks` with a status and
//! a human-readable detail, including on total failure.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::Location;

/// The named checks, in the fixed order the orchestrator runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckId {
    Parse,
    Version,
    EventHash,
    Signature,
    AssetHash,
    MerkleInclusion,
    TimestampToken,
    Invalidation,
}

impl CheckId {
    /// All checks in execution order.
    pub const ORDER: [CheckId; 8] = [
        CheckId::Parse,
        CheckId::Version,
        CheckId::EventHash,
        CheckId::Signature,
        CheckId::AssetHash,
        CheckId::MerkleInclusion,
        CheckId::TimestampToken,
        CheckId::Invalidation,
    ];

    /// Human-displayable name.
    pub fn label(&self) -> &'static str {
        match self {
            CheckId::Parse => "Proof parsing",
            CheckId::Version => "Proof format version",
            CheckId::EventHash => "Event hash",
            CheckId::Signature => "Signature",
            CheckId::AssetHash => "Asset hash",
            CheckId::MerkleInclusion => "Merkle inclusion",
            CheckId::TimestampToken => "Timestamp token",
            CheckId::Invalidation => "Invalidation",
        }
    }

    /// Digest checks, whose failure yields `hash-mismatch`.
    pub fn is_digest_check(&self) -> bool {
        matches!(self, CheckId::EventHash | CheckId::AssetHash)
    }
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckStatus {
    Passed,
    Failed,
    Skipped,
    Warning,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckStatus::Passed => "passed",
            CheckStatus::Failed => "failed",
            CheckStatus::Skipped => "skipped",
            CheckStatus::Warning => "warning",
        };
        f.write_str(label)
    }
}

/// One rendered check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub id: CheckId,
    pub status: CheckStatus,
    pub detail: String,
}

impl CheckResult {
    pub fn new(id: CheckId, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            id,
            status,
            detail: detail.into(),
        }
    }

    pub fn passed(id: CheckId, detail: impl Into<String>) -> Self {
        Self::new(id, CheckStatus::Passed, detail)
    }

    pub fn failed(id: CheckId, detail: impl Into<String>) -> Self {
        Self::new(id, CheckStatus::Failed, detail)
    }

    pub fn skipped(id: CheckId, detail: impl Into<String>) -> Self {
        Self::new(id, CheckStatus::Skipped, detail)
    }

    pub fn warning(id: CheckId, detail: impl Into<String>) -> Self {
        Self::new(id, CheckStatus::Warning, detail)
    }
}

/// Overall verdict for one proof document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationStatus {
    Pending,
    Verifying,
    Verified,
    AnchorVerified,
    Invalidated,
    SignatureInvalid,
    HashMismatch,
    Error,
}

impl VerificationStatus {
    /// True for verdicts that confirm authenticity.
    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            VerificationStatus::Verified | VerificationStatus::AnchorVerified
        )
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verifying => "verifying",
            VerificationStatus::Verified => "verified",
            VerificationStatus::AnchorVerified => "anchor-verified",
            VerificationStatus::Invalidated => "invalidated",
            VerificationStatus::SignatureInvalid => "signature-invalid",
            VerificationStatus::HashMismatch => "hash-mismatch",
            VerificationStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// Fields extracted for presentation, whichever variant was parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayFields {
    pub capture_time: Option<String>,
    pub device_model: Option<String>,
    pub flash_mode: Option<String>,
    pub signer_name: Option<String>,
    pub tsa_service: Option<String>,
    pub tsa_time: Option<String>,
    pub location: Option<Location>,
    pub human_attested: bool,
}

/// The orchestrator's output for one proof document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub status: VerificationStatus,
    pub checks: Vec<CheckResult>,
    pub display: DisplayFields,
    pub event_id: Option<String>,
}

impl VerificationResult {
    /// The result of check `id`, if it ran.
    pub fn check(&self, id: CheckId) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.id == id)
    }

    /// Checks that ended in `warning`; never hidden by a positive verdict.
    pub fn warnings(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Warning)
    }
}
