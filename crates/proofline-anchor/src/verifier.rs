//! The two-layer anchor verifier.
//!
//! Per anchor, in order:
//!
//!   Merkle inclusion → imprint → token signature → signer valid at genTime
//!     → (chain policy) → (revocation policy)
//!
//! The Merkle check is a prerequisite: when it fails the token is not
//! examined.  Any Layer 1 failure is terminal and Layer 2 is not attempted.
//! Layer 2 failures either fail the anchor (`required`), add a warning
//! (`warn-only`), or are never looked for (`skip`).  Certificate validity is
//! always judged at the token's generation time.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use proofline_contracts::{
    anchor::{Anchor, AnchorGranularity, Certificate, RevocationStatus},
    digest::ContentDigest,
    event::parse_timestamp,
    policy::{AnchorPolicy, LayerMode},
};
use proofline_core::{
    signature::{decode_base64, try_verify_signature},
    RevocationChecker, TimestampTokenParser,
};
use proofline_policy::{RevocationList, TrustStore, VerifierPolicy};

use crate::{
    certificate::validate_chain,
    merkle::{verify_inclusion, MerkleError},
    token::JsonTimestampTokenParser,
};

/// Terminal state of one time-stamp token verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorStatus {
    Verified,
    VerifiedWithWarnings,
    /// The token could not be decoded at all.
    Malformed,
    /// The token stamps a different digest.
    Tampered,
    SignatureInvalid,
    CertificateExpiredAtTimestamp,
    ChainVerificationFailed,
    CertificateRevoked,
}

impl AnchorStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, AnchorStatus::Verified | AnchorStatus::VerifiedWithWarnings)
    }
}

impl fmt::Display for AnchorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AnchorStatus::Verified => "verified",
            AnchorStatus::VerifiedWithWarnings => "verified-with-warnings",
            AnchorStatus::Malformed => "malformed",
            AnchorStatus::Tampered => "tampered",
            AnchorStatus::SignatureInvalid => "signature-invalid",
            AnchorStatus::CertificateExpiredAtTimestamp => "certificate-expired-at-timestamp",
            AnchorStatus::ChainVerificationFailed => "chain-verification-failed",
            AnchorStatus::CertificateRevoked => "certificate-revoked",
        };
        f.write_str(label)
    }
}

/// Outcome of the inclusion step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MerkleOutcome {
    /// The anchor stamps the event digest directly.
    NotUsed,
    /// The anchor stamps a root but carries no inclusion proof.
    Missing,
    Included { root: ContentDigest },
    Failed(MerkleError),
}

/// Outcome of the token state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenVerification {
    pub status: AnchorStatus,
    pub detail: String,
    /// Layer 2 and time-claim findings that did not fail the anchor.
    pub warnings: Vec<String>,
    pub gen_time: Option<DateTime<Utc>>,
    pub tsa_name: Option<String>,
    /// The policy this outcome was produced under.
    pub policy: AnchorPolicy,
}

/// Everything learned about one anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorReport {
    pub merkle: MerkleOutcome,
    /// `None` when the token was not examined because inclusion failed.
    pub token: Option<TokenVerification>,
}

impl AnchorReport {
    pub fn is_success(&self) -> bool {
        !matches!(self.merkle, MerkleOutcome::Failed(_) | MerkleOutcome::Missing)
            && self.token.as_ref().map(|t| t.status.is_success()).unwrap_or(false)
    }
}

/// Verifies anchors against a trust store and revocation source.
pub struct AnchorVerifier {
    parser: Box<dyn TimestampTokenParser>,
    revocation: Box<dyn RevocationChecker>,
    trust: TrustStore,
}

impl AnchorVerifier {
    /// A verifier with the JSON token parser and an empty revocation list.
    pub fn new(trust: TrustStore) -> Self {
        Self {
            parser: Box::new(JsonTimestampTokenParser),
            revocation: Box::new(RevocationList::default()),
            trust,
        }
    }

    /// A verifier using the trust anchors and revocation entries of `policy`.
    pub fn from_policy(policy: &VerifierPolicy) -> Self {
        Self::new(policy.trust_store.clone()).with_revocation(Box::new(policy.revocation.clone()))
    }

    pub fn with_parser(mut self, parser: Box<dyn TimestampTokenParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_revocation(mut self, revocation: Box<dyn RevocationChecker>) -> Self {
        self.revocation = revocation;
        self
    }

    /// Check inclusion of `event_digest`, then the token over the committed
    /// digest.
    pub fn verify(
        &self,
        event_digest: &ContentDigest,
        anchor: &Anchor,
        policy: AnchorPolicy,
    ) -> AnchorReport {
        let (merkle, imprint) = match anchor.granularity {
            AnchorGranularity::EventHash => (MerkleOutcome::NotUsed, *event_digest),
            AnchorGranularity::MerkleRoot => match &anchor.merkle {
                None => {
                    warn!("merkle-root anchor carries no inclusion proof");
                    return AnchorReport {
                        merkle: MerkleOutcome::Missing,
                        token: None,
                    };
                }
                Some(commitment) => match verify_inclusion(event_digest, commitment) {
                    Ok(root) => (MerkleOutcome::Included { root }, root),
                    Err(e) => {
                        warn!(error = %e, "merkle inclusion failed");
                        return AnchorReport {
                            merkle: MerkleOutcome::Failed(e),
                            token: None,
                        };
                    }
                },
            },
        };

        let token = self.verify_token(
            &imprint,
            &anchor.tsa_token,
            anchor.tsa_time.as_deref(),
            policy,
        );
        AnchorReport {
            merkle,
            token: Some(token),
        }
    }

    /// Run the token state machine against `expected_imprint`.
    pub fn verify_token(
        &self,
        expected_imprint: &ContentDigest,
        token_bytes: &[u8],
        claimed_time: Option<&str>,
        policy: AnchorPolicy,
    ) -> TokenVerification {
        let outcome = |status: AnchorStatus,
                       detail: String,
                       warnings: Vec<String>,
                       gen_time: Option<DateTime<Utc>>,
                       tsa_name: Option<String>| {
            if status.is_success() {
                info!(%status, %policy, "time-stamp token verified");
            } else {
                warn!(%status, %policy, detail = %detail, "time-stamp token rejected");
            }
            TokenVerification {
                status,
                detail,
                warnings,
                gen_time,
                tsa_name,
                policy,
            }
        };

        // ── Layer 1 ──────────────────────────────────────────────────────────

        let token = match self.parser.parse(token_bytes) {
            Ok(token) => token,
            Err(e) => return outcome(AnchorStatus::Malformed, e.to_string(), vec![], None, None),
        };
        let gen_time = Some(token.gen_time);
        let tsa_name = token.tsa_name.clone();

        if token.message_imprint != *expected_imprint {
            return outcome(
                AnchorStatus::Tampered,
                format!(
                    "token stamps {} but {} was expected",
                    token.message_imprint, expected_imprint
                ),
                vec![],
                gen_time,
                tsa_name,
            );
        }

        let signer = &token.signer_certificate;
        let signature_ok = decode_base64(&signer.public_key)
            .map_err(|e| e.to_string())
            .and_then(|key| {
                try_verify_signature(&token.signed_digest, &token.signature, &key)
                    .map_err(|e| e.to_string())
            });
        match signature_ok {
            Ok(true) => {}
            Ok(false) => {
                return outcome(
                    AnchorStatus::SignatureInvalid,
                    format!("token signature does not verify with the key of '{}'", signer.subject),
                    vec![],
                    gen_time,
                    tsa_name,
                )
            }
            Err(reason) => {
                return outcome(
                    AnchorStatus::SignatureInvalid,
                    format!("token signature could not be checked: {reason}"),
                    vec![],
                    gen_time,
                    tsa_name,
                )
            }
        }

        if !signer.is_valid_at(token.gen_time) {
            return outcome(
                AnchorStatus::CertificateExpiredAtTimestamp,
                format!(
                    "signer certificate '{}' is valid {} to {}, token generated {}",
                    signer.subject, signer.not_before, signer.not_after, token.gen_time
                ),
                vec![],
                gen_time,
                tsa_name,
            );
        }

        // ── Layer 2 ──────────────────────────────────────────────────────────

        let mut warnings = Vec::new();

        match policy.chain_validation {
            LayerMode::Skip => debug!("chain validation skipped by policy"),
            mode => match validate_chain(signer, &token.intermediates, &self.trust, token.gen_time)
            {
                Ok(path) => debug!(links = path.len(), "certificate chain reaches a trust anchor"),
                Err(e) if mode == LayerMode::Required => {
                    return outcome(
                        AnchorStatus::ChainVerificationFailed,
                        format!("chain validation (required): {e}"),
                        warnings,
                        gen_time,
                        tsa_name,
                    )
                }
                Err(e) => warnings.push(format!("chain validation ({mode}): {e}")),
            },
        }

        if policy.revocation != LayerMode::Skip {
            let required = policy.revocation == LayerMode::Required;
            let certificates = std::iter::once(signer).chain(token.intermediates.iter());
            for cert in certificates {
                match self.revocation_finding(cert, token.gen_time) {
                    Ok(None) => {}
                    Ok(Some(finding)) if required => {
                        return outcome(
                            AnchorStatus::CertificateRevoked,
                            format!("revocation (required): {finding}"),
                            warnings,
                            gen_time,
                            tsa_name,
                        )
                    }
                    Err(unavailable) if required => {
                        return outcome(
                            AnchorStatus::ChainVerificationFailed,
                            format!("revocation (required): {unavailable}"),
                            warnings,
                            gen_time,
                            tsa_name,
                        )
                    }
                    Ok(Some(finding)) => {
                        warnings.push(format!("revocation ({}): {finding}", policy.revocation))
                    }
                    Err(unavailable) => {
                        warnings.push(format!("revocation ({}): {unavailable}", policy.revocation))
                    }
                }
            }
        }

        if let Some(claimed) = claimed_time {
            match parse_timestamp(claimed) {
                Some(t) if t == token.gen_time => {}
                Some(t) => warnings.push(format!(
                    "proof claims anchor time {t} but the token was generated {}",
                    token.gen_time
                )),
                None => warnings.push(format!("proof claims unreadable anchor time '{claimed}'")),
            }
        }

        let status = if warnings.is_empty() {
            AnchorStatus::Verified
        } else {
            AnchorStatus::VerifiedWithWarnings
        };
        let detail = format!(
            "token {} from {} generated {} ({})",
            token.serial_number,
            tsa_name.as_deref().unwrap_or(&signer.subject),
            token.gen_time,
            policy
        );
        outcome(status, detail, warnings, gen_time, tsa_name)
    }

    /// `Ok(Some(reason))` when `cert` was revoked at or before `gen_time`.
    /// A revocation after the token was generated does not affect it.
    fn revocation_finding(
        &self,
        cert: &Certificate,
        gen_time: DateTime<Utc>,
    ) -> Result<Option<String>, String> {
        match self.revocation.status(cert) {
            Ok(RevocationStatus::Good) => Ok(None),
            Ok(RevocationStatus::Revoked { revoked_at, reason }) if revoked_at <= gen_time => {
                Ok(Some(format!(
                    "certificate '{}' (serial {}) revoked {}{}",
                    cert.subject,
                    cert.serial_number,
                    revoked_at,
                    reason.map(|r| format!(" ({r})")).unwrap_or_default()
                )))
            }
            Ok(RevocationStatus::Revoked { revoked_at, .. }) => {
                debug!(
                    serial = %cert.serial_number,
                    %revoked_at,
                    %gen_time,
                    "certificate revoked after the token was generated"
                );
                Ok(None)
            }
            Err(e) => Err(e.to_string()),
        }
    }
}
