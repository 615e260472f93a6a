//! Trait seams between the verification engine and its collaborators.
//!
//! - `TimestampTokenParser` : decodes an authority's token into its parts
//! - `RevocationChecker`    : answers "was this certificate revoked, and when"
//! - `VerificationObserver` : receives progress while a proof is verified
//! - `EventSigner`          : signs record digests on behalf of a ledger
//!
//! Everything behind these traits is replaceable.  The engine's trust
//! decisions never depend on which implementation is plugged in.

use thiserror::Error;

use proofline_contracts::{
    anchor::{Certificate, ParsedTimestampToken, RevocationStatus},
    digest::ContentDigest,
    error::ProoflineResult,
    result::{CheckId, CheckResult, VerificationStatus},
};

/// Decodes raw time-stamp token bytes.
///
/// Implementations only decode and extract; they never decide trust.  A
/// token that cannot be decoded is `ProoflineError::TokenMalformed`.
pub trait TimestampTokenParser: Send + Sync {
    fn parse(&self, token: &[u8]) -> ProoflineResult<ParsedTimestampToken>;
}

/// The revocation source could not give an answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("revocation status unavailable: {reason}")]
pub struct RevocationUnavailable {
    pub reason: String,
}

/// A source of certificate revocation status.
pub trait RevocationChecker: Send + Sync {
    fn status(&self, certificate: &Certificate) -> Result<RevocationStatus, RevocationUnavailable>;
}

/// Progress callbacks for a single verification.
///
/// All methods default to no-ops, so implementations override only what
/// they display.
pub trait VerificationObserver: Send + Sync {
    fn status_changed(&self, _status: VerificationStatus) {}

    fn check_started(&self, _check: CheckId) {}

    fn check_finished(&self, _result: &CheckResult) {}

    /// Bytes of media hashed so far, and the expected total when known.
    fn asset_progress(&self, _bytes_done: u64, _bytes_total: Option<u64>) {}
}

/// Observer that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl VerificationObserver for NoopObserver {}

/// Signs record digests.  The signature covers the raw 32 digest bytes.
pub trait EventSigner: Send + Sync {
    /// Raw public key bytes of the signing key.
    fn public_key(&self) -> Vec<u8>;

    /// Signature algorithm label recorded next to each signature.
    fn algorithm(&self) -> &str {
        crate::signature::SIGNATURE_ALGORITHM
    }

    fn sign_digest(&self, digest: &ContentDigest) -> ProoflineResult<Vec<u8>>;
}
