//! The verification orchestrator.
//!
//! `ProofVerifier` runs a fixed sequence of named checks over one proof
//! document and derives a single verdict from them:
//!
//! ```text
//! parse → version → event-hash → signature → asset-hash
//!       → merkle-inclusion → timestamp-token → invalidation
//! ```
//!
//! Every check always appears in the result.  A parse failure is terminal and
//! every later check is reported `skipped`; any other failure is recorded and
//! the sequence continues.  The digest recomputed in `event-hash`, never the
//! digest the document claims, is what the signature and anchor checks use.
//!
//! Independent documents share nothing mutable, so [`ProofVerifier::verify_many`]
//! runs them in parallel.

use std::{
    fs::File,
    io::{Cursor, Read},
    path::PathBuf,
};

use chrono::SecondsFormat;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info, warn};

use proofline_contracts::{
    digest::ContentDigest,
    error::{ProoflineError, ProoflineResult},
    policy::{AnchorPolicy, PolicyPreset},
    proof::{ParsedProof, RawEvent},
    result::{
        CheckId, CheckResult, CheckStatus, DisplayFields, VerificationResult, VerificationStatus,
    },
};
use proofline_core::{
    digest::verify_asset_digest,
    record::tombstone_digest,
    sha256,
    signature::{decode_base64, try_verify_signature, verify_record_signature},
    CancellationToken, NoopObserver, VerificationObserver, SIGNATURE_ALGORITHM,
};
use proofline_anchor::{AnchorReport, AnchorVerifier, MerkleOutcome};
use proofline_policy::VerifierPolicy;

use crate::parser::ProofParser;

static NOOP: NoopObserver = NoopObserver;

/// Per-call options for [`ProofVerifier::verify_with`].
pub struct VerifyOptions<'a> {
    /// Overrides the configured anchor policy for this call.
    pub preset: Option<PolicyPreset>,
    pub observer: &'a dyn VerificationObserver,
    /// Cancels media hashing; the verification then returns
    /// `ProoflineError::Cancelled`.
    pub cancel: Option<CancellationToken>,
    /// Total media size, passed through to progress callbacks.
    pub media_size: Option<u64>,
}

impl Default for VerifyOptions<'_> {
    fn default() -> Self {
        Self {
            preset: None,
            observer: &NOOP,
            cancel: None,
            media_size: None,
        }
    }
}

/// Where a batch job's media comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSource {
    Bytes(Vec<u8>),
    /// Opened when the job runs and streamed through the asset-hash check.
    File(PathBuf),
}

/// One document for batch verification.
#[derive(Debug, Clone)]
pub struct ProofJob {
    /// Caller's label for the document, e.g. its file name.
    pub name: String,
    pub text: String,
    pub media: Option<MediaSource>,
}

/// The outcome of one batch job.
#[derive(Debug)]
pub struct ProofOutcome {
    pub name: String,
    pub result: ProoflineResult<VerificationResult>,
}

/// Derive the verdict from finished checks.
///
/// Priority: a failed signature, then a failed digest check, then any other
/// failure.  Skips and warnings count as passing.  With nothing failed, a
/// valid invalidation record outranks a verified anchor.
pub fn overall_status(
    checks: &[CheckResult],
    anchor_verified: bool,
    invalidated: bool,
) -> VerificationStatus {
    let failed = |pred: &dyn Fn(CheckId) -> bool| {
        checks
            .iter()
            .any(|c| c.status == CheckStatus::Failed && pred(c.id))
    };

    if failed(&|id| id == CheckId::Signature) {
        VerificationStatus::SignatureInvalid
    } else if failed(&|id| id.is_digest_check()) {
        VerificationStatus::HashMismatch
    } else if failed(&|_| true) {
        VerificationStatus::Error
    } else if invalidated {
        VerificationStatus::Invalidated
    } else if anchor_verified {
        VerificationStatus::AnchorVerified
    } else {
        VerificationStatus::Verified
    }
}

// ── Check log ─────────────────────────────────────────────────────────────────

/// Collects check results in order and reports each to the observer.
struct CheckLog<'o> {
    observer: &'o dyn VerificationObserver,
    checks: Vec<CheckResult>,
}

impl<'o> CheckLog<'o> {
    fn new(observer: &'o dyn VerificationObserver) -> Self {
        Self {
            observer,
            checks: Vec::with_capacity(CheckId::ORDER.len()),
        }
    }

    fn start(&self, id: CheckId) {
        self.observer.check_started(id);
    }

    fn record(&mut self, result: CheckResult) {
        match result.status {
            CheckStatus::Failed => {
                warn!(check = ?result.id, status = %result.status, detail = %result.detail, "check failed")
            }
            _ => {
                debug!(check = ?result.id, status = %result.status, detail = %result.detail, "check finished")
            }
        }
        self.observer.check_finished(&result);
        self.checks.push(result);
    }

    /// Start and immediately finish `id`.
    fn run(&mut self, id: CheckId, check: impl FnOnce() -> CheckResult) {
        self.start(id);
        let result = check();
        self.record(result);
    }
}

// ── Verifier ──────────────────────────────────────────────────────────────────

/// Verifies proof documents under one policy.
pub struct ProofVerifier {
    parser: ProofParser,
    anchors: AnchorVerifier,
    policy: VerifierPolicy,
}

impl ProofVerifier {
    /// A verifier whose anchor checks use the trust anchors and revocation
    /// list of `policy`.
    pub fn new(policy: VerifierPolicy) -> ProoflineResult<Self> {
        Ok(Self {
            parser: ProofParser::new()?,
            anchors: AnchorVerifier::from_policy(&policy),
            policy,
        })
    }

    /// Replace the anchor verifier, e.g. to plug in another token parser or
    /// revocation source.
    pub fn with_anchor_verifier(mut self, anchors: AnchorVerifier) -> Self {
        self.anchors = anchors;
        self
    }

    pub fn policy(&self) -> &VerifierPolicy {
        &self.policy
    }

    /// Verify `text` with default options.
    pub fn verify(
        &self,
        text: &str,
        media: Option<&mut dyn Read>,
    ) -> ProoflineResult<VerificationResult> {
        self.verify_with(text, media, &VerifyOptions::default())
    }

    /// Verify `text`, and `media` against its asset digest when supplied.
    ///
    /// Only cancellation and media read failures are errors.  Everything the
    /// document itself gets wrong is reported through the checks.
    pub fn verify_with(
        &self,
        text: &str,
        media: Option<&mut dyn Read>,
        options: &VerifyOptions<'_>,
    ) -> ProoflineResult<VerificationResult> {
        let observer = options.observer;
        observer.status_changed(VerificationStatus::Verifying);
        let mut log = CheckLog::new(observer);

        // ── 1. parse ──
        log.start(CheckId::Parse);
        let proof = match self.parser.parse(text) {
            Ok(proof) => proof,
            Err(e) => {
                log.record(CheckResult::failed(CheckId::Parse, e.to_string()));
                for id in &CheckId::ORDER[1..] {
                    log.run(*id, || {
                        CheckResult::skipped(*id, "not run: the proof could not be parsed")
                    });
                }
                let status = VerificationStatus::Error;
                warn!(%status, "proof rejected at parse");
                observer.status_changed(status);
                return Ok(VerificationResult {
                    status,
                    checks: log.checks,
                    display: DisplayFields::default(),
                    event_id: None,
                });
            }
        };
        log.record(CheckResult::passed(
            CheckId::Parse,
            format!("{} proof for event {}", proof.variant, proof.summary.event_id),
        ));

        // ── 2. version ──
        log.run(CheckId::Version, || self.check_version(&proof));

        // ── 3. event digest ──
        log.start(CheckId::EventHash);
        let (event_check, digest) = check_event_digest(&proof);
        log.record(event_check);

        // ── 4. signature ──
        log.run(CheckId::Signature, || check_signature(&proof, digest.as_ref()));

        // ── 5. asset digest ──
        log.start(CheckId::AssetHash);
        let asset_check = self.check_asset(&proof, media, options)?;
        log.record(asset_check);

        // ── 6. anchor ──
        let anchor_policy = options
            .preset
            .map(AnchorPolicy::from_preset)
            .unwrap_or(self.policy.anchor);
        log.start(CheckId::MerkleInclusion);
        let report = match (&proof.anchor, &digest) {
            (Some(anchor), Some(digest)) => Some(self.anchors.verify(digest, anchor, anchor_policy)),
            _ => None,
        };
        let (merkle_check, token_check) = anchor_checks(&proof, digest.is_some(), report.as_ref());
        log.record(merkle_check);
        log.run(CheckId::TimestampToken, || token_check);
        let anchor_verified = report.as_ref().map(AnchorReport::is_success).unwrap_or(false);

        // ── 7. invalidation ──
        log.start(CheckId::Invalidation);
        let (invalidation_check, invalidated) = check_invalidation(&proof, digest.as_ref());
        log.record(invalidation_check);

        let status = overall_status(&log.checks, anchor_verified, invalidated);
        let display = display_fields(&proof, report.as_ref());
        info!(
            event_id = %proof.summary.event_id,
            variant = %proof.variant,
            %status,
            warnings = log.checks.iter().filter(|c| c.status == CheckStatus::Warning).count(),
            "proof verified"
        );
        observer.status_changed(status);

        Ok(VerificationResult {
            status,
            checks: log.checks,
            display,
            event_id: Some(proof.summary.event_id),
        })
    }

    /// Verify independent documents in parallel.  Outcomes keep the order of
    /// `jobs`.
    pub fn verify_many(&self, jobs: &[ProofJob], preset: Option<PolicyPreset>) -> Vec<ProofOutcome> {
        jobs.par_iter()
            .map(|job| ProofOutcome {
                name: job.name.clone(),
                result: self.verify_job(job, preset),
            })
            .collect()
    }

    fn verify_job(
        &self,
        job: &ProofJob,
        preset: Option<PolicyPreset>,
    ) -> ProoflineResult<VerificationResult> {
        let mut options = VerifyOptions {
            preset,
            ..VerifyOptions::default()
        };
        match &job.media {
            None => self.verify_with(&job.text, None, &options),
            Some(MediaSource::Bytes(bytes)) => {
                options.media_size = Some(bytes.len() as u64);
                let mut cursor = Cursor::new(bytes.as_slice());
                self.verify_with(&job.text, Some(&mut cursor), &options)
            }
            Some(MediaSource::File(path)) => {
                let mut file = File::open(path).map_err(|e| ProoflineError::MediaRead {
                    reason: format!("cannot open {}: {e}", path.display()),
                })?;
                options.media_size = file.metadata().ok().map(|m| m.len());
                debug!(path = %path.display(), size = ?options.media_size, "streaming media");
                self.verify_with(&job.text, Some(&mut file), &options)
            }
        }
    }

    // ── Individual checks ─────────────────────────────────────────────────────

    fn check_version(&self, proof: &ParsedProof) -> CheckResult {
        match proof.proof_version.as_deref() {
            Some(version) if self.policy.supports_version(version) => {
                CheckResult::passed(CheckId::Version, format!("proof format {version} is supported"))
            }
            Some(version) => CheckResult::failed(
                CheckId::Version,
                format!(
                    "unsupported proof format version '{version}' (supported: {}); remaining checks are best effort",
                    self.policy.supported_versions.join(", ")
                ),
            ),
            None => CheckResult::warning(
                CheckId::Version,
                "proof declares no format version; checked as the current format",
            ),
        }
    }

    fn check_asset(
        &self,
        proof: &ParsedProof,
        media: Option<&mut dyn Read>,
        options: &VerifyOptions<'_>,
    ) -> ProoflineResult<CheckResult> {
        let Some(reader) = media else {
            return Ok(CheckResult::skipped(CheckId::AssetHash, "no media supplied"));
        };
        let expected = match ContentDigest::parse(&proof.summary.asset_hash) {
            Ok(d) => d,
            Err(e) => {
                return Ok(CheckResult::failed(
                    CheckId::AssetHash,
                    format!("asset hash in the proof is unusable: {e}"),
                ))
            }
        };

        let observer = options.observer;
        let total = options.media_size;
        let mut progress = |done: u64| observer.asset_progress(done, total);
        let outcome = verify_asset_digest(
            reader,
            &expected,
            self.policy.asset_chunk_size,
            &mut progress,
            options.cancel.as_ref(),
        );
        let check = match outcome {
            Ok(check) => check,
            Err(ProoflineError::Cancelled) => {
                info!(event_id = %proof.summary.event_id, "verification cancelled during media hashing");
                return Err(ProoflineError::Cancelled);
            }
            Err(e) => return Err(e),
        };

        Ok(if check.matches {
            CheckResult::passed(
                CheckId::AssetHash,
                format!("media digest matches ({} bytes)", check.bytes_read),
            )
        } else {
            CheckResult::failed(
                CheckId::AssetHash,
                format!(
                    "media digest {} does not match the asset hash {}",
                    check.computed, expected
                ),
            )
        })
    }
}

// ── Stateless checks ──────────────────────────────────────────────────────────

/// Recompute the event digest.  Returns the check and the recomputed digest,
/// which is `None` only when there were no bytes to hash.
fn check_event_digest(proof: &ParsedProof) -> (CheckResult, Option<ContentDigest>) {
    let Some(bytes) = proof.raw_event.bytes() else {
        return (
            CheckResult::failed(
                CheckId::EventHash,
                "proof carries no raw event bytes; the digest cannot be recomputed",
            ),
            None,
        );
    };
    let computed = sha256(bytes);

    let claimed = match ContentDigest::parse(&proof.claimed_event_hash) {
        Ok(d) => d,
        Err(e) => {
            return (
                CheckResult::failed(CheckId::EventHash, format!("claimed event hash is unusable: {e}")),
                Some(computed),
            )
        }
    };
    if claimed != computed {
        return (
            CheckResult::failed(
                CheckId::EventHash,
                format!("recomputed digest {computed} does not match the claimed {claimed}"),
            ),
            Some(computed),
        );
    }

    if let RawEvent::Carried(raw) = &proof.raw_event {
        if let Err(reason) = cross_check_summary(proof, raw) {
            return (CheckResult::failed(CheckId::EventHash, reason), Some(computed));
        }
    }

    (
        CheckResult::passed(CheckId::EventHash, format!("recomputed digest {computed} matches")),
        Some(computed),
    )
}

/// The summary carried next to the raw bytes must agree with the bytes.
fn cross_check_summary(proof: &ParsedProof, raw: &[u8]) -> Result<(), String> {
    let event: Value = serde_json::from_slice(raw)
        .map_err(|e| format!("raw event bytes are not a JSON document: {e}"))?;
    let field = |pointer: &str| event.pointer(pointer).and_then(Value::as_str);
    let summary = &proof.summary;

    if field("/eventId") != Some(summary.event_id.as_str()) {
        return Err(format!(
            "summary event id '{}' differs from the signed event ({})",
            summary.event_id,
            field("/eventId").unwrap_or("absent")
        ));
    }
    if field("/timestamp") != Some(summary.timestamp.as_str()) {
        return Err(format!(
            "summary timestamp '{}' differs from the signed event ({})",
            summary.timestamp,
            field("/timestamp").unwrap_or("absent")
        ));
    }
    let signed_asset = field("/asset/assetHash");
    let same_asset = match (signed_asset.map(ContentDigest::parse), ContentDigest::parse(&summary.asset_hash)) {
        (Some(Ok(a)), Ok(b)) => a == b,
        _ => signed_asset == Some(summary.asset_hash.as_str()),
    };
    if !same_asset {
        return Err(format!(
            "summary asset hash '{}' differs from the signed event ({})",
            summary.asset_hash,
            signed_asset.unwrap_or("absent")
        ));
    }
    Ok(())
}

fn check_signature(proof: &ParsedProof, digest: Option<&ContentDigest>) -> CheckResult {
    let Some(digest) = digest else {
        return CheckResult::skipped(
            CheckId::Signature,
            "not checked: the event digest could not be recomputed",
        );
    };
    if let Some(algorithm) = proof.signature_algorithm.as_deref() {
        if !algorithm.eq_ignore_ascii_case(SIGNATURE_ALGORITHM) {
            return CheckResult::failed(
                CheckId::Signature,
                format!("unsupported signature algorithm '{algorithm}'"),
            );
        }
    }
    let Some(signature) = proof.signature.as_deref() else {
        return CheckResult::failed(CheckId::Signature, "proof carries no signature");
    };
    if let (Some(document_key), Some(attested_key)) =
        (proof.public_key.as_deref(), proof.attested_public_key.as_deref())
    {
        if document_key != attested_key {
            return CheckResult::failed(
                CheckId::Signature,
                "key substitution: the proof's public key differs from the key attested in the signed event",
            );
        }
    }
    let Some(key) = proof.verification_key() else {
        return CheckResult::failed(
            CheckId::Signature,
            "not verifiable: no public key supplied",
        );
    };

    match try_verify_signature(digest, signature, key) {
        Ok(true) => CheckResult::passed(
            CheckId::Signature,
            format!("{SIGNATURE_ALGORITHM} signature verifies over {digest}"),
        ),
        Ok(false) => CheckResult::failed(
            CheckId::Signature,
            "signature does not verify over the recomputed event digest",
        ),
        Err(e) => CheckResult::failed(CheckId::Signature, e.to_string()),
    }
}

fn anchor_checks(
    proof: &ParsedProof,
    have_digest: bool,
    report: Option<&AnchorReport>,
) -> (CheckResult, CheckResult) {
    let Some(report) = report else {
        let reason = if proof.anchor.is_none() {
            "no anchor"
        } else if !have_digest {
            "not checked: the event digest could not be recomputed"
        } else {
            "not checked"
        };
        return (
            CheckResult::skipped(CheckId::MerkleInclusion, reason),
            CheckResult::skipped(CheckId::TimestampToken, reason),
        );
    };

    let merkle = match &report.merkle {
        MerkleOutcome::NotUsed => CheckResult::skipped(
            CheckId::MerkleInclusion,
            "anchor stamps the event digest directly",
        ),
        MerkleOutcome::Missing => CheckResult::failed(
            CheckId::MerkleInclusion,
            "merkle-root anchor carries no inclusion proof",
        ),
        MerkleOutcome::Included { root } => CheckResult::passed(
            CheckId::MerkleInclusion,
            format!("event is included under root {root}"),
        ),
        MerkleOutcome::Failed(e) => CheckResult::failed(CheckId::MerkleInclusion, e.to_string()),
    };

    let token = match &report.token {
        None => CheckResult::skipped(
            CheckId::TimestampToken,
            "not examined: the inclusion proof did not verify",
        ),
        Some(t) if !t.status.is_success() => {
            CheckResult::failed(CheckId::TimestampToken, format!("{}: {}", t.status, t.detail))
        }
        Some(t) if t.warnings.is_empty() => CheckResult::passed(CheckId::TimestampToken, &t.detail),
        Some(t) => CheckResult::warning(
            CheckId::TimestampToken,
            format!("{}; {}", t.detail, t.warnings.join("; ")),
        ),
    };
    (merkle, token)
}

/// Check a carried tombstone against the event.  Returns the check and
/// whether the event is validly invalidated.
fn check_invalidation(proof: &ParsedProof, digest: Option<&ContentDigest>) -> (CheckResult, bool) {
    let Some(tombstone) = &proof.tombstone else {
        return (CheckResult::skipped(CheckId::Invalidation, "no tombstone"), false);
    };
    let fail = |reason: String| (CheckResult::failed(CheckId::Invalidation, reason), false);

    let computed = match tombstone_digest(tombstone) {
        Ok(d) => d,
        Err(e) => return fail(format!("tombstone digest could not be computed: {e}")),
    };
    match ContentDigest::parse(&tombstone.tombstone_hash) {
        Ok(stored) if stored == computed => {}
        Ok(stored) => {
            return fail(format!(
                "tombstone digest {computed} does not match the stored {stored}"
            ))
        }
        Err(e) => return fail(format!("stored tombstone digest is unusable: {e}")),
    }

    if tombstone.target_event_id != proof.summary.event_id {
        return fail(format!(
            "tombstone targets event '{}', not '{}'",
            tombstone.target_event_id, proof.summary.event_id
        ));
    }
    let event_digest = match digest {
        Some(d) => Ok(*d),
        None => ContentDigest::parse(&proof.claimed_event_hash),
    };
    match (ContentDigest::parse(&tombstone.target_event_hash), event_digest) {
        (Ok(target), Ok(event)) if target == event => {}
        (Ok(target), Ok(event)) => {
            return fail(format!(
                "tombstone target digest {target} does not match the event digest {event}"
            ))
        }
        (Err(e), _) | (_, Err(e)) => return fail(format!("target digest is unusable: {e}")),
    }

    match decode_base64(&tombstone.public_key) {
        Ok(key) if Some(key.as_slice()) == proof.verification_key() => {}
        Ok(_) => return fail("tombstone is signed by a different key than the event".to_string()),
        Err(e) => return fail(format!("tombstone public key is not base64: {e}")),
    }
    match verify_record_signature(&computed, &tombstone.signature, &tombstone.public_key) {
        Ok(true) => {}
        Ok(false) => return fail("tombstone signature does not verify".to_string()),
        Err(e) => return fail(format!("tombstone signature could not be checked: {e}")),
    }

    (
        CheckResult::warning(
            CheckId::Invalidation,
            format!(
                "event was invalidated at {} ({:?}, {:?}-initiated)",
                tombstone.timestamp, tombstone.reason, tombstone.executor
            ),
        ),
        true,
    )
}

fn display_fields(proof: &ParsedProof, report: Option<&AnchorReport>) -> DisplayFields {
    let summary = &proof.summary;
    let token_time = report
        .and_then(|r| r.token.as_ref())
        .and_then(|t| t.gen_time)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true));
    let anchor = proof.anchor.as_ref();

    DisplayFields {
        capture_time: (!summary.timestamp.is_empty()).then(|| summary.timestamp.clone()),
        device_model: summary.device_model.clone(),
        flash_mode: summary.flash_mode.clone(),
        signer_name: proof.signer_name.clone(),
        tsa_service: anchor.and_then(|a| a.tsa_service.clone()),
        tsa_time: token_time.or_else(|| anchor.and_then(|a| a.tsa_time.clone())),
        location: summary.location.clone(),
        human_attested: proof.attestation.human_attested,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checks(statuses: &[(CheckId, CheckStatus)]) -> Vec<CheckResult> {
        statuses
            .iter()
            .map(|(id, status)| CheckResult::new(*id, *status, "test"))
            .collect()
    }

    #[test]
    fn signature_failure_outranks_digest_failure() {
        let c = checks(&[
            (CheckId::EventHash, CheckStatus::Failed),
            (CheckId::Signature, CheckStatus::Failed),
        ]);
        assert_eq!(overall_status(&c, false, false), VerificationStatus::SignatureInvalid);
    }

    #[test]
    fn digest_failure_outranks_other_failures() {
        let c = checks(&[
            (CheckId::Version, CheckStatus::Failed),
            (CheckId::AssetHash, CheckStatus::Failed),
        ]);
        assert_eq!(overall_status(&c, true, false), VerificationStatus::HashMismatch);
    }

    #[test]
    fn other_failure_is_error_even_with_anchor() {
        let c = checks(&[
            (CheckId::Signature, CheckStatus::Passed),
            (CheckId::MerkleInclusion, CheckStatus::Failed),
        ]);
        assert_eq!(overall_status(&c, false, false), VerificationStatus::Error);
    }

    #[test]
    fn skips_and_warnings_do_not_downgrade() {
        let c = checks(&[
            (CheckId::Signature, CheckStatus::Passed),
            (CheckId::AssetHash, CheckStatus::Skipped),
            (CheckId::TimestampToken, CheckStatus::Warning),
        ]);
        assert_eq!(overall_status(&c, false, false), VerificationStatus::Verified);
        assert_eq!(overall_status(&c, true, false), VerificationStatus::AnchorVerified);
    }

    #[test]
    fn invalidation_outranks_anchor_but_not_failures() {
        let ok = checks(&[(CheckId::Invalidation, CheckStatus::Warning)]);
        assert_eq!(overall_status(&ok, true, true), VerificationStatus::Invalidated);

        let bad = checks(&[
            (CheckId::Signature, CheckStatus::Failed),
            (CheckId::Invalidation, CheckStatus::Warning),
        ]);
        assert_eq!(overall_status(&bad, true, true), VerificationStatus::SignatureInvalid);
    }
}
