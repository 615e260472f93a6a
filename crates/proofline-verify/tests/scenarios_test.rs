//! End-to-end verification of proof documents built from signed fixtures.

use std::io::Cursor;

use serde_json::{json, Value};

use proofline_anchor::MerkleBatch;
use proofline_contracts::{
    error::ProoflineError,
    event::Event,
    policy::PolicyPreset,
    result::{CheckId, CheckStatus, VerificationResult, VerificationStatus},
};
use proofline_core::{sha256, signature::encode_base64, CancellationToken};
use proofline_policy::VerifierPolicy;
use proofline_testkit::{
    digest_of, full_anchor, full_proof, minimal_anchor, minimal_proof, records::event_id,
    sample_media, signed_event, signed_tombstone, to_text, tsa::TSA_SERVICE, Observed,
    RecordingObserver, TestAuthority, TestKey, CHAIN_ID, GEN_TIME,
};
use proofline_verify::{MediaSource, ProofJob, ProofVerifier, VerifyOptions};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn verifier() -> ProofVerifier {
    ProofVerifier::new(VerifierPolicy::default()).expect("default verifier builds")
}

fn trusting(tsa: &TestAuthority) -> ProofVerifier {
    let (name, key) = tsa.trust_anchor();
    ProofVerifier::new(VerifierPolicy::default().with_trust_anchor(name, key))
        .expect("verifier builds")
}

fn event() -> Event {
    signed_event(&TestKey::device(), CHAIN_ID, 0, "")
}

fn status(result: &VerificationResult, id: CheckId) -> CheckStatus {
    result
        .check(id)
        .unwrap_or_else(|| panic!("check {id} missing from result"))
        .status
}

fn detail(result: &VerificationResult, id: CheckId) -> String {
    result.check(id).map(|c| c.detail.clone()).unwrap_or_default()
}

fn verify_doc(verifier: &ProofVerifier, doc: &Value) -> VerificationResult {
    verifier.verify(&to_text(doc), None).expect("no media, no error")
}

fn verify_with_media(verifier: &ProofVerifier, doc: &Value, media: &[u8]) -> VerificationResult {
    let mut cursor = Cursor::new(media);
    verifier
        .verify(&to_text(doc), Some(&mut cursor))
        .expect("in-memory media never fails to read")
}

/// A proof whose Merkle-root anchor commits the event at index 1 of 4.
fn anchored_minimal(event: &Event, tsa: &TestAuthority) -> Value {
    let leaves = vec![
        sha256(b"neighbour 0"),
        digest_of(event),
        sha256(b"neighbour 2"),
        sha256(b"neighbour 3"),
    ];
    let batch = MerkleBatch::new(leaves);
    let commitment = batch.commitment(1).expect("leaf 1 exists");
    let root = batch.root().expect("non-empty batch");
    let token = tsa.token(&root, GEN_TIME);

    let mut doc = minimal_proof(event);
    doc["anchor"] = minimal_anchor(Some(&commitment), &token, GEN_TIME);
    doc
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

/// Minimal proof, no anchor, no media.
#[test]
fn scenario_a_minimal_proof_without_media_is_verified() {
    let result = verify_doc(&verifier(), &minimal_proof(&event()));

    assert_eq!(result.status, VerificationStatus::Verified);
    assert_eq!(status(&result, CheckId::AssetHash), CheckStatus::Skipped);
    let ids: Vec<CheckId> = result.checks.iter().map(|c| c.id).collect();
    assert_eq!(ids, CheckId::ORDER.to_vec(), "every check is reported, in order");
    for id in [CheckId::Parse, CheckId::Version, CheckId::EventHash, CheckId::Signature] {
        assert_eq!(status(&result, id), CheckStatus::Passed, "{id}: {}", detail(&result, id));
    }
    assert_eq!(result.event_id.as_deref(), Some(event().event_id.as_str()));
}

/// Same proof with media whose digest differs from the asset hash.
#[test]
fn scenario_b_mismatched_media_is_hash_mismatch() {
    let result = verify_with_media(&verifier(), &minimal_proof(&event()), b"edited pixels");

    assert_eq!(result.status, VerificationStatus::HashMismatch);
    assert_eq!(status(&result, CheckId::AssetHash), CheckStatus::Failed);
    assert_eq!(status(&result, CheckId::Signature), CheckStatus::Passed);
}

/// A well-formed anchor whose inclusion path does not reach the root.
#[test]
fn scenario_c_broken_inclusion_path_is_error() {
    let tsa = TestAuthority::new();
    let event = event();
    let mut doc = anchored_minimal(&event, &tsa);
    doc["anchor"]["merkle_proof"][0] = json!(sha256(b"forged sibling").to_string());

    let result = verify_doc(&trusting(&tsa), &doc);

    assert_eq!(status(&result, CheckId::EventHash), CheckStatus::Passed);
    assert_eq!(status(&result, CheckId::Signature), CheckStatus::Passed);
    assert_eq!(status(&result, CheckId::MerkleInclusion), CheckStatus::Failed);
    assert_eq!(
        status(&result, CheckId::TimestampToken),
        CheckStatus::Skipped,
        "token is not examined after a failed inclusion proof"
    );
    assert_eq!(result.status, VerificationStatus::Error);
}

/// Unknown format version with otherwise valid cryptography.
#[test]
fn scenario_d_unsupported_version_completes_best_effort() {
    let mut doc = minimal_proof(&event());
    doc["proof_version"] = json!("9.9");

    let result = verify_with_media(&verifier(), &doc, &sample_media());

    assert_eq!(status(&result, CheckId::Version), CheckStatus::Failed);
    assert!(detail(&result, CheckId::Version).contains("9.9"));
    for id in [CheckId::Parse, CheckId::EventHash, CheckId::Signature, CheckId::AssetHash] {
        assert_eq!(status(&result, id), CheckStatus::Passed, "{id}: {}", detail(&result, id));
    }
    assert_eq!(result.status, VerificationStatus::Error);
}

// ── Minimal variant ───────────────────────────────────────────────────────────

#[test]
fn matching_media_passes_asset_check() {
    let result = verify_with_media(&verifier(), &minimal_proof(&event()), &sample_media());
    assert_eq!(result.status, VerificationStatus::Verified);
    assert_eq!(status(&result, CheckId::AssetHash), CheckStatus::Passed);
}

#[test]
fn edited_claimed_hash_is_hash_mismatch_not_signature_invalid() {
    let mut doc = minimal_proof(&event());
    doc["event_hash"] = json!(sha256(b"something else").to_string());

    let result = verify_doc(&verifier(), &doc);

    assert_eq!(status(&result, CheckId::EventHash), CheckStatus::Failed);
    assert_eq!(
        status(&result, CheckId::Signature),
        CheckStatus::Passed,
        "the signature is checked over the recomputed digest, not the claimed one"
    );
    assert_eq!(result.status, VerificationStatus::HashMismatch);
}

#[test]
fn summary_edited_apart_from_raw_bytes_fails_event_hash() {
    let mut doc = minimal_proof(&event());
    doc["event"]["event_id"] = json!(event_id(42));

    let result = verify_doc(&verifier(), &doc);

    assert_eq!(status(&result, CheckId::EventHash), CheckStatus::Failed);
    assert!(detail(&result, CheckId::EventHash).contains("summary event id"));
    assert_eq!(result.status, VerificationStatus::HashMismatch);
}

#[test]
fn edited_raw_bytes_break_the_signature() {
    let event = event();
    let mut doc = minimal_proof(&event);
    let mut tampered = event.clone();
    tampered.timestamp = "2030-01-01T00:00:00Z".to_string();
    let forged = minimal_proof(&tampered);
    doc["raw_event"] = forged["raw_event"].clone();

    let result = verify_doc(&verifier(), &doc);

    assert_eq!(status(&result, CheckId::EventHash), CheckStatus::Failed);
    assert_eq!(status(&result, CheckId::Signature), CheckStatus::Failed);
    assert_eq!(result.status, VerificationStatus::SignatureInvalid);
}

#[test]
fn missing_raw_event_fails_event_hash_and_skips_signature() {
    let mut doc = minimal_proof(&event());
    doc.as_object_mut().unwrap().remove("raw_event");

    let result = verify_doc(&verifier(), &doc);

    assert_eq!(status(&result, CheckId::EventHash), CheckStatus::Failed);
    assert_eq!(status(&result, CheckId::Signature), CheckStatus::Skipped);
    assert_eq!(result.status, VerificationStatus::HashMismatch);
}

#[test]
fn signature_by_another_key_is_signature_invalid() {
    let event = event();
    let mut doc = minimal_proof(&event);
    doc["signature"]["value"] = json!(TestKey::stranger().sign_b64(&digest_of(&event)));

    let result = verify_doc(&verifier(), &doc);

    assert_eq!(status(&result, CheckId::Signature), CheckStatus::Failed);
    assert!(detail(&result, CheckId::Signature).contains("does not verify"));
    assert_eq!(result.status, VerificationStatus::SignatureInvalid);
}

#[test]
fn unsupported_signature_algorithm_fails_signature() {
    let mut doc = minimal_proof(&event());
    doc["signature"]["algorithm"] = json!("ECDSA-P256-SHA256");

    let result = verify_doc(&verifier(), &doc);

    assert!(detail(&result, CheckId::Signature).contains("unsupported signature algorithm"));
    assert_eq!(result.status, VerificationStatus::SignatureInvalid);
}

#[test]
fn document_key_differing_from_attested_key_is_key_substitution() {
    let mut doc = minimal_proof(&event());
    doc["public_key"] = json!(TestKey::stranger().public_key_b64());

    let result = verify_doc(&verifier(), &doc);

    assert!(detail(&result, CheckId::Signature).contains("key substitution"));
    assert_eq!(result.status, VerificationStatus::SignatureInvalid);
}

#[test]
fn no_key_anywhere_is_a_distinct_failure() {
    let key = TestKey::device();
    let raw = br#"{"asset":{"assetHash":"sha256:0000000000000000000000000000000000000000000000000000000000000000"},"eventId":"evt-bare","timestamp":"2025-03-01T12:00:00Z"}"#;
    let digest = sha256(raw);
    let doc = json!({
        "proof_version": "1.0",
        "event": {
            "event_id": "evt-bare",
            "timestamp": "2025-03-01T12:00:00Z",
            "asset_hash": "sha256:0000000000000000000000000000000000000000000000000000000000000000"
        },
        "raw_event": encode_base64(raw),
        "event_hash": digest.to_string(),
        "signature": { "algorithm": "Ed25519", "value": key.sign_b64(&digest) }
    });

    let result = verify_doc(&verifier(), &doc);

    assert_eq!(status(&result, CheckId::EventHash), CheckStatus::Passed);
    assert_eq!(status(&result, CheckId::Signature), CheckStatus::Failed);
    assert!(
        detail(&result, CheckId::Signature).contains("no public key supplied"),
        "got: {}",
        detail(&result, CheckId::Signature)
    );
}

// ── Full variant ──────────────────────────────────────────────────────────────

#[test]
fn full_proof_verifies_and_fills_display_fields() {
    let result = verify_doc(&verifier(), &full_proof(&event()));

    assert_eq!(result.status, VerificationStatus::Verified);
    assert!(detail(&result, CheckId::Parse).starts_with("full"));
    let display = &result.display;
    assert_eq!(display.device_model.as_deref(), Some("iPhone15,3"));
    assert_eq!(display.signer_name.as_deref(), Some("Test Device"));
    assert_eq!(display.flash_mode.as_deref(), Some("off"));
    assert_eq!(display.capture_time.as_deref(), Some(event().timestamp.as_str()));
    assert_eq!(display.location.as_ref().map(|l| l.latitude), Some(37.7749));
    assert!(display.human_attested);
}

#[test]
fn full_proof_with_edited_field_is_signature_invalid() {
    let mut doc = full_proof(&event());
    doc["event"]["captureContext"]["deviceModel"] = json!("Pixel 9");

    let result = verify_doc(&verifier(), &doc);

    assert_eq!(status(&result, CheckId::EventHash), CheckStatus::Failed);
    assert_eq!(status(&result, CheckId::Signature), CheckStatus::Failed);
    assert_eq!(result.status, VerificationStatus::SignatureInvalid);
}

#[test]
fn full_proof_with_substituted_key_fails_signature() {
    let mut doc = full_proof(&event());
    doc["publicKey"] = json!(TestKey::stranger().public_key_b64());

    let result = verify_doc(&verifier(), &doc);

    assert!(detail(&result, CheckId::Signature).contains("key substitution"));
    assert_eq!(result.status, VerificationStatus::SignatureInvalid);
}

// ── Anchors ───────────────────────────────────────────────────────────────────

#[test]
fn valid_merkle_anchor_is_anchor_verified() {
    let tsa = TestAuthority::new();
    let result = verify_doc(&trusting(&tsa), &anchored_minimal(&event(), &tsa));

    assert_eq!(status(&result, CheckId::MerkleInclusion), CheckStatus::Passed);
    assert_eq!(
        status(&result, CheckId::TimestampToken),
        CheckStatus::Passed,
        "{}",
        detail(&result, CheckId::TimestampToken)
    );
    assert_eq!(result.status, VerificationStatus::AnchorVerified);
    assert_eq!(result.display.tsa_service.as_deref(), Some(TSA_SERVICE));
    assert_eq!(result.display.tsa_time.as_deref(), Some(GEN_TIME));
}

#[test]
fn event_hash_anchor_in_full_proof_skips_inclusion() {
    let tsa = TestAuthority::new();
    let event = event();
    let mut doc = full_proof(&event);
    doc["anchor"] = full_anchor(None, &tsa.token(&digest_of(&event), GEN_TIME), GEN_TIME);

    let result = verify_doc(&trusting(&tsa), &doc);

    assert_eq!(status(&result, CheckId::MerkleInclusion), CheckStatus::Skipped);
    assert_eq!(status(&result, CheckId::TimestampToken), CheckStatus::Passed);
    assert_eq!(result.status, VerificationStatus::AnchorVerified);
}

#[test]
fn untrusted_root_warns_by_default_and_fails_when_strict() {
    let tsa = TestAuthority::new();
    let doc = anchored_minimal(&event(), &tsa);
    let verifier = verifier();

    let lenient = verify_doc(&verifier, &doc);
    assert_eq!(status(&lenient, CheckId::TimestampToken), CheckStatus::Warning);
    assert!(detail(&lenient, CheckId::TimestampToken).contains("warn-only"));
    assert_eq!(lenient.status, VerificationStatus::AnchorVerified);
    assert_eq!(lenient.warnings().count(), 1, "the warning stays visible");

    let options = VerifyOptions {
        preset: Some(PolicyPreset::Strict),
        ..VerifyOptions::default()
    };
    let strict = verifier.verify_with(&to_text(&doc), None, &options).unwrap();
    assert_eq!(status(&strict, CheckId::TimestampToken), CheckStatus::Failed);
    assert!(detail(&strict, CheckId::TimestampToken).contains("chain-verification-failed"));
    assert_eq!(strict.status, VerificationStatus::Error);
}

#[test]
fn token_for_another_root_fails_timestamp_check() {
    let tsa = TestAuthority::new();
    let event = event();
    let mut doc = anchored_minimal(&event, &tsa);
    let other = tsa.token(&sha256(b"another batch"), GEN_TIME);
    doc["anchor"]["tsa_token"] = json!(encode_base64(&other));

    let result = verify_doc(&trusting(&tsa), &doc);

    assert_eq!(status(&result, CheckId::MerkleInclusion), CheckStatus::Passed);
    assert_eq!(status(&result, CheckId::TimestampToken), CheckStatus::Failed);
    assert!(detail(&result, CheckId::TimestampToken).starts_with("tampered"));
    assert_eq!(result.status, VerificationStatus::Error);
}

// ── Invalidation ──────────────────────────────────────────────────────────────

#[test]
fn valid_tombstone_yields_invalidated() {
    let key = TestKey::device();
    let event = event();
    let tombstone = signed_tombstone(&key, &event, &event.event_hash, 1);
    let mut doc = minimal_proof(&event);
    doc["tombstone"] = serde_json::to_value(&tombstone).unwrap();

    let result = verify_doc(&verifier(), &doc);

    assert_eq!(
        status(&result, CheckId::Invalidation),
        CheckStatus::Warning,
        "{}",
        detail(&result, CheckId::Invalidation)
    );
    assert_eq!(result.status, VerificationStatus::Invalidated);
}

#[test]
fn tombstone_signed_by_another_key_fails() {
    let event = event();
    let tombstone = signed_tombstone(&TestKey::stranger(), &event, &event.event_hash, 1);
    let mut doc = full_proof(&event);
    doc["tombstone"] = serde_json::to_value(&tombstone).unwrap();

    let result = verify_doc(&verifier(), &doc);

    assert_eq!(status(&result, CheckId::Invalidation), CheckStatus::Failed);
    assert!(detail(&result, CheckId::Invalidation).contains("different key"));
    assert_eq!(result.status, VerificationStatus::Error);
}

#[test]
fn tombstone_for_another_event_fails() {
    let key = TestKey::device();
    let event = event();
    let other = signed_event(&key, CHAIN_ID, 7, &event.event_hash);
    let tombstone = signed_tombstone(&key, &other, &other.event_hash, 8);
    let mut doc = minimal_proof(&event);
    doc["tombstone"] = serde_json::to_value(&tombstone).unwrap();

    let result = verify_doc(&verifier(), &doc);

    assert_eq!(status(&result, CheckId::Invalidation), CheckStatus::Failed);
    assert!(detail(&result, CheckId::Invalidation).contains("targets event"));
}

// ── Parse failures ────────────────────────────────────────────────────────────

#[test]
fn unparseable_document_reports_every_check() {
    let result = verifier().verify("{\"not\": \"a proof\"}", None).unwrap();

    assert_eq!(result.status, VerificationStatus::Error);
    assert_eq!(status(&result, CheckId::Parse), CheckStatus::Failed);
    assert_eq!(result.checks.len(), CheckId::ORDER.len());
    for check in &result.checks[1..] {
        assert_eq!(check.status, CheckStatus::Skipped, "{}", check.id);
        assert!(!check.detail.is_empty());
    }
    assert!(result.event_id.is_none());
}

// ── Observer, cancellation, batch ─────────────────────────────────────────────

#[test]
fn observer_sees_checks_in_order_with_progress() {
    let observer = RecordingObserver::default();
    let media = sample_media();
    let options = VerifyOptions {
        observer: &observer,
        media_size: Some(media.len() as u64),
        ..VerifyOptions::default()
    };
    let mut cursor = Cursor::new(media.as_slice());
    let result = verifier()
        .verify_with(&to_text(&minimal_proof(&event())), Some(&mut cursor), &options)
        .unwrap();

    let seen = observer.seen();
    assert_eq!(seen.first(), Some(&Observed::Status(VerificationStatus::Verifying)));
    assert_eq!(seen.last(), Some(&Observed::Status(result.status)));

    let started: Vec<CheckId> = seen
        .iter()
        .filter_map(|o| match o {
            Observed::Started(id) => Some(*id),
            _ => None,
        })
        .collect();
    let finished: Vec<CheckId> = seen
        .iter()
        .filter_map(|o| match o {
            Observed::Finished(id, _) => Some(*id),
            _ => None,
        })
        .collect();
    assert_eq!(started, CheckId::ORDER.to_vec());
    assert_eq!(finished, CheckId::ORDER.to_vec());
    assert!(seen.contains(&Observed::Progress(media.len() as u64)));
}

#[test]
fn cancelled_verification_returns_no_result() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let options = VerifyOptions {
        cancel: Some(cancel),
        ..VerifyOptions::default()
    };
    let media = sample_media();
    let mut cursor = Cursor::new(media.as_slice());

    let outcome = verifier().verify_with(
        &to_text(&minimal_proof(&event())),
        Some(&mut cursor),
        &options,
    );

    assert!(matches!(outcome, Err(ProoflineError::Cancelled)));
}

#[test]
fn batch_keeps_job_order() {
    let doc = to_text(&minimal_proof(&event()));
    let jobs = vec![
        ProofJob {
            name: "good.json".to_string(),
            text: doc.clone(),
            media: Some(MediaSource::Bytes(sample_media())),
        },
        ProofJob {
            name: "edited.json".to_string(),
            text: doc,
            media: Some(MediaSource::Bytes(b"other bytes".to_vec())),
        },
        ProofJob {
            name: "junk.json".to_string(),
            text: "[]".to_string(),
            media: None,
        },
    ];

    let outcomes = verifier().verify_many(&jobs, None);

    let names: Vec<&str> = outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["good.json", "edited.json", "junk.json"]);
    let statuses: Vec<VerificationStatus> = outcomes
        .iter()
        .map(|o| o.result.as_ref().expect("in-memory jobs do not error").status)
        .collect();
    assert_eq!(
        statuses,
        [
            VerificationStatus::Verified,
            VerificationStatus::HashMismatch,
            VerificationStatus::Error
        ]
    );
}

#[test]
fn batch_streams_media_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let photo = dir.path().join("photo.jpg");
    std::fs::write(&photo, sample_media()).unwrap();
    let doc = to_text(&minimal_proof(&event()));
    let jobs = vec![
        ProofJob {
            name: "on-disk.json".to_string(),
            text: doc.clone(),
            media: Some(MediaSource::File(photo)),
        },
        ProofJob {
            name: "missing-media.json".to_string(),
            text: doc,
            media: Some(MediaSource::File(dir.path().join("absent.jpg"))),
        },
    ];

    let outcomes = verifier().verify_many(&jobs, None);

    let streamed = outcomes[0].result.as_ref().expect("media file opens");
    assert_eq!(streamed.status, VerificationStatus::Verified);
    assert_eq!(status(streamed, CheckId::AssetHash), CheckStatus::Passed);
    assert!(matches!(
        outcomes[1].result,
        Err(ProoflineError::MediaRead { .. })
    ));
}
