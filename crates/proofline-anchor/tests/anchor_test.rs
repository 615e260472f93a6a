//! Anchor verification against the test time-stamp authority.

use proofline_anchor::{
    certificate::{validate_chain, ChainError},
    AnchorStatus, AnchorVerifier, JsonTimestampTokenParser, MerkleBatch, MerkleOutcome,
};
use proofline_contracts::{
    anchor::{Anchor, AnchorGranularity},
    digest::ContentDigest,
    policy::{AnchorPolicy, LayerMode},
};
use proofline_core::{sha256, TimestampTokenParser};
use proofline_policy::{RevocationList, RevokedEntry, TrustStore, TrustAnchor};
use proofline_testkit::{
    tsa::{ISSUING_NAME, SIGNER_SERIAL},
    TestAuthority, TestKey, UnavailableRevocation, GEN_TIME,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn trust_for(tsa: &TestAuthority) -> TrustStore {
    let (name, public_key) = tsa.trust_anchor();
    TrustStore::new(vec![TrustAnchor { name, public_key }])
}

fn event_digest() -> ContentDigest {
    sha256(b"canonical event bytes")
}

fn direct_anchor(token: Vec<u8>) -> Anchor {
    Anchor {
        granularity: AnchorGranularity::EventHash,
        merkle: None,
        tsa_token: token,
        tsa_service: None,
        tsa_time: Some(GEN_TIME.to_string()),
    }
}

fn revoked_signer(at: &str) -> RevocationList {
    RevocationList::new(vec![RevokedEntry {
        serial_number: SIGNER_SERIAL.to_string(),
        issuer: ISSUING_NAME.to_string(),
        revoked_at: at.parse().unwrap(),
        reason: Some("keyCompromise".to_string()),
    }])
}

// ── Layer 1 ───────────────────────────────────────────────────────────────────

#[test]
fn well_formed_token_verifies_under_every_preset() {
    let tsa = TestAuthority::new();
    let verifier = AnchorVerifier::new(trust_for(&tsa));
    let anchor = direct_anchor(tsa.token(&event_digest(), GEN_TIME));

    for policy in [AnchorPolicy::default(), AnchorPolicy::strict(), AnchorPolicy::permissive()] {
        let report = verifier.verify(&event_digest(), &anchor, policy);
        let token = report.token.as_ref().expect("token is examined");
        assert_eq!(token.status, AnchorStatus::Verified, "policy {policy}: {}", token.detail);
        assert!(token.warnings.is_empty());
        assert_eq!(report.merkle, MerkleOutcome::NotUsed);
        assert!(report.is_success());
    }
}

#[test]
fn imprint_for_another_digest_is_tampered() {
    let tsa = TestAuthority::new();
    let verifier = AnchorVerifier::new(trust_for(&tsa));
    let anchor = direct_anchor(tsa.token(&sha256(b"some other event"), GEN_TIME));

    let report = verifier.verify(&event_digest(), &anchor, AnchorPolicy::default());
    assert_eq!(report.token.unwrap().status, AnchorStatus::Tampered);
}

#[test]
fn token_signed_by_wrong_key_is_signature_invalid() {
    let tsa = TestAuthority::new();
    let verifier = AnchorVerifier::new(trust_for(&tsa));
    let forged = tsa.token_with(
        &event_digest(),
        GEN_TIME,
        &TestKey::stranger(),
        vec![tsa.signer_cert.clone(), tsa.issuing_cert.clone()],
    );

    let report = verifier.verify(&event_digest(), &direct_anchor(forged), AnchorPolicy::permissive());
    assert_eq!(report.token.unwrap().status, AnchorStatus::SignatureInvalid);
}

#[test]
fn unreadable_token_is_malformed() {
    let tsa = TestAuthority::new();
    let verifier = AnchorVerifier::new(trust_for(&tsa));
    let report = verifier.verify(
        &event_digest(),
        &direct_anchor(b"\x30\x82garbage".to_vec()),
        AnchorPolicy::default(),
    );
    assert_eq!(report.token.unwrap().status, AnchorStatus::Malformed);
}

// ── Certificate-time invariance ───────────────────────────────────────────────

/// The signer certificate expires 2025-06-01, which is already in the past
/// whenever this runs.  A token generated while it was valid still verifies.
#[test]
fn certificate_is_judged_at_generation_time_not_now() {
    let tsa = TestAuthority::with_signer_validity("2024-01-01T00:00:00Z", "2025-06-01T00:00:00Z");
    let verifier = AnchorVerifier::new(trust_for(&tsa));

    let before_expiry = direct_anchor(tsa.token(&event_digest(), "2025-05-31T23:59:59Z"));
    let report = verifier.verify(&event_digest(), &before_expiry, AnchorPolicy::strict());
    let token = report.token.unwrap();
    assert_eq!(
        token.status,
        AnchorStatus::VerifiedWithWarnings,
        "only the claimed-time mismatch should be reported: {:?}",
        token.warnings
    );

    let mut exact = direct_anchor(tsa.token(&event_digest(), "2025-05-31T23:59:59Z"));
    exact.tsa_time = None;
    let report = verifier.verify(&event_digest(), &exact, AnchorPolicy::strict());
    assert_eq!(report.token.unwrap().status, AnchorStatus::Verified);
}

#[test]
fn token_generated_after_expiry_fails() {
    let tsa = TestAuthority::with_signer_validity("2024-01-01T00:00:00Z", "2025-06-01T00:00:00Z");
    let verifier = AnchorVerifier::new(trust_for(&tsa));
    let anchor = direct_anchor(tsa.token(&event_digest(), "2025-06-01T00:00:01Z"));

    let report = verifier.verify(&event_digest(), &anchor, AnchorPolicy::permissive());
    assert_eq!(
        report.token.unwrap().status,
        AnchorStatus::CertificateExpiredAtTimestamp
    );
}

// ── Layer 2: chain validation ─────────────────────────────────────────────────

#[test]
fn unknown_root_fails_required_and_warns_otherwise() {
    let tsa = TestAuthority::new();
    let stranger_root = TrustStore::new(vec![TrustAnchor {
        name: "Somebody Else's Root".to_string(),
        public_key: TestKey::stranger().public_key_bytes(),
    }]);
    let verifier = AnchorVerifier::new(stranger_root);
    let anchor = direct_anchor(tsa.token(&event_digest(), GEN_TIME));

    let required = AnchorPolicy {
        chain_validation: LayerMode::Required,
        revocation: LayerMode::Skip,
    };
    let token = verifier.verify(&event_digest(), &anchor, required).token.unwrap();
    assert_eq!(token.status, AnchorStatus::ChainVerificationFailed);
    assert!(token.detail.contains("(required)"), "detail must name the policy: {}", token.detail);

    let token = verifier
        .verify(&event_digest(), &anchor, AnchorPolicy::default())
        .token
        .unwrap();
    assert_eq!(token.status, AnchorStatus::VerifiedWithWarnings);
    assert!(token.warnings.iter().any(|w| w.contains("chain validation (warn-only)")));

    let token = verifier
        .verify(&event_digest(), &anchor, AnchorPolicy::permissive())
        .token
        .unwrap();
    assert_eq!(token.status, AnchorStatus::Verified);
}

#[test]
fn chain_walks_signer_through_intermediate_to_root() {
    let tsa = TestAuthority::new();
    let token = JsonTimestampTokenParser
        .parse(&tsa.token(&event_digest(), GEN_TIME))
        .unwrap();
    let path = validate_chain(
        &token.signer_certificate,
        &token.intermediates,
        &trust_for(&tsa),
        token.gen_time,
    )
    .unwrap();
    assert_eq!(path.len(), 2);
    assert_eq!(path[1].subject, ISSUING_NAME);
}

#[test]
fn missing_intermediate_is_untrusted_issuer() {
    let tsa = TestAuthority::new();
    let token_bytes = tsa.token_with(
        &event_digest(),
        GEN_TIME,
        &tsa.signer_key,
        vec![tsa.signer_cert.clone()],
    );
    let token = JsonTimestampTokenParser.parse(&token_bytes).unwrap();
    let err = validate_chain(&token.signer_certificate, &[], &trust_for(&tsa), token.gen_time)
        .unwrap_err();
    assert!(matches!(err, ChainError::UntrustedIssuer { .. }), "got {err:?}");
}

// ── Layer 2: revocation ───────────────────────────────────────────────────────

#[test]
fn revocation_before_generation_is_fatal_only_when_required() {
    let tsa = TestAuthority::new();
    let anchor = direct_anchor(tsa.token(&event_digest(), GEN_TIME));
    let verifier = AnchorVerifier::new(trust_for(&tsa))
        .with_revocation(Box::new(revoked_signer("2025-02-01T00:00:00Z")));

    let strict = verifier.verify(&event_digest(), &anchor, AnchorPolicy::strict());
    assert_eq!(strict.token.unwrap().status, AnchorStatus::CertificateRevoked);

    let default = verifier.verify(&event_digest(), &anchor, AnchorPolicy::default());
    let token = default.token.unwrap();
    assert_eq!(token.status, AnchorStatus::VerifiedWithWarnings);
    assert!(token.warnings.iter().any(|w| w.contains("revoked")));
}

#[test]
fn revocation_after_generation_does_not_invalidate() {
    let tsa = TestAuthority::new();
    let anchor = direct_anchor(tsa.token(&event_digest(), GEN_TIME));
    let verifier = AnchorVerifier::new(trust_for(&tsa))
        .with_revocation(Box::new(revoked_signer("2025-09-01T00:00:00Z")));

    let report = verifier.verify(&event_digest(), &anchor, AnchorPolicy::strict());
    assert_eq!(report.token.unwrap().status, AnchorStatus::Verified);
}

#[test]
fn unreachable_revocation_source_is_best_effort_by_default() {
    let tsa = TestAuthority::new();
    let anchor = direct_anchor(tsa.token(&event_digest(), GEN_TIME));
    let verifier =
        AnchorVerifier::new(trust_for(&tsa)).with_revocation(Box::new(UnavailableRevocation));

    let token = verifier
        .verify(&event_digest(), &anchor, AnchorPolicy::default())
        .token
        .unwrap();
    assert_eq!(token.status, AnchorStatus::VerifiedWithWarnings);

    let token = verifier
        .verify(&event_digest(), &anchor, AnchorPolicy::strict())
        .token
        .unwrap();
    assert_eq!(token.status, AnchorStatus::ChainVerificationFailed);
}

// ── Merkle-root anchors ───────────────────────────────────────────────────────

#[test]
fn merkle_root_anchor_stamps_the_root() {
    let tsa = TestAuthority::new();
    let leaves: Vec<ContentDigest> = (0..5).map(|i| sha256(&[i])).collect();
    let batch = MerkleBatch::new(leaves.clone());
    let root = batch.root().unwrap();
    let anchor = Anchor {
        granularity: AnchorGranularity::MerkleRoot,
        merkle: batch.commitment(4),
        tsa_token: tsa.token(&root, GEN_TIME),
        tsa_service: None,
        tsa_time: None,
    };
    let verifier = AnchorVerifier::new(trust_for(&tsa));

    let report = verifier.verify(&leaves[4], &anchor, AnchorPolicy::default());
    assert_eq!(report.merkle, MerkleOutcome::Included { root });
    assert!(report.is_success());

    let report = verifier.verify(&leaves[3], &anchor, AnchorPolicy::default());
    assert!(matches!(report.merkle, MerkleOutcome::Failed(_)));
    assert!(report.token.is_none(), "token is not examined after inclusion fails");
}

#[test]
fn merkle_root_anchor_without_proof_is_missing() {
    let tsa = TestAuthority::new();
    let anchor = Anchor {
        granularity: AnchorGranularity::MerkleRoot,
        merkle: None,
        tsa_token: tsa.token(&event_digest(), GEN_TIME),
        tsa_service: None,
        tsa_time: None,
    };
    let report = AnchorVerifier::new(trust_for(&tsa)).verify(
        &event_digest(),
        &anchor,
        AnchorPolicy::default(),
    );
    assert_eq!(report.merkle, MerkleOutcome::Missing);
    assert!(!report.is_success());
}
