//! A test time-stamp authority: root CA, issuing CA, and TSA signer.
//!
//! Tokens use the JSON envelope the anchor crate's default parser reads.

use serde_json::{json, Value};

use proofline_contracts::{anchor::Certificate, digest::ContentDigest};
use proofline_core::{canonicalize_value, record::value_digest};

use crate::keys::TestKey;

pub const ROOT_NAME: &str = "Proofline Test Root CA";
pub const ISSUING_NAME: &str = "Proofline Test Issuing CA";
pub const TSA_NAME: &str = "Proofline Test TSA";
pub const TSA_SERVICE: &str = "https://tsa.test.invalid/tsr";
pub const SIGNER_SERIAL: &str = "5001";
pub const ISSUING_SERIAL: &str = "4001";

/// A generation time inside every fixture certificate's validity window.
pub const GEN_TIME: &str = "2025-03-01T12:30:00Z";

/// Fields of a certificate to issue.
pub struct CertSpec<'a> {
    pub subject: &'a str,
    pub serial: &'a str,
    pub not_before: &'a str,
    pub not_after: &'a str,
    pub is_ca: bool,
}

/// A certificate for `subject_key`, signed by `issuer_key` over the
/// canonical certificate without its signature.
pub fn issue_certificate(
    issuer_name: &str,
    issuer_key: &TestKey,
    subject_key: &TestKey,
    spec: CertSpec<'_>,
) -> Value {
    let mut cert = json!({
        "serialNumber": spec.serial,
        "subject": spec.subject,
        "issuer": issuer_name,
        "notBefore": spec.not_before,
        "notAfter": spec.not_after,
        "publicKey": subject_key.public_key_b64(),
        "isCa": spec.is_ca,
    });
    let tbs = value_digest(&cert, &Certificate::UNSIGNED_FIELDS);
    cert["signature"] = Value::String(issuer_key.sign_b64(&tbs));
    cert
}

pub struct TestAuthority {
    pub root_key: TestKey,
    pub issuing_key: TestKey,
    pub signer_key: TestKey,
    pub issuing_cert: Value,
    pub signer_cert: Value,
}

impl Default for TestAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAuthority {
    /// Signer valid 2024-01-01 to 2026-01-01.
    pub fn new() -> Self {
        Self::with_signer_validity("2024-01-01T00:00:00Z", "2026-01-01T00:00:00Z")
    }

    pub fn with_signer_validity(not_before: &str, not_after: &str) -> Self {
        let root_key = TestKey::from_seed(200);
        let issuing_key = TestKey::from_seed(201);
        let signer_key = TestKey::from_seed(202);
        let issuing_cert = issue_certificate(
            ROOT_NAME,
            &root_key,
            &issuing_key,
            CertSpec {
                subject: ISSUING_NAME,
                serial: ISSUING_SERIAL,
                not_before: "2020-01-01T00:00:00Z",
                not_after: "2035-01-01T00:00:00Z",
                is_ca: true,
            },
        );
        let signer_cert = issue_certificate(
            ISSUING_NAME,
            &issuing_key,
            &signer_key,
            CertSpec {
                subject: TSA_NAME,
                serial: SIGNER_SERIAL,
                not_before,
                not_after,
                is_ca: false,
            },
        );
        Self {
            root_key,
            issuing_key,
            signer_key,
            issuing_cert,
            signer_cert,
        }
    }

    /// Name and key to configure as the trusted root.
    pub fn trust_anchor(&self) -> (String, Vec<u8>) {
        (ROOT_NAME.to_string(), self.root_key.public_key_bytes())
    }

    /// A well-formed token over `imprint`, carrying the full chain.
    pub fn token(&self, imprint: &ContentDigest, gen_time: &str) -> Vec<u8> {
        self.token_with(
            imprint,
            gen_time,
            &self.signer_key,
            vec![self.signer_cert.clone(), self.issuing_cert.clone()],
        )
    }

    /// A token with an explicit signing key and certificate list.
    pub fn token_with(
        &self,
        imprint: &ContentDigest,
        gen_time: &str,
        signing_key: &TestKey,
        certificates: Vec<Value>,
    ) -> Vec<u8> {
        let tst_info = json!({
            "version": 1,
            "policy": "1.3.6.1.4.1.99999.1",
            "serialNumber": "2a",
            "genTime": gen_time,
            "tsa": TSA_NAME,
            "messageImprint": {
                "hashAlgorithm": "sha256",
                "hashedMessage": imprint.to_hex(),
            },
        });
        let signed = value_digest(&tst_info, &[]);
        let envelope = json!({
            "tstInfo": tst_info,
            "signature": signing_key.sign_b64(&signed),
            "certificates": certificates,
        });
        canonicalize_value(&envelope)
    }
}
