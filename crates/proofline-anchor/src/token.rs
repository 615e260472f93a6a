//! Default time-stamp token parser.
//!
//! Tokens are a JSON envelope:
//!
//! ```json
//! {
//!   "tstInfo": { "version": 1, "policy": "...", "serialNumber": "2a",
//!                "genTime": "2025-03-01T12:00:00Z", "tsa": "Example TSA",
//!                "messageImprint": { "hashAlgorithm": "sha256", "hashedMessage": "<hex>" } },
//!   "signature": "<base64 over sha256(canonical(tstInfo))>",
//!   "certificates": [ <signer>, <intermediates...> ]
//! }
//! ```
//!
//! The signed digest is taken over the canonical form of the `tstInfo`
//! object exactly as received, and each certificate's to-be-signed digest
//! over the received certificate object minus its signature.  Neither is
//! recomputed from the decoded structs.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use proofline_contracts::{
    anchor::{Certificate, ParsedTimestampToken},
    digest::ContentDigest,
    error::{ProoflineError, ProoflineResult},
};
use proofline_core::{
    record::value_digest, signature::decode_base64, TimestampTokenParser,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageImprint {
    hash_algorithm: String,
    hashed_message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TstInfo {
    #[serde(default)]
    policy: Option<String>,
    serial_number: String,
    gen_time: DateTime<Utc>,
    #[serde(default)]
    tsa: Option<String>,
    message_imprint: MessageImprint,
}

fn malformed(reason: impl Into<String>) -> ProoflineError {
    ProoflineError::TokenMalformed {
        reason: reason.into(),
    }
}

/// Parser for the JSON token envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTimestampTokenParser;

impl JsonTimestampTokenParser {
    fn parse_certificate(value: &Value) -> ProoflineResult<Certificate> {
        let mut cert: Certificate = serde_json::from_value(value.clone())
            .map_err(|e| malformed(format!("certificate: {e}")))?;
        cert.tbs_digest = Some(value_digest(value, &Certificate::UNSIGNED_FIELDS));
        Ok(cert)
    }
}

impl TimestampTokenParser for JsonTimestampTokenParser {
    fn parse(&self, token: &[u8]) -> ProoflineResult<ParsedTimestampToken> {
        let envelope: Value =
            serde_json::from_slice(token).map_err(|e| malformed(format!("not JSON: {e}")))?;

        let tst_value = envelope
            .get("tstInfo")
            .ok_or_else(|| malformed("missing tstInfo"))?;
        let tst: TstInfo = serde_json::from_value(tst_value.clone())
            .map_err(|e| malformed(format!("tstInfo: {e}")))?;

        if !tst
            .message_imprint
            .hash_algorithm
            .eq_ignore_ascii_case("sha256")
        {
            return Err(malformed(format!(
                "unsupported imprint algorithm '{}'",
                tst.message_imprint.hash_algorithm
            )));
        }
        let message_imprint = ContentDigest::parse(&tst.message_imprint.hashed_message)
            .map_err(|e| malformed(format!("message imprint: {e}")))?;

        let signature = envelope
            .get("signature")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("missing signature"))
            .and_then(|s| {
                decode_base64(s).map_err(|e| malformed(format!("signature is not base64: {e}")))
            })?;

        let certificates = envelope
            .get("certificates")
            .and_then(Value::as_array)
            .ok_or_else(|| malformed("missing certificates"))?;
        let mut parsed = certificates
            .iter()
            .map(Self::parse_certificate)
            .collect::<ProoflineResult<Vec<_>>>()?
            .into_iter();
        let signer_certificate = parsed
            .next()
            .ok_or_else(|| malformed("token carries no signer certificate"))?;
        let intermediates: Vec<Certificate> = parsed.collect();

        debug!(
            serial = %tst.serial_number,
            gen_time = %tst.gen_time,
            signer = %signer_certificate.subject,
            intermediates = intermediates.len(),
            "time-stamp token decoded"
        );

        Ok(ParsedTimestampToken {
            message_imprint,
            gen_time: tst.gen_time,
            serial_number: tst.serial_number,
            policy: tst.policy,
            tsa_name: tst.tsa,
            signer_certificate,
            intermediates,
            signed_digest: value_digest(tst_value, &[]),
            signature,
        })
    }
}
