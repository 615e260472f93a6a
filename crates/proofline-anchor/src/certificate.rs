//! Certificate link checks and chain-to-root validation.
//!
//! Every validity window is evaluated at the token's generation time, which
//! the caller passes in.  Nothing here reads the current clock.

use chrono::{DateTime, Utc};
use thiserror::Error;

use proofline_contracts::{anchor::Certificate, digest::ContentDigest, error::ProoflineResult};
use proofline_core::{
    record::value_digest,
    signature::decode_base64,
    to_canonical_value, verify_signature,
};
use proofline_policy::TrustStore;

/// Why a certificate chain did not reach a trusted root.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("no trust anchors are configured")]
    NoTrustAnchors,

    #[error("certificate '{subject}' (serial {serial}) was not valid at {at}")]
    NotValidAt {
        subject: String,
        serial: String,
        at: DateTime<Utc>,
    },

    #[error("issuer '{issuer}' of '{subject}' is not a certificate authority")]
    IssuerNotCa { subject: String, issuer: String },

    #[error("signature on '{subject}' does not verify with any key for '{issuer}'")]
    BadLinkSignature { subject: String, issuer: String },

    #[error("issuer '{issuer}' of '{subject}' is neither trusted nor carried in the token")]
    UntrustedIssuer { subject: String, issuer: String },
}

/// Digest of the certificate's to-be-signed bytes.
///
/// Uses the digest the parser recorded from the received bytes when present.
pub fn tbs_digest(cert: &Certificate) -> ProoflineResult<ContentDigest> {
    match cert.tbs_digest {
        Some(digest) => Ok(digest),
        None => {
            let value = to_canonical_value(cert)?;
            Ok(value_digest(&value, &Certificate::UNSIGNED_FIELDS))
        }
    }
}

/// True when `cert` carries a valid signature by `issuer_key`.
pub fn signed_by(cert: &Certificate, issuer_key: &[u8]) -> bool {
    let Ok(digest) = tbs_digest(cert) else {
        return false;
    };
    let Ok(signature) = decode_base64(&cert.signature) else {
        return false;
    };
    verify_signature(&digest, &signature, issuer_key)
}

/// Raw public key bytes of `cert`, if its key field decodes.
pub fn subject_key(cert: &Certificate) -> Option<Vec<u8>> {
    decode_base64(&cert.public_key).ok()
}

/// Walk from `signer` through the carried `intermediates` to a configured
/// trust anchor.  Returns the certificates on the path, signer first.
pub fn validate_chain<'a>(
    signer: &'a Certificate,
    intermediates: &'a [Certificate],
    trust: &TrustStore,
    at: DateTime<Utc>,
) -> Result<Vec<&'a Certificate>, ChainError> {
    if trust.is_empty() {
        return Err(ChainError::NoTrustAnchors);
    }

    let mut used = vec![false; intermediates.len()];
    let mut path = vec![signer];
    let mut current = signer;

    loop {
        if !current.is_valid_at(at) {
            return Err(ChainError::NotValidAt {
                subject: current.subject.clone(),
                serial: current.serial_number.clone(),
                at,
            });
        }

        if trust
            .named(&current.issuer)
            .any(|anchor| signed_by(current, &anchor.public_key))
        {
            return Ok(path);
        }

        let candidates: Vec<usize> = intermediates
            .iter()
            .enumerate()
            .filter(|(i, c)| !used[*i] && c.subject == current.issuer)
            .map(|(i, _)| i)
            .collect();

        if candidates.is_empty() {
            let known_name = trust.named(&current.issuer).next().is_some();
            return Err(if known_name {
                ChainError::BadLinkSignature {
                    subject: current.subject.clone(),
                    issuer: current.issuer.clone(),
                }
            } else {
                ChainError::UntrustedIssuer {
                    subject: current.subject.clone(),
                    issuer: current.issuer.clone(),
                }
            });
        }

        let issuer_index = candidates.into_iter().find(|&i| {
            subject_key(&intermediates[i])
                .map(|key| signed_by(current, &key))
                .unwrap_or(false)
        });
        let Some(i) = issuer_index else {
            return Err(ChainError::BadLinkSignature {
                subject: current.subject.clone(),
                issuer: current.issuer.clone(),
            });
        };

        let issuer = &intermediates[i];
        if !issuer.is_ca {
            return Err(ChainError::IssuerNotCa {
                subject: current.subject.clone(),
                issuer: issuer.subject.clone(),
            });
        }

        used[i] = true;
        path.push(issuer);
        current = issuer;
    }
}
