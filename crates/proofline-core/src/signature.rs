//! Ed25519 signature verification over content digests.
//!
//! A signature always covers the 32 raw digest bytes.  The digest is never
//! hashed a second time before verification; pre-hashing here would make
//! every legitimately signed record fail.

use base64::{
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD},
    Engine as _,
};
use ed25519_dalek::{Signature, VerifyingKey, PUBLIC_KEY_LENGTH};

use proofline_contracts::{
    digest::ContentDigest,
    error::{ProoflineError, ProoflineResult},
    event::RecordSignature,
};

/// The only signature algorithm label this engine accepts.
pub const SIGNATURE_ALGORITHM: &str = "Ed25519";

/// Decode base64 in any of the common alphabets, padded or not.
pub fn decode_base64(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let trimmed = value.trim();
    STANDARD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .or_else(|_| URL_SAFE.decode(trimmed))
        .or_else(|_| URL_SAFE_NO_PAD.decode(trimmed))
}

/// Standard padded base64.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Parse raw public key bytes into a verifying key.
pub fn parse_public_key(public_key: &[u8]) -> ProoflineResult<VerifyingKey> {
    let bytes: [u8; PUBLIC_KEY_LENGTH] =
        public_key
            .try_into()
            .map_err(|_| ProoflineError::InvalidPublicKey {
                reason: format!(
                    "expected {PUBLIC_KEY_LENGTH} bytes, got {}",
                    public_key.len()
                ),
            })?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| ProoflineError::InvalidPublicKey {
        reason: e.to_string(),
    })
}

/// Verify `signature` over `digest` with `public_key`, distinguishing
/// malformed inputs from a signature that simply does not verify.
pub fn try_verify_signature(
    digest: &ContentDigest,
    signature: &[u8],
    public_key: &[u8],
) -> ProoflineResult<bool> {
    let key = parse_public_key(public_key)?;
    let sig = Signature::from_slice(signature).map_err(|e| {
        ProoflineError::InvalidSignatureEncoding {
            reason: e.to_string(),
        }
    })?;
    Ok(key.verify_strict(digest.as_bytes(), &sig).is_ok())
}

/// True iff `signature` is a valid signature over the raw bytes of `digest`.
/// Malformed keys and signatures are simply invalid.
pub fn verify_signature(digest: &ContentDigest, signature: &[u8], public_key: &[u8]) -> bool {
    try_verify_signature(digest, signature, public_key).unwrap_or(false)
}

/// Verify a stored record signature whose key and value are base64 strings.
pub fn verify_record_signature(
    digest: &ContentDigest,
    signature: &RecordSignature,
    public_key_b64: &str,
) -> ProoflineResult<bool> {
    if !signature.algorithm.eq_ignore_ascii_case(SIGNATURE_ALGORITHM) {
        return Err(ProoflineError::InvalidSignatureEncoding {
            reason: format!("unsupported signature algorithm '{}'", signature.algorithm),
        });
    }
    let sig = decode_base64(&signature.value).map_err(|e| {
        ProoflineError::InvalidSignatureEncoding {
            reason: format!("signature is not base64: {e}"),
        }
    })?;
    let key = decode_base64(public_key_b64).map_err(|e| ProoflineError::InvalidPublicKey {
        reason: format!("public key is not base64: {e}"),
    })?;
    try_verify_signature(digest, &sig, &key)
}
