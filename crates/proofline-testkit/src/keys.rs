//! Deterministic signing keys.

use ed25519_dalek::{Signer, SigningKey};

use proofline_contracts::{digest::ContentDigest, error::ProoflineResult, event::RecordSignature};
use proofline_core::{signature::encode_base64, EventSigner, SIGNATURE_ALGORITHM};

/// An Ed25519 key derived from a one-byte seed, so fixtures are reproducible.
pub struct TestKey {
    signing: SigningKey,
}

impl TestKey {
    pub fn from_seed(seed: u8) -> Self {
        Self {
            signing: SigningKey::from_bytes(&[seed; 32]),
        }
    }

    /// The capture device's key.
    pub fn device() -> Self {
        Self::from_seed(1)
    }

    /// A key unrelated to any fixture record.
    pub fn stranger() -> Self {
        Self::from_seed(99)
    }

    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.signing.verifying_key().to_bytes().to_vec()
    }

    pub fn public_key_b64(&self) -> String {
        encode_base64(&self.public_key_bytes())
    }

    /// Sign the raw digest bytes.
    pub fn sign(&self, digest: &ContentDigest) -> Vec<u8> {
        self.signing.sign(digest.as_bytes()).to_bytes().to_vec()
    }

    pub fn sign_b64(&self, digest: &ContentDigest) -> String {
        encode_base64(&self.sign(digest))
    }

    pub fn record_signature(&self, digest: &ContentDigest) -> RecordSignature {
        RecordSignature {
            algorithm: SIGNATURE_ALGORITHM.to_string(),
            value: self.sign_b64(digest),
        }
    }
}

impl EventSigner for TestKey {
    fn public_key(&self) -> Vec<u8> {
        self.public_key_bytes()
    }

    fn sign_digest(&self, digest: &ContentDigest) -> ProoflineResult<Vec<u8>> {
        Ok(self.sign(digest))
    }
}
