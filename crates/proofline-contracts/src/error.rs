//! Error types for the proofline verification engine.
//!
//! Only structural problems and caller-side failures are errors. A digest or
//! signature that does not match is a normal verification outcome and is
//! reported through check results and chain reports instead.

use std::fmt::Display;

use thiserror::Error;

/// The unified error type for all proofline crates.
#[derive(Debug, Error)]
pub enum ProoflineError {
    /// A value could not be reduced to canonical bytes (opaque binary blob,
    /// non-string map key, or an integer outside the JSON-safe range).
    #[error("canonicalization failed: {reason}")]
    Canonicalization { reason: String },

    /// A digest string is not `sha256:<64 hex>` (or bare 64 hex).
    #[error("malformed digest '{value}': {reason}")]
    MalformedDigest { value: String, reason: String },

    /// Public key bytes are not a valid verifying key.
    #[error("invalid public key: {reason}")]
    InvalidPublicKey { reason: String },

    /// Signature bytes have the wrong length or encoding.
    #[error("invalid signature encoding: {reason}")]
    InvalidSignatureEncoding { reason: String },

    /// A proof document matched neither wire variant or is not valid JSON, or
    /// a stored ledger record is not a well-formed event or tombstone.
    #[error("could not be parsed: {reason}")]
    Parse { reason: String },

    /// A configuration file is missing, unreadable, or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// A time-stamp token could not be decoded into its parts.
    #[error("malformed time-stamp token: {reason}")]
    TokenMalformed { reason: String },

    /// Media bytes could not be read while streaming the asset digest.
    #[error("failed to read media: {reason}")]
    MediaRead { reason: String },

    /// A record could not be appended to a ledger.
    #[error("ledger write failed: {reason}")]
    LedgerWrite { reason: String },

    /// The caller cancelled the operation; no partial result is valid.
    #[error("operation cancelled")]
    Cancelled,
}

impl serde::ser::Error for ProoflineError {
    fn custom<T: Display>(msg: T) -> Self {
        ProoflineError::Canonicalization {
            reason: msg.to_string(),
        }
    }
}

/// Convenience alias used throughout the proofline crates.
pub type ProoflineResult<T> = Result<T, ProoflineError>;
