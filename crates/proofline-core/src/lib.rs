//! # proofline-core
//!
//! The deterministic primitives every other proofline crate builds on:
//!
//! - [`canonical`]: byte-stable serialization, the input to every digest
//! - [`digest`]: SHA-256 over canonical bytes and over streamed media
//! - [`signature`]: Ed25519 verification over raw digest bytes
//! - [`record`]: signing bytes and digests for events and tombstones
//! - [`traits`]: collaborator seams (token parsing, revocation, progress,
//!   signing)

pub mod canonical;
pub mod digest;
pub mod record;
pub mod signature;
pub mod traits;

pub use canonical::{canonicalize, canonicalize_value, to_canonical_value};
pub use digest::{sha256, CancellationToken, DEFAULT_CHUNK_SIZE};
pub use signature::{verify_signature, SIGNATURE_ALGORITHM};
pub use traits::{
    EventSigner, NoopObserver, RevocationChecker, RevocationUnavailable, TimestampTokenParser,
    VerificationObserver,
};
