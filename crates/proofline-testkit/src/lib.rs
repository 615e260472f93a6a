//! Test fixtures for the proofline workspace.
//!
//! Everything here is deterministic: keys come from fixed seeds and
//! timestamps from a fixed epoch, so fixtures are identical across runs.
//!
//! - **Keys**: [`TestKey`], an Ed25519 key that also implements `EventSigner`
//! - **Records**: signed events, linked chains, and tombstones
//! - **Authority**: [`TestAuthority`], a root CA, issuing CA, and TSA signer
//!   that mint time-stamp tokens
//! - **Proofs**: minimal and full proof documents, with or without anchors
//! - **Mocks**: an unreachable revocation source and a recording observer

pub mod keys;
pub mod mock;
pub mod proofs;
pub mod records;
pub mod tsa;

pub use keys::TestKey;
pub use mock::{Observed, RecordingObserver, UnavailableRevocation};
pub use proofs::{full_anchor, full_proof, minimal_anchor, minimal_proof, to_text};
pub use records::{
    digest_of, event_chain, sample_media, seal_event, seal_tombstone, signed_event,
    signed_tombstone, timestamp_at, CHAIN_ID,
};
pub use tsa::{TestAuthority, GEN_TIME};
