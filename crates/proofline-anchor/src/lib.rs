//! # proofline-anchor
//!
//! Verification of external time-stamp anchors.
//!
//! An anchor binds an event digest to a point in time outside the issuer's
//! control: the digest is committed into a Merkle tree (or stamped
//! directly), and a time-stamp authority signs a token over the committed
//! digest.  This crate checks both halves:
//!
//! - [`merkle`]: inclusion proofs over `rs_merkle`-shaped trees, plus a
//!   batch builder
//! - [`token`]: the default JSON time-stamp token parser
//! - [`certificate`]: certificate link checks and chain-to-root validation
//! - [`verifier`]: the two-layer state machine producing an [`AnchorStatus`]

pub mod certificate;
pub mod merkle;
pub mod token;
pub mod verifier;

pub use merkle::{verify_inclusion, MerkleBatch, MerkleError};
pub use token::JsonTimestampTokenParser;
pub use verifier::{AnchorReport, AnchorStatus, AnchorVerifier, MerkleOutcome, TokenVerification};
