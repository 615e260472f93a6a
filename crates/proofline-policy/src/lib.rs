//! # proofline-policy
//!
//! TOML-driven verifier configuration for the proofline engine.
//!
//! ## Overview
//!
//! This crate provides [`VerifierPolicy`], the validated settings a
//! verification runs under: the anchor [`AnchorPolicy`] (preset plus
//! per-layer overrides), accepted proof format versions, the media read
//! size, the trusted roots, and an offline [`RevocationList`] that
//! implements [`RevocationChecker`](proofline_core::RevocationChecker).
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use proofline_policy::VerifierPolicy;
//!
//! let policy = VerifierPolicy::from_file(Path::new("proofline.toml"))?;
//! ```
//!
//! [`AnchorPolicy`]: proofline_contracts::policy::AnchorPolicy

pub mod config;
pub mod engine;
pub mod trust;

pub use config::{AnchorOverrides, RevokedEntry, TrustAnchorEntry, VerifierConfig};
pub use engine::{VerifierPolicy, MAX_ASSET_CHUNK_SIZE};
pub use trust::{RevocationList, TrustAnchor, TrustStore};

// ── Tests ─────────────────────────────────────────────────────────────────────
