//! # proofline-verify
//!
//! Proof document parsing and the verification orchestrator.
//!
//! - [`parser::ProofParser`] reads either wire variant (minimal or full) and
//!   normalizes it into one `ParsedProof`.  Variant sniffing is done with one
//!   JSON Schema per variant via the `jsonschema` crate.
//! - [`orchestrator::ProofVerifier`] runs the ordered checks over a parsed
//!   proof and optional media bytes and derives the verdict.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use proofline_policy::VerifierPolicy;
//! use proofline_verify::ProofVerifier;
//!
//! let verifier = ProofVerifier::new(VerifierPolicy::default())?;
//! let result = verifier.verify(&proof_text, Some(&mut media_file))?;
//! println!("{}", result.status);
//! for check in &result.checks {
//!     println!("  {:<22} {:<8} {}", check.id, check.status, check.detail);
//! }
//! ```

pub mod orchestrator;
pub mod parser;
mod wire;

pub use orchestrator::{
    overall_status, MediaSource, ProofJob, ProofOutcome, ProofVerifier, VerifyOptions,
};
pub use parser::ProofParser;
