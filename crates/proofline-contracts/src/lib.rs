//! # proofline-contracts
//!
//! Shared data model, result types, and errors for the proofline
//! verification engine.
//!
//! All crates in the workspace import from here.  No verification logic lives
//! in this crate, only data definitions, value-type parsing, and error types.

pub mod anchor;
pub mod chain;
pub mod digest;
pub mod error;
pub mod event;
pub mod policy;
pub mod proof;
pub mod result;
