//! # proofline-chain
//!
//! Integrity checking for chains of signed capture events.
//!
//! A chain is an ordered list of events, each linking to its predecessor's
//! digest, interleaved with tombstones that invalidate events without
//! deleting them.  The walker reports every break as a typed issue instead
//! of stopping at the first one.
//!
//! - [`walker::verify_ledger`]  : walk one chain, optionally pinned to one key
//! - [`walker::verify_ledgers`] : walk independent chains in parallel
//! - [`memory::InMemoryLedger`] : append events and tombstones to a chain
//!
//! Records from many chains are split with `Ledger::partition` first.

pub mod memory;
pub mod walker;

pub use memory::{EventDraft, InMemoryLedger};
pub use walker::{verify_ledger, verify_ledgers};
