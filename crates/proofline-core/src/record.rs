//! Signing bytes and digests for ledger records.
//!
//! A record's digest covers the canonical form of every field except its own
//! digest and signature.  The same function computes it whether the record is
//! being created or checked, so producer and verifier cannot drift apart.

use serde_json::Value;

use proofline_contracts::{
    digest::ContentDigest,
    error::ProoflineResult,
    event::{Event, Tombstone},
};

use crate::{
    canonical::{canonicalize_value, to_canonical_value},
    digest::sha256,
};

/// Canonical bytes of `value` with the named top-level keys removed.
///
/// Non-object values are canonicalized unchanged.
pub fn value_signing_bytes(value: &Value, excluded: &[&str]) -> Vec<u8> {
    match value {
        Value::Object(map) => {
            let mut stripped = map.clone();
            for key in excluded {
                stripped.remove(*key);
            }
            canonicalize_value(&Value::Object(stripped))
        }
        other => canonicalize_value(other),
    }
}

/// Digest of `value` with the named top-level keys removed.
pub fn value_digest(value: &Value, excluded: &[&str]) -> ContentDigest {
    sha256(&value_signing_bytes(value, excluded))
}

pub fn event_signing_bytes(event: &Event) -> ProoflineResult<Vec<u8>> {
    let value = to_canonical_value(event)?;
    Ok(value_signing_bytes(&value, &Event::UNSIGNED_FIELDS))
}

/// The digest an event's `eventHash` must equal.
pub fn event_digest(event: &Event) -> ProoflineResult<ContentDigest> {
    Ok(sha256(&event_signing_bytes(event)?))
}

pub fn tombstone_signing_bytes(tombstone: &Tombstone) -> ProoflineResult<Vec<u8>> {
    let value = to_canonical_value(tombstone)?;
    Ok(value_signing_bytes(&value, &Tombstone::UNSIGNED_FIELDS))
}

/// The digest a tombstone's `tombstoneHash` must equal.
pub fn tombstone_digest(tombstone: &Tombstone) -> ProoflineResult<ContentDigest> {
    Ok(sha256(&tombstone_signing_bytes(tombstone)?))
}
