//! Chain-integrity walker.
//!
//! Walks one ledger's events in order, then its tombstones, and reports every
//! finding as a typed [`ChainIssue`].
//!
//! Rules, per event:
//!
//!   1. chain id matches the ledger's              → `chainIdMismatch`
//!   2. recomputed digest equals the stored digest → `eventHashMismatch`
//!   3. signature verifies over the stored digest  → `signatureInvalid`
//!   4. `prevHash` links to the previous surviving event → `prevHashMismatch`
//!   5. capture time does not go backwards         → `timestampAnomaly` (warning)
//!
//! The link in rule 4 may pass through tombstones: a tombstone links to the
//! chain head at the time it was written and the next record links to the
//! tombstone.  An event invalidated by a sound tombstone stays in the ledger
//! but may be skipped, so its successor may link to the event before it.  A
//! link that lands on the recorded digest of an event no longer in the ledger
//! is a `deletedEventGap` warning, not an error.
//!
//! The expected link always advances to the stored digest of the event just
//! checked, and signatures are checked against stored digests, so one
//! corrupted field reports at the record that carries it and nowhere else.
//!
//! Digests are recomputed over a record's stored JSON when the ledger carries
//! it, so fields this crate does not model are still covered.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{info, warn};

use proofline_contracts::{
    chain::{ChainIntegrityReport, ChainIssue, ChainIssueCode, Ledger, RecordKind, Severity},
    digest::{is_genesis_link, ContentDigest},
    event::{Event, RecordSignature, Tombstone},
};
use proofline_core::{
    record::{event_digest, tombstone_digest, value_digest},
    signature::{decode_base64, try_verify_signature},
    SIGNATURE_ALGORITHM,
};

// ── Issue collection ──────────────────────────────────────────────────────────

struct Findings {
    chain_id: String,
    issues: Vec<ChainIssue>,
}

impl Findings {
    fn push(
        &mut self,
        code: ChainIssueCode,
        record: RecordKind,
        index: usize,
        record_id: &str,
        expected_actual: Option<(String, String)>,
        message: String,
    ) {
        warn!(
            chain_id = %self.chain_id,
            code = ?code,
            record = ?record,
            index,
            record_id,
            %message,
            "chain issue"
        );
        let (expected, actual) = match expected_actual {
            Some((e, a)) => (Some(e), Some(a)),
            None => (None, None),
        };
        self.issues.push(ChainIssue {
            code,
            severity: code.severity(),
            record,
            index,
            record_id: record_id.to_string(),
            expected,
            actual,
            message,
        });
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Two rendered digests are the same digest.  Falls back to exact string
/// comparison when either side does not parse.
fn same_digest(a: &str, b: &str) -> bool {
    match (ContentDigest::parse(a), ContentDigest::parse(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => a == b,
    }
}

/// Check `signature` over `digest` with the pinned key, or else the key the
/// record carries.
fn check_signature(
    digest: &ContentDigest,
    signature: &RecordSignature,
    record_key: &str,
    pinned_key: Option<&[u8]>,
) -> Result<(), String> {
    if !signature.algorithm.eq_ignore_ascii_case(SIGNATURE_ALGORITHM) {
        return Err(format!("unsupported signature algorithm '{}'", signature.algorithm));
    }
    let sig = decode_base64(&signature.value).map_err(|e| format!("signature is not base64: {e}"))?;
    let carried;
    let key = match pinned_key {
        Some(key) => key,
        None => {
            carried = decode_base64(record_key).map_err(|e| format!("public key is not base64: {e}"))?;
            carried.as_slice()
        }
    };
    match try_verify_signature(digest, &sig, key) {
        Ok(true) => Ok(()),
        Ok(false) => Err("signature does not verify over the stored digest".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// The digest a signature is checked against: the stored one when it parses,
/// otherwise the recomputed one.
fn signed_digest(stored: &str, computed: Option<ContentDigest>) -> Option<ContentDigest> {
    ContentDigest::parse(stored).ok().or(computed)
}

fn recompute_event(ledger: &Ledger, index: usize) -> Option<ContentDigest> {
    match ledger.stored_event(index) {
        Some(raw) => Some(value_digest(raw, &Event::UNSIGNED_FIELDS)),
        None => event_digest(&ledger.events[index]).ok(),
    }
}

fn recompute_tombstone(ledger: &Ledger, index: usize) -> Option<ContentDigest> {
    match ledger.stored_tombstone(index) {
        Some(raw) => Some(value_digest(raw, &Tombstone::UNSIGNED_FIELDS)),
        None => tombstone_digest(&ledger.tombstones[index]).ok(),
    }
}

/// Where the next event's `prevHash` may point.
struct ExpectedLink {
    /// Stored digest of the previous event, then of each earlier event a
    /// run of invalidated events lets the link skip back to.
    digests: Vec<String>,
    /// Genesis is still reachable: every earlier event was invalidated.
    genesis: bool,
}

impl ExpectedLink {
    fn genesis() -> Self {
        Self {
            digests: Vec::new(),
            genesis: true,
        }
    }

    fn accepts(&self, link: &str) -> bool {
        (self.genesis && is_genesis_link(link)) || self.digests.iter().any(|d| same_digest(link, d))
    }

    /// Advance past `event_hash`.  An invalidated event keeps the earlier
    /// targets reachable; any other event replaces them.
    fn advance(&mut self, event_hash: &str, invalidated: bool) {
        if !invalidated {
            self.digests.clear();
            self.genesis = false;
        }
        self.digests.insert(0, event_hash.to_string());
    }

    fn describe(&self) -> String {
        match self.digests.first() {
            Some(d) => d.clone(),
            None => "genesis".to_string(),
        }
    }
}

// ── Walker ────────────────────────────────────────────────────────────────────

/// Verify one ledger.  `pinned_key`, when given, is the only key any record's
/// signature may verify with.
pub fn verify_ledger(ledger: &Ledger, pinned_key: Option<&[u8]>) -> ChainIntegrityReport {
    let mut findings = Findings {
        chain_id: ledger.chain_id.clone(),
        issues: Vec::new(),
    };

    // Recomputed digests, by position.
    let event_digests: Vec<Option<ContentDigest>> = (0..ledger.events.len())
        .map(|i| recompute_event(ledger, i))
        .collect();
    let tombstone_digests: Vec<Option<ContentDigest>> = (0..ledger.tombstones.len())
        .map(|i| recompute_tombstone(ledger, i))
        .collect();

    // Tombstones by the digest they are stored under, for link following.
    let tombstone_by_hash: HashMap<ContentDigest, usize> = ledger
        .tombstones
        .iter()
        .enumerate()
        .filter_map(|(i, t)| ContentDigest::parse(&t.tombstone_hash).ok().map(|d| (d, i)))
        .collect();
    let event_ids: HashSet<&str> = ledger.events.iter().map(|e| e.event_id.as_str()).collect();
    // Recorded digests of tombstoned events that are missing from the ledger.
    let deleted_targets: HashMap<ContentDigest, usize> = ledger
        .tombstones
        .iter()
        .enumerate()
        .filter(|(_, t)| !event_ids.contains(t.target_event_id.as_str()))
        .filter_map(|(i, t)| ContentDigest::parse(&t.target_event_hash).ok().map(|d| (d, i)))
        .collect();
    let mut explained_deletions: HashSet<usize> = HashSet::new();
    // Events a sound tombstone invalidates, by id and stored digest.
    let skippable: HashSet<(&str, ContentDigest)> = ledger
        .tombstones
        .iter()
        .enumerate()
        .filter(|(i, t)| {
            tombstone_digests[*i].is_some_and(|d| same_digest(&t.tombstone_hash, &d.to_string()))
                && ContentDigest::parse(&t.tombstone_hash).is_ok_and(|d| {
                    check_signature(&d, &t.signature, &t.public_key, pinned_key).is_ok()
                })
        })
        .filter_map(|(_, t)| {
            ContentDigest::parse(&t.target_event_hash)
                .ok()
                .map(|d| (t.target_event_id.as_str(), d))
        })
        .collect();

    // ── Events ──
    let mut expected = ExpectedLink::genesis();
    let mut last_time: Option<(DateTime<Utc>, usize)> = None;

    for (index, event) in ledger.events.iter().enumerate() {
        let id = event.event_id.as_str();

        if event.chain_id != ledger.chain_id {
            findings.push(
                ChainIssueCode::ChainIdMismatch,
                RecordKind::Event,
                index,
                id,
                Some((ledger.chain_id.clone(), event.chain_id.clone())),
                format!("event belongs to chain '{}'", event.chain_id),
            );
        }

        let computed = event_digests[index];
        match computed {
            Some(d) if same_digest(&event.event_hash, &d.to_string()) => {}
            Some(d) => findings.push(
                ChainIssueCode::EventHashMismatch,
                RecordKind::Event,
                index,
                id,
                Some((event.event_hash.clone(), d.to_string())),
                "recomputed event digest differs from the stored digest".to_string(),
            ),
            None => findings.push(
                ChainIssueCode::EventHashMismatch,
                RecordKind::Event,
                index,
                id,
                None,
                "event could not be canonicalized".to_string(),
            ),
        }

        match signed_digest(&event.event_hash, computed) {
            Some(digest) => {
                if let Err(reason) = check_signature(
                    &digest,
                    &event.signature,
                    event.attested_public_key(),
                    pinned_key,
                ) {
                    findings.push(
                        ChainIssueCode::SignatureInvalid,
                        RecordKind::Event,
                        index,
                        id,
                        None,
                        reason,
                    );
                }
            }
            None => findings.push(
                ChainIssueCode::SignatureInvalid,
                RecordKind::Event,
                index,
                id,
                None,
                "no digest to check the signature against".to_string(),
            ),
        }

        check_link(
            &mut findings,
            ledger,
            index,
            event,
            &expected,
            &tombstone_by_hash,
            &deleted_targets,
            &mut explained_deletions,
        );
        let invalidated = ContentDigest::parse(&event.event_hash)
            .is_ok_and(|d| skippable.contains(&(id, d)));
        expected.advance(&event.event_hash, invalidated);

        match event.captured_at() {
            Some(t) => {
                if let Some((previous, previous_index)) = last_time {
                    if t < previous {
                        findings.push(
                            ChainIssueCode::TimestampAnomaly,
                            RecordKind::Event,
                            index,
                            id,
                            Some((
                                format!("at or after {}", ledger.events[previous_index].timestamp),
                                event.timestamp.clone(),
                            )),
                            format!("capture time goes backwards from event {previous_index}"),
                        );
                    }
                }
                last_time = Some((t, index));
            }
            None => findings.push(
                ChainIssueCode::TimestampAnomaly,
                RecordKind::Event,
                index,
                id,
                None,
                format!("unreadable timestamp '{}'", event.timestamp),
            ),
        }
    }

    // ── Tombstones ──
    let events_by_id: HashMap<&str, usize> = ledger
        .events
        .iter()
        .enumerate()
        .map(|(i, e)| (e.event_id.as_str(), i))
        .collect();
    let known_links: HashSet<ContentDigest> = ledger
        .events
        .iter()
        .map(|e| e.event_hash.as_str())
        .chain(ledger.tombstones.iter().map(|t| t.tombstone_hash.as_str()))
        .filter_map(|h| ContentDigest::parse(h).ok())
        .chain(deleted_targets.keys().copied())
        .collect();
    let mut invalidated: HashMap<usize, usize> = HashMap::new();

    for (index, tombstone) in ledger.tombstones.iter().enumerate() {
        let id = tombstone.tombstone_id.as_str();
        let computed = tombstone_digests[index];

        if tombstone.chain_id != ledger.chain_id {
            findings.push(
                ChainIssueCode::ChainIdMismatch,
                RecordKind::Tombstone,
                index,
                id,
                Some((ledger.chain_id.clone(), tombstone.chain_id.clone())),
                format!("tombstone belongs to chain '{}'", tombstone.chain_id),
            );
        }

        let digest_ok = match computed {
            Some(d) if same_digest(&tombstone.tombstone_hash, &d.to_string()) => true,
            Some(d) => {
                findings.push(
                    ChainIssueCode::EventHashMismatch,
                    RecordKind::Tombstone,
                    index,
                    id,
                    Some((tombstone.tombstone_hash.clone(), d.to_string())),
                    "recomputed tombstone digest differs from the stored digest".to_string(),
                );
                false
            }
            None => {
                findings.push(
                    ChainIssueCode::EventHashMismatch,
                    RecordKind::Tombstone,
                    index,
                    id,
                    None,
                    "tombstone could not be canonicalized".to_string(),
                );
                false
            }
        };

        let signature_ok = match signed_digest(&tombstone.tombstone_hash, computed) {
            Some(digest) => {
                match check_signature(&digest, &tombstone.signature, &tombstone.public_key, pinned_key) {
                    Ok(()) => true,
                    Err(reason) => {
                        findings.push(
                            ChainIssueCode::SignatureInvalid,
                            RecordKind::Tombstone,
                            index,
                            id,
                            None,
                            reason,
                        );
                        false
                    }
                }
            }
            None => false,
        };

        let link_ok = is_genesis_link(&tombstone.prev_hash)
            || ContentDigest::parse(&tombstone.prev_hash)
                .map(|d| known_links.contains(&d))
                .unwrap_or(false);
        if !link_ok {
            findings.push(
                ChainIssueCode::PrevHashMismatch,
                RecordKind::Tombstone,
                index,
                id,
                None,
                format!(
                    "tombstone links to '{}', which is no record in this chain",
                    tombstone.prev_hash
                ),
            );
        }

        match events_by_id.get(tombstone.target_event_id.as_str()) {
            Some(&target) => {
                let actual = ledger.events[target].event_hash.clone();
                if !same_digest(&tombstone.target_event_hash, &actual) {
                    findings.push(
                        ChainIssueCode::TombstoneTargetMismatch,
                        RecordKind::Tombstone,
                        index,
                        id,
                        Some((actual, tombstone.target_event_hash.clone())),
                        format!(
                            "recorded digest of target '{}' does not match the event",
                            tombstone.target_event_id
                        ),
                    );
                } else if let Some(&first) = invalidated.get(&target) {
                    findings.push(
                        ChainIssueCode::TombstoneTargetMismatch,
                        RecordKind::Tombstone,
                        index,
                        id,
                        None,
                        format!(
                            "event '{}' is already invalidated by tombstone '{}'",
                            tombstone.target_event_id, ledger.tombstones[first].tombstone_id
                        ),
                    );
                } else if digest_ok && signature_ok {
                    invalidated.insert(target, index);
                }
            }
            None if explained_deletions.contains(&index) => {}
            None => findings.push(
                ChainIssueCode::OrphanedTombstone,
                RecordKind::Tombstone,
                index,
                id,
                None,
                format!("target event '{}' is not in the ledger", tombstone.target_event_id),
            ),
        }
    }

    let issues = findings.issues;
    let valid_ignoring_warnings = issues.iter().all(|i| i.severity != Severity::Error);
    let report = ChainIntegrityReport {
        chain_id: ledger.chain_id.clone(),
        events_checked: ledger.events.len(),
        tombstones_checked: ledger.tombstones.len(),
        invalidated_events: invalidated.len(),
        valid: issues.is_empty(),
        valid_ignoring_warnings,
        issues,
    };
    info!(
        chain_id = %report.chain_id,
        events = report.events_checked,
        tombstones = report.tombstones_checked,
        issues = report.issues.len(),
        valid = report.valid,
        "ledger walked"
    );
    report
}

/// Rule 4 for one event.
#[allow(clippy::too_many_arguments)]
fn check_link(
    findings: &mut Findings,
    ledger: &Ledger,
    index: usize,
    event: &Event,
    expected: &ExpectedLink,
    tombstone_by_hash: &HashMap<ContentDigest, usize>,
    deleted_targets: &HashMap<ContentDigest, usize>,
    explained_deletions: &mut HashSet<usize>,
) {
    // Follow tombstone links back toward the previous event.  Each tombstone
    // is visited at most once, so a cycle of links terminates.
    let mut link = event.prev_hash.as_str();
    let mut visited: HashSet<usize> = HashSet::new();
    loop {
        if expected.accepts(link) {
            return;
        }
        let Ok(digest) = ContentDigest::parse(link) else {
            break;
        };
        if let Some(&deleted_by) = deleted_targets.get(&digest) {
            explained_deletions.insert(deleted_by);
            let tombstone: &Tombstone = &ledger.tombstones[deleted_by];
            findings.push(
                ChainIssueCode::DeletedEventGap,
                RecordKind::Event,
                index,
                &event.event_id,
                None,
                format!(
                    "preceded by deleted event '{}', recorded by tombstone '{}'",
                    tombstone.target_event_id, tombstone.tombstone_id
                ),
            );
            return;
        }
        match tombstone_by_hash.get(&digest) {
            Some(&t) if visited.insert(t) => link = ledger.tombstones[t].prev_hash.as_str(),
            _ => break,
        }
    }

    findings.push(
        ChainIssueCode::PrevHashMismatch,
        RecordKind::Event,
        index,
        &event.event_id,
        Some((expected.describe(), event.prev_hash.clone())),
        "previous-hash link does not reach the previous surviving event".to_string(),
    );
}

/// Walk independent chains in parallel.  Reports keep the order of `ledgers`.
pub fn verify_ledgers(ledgers: &[Ledger], pinned_key: Option<&[u8]>) -> Vec<ChainIntegrityReport> {
    ledgers
        .par_iter()
        .map(|ledger| verify_ledger(ledger, pinned_key))
        .collect()
}
