//! Chain walker behaviour over hand-built ledgers.

use serde_json::{json, Value};

use proofline_chain::{verify_ledger, verify_ledgers};
use proofline_contracts::{
    chain::{ChainIssueCode, Ledger, RecordKind, Severity},
    event::{Event, TombstoneReason},
};
use proofline_core::record::value_digest;
use proofline_testkit::{
    event_chain, records::unsigned_event, seal_event, seal_tombstone, signed_event,
    signed_tombstone, timestamp_at, TestKey, CHAIN_ID,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn ledger(events: Vec<Event>) -> Ledger {
    Ledger {
        events,
        ..Ledger::new(CHAIN_ID)
    }
}

/// Sign `value` as stored, extra fields and explicit nulls included.
fn seal_stored(mut value: Value, key: &TestKey) -> Value {
    let digest = value_digest(&value, &Event::UNSIGNED_FIELDS);
    value["eventHash"] = json!(digest.to_string());
    value["signature"] = serde_json::to_value(key.record_signature(&digest)).unwrap();
    value
}

/// Link `events` in order and re-seal each one.
fn relink(events: Vec<Event>, key: &TestKey) -> Vec<Event> {
    let mut linked: Vec<Event> = Vec::new();
    for mut event in events {
        event.prev_hash = linked.last().map(|e| e.event_hash.clone()).unwrap_or_default();
        linked.push(seal_event(event, key));
    }
    linked
}

fn indices(ledger: &Ledger, code: ChainIssueCode) -> Vec<usize> {
    verify_ledger(ledger, None)
        .issues_with(code)
        .iter()
        .map(|i| i.index)
        .collect()
}

// ── Linear chains ─────────────────────────────────────────────────────────────

#[test]
fn test_clean_chain_has_no_issues() {
    let key = TestKey::device();
    let report = verify_ledger(&ledger(event_chain(&key, CHAIN_ID, 5)), None);

    assert!(report.valid, "issues: {:?}", report.issues);
    assert!(report.valid_ignoring_warnings);
    assert_eq!(report.events_checked, 5);
    assert_eq!(report.tombstones_checked, 0);
    assert_eq!(report.invalidated_events, 0);
}

#[test]
fn test_corrupted_link_reports_once_without_cascade() {
    let key = TestKey::device();
    let mut events = event_chain(&key, CHAIN_ID, 5);
    events[3].prev_hash = events[1].event_hash.clone();
    let report_ledger = ledger(events);
    let report = verify_ledger(&report_ledger, None);

    let links = report.issues_with(ChainIssueCode::PrevHashMismatch);
    assert_eq!(links.len(), 1, "issues: {:?}", report.issues);
    assert_eq!(links[0].index, 3);
    // The edited field also changes the recomputed digest of event 3.
    assert_eq!(indices(&report_ledger, ChainIssueCode::EventHashMismatch), vec![3]);
    assert!(
        report.issues.iter().all(|i| i.index == 3),
        "nothing reported past event 3: {:?}",
        report.issues
    );
    assert!(report.issues_with(ChainIssueCode::SignatureInvalid).is_empty());
    assert!(!report.valid);
}

#[test]
fn test_edited_content_fails_digest_only() {
    let key = TestKey::device();
    let mut events = event_chain(&key, CHAIN_ID, 4);
    events[1].asset.asset_size += 1;
    let report = verify_ledger(&ledger(events), None);

    assert_eq!(report.issues.len(), 1, "issues: {:?}", report.issues);
    assert_eq!(report.issues[0].code, ChainIssueCode::EventHashMismatch);
    assert_eq!(report.issues[0].index, 1);
    assert!(report.issues[0].expected.is_some() && report.issues[0].actual.is_some());
}

#[test]
fn test_foreign_signature_is_reported() {
    let key = TestKey::device();
    let mut events = event_chain(&key, CHAIN_ID, 3);
    let digest = proofline_testkit::digest_of(&events[2]);
    events[2].signature = TestKey::stranger().record_signature(&digest);

    assert_eq!(indices(&ledger(events), ChainIssueCode::SignatureInvalid), vec![2]);
}

#[test]
fn test_pinned_key_overrides_record_keys() {
    let stranger = TestKey::stranger();
    let events = event_chain(&stranger, CHAIN_ID, 3);

    let unpinned = verify_ledger(&ledger(events.clone()), None);
    assert!(unpinned.valid, "self-consistent chain walks clean unpinned");

    let device = TestKey::device().public_key_bytes();
    let pinned = verify_ledger(&ledger(events), Some(&device));
    assert_eq!(pinned.issues_with(ChainIssueCode::SignatureInvalid).len(), 3);
}

#[test]
fn test_backwards_timestamp_is_a_warning() {
    let key = TestKey::device();
    let mut drafts: Vec<Event> = (0..4)
        .map(|seq| unsigned_event(&key, CHAIN_ID, seq, ""))
        .collect();
    drafts[2].timestamp = timestamp_at(-30);
    let report = verify_ledger(&ledger(relink(drafts, &key)), None);

    let anomalies = report.issues_with(ChainIssueCode::TimestampAnomaly);
    assert_eq!(anomalies.len(), 1, "issues: {:?}", report.issues);
    assert_eq!(anomalies[0].index, 2);
    assert_eq!(anomalies[0].severity, Severity::Warning);
    assert!(!report.valid);
    assert!(report.valid_ignoring_warnings);
}

#[test]
fn test_record_from_another_chain_is_flagged() {
    let key = TestKey::device();
    let mut drafts: Vec<Event> = (0..3)
        .map(|seq| unsigned_event(&key, CHAIN_ID, seq, ""))
        .collect();
    drafts[1].chain_id = "chain-0002".to_string();
    let report = verify_ledger(&ledger(relink(drafts, &key)), None);

    assert_eq!(report.issues.len(), 1, "issues: {:?}", report.issues);
    assert_eq!(report.issues[0].code, ChainIssueCode::ChainIdMismatch);
    assert_eq!(report.issues[0].index, 1);
}

// ── Tombstones ────────────────────────────────────────────────────────────────

#[test]
fn test_tombstone_explains_link_discontinuity() {
    let key = TestKey::device();
    let mut events = event_chain(&key, CHAIN_ID, 4);
    let tombstone = signed_tombstone(&key, &events[3], &events[3].event_hash, 100);
    events.push(signed_event(&key, CHAIN_ID, 4, &tombstone.tombstone_hash));

    let without = verify_ledger(&ledger(events.clone()), None);
    assert_eq!(
        without
            .issues_with(ChainIssueCode::PrevHashMismatch)
            .iter()
            .map(|i| i.index)
            .collect::<Vec<_>>(),
        vec![4],
        "an unknown link is a break"
    );

    let mut with = ledger(events);
    with.tombstones.push(tombstone);
    let report = verify_ledger(&with, None);
    assert!(report.valid, "issues: {:?}", report.issues);
    assert_eq!(report.tombstones_checked, 1);
    assert_eq!(report.invalidated_events, 1);
}

#[test]
fn test_successor_may_skip_an_invalidated_event() {
    let key = TestKey::device();
    let mut events = event_chain(&key, CHAIN_ID, 5);
    events[3].prev_hash = events[1].event_hash.clone();
    events[3] = seal_event(events[3].clone(), &key);
    events[4].prev_hash = events[3].event_hash.clone();
    events[4] = seal_event(events[4].clone(), &key);
    let tombstone = signed_tombstone(&key, &events[2], &events[4].event_hash, 100);

    assert_eq!(
        indices(&ledger(events.clone()), ChainIssueCode::PrevHashMismatch),
        vec![3],
        "without the tombstone the skip is a break"
    );

    let mut with = ledger(events);
    with.tombstones.push(tombstone);
    let report = verify_ledger(&with, None);
    assert!(report.valid, "issues: {:?}", report.issues);
    assert_eq!(report.events_checked, 5);
    assert_eq!(report.invalidated_events, 1);
}

#[test]
fn test_run_of_invalidated_events_may_be_skipped_back_to_genesis() {
    let key = TestKey::device();
    let mut events = event_chain(&key, CHAIN_ID, 3);
    events[2].prev_hash = String::new();
    events[2] = seal_event(events[2].clone(), &key);
    let first = signed_tombstone(&key, &events[0], &events[2].event_hash, 100);
    let second = signed_tombstone(&key, &events[1], &first.tombstone_hash, 101);

    let mut with = ledger(events);
    with.tombstones = vec![first, second];
    let report = verify_ledger(&with, None);
    assert!(report.valid, "issues: {:?}", report.issues);
    assert_eq!(report.invalidated_events, 2);
}

#[test]
fn test_edited_tombstone_does_not_excuse_a_skip() {
    let key = TestKey::device();
    let mut events = event_chain(&key, CHAIN_ID, 4);
    events[3].prev_hash = events[1].event_hash.clone();
    events[3] = seal_event(events[3].clone(), &key);
    let mut tombstone = signed_tombstone(&key, &events[2], &events[3].event_hash, 100);
    tombstone.reason = TombstoneReason::Other;

    let mut with = ledger(events);
    with.tombstones.push(tombstone);
    assert_eq!(indices(&with, ChainIssueCode::PrevHashMismatch), vec![3]);
}

#[test]
fn test_tombstone_after_corrupted_event_is_followed_by_its_successor() {
    let key = TestKey::device();
    let mut events = event_chain(&key, CHAIN_ID, 5);
    events[3].prev_hash = events[1].event_hash.clone();
    assert_eq!(
        indices(&ledger(events.clone()), ChainIssueCode::PrevHashMismatch),
        vec![3]
    );

    // Invalidate event 3 and link event 4 to the tombstone.
    let tombstone = signed_tombstone(&key, &events[3], &events[3].event_hash, 100);
    events[4].prev_hash = tombstone.tombstone_hash.clone();
    events[4] = seal_event(events[4].clone(), &key);
    assert_eq!(
        indices(&ledger(events.clone()), ChainIssueCode::PrevHashMismatch),
        vec![3, 4],
        "a link to an absent tombstone is a break"
    );

    let mut with = ledger(events);
    with.tombstones.push(tombstone);
    let report = verify_ledger(&with, None);
    assert_eq!(indices(&with, ChainIssueCode::PrevHashMismatch), vec![3]);
    assert_eq!(indices(&with, ChainIssueCode::EventHashMismatch), vec![3]);
    assert!(report.issues_with(ChainIssueCode::TombstoneTargetMismatch).is_empty());
    assert!(report.issues_with(ChainIssueCode::SignatureInvalid).is_empty());
    assert_eq!(report.issues.len(), 2, "issues: {:?}", report.issues);
    assert_eq!(report.invalidated_events, 1);
}

#[test]
fn test_deleted_event_is_a_warning_gap() {
    let key = TestKey::device();
    let events = event_chain(&key, CHAIN_ID, 5);
    let tombstone = signed_tombstone(&key, &events[2], &events[2].event_hash, 100);

    let mut gapped = ledger(
        events
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 2)
            .map(|(_, e)| e.clone())
            .collect(),
    );
    gapped.tombstones.push(tombstone);
    let report = verify_ledger(&gapped, None);

    let gaps = report.issues_with(ChainIssueCode::DeletedEventGap);
    assert_eq!(gaps.len(), 1, "issues: {:?}", report.issues);
    assert_eq!(gaps[0].index, 2);
    assert_eq!(gaps[0].severity, Severity::Warning);
    assert!(
        report.issues_with(ChainIssueCode::OrphanedTombstone).is_empty(),
        "the tombstone explains the gap"
    );
    assert!(report.valid_ignoring_warnings, "issues: {:?}", report.issues);
}

#[test]
fn test_deleted_event_without_tombstone_is_an_error() {
    let key = TestKey::device();
    let mut events = event_chain(&key, CHAIN_ID, 5);
    events.remove(2);
    let report = verify_ledger(&ledger(events), None);

    assert_eq!(report.issues.len(), 1, "issues: {:?}", report.issues);
    assert_eq!(report.issues[0].code, ChainIssueCode::PrevHashMismatch);
    assert_eq!(report.issues[0].index, 2);
}

#[test]
fn test_tombstone_for_unknown_event_is_orphaned() {
    let key = TestKey::device();
    let events = event_chain(&key, CHAIN_ID, 3);
    let elsewhere = signed_event(&key, CHAIN_ID, 40, "");
    let tombstone = signed_tombstone(&key, &elsewhere, &events[2].event_hash, 100);

    let mut with = ledger(events);
    with.tombstones.push(tombstone);
    let report = verify_ledger(&with, None);

    assert_eq!(report.issues.len(), 1, "issues: {:?}", report.issues);
    assert_eq!(report.issues[0].code, ChainIssueCode::OrphanedTombstone);
    assert_eq!(report.issues[0].record, RecordKind::Tombstone);
}

#[test]
fn test_tombstone_with_wrong_target_digest() {
    let key = TestKey::device();
    let events = event_chain(&key, CHAIN_ID, 3);
    let mut misdescribed = events[1].clone();
    misdescribed.event_hash = events[2].event_hash.clone();
    let tombstone = signed_tombstone(&key, &misdescribed, &events[2].event_hash, 100);

    let mut with = ledger(events);
    with.tombstones.push(tombstone);
    let report = verify_ledger(&with, None);

    assert_eq!(
        report.issues_with(ChainIssueCode::TombstoneTargetMismatch).len(),
        1,
        "issues: {:?}",
        report.issues
    );
    assert_eq!(report.invalidated_events, 0);
}

#[test]
fn test_second_tombstone_for_same_event() {
    let key = TestKey::device();
    let events = event_chain(&key, CHAIN_ID, 3);
    let first = signed_tombstone(&key, &events[1], &events[2].event_hash, 100);
    let second = signed_tombstone(&key, &events[1], &first.tombstone_hash, 101);

    let mut with = ledger(events);
    with.tombstones = vec![first, second];
    let report = verify_ledger(&with, None);

    let duplicates = report.issues_with(ChainIssueCode::TombstoneTargetMismatch);
    assert_eq!(duplicates.len(), 1, "issues: {:?}", report.issues);
    assert_eq!(duplicates[0].index, 1);
    assert!(duplicates[0].message.contains("already invalidated"));
    assert_eq!(report.invalidated_events, 1);
}

#[test]
fn test_edited_tombstone_does_not_invalidate() {
    let key = TestKey::device();
    let events = event_chain(&key, CHAIN_ID, 3);
    let mut tombstone = signed_tombstone(&key, &events[0], &events[2].event_hash, 100);
    tombstone.reason = TombstoneReason::LegalRequirement;

    let mut with = ledger(events);
    with.tombstones.push(tombstone);
    let report = verify_ledger(&with, None);

    let digests = report.issues_with(ChainIssueCode::EventHashMismatch);
    assert_eq!(digests.len(), 1, "issues: {:?}", report.issues);
    assert_eq!(digests[0].record, RecordKind::Tombstone);
    assert_eq!(report.invalidated_events, 0);
}

#[test]
fn test_tombstone_signed_by_stranger_fails_signature() {
    let key = TestKey::device();
    let events = event_chain(&key, CHAIN_ID, 2);
    let tombstone = signed_tombstone(&key, &events[0], &events[1].event_hash, 100);
    let forged = seal_tombstone(tombstone, &TestKey::stranger());

    let mut with = ledger(events);
    with.tombstones.push(forged);
    let report = verify_ledger(&with, None);

    assert_eq!(report.issues_with(ChainIssueCode::SignatureInvalid).len(), 1);
    assert_eq!(report.invalidated_events, 0);
}

// ── Stored records ────────────────────────────────────────────────────────────

#[test]
fn test_stored_fields_outside_the_model_are_covered_by_the_digest() {
    let key = TestKey::device();
    let mut value = serde_json::to_value(unsigned_event(&key, CHAIN_ID, 0, "")).unwrap();
    value["vendorExtension"] = json!({ "firmware": "4.2.1" });
    value["cameraSettings"] = Value::Null;
    let sealed = seal_stored(value, &key);

    let stored = Ledger::partition_stored(vec![sealed.clone()], Vec::new()).unwrap();
    let report = verify_ledger(&stored[0], None);
    assert!(report.valid, "issues: {:?}", report.issues);

    let typed: Event = serde_json::from_value(sealed).unwrap();
    assert_eq!(
        indices(&ledger(vec![typed]), ChainIssueCode::EventHashMismatch),
        vec![0],
        "the typed form drops the extension and the null"
    );
}

#[test]
fn test_field_added_after_signing_is_a_digest_mismatch() {
    let key = TestKey::device();
    let value = serde_json::to_value(unsigned_event(&key, CHAIN_ID, 0, "")).unwrap();
    let mut sealed = seal_stored(value, &key);
    sealed["addedLater"] = json!(true);

    let stored = Ledger::partition_stored(vec![sealed], Vec::new()).unwrap();
    let report = verify_ledger(&stored[0], None);
    assert_eq!(report.issues.len(), 1, "issues: {:?}", report.issues);
    assert_eq!(report.issues[0].code, ChainIssueCode::EventHashMismatch);
}

// ── Many chains ───────────────────────────────────────────────────────────────

#[test]
fn test_partitioned_chains_walk_independently() {
    let key = TestKey::device();
    let a = event_chain(&key, "chain-b", 3);
    let b = event_chain(&key, "chain-a", 2);
    let mixed = vec![
        a[0].clone(),
        b[0].clone(),
        a[1].clone(),
        b[1].clone(),
        a[2].clone(),
    ];

    let ledgers = Ledger::partition(mixed, Vec::new());
    let reports = verify_ledgers(&ledgers, None);

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].chain_id, "chain-a");
    assert_eq!(reports[1].chain_id, "chain-b");
    assert_eq!(reports[0].events_checked, 2);
    assert_eq!(reports[1].events_checked, 3);
    assert!(reports.iter().all(|r| r.valid), "reports: {reports:?}");
}
