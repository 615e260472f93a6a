//! Signed events and tombstones.

use chrono::{Duration, SecondsFormat, TimeZone, Utc};

use proofline_contracts::{
    digest::ContentDigest,
    event::{
        AssetInfo, AssetKind, CameraSettings, CaptureContext, Event, HumanAttestation,
        KeyAttestation, Location, RecordSignature, SensorData, Tombstone, TombstoneExecutor,
        TombstoneReason,
    },
};
use proofline_core::{
    record::{event_digest, tombstone_digest},
    sha256,
};

use crate::keys::TestKey;

pub const CHAIN_ID: &str = "chain-0001";

/// Media bytes every fixture event's asset digest refers to.
pub fn sample_media() -> Vec<u8> {
    (0..4096u32).map(|i| (i.wrapping_mul(31) % 251) as u8).collect()
}

/// RFC 3339 timestamp `minutes` after the fixture epoch.
pub fn timestamp_at(minutes: i64) -> String {
    let base = Utc
        .with_ymd_and_hms(2025, 3, 1, 12, 0, 0)
        .single()
        .expect("fixture epoch is unambiguous");
    (base + Duration::minutes(minutes)).to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn event_id(seq: u32) -> String {
    format!("0195a1b2-0000-7000-8000-{seq:012x}")
}

/// An event with every field filled but no digest or signature yet.
pub fn unsigned_event(key: &TestKey, chain_id: &str, seq: u32, prev_hash: &str) -> Event {
    let media = sample_media();
    Event {
        event_id: event_id(seq),
        chain_id: chain_id.to_string(),
        prev_hash: prev_hash.to_string(),
        timestamp: timestamp_at(i64::from(seq)),
        asset: AssetInfo {
            asset_hash: sha256(&media).to_string(),
            asset_size: media.len() as u64,
            mime_type: "image/jpeg".to_string(),
            asset_type: AssetKind::Image,
        },
        capture_context: CaptureContext {
            device_model: "iPhone15,3".to_string(),
            os_version: "17.4".to_string(),
            app_version: "1.2.0".to_string(),
            key_attestation: KeyAttestation {
                public_key: key.public_key_b64(),
                attestation_type: "secureEnclave".to_string(),
                attestation_data: None,
            },
            human_attestation: Some(HumanAttestation {
                verified: true,
                method: "faceID".to_string(),
                attempted_at: timestamp_at(i64::from(seq)),
                capture_offset_ms: 850,
                session_nonce: format!("nonce-{seq}"),
            }),
        },
        sensor_data: Some(SensorData {
            location: Some(Location {
                latitude: 37.7749,
                longitude: -122.4194,
                altitude: Some(16.5),
                horizontal_accuracy: Some(5.0),
            }),
            heading: Some(271.25),
            accelerometer: Some(vec![0.01, -0.98, 0.12]),
        }),
        camera_settings: Some(CameraSettings {
            flash_mode: Some("off".to_string()),
            iso: Some(100),
            focal_length: Some(4.2),
            exposure_time: Some(0.008),
            lens: Some("wide".to_string()),
        }),
        event_hash: String::new(),
        signature: RecordSignature {
            algorithm: String::new(),
            value: String::new(),
        },
    }
}

/// Recompute the digest and signature after the event's fields are final.
pub fn seal_event(mut event: Event, key: &TestKey) -> Event {
    let digest = event_digest(&event).expect("fixture events canonicalize");
    event.event_hash = digest.to_string();
    event.signature = key.record_signature(&digest);
    event
}

pub fn signed_event(key: &TestKey, chain_id: &str, seq: u32, prev_hash: &str) -> Event {
    seal_event(unsigned_event(key, chain_id, seq, prev_hash), key)
}

/// `n` correctly linked events, the first linked to genesis.
pub fn event_chain(key: &TestKey, chain_id: &str, n: u32) -> Vec<Event> {
    let mut events: Vec<Event> = Vec::new();
    for seq in 0..n {
        let prev = events
            .last()
            .map(|e| e.event_hash.clone())
            .unwrap_or_default();
        events.push(signed_event(key, chain_id, seq, &prev));
    }
    events
}

pub fn seal_tombstone(mut tombstone: Tombstone, key: &TestKey) -> Tombstone {
    let digest = tombstone_digest(&tombstone).expect("fixture tombstones canonicalize");
    tombstone.tombstone_hash = digest.to_string();
    tombstone.signature = key.record_signature(&digest);
    tombstone
}

/// A signed tombstone invalidating `target`, linked after `prev_hash`.
pub fn signed_tombstone(key: &TestKey, target: &Event, prev_hash: &str, seq: u32) -> Tombstone {
    let tombstone = Tombstone {
        tombstone_id: format!("0195a1b2-0000-7000-9000-{seq:012x}"),
        chain_id: target.chain_id.clone(),
        target_event_id: target.event_id.clone(),
        target_event_hash: target.event_hash.clone(),
        reason: TombstoneReason::UserRequest,
        executor: TombstoneExecutor::User,
        timestamp: timestamp_at(i64::from(seq)),
        prev_hash: prev_hash.to_string(),
        public_key: key.public_key_b64(),
        tombstone_hash: String::new(),
        signature: RecordSignature {
            algorithm: String::new(),
            value: String::new(),
        },
    };
    seal_tombstone(tombstone, key)
}

/// The stored digest of `event`, parsed.
pub fn digest_of(event: &Event) -> ContentDigest {
    ContentDigest::parse(&event.event_hash).expect("fixture digests are well formed")
}
