//! Proof document builders for both wire variants.

use serde_json::{json, Value};

use proofline_contracts::{anchor::MerkleCommitment, event::Event};
use proofline_core::{record::event_signing_bytes, signature::encode_base64};

/// A minimal ("shareable") proof for `event`, with no anchor.
pub fn minimal_proof(event: &Event) -> Value {
    let raw = event_signing_bytes(event).expect("fixture events canonicalize");
    let mut summary = json!({
        "event_id": event.event_id,
        "timestamp": event.timestamp,
        "asset_hash": event.asset.asset_hash,
        "asset_type": event.asset.asset_type,
        "mime_type": event.asset.mime_type,
    });
    if let Some(camera) = &event.camera_settings {
        summary["camera"] = json!({
            "flash_mode": camera.flash_mode,
            "iso": camera.iso,
            "focal_length": camera.focal_length,
            "exposure_time": camera.exposure_time,
        });
    }
    if let Some(location) = event.sensor_data.as_ref().and_then(|s| s.location.as_ref()) {
        summary["location"] = json!({
            "latitude": location.latitude,
            "longitude": location.longitude,
        });
    }
    let human_attested = event
        .capture_context
        .human_attestation
        .as_ref()
        .map(|h| h.verified)
        .unwrap_or(false);

    json!({
        "proof_version": "1.0",
        "proof_type": "shareable",
        "event": summary,
        "raw_event": encode_base64(&raw),
        "event_hash": event.event_hash,
        "signature": {
            "algorithm": event.signature.algorithm,
            "value": event.signature.value,
        },
        "public_key": event.attested_public_key(),
        "human_attested": human_attested,
    })
}

/// A full proof for `event`, with no anchor.
pub fn full_proof(event: &Event) -> Value {
    json!({
        "proofVersion": "1.0",
        "proofType": "full",
        "event": serde_json::to_value(event).expect("events serialize"),
        "publicKey": event.attested_public_key(),
        "signer": { "name": "Test Device" },
    })
}

/// Anchor object in minimal-variant field naming.  `None` for `commitment`
/// stamps the event digest directly.
pub fn minimal_anchor(commitment: Option<&MerkleCommitment>, token: &[u8], tsa_time: &str) -> Value {
    let mut anchor = json!({
        "granularity": if commitment.is_some() { "merkle_root" } else { "event_hash" },
        "tsa_token": encode_base64(token),
        "tsa_service": crate::tsa::TSA_SERVICE,
        "tsa_time": tsa_time,
    });
    if let Some(c) = commitment {
        anchor["merkle_root"] = json!(c.root);
        anchor["merkle_proof"] = json!(c.path);
        anchor["merkle_index"] = json!(c.index);
        anchor["tree_size"] = json!(c.tree_size);
    }
    anchor
}

/// Anchor object in full-variant field naming.
pub fn full_anchor(commitment: Option<&MerkleCommitment>, token: &[u8], tsa_time: &str) -> Value {
    let mut anchor = json!({
        "granularity": if commitment.is_some() { "merkleRoot" } else { "eventHash" },
        "tsaToken": encode_base64(token),
        "tsaService": crate::tsa::TSA_SERVICE,
        "tsaTime": tsa_time,
    });
    if let Some(c) = commitment {
        anchor["merkleRoot"] = json!(c.root);
        anchor["merkleProof"] = json!(c.path);
        anchor["merkleIndex"] = json!(c.index);
        anchor["treeSize"] = json!(c.tree_size);
    }
    anchor
}

/// Render a proof document as the text a verifier receives.
pub fn to_text(proof: &Value) -> String {
    serde_json::to_string_pretty(proof).expect("proof values serialize")
}
