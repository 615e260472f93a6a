//! Proof document parser.
//!
//! `ProofParser::parse` sniffs the wire variant with one JSON Schema per
//! variant, minimal first, and normalizes whichever matched into a
//! [`ParsedProof`].  Nothing downstream of this module knows that two wire
//! shapes exist.
//!
//! Parsing is purely structural.  Digests, signatures and the proof format
//! version are carried through unjudged for the orchestrator to check.

use jsonschema::Validator;
use serde_json::Value;
use tracing::debug;

use proofline_contracts::{
    anchor::{Anchor, AnchorGranularity, MerkleCommitment},
    error::{ProoflineError, ProoflineResult},
    event::{CameraSettings, Event, Location},
    proof::{AttestationInfo, EventSummary, ParsedProof, RawEvent, WireVariant},
};
use proofline_core::{record::value_signing_bytes, signature::decode_base64};

use crate::wire::{
    full_schema, minimal_schema, FullAnchor, FullGranularity, FullProof, MinimalAnchor,
    MinimalGranularity, MinimalProof,
};

fn parse_error(reason: impl Into<String>) -> ProoflineError {
    ProoflineError::Parse {
        reason: reason.into(),
    }
}

fn decode_field(field: &str, value: &str) -> ProoflineResult<Vec<u8>> {
    decode_base64(value).map_err(|e| parse_error(format!("{field} is not base64: {e}")))
}

/// Parses proof documents of either wire variant.
pub struct ProofParser {
    minimal: Validator,
    full: Validator,
}

impl ProofParser {
    /// Compile both variant schemas.
    pub fn new() -> ProoflineResult<Self> {
        let compile = |name: &str, schema: Value| {
            jsonschema::validator_for(&schema)
                .map_err(|e| parse_error(format!("invalid {name} proof schema: {e}")))
        };
        Ok(Self {
            minimal: compile("minimal", minimal_schema())?,
            full: compile("full", full_schema())?,
        })
    }

    /// Parse `text` into the normalized proof shape.
    pub fn parse(&self, text: &str) -> ProoflineResult<ParsedProof> {
        let document: Value = serde_json::from_str(text)
            .map_err(|e| parse_error(format!("not valid JSON: {e}")))?;

        let minimal_complaints = Self::complaints(&self.minimal, &document);
        if minimal_complaints.is_empty() {
            debug!(variant = %WireVariant::Minimal, "proof variant detected");
            let proof: MinimalProof = serde_json::from_value(document)
                .map_err(|e| parse_error(format!("minimal proof: {e}")))?;
            return normalize_minimal(proof);
        }

        let full_complaints = Self::complaints(&self.full, &document);
        if full_complaints.is_empty() {
            debug!(variant = %WireVariant::Full, "proof variant detected");
            let proof: FullProof = serde_json::from_value(document)
                .map_err(|e| parse_error(format!("full proof: {e}")))?;
            return normalize_full(proof);
        }

        Err(parse_error(format!(
            "document matches neither proof variant; as minimal: {}; as full: {}",
            minimal_complaints.join(", "),
            full_complaints.join(", ")
        )))
    }

    fn complaints(validator: &Validator, document: &Value) -> Vec<String> {
        validator
            .iter_errors(document)
            .map(|error| {
                let path = error.instance_path.to_string();
                if path.is_empty() {
                    error.to_string()
                } else {
                    format!("{error} at {path}")
                }
            })
            .collect()
    }
}

// ── Minimal variant ───────────────────────────────────────────────────────────

fn normalize_minimal(proof: MinimalProof) -> ProoflineResult<ParsedProof> {
    let raw_event = match &proof.raw_event {
        Some(encoded) => RawEvent::Carried(decode_field("raw_event", encoded)?),
        None => RawEvent::Missing,
    };

    // The key recorded inside the signed bytes, when they are readable JSON.
    let attested_public_key = raw_event
        .bytes()
        .and_then(|bytes| serde_json::from_slice::<Value>(bytes).ok())
        .and_then(|raw| {
            raw.pointer("/captureContext/keyAttestation/publicKey")
                .and_then(Value::as_str)
                .and_then(|key| decode_base64(key).ok())
        });

    let camera = proof.event.camera.map(|c| CameraSettings {
        flash_mode: c.flash_mode,
        iso: c.iso,
        focal_length: c.focal_length,
        exposure_time: c.exposure_time,
        lens: None,
    });
    let summary = EventSummary {
        event_id: proof.event.event_id,
        timestamp: proof.event.timestamp,
        asset_hash: proof.event.asset_hash,
        asset_type: proof.event.asset_type,
        mime_type: proof.event.mime_type,
        flash_mode: camera.as_ref().and_then(|c| c.flash_mode.clone()),
        camera,
        device_model: None,
        location: proof.event.location.map(|l| Location {
            latitude: l.latitude,
            longitude: l.longitude,
            altitude: None,
            horizontal_accuracy: None,
        }),
    };

    Ok(ParsedProof {
        variant: WireVariant::Minimal,
        proof_version: proof.proof_version,
        summary,
        raw_event,
        event: None,
        claimed_event_hash: proof.event_hash,
        signature_algorithm: Some(proof.signature.algorithm),
        signature: Some(decode_field("signature", &proof.signature.value)?),
        public_key: proof
            .public_key
            .as_deref()
            .map(|key| decode_field("public_key", key))
            .transpose()?,
        attested_public_key,
        anchor: proof.anchor.map(minimal_anchor).transpose()?,
        attestation: AttestationInfo {
            human_attested: proof.human_attested,
            record: None,
        },
        signer_name: None,
        tombstone: proof.tombstone,
    })
}

fn minimal_anchor(anchor: MinimalAnchor) -> ProoflineResult<Anchor> {
    let granularity = match anchor.granularity {
        MinimalGranularity::MerkleRoot => AnchorGranularity::MerkleRoot,
        MinimalGranularity::EventHash => AnchorGranularity::EventHash,
    };
    build_anchor(
        granularity,
        anchor.merkle_root,
        anchor.merkle_proof,
        anchor.merkle_index,
        anchor.tree_size,
        decode_field("anchor.tsa_token", &anchor.tsa_token)?,
        anchor.tsa_service,
        anchor.tsa_time,
    )
}

// ── Full variant ──────────────────────────────────────────────────────────────

fn normalize_full(proof: FullProof) -> ProoflineResult<ParsedProof> {
    let event: Event = serde_json::from_value(proof.event.clone())
        .map_err(|e| parse_error(format!("full proof event: {e}")))?;

    let raw_event = RawEvent::Reconstructed(value_signing_bytes(
        &proof.event,
        &Event::UNSIGNED_FIELDS,
    ));
    let attested_public_key = decode_field(
        "event.captureContext.keyAttestation.publicKey",
        event.attested_public_key(),
    )?;

    let human = event.capture_context.human_attestation.clone();
    let summary = EventSummary {
        event_id: event.event_id.clone(),
        timestamp: event.timestamp.clone(),
        asset_hash: event.asset.asset_hash.clone(),
        asset_type: Some(event.asset.asset_type),
        mime_type: Some(event.asset.mime_type.clone()),
        flash_mode: event
            .camera_settings
            .as_ref()
            .and_then(|c| c.flash_mode.clone()),
        camera: event.camera_settings.clone(),
        device_model: Some(event.capture_context.device_model.clone()),
        location: event.sensor_data.as_ref().and_then(|s| s.location.clone()),
    };

    Ok(ParsedProof {
        variant: WireVariant::Full,
        proof_version: proof.proof_version,
        summary,
        raw_event,
        claimed_event_hash: event.event_hash.clone(),
        signature_algorithm: Some(event.signature.algorithm.clone()),
        signature: Some(decode_field("event.signature.value", &event.signature.value)?),
        public_key: proof
            .public_key
            .as_deref()
            .map(|key| decode_field("publicKey", key))
            .transpose()?,
        attested_public_key: Some(attested_public_key),
        anchor: proof.anchor.map(full_anchor).transpose()?,
        attestation: AttestationInfo {
            human_attested: human.as_ref().map(|h| h.verified).unwrap_or(false),
            record: human,
        },
        signer_name: proof.signer.map(|s| s.name),
        tombstone: proof.tombstone,
        event: Some(proof.event),
    })
}

fn full_anchor(anchor: FullAnchor) -> ProoflineResult<Anchor> {
    let granularity = match anchor.granularity {
        FullGranularity::MerkleRoot => AnchorGranularity::MerkleRoot,
        FullGranularity::EventHash => AnchorGranularity::EventHash,
    };
    build_anchor(
        granularity,
        anchor.merkle_root,
        anchor.merkle_proof,
        anchor.merkle_index,
        anchor.tree_size,
        decode_field("anchor.tsaToken", &anchor.tsa_token)?,
        anchor.tsa_service,
        anchor.tsa_time,
    )
}

#[allow(clippy::too_many_arguments)]
fn build_anchor(
    granularity: AnchorGranularity,
    merkle_root: Option<String>,
    merkle_proof: Vec<String>,
    merkle_index: Option<u64>,
    tree_size: Option<u64>,
    tsa_token: Vec<u8>,
    tsa_service: Option<String>,
    tsa_time: Option<String>,
) -> ProoflineResult<Anchor> {
    // Inclusion fields are meaningless when the token stamps the event digest.
    let merkle = match granularity {
        AnchorGranularity::EventHash => None,
        AnchorGranularity::MerkleRoot => merkle_root.map(|root| MerkleCommitment {
            root,
            path: merkle_proof,
            index: merkle_index.unwrap_or(0),
            tree_size: tree_size.unwrap_or(0),
        }),
    };
    Ok(Anchor {
        granularity,
        merkle,
        tsa_token,
        tsa_service,
        tsa_time,
    })
}
