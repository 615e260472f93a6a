//! External time-stamp anchors and the certificate material they carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;

/// What the time-stamp token's message imprint commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorGranularity {
    /// The token stamps a Merkle root; the event is proven by inclusion.
    MerkleRoot,
    /// The token stamps the event digest directly.
    EventHash,
}

/// A Merkle inclusion proof for one event digest.
#[derive(Debug, Clone, PartialEq)]
pub struct MerkleCommitment {
    /// Claimed root, rendered `sha256:<hex>`.
    pub root: String,
    /// Sibling digests from the leaf level upward.
    pub path: Vec<String>,
    /// Zero-based leaf position.
    pub index: u64,
    /// Number of leaves in the tree.
    pub tree_size: u64,
}

/// An external commitment attached to an event.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub granularity: AnchorGranularity,
    /// Present when `granularity` is `MerkleRoot`.
    pub merkle: Option<MerkleCommitment>,
    /// Raw time-stamp authority response token.
    pub tsa_token: Vec<u8>,
    /// Identifier of the issuing service, e.g. its URL.
    pub tsa_service: Option<String>,
    /// Generation time the proof claims for the token.  The token's own
    /// `genTime` is authoritative; this is only compared against it.
    pub tsa_time: Option<String>,
}

/// A signing certificate carried inside a time-stamp token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub serial_number: String,
    pub subject: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Base64 Ed25519 public key of the subject.
    pub public_key: String,
    #[serde(default)]
    pub is_ca: bool,
    /// Base64 issuer signature over the to-be-signed digest.
    pub signature: String,

    /// Digest of the certificate's to-be-signed bytes, filled by the token
    /// parser from the bytes it actually received.
    #[serde(skip)]
    pub tbs_digest: Option<ContentDigest>,
}

impl Certificate {
    /// Wire names of the fields excluded from the to-be-signed bytes.
    pub const UNSIGNED_FIELDS: [&'static str; 1] = ["signature"];

    /// True when `instant` falls inside the validity window (inclusive).
    pub fn is_valid_at(&self, instant: DateTime<Utc>) -> bool {
        self.not_before <= instant && instant <= self.not_after
    }

    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }
}

/// The parts of a time-stamp token that anchor verification needs.
///
/// This is the narrow interface between the encoding-specific token parser
/// and the encoding-independent trust policy.
#[derive(Debug, Clone)]
pub struct ParsedTimestampToken {
    /// The digest the authority stamped.
    pub message_imprint: ContentDigest,
    /// The authority's claimed generation time.  Certificate validity is
    /// evaluated at this instant, never at verification time.
    pub gen_time: DateTime<Utc>,
    pub serial_number: String,
    pub policy: Option<String>,
    pub tsa_name: Option<String>,
    pub signer_certificate: Certificate,
    /// Further certificates carried in the token, nearest issuer first.
    pub intermediates: Vec<Certificate>,
    /// Digest of the signed token content.
    pub signed_digest: ContentDigest,
    /// Signature over `signed_digest` by the signer certificate's key.
    pub signature: Vec<u8>,
}

/// Revocation state of one certificate as reported by a revocation source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationStatus {
    Good,
    Revoked {
        revoked_at: DateTime<Utc>,
        reason: Option<String>,
    },
}
