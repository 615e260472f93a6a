//! Content digest value type.
//!
//! Digests travel through proof documents and ledgers as strings of the form
//! `sha256:<64 lowercase hex>`.  `ContentDigest` is the parsed, fixed-size form
//! used everywhere a digest is compared or fed into signature verification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ProoflineError, ProoflineResult};

/// Algorithm tag prefixed to every rendered digest.
pub const DIGEST_PREFIX: &str = "sha256:";

/// Length in bytes of a SHA-256 digest.
pub const DIGEST_LEN: usize = 32;

/// A 32-byte SHA-256 content digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; DIGEST_LEN]);

impl ContentDigest {
    /// The all-zero digest, accepted as the genesis `prevHash`.
    pub const ZERO: ContentDigest = ContentDigest([0u8; DIGEST_LEN]);

    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Build a digest from a slice, which must be exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> ProoflineResult<Self> {
        let arr: [u8; DIGEST_LEN] =
            bytes.try_into().map_err(|_| ProoflineError::MalformedDigest {
                value: hex::encode(bytes),
                reason: format!("expected {} bytes, got {}", DIGEST_LEN, bytes.len()),
            })?;
        Ok(Self(arr))
    }

    /// The raw digest bytes.  These, and only these, are what signatures cover.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Lowercase hex without the algorithm prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a rendered digest.  Accepts `sha256:<hex>` or bare hex, with
    /// upper- or lowercase digits.
    pub fn parse(value: &str) -> ProoflineResult<Self> {
        let trimmed = value.trim();
        let hex_part = match trimmed.split_once(':') {
            Some((algo, rest)) if algo.eq_ignore_ascii_case("sha256") => rest,
            Some((algo, _)) => {
                return Err(ProoflineError::MalformedDigest {
                    value: value.to_string(),
                    reason: format!("unsupported digest algorithm '{algo}'"),
                })
            }
            None => trimmed,
        };

        if hex_part.len() != DIGEST_LEN * 2 {
            return Err(ProoflineError::MalformedDigest {
                value: value.to_string(),
                reason: format!("expected {} hex characters, got {}", DIGEST_LEN * 2, hex_part.len()),
            });
        }

        let bytes = hex::decode(hex_part).map_err(|e| ProoflineError::MalformedDigest {
            value: value.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_slice(&bytes)
    }

    /// True for the all-zero digest.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; DIGEST_LEN]
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", DIGEST_PREFIX, self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({self})")
    }
}

impl FromStr for ContentDigest {
    type Err = ProoflineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ContentDigest::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// True when `link` is an acceptable genesis `prevHash`: empty, or the
/// all-zero digest in any accepted rendering.
pub fn is_genesis_link(link: &str) -> bool {
    link.trim().is_empty() || ContentDigest::parse(link).map(|d| d.is_zero()).unwrap_or(false)
}
