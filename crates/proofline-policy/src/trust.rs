//! Trust anchors and the offline revocation list.

use std::collections::HashMap;

use tracing::debug;

use proofline_contracts::anchor::{Certificate, RevocationStatus};
use proofline_core::{RevocationChecker, RevocationUnavailable};

use crate::config::RevokedEntry;

/// A root of trust: a subject name bound to a public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchor {
    pub name: String,
    /// Raw Ed25519 public key bytes.
    pub public_key: Vec<u8>,
}

/// The set of roots a certificate chain may terminate in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustStore {
    anchors: Vec<TrustAnchor>,
}

impl TrustStore {
    pub fn new(anchors: Vec<TrustAnchor>) -> Self {
        Self { anchors }
    }

    pub fn add(&mut self, anchor: TrustAnchor) {
        self.anchors.push(anchor);
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Anchors whose name equals `name`.  Several keys may share a name
    /// across a key rollover.
    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a TrustAnchor> + 'a {
        self.anchors.iter().filter(move |a| a.name == name)
    }
}

/// Revocation data loaded from configuration, keyed by issuer and serial.
///
/// Always answers; a certificate absent from the list is `Good`.
#[derive(Debug, Clone, Default)]
pub struct RevocationList {
    entries: HashMap<(String, String), RevokedEntry>,
}

impl RevocationList {
    pub fn new(entries: impl IntoIterator<Item = RevokedEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| ((e.issuer.clone(), e.serial_number.clone()), e))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RevocationChecker for RevocationList {
    fn status(&self, certificate: &Certificate) -> Result<RevocationStatus, RevocationUnavailable> {
        let key = (certificate.issuer.clone(), certificate.serial_number.clone());
        match self.entries.get(&key) {
            Some(entry) => {
                debug!(
                    serial = %certificate.serial_number,
                    issuer = %certificate.issuer,
                    revoked_at = %entry.revoked_at,
                    "certificate found on revocation list"
                );
                Ok(RevocationStatus::Revoked {
                    revoked_at: entry.revoked_at,
                    reason: entry.reason.clone(),
                })
            }
            None => Ok(RevocationStatus::Good),
        }
    }
}
