//! Merkle inclusion proofs over event digests.
//!
//! Tree shape: leaves are the event digests themselves, an interior node is
//! `sha256(left || right)`, and a node without a right sibling is promoted to
//! the next level unchanged.  This is the shape `rs_merkle` builds, so
//! commitments produced by [`MerkleBatch`] verify with [`verify_inclusion`]
//! and vice versa.

use rs_merkle::{algorithms::Sha256, MerkleTree};
use thiserror::Error;

use proofline_contracts::{anchor::MerkleCommitment, digest::ContentDigest};
use proofline_core::digest::sha256;

/// Why an inclusion proof did not verify.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    #[error("tree size is zero")]
    EmptyTree,

    #[error("leaf index {index} is outside a tree of {tree_size} leaves")]
    IndexOutOfRange { index: u64, tree_size: u64 },

    #[error("malformed digest in proof: {reason}")]
    MalformedDigest { reason: String },

    #[error("path has {actual} siblings, expected {expected}")]
    PathLength { expected: usize, actual: usize },

    #[error("recomputed root {computed} does not match claimed root {claimed}")]
    RootMismatch {
        claimed: ContentDigest,
        computed: ContentDigest,
    },
}

fn node(left: &ContentDigest, right: &ContentDigest) -> ContentDigest {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left.as_bytes());
    buf[32..].copy_from_slice(right.as_bytes());
    sha256(&buf)
}

/// Number of siblings an inclusion path for `index` must contain.
pub fn expected_path_len(index: u64, tree_size: u64) -> usize {
    let (mut idx, mut len, mut count) = (index, tree_size, 0usize);
    while len > 1 {
        if idx ^ 1 < len {
            count += 1;
        }
        idx >>= 1;
        len = (len + 1) / 2;
    }
    count
}

/// Recompute the root from `leaf` and the commitment's path, and compare it
/// with the claimed root.  Returns the verified root.
pub fn verify_inclusion(
    leaf: &ContentDigest,
    commitment: &MerkleCommitment,
) -> Result<ContentDigest, MerkleError> {
    let claimed = ContentDigest::parse(&commitment.root).map_err(|e| MerkleError::MalformedDigest {
        reason: e.to_string(),
    })?;
    let path = commitment
        .path
        .iter()
        .map(|s| ContentDigest::parse(s))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| MerkleError::MalformedDigest {
            reason: e.to_string(),
        })?;

    let computed = compute_root(leaf, &path, commitment.index, commitment.tree_size)?;
    if computed != claimed {
        return Err(MerkleError::RootMismatch { claimed, computed });
    }
    Ok(computed)
}

/// Walk `path` upward from `leaf`.  The whole path must be consumed.
pub fn compute_root(
    leaf: &ContentDigest,
    path: &[ContentDigest],
    index: u64,
    tree_size: u64,
) -> Result<ContentDigest, MerkleError> {
    if tree_size == 0 {
        return Err(MerkleError::EmptyTree);
    }
    if index >= tree_size {
        return Err(MerkleError::IndexOutOfRange { index, tree_size });
    }

    let expected = expected_path_len(index, tree_size);
    if path.len() != expected {
        return Err(MerkleError::PathLength {
            expected,
            actual: path.len(),
        });
    }

    let mut current = *leaf;
    let mut siblings = path.iter();
    let (mut idx, mut len) = (index, tree_size);
    while len > 1 {
        if idx ^ 1 < len {
            // Length was checked above, so a sibling is always there.
            if let Some(sibling) = siblings.next() {
                current = if idx % 2 == 0 {
                    node(&current, sibling)
                } else {
                    node(sibling, &current)
                };
            }
        }
        idx >>= 1;
        len = (len + 1) / 2;
    }
    Ok(current)
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// A batch of event digests committed under one root.
pub struct MerkleBatch {
    leaves: Vec<ContentDigest>,
    tree: MerkleTree<Sha256>,
}

impl MerkleBatch {
    pub fn new(leaves: Vec<ContentDigest>) -> Self {
        let raw: Vec<[u8; 32]> = leaves.iter().map(|d| *d.as_bytes()).collect();
        let tree = MerkleTree::<Sha256>::from_leaves(&raw);
        Self { leaves, tree }
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// The root, or `None` for an empty batch.
    pub fn root(&self) -> Option<ContentDigest> {
        self.tree.root().map(ContentDigest::from_bytes)
    }

    /// Inclusion commitment for the leaf at `index`.
    pub fn commitment(&self, index: usize) -> Option<MerkleCommitment> {
        if index >= self.leaves.len() {
            return None;
        }
        let root = self.root()?;
        let proof = self.tree.proof(&[index]);
        let path = proof
            .proof_hashes()
            .iter()
            .map(|h| ContentDigest::from_bytes(*h).to_string())
            .collect();
        Some(MerkleCommitment {
            root: root.to_string(),
            path,
            index: index as u64,
            tree_size: self.leaves.len() as u64,
        })
    }
}
