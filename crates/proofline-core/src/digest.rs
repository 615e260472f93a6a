//! SHA-256 digests over canonical bytes and over streamed media.
//!
//! Media can be large, so the asset digest is computed in fixed-size chunks
//! without ever holding the whole file in memory.  Progress is reported after
//! every chunk and a [`CancellationToken`] is polled before every read.

use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use proofline_contracts::{
    digest::ContentDigest,
    error::{ProoflineError, ProoflineResult},
};

use crate::canonical::canonicalize;

/// Default read size for streamed media digests.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// SHA-256 of `bytes`.
pub fn sha256(bytes: &[u8]) -> ContentDigest {
    let out: [u8; 32] = Sha256::digest(bytes).into();
    ContentDigest::from_bytes(out)
}

/// SHA-256 of the canonical form of `value`.
pub fn digest_of<T: Serialize + ?Sized>(value: &T) -> ProoflineResult<ContentDigest> {
    Ok(sha256(&canonicalize(value)?))
}

/// A shared flag a caller flips to abandon in-flight work.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the token has been flipped.
    pub fn check(&self) -> ProoflineResult<()> {
        if self.is_cancelled() {
            Err(ProoflineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Outcome of comparing streamed media against an expected digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetDigestCheck {
    pub computed: ContentDigest,
    pub bytes_read: u64,
    pub matches: bool,
}

/// Stream `reader` through SHA-256 in `chunk_size` reads.
///
/// `progress` receives the running byte count after each chunk.  Returns the
/// digest and the total byte count.
pub fn digest_reader<R: Read + ?Sized>(
    reader: &mut R,
    chunk_size: usize,
    progress: &mut dyn FnMut(u64),
    cancel: Option<&CancellationToken>,
) -> ProoflineResult<(ContentDigest, u64)> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total: u64 = 0;

    loop {
        if let Some(token) = cancel {
            token.check()?;
        }
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(ProoflineError::MediaRead {
                    reason: e.to_string(),
                })
            }
        };
        hasher.update(&buf[..n]);
        total += n as u64;
        progress(total);
    }

    let out: [u8; 32] = hasher.finalize().into();
    debug!(bytes = total, "media digest computed");
    Ok((ContentDigest::from_bytes(out), total))
}

/// Stream `reader` and compare its digest with `expected`.
pub fn verify_asset_digest<R: Read + ?Sized>(
    reader: &mut R,
    expected: &ContentDigest,
    chunk_size: usize,
    progress: &mut dyn FnMut(u64),
    cancel: Option<&CancellationToken>,
) -> ProoflineResult<AssetDigestCheck> {
    let (computed, bytes_read) = digest_reader(reader, chunk_size, progress, cancel)?;
    Ok(AssetDigestCheck {
        computed,
        bytes_read,
        matches: computed == *expected,
    })
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor, Read};

    use super::*;

    const ABC_HEX: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn sha256_matches_known_vector() {
        assert_eq!(sha256(b"abc").to_hex(), ABC_HEX);
    }

    #[test]
    fn streamed_digest_equals_one_shot_for_any_chunk_size() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let whole = sha256(&data);
        for chunk in [1, 7, 4096, DEFAULT_CHUNK_SIZE] {
            let (streamed, n) =
                digest_reader(&mut Cursor::new(&data), chunk, &mut |_| {}, None).unwrap();
            assert_eq!(streamed, whole, "chunk size {chunk} changed the digest");
            assert_eq!(n, data.len() as u64);
        }
    }

    #[test]
    fn progress_is_monotonic_and_ends_at_total() {
        let data = vec![7u8; 1000];
        let mut seen = Vec::new();
        digest_reader(&mut Cursor::new(&data), 300, &mut |n| seen.push(n), None).unwrap();
        assert_eq!(seen, vec![300, 600, 900, 1000]);
    }

    #[test]
    fn asset_check_reports_mismatch() {
        let expected = sha256(b"original");
        let check =
            verify_asset_digest(&mut Cursor::new(b"tampered"), &expected, 4, &mut |_| {}, None)
                .unwrap();
        assert!(!check.matches);
        assert_eq!(check.bytes_read, 8);
        assert_eq!(check.computed, sha256(b"tampered"));
    }

    #[test]
    fn cancelled_token_aborts_with_no_result() {
        let token = CancellationToken::new();
        let observer = token.clone();
        let data = vec![1u8; 4096];
        let mut reads = 0;
        let result = digest_reader(
            &mut Cursor::new(&data),
            512,
            &mut |_| {
                reads += 1;
                if reads == 2 {
                    observer.cancel();
                }
            },
            Some(&token),
        );
        assert!(matches!(result, Err(ProoflineError::Cancelled)));
        assert_eq!(reads, 2, "reading must stop right after cancellation");
    }

    #[test]
    fn read_failure_maps_to_media_read() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
            }
        }
        let err = digest_reader(&mut Broken, 16, &mut |_| {}, None).unwrap_err();
        assert!(matches!(err, ProoflineError::MediaRead { .. }), "got {err:?}");
    }
}
