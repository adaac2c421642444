//! Content hashing for exact deduplication
//!
//! All algorithms reduce to a 64-bit fingerprint: xxhash64 natively,
//! the cryptographic digests by taking the top 8 bytes. Collisions are
//! an accepted false-positive risk; byte-equality verification is not
//! performed.

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use xxhash_rust::xxh64::xxh64;

/// Hash algorithm selection for exact dedup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    #[default]
    #[serde(rename = "xxhash")]
    XxHash64,
}

impl HashAlgorithm {
    /// Compute the 64-bit content hash of `text` under this algorithm.
    pub fn hash(&self, text: &str) -> u64 {
        match self {
            HashAlgorithm::Md5 => {
                let digest = Md5::digest(text.as_bytes());
                top_u64(&digest)
            }
            HashAlgorithm::Sha1 => {
                let digest = Sha1::digest(text.as_bytes());
                top_u64(&digest)
            }
            HashAlgorithm::Sha256 => {
                let digest = Sha256::digest(text.as_bytes());
                top_u64(&digest)
            }
            HashAlgorithm::XxHash64 => xxh64(text.as_bytes(), 0),
        }
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "xxhash" | "xxhash64" => Ok(HashAlgorithm::XxHash64),
            other => Err(crate::Error::InvalidConfig(format!(
                "unknown hash algorithm: {other}"
            ))),
        }
    }
}

/// Big-endian u64 from the first 8 digest bytes.
fn top_u64(digest: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Cheap 64-bit fingerprint for caching (not configurable).
pub fn fingerprint(text: &str) -> u64 {
    seahash::hash(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_consistency() {
        for algo in [
            HashAlgorithm::Md5,
            HashAlgorithm::Sha1,
            HashAlgorithm::Sha256,
            HashAlgorithm::XxHash64,
        ] {
            assert_eq!(algo.hash("test data"), algo.hash("test data"));
            assert_ne!(algo.hash("test data"), algo.hash("test datb"));
        }
    }

    #[test]
    fn test_algorithms_disagree() {
        // Different algorithms should produce different fingerprints for
        // the same input (not a guarantee, but vanishingly unlikely to fail)
        let text = "the quick brown fox";
        assert_ne!(
            HashAlgorithm::Md5.hash(text),
            HashAlgorithm::Sha256.hash(text)
        );
        assert_ne!(
            HashAlgorithm::Sha1.hash(text),
            HashAlgorithm::XxHash64.hash(text)
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!("xxhash".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::XxHash64);
        assert_eq!("MD5".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Md5);
        assert!("crc32".parse::<HashAlgorithm>().is_err());
    }

    #[test]
    fn test_fingerprint_stable() {
        assert_eq!(fingerprint("hello"), fingerprint("hello"));
    }
}
