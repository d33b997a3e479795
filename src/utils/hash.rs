use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of a byte slice
pub fn compute_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
