//! Hashing - SHA-256 Fingerprints for Split Reports
//!
//! Same plan in, same hashes out: reports from two runs can be diffed.

use sha2::{Sha256, Digest};
use serde::Serialize;
use serde_json::to_string;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Fingerprint of rendered file content.
pub fn fingerprint(content: &str) -> String {
    sha256_hex(content.as_bytes())
}

/// Convert to canonical JSON (sorted keys, no whitespace).
/// Going through `Value` sorts object keys: without the `preserve_order`
/// feature, `serde_json::Map` is a `BTreeMap`.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    to_string(&serde_json::to_value(value)?)
}

/// Hash over the canonical form of a split plan's module records.
pub fn compute_plan_hash<T: Serialize>(plan: &T) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(plan)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}
