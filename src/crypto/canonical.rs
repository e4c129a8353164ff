//! Canonical, deterministic serialization used as the signing preimage
//! (§4.5 step 4). Mirrors Python's
//! `json.dumps(data, sort_keys=True, separators=(',', ':'))`, the scheme
//! the prior implementation's `CertificateSigner.generate_certificate_hash`
//! relies on.
//!
//! `serde_json::Value`'s `Map` is backed by a `BTreeMap` whenever the
//! `preserve_order` feature is disabled (it is, here), so a plain
//! `serde_json::to_string` of a `Value` already emits object keys sorted
//! lexicographically at every nesting level with no insignificant
//! whitespace — exactly the grammar this function name promises.

use crate::error::EngineResult;
use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn canonical_bytes<T: Serialize>(value: &T) -> EngineResult<Vec<u8>> {
    let as_value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&as_value)?)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Helper for building the `completion_hash` and `cert_id` digests, which
/// are hashed over a colon-joined string rather than a canonical JSON
/// document.
pub fn sha256_hex_of_str(s: &str) -> String {
    sha256_hex(s.as_bytes())
}

pub fn verify_canonical_unchanged<T: Serialize>(value: &T, expected_hex: &str) -> EngineResult<bool> {
    let bytes = canonical_bytes(value)?;
    Ok(sha256_hex(&bytes) == expected_hex)
}
