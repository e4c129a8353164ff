//! ECDSA P-256 key material: load-or-generate on first use, persisted as
//! PEM with restrictive permissions, mirroring `CertificateSigner`'s
//! lazy key generation in the prior Python implementation.

use crate::error::{EngineError, EngineResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::info;
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use std::fs;
use std::path::Path;

// Fixed DER prefix for a P-256 SubjectPublicKeyInfo wrapping a raw,
// uncompressed EC point (0x04 || X(32) || Y(32)). `ring` hands back the
// raw point only; this is the standard constant header used to make it a
// spec-compliant SPKI for PEM export.
const P256_SPKI_PREFIX: [u8; 26] = [
    0x30, 0x59, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08, 0x2a,
    0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x42, 0x00,
];

pub struct KeyPairPem {
    pub key_pair: EcdsaKeyPair,
    pub public_key_pem: String,
}

/// Loads the key pair from `key_dir`, generating and persisting a fresh
/// one if `private_key.pem` is absent. Generation is serialized by
/// `create_new` on the private key file: whichever caller wins the race
/// creates it, everyone else reads the persisted key (§5).
pub fn load_or_generate(key_dir: &Path) -> EngineResult<KeyPairPem> {
    fs::create_dir_all(key_dir)?;
    let private_path = key_dir.join("private_key.pem");
    let public_path = key_dir.join("public_key.pem");
    let rng = SystemRandom::new();

    let pkcs8_bytes = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&private_path)
    {
        Ok(_) => {
            info!("generating new ECDSA P-256 signing key at {}", private_path.display());
            let doc = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
                .map_err(|_| EngineError::KeyMissingOrCorrupt("key generation failed".into()))?;
            let pkcs8 = doc.as_ref().to_vec();
            write_pem(&private_path, "PRIVATE KEY", &pkcs8)?;
            set_restrictive_permissions(&private_path)?;

            let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &pkcs8, &rng)
                .map_err(|_| EngineError::KeyMissingOrCorrupt("key parse failed".into()))?;
            let public_pem = encode_public_key_pem(key_pair.public_key().as_ref());
            write_pem_text(&public_path, &public_pem)?;
            pkcs8
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            read_pem(&private_path)?
        }
        Err(e) => return Err(EngineError::Io(e)),
    };

    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &pkcs8_bytes, &rng)
        .map_err(|_| EngineError::KeyMissingOrCorrupt("key parse failed".into()))?;
    let public_key_pem = encode_public_key_pem(key_pair.public_key().as_ref());

    Ok(KeyPairPem { key_pair, public_key_pem })
}

pub fn encode_public_key_pem(raw_point: &[u8]) -> String {
    let mut der = Vec::with_capacity(P256_SPKI_PREFIX.len() + raw_point.len());
    der.extend_from_slice(&P256_SPKI_PREFIX);
    der.extend_from_slice(raw_point);
    pem_wrap("PUBLIC KEY", &der)
}

/// Recovers the raw uncompressed EC point from a PEM produced by
/// [`encode_public_key_pem`], for use with `ring::signature::UnparsedPublicKey`.
pub fn raw_point_from_public_key_pem(pem: &str) -> EngineResult<Vec<u8>> {
    let der = pem_unwrap(pem)?;
    if der.len() <= P256_SPKI_PREFIX.len() {
        return Err(EngineError::KeyMissingOrCorrupt("public key PEM truncated".into()));
    }
    Ok(der[P256_SPKI_PREFIX.len()..].to_vec())
}

fn pem_wrap(label: &str, der: &[u8]) -> String {
    let b64 = STANDARD.encode(der);
    let mut out = format!("-----BEGIN {label}-----\n");
    for chunk in b64.as_bytes().chunks(64) {
        out.push_str(std::str::from_utf8(chunk).unwrap());
        out.push('\n');
    }
    out.push_str(&format!("-----END {label}-----\n"));
    out
}

fn pem_unwrap(pem: &str) -> EngineResult<Vec<u8>> {
    let b64: String = pem
        .lines()
        .filter(|l| !l.starts_with("-----"))
        .collect::<Vec<_>>()
        .join("");
    STANDARD
        .decode(b64)
        .map_err(|e| EngineError::KeyMissingOrCorrupt(e.to_string()))
}

fn write_pem(path: &Path, label: &str, der: &[u8]) -> EngineResult<()> {
    write_pem_text(path, &pem_wrap(label, der))
}

fn write_pem_text(path: &Path, text: &str) -> EngineResult<()> {
    fs::write(path, text)?;
    Ok(())
}

fn read_pem(path: &Path) -> EngineResult<Vec<u8>> {
    let text = fs::read_to_string(path)?;
    pem_unwrap(&text)
}

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) -> EngineResult<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_restrictive_permissions(_path: &Path) -> EngineResult<()> {
    Ok(())
}
