//! Attestation Builder (C5): assembles, signs, persists and verifies
//! certificates. The double-hash signing scheme here — canonicalize, then
//! hex-digest that as `verification_hash`, then ECDSA-sign over
//! `verification_hash.as_bytes()` (the `_FIXED_SIGNING`/`_FIXED` algorithm
//! family hashes its input with SHA-256 internally, supplying the second
//! hash) — is taken directly from `CertificateSigner.sign_certificate` /
//! `verify_signature` in the prior Python implementation, not re-derived
//! from the distilled spec alone. Signing over an already-hashed digest
//! again before handing it to `ring` would add a third, unintended hash
//! round and break interoperability with any independent verifier built
//! to the same two-hash scheme.

use super::canonical::{canonical_bytes, sha256_hex, sha256_hex_of_str};
use super::keys::{self, raw_point_from_public_key_pem};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use log::info;
use ring::rand::SystemRandom;
use ring::signature::{UnparsedPublicKey, ECDSA_P256_SHA256_FIXED};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::model::{Device, OperatorIdentity, TerminalStatus, WipeMethod, WipeResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureEnvelope {
    pub algorithm: String,
    pub signature: String,
    pub public_key: String,
    pub signed_at: String,
    pub verification_hash: String,
}

#[derive(Debug, Clone)]
pub struct Certificate {
    pub cert_id: String,
    pub version: String,
    pub generated_at: String,
    pub device: Device,
    pub method: WipeMethod,
    pub passes_completed: u32,
    pub start: String,
    pub end: String,
    pub status: TerminalStatus,
    pub completion_hash: String,
    pub operator: OperatorIdentity,
}

impl Certificate {
    /// On-disk body shape (§6), excluding `_signature`. This is the value
    /// that gets canonicalized and hashed.
    pub fn body_json(&self) -> Value {
        json!({
            "cert_id": self.cert_id,
            "version": self.version,
            "generated_at": self.generated_at,
            "device_id": self.device.device_id(),
            "device": self.device.name,
            "device_info": {
                "model": self.device.model,
                "serial": self.device.serial,
                "capacity": self.device.size_bytes,
                "type": self.device.class.as_str(),
            },
            "method_used": self.method.canonical_name(),
            "passes_completed": self.passes_completed,
            "start": self.start,
            "end": self.end,
            "status": self.status.as_str(),
            "verification": {
                "completion_hash": self.completion_hash,
                "method": "SHA-256",
                "verified": true,
            },
            "operator": {
                "user_id": self.operator.user_id,
                "email": self.operator.email,
            },
        })
    }
}

#[derive(Debug, Clone)]
pub struct SignedCertificate {
    pub certificate: Certificate,
    pub envelope: SignatureEnvelope,
}

impl SignedCertificate {
    pub fn to_json(&self) -> Value {
        let mut body = self.certificate.body_json();
        body["_signature"] = json!({
            "algorithm": self.envelope.algorithm,
            "signature": self.envelope.signature,
            "public_key": self.envelope.public_key,
            "signed_at": self.envelope.signed_at,
            "verification_hash": self.envelope.verification_hash,
        });
        body
    }
}

pub struct AttestationBuilder<'a> {
    config: &'a EngineConfig,
}

impl<'a> AttestationBuilder<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// `cert_id = "CERT-" || uppercase(hex(SHA256(device_id || ":" || generated_at))[:16])`
    /// — 16 hex characters, per `generate_cert_id` in the prior implementation.
    pub fn cert_id(device_id: &str, generated_at: &str) -> String {
        let digest = sha256_hex_of_str(&format!("{device_id}:{generated_at}"));
        format!("CERT-{}", digest[..16].to_uppercase())
    }

    /// `completion_hash = SHA256(path || ":" || serial || ":" || method_name || ":" || ISO8601(end))` (§4.5 step 1).
    pub fn completion_hash(device: &Device, method: &WipeMethod, end_iso8601: &str) -> String {
        sha256_hex_of_str(&format!(
            "{}:{}:{}:{}",
            device.path,
            device.serial,
            method.canonical_name(),
            end_iso8601
        ))
    }

    /// Builds and signs a certificate from a terminal `WipeResult`.
    /// Refuses any result that is not `Completed` (§4.5, §7, invariant 8).
    pub fn build(
        &self,
        result: &WipeResult,
        operator: OperatorIdentity,
    ) -> EngineResult<SignedCertificate> {
        if result.terminal_status != TerminalStatus::Completed {
            return Err(EngineError::BuildRefusedNonTerminalSuccess);
        }
        let completion_hash = result
            .completion_hash
            .clone()
            .ok_or(EngineError::BuildRefusedNonTerminalSuccess)?;

        let generated_at = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let cert_id = Self::cert_id(result.device_snapshot.device_id(), &generated_at);

        let certificate = Certificate {
            cert_id,
            version: "1.0".to_string(),
            generated_at,
            device: result.device_snapshot.clone(),
            method: result.method.clone(),
            passes_completed: result.passes_completed,
            start: result.start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            end: result.end.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            status: result.terminal_status,
            completion_hash,
            operator,
        };

        let canonical = canonical_bytes(&certificate.body_json())?;
        let verification_hash = sha256_hex(&canonical);

        let keypair = keys::load_or_generate(&self.config.key_dir)?;
        let rng = SystemRandom::new();
        // `_FIXED_SIGNING` hashes its input with SHA-256 internally, so
        // signing over `verification_hash` directly reproduces exactly two
        // SHA-256 rounds before the EC math (canonicalize -> verification_hash,
        // then this call) — the scheme `certificate_utils/signer.py` pins.
        let signature = keypair
            .key_pair
            .sign(&rng, verification_hash.as_bytes())
            .map_err(|_| EngineError::KeyMissingOrCorrupt("signing failed".into()))?;

        let envelope = SignatureEnvelope {
            algorithm: "ECDSA-SHA256".to_string(),
            signature: STANDARD.encode(signature.as_ref()),
            public_key: keypair.public_key_pem,
            signed_at: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            verification_hash,
        };

        let signed = SignedCertificate { certificate, envelope };
        self.persist(&signed)?;
        Ok(signed)
    }

    fn persist(&self, signed: &SignedCertificate) -> EngineResult<()> {
        std::fs::create_dir_all(&self.config.cert_dir)?;
        let path = self.config.cert_dir.join(&signed.certificate.cert_id);
        let body = serde_json::to_value(signed.to_json())?;
        std::fs::write(path, serde_json::to_vec(&body)?)?;
        info!("persisted certificate {}", signed.certificate.cert_id);
        Ok(())
    }

    /// Dual of `build`: recompute canonical bytes and `verification_hash`,
    /// compare to the envelope, then verify the ECDSA signature.
    pub fn verify(signed: &SignedCertificate) -> EngineResult<()> {
        verify_json(&signed.to_json())
    }
}

/// Verifies a signed certificate directly from its on-disk JSON form
/// (§6 "Verification over the network"): strips `_signature`,
/// recomputes canonical bytes and `verification_hash`, compares against
/// the envelope, then verifies the ECDSA signature. Used both by
/// `AttestationBuilder::verify` and by tests that tamper with the raw
/// JSON body to exercise invariant 4.
pub fn verify_json(cert_json: &Value) -> EngineResult<()> {
    let mut body = cert_json.clone();
    let envelope = body
        .as_object_mut()
        .and_then(|m| m.remove("_signature"))
        .ok_or(EngineError::SignatureInvalid)?;

    let stored_hash = envelope
        .get("verification_hash")
        .and_then(|v| v.as_str())
        .ok_or(EngineError::SignatureInvalid)?;

    let canonical = canonical_bytes(&body)?;
    let recomputed_hash = sha256_hex(&canonical);
    if recomputed_hash != stored_hash {
        return Err(EngineError::SignatureInvalid);
    }

    let signature_b64 = envelope
        .get("signature")
        .and_then(|v| v.as_str())
        .ok_or(EngineError::SignatureInvalid)?;
    let public_key_pem = envelope
        .get("public_key")
        .and_then(|v| v.as_str())
        .ok_or(EngineError::SignatureInvalid)?;

    let signature_bytes = STANDARD
        .decode(signature_b64)
        .map_err(|_| EngineError::SignatureInvalid)?;
    let raw_point = raw_point_from_public_key_pem(public_key_pem)
        .map_err(|_| EngineError::SignatureInvalid)?;
    let public_key = UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, raw_point);

    public_key
        .verify(stored_hash.as_bytes(), &signature_bytes)
        .map_err(|_| EngineError::SignatureInvalid)
}
