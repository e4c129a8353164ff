use thiserror::Error;

/// Crate-wide error taxonomy for the erasure and attestation engine.
///
/// Every fallible operation in this crate returns a variant from this
/// enum rather than propagating an opaque `anyhow::Error` — callers are
/// expected to match on the taxonomy (§7 of the engine design), not
/// downcast a boxed error.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("device enumeration failed: {0}")]
    EnumerationFailed(String),

    #[error("access denied opening device {device}: {reason}")]
    AccessDenied { device: String, reason: String },

    #[error("device {0} busy: volume still held after dismount")]
    DeviceBusy(String),

    #[error("device {0} vanished during operation")]
    DeviceVanished(String),

    #[error("device {0} is write protected")]
    WriteProtected(String),

    #[error("drive {0} is frozen; power-cycle required")]
    DriveFrozen(String),

    #[error("write failed at offset {offset}: {underlying}")]
    WriteFailed { offset: u64, underlying: String },

    #[error("hardware sanitize command failed: {0}")]
    HardwareSanitizeFailed(String),

    #[error("attestation refused: wipe result is not Completed")]
    BuildRefusedNonTerminalSuccess,

    #[error("certificate signature is invalid")]
    SignatureInvalid,

    #[error("signing key directory missing or corrupt: {0}")]
    KeyMissingOrCorrupt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
