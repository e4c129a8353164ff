//! Core data types shared by every component: discovered devices, wipe
//! methods and pass plans, progress events, and the terminal result that
//! feeds the attestation builder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device transport/media classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceClass {
    HDD,
    SataSsd,
    NvmeSsd,
    RemovableFlash,
    Unknown,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::HDD => "HDD",
            DeviceClass::SataSsd => "SATA_SSD",
            DeviceClass::NvmeSsd => "NVME_SSD",
            DeviceClass::RemovableFlash => "REMOVABLE_FLASH",
            DeviceClass::Unknown => "UNKNOWN",
        }
    }
}

/// A physical block device discovered by the Capability Prober.
///
/// Immutable once constructed; a fresh enumeration discards and replaces
/// every `Device` rather than mutating one in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Stable, opaque OS-specific identifier (e.g. `/dev/sda`).
    pub path: String,
    pub name: String,
    pub model: String,
    pub serial: String,
    pub size_bytes: u64,
    pub sector_size: u32,
    pub class: DeviceClass,
    pub supports_ata_secure_erase: bool,
    pub supports_ata_enhanced: bool,
    pub supports_nvme_format: bool,
    pub supports_nvme_sanitize: bool,
    pub frozen: bool,
    pub is_system: bool,
}

impl Device {
    /// Opaque stable id used as the `device_id` in certificates. The
    /// device path is the most stable identifier the prober has (serial
    /// numbers are occasionally empty on cheap flash media).
    pub fn device_id(&self) -> &str {
        &self.path
    }
}

/// A single overwrite pass specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PassSpec {
    Zeros,
    Ones,
    /// Cryptographic RNG stream. The seed only matters in
    /// `EngineConfig::test_mode`, where it makes the stream reproducible.
    RandomStream(u64),
    FixedPattern(Vec<u8>),
}

/// Non-empty ordered sequence of passes, produced by `WipeMethod::pass_plan`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassPlan(pub Vec<PassSpec>);

impl PassPlan {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// NVMe Sanitize action selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SanitizeAction {
    Crypto,
    BlockErase,
    Overwrite,
}

/// Named erasure policy: either a software pass plan or a hardware
/// sanitize dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WipeMethod {
    Quick,
    DoD3,
    DoD7,
    Gutmann35,
    AtaSecureErase { enhanced: bool },
    NvmeFormat { lba_format: u8 },
    NvmeSanitize { action: SanitizeAction },
}

impl WipeMethod {
    /// Exact strings persisted in certificates (§6).
    pub fn canonical_name(&self) -> &'static str {
        match self {
            WipeMethod::Quick => "Quick Wipe (1-Pass Zeros)",
            WipeMethod::DoD3 => "DoD 3-Pass",
            WipeMethod::DoD7 => "DoD 7-Pass",
            WipeMethod::Gutmann35 => "Gutmann 35-Pass",
            WipeMethod::AtaSecureErase { enhanced: false } => "ATA Secure Erase",
            WipeMethod::AtaSecureErase { enhanced: true } => "ATA Enhanced Secure Erase",
            WipeMethod::NvmeFormat { .. } => "NVMe Format NVM",
            WipeMethod::NvmeSanitize {
                action: SanitizeAction::Crypto,
            } => "NVMe Sanitize (Crypto Erase)",
            WipeMethod::NvmeSanitize {
                action: SanitizeAction::BlockErase,
            } => "NVMe Sanitize (Block Erase)",
            WipeMethod::NvmeSanitize {
                action: SanitizeAction::Overwrite,
            } => "NVMe Sanitize (Overwrite)",
        }
    }

    pub fn is_hardware(&self) -> bool {
        matches!(
            self,
            WipeMethod::AtaSecureErase { .. }
                | WipeMethod::NvmeFormat { .. }
                | WipeMethod::NvmeSanitize { .. }
        )
    }

    /// Builds the pass plan for software methods. `seed` is used only for
    /// the `RandomStream` passes and only has observable effect in test
    /// mode (§4.3).
    pub fn pass_plan(&self, seed: u64) -> Option<PassPlan> {
        let passes = match self {
            WipeMethod::Quick => vec![PassSpec::Zeros],
            WipeMethod::DoD3 => vec![PassSpec::Zeros, PassSpec::Ones, PassSpec::RandomStream(seed)],
            WipeMethod::DoD7 => vec![
                PassSpec::Zeros,
                PassSpec::Ones,
                PassSpec::RandomStream(seed),
                PassSpec::Zeros,
                PassSpec::Ones,
                PassSpec::RandomStream(seed),
                PassSpec::Zeros,
            ],
            WipeMethod::Gutmann35 => (0..35).map(|i| PassSpec::RandomStream(seed ^ i)).collect(),
            _ => return None,
        };
        Some(PassPlan(passes))
    }
}

/// Phase reported alongside a `ProgressEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Preparing,
    Writing,
    Finalizing,
    Verifying,
}

/// A single progress update sent from the worker to the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub pass_index: u32,
    pub pass_total: u32,
    pub bytes_done: u64,
    pub bytes_total: u64,
    pub phase: Phase,
    pub message: String,
}

/// Terminal status of a wipe operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalStatus {
    Completed,
    Cancelled,
    Failed,
}

impl TerminalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalStatus::Completed => "Completed",
            TerminalStatus::Cancelled => "Cancelled",
            TerminalStatus::Failed => "Failed",
        }
    }
}

/// Terminal record produced by `begin_wipe`, consumed by the attestation
/// builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WipeResult {
    pub device_snapshot: Device,
    pub method: WipeMethod,
    pub plan_executed: Option<PassPlan>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub passes_completed: u32,
    pub terminal_status: TerminalStatus,
    pub failure_kind: Option<String>,
    /// Present only when `terminal_status == Completed` (§4.5 step 1).
    pub completion_hash: Option<String>,
    /// Set when the Volume Controller could not obtain exclusive write
    /// access and fell back to shared-write access (§4.2). A degraded
    /// wipe can still complete, but concurrent readers may have observed
    /// inconsistent data during the overwrite — this MUST surface beyond
    /// the log line that recorded it.
    pub share_degraded: bool,
}

/// Opaque operator identity supplied by an external collaborator
/// (authentication is out of scope for this engine).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorIdentity {
    pub user_id: String,
    pub email: String,
}
