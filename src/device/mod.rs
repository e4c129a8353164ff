//! Platform abstraction over physical block devices.
//!
//! `DeviceBackend` is the single seam between the erasure engine and the
//! operating system: one concrete implementation per platform (here,
//! [`linux::LinuxBackend`]) and an in-memory [`fake::FakeBackend`] used
//! throughout the test suite (§9 "Polymorphism over device backends").

pub mod fake;
#[cfg(target_os = "linux")]
pub mod linux;
pub mod prober;

use crate::error::EngineResult;
use crate::model::{Device, SanitizeAction};

/// Progress reading for a polled hardware sanitize operation.
#[derive(Debug, Clone, Copy)]
pub struct SanitizeProgress {
    /// 0.0 ..= 100.0 when the device reports a progress field, otherwise
    /// an elapsed/estimated approximation (§4.4).
    pub percent: f64,
    pub done: bool,
}

/// A raw, exclusively-held handle to a block device, opened for direct,
/// write-through I/O.
pub trait RawHandle: Send {
    fn size_bytes(&self) -> u64;
    fn sector_size(&self) -> u32;
    /// Write `buf` starting at byte `offset`. Implementations must not
    /// buffer past this call (direct, write-through semantics, §4.2).
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> std::io::Result<()>;
    fn sync(&mut self) -> std::io::Result<()>;
}

/// Result of [`DeviceBackend::acquire_exclusive`]: the raw handle, the
/// volumes that were dismounted along the way, and whether exclusive
/// access had to be degraded to shared-write (§4.2).
pub struct ExclusiveAccess {
    pub handle: Box<dyn RawHandle>,
    pub dismounted_volumes: Vec<String>,
    /// Set when exclusive access could not be obtained and the backend
    /// fell back to shared-write access. Concurrent readers may observe
    /// inconsistent data for the remainder of the operation; this flag
    /// MUST propagate onto the terminal `WipeResult`, not just a log line.
    pub share_degraded: bool,
}

/// Seam between the engine and the operating system. One implementation
/// per platform plus an in-memory fake for tests.
pub trait DeviceBackend: Send + Sync {
    /// Enumerate and classify every physical block device, excluding the
    /// boot device (§4.1). Devices returned are already fully classified;
    /// classification itself is platform-specific and lives behind this
    /// call, not in the prober.
    fn enumerate(&self) -> EngineResult<Vec<Device>>;

    /// Locate and dismount logical volumes backed by `device`, then open
    /// it exclusively for raw write access.
    fn acquire_exclusive(&self, device: &Device) -> EngineResult<ExclusiveAccess>;

    fn issue_ata_secure_erase(&self, device: &Device, enhanced: bool) -> EngineResult<()>;
    fn poll_ata_secure_erase(&self, device: &Device) -> EngineResult<SanitizeProgress>;

    fn issue_nvme_format(&self, device: &Device, lba_format: u8) -> EngineResult<()>;
    fn poll_nvme_format(&self, device: &Device) -> EngineResult<SanitizeProgress>;

    fn issue_nvme_sanitize(&self, device: &Device, action: SanitizeAction) -> EngineResult<()>;
    fn poll_nvme_sanitize(&self, device: &Device) -> EngineResult<SanitizeProgress>;
}
