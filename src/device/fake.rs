//! In-memory `DeviceBackend` used by the test suite. Devices are handed
//! in fully-formed by the test author (no sysfs scanning, no
//! classification heuristics) so scenario tests control every flag
//! directly — mirroring the mock-drive fixtures used elsewhere in this
//! codebase's test harness.

use super::{DeviceBackend, ExclusiveAccess, RawHandle, SanitizeProgress};
use crate::error::{EngineError, EngineResult};
use crate::model::{Device, SanitizeAction};
use std::sync::{Arc, Mutex};

/// Backing store for one fake device: a plain byte buffer the pattern
/// writer writes into, inspectable by tests after the operation ends.
pub struct FakeDiskState {
    pub buffer: Vec<u8>,
    pub hardware_sanitize_issued: bool,
}

pub struct FakeBackend {
    devices: Vec<Device>,
    disks: Mutex<std::collections::HashMap<String, Arc<Mutex<FakeDiskState>>>>,
}

impl FakeBackend {
    pub fn new(devices: Vec<Device>) -> Self {
        let mut disks = std::collections::HashMap::new();
        for d in &devices {
            disks.insert(
                d.path.clone(),
                Arc::new(Mutex::new(FakeDiskState {
                    buffer: vec![0xAA; d.size_bytes as usize],
                    hardware_sanitize_issued: false,
                })),
            );
        }
        Self {
            devices,
            disks: Mutex::new(disks),
        }
    }

    pub fn disk_state(&self, path: &str) -> Arc<Mutex<FakeDiskState>> {
        self.disks.lock().unwrap().get(path).cloned().expect("unknown fake device")
    }
}

struct FakeRawHandle {
    state: Arc<Mutex<FakeDiskState>>,
    size_bytes: u64,
    sector_size: u32,
}

impl RawHandle for FakeRawHandle {
    fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> std::io::Result<()> {
        let mut state = self.state.lock().unwrap();
        let start = offset as usize;
        let end = (start + buf.len()).min(state.buffer.len());
        if start < state.buffer.len() {
            state.buffer[start..end].copy_from_slice(&buf[..end - start]);
        }
        Ok(())
    }

    fn sync(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl DeviceBackend for FakeBackend {
    fn enumerate(&self) -> EngineResult<Vec<Device>> {
        Ok(self.devices.iter().filter(|d| !d.is_system).cloned().collect())
    }

    fn acquire_exclusive(&self, device: &Device) -> EngineResult<ExclusiveAccess> {
        let state = self.disk_state(&device.path);
        Ok(ExclusiveAccess {
            handle: Box::new(FakeRawHandle {
                state,
                size_bytes: device.size_bytes,
                sector_size: device.sector_size,
            }),
            dismounted_volumes: Vec::new(),
            share_degraded: false,
        })
    }

    fn issue_ata_secure_erase(&self, device: &Device, _enhanced: bool) -> EngineResult<()> {
        if device.frozen {
            return Err(EngineError::DriveFrozen(device.path.clone()));
        }
        let state = self.disk_state(&device.path);
        let mut state = state.lock().unwrap();
        state.hardware_sanitize_issued = true;
        state.buffer.fill(0x00);
        Ok(())
    }

    fn poll_ata_secure_erase(&self, _device: &Device) -> EngineResult<SanitizeProgress> {
        Ok(SanitizeProgress { percent: 100.0, done: true })
    }

    fn issue_nvme_format(&self, device: &Device, _lba_format: u8) -> EngineResult<()> {
        let state = self.disk_state(&device.path);
        let mut state = state.lock().unwrap();
        state.hardware_sanitize_issued = true;
        state.buffer.fill(0x00);
        Ok(())
    }

    fn poll_nvme_format(&self, _device: &Device) -> EngineResult<SanitizeProgress> {
        Ok(SanitizeProgress { percent: 100.0, done: true })
    }

    fn issue_nvme_sanitize(&self, device: &Device, _action: SanitizeAction) -> EngineResult<()> {
        let state = self.disk_state(&device.path);
        let mut state = state.lock().unwrap();
        state.hardware_sanitize_issued = true;
        state.buffer.fill(0x00);
        Ok(())
    }

    fn poll_nvme_sanitize(&self, _device: &Device) -> EngineResult<SanitizeProgress> {
        Ok(SanitizeProgress { percent: 100.0, done: true })
    }
}
