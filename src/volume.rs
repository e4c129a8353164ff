//! Volume Controller (C2): dismounts logical volumes backed by a chosen
//! device and hands back an exclusive, move-only [`WipeHandle`].

use crate::device::{DeviceBackend, RawHandle};
use crate::error::EngineResult;
use crate::model::Device;
use log::info;
use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

static HELD_DEVICES: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

fn held_devices() -> &'static Mutex<HashSet<String>> {
    HELD_DEVICES.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Move-only token representing exclusive ownership of a raw device.
/// Dropping it unlocks/closes every resource it holds; destruction is
/// infallible and idempotent (§9 "Ownership of raw handles").
pub struct WipeHandle {
    device_path: String,
    pub(crate) raw: Box<dyn RawHandle>,
    pub(crate) dismounted_volumes: Vec<String>,
    /// Set when the backend could not obtain exclusive write access and
    /// fell back to shared-write access (§4.2). Carried through to the
    /// terminal `WipeResult` so it isn't just a log line.
    pub(crate) share_degraded: bool,
}

impl WipeHandle {
    pub fn size_bytes(&self) -> u64 {
        self.raw.size_bytes()
    }

    pub fn sector_size(&self) -> u32 {
        self.raw.sector_size()
    }

    pub fn share_degraded(&self) -> bool {
        self.share_degraded
    }
}

impl Drop for WipeHandle {
    fn drop(&mut self) {
        held_devices().lock().unwrap().remove(&self.device_path);
        info!("released exclusive handle on {}", self.device_path);
    }
}

pub struct VolumeController<'a> {
    backend: &'a dyn DeviceBackend,
}

impl<'a> VolumeController<'a> {
    pub fn new(backend: &'a dyn DeviceBackend) -> Self {
        Self { backend }
    }

    /// Dismounts volumes backed by `device` and acquires an exclusive raw
    /// handle. Enforces the process-wide invariant that at most one
    /// `WipeHandle` exists per device at a time.
    pub fn acquire(&self, device: &Device) -> EngineResult<WipeHandle> {
        {
            let mut held = held_devices().lock().unwrap();
            if held.contains(&device.path) {
                return Err(crate::error::EngineError::DeviceBusy(device.path.clone()));
            }
            held.insert(device.path.clone());
        }

        match self.backend.acquire_exclusive(device) {
            Ok(access) => {
                for vol in &access.dismounted_volumes {
                    info!("dismounted volume {vol} backed by {}", device.path);
                }
                Ok(WipeHandle {
                    device_path: device.path.clone(),
                    raw: access.handle,
                    dismounted_volumes: access.dismounted_volumes,
                    share_degraded: access.share_degraded,
                })
            }
            Err(e) => {
                held_devices().lock().unwrap().remove(&device.path);
                Err(e)
            }
        }
    }
}
