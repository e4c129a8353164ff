//! Hardware Sanitize Dispatcher (C4): issues vendor sanitize commands and
//! polls them to completion. Never falls back to software overwrite
//! silently (§4.4, §7, §9) — a failed hardware command is a terminal
//! failure the caller must explicitly recover from.

use crate::device::DeviceBackend;
use crate::error::{EngineError, EngineResult};
use crate::model::{Device, Phase, ProgressEvent, SanitizeAction, WipeMethod};
use crate::progress::{CancellationToken, ProgressSink};
use log::info;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const ATA_ESTIMATE_MULTIPLIER: f64 = 1.5;
const ATA_TIMEOUT_CAP: Duration = Duration::from_secs(6 * 3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchState {
    Idle,
    Issuing,
    Polling,
    Completed,
    Failed,
}

pub struct HardwareSanitizeDispatcher<'a> {
    backend: &'a dyn DeviceBackend,
}

impl<'a> HardwareSanitizeDispatcher<'a> {
    pub fn new(backend: &'a dyn DeviceBackend) -> Self {
        Self { backend }
    }

    /// Runs the `Idle → Issuing → Polling → Completed|Failed` state
    /// machine for one hardware method. Refuses up front on frozen or
    /// system devices without issuing anything.
    pub fn dispatch(
        &self,
        device: &Device,
        method: &WipeMethod,
        cancel: &CancellationToken,
        sink: &ProgressSink,
    ) -> EngineResult<()> {
        let mut state = DispatchState::Idle;
        let ata_estimate = Duration::from_secs(2 * 3600); // drive-reported estimate unavailable over hdparm text parse; conservative default

        if device.is_system {
            return Err(EngineError::AccessDenied {
                device: device.path.clone(),
                reason: "refusing hardware sanitize on system device".to_string(),
            });
        }
        if device.frozen {
            return Err(EngineError::DriveFrozen(device.path.clone()));
        }

        state = DispatchState::Issuing;
        sink.emit(ProgressEvent {
            pass_index: 1,
            pass_total: 1,
            bytes_done: 0,
            bytes_total: device.size_bytes,
            phase: Phase::Preparing,
            message: format!("issuing {}", method.canonical_name()),
        });

        let issue_result = match method {
            WipeMethod::AtaSecureErase { enhanced } => {
                self.backend.issue_ata_secure_erase(device, *enhanced)
            }
            WipeMethod::NvmeFormat { lba_format } => {
                self.backend.issue_nvme_format(device, *lba_format)
            }
            WipeMethod::NvmeSanitize { action } => self.backend.issue_nvme_sanitize(device, *action),
            _ => unreachable!("dispatch called with a software method"),
        };

        if let Err(e) = issue_result {
            state = DispatchState::Failed;
            info!("hardware dispatch failed in state {state:?}: {e}");
            return Err(EngineError::HardwareSanitizeFailed(e.to_string()));
        }

        state = DispatchState::Polling;
        let timeout = match method {
            WipeMethod::AtaSecureErase { .. } => {
                Duration::from_secs_f64(ata_estimate.as_secs_f64() * ATA_ESTIMATE_MULTIPLIER)
                    .min(ATA_TIMEOUT_CAP)
            }
            _ => Duration::from_secs(3600),
        };
        let deadline = Instant::now() + timeout;

        loop {
            if cancel.is_cancelled() {
                // in-flight hardware commands cannot be aborted mid-write;
                // the loop keeps polling to a terminal state regardless.
            }

            let progress = match method {
                WipeMethod::AtaSecureErase { .. } => self.backend.poll_ata_secure_erase(device),
                WipeMethod::NvmeFormat { .. } => self.backend.poll_nvme_format(device),
                WipeMethod::NvmeSanitize { .. } => self.backend.poll_nvme_sanitize(device),
                _ => unreachable!(),
            };

            match progress {
                Ok(p) => {
                    sink.emit(ProgressEvent {
                        pass_index: 1,
                        pass_total: 1,
                        bytes_done: ((p.percent / 100.0) * device.size_bytes as f64) as u64,
                        bytes_total: device.size_bytes,
                        phase: Phase::Writing,
                        message: format!("{:.1}% complete", p.percent),
                    });
                    if p.done {
                        state = DispatchState::Completed;
                        return Ok(());
                    }
                }
                Err(e) => {
                    state = DispatchState::Failed;
                    info!("polling failed in state {state:?}: {e}");
                    return Err(EngineError::HardwareSanitizeFailed(e.to_string()));
                }
            }

            if Instant::now() >= deadline {
                state = DispatchState::Failed;
                return Err(EngineError::HardwareSanitizeFailed(format!(
                    "{} timed out after {:?} in state {state:?}",
                    method.canonical_name(),
                    timeout
                )));
            }

            thread::sleep(POLL_INTERVAL);
        }
    }
}
