//! The engine facade: the five process-local worker operations (§6).
//! `begin_wipe` is meant to run on a dedicated worker thread, separate
//! from any UI or driver thread (§5); [`Engine::spawn_wipe`] does that
//! spawning for callers who don't want to manage the thread themselves.

use crate::config::EngineConfig;
use crate::crypto::certificate::{AttestationBuilder, SignedCertificate};
use crate::device::prober::CapabilityProber;
use crate::device::DeviceBackend;
use crate::error::EngineResult;
use crate::hardware::HardwareSanitizeDispatcher;
use crate::model::{
    Device, OperatorIdentity, Phase, ProgressEvent, TerminalStatus, WipeMethod, WipeResult,
};
use crate::pattern::PatternWriter;
use crate::progress::{CancellationToken, ProgressSink};
use crate::volume::VolumeController;
use chrono::Utc;
use log::{error, info};
use rand::RngCore;
use std::thread::JoinHandle;

pub struct Engine {
    config: EngineConfig,
    backend: Box<dyn DeviceBackend>,
}

impl Engine {
    pub fn new(config: EngineConfig, backend: Box<dyn DeviceBackend>) -> Self {
        Self { config, backend }
    }

    pub fn enumerate_devices(&self) -> EngineResult<Vec<Device>> {
        CapabilityProber::new(self.backend.as_ref()).enumerate()
    }

    pub fn recommend_method(&self, device: &Device) -> (WipeMethod, String) {
        CapabilityProber::new(self.backend.as_ref()).recommend_method(device)
    }

    pub fn supported_methods(&self, device: &Device) -> Vec<WipeMethod> {
        CapabilityProber::new(self.backend.as_ref()).supported_methods(device)
    }

    /// Blocking worker operation (§6). Never returns an `Err`: every
    /// failure mode is captured in the returned `WipeResult`'s
    /// `terminal_status` / `failure_kind` (§7).
    pub fn begin_wipe(
        &self,
        device: Device,
        method: WipeMethod,
        cancel: CancellationToken,
        sink: ProgressSink,
    ) -> WipeResult {
        let seed = rand::thread_rng().next_u64();
        self.begin_wipe_with_seed(device, method, cancel, sink, seed)
    }

    /// Same as `begin_wipe`, but with an explicit pass-3 seed — used by
    /// tests to reproduce `RandomStream(seed)` passes deterministically
    /// (§4.3, only observable when `EngineConfig::test_mode` is set).
    pub fn begin_wipe_with_seed(
        &self,
        device: Device,
        method: WipeMethod,
        cancel: CancellationToken,
        sink: ProgressSink,
        seed: u64,
    ) -> WipeResult {
        let start = Utc::now();

        if cancel.is_cancelled() {
            info!("cancellation observed before begin_wipe acquired any resource");
            return WipeResult {
                device_snapshot: device,
                method,
                plan_executed: None,
                start,
                end: Utc::now(),
                passes_completed: 0,
                terminal_status: TerminalStatus::Cancelled,
                failure_kind: None,
                completion_hash: None,
                share_degraded: false,
            };
        }

        sink.emit(ProgressEvent {
            pass_index: 0,
            pass_total: 0,
            bytes_done: 0,
            bytes_total: device.size_bytes,
            phase: Phase::Preparing,
            message: "acquiring exclusive device handle".to_string(),
        });

        if method.is_hardware() {
            return self.run_hardware(device, method, &cancel, &sink, start);
        }
        self.run_software(device, method, &cancel, &sink, start, seed)
    }

    fn run_hardware(
        &self,
        device: Device,
        method: WipeMethod,
        cancel: &CancellationToken,
        sink: &ProgressSink,
        start: chrono::DateTime<Utc>,
    ) -> WipeResult {
        let dispatcher = HardwareSanitizeDispatcher::new(self.backend.as_ref());
        match dispatcher.dispatch(&device, &method, cancel, sink) {
            Ok(()) => {
                let end = Utc::now();
                let end_iso = end.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
                let completion_hash = AttestationBuilder::completion_hash(&device, &method, &end_iso);
                sink.emit(ProgressEvent {
                    pass_index: 1,
                    pass_total: 1,
                    bytes_done: device.size_bytes,
                    bytes_total: device.size_bytes,
                    phase: Phase::Finalizing,
                    message: "hardware sanitize complete".to_string(),
                });
                WipeResult {
                    device_snapshot: device,
                    method,
                    plan_executed: None,
                    start,
                    end,
                    passes_completed: 1,
                    terminal_status: TerminalStatus::Completed,
                    failure_kind: None,
                    completion_hash: Some(completion_hash),
                    share_degraded: false,
                }
            }
            Err(e) => {
                error!("hardware sanitize failed for {}: {e}", device.path);
                WipeResult {
                    device_snapshot: device,
                    method,
                    plan_executed: None,
                    start,
                    end: Utc::now(),
                    passes_completed: 0,
                    terminal_status: TerminalStatus::Failed,
                    failure_kind: Some(e.to_string()),
                    completion_hash: None,
                    share_degraded: false,
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run_software(
        &self,
        device: Device,
        method: WipeMethod,
        cancel: &CancellationToken,
        sink: &ProgressSink,
        start: chrono::DateTime<Utc>,
        seed: u64,
    ) -> WipeResult {
        let plan = method
            .pass_plan(seed)
            .expect("software method must produce a pass plan");
        let pass_total = plan.len() as u32;
        let bytes_total_all_passes = device.size_bytes * pass_total as u64;

        let volume_controller = VolumeController::new(self.backend.as_ref());
        let mut handle = match volume_controller.acquire(&device) {
            Ok(h) => h,
            Err(e) => {
                error!("failed to acquire {}: {e}", device.path);
                return WipeResult {
                    device_snapshot: device,
                    method,
                    plan_executed: Some(plan),
                    start,
                    end: Utc::now(),
                    passes_completed: 0,
                    terminal_status: TerminalStatus::Failed,
                    failure_kind: Some(e.to_string()),
                    completion_hash: None,
                    share_degraded: false,
                };
            }
        };

        let share_degraded = handle.share_degraded();
        let writer = PatternWriter::new(self.config.buffer_size, self.config.test_mode);
        let mut passes_completed = 0u32;
        let mut failure: Option<String> = None;
        let mut cancelled = false;

        for (idx, pass) in plan.0.iter().enumerate() {
            let bytes_before = device.size_bytes * idx as u64;
            match writer.write_pass(
                &mut handle,
                pass,
                (idx + 1) as u32,
                pass_total,
                cancel,
                sink,
                bytes_before,
                bytes_total_all_passes,
            ) {
                Ok(true) => passes_completed += 1,
                Ok(false) => {
                    cancelled = true;
                    break;
                }
                Err(e) => {
                    failure = Some(e.to_string());
                    break;
                }
            }
        }

        drop(handle);

        let end = Utc::now();
        let terminal_status = if cancelled {
            TerminalStatus::Cancelled
        } else if failure.is_some() {
            TerminalStatus::Failed
        } else {
            TerminalStatus::Completed
        };

        let completion_hash = if terminal_status == TerminalStatus::Completed {
            let end_iso = end.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
            Some(AttestationBuilder::completion_hash(&device, &method, &end_iso))
        } else {
            None
        };

        if terminal_status == TerminalStatus::Completed {
            sink.emit(ProgressEvent {
                pass_index: pass_total,
                pass_total,
                bytes_done: bytes_total_all_passes,
                bytes_total: bytes_total_all_passes,
                phase: Phase::Finalizing,
                message: "wipe complete".to_string(),
            });
        }

        WipeResult {
            device_snapshot: device,
            method,
            plan_executed: Some(plan),
            start,
            end,
            passes_completed,
            terminal_status,
            failure_kind: failure,
            completion_hash,
            share_degraded,
        }
    }

    pub fn build_certificate(
        &self,
        result: &WipeResult,
        operator: OperatorIdentity,
    ) -> EngineResult<SignedCertificate> {
        AttestationBuilder::new(&self.config).build(result, operator)
    }

    pub fn verify_certificate(signed: &SignedCertificate) -> EngineResult<()> {
        AttestationBuilder::verify(signed)
    }
}

/// Spawns `begin_wipe` on a dedicated worker thread, matching §5's
/// scheduling model. The engine must be `'static` (e.g. behind an `Arc`)
/// to cross the thread boundary.
pub fn spawn_wipe(
    engine: std::sync::Arc<Engine>,
    device: Device,
    method: WipeMethod,
    cancel: CancellationToken,
    sink: ProgressSink,
) -> JoinHandle<WipeResult> {
    std::thread::Builder::new()
        .name("erastat-worker".to_string())
        .spawn(move || engine.begin_wipe(device, method, cancel, sink))
        .expect("failed to spawn worker thread")
}
