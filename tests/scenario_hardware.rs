mod common;

use common::fake_device;
use erastat::config::EngineConfig;
use erastat::device::fake::FakeBackend;
use erastat::model::{DeviceClass, TerminalStatus, WipeMethod};
use erastat::progress::{progress_channel, CancellationToken};
use erastat::worker::Engine;

#[test]
fn s4_frozen_ssd_refuses_hardware_sanitize_without_issuing_it() {
    let tmp = tempfile::tempdir().unwrap();
    let config = EngineConfig::for_test(tmp.path());
    let mut device = fake_device(DeviceClass::SataSsd, 8 * 1024 * 1024);
    device.supports_ata_secure_erase = true;
    device.frozen = true;

    let backend = FakeBackend::new(vec![device.clone()]);
    let disk = backend.disk_state(&device.path);
    let engine = Engine::new(config, Box::new(backend));

    let (sink, _rx) = progress_channel();
    let result = engine.begin_wipe(
        device,
        WipeMethod::AtaSecureErase { enhanced: false },
        CancellationToken::new(),
        sink,
    );

    assert_eq!(result.terminal_status, TerminalStatus::Failed);
    let failure = result.failure_kind.expect("frozen dispatch must report a failure reason");
    assert!(failure.to_lowercase().contains("frozen"), "unexpected failure reason: {failure}");

    let state = disk.lock().unwrap();
    assert!(state.buffer.iter().all(|&b| b == 0xAA), "no bytes should have been touched");
    assert!(!state.hardware_sanitize_issued, "the vendor command must never be issued on a frozen drive");
}
