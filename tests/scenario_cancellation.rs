mod common;

use common::fake_device;
use erastat::config::EngineConfig;
use erastat::device::fake::FakeBackend;
use erastat::error::EngineError;
use erastat::model::{DeviceClass, OperatorIdentity, TerminalStatus, WipeMethod};
use erastat::progress::{progress_channel, CancellationToken};
use erastat::worker::Engine;
use std::sync::Arc;
use std::thread;

#[test]
fn s3_cancellation_mid_pass_yields_cancelled_with_zero_passes_completed() {
    let tmp = tempfile::tempdir().unwrap();
    let config = EngineConfig::for_test(tmp.path());
    let device = fake_device(DeviceClass::HDD, 128 * 1024 * 1024);

    let backend = FakeBackend::new(vec![device.clone()]);
    let disk = backend.disk_state(&device.path);
    let engine = Arc::new(Engine::new(config, Box::new(backend)));

    let cancel = CancellationToken::new();
    let (sink, rx) = progress_channel();

    let engine_t = Arc::clone(&engine);
    let device_t = device.clone();
    let cancel_t = cancel.clone();
    let handle = thread::spawn(move || {
        engine_t.begin_wipe_with_seed(device_t, WipeMethod::DoD3, cancel_t, sink, 0xDEADBEEF)
    });

    let halfway = 64 * 1024 * 1024u64;
    for event in rx {
        if event.bytes_done >= halfway {
            cancel.cancel();
        }
    }

    let result = handle.join().unwrap();
    assert_eq!(result.terminal_status, TerminalStatus::Cancelled);
    assert_eq!(result.passes_completed, 0);
    assert!(result.completion_hash.is_none());

    // the buffer was dirtied by the partial first pass, but that's
    // expected — invariant 7 only constrains cancellation *before*
    // begin_wipe is entered, covered separately below.
    drop(disk);
}

#[test]
fn cancellation_raised_before_begin_wipe_writes_nothing_and_refuses_certification() {
    let tmp = tempfile::tempdir().unwrap();
    let config = EngineConfig::for_test(tmp.path());
    let device = fake_device(DeviceClass::HDD, 4 * 1024 * 1024);

    let backend = FakeBackend::new(vec![device.clone()]);
    let disk = backend.disk_state(&device.path);
    let engine = Engine::new(config, Box::new(backend));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let (sink, _rx) = progress_channel();
    let result = engine.begin_wipe(device, WipeMethod::DoD3, cancel, sink);

    assert_eq!(result.terminal_status, TerminalStatus::Cancelled);
    assert_eq!(result.passes_completed, 0);

    let state = disk.lock().unwrap();
    assert!(state.buffer.iter().all(|&b| b == 0xAA), "no bytes should have been written");
    drop(state);

    let operator = OperatorIdentity {
        user_id: "tester".into(),
        email: "tester@example.com".into(),
    };
    let err = engine.build_certificate(&result, operator).unwrap_err();
    assert!(matches!(err, EngineError::BuildRefusedNonTerminalSuccess));
}
