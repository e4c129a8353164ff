mod common;

use common::fake_device;
use erastat::config::EngineConfig;
use erastat::device::fake::FakeBackend;
use erastat::model::{DeviceClass, TerminalStatus, WipeMethod};
use erastat::progress::{progress_channel, CancellationToken};
use erastat::worker::Engine;
use std::sync::Arc;
use std::thread;

#[test]
fn progress_events_are_monotonic_within_one_operation() {
    let tmp = tempfile::tempdir().unwrap();
    let config = EngineConfig::for_test(tmp.path());
    let device = fake_device(DeviceClass::HDD, 4 * 1024 * 1024);

    let backend = FakeBackend::new(vec![device.clone()]);
    let engine = Arc::new(Engine::new(config, Box::new(backend)));

    let (sink, rx) = progress_channel();
    let engine_t = Arc::clone(&engine);
    let device_t = device.clone();
    let handle = thread::spawn(move || {
        engine_t.begin_wipe_with_seed(device_t, WipeMethod::DoD3, CancellationToken::new(), sink, 7)
    });

    let mut last = (0u32, 0u64);
    let mut saw_any = false;
    for event in rx {
        saw_any = true;
        let current = (event.pass_index, event.bytes_done);
        assert!(
            current >= last,
            "progress went backwards: {last:?} -> {current:?}"
        );
        last = current;
    }
    assert!(saw_any, "expected at least one progress event");

    let result = handle.join().unwrap();
    assert_eq!(result.terminal_status, TerminalStatus::Completed);
    assert_eq!(result.passes_completed, 3);
}
