mod common;

use common::fake_device;
use erastat::config::EngineConfig;
use erastat::crypto::certificate::verify_json;
use erastat::crypto::AttestationBuilder;
use erastat::device::fake::FakeBackend;
use erastat::error::EngineError;
use erastat::model::{DeviceClass, OperatorIdentity, TerminalStatus, WipeMethod};
use erastat::progress::{progress_channel, CancellationToken};
use erastat::worker::Engine;

#[test]
fn s5_tampering_with_the_certificate_body_invalidates_the_signature() {
    let tmp = tempfile::tempdir().unwrap();
    let config = EngineConfig::for_test(tmp.path());
    let device = fake_device(DeviceClass::HDD, 1024 * 1024);

    let backend = FakeBackend::new(vec![device.clone()]);
    let engine = Engine::new(config, Box::new(backend));

    let (sink, _rx) = progress_channel();
    let result = engine.begin_wipe(device, WipeMethod::Quick, CancellationToken::new(), sink);
    assert_eq!(result.terminal_status, TerminalStatus::Completed);

    let operator = OperatorIdentity {
        user_id: "tester".into(),
        email: "tester@example.com".into(),
    };
    let signed = engine.build_certificate(&result, operator).unwrap();

    Engine::verify_certificate(&signed).expect("a freshly issued certificate must verify");

    let mut tampered = signed.to_json();
    tampered["passes_completed"] = serde_json::json!(9999);
    let err = verify_json(&tampered).unwrap_err();
    assert!(matches!(err, EngineError::SignatureInvalid));
}

#[test]
fn s6_cert_id_is_a_pure_function_of_its_inputs() {
    let a = AttestationBuilder::cert_id("DEV-1", "2024-01-01T00:00:00Z");
    let b = AttestationBuilder::cert_id("DEV-1", "2024-01-01T00:00:00Z");
    let c = AttestationBuilder::cert_id("DEV-2", "2024-01-01T00:00:00Z");

    assert_eq!(a, b, "same inputs must yield the same cert_id");
    assert_ne!(a, c, "different device ids must yield different cert_ids");
    assert!(a.starts_with("CERT-"));
    assert_eq!(a.len(), "CERT-".len() + 16);
    assert_eq!(a, a.to_uppercase(), "the hex suffix is uppercased");

    // Pinned exact value (§8 S6): SHA256("DEV-1:2024-01-01T00:00:00Z")[:16]
    // uppercased, computed by hand and fixed here so a wrong digest-input
    // ordering or an off-by-one in the slice would fail this test.
    assert_eq!(a, "CERT-72126B6121D70ADE");
}
