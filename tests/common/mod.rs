use erastat::model::{Device, DeviceClass};

/// Builds a fully-formed fake device so each scenario test only has to
/// override the handful of fields it cares about.
pub fn fake_device(class: DeviceClass, size_bytes: u64) -> Device {
    Device {
        path: "/dev/fake0".into(),
        name: "fake0".into(),
        model: "Fake Model 9000".into(),
        serial: "FAKE-SERIAL-0001".into(),
        size_bytes,
        sector_size: 4096,
        class,
        supports_ata_secure_erase: false,
        supports_ata_enhanced: false,
        supports_nvme_format: false,
        supports_nvme_sanitize: false,
        frozen: false,
        is_system: false,
    }
}
