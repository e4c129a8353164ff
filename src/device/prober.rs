//! Capability Prober (C1): platform-independent classification and
//! method-recommendation logic, layered on top of a `DeviceBackend`.
//! Tested exclusively against [`super::fake::FakeBackend`] (§9).

use super::DeviceBackend;
use crate::error::EngineResult;
use crate::model::{Device, DeviceClass, SanitizeAction, WipeMethod};

pub struct CapabilityProber<'a> {
    backend: &'a dyn DeviceBackend,
}

impl<'a> CapabilityProber<'a> {
    pub fn new(backend: &'a dyn DeviceBackend) -> Self {
        Self { backend }
    }

    /// Enumerates every non-boot physical device (`EnumerationFailed` on
    /// OS failure). The boot device is filtered by the backend itself;
    /// this is a defensive second check.
    pub fn enumerate(&self) -> EngineResult<Vec<Device>> {
        let devices = self.backend.enumerate()?;
        Ok(devices.into_iter().filter(|d| !d.is_system).collect())
    }

    /// Deterministic recommendation table (§4.1).
    pub fn recommend_method(&self, device: &Device) -> (WipeMethod, String) {
        if device.is_system {
            return (
                WipeMethod::Quick,
                "system drive — hardware erase disabled".to_string(),
            );
        }

        match device.class {
            DeviceClass::NvmeSsd if device.supports_nvme_sanitize => (
                WipeMethod::NvmeSanitize {
                    action: SanitizeAction::Crypto,
                },
                "NVMe sanitize (crypto erase) available".to_string(),
            ),
            DeviceClass::NvmeSsd if device.supports_nvme_format => (
                WipeMethod::NvmeFormat { lba_format: 0 },
                "NVMe format NVM available".to_string(),
            ),
            DeviceClass::SataSsd if device.frozen => (
                WipeMethod::Quick,
                "frozen — power-cycle required".to_string(),
            ),
            DeviceClass::SataSsd if device.supports_ata_enhanced => (
                WipeMethod::AtaSecureErase { enhanced: true },
                "ATA enhanced secure erase available".to_string(),
            ),
            DeviceClass::SataSsd if device.supports_ata_secure_erase => (
                WipeMethod::AtaSecureErase { enhanced: false },
                "ATA secure erase available".to_string(),
            ),
            DeviceClass::HDD if device.supports_ata_secure_erase && !device.frozen => (
                WipeMethod::AtaSecureErase { enhanced: false },
                "ATA secure erase available".to_string(),
            ),
            DeviceClass::HDD => (
                WipeMethod::DoD3,
                "no hardware erase available — DoD 3-pass overwrite".to_string(),
            ),
            DeviceClass::RemovableFlash | DeviceClass::Unknown | DeviceClass::NvmeSsd | DeviceClass::SataSsd => (
                WipeMethod::Quick,
                "removable/unclassified media — single-pass overwrite".to_string(),
            ),
        }
    }

    /// Universal software set intersected with the device's hardware
    /// capabilities, omitting hardware methods entirely when frozen.
    pub fn supported_methods(&self, device: &Device) -> Vec<WipeMethod> {
        let mut methods = vec![
            WipeMethod::Quick,
            WipeMethod::DoD3,
            WipeMethod::DoD7,
            WipeMethod::Gutmann35,
        ];

        if device.frozen {
            return methods;
        }

        if device.supports_ata_secure_erase {
            methods.push(WipeMethod::AtaSecureErase { enhanced: false });
        }
        if device.supports_ata_enhanced {
            methods.push(WipeMethod::AtaSecureErase { enhanced: true });
        }
        if device.supports_nvme_format {
            methods.push(WipeMethod::NvmeFormat { lba_format: 0 });
        }
        if device.supports_nvme_sanitize {
            methods.push(WipeMethod::NvmeSanitize { action: SanitizeAction::Crypto });
            methods.push(WipeMethod::NvmeSanitize { action: SanitizeAction::BlockErase });
            methods.push(WipeMethod::NvmeSanitize { action: SanitizeAction::Overwrite });
        }

        methods
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::fake::FakeBackend;

    fn device(class: DeviceClass) -> Device {
        Device {
            path: "/dev/fake0".into(),
            name: "fake0".into(),
            model: "Fake".into(),
            serial: "SN1".into(),
            size_bytes: 8 * 1024 * 1024,
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

    #[test]
    fn never_recommends_hardware_on_system_drive() {
        let mut d = device(DeviceClass::HDD);
        d.is_system = true;
        d.supports_ata_secure_erase = true;
        let backend = FakeBackend::new(vec![]);
        let prober = CapabilityProber::new(&backend);
        let (method, rationale) = prober.recommend_method(&d);
        assert_eq!(method, WipeMethod::Quick);
        assert!(rationale.contains("system drive"));
    }

    #[test]
    fn frozen_sata_ssd_recommends_quick() {
        let mut d = device(DeviceClass::SataSsd);
        d.supports_ata_secure_erase = true;
        d.frozen = true;
        let backend = FakeBackend::new(vec![]);
        let prober = CapabilityProber::new(&backend);
        let (method, rationale) = prober.recommend_method(&d);
        assert_eq!(method, WipeMethod::Quick);
        assert!(rationale.contains("frozen"));
    }

    #[test]
    fn hdd_without_hardware_support_recommends_dod3() {
        let d = device(DeviceClass::HDD);
        let backend = FakeBackend::new(vec![]);
        let prober = CapabilityProber::new(&backend);
        let (method, _) = prober.recommend_method(&d);
        assert_eq!(method, WipeMethod::DoD3);
    }

    #[test]
    fn enumerate_never_returns_boot_device() {
        let mut system = device(DeviceClass::HDD);
        system.is_system = true;
        system.path = "/dev/boot0".into();
        let data = device(DeviceClass::HDD);
        let backend = FakeBackend::new(vec![system, data]);
        let prober = CapabilityProber::new(&backend);
        let devices = prober.enumerate().unwrap();
        assert_eq!(devices.len(), 1);
        assert!(devices.iter().all(|d| !d.is_system));
    }

    #[test]
    fn frozen_device_excludes_hardware_methods() {
        let mut d = device(DeviceClass::SataSsd);
        d.supports_ata_secure_erase = true;
        d.frozen = true;
        let backend = FakeBackend::new(vec![]);
        let prober = CapabilityProber::new(&backend);
        let methods = prober.supported_methods(&d);
        assert!(!methods.iter().any(|m| m.is_hardware()));
    }
}
