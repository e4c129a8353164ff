//! Linux `DeviceBackend`: enumerates `/sys/block`, classifies via
//! rotational/transport/media attributes, and shells out to `hdparm`,
//! `nvme` and `blockdev` for identify/sanitize commands — the same
//! external-tool-driven approach used throughout this codebase rather
//! than raw ioctls.

use super::{DeviceBackend, ExclusiveAccess, RawHandle, SanitizeProgress};
use crate::error::{EngineError, EngineResult};
use crate::model::{Device, DeviceClass, SanitizeAction};
use log::{info, warn};
use std::fs;
use std::os::unix::fs::OpenOptionsExt;
use std::process::Command;

const O_DIRECT: i32 = 0o40000;

pub struct LinuxBackend;

impl LinuxBackend {
    pub fn new() -> Self {
        Self
    }

    /// Resolves the block device hosting the OS root, per §4.1 / §10.1's
    /// `/proc/mounts` + `/proc/cmdline` grounding.
    ///
    /// `/proc/mounts`'s root entry is frequently an alias — `/dev/root`,
    /// `overlay`, `rootfs` — on systems that boot through an initramfs or
    /// an overlayfs live image, rather than the real device node. Those
    /// aliases don't exist under `/sys/class/block`, so falling back to
    /// `/proc/cmdline`'s `root=` parameter (a real device path, or a
    /// `UUID=`/`PARTUUID=`/`LABEL=` reference resolvable via
    /// `/dev/disk/by-*`) is required — otherwise the boot device silently
    /// fails to resolve and `is_system` stays false for every device
    /// (§3, §8 invariant 1).
    fn boot_device_name() -> Option<String> {
        let mounts = fs::read_to_string("/proc/mounts").ok()?;
        let root_source = mounts
            .lines()
            .find(|l| l.split_whitespace().nth(1) == Some("/"))
            .and_then(|l| l.split_whitespace().next())
            .map(String::from);

        if let Some(source) = root_source.as_deref() {
            if let Some(name) = Self::resolve_root_device_node(source) {
                return Some(name);
            }
        }

        // `/proc/mounts` gave an alias (`/dev/root`, `overlay`, `rootfs`,
        // ...) that doesn't resolve to a real device node — fall back to
        // the kernel command line's `root=` parameter.
        let cmdline = fs::read_to_string("/proc/cmdline").ok()?;
        let root_param = cmdline
            .split_whitespace()
            .find_map(|tok| tok.strip_prefix("root="))?;

        let resolved = if let Some(uuid) = root_param.strip_prefix("UUID=") {
            fs::canonicalize(format!("/dev/disk/by-uuid/{uuid}")).ok()
        } else if let Some(uuid) = root_param.strip_prefix("PARTUUID=") {
            fs::canonicalize(format!("/dev/disk/by-partuuid/{uuid}")).ok()
        } else if let Some(label) = root_param.strip_prefix("LABEL=") {
            fs::canonicalize(format!("/dev/disk/by-label/{label}")).ok()
        } else {
            Some(std::path::PathBuf::from(root_param))
        }?;

        Self::resolve_root_device_node(&resolved.to_string_lossy())
    }

    /// Given a device path like `/dev/sda1` or `/dev/nvme0n1p2`, returns
    /// the parent whole-disk name (`sda`, `nvme0n1`) as it appears under
    /// `/sys/block`, or `None` if the path isn't a recognizable device
    /// node (e.g. still an unresolved alias).
    fn resolve_root_device_node(source: &str) -> Option<String> {
        let part_name = source.rsplit('/').next()?;
        let part_path = format!("/sys/class/block/{part_name}");
        if let Ok(real) = fs::canonicalize(&part_path) {
            if let Some(parent) = real.parent().and_then(|p| p.file_name()) {
                return Some(parent.to_string_lossy().into_owned());
            }
        }
        // Not a partition of a block device the kernel knows about
        // (whole-disk root, or still an alias): whole-disk roots resolve
        // by stripping trailing partition digits; aliases like
        // `/dev/root` or `overlay` have none to strip and must be
        // rejected rather than guessed at.
        let stripped = part_name.trim_end_matches(|c: char| c.is_ascii_digit());
        if stripped != part_name && std::path::Path::new(&format!("/sys/block/{stripped}")).exists() {
            return Some(stripped.to_string());
        }
        if std::path::Path::new(&format!("/sys/block/{part_name}")).exists() {
            return Some(part_name.to_string());
        }
        None
    }

    fn read_sys(name: &str, attr: &str) -> Option<String> {
        fs::read_to_string(format!("/sys/block/{name}/{attr}"))
            .ok()
            .map(|s| s.trim().to_string())
    }

    fn classify(name: &str, model: &str, rotational: bool, removable: bool) -> DeviceClass {
        let model_lower = model.to_lowercase();
        if name.starts_with("nvme") {
            DeviceClass::NvmeSsd
        } else if removable {
            DeviceClass::RemovableFlash
        } else if !rotational || model_lower.contains("ssd") {
            DeviceClass::SataSsd
        } else if rotational {
            DeviceClass::HDD
        } else {
            DeviceClass::Unknown
        }
    }

    fn ata_identify(name: &str) -> (bool, bool, bool) {
        let path = format!("/dev/{name}");
        let output = match Command::new("hdparm").args(["-I", &path]).output() {
            Ok(o) => o,
            Err(_) => return (false, false, false),
        };
        let text = String::from_utf8_lossy(&output.stdout);
        let supports_secure_erase = text.contains("Security erase unit");
        let supports_enhanced = text.contains("enhanced erase");
        let frozen = text.contains("frozen") && !text.contains("not\tfrozen");
        (supports_secure_erase, supports_enhanced, frozen)
    }
}

impl Default for LinuxBackend {
    fn default() -> Self {
        Self::new()
    }
}

struct LinuxRawHandle {
    file: fs::File,
    size_bytes: u64,
    sector_size: u32,
}

impl RawHandle for LinuxRawHandle {
    fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> std::io::Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)
    }

    fn sync(&mut self) -> std::io::Result<()> {
        self.file.sync_all()
    }
}

impl DeviceBackend for LinuxBackend {
    fn enumerate(&self) -> EngineResult<Vec<Device>> {
        let boot = Self::boot_device_name();
        let entries = fs::read_dir("/sys/block")
            .map_err(|e| EngineError::EnumerationFailed(e.to_string()))?;

        let mut devices = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("loop") || name.starts_with("dm-") || name.starts_with("zram") {
                continue;
            }
            let is_system = boot.as_deref() == Some(name.as_str());
            if is_system {
                info!("excluding boot device {name} from enumeration");
                continue;
            }

            let sectors: u64 = Self::read_sys(&name, "size")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            let size_bytes = sectors * 512;
            let sector_size: u32 = Self::read_sys(&name, "queue/logical_block_size")
                .and_then(|s| s.parse().ok())
                .unwrap_or(512);
            let rotational = Self::read_sys(&name, "queue/rotational").as_deref() == Some("1");
            let removable = Self::read_sys(&name, "removable").as_deref() == Some("1");
            let model = Self::read_sys(&name, "device/model").unwrap_or_default();
            let serial = Self::read_sys(&name, "device/serial").unwrap_or_default();

            let class = Self::classify(&name, &model, rotational, removable);

            let (supports_ata_secure_erase, supports_ata_enhanced, frozen) =
                match class {
                    DeviceClass::HDD | DeviceClass::SataSsd => Self::ata_identify(&name),
                    _ => (false, false, false),
                };

            let (supports_nvme_format, supports_nvme_sanitize) = match class {
                DeviceClass::NvmeSsd => (true, true),
                _ => (false, false),
            };

            devices.push(Device {
                path: format!("/dev/{name}"),
                name: name.clone(),
                model,
                serial,
                size_bytes,
                sector_size,
                class,
                supports_ata_secure_erase,
                supports_ata_enhanced,
                supports_nvme_format,
                supports_nvme_sanitize,
                frozen,
                is_system: false,
            });
        }
        Ok(devices)
    }

    fn acquire_exclusive(&self, device: &Device) -> EngineResult<ExclusiveAccess> {
        let mut warnings = Vec::new();
        let mounts = fs::read_to_string("/proc/mounts").unwrap_or_default();
        let dismounted: Vec<String> = mounts
            .lines()
            .filter(|l| {
                l.split_whitespace()
                    .next()
                    .map(|src| src.starts_with(&device.path))
                    .unwrap_or(false)
            })
            .filter_map(|l| l.split_whitespace().nth(1).map(String::from))
            .collect();

        for mount_point in &dismounted {
            let status = Command::new("umount").arg(mount_point).status();
            match status {
                Ok(s) if s.success() => info!("dismounted {mount_point}"),
                _ => warnings.push(format!("failed to dismount {mount_point}")),
            }
        }

        let open_result = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(O_DIRECT)
            .open(&device.path);

        let mut share_degraded = false;
        let file = match open_result {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(EngineError::AccessDenied {
                    device: device.path.clone(),
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                share_degraded = true;
                warnings.push(format!("exclusive open failed ({e}), falling back to shared write"));
                fs::OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(&device.path)
                    .map_err(|e| EngineError::DeviceVanished(format!("{}: {e}", device.path)))?
            }
        };

        if !warnings.is_empty() {
            warn!("device {} acquired with degraded sharing: {:?}", device.path, warnings);
        }

        let handle = LinuxRawHandle {
            file,
            size_bytes: device.size_bytes,
            sector_size: device.sector_size,
        };
        Ok(ExclusiveAccess {
            handle: Box::new(handle),
            dismounted_volumes: dismounted,
            share_degraded,
        })
    }

    fn issue_ata_secure_erase(&self, device: &Device, enhanced: bool) -> EngineResult<()> {
        if device.frozen {
            return Err(EngineError::DriveFrozen(device.path.clone()));
        }
        let flag = if enhanced {
            "--security-erase-enhanced"
        } else {
            "--security-erase"
        };
        let status = Command::new("hdparm")
            .args([flag, "NULL", &device.path])
            .status()
            .map_err(|e| EngineError::HardwareSanitizeFailed(e.to_string()))?;
        if !status.success() {
            return Err(EngineError::HardwareSanitizeFailed(format!(
                "hdparm {flag} exited with {status}"
            )));
        }
        Ok(())
    }

    fn poll_ata_secure_erase(&self, device: &Device) -> EngineResult<SanitizeProgress> {
        let output = Command::new("hdparm")
            .args(["-I", &device.path])
            .output()
            .map_err(|e| EngineError::HardwareSanitizeFailed(e.to_string()))?;
        let done = !String::from_utf8_lossy(&output.stdout).contains("not\terased");
        Ok(SanitizeProgress {
            percent: if done { 100.0 } else { 0.0 },
            done,
        })
    }

    fn issue_nvme_format(&self, device: &Device, lba_format: u8) -> EngineResult<()> {
        let status = Command::new("nvme")
            .args([
                "format",
                &device.path,
                "--ses=1",
                &format!("--lbaf={lba_format}"),
            ])
            .status()
            .map_err(|e| EngineError::HardwareSanitizeFailed(e.to_string()))?;
        if !status.success() {
            return Err(EngineError::HardwareSanitizeFailed(format!(
                "nvme format exited with {status}"
            )));
        }
        Ok(())
    }

    fn poll_nvme_format(&self, _device: &Device) -> EngineResult<SanitizeProgress> {
        Ok(SanitizeProgress { percent: 100.0, done: true })
    }

    fn issue_nvme_sanitize(&self, device: &Device, action: SanitizeAction) -> EngineResult<()> {
        let flag = match action {
            SanitizeAction::Crypto => "--sanact=4",
            SanitizeAction::BlockErase => "--sanact=2",
            SanitizeAction::Overwrite => "--sanact=3",
        };
        let status = Command::new("nvme")
            .args(["sanitize", &device.path, flag])
            .status()
            .map_err(|e| EngineError::HardwareSanitizeFailed(e.to_string()))?;
        if !status.success() {
            return Err(EngineError::HardwareSanitizeFailed(format!(
                "nvme sanitize exited with {status}"
            )));
        }
        Ok(())
    }

    fn poll_nvme_sanitize(&self, device: &Device) -> EngineResult<SanitizeProgress> {
        let output = Command::new("nvme")
            .args(["sanitize-log", &device.path])
            .output()
            .map_err(|e| EngineError::HardwareSanitizeFailed(e.to_string()))?;
        let text = String::from_utf8_lossy(&output.stdout);
        let percent = text
            .lines()
            .find(|l| l.contains("SPROG"))
            .and_then(|l| l.split(':').nth(1))
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map(|raw| (raw / 65536.0) * 100.0)
            .unwrap_or(0.0);
        Ok(SanitizeProgress {
            percent,
            done: percent >= 100.0,
        })
    }
}
