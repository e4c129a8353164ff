use directories::ProjectDirs;
use std::path::PathBuf;

/// Explicit, caller-constructed configuration for one engine instance.
///
/// Replaces the ambient globals / process-wide singletons the tool this
/// one descends from relied on (a logger singleton and module-level
/// state) — every path and tuning knob the engine needs is threaded in
/// here rather than read from a hidden global at call time.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding `private_key.pem` / `public_key.pem`.
    pub key_dir: PathBuf,
    /// Directory signed certificates are persisted to.
    pub cert_dir: PathBuf,
    /// Overwrite buffer size in bytes. Spec default: 1 MiB.
    pub buffer_size: usize,
    /// When true, `RandomStream(seed)` passes are reproducible: the
    /// seed drives a deterministic PRNG instead of the OS CSPRNG. Only
    /// meant for test harnesses.
    pub test_mode: bool,
}

impl EngineConfig {
    pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

    /// Resolve platform-appropriate default directories via `directories`,
    /// falling back to `./erastat-{keys,certs}` if no home directory can
    /// be determined (e.g. a minimal container).
    pub fn resolve_defaults() -> Self {
        let (key_dir, cert_dir) = match ProjectDirs::from("dev", "erastat", "erastat") {
            Some(dirs) => (
                dirs.data_dir().join("keys"),
                dirs.data_dir().join("certificates"),
            ),
            None => (
                PathBuf::from("erastat-keys"),
                PathBuf::from("erastat-certificates"),
            ),
        };
        Self {
            key_dir,
            cert_dir,
            buffer_size: Self::DEFAULT_BUFFER_SIZE,
            test_mode: false,
        }
    }

    pub fn for_test(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            key_dir: root.join("keys"),
            cert_dir: root.join("certificates"),
            buffer_size: Self::DEFAULT_BUFFER_SIZE,
            test_mode: true,
        }
    }
}
