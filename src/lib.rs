//! Secure block-device erasure engine with signed attestation
//! certificates: device discovery and classification, software overwrite
//! and hardware sanitize execution, and a certificate authority that
//! signs and verifies proof-of-erasure records.

pub mod config;
pub mod crypto;
pub mod device;
pub mod error;
pub mod hardware;
pub mod model;
pub mod pattern;
pub mod progress;
pub mod ui;
pub mod volume;
pub mod worker;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use worker::Engine;
