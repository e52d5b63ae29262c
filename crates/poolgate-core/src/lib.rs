//! poolgate-core — configuration and shared defaults.
//!
//! Every poolgate binary reads the same `poolgate.toml` model. All fields
//! are optional; an empty file (or no file at all) yields the fixed
//! defaults: listen on 8080, first worker on 5000, autoscaler tick every
//! five seconds.

pub mod config;
pub mod error;

pub use config::{
    ListenConfig, PoolgateConfig, ProxyConfig, ScalingConfig, WorkerConfig, parse_duration,
};
pub use error::{ConfigError, ConfigResult};

/// Port the dispatcher listens on.
pub const DEFAULT_LISTEN_PORT: u16 = 8080;

/// Port of the first worker; later workers are `base + pool size`.
pub const DEFAULT_BASE_PORT: u16 = 5000;

/// Autoscaler tick interval in seconds.
pub const DEFAULT_SCALE_INTERVAL_SECS: u64 = 5;

/// Status returned when no worker is idle.
pub const DEFAULT_REJECT_STATUS: u16 = 500;

/// Worker program spawned when none is configured.
pub const DEFAULT_WORKER_PROGRAM: &str = "poolgate-echo";
