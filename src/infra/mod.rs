//! Infrastructure - configuration and metrics
//!
//! - `config` - Application configuration (TOML loading, defaults)
//! - `metrics` - Lock-free run counters

pub mod config;
pub mod metrics;

// Re-export commonly used types
pub use config::{Config, PartitionSettings, SegmentationSettings};
pub use metrics::Metrics;
