//! Domain models - core types for rooms, samples, and segments
//!
//! - `types` - `Room`, `Sample`, `StaySegment` and the upstream record shapes
//! - `floor_map` - Floor map document and its validation
//! - `report` - Per-trajectory report
//! - `error` - Typed geometry and pipeline errors

pub mod error;
pub mod floor_map;
pub mod report;
pub mod types;

// Re-export commonly used types at module level
pub use error::{GeometryError, PipelineError};
pub use floor_map::FloorMap;
pub use report::{Report, RunCounts, TimeWindow};
pub use types::{Room, RoomId, Sample, StaySegment, Vertex};
