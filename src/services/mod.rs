//! Services - the analysis stages
//!
//! - `partitioner` - Overlapping room polygons to disjoint regions
//! - `localizer` - Point to room, with stickiness
//! - `segment_builder` - Sample stream to stay segments
//! - `aggregator` - Dwell, visits, and transition matrices
//! - `pipeline` - End-to-end runs, parallel over trajectories

pub mod aggregator;
pub mod localizer;
pub mod partitioner;
pub mod pipeline;
pub mod segment_builder;

// Re-export commonly used types
pub use aggregator::{aggregate, DwellStats, TransitionMatrix};
pub use localizer::Localizer;
pub use partitioner::{Partitioner, RoomPartition, RoomRegion};
pub use pipeline::{Pipeline, PreparedMap};
pub use segment_builder::SegmentBuilder;
