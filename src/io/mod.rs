//! IO modules - file input and output
//!
//! - `input` - Floor map and trajectory document loading (JSON)
//! - `egress` - Report (JSON) and segment (JSONL) output

pub mod egress;
pub mod input;

// Re-export commonly used types
pub use egress::Egress;
pub use input::{load_floor_map, load_trajectory, TrajectoryInput, TrajectorySource, Transitions};
