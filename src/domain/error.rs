//! Typed errors for geometry validation and pipeline input

use crate::domain::types::RoomId;
use thiserror::Error;

/// Degenerate room boundary. Fatal to that room only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("room {room_id}: boundary has {distinct} distinct vertices, need at least 3")]
    TooFewVertices { room_id: RoomId, distinct: usize },

    #[error("room {room_id}: boundary has zero area")]
    ZeroArea { room_id: RoomId },

    #[error("room {room_id}: boundary contains a non-finite coordinate")]
    NonFiniteCoordinate { room_id: RoomId },
}

impl GeometryError {
    pub fn room_id(&self) -> &RoomId {
        match self {
            GeometryError::TooFewVertices { room_id, .. }
            | GeometryError::ZeroArea { room_id }
            | GeometryError::NonFiniteCoordinate { room_id } => room_id,
        }
    }
}

/// Malformed top-level input. Fails the whole run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("floor map contains no rooms")]
    EmptyRoomSet,

    #[error("duplicate room id {0}")]
    DuplicateRoomId(RoomId),

    #[error("trajectory document has neither points nor stay_segments")]
    MissingTrajectory,

    #[error("stay segment [{start_t}, {end_t}] is malformed")]
    InvalidSegment { start_t: i64, end_t: i64 },
}
