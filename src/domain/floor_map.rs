//! Floor map document: building/floor identity plus the room set

use crate::domain::error::PipelineError;
use crate::domain::types::{Room, RoomId, SourceMeta};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FloorMap {
    #[serde(default)]
    pub map_id: Option<String>,
    #[serde(default)]
    pub building_id: Option<String>,
    #[serde(default)]
    pub floor_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Free-form units descriptor, passed through to reports untouched
    #[serde(default)]
    pub units: Option<serde_json::Value>,
    #[serde(default)]
    pub rooms: Vec<Room>,
}

impl FloorMap {
    pub fn new(rooms: Vec<Room>) -> Self {
        Self { rooms, ..Default::default() }
    }

    /// Reject an empty room set or duplicate ids
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.rooms.is_empty() {
            return Err(PipelineError::EmptyRoomSet);
        }
        let mut seen = FxHashSet::default();
        for room in &self.rooms {
            if !seen.insert(&room.id) {
                return Err(PipelineError::DuplicateRoomId(room.id.clone()));
            }
        }
        Ok(())
    }

    /// Room ids in map order
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|r| r.id.clone()).collect()
    }

    pub fn meta(&self) -> SourceMeta {
        SourceMeta {
            map_id: self.map_id.clone(),
            building_id: self.building_id.clone(),
            floor_id: self.floor_id.clone(),
            units: self.units.clone(),
        }
    }
}
