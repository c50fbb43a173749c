//! Shared types for the room-flow engine

use crate::domain::error::PipelineError;
use serde::{Deserialize, Serialize};

/// Newtype wrapper for room IDs to provide type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Map-local planar vertex (meters)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
}

/// Room as authored in the floor map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    #[serde(default)]
    pub name: Option<String>,
    pub vertices: Vec<Vertex>,
}

impl Room {
    pub fn new(id: impl Into<RoomId>, vertices: Vec<Vertex>) -> Self {
        Self { id: id.into(), name: None, vertices }
    }

    /// Display name, falling back to the room id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

fn default_accepted() -> bool {
    true
}

/// A single positioning fix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    /// Epoch milliseconds
    pub time: i64,
    /// Upstream acceptance flag; rejected fixes never reach the builder
    #[serde(default = "default_accepted")]
    pub accepted: bool,
    /// Number of anchors used by the position solver
    #[serde(default, rename = "anchorsUsed", alias = "anchors_used")]
    pub anchors_used: Option<u32>,
    /// Solver residual in meters
    #[serde(default)]
    pub rms: Option<f64>,
}

impl Sample {
    #[inline]
    pub fn new(x: f64, y: f64, time: i64) -> Self {
        Self { x, y, time, accepted: true, anchors_used: None, rms: None }
    }

    pub fn with_quality(mut self, anchors_used: u32, rms: f64) -> Self {
        self.anchors_used = Some(anchors_used);
        self.rms = Some(rms);
        self
    }

    pub fn rejected(mut self) -> Self {
        self.accepted = false;
        self
    }
}

/// Contiguous interval attributed to one room
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaySegment {
    pub room_id: RoomId,
    pub t_start: i64,
    pub t_end: i64,
    pub duration_ms: i64,
    /// Mean sample quality in [0, 1]
    pub weight: f64,
}

impl StaySegment {
    pub fn new(room_id: RoomId, t_start: i64, t_end: i64, weight: f64) -> Self {
        Self { room_id, t_start, t_end, duration_ms: t_end - t_start, weight }
    }

    /// Duration scaled by quality weight
    #[inline]
    pub fn weighted_duration_ms(&self) -> f64 {
        self.duration_ms as f64 * self.weight
    }
}

/// Pre-built stay segment as exported by the upstream post-processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    /// `null` means the segment was never attributed to a room
    pub room_id: Option<RoomId>,
    pub start_t: i64,
    pub end_t: i64,
    pub duration_s: f64,
}

impl SegmentRecord {
    /// Convert to a weight-1.0 segment. Unattributed records yield `Ok(None)`.
    pub fn into_segment(self) -> Result<Option<StaySegment>, PipelineError> {
        if self.end_t < self.start_t || !self.duration_s.is_finite() || self.duration_s < 0.0 {
            return Err(PipelineError::InvalidSegment {
                start_t: self.start_t,
                end_t: self.end_t,
            });
        }
        let Some(room_id) = self.room_id else {
            return Ok(None);
        };
        let duration_ms = (self.duration_s * 1000.0).round() as i64;
        Ok(Some(StaySegment {
            room_id,
            t_start: self.start_t,
            t_end: self.end_t,
            duration_ms,
            weight: 1.0,
        }))
    }
}

/// Pre-aggregated directed transition statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: Option<RoomId>,
    pub to: Option<RoomId>,
    #[serde(default)]
    pub count_trips: u64,
    #[serde(default)]
    pub avg_travel_s: f64,
    #[serde(default)]
    pub total_travel_s: Option<f64>,
}

/// Single raw room switch event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSwitch {
    pub from: Option<RoomId>,
    pub to: Option<RoomId>,
    /// Epoch ms of the switch
    #[serde(default)]
    pub at: Option<i64>,
}

/// Descriptive metadata passed through from upstream documents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<serde_json::Value>,
}

impl SourceMeta {
    /// Fill unset fields from `fallback`
    pub fn or(self, fallback: &SourceMeta) -> SourceMeta {
        SourceMeta {
            map_id: self.map_id.or_else(|| fallback.map_id.clone()),
            building_id: self.building_id.or_else(|| fallback.building_id.clone()),
            floor_id: self.floor_id.or_else(|| fallback.floor_id.clone()),
            units: self.units.or_else(|| fallback.units.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_defaults() {
        let s: Sample = serde_json::from_str(r#"{"x": 1.5, "y": 2.0, "time": 1000}"#).unwrap();
        assert!(s.accepted);
        assert_eq!(s.anchors_used, None);
        assert_eq!(s.rms, None);
    }

    #[test]
    fn test_sample_camel_case_quality() {
        let s: Sample = serde_json::from_str(
            r#"{"x": 0, "y": 0, "time": 5, "accepted": false, "anchorsUsed": 4, "rms": 0.5}"#,
        )
        .unwrap();
        assert!(!s.accepted);
        assert_eq!(s.anchors_used, Some(4));
        assert_eq!(s.rms, Some(0.5));
    }

    #[test]
    fn test_segment_record_rounds_duration() {
        let rec = SegmentRecord {
            room_id: Some(RoomId::from("A")),
            start_t: 0,
            end_t: 1234,
            duration_s: 1.2346,
        };
        let seg = rec.into_segment().unwrap().unwrap();
        assert_eq!(seg.duration_ms, 1235);
        assert_eq!(seg.weight, 1.0);
    }

    #[test]
    fn test_segment_record_null_room() {
        let rec = SegmentRecord { room_id: None, start_t: 0, end_t: 10, duration_s: 0.01 };
        assert!(rec.into_segment().unwrap().is_none());
    }

    #[test]
    fn test_segment_record_inverted() {
        let rec = SegmentRecord {
            room_id: Some(RoomId::from("A")),
            start_t: 100,
            end_t: 10,
            duration_s: 0.0,
        };
        assert!(matches!(rec.into_segment(), Err(PipelineError::InvalidSegment { .. })));
    }

    #[test]
    fn test_source_meta_fallback() {
        let bundle = SourceMeta { floor_id: Some("F2".to_string()), ..Default::default() };
        let map = SourceMeta {
            building_id: Some("B1".to_string()),
            floor_id: Some("F1".to_string()),
            ..Default::default()
        };
        let merged = bundle.or(&map);
        assert_eq!(merged.building_id.as_deref(), Some("B1"));
        assert_eq!(merged.floor_id.as_deref(), Some("F2"));
    }
}
