//! Per-trajectory analysis report
//!
//! Everything a caller needs to render heatmaps and flow matrices, plus the
//! counts needed to notice silently dropped data.

use crate::domain::types::{RoomId, SourceMeta, StaySegment};
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One-hour window bounding the earliest segment, floored to the hour (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window for an epoch-millisecond timestamp, `None` if out of range
    pub fn containing(epoch_ms: i64) -> Option<Self> {
        let hour = TimeDelta::try_hours(1)?;
        let at = DateTime::<Utc>::from_timestamp_millis(epoch_ms)?;
        let start = at.duration_trunc(hour).ok()?;
        Some(Self { start, end: start + hour })
    }

    /// Window for the earliest segment start
    pub fn for_segments(segments: &[StaySegment]) -> Option<Self> {
        segments.iter().map(|s| s.t_start).min().and_then(Self::containing)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportMetadata {
    #[serde(flatten)]
    pub source: SourceMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub name: String,
    /// Area of the room's partitioned region (m²)
    pub region_area_m2: f64,
    pub dwell_ms: f64,
    pub visit_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRoom {
    pub room_id: RoomId,
    pub reason: String,
}

/// Tallies for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounts {
    pub rooms_loaded: usize,
    pub rooms_rejected: usize,
    /// Rooms with at least one visit
    pub rooms_aggregated: usize,
    pub samples_in: usize,
    pub samples_accepted: usize,
    pub samples_unlocated: usize,
    pub gaps_dropped: usize,
    pub segments: usize,
    pub unknown_room_refs: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub run_id: Uuid,
    pub site_id: String,
    /// Label of the trajectory this report was built from
    pub source: String,
    pub metadata: ReportMetadata,
    pub room_order: Vec<RoomId>,
    pub rooms: Vec<RoomSummary>,
    pub rejected_rooms: Vec<RejectedRoom>,
    /// `transition_counts[from][to]`, indexed by `room_order`
    pub transition_counts: Vec<Vec<u64>>,
    pub avg_travel_s: Vec<Vec<f64>>,
    pub total_travel_s: Vec<Vec<f64>>,
    pub counts: RunCounts,
    #[serde(skip)]
    pub segments: Vec<StaySegment>,
}

impl Report {
    pub fn room(&self, room_id: &RoomId) -> Option<&RoomSummary> {
        self.rooms.iter().find(|r| &r.room_id == room_id)
    }

    pub fn dwell_ms(&self, room_id: &RoomId) -> Option<f64> {
        self.room(room_id).map(|r| r.dwell_ms)
    }

    pub fn visits(&self, room_id: &RoomId) -> Option<u64> {
        self.room(room_id).map(|r| r.visit_count)
    }
}
