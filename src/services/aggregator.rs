//! Dwell, visit, and transition aggregation
//!
//! Dwell and visits are reduced from stay segments; transition matrices come
//! from an externally supplied transition list and are never derived from
//! segments here.

use crate::domain::types::{RoomId, RoomSwitch, StaySegment, TransitionRecord};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::debug;

/// Per-room dwell and visit totals, indexed by the room order given
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DwellStats {
    pub room_order: Vec<RoomId>,
    /// Σ duration_ms × weight per room
    pub dwell_ms: Vec<f64>,
    /// Maximal runs of consecutive known segments per room
    pub visits: Vec<u64>,
    /// Segments whose room was not in the room set
    #[serde(skip)]
    pub unknown_segments: usize,
}

impl DwellStats {
    pub fn dwell_of(&self, room_id: &RoomId) -> Option<f64> {
        self.position(room_id).map(|i| self.dwell_ms[i])
    }

    pub fn visits_of(&self, room_id: &RoomId) -> Option<u64> {
        self.position(room_id).map(|i| self.visits[i])
    }

    pub fn total_dwell_ms(&self) -> f64 {
        self.dwell_ms.iter().sum()
    }

    /// Rooms with any dwell or visit
    pub fn rooms_aggregated(&self) -> usize {
        self.visits.iter().filter(|&&v| v > 0).count()
    }

    fn position(&self, room_id: &RoomId) -> Option<usize> {
        self.room_order.iter().position(|r| r == room_id)
    }
}

fn index_of(room_order: &[RoomId]) -> FxHashMap<&RoomId, usize> {
    room_order.iter().enumerate().map(|(i, r)| (r, i)).collect()
}

/// Reduce segments into dwell and visit totals over `room_order`
pub fn aggregate(segments: &[StaySegment], room_order: &[RoomId]) -> DwellStats {
    let index = index_of(room_order);
    let mut dwell_ms = vec![0.0; room_order.len()];
    let mut visits = vec![0u64; room_order.len()];
    let mut unknown_segments = 0;
    let mut last: Option<usize> = None;

    for segment in segments {
        let Some(&i) = index.get(&segment.room_id) else {
            debug!(room_id = %segment.room_id, "unknown_room_reference");
            unknown_segments += 1;
            continue;
        };
        dwell_ms[i] += segment.weighted_duration_ms();
        if last != Some(i) {
            visits[i] += 1;
        }
        last = Some(i);
    }

    DwellStats { room_order: room_order.to_vec(), dwell_ms, visits, unknown_segments }
}

/// `n×n` directed transition statistics over a room ordering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionMatrix {
    pub room_order: Vec<RoomId>,
    /// `counts[from][to]`
    pub counts: Vec<Vec<u64>>,
    pub avg_travel_s: Vec<Vec<f64>>,
    pub total_travel_s: Vec<Vec<f64>>,
    /// Records that referenced a room outside the ordering
    #[serde(skip)]
    pub unknown_records: usize,
}

impl TransitionMatrix {
    fn zeroed(room_order: &[RoomId]) -> Self {
        let n = room_order.len();
        Self {
            room_order: room_order.to_vec(),
            counts: vec![vec![0; n]; n],
            avg_travel_s: vec![vec![0.0; n]; n],
            total_travel_s: vec![vec![0.0; n]; n],
            unknown_records: 0,
        }
    }

    /// Build from pre-aggregated records. Repeated directed pairs sum their
    /// trip counts and travel totals; the average is taken as given, the last
    /// record for a pair winning.
    pub fn from_records(records: &[TransitionRecord], room_order: &[RoomId]) -> Self {
        let index = index_of(room_order);
        let mut matrix = Self::zeroed(room_order);

        for record in records {
            let Some((i, j)) = lookup_pair(&index, record.from.as_ref(), record.to.as_ref()) else {
                debug!(from = ?record.from, to = ?record.to, "unknown_room_reference");
                matrix.unknown_records += 1;
                continue;
            };
            matrix.counts[i][j] += record.count_trips;
            matrix.avg_travel_s[i][j] = record.avg_travel_s;
            if let Some(total) = record.total_travel_s {
                matrix.total_travel_s[i][j] += total;
            }
        }
        matrix
    }

    /// Count raw switch events, one trip each. No travel times are known.
    pub fn from_switches(switches: &[RoomSwitch], room_order: &[RoomId]) -> Self {
        let index = index_of(room_order);
        let mut matrix = Self::zeroed(room_order);

        for switch in switches {
            let Some((i, j)) = lookup_pair(&index, switch.from.as_ref(), switch.to.as_ref()) else {
                matrix.unknown_records += 1;
                continue;
            };
            matrix.counts[i][j] += 1;
        }
        matrix
    }

    pub fn count(&self, from: &RoomId, to: &RoomId) -> Option<u64> {
        let i = self.room_order.iter().position(|r| r == from)?;
        let j = self.room_order.iter().position(|r| r == to)?;
        Some(self.counts[i][j])
    }

    pub fn total_trips(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }
}

fn lookup_pair(
    index: &FxHashMap<&RoomId, usize>,
    from: Option<&RoomId>,
    to: Option<&RoomId>,
) -> Option<(usize, usize)> {
    Some((*index.get(from?)?, *index.get(to?)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(names: &[&str]) -> Vec<RoomId> {
        names.iter().map(|&n| RoomId::from(n)).collect()
    }

    fn seg(room: &str, start: i64, end: i64, weight: f64) -> StaySegment {
        StaySegment::new(RoomId::from(room), start, end, weight)
    }

    fn rec(from: &str, to: &str, trips: u64, avg: f64) -> TransitionRecord {
        TransitionRecord {
            from: Some(RoomId::from(from)),
            to: Some(RoomId::from(to)),
            count_trips: trips,
            avg_travel_s: avg,
            total_travel_s: None,
        }
    }

    #[test]
    fn test_every_room_initialized() {
        let stats = aggregate(&[], &ids(&["A", "B"]));
        assert_eq!(stats.dwell_ms, vec![0.0, 0.0]);
        assert_eq!(stats.visits, vec![0, 0]);
        assert_eq!(stats.rooms_aggregated(), 0);
    }

    #[test]
    fn test_visit_counting_collapses_consecutive() {
        let segments = vec![
            seg("A", 0, 1000, 1.0),
            seg("A", 1000, 2000, 1.0),
            seg("B", 2000, 3000, 1.0),
            seg("A", 3000, 4000, 1.0),
        ];
        let stats = aggregate(&segments, &ids(&["A", "B"]));
        assert_eq!(stats.visits_of(&RoomId::from("A")), Some(2));
        assert_eq!(stats.visits_of(&RoomId::from("B")), Some(1));
        assert_eq!(stats.dwell_of(&RoomId::from("A")), Some(3000.0));
    }

    #[test]
    fn test_dwell_is_weighted() {
        let stats = aggregate(&[seg("A", 0, 2000, 0.25)], &ids(&["A"]));
        assert_eq!(stats.dwell_ms, vec![500.0]);
    }

    #[test]
    fn test_unknown_rooms_skipped() {
        let segments = vec![seg("A", 0, 1000, 1.0), seg("X", 1000, 2000, 1.0), seg("A", 2000, 3000, 1.0)];
        let stats = aggregate(&segments, &ids(&["A", "B"]));
        assert_eq!(stats.unknown_segments, 1);
        assert_eq!(stats.total_dwell_ms(), 2000.0);
        // The unknown segment does not break the run
        assert_eq!(stats.visits_of(&RoomId::from("A")), Some(1));
        assert_eq!(stats.visits_of(&RoomId::from("X")), None);
    }

    #[test]
    fn test_lookups_follow_room_order() {
        let stats = aggregate(&[seg("B", 0, 10, 1.0)], &ids(&["A", "B"]));
        assert_eq!(stats.dwell_of(&RoomId::from("B")), Some(10.0));
        assert_eq!(stats.visits_of(&RoomId::from("A")), Some(0));
    }

    #[test]
    fn test_transition_matrix_from_records() {
        let records = vec![rec("A", "B", 3, 4.5), rec("B", "A", 1, 2.0), rec("A", "B", 2, 5.0)];
        let m = TransitionMatrix::from_records(&records, &ids(&["A", "B", "C"]));
        assert_eq!(m.counts, vec![vec![0, 5, 0], vec![1, 0, 0], vec![0, 0, 0]]);
        assert_eq!(m.avg_travel_s[0][1], 5.0);
        assert_eq!(m.avg_travel_s[1][0], 2.0);
        assert_eq!(m.total_trips(), 6);
    }

    #[test]
    fn test_transition_unknown_and_null_skipped() {
        let mut records = vec![rec("A", "Z", 3, 1.0)];
        records.push(TransitionRecord {
            from: None,
            to: Some(RoomId::from("A")),
            count_trips: 1,
            avg_travel_s: 0.0,
            total_travel_s: None,
        });
        let m = TransitionMatrix::from_records(&records, &ids(&["A", "B"]));
        assert_eq!(m.unknown_records, 2);
        assert_eq!(m.total_trips(), 0);
    }

    #[test]
    fn test_total_travel_sums() {
        let mut a = rec("A", "B", 1, 3.0);
        a.total_travel_s = Some(3.0);
        let mut b = rec("A", "B", 1, 5.0);
        b.total_travel_s = Some(5.0);
        let m = TransitionMatrix::from_records(&[a, b], &ids(&["A", "B"]));
        assert_eq!(m.total_travel_s[0][1], 8.0);
    }

    #[test]
    fn test_from_switches_counts_each() {
        let switches: Vec<RoomSwitch> = [("A", "B"), ("B", "A"), ("A", "B")]
            .iter()
            .map(|&(f, t)| RoomSwitch { from: Some(RoomId::from(f)), to: Some(RoomId::from(t)), at: None })
            .collect();
        let m = TransitionMatrix::from_switches(&switches, &ids(&["A", "B"]));
        assert_eq!(m.count(&RoomId::from("A"), &RoomId::from("B")), Some(2));
        assert_eq!(m.count(&RoomId::from("B"), &RoomId::from("A")), Some(1));
    }

    proptest! {
        #[test]
        fn unit_weight_dwell_is_conserved(
            picks in prop::collection::vec((0usize..4, 0i64..10_000), 0..50)
        ) {
            let names = ["A", "B", "C", "X"];
            let segments: Vec<StaySegment> = picks
                .iter()
                .map(|&(i, d)| seg(names[i], 0, d, 1.0))
                .collect();
            let stats = aggregate(&segments, &ids(&["A", "B", "C"]));

            let known: i64 = segments.iter().filter(|s| s.room_id.as_str() != "X").map(|s| s.duration_ms).sum();
            prop_assert_eq!(stats.total_dwell_ms(), known as f64);
        }
    }
}
