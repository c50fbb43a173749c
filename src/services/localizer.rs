//! Point-to-room localization over a disjoint partition
//!
//! Policy, in order:
//! 1. Stickiness: a point within `stickiness_eps_m` of the previous room's
//!    region stays in that room (suppresses flicker on shared walls)
//! 2. First region in partition order whose bounding box and then polygon
//!    covers the point
//! 3. Optional nearest-region fallback within `nearest_fallback_m`
//! 4. Otherwise unlocated
//!
//! The bounding-box rejection goes through an R-tree so large buildings do
//! not pay a linear scan per sample. Candidates are still tested in partition
//! order, so the first-match result is identical to the linear scan.

use crate::domain::types::{RoomId, Sample};
use crate::infra::config::SegmentationSettings;
use crate::services::partitioner::RoomPartition;
use geo::Point;
use rstar::{RTree, RTreeObject, AABB};
use smallvec::SmallVec;
use tracing::trace;

/// Bounding box of one non-empty region, keyed by partition slot
#[derive(Debug, Clone)]
struct RegionBounds {
    slot: usize,
    min: [f64; 2],
    max: [f64; 2],
}

impl RTreeObject for RegionBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

/// Resolves samples to partition slots. Read-only; safe to share across runs.
pub struct Localizer<'a> {
    partition: &'a RoomPartition,
    index: RTree<RegionBounds>,
    stickiness_eps_m: f64,
    nearest_fallback_m: Option<f64>,
}

impl<'a> Localizer<'a> {
    pub fn new(partition: &'a RoomPartition, settings: &SegmentationSettings) -> Self {
        let bounds: Vec<RegionBounds> = partition
            .regions()
            .iter()
            .enumerate()
            .filter_map(|(slot, region)| {
                let rect = region.bbox()?;
                Some(RegionBounds {
                    slot,
                    min: [rect.min().x, rect.min().y],
                    max: [rect.max().x, rect.max().y],
                })
            })
            .collect();

        Self {
            partition,
            index: RTree::bulk_load(bounds),
            stickiness_eps_m: settings.stickiness_eps_m,
            nearest_fallback_m: settings.nearest_fallback_m,
        }
    }

    /// Room id for a slot returned by `locate`
    #[inline]
    pub fn room_id(&self, slot: usize) -> &'a RoomId {
        &self.partition.region(slot).room_id
    }

    /// Locate by room id rather than slot
    pub fn locate_room(&self, sample: &Sample, last_room: Option<&RoomId>) -> Option<&'a RoomId> {
        let last = last_room.and_then(|id| self.partition.slot_of(id));
        self.locate(sample, last).map(|slot| self.room_id(slot))
    }

    /// Owning partition slot for `sample`, or `None` when unlocated
    pub fn locate(&self, sample: &Sample, last_slot: Option<usize>) -> Option<usize> {
        let point = Point::new(sample.x, sample.y);

        if let Some(last) = last_slot {
            let region = self.partition.region(last);
            if !region.is_empty() && region.distance_to(&point) <= self.stickiness_eps_m {
                return Some(last);
            }
        }

        let probe = AABB::from_point([sample.x, sample.y]);
        let mut candidates: SmallVec<[usize; 4]> = self
            .index
            .locate_in_envelope_intersecting(&probe)
            .map(|b| b.slot)
            .collect();
        candidates.sort_unstable();

        for slot in candidates {
            let region = self.partition.region(slot);
            if region.bbox_contains(&point) && region.covers(&point) {
                return Some(slot);
            }
        }

        if let Some(max_dist) = self.nearest_fallback_m {
            return self.nearest_within(&point, max_dist);
        }

        trace!(x = %sample.x, y = %sample.y, time = %sample.time, "sample_unlocated");
        None
    }

    fn nearest_within(&self, point: &Point<f64>, max_dist: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (slot, region) in self.partition.regions().iter().enumerate() {
            if region.is_empty() {
                continue;
            }
            let d = region.distance_to(point);
            if d <= max_dist && best.map_or(true, |(_, bd)| d < bd) {
                best = Some((slot, d));
            }
        }
        best.map(|(slot, _)| slot)
    }
}
