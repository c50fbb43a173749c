//! Disjoint room partition from possibly-overlapping room polygons
//!
//! Rooms are processed smallest first. Each room keeps only the part of its
//! polygon not already claimed by an earlier room, so smaller (more specific)
//! rooms are never swallowed by larger ones that overlap them.
//!
//! Key behaviors:
//! - Area ties keep input order (stable sort)
//! - Every polygon is normalized after loading and after each boolean op;
//!   components below the sliver threshold are dropped
//! - A degenerate boundary is rejected with a `GeometryError`, logged, and
//!   the room stays in the partition with an empty region
//! - A room fully covered by earlier rooms ends up with an empty region

use crate::domain::error::GeometryError;
use crate::domain::types::{Room, RoomId};
use crate::infra::config::PartitionSettings;
use geo::{
    Area, BooleanOps, BoundingRect, Coord, EuclideanDistance, Intersects, LineString,
    MultiPolygon, Point, Polygon, Rect,
};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};

/// Anything at or below this is treated as zero area when validating input
const ZERO_AREA_EPS: f64 = 1e-12;

/// One room's share of the plane
#[derive(Debug, Clone)]
pub struct RoomRegion {
    pub room_id: RoomId,
    pub name: String,
    /// Area of the normalized input boundary (0 for rejected rooms)
    pub source_area: f64,
    region: MultiPolygon<f64>,
    bbox: Option<Rect<f64>>,
}

impl RoomRegion {
    fn new(room_id: RoomId, name: String, source_area: f64, region: MultiPolygon<f64>) -> Self {
        let bbox = region.bounding_rect();
        Self { room_id, name, source_area, region, bbox }
    }

    fn empty(room_id: RoomId, name: String) -> Self {
        Self::new(room_id, name, 0.0, MultiPolygon::new(Vec::new()))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.region.0.is_empty()
    }

    pub fn region(&self) -> &MultiPolygon<f64> {
        &self.region
    }

    pub fn area(&self) -> f64 {
        self.region.unsigned_area()
    }

    pub fn bbox(&self) -> Option<Rect<f64>> {
        self.bbox
    }

    /// Inclusive bounding-box test
    #[inline]
    pub fn bbox_contains(&self, point: &Point<f64>) -> bool {
        self.bbox.is_some_and(|b| {
            let (min, max) = (b.min(), b.max());
            min.x <= point.x() && point.x() <= max.x && min.y <= point.y() && point.y() <= max.y
        })
    }

    /// Point strictly inside or on the boundary
    pub fn covers(&self, point: &Point<f64>) -> bool {
        !self.is_empty() && self.region.intersects(point)
    }

    /// Euclidean distance to the region (0 inside). Infinite for empty regions.
    pub fn distance_to(&self, point: &Point<f64>) -> f64 {
        self.region
            .0
            .iter()
            .map(|polygon| point.euclidean_distance(polygon))
            .fold(f64::INFINITY, f64::min)
    }
}

/// Pairwise-disjoint room regions, in partition (ascending source area) order
#[derive(Debug, Clone, Default)]
pub struct RoomPartition {
    regions: Vec<RoomRegion>,
    slots: FxHashMap<RoomId, usize>,
    rejected: Vec<GeometryError>,
}

impl RoomPartition {
    /// Regions in partition iteration order
    pub fn regions(&self) -> &[RoomRegion] {
        &self.regions
    }

    #[inline]
    pub fn region(&self, slot: usize) -> &RoomRegion {
        &self.regions[slot]
    }

    pub fn slot_of(&self, room_id: &RoomId) -> Option<usize> {
        self.slots.get(room_id).copied()
    }

    pub fn get(&self, room_id: &RoomId) -> Option<&RoomRegion> {
        self.slot_of(room_id).map(|slot| &self.regions[slot])
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Rooms whose boundary failed validation
    pub fn rejected(&self) -> &[GeometryError] {
        &self.rejected
    }

    /// Rooms that can actually be matched
    pub fn reachable_count(&self) -> usize {
        self.regions.iter().filter(|r| !r.is_empty()).count()
    }

    pub fn total_area(&self) -> f64 {
        self.regions.iter().map(RoomRegion::area).sum()
    }
}

/// Builds a `RoomPartition` from raw rooms
#[derive(Debug, Clone)]
pub struct Partitioner {
    min_sliver_area: f64,
}

impl Partitioner {
    pub fn new(settings: &PartitionSettings) -> Self {
        Self { min_sliver_area: settings.min_sliver_area_m2 }
    }

    pub fn partition(&self, rooms: &[Room]) -> RoomPartition {
        let mut accepted: Vec<(usize, MultiPolygon<f64>, f64)> = Vec::with_capacity(rooms.len());
        let mut rejected = Vec::new();

        for (input_idx, room) in rooms.iter().enumerate() {
            match room_polygon(room) {
                Ok(polygon) => {
                    let shape = self.normalize(MultiPolygon::new(vec![polygon]));
                    let area = shape.unsigned_area();
                    if area <= ZERO_AREA_EPS {
                        let err = GeometryError::ZeroArea { room_id: room.id.clone() };
                        warn!(room_id = %room.id, error = %err, "room_rejected");
                        rejected.push(err);
                        continue;
                    }
                    accepted.push((input_idx, shape, area));
                }
                Err(err) => {
                    warn!(room_id = %room.id, error = %err, "room_rejected");
                    rejected.push(err);
                }
            }
        }

        // Stable: equal areas keep input order
        accepted.sort_by(|a, b| a.2.total_cmp(&b.2));

        let mut regions = Vec::with_capacity(rooms.len());
        let mut occupied: Option<MultiPolygon<f64>> = None;

        // Rejected rooms stay known, but can never be matched
        for err in &rejected {
            let room_id = err.room_id().clone();
            let name = display_name(rooms, &room_id);
            regions.push(RoomRegion::empty(room_id, name));
        }

        for (input_idx, shape, area) in accepted {
            let room = &rooms[input_idx];
            let clean = match &occupied {
                None => shape,
                Some(taken) => self.normalize(shape.difference(taken)),
            };

            occupied = Some(match occupied.take() {
                None => clean.clone(),
                Some(taken) => self.normalize(taken.union(&clean)),
            });

            let region = RoomRegion::new(room.id.clone(), room.display_name().to_string(), area, clean);
            debug!(
                room_id = %room.id,
                source_area = %area,
                region_area = %region.area(),
                empty = %region.is_empty(),
                "room_partitioned"
            );
            regions.push(region);
        }

        let slots = regions.iter().enumerate().map(|(i, r)| (r.room_id.clone(), i)).collect();
        let partition = RoomPartition { regions, slots, rejected };

        info!(
            rooms = %partition.len(),
            reachable = %partition.reachable_count(),
            rejected = %partition.rejected.len(),
            total_area = %partition.total_area(),
            "partition_built"
        );
        partition
    }

    /// Resolve the shape through the boolean-op engine and drop slivers
    fn normalize(&self, shape: MultiPolygon<f64>) -> MultiPolygon<f64> {
        let resolved = shape.union(&MultiPolygon::new(Vec::new()));
        let kept = resolved
            .into_iter()
            .filter_map(|polygon| self.repair_polygon(polygon))
            .collect();
        MultiPolygon::new(kept)
    }

    fn repair_polygon(&self, polygon: Polygon<f64>) -> Option<Polygon<f64>> {
        let (exterior, interiors) = polygon.into_inner();
        let exterior = clean_ring(exterior)?;
        let interiors = interiors
            .into_iter()
            .filter_map(clean_ring)
            .filter(|ring| Polygon::new(ring.clone(), Vec::new()).unsigned_area() >= self.min_sliver_area)
            .collect();
        let polygon = Polygon::new(exterior, interiors);
        (polygon.unsigned_area() >= self.min_sliver_area).then_some(polygon)
    }
}

fn display_name(rooms: &[Room], room_id: &RoomId) -> String {
    rooms
        .iter()
        .find(|r| &r.id == room_id)
        .map(|r| r.display_name().to_string())
        .unwrap_or_else(|| room_id.to_string())
}

/// Drop consecutive duplicate coordinates; `None` if fewer than 3 remain
fn clean_ring(ring: LineString<f64>) -> Option<LineString<f64>> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    for c in ring.0 {
        if coords.last() != Some(&c) {
            coords.push(c);
        }
    }
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    if coords.len() < 3 {
        return None;
    }
    // Polygon::new closes the ring
    Some(LineString::new(coords))
}

/// Validate a room boundary and build its polygon
///
/// Area is not checked here: a self-intersecting ring can have zero signed
/// area yet enclose real floor space, so the zero-area test runs after
/// normalization.
pub fn room_polygon(room: &Room) -> Result<Polygon<f64>, GeometryError> {
    if room.vertices.iter().any(|v| !v.x.is_finite() || !v.y.is_finite()) {
        return Err(GeometryError::NonFiniteCoordinate { room_id: room.id.clone() });
    }

    let distinct: FxHashSet<(u64, u64)> =
        room.vertices.iter().map(|v| (v.x.to_bits(), v.y.to_bits())).collect();
    if distinct.len() < 3 {
        return Err(GeometryError::TooFewVertices {
            room_id: room.id.clone(),
            distinct: distinct.len(),
        });
    }

    let coords: Vec<Coord<f64>> = room.vertices.iter().map(|v| Coord { x: v.x, y: v.y }).collect();
    Ok(Polygon::new(LineString::new(coords), Vec::new()))
}
