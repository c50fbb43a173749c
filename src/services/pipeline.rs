//! End-to-end analysis run
//!
//! `prepare` validates a floor map and partitions it once. Each trajectory is
//! then an independent `run` against the read-only partition; `run_many`
//! fans trajectories out over the rayon pool with one shared localizer.

use crate::domain::error::PipelineError;
use crate::domain::floor_map::FloorMap;
use crate::domain::report::{RejectedRoom, Report, ReportMetadata, RoomSummary, RunCounts, TimeWindow};
use crate::domain::types::{RoomId, Sample};
use crate::infra::config::{Config, PartitionSettings, SegmentationSettings};
use crate::infra::metrics::Metrics;
use crate::io::input::{TrajectoryInput, TrajectorySource, Transitions};
use crate::services::aggregator::{aggregate, TransitionMatrix};
use crate::services::localizer::Localizer;
use crate::services::partitioner::{Partitioner, RoomPartition};
use crate::services::segment_builder::{BuildStats, SegmentBuilder};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// A validated floor map with its disjoint partition
#[derive(Debug, Clone)]
pub struct PreparedMap {
    map: FloorMap,
    partition: RoomPartition,
    room_order: Vec<RoomId>,
}

impl PreparedMap {
    pub fn partition(&self) -> &RoomPartition {
        &self.partition
    }

    /// Report row/column order: rooms as listed in the map
    pub fn room_order(&self) -> &[RoomId] {
        &self.room_order
    }
}

pub struct Pipeline {
    site_id: String,
    segmentation: SegmentationSettings,
    partition: PartitionSettings,
    metrics: Arc<Metrics>,
}

impl Pipeline {
    pub fn new(
        site_id: impl Into<String>,
        segmentation: SegmentationSettings,
        partition: PartitionSettings,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { site_id: site_id.into(), segmentation, partition, metrics }
    }

    pub fn from_config(config: &Config, metrics: Arc<Metrics>) -> Self {
        Self::new(config.site_id(), config.segmentation().clone(), config.partition().clone(), metrics)
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Validate the map and build its partition
    pub fn prepare(&self, map: FloorMap) -> Result<PreparedMap, PipelineError> {
        map.validate()?;
        let partition = Partitioner::new(&self.partition).partition(&map.rooms);
        let rejected = partition.rejected().len();
        self.metrics.record_partition(map.rooms.len() - rejected, rejected);

        let room_order = map.room_ids();
        Ok(PreparedMap { map, partition, room_order })
    }

    pub fn run(&self, prepared: &PreparedMap, input: TrajectoryInput) -> Result<Report, PipelineError> {
        let localizer = Localizer::new(&prepared.partition, &self.segmentation);
        self.run_with(prepared, &localizer, input)
    }

    /// Run every trajectory in parallel. Results keep input order.
    pub fn run_many(
        &self,
        prepared: &PreparedMap,
        inputs: Vec<TrajectoryInput>,
    ) -> Vec<Result<Report, PipelineError>> {
        let localizer = Localizer::new(&prepared.partition, &self.segmentation);
        inputs.into_par_iter().map(|input| self.run_with(prepared, &localizer, input)).collect()
    }

    fn run_with(
        &self,
        prepared: &PreparedMap,
        localizer: &Localizer<'_>,
        input: TrajectoryInput,
    ) -> Result<Report, PipelineError> {
        let label = input.label.clone();
        match self.execute(prepared, localizer, input) {
            Ok(report) => Ok(report),
            Err(e) => {
                warn!(source = %label, error = %e, "run_failed");
                self.metrics.record_run_failed();
                Err(e)
            }
        }
    }

    fn execute(
        &self,
        prepared: &PreparedMap,
        localizer: &Localizer<'_>,
        input: TrajectoryInput,
    ) -> Result<Report, PipelineError> {
        let started = Instant::now();
        let TrajectoryInput { label, meta, source, transitions } = input;
        let mut counts = RunCounts::default();

        let (segments, stats) = match source {
            TrajectorySource::Samples(samples) => {
                counts.samples_in = samples.len();
                let accepted = accepted_sorted(samples);
                counts.samples_accepted = accepted.len();
                let outcome = SegmentBuilder::new(&self.segmentation).build(localizer, &accepted);
                (outcome.segments, outcome.stats)
            }
            TrajectorySource::Segments(records) => {
                let mut segments = Vec::with_capacity(records.len());
                for record in records {
                    if let Some(segment) = record.into_segment()? {
                        segments.push(segment);
                    }
                }
                let stats = BuildStats { segments: segments.len(), ..Default::default() };
                (segments, stats)
            }
        };

        let room_order = prepared.room_order();
        let dwell = aggregate(&segments, room_order);
        let matrix = match &transitions {
            Transitions::Aggregated(records) => TransitionMatrix::from_records(records, room_order),
            Transitions::Switches(switches) => TransitionMatrix::from_switches(switches, room_order),
            Transitions::None => TransitionMatrix::from_records(&[], room_order),
        };

        counts.samples_unlocated = stats.unlocated;
        counts.gaps_dropped = stats.gaps_dropped;
        counts.segments = segments.len();
        counts.unknown_room_refs = dwell.unknown_segments + matrix.unknown_records;
        counts.rooms_rejected = prepared.partition.rejected().len();
        counts.rooms_loaded = prepared.map.rooms.len() - counts.rooms_rejected;
        counts.rooms_aggregated = dwell.rooms_aggregated();

        let rooms = prepared
            .map
            .rooms
            .iter()
            .zip(dwell.dwell_ms.iter().zip(&dwell.visits))
            .map(|(room, (&dwell_ms, &visit_count))| RoomSummary {
                room_id: room.id.clone(),
                name: room.display_name().to_string(),
                region_area_m2: prepared.partition.get(&room.id).map_or(0.0, |r| r.area()),
                dwell_ms,
                visit_count,
            })
            .collect();

        let rejected_rooms = prepared
            .partition
            .rejected()
            .iter()
            .map(|e| RejectedRoom { room_id: e.room_id().clone(), reason: e.to_string() })
            .collect();

        let metadata = ReportMetadata {
            source: meta.or(&prepared.map.meta()),
            time_window: TimeWindow::for_segments(&segments),
        };

        let empty = counts.samples_accepted > 0 && segments.is_empty();
        if empty {
            warn!(
                source = %label,
                samples_accepted = %counts.samples_accepted,
                unlocated = %counts.samples_unlocated,
                gaps_dropped = %counts.gaps_dropped,
                "no_segments_built"
            );
        }

        let run_ms = started.elapsed().as_millis() as u64;
        self.record(&counts, &stats, run_ms, empty);
        info!(
            source = %label,
            segments = %counts.segments,
            rooms_aggregated = %counts.rooms_aggregated,
            unknown_room_refs = %counts.unknown_room_refs,
            run_ms = %run_ms,
            "run_complete"
        );

        Ok(Report {
            run_id: Uuid::now_v7(),
            site_id: self.site_id.clone(),
            source: label,
            metadata,
            room_order: room_order.to_vec(),
            rooms,
            rejected_rooms,
            transition_counts: matrix.counts,
            avg_travel_s: matrix.avg_travel_s,
            total_travel_s: matrix.total_travel_s,
            counts,
            segments,
        })
    }

    fn record(&self, counts: &RunCounts, stats: &BuildStats, run_ms: u64, empty: bool) {
        self.metrics.record_samples(
            counts.samples_in,
            counts.samples_in - counts.samples_accepted,
            stats.unlocated,
            stats.gaps_dropped,
        );
        self.metrics.record_segments(counts.segments);
        self.metrics.record_unknown_room_refs(counts.unknown_room_refs);
        self.metrics.record_run(run_ms, empty);
    }
}

/// Drop rejected fixes and order by time (stable for equal timestamps)
fn accepted_sorted(samples: Vec<Sample>) -> Vec<Sample> {
    let mut accepted: Vec<Sample> = samples.into_iter().filter(|s| s.accepted).collect();
    accepted.sort_by_key(|s| s.time);
    accepted
}
