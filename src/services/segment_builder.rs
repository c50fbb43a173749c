//! Stay-segment builder
//!
//! Walks a time-sorted sample stream, localizes each sample with stickiness
//! carried from the previous pair, and merges runs of same-room samples into
//! `StaySegment`s weighted by mean sample quality.
//!
//! Key behaviors:
//! - A pair with `dt <= 0` is skipped without touching the open segment
//! - A pair with `dt > max_gap_ms` is a dropout: the open segment closes at
//!   the last sample before the gap and a fresh one starts after it, so the
//!   gap is never attributed to any room
//! - A room change closes the open segment at the last sample of the old
//!   room; the transit window to the first sample of the new room is not
//!   attributed either
//! - Unlocated runs never emit segments

use crate::domain::types::{Sample, StaySegment};
use crate::infra::config::SegmentationSettings;
use crate::services::localizer::Localizer;
use tracing::{debug, trace};

/// Anchor count at which the anchor half of the quality score saturates
const FULL_ANCHORS: f64 = 6.0;
/// Assumed when a sample carries no anchor count
const DEFAULT_ANCHORS: u32 = 0;
/// Assumed when a sample carries no (or an invalid) residual
const DEFAULT_RMS_M: f64 = 5.0;

/// Quality score in [0, 1]: half from anchor count, half from residual
pub fn sample_quality(sample: &Sample) -> f64 {
    let anchors = sample.anchors_used.unwrap_or(DEFAULT_ANCHORS) as f64;
    let rms = sample.rms.filter(|r| r.is_finite() && *r >= 0.0).unwrap_or(DEFAULT_RMS_M);
    (0.5 * (anchors / FULL_ANCHORS) + 0.5 * (1.0 / (1.0 + rms))).clamp(0.0, 1.0)
}

/// Per-run tallies for detecting silent data loss
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub samples: usize,
    pub pairs: usize,
    /// Pairs with `dt > max_gap_ms`
    pub gaps_dropped: usize,
    /// Pairs with `dt <= 0`
    pub non_increasing: usize,
    /// Samples that resolved to no room
    pub unlocated: usize,
    pub segments: usize,
}

#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub segments: Vec<StaySegment>,
    pub stats: BuildStats,
}

/// Segment being grown for the current room
#[derive(Debug, Clone, Copy)]
struct OpenSegment {
    start: i64,
    quality_sum: f64,
    quality_count: u32,
}

impl OpenSegment {
    fn starting_at(start: i64) -> Self {
        Self { start, quality_sum: 0.0, quality_count: 0 }
    }

    fn accumulate(&mut self, quality: f64) {
        self.quality_sum += quality;
        self.quality_count += 1;
    }

    fn weight(&self) -> f64 {
        if self.quality_count == 0 {
            1.0
        } else {
            self.quality_sum / self.quality_count as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct SegmentBuilder {
    max_gap_ms: i64,
}

impl SegmentBuilder {
    pub fn new(settings: &SegmentationSettings) -> Self {
        Self { max_gap_ms: settings.max_gap_ms }
    }

    /// Build stay segments. `samples` must be sorted by time.
    pub fn build(&self, localizer: &Localizer<'_>, samples: &[Sample]) -> BuildOutcome {
        let mut stats = BuildStats { samples: samples.len(), ..Default::default() };
        let mut segments = Vec::new();

        let Some(first) = samples.first() else {
            return BuildOutcome { segments, stats };
        };

        let mut current = localizer.locate(first, None);
        if current.is_none() {
            stats.unlocated += 1;
        }
        let mut open = OpenSegment::starting_at(first.time);

        for pair in samples.windows(2) {
            let (p, next) = (&pair[0], &pair[1]);
            stats.pairs += 1;

            // Saturates at the i64 bounds, where the pair is a gap or out of order anyway
            let dt = next.time.saturating_sub(p.time);
            if dt <= 0 {
                stats.non_increasing += 1;
                continue;
            }

            let room = localizer.locate(p, current);

            if dt > self.max_gap_ms {
                stats.gaps_dropped += 1;
                trace!(from = %p.time, to = %next.time, dt_ms = %dt, "gap_dropped");
                if let Some(slot) = room {
                    if p.time > open.start {
                        segments.push(StaySegment::new(
                            localizer.room_id(slot).clone(),
                            open.start,
                            p.time,
                            open.weight(),
                        ));
                    }
                }
                // Stickiness does not survive a dropout
                current = localizer.locate(next, None);
                if current.is_none() {
                    stats.unlocated += 1;
                }
                open = OpenSegment::starting_at(next.time);
                continue;
            }

            let next_room = localizer.locate(next, room);
            if next_room.is_none() {
                stats.unlocated += 1;
            }

            if next_room == room {
                open.accumulate(sample_quality(p));
            } else {
                if let Some(slot) = room {
                    segments.push(StaySegment::new(
                        localizer.room_id(slot).clone(),
                        open.start,
                        p.time,
                        open.weight(),
                    ));
                }
                open = OpenSegment::starting_at(next.time);
            }

            current = next_room;
        }

        if let (Some(slot), Some(last)) = (current, samples.last()) {
            if last.time > open.start {
                segments.push(StaySegment::new(
                    localizer.room_id(slot).clone(),
                    open.start,
                    last.time,
                    open.weight(),
                ));
            }
        }

        stats.segments = segments.len();
        debug!(
            samples = %stats.samples,
            segments = %stats.segments,
            gaps_dropped = %stats.gaps_dropped,
            unlocated = %stats.unlocated,
            "segments_built"
        );
        BuildOutcome { segments, stats }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::RoomId;
    use crate::infra::config::PartitionSettings;
    use crate::services::partitioner::tests::rect_room;
    use crate::services::partitioner::{Partitioner, RoomPartition};
    use proptest::prelude::*;

    fn floor() -> RoomPartition {
        // A: [0,2]x[0,2], B: [2,5]x[0,2]
        Partitioner::new(&PartitionSettings::default()).partition(&[
            rect_room("A", 0.0, 0.0, 2.0, 2.0),
            rect_room("B", 2.0, 0.0, 5.0, 2.0),
        ])
    }

    fn build(samples: &[Sample]) -> BuildOutcome {
        let partition = floor();
        let settings = SegmentationSettings::default();
        let localizer = Localizer::new(&partition, &settings);
        SegmentBuilder::new(&settings).build(&localizer, samples)
    }

    fn rooms_of(segments: &[StaySegment]) -> Vec<&str> {
        segments.iter().map(|s| s.room_id.as_str()).collect()
    }

    #[test]
    fn test_quality_defaults_to_baseline() {
        let q = sample_quality(&Sample::new(0.0, 0.0, 0));
        assert!((q - (0.5 * 0.0 + 0.5 / 6.0)).abs() < 1e-12);
    }

    #[test]
    fn test_quality_saturates() {
        let q = sample_quality(&Sample::new(0.0, 0.0, 0).with_quality(12, 0.0));
        assert_eq!(q, 1.0);
        let q = sample_quality(&Sample::new(0.0, 0.0, 0).with_quality(6, 1.0));
        assert!((q - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_quality_ignores_invalid_rms() {
        let bad = sample_quality(&Sample::new(0.0, 0.0, 0).with_quality(3, f64::NAN));
        let baseline = sample_quality(&Sample::new(0.0, 0.0, 0).with_quality(3, 5.0));
        assert_eq!(bad, baseline);
    }

    #[test]
    fn test_empty_and_single_sample() {
        assert!(build(&[]).segments.is_empty());
        let out = build(&[Sample::new(1.0, 1.0, 0)]);
        assert!(out.segments.is_empty());
        assert_eq!(out.stats.samples, 1);
    }

    #[test]
    fn test_two_samples_beyond_gap() {
        let out = build(&[Sample::new(1.0, 1.0, 0), Sample::new(1.0, 1.0, 5001)]);
        assert!(out.segments.is_empty());
        assert_eq!(out.stats.gaps_dropped, 1);
    }

    #[test]
    fn test_gap_threshold_is_inclusive() {
        let out = build(&[Sample::new(1.0, 1.0, 0), Sample::new(1.0, 1.0, 5000)]);
        assert_eq!(out.segments.len(), 1);
        assert_eq!(out.segments[0].duration_ms, 5000);
    }

    #[test]
    fn test_gap_before_room_change() {
        let out = build(&[
            Sample::new(1.0, 1.0, 0),
            Sample::new(1.0, 1.0, 1000),
            Sample::new(1.0, 1.0, 2000),
            Sample::new(4.0, 1.0, 8000),
        ]);
        assert_eq!(out.segments, vec![StaySegment::new(RoomId::from("A"), 0, 2000, 1.0 / 12.0)]);
        assert_eq!(out.segments[0].duration_ms, 2000);
    }

    #[test]
    fn test_stationary_samples_single_segment() {
        let samples: Vec<Sample> = (0..20).map(|i| Sample::new(2.0, 1.0, i * 500)).collect();
        let out = build(&samples);
        assert_eq!(out.segments.len(), 1);
        assert_eq!(out.segments[0].t_start, 0);
        assert_eq!(out.segments[0].t_end, 9500);
    }

    #[test]
    fn test_room_change_excludes_transit() {
        let out = build(&[
            Sample::new(1.0, 1.0, 0),
            Sample::new(1.0, 1.0, 1000),
            Sample::new(4.0, 1.0, 2000),
            Sample::new(4.0, 1.0, 3000),
        ]);
        assert_eq!(rooms_of(&out.segments), vec!["A", "B"]);
        assert_eq!((out.segments[0].t_start, out.segments[0].t_end), (0, 1000));
        assert_eq!((out.segments[1].t_start, out.segments[1].t_end), (2000, 3000));
    }

    #[test]
    fn test_weight_is_mean_quality() {
        let out = build(&[
            Sample::new(1.0, 1.0, 0).with_quality(6, 0.0),
            Sample::new(1.0, 1.0, 1000).with_quality(0, 1.0),
            Sample::new(1.0, 1.0, 2000),
        ]);
        assert_eq!(out.segments.len(), 1);
        // Mean of q(s0) = 1.0 and q(s1) = 0.25; last sample never accumulates
        assert!((out.segments[0].weight - 0.625).abs() < 1e-12);
    }

    #[test]
    fn test_single_sample_visit_has_default_weight() {
        let out = build(&[
            Sample::new(1.0, 1.0, 0),
            Sample::new(4.0, 1.0, 1000),
            Sample::new(1.0, 1.0, 2000),
        ]);
        assert_eq!(rooms_of(&out.segments), vec!["A", "B"]);
        assert_eq!(out.segments[0].duration_ms, 0);
        assert_eq!(out.segments[0].weight, 1.0);
        assert_eq!(out.segments[1].duration_ms, 0);
    }

    #[test]
    fn test_boundary_flicker_suppressed() {
        let xs = [1.9, 2.1, 1.95, 2.2, 1.9, 2.05];
        let samples: Vec<Sample> =
            xs.iter().enumerate().map(|(i, &x)| Sample::new(x, 1.0, i as i64 * 1000)).collect();
        let out = build(&samples);
        assert_eq!(rooms_of(&out.segments), vec!["A"]);
        assert_eq!(out.segments[0].t_end, 5000);
    }

    #[test]
    fn test_leading_unlocated_time_excluded() {
        let out = build(&[
            Sample::new(10.0, 10.0, 0),
            Sample::new(10.0, 10.0, 1000),
            Sample::new(1.0, 1.0, 2000),
            Sample::new(1.0, 1.0, 3000),
        ]);
        assert_eq!(out.segments.len(), 1);
        assert_eq!((out.segments[0].t_start, out.segments[0].t_end), (2000, 3000));
        assert_eq!(out.stats.unlocated, 2);
    }

    #[test]
    fn test_trailing_unlocated_closes_segment() {
        let out = build(&[
            Sample::new(1.0, 1.0, 0),
            Sample::new(1.0, 1.0, 1000),
            Sample::new(10.0, 10.0, 2000),
        ]);
        assert_eq!(out.segments.len(), 1);
        assert_eq!(out.segments[0].t_end, 1000);
    }

    #[test]
    fn test_duplicate_timestamps_skipped() {
        let out = build(&[
            Sample::new(1.0, 1.0, 0),
            Sample::new(1.0, 1.0, 1000),
            Sample::new(1.0, 1.0, 1000),
            Sample::new(1.0, 1.0, 2000),
        ]);
        assert_eq!(out.segments.len(), 1);
        assert_eq!(out.segments[0].duration_ms, 2000);
        assert_eq!(out.stats.non_increasing, 1);
    }

    #[test]
    fn test_gap_within_same_room_splits() {
        let out = build(&[
            Sample::new(1.0, 1.0, 0),
            Sample::new(1.0, 1.0, 1000),
            Sample::new(1.0, 1.0, 20_000),
            Sample::new(1.0, 1.0, 21_000),
        ]);
        assert_eq!(rooms_of(&out.segments), vec!["A", "A"]);
        let total: i64 = out.segments.iter().map(|s| s.duration_ms).sum();
        assert_eq!(total, 2000);
    }

    #[test]
    fn test_extreme_timestamps_treated_as_gap() {
        let out = build(&[
            Sample::new(1.0, 1.0, i64::MIN),
            Sample::new(1.0, 1.0, i64::MIN + 1000),
            Sample::new(1.0, 1.0, 1000),
            Sample::new(1.0, 1.0, 2000),
        ]);
        assert_eq!(out.stats.gaps_dropped, 1);
        assert_eq!(out.stats.non_increasing, 0);
        assert_eq!(out.segments.len(), 2);
        assert_eq!((out.segments[0].t_start, out.segments[0].duration_ms), (i64::MIN, 1000));
        assert_eq!((out.segments[1].t_start, out.segments[1].duration_ms), (1000, 1000));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn gaps_never_contribute_duration(
            dts in prop::collection::vec(1i64..12_000, 1..40),
            xs in prop::collection::vec(0.1f64..4.9, 41),
        ) {
            let mut t = 0i64;
            let mut samples = vec![Sample::new(xs[0], 1.0, 0)];
            for (i, dt) in dts.iter().enumerate() {
                t += dt;
                samples.push(Sample::new(xs[i + 1], 1.0, t));
            }
            let out = build(&samples);

            for seg in &out.segments {
                prop_assert!(seg.t_end >= seg.t_start);
                prop_assert!(seg.weight >= 0.0 && seg.weight <= 1.0);
                for pair in samples.windows(2) {
                    let (a, b) = (pair[0].time, pair[1].time);
                    if b - a > 5000 {
                        // No segment may span across a dropout
                        prop_assert!(!(seg.t_start <= a && seg.t_end >= b));
                    }
                }
            }

            let gaps: i64 = dts.iter().filter(|&&dt| dt > 5000).sum();
            let emitted: i64 = out.segments.iter().map(|s| s.duration_ms).sum();
            prop_assert!(emitted <= t - gaps);
        }
    }
}
