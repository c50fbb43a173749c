//! Lock-free pipeline counters
//!
//! Trajectory runs execute on a rayon pool and share one `Metrics` behind an
//! `Arc`; every update is a relaxed atomic add.
//!
//! NOTE: All atomics use Relaxed ordering. These are statistical counters
//! only and must not drive control flow.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Run duration bucket boundaries (milliseconds)
/// Buckets: ≤1, ≤2, ≤4, ≤8, ≤16, ≤32, ≤64, ≤128, ≤256, ≤512, >512
const RUN_BUCKET_BOUNDS: [u64; 10] = [1, 2, 4, 8, 16, 32, 64, 128, 256, 512];
const NUM_BUCKETS: usize = 11;

#[inline]
fn bucket_index(run_ms: u64) -> usize {
    RUN_BUCKET_BOUNDS.partition_point(|&bound| bound < run_ms)
}

#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Upper bound of the bucket holding the given percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile).ceil() as u64;
    let mut cumulative = 0u64;

    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] = [1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1024];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Rooms accepted into the partition
    rooms_loaded: AtomicU64,
    /// Rooms dropped for invalid geometry
    rooms_rejected: AtomicU64,
    runs_total: AtomicU64,
    runs_failed: AtomicU64,
    /// Runs that had samples but produced no segment
    runs_empty: AtomicU64,
    samples_total: AtomicU64,
    /// Samples with `accepted = false`, filtered before segmentation
    samples_filtered: AtomicU64,
    samples_unlocated: AtomicU64,
    gaps_dropped: AtomicU64,
    segments_total: AtomicU64,
    /// Segment or transition references to rooms outside the room set
    unknown_room_refs: AtomicU64,
    run_ms_buckets: [AtomicU64; NUM_BUCKETS],
    run_ms_max: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            rooms_loaded: AtomicU64::new(0),
            rooms_rejected: AtomicU64::new(0),
            runs_total: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            runs_empty: AtomicU64::new(0),
            samples_total: AtomicU64::new(0),
            samples_filtered: AtomicU64::new(0),
            samples_unlocated: AtomicU64::new(0),
            gaps_dropped: AtomicU64::new(0),
            segments_total: AtomicU64::new(0),
            unknown_room_refs: AtomicU64::new(0),
            run_ms_buckets: Default::default(),
            run_ms_max: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_partition(&self, loaded: usize, rejected: usize) {
        self.rooms_loaded.fetch_add(loaded as u64, Ordering::Relaxed);
        self.rooms_rejected.fetch_add(rejected as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_samples(&self, total: usize, filtered: usize, unlocated: usize, gaps: usize) {
        self.samples_total.fetch_add(total as u64, Ordering::Relaxed);
        self.samples_filtered.fetch_add(filtered as u64, Ordering::Relaxed);
        self.samples_unlocated.fetch_add(unlocated as u64, Ordering::Relaxed);
        self.gaps_dropped.fetch_add(gaps as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_segments(&self, count: usize) {
        self.segments_total.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_unknown_room_refs(&self, count: usize) {
        self.unknown_room_refs.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record a completed run and its wall time
    #[inline]
    pub fn record_run(&self, run_ms: u64, empty: bool) {
        self.runs_total.fetch_add(1, Ordering::Relaxed);
        if empty {
            self.runs_empty.fetch_add(1, Ordering::Relaxed);
        }
        self.run_ms_buckets[bucket_index(run_ms)].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.run_ms_max, run_ms);
    }

    #[inline]
    pub fn record_run_failed(&self) {
        self.runs_total.fetch_add(1, Ordering::Relaxed);
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn runs_total(&self) -> u64 {
        self.runs_total.load(Ordering::Relaxed)
    }

    pub fn runs_failed(&self) -> u64 {
        self.runs_failed.load(Ordering::Relaxed)
    }

    pub fn segments_total(&self) -> u64 {
        self.segments_total.load(Ordering::Relaxed)
    }

    /// Snapshot of all counters; counters are monotonic and never reset
    pub fn report(&self) -> MetricsSummary {
        let mut run_ms_buckets = [0u64; NUM_BUCKETS];
        for (i, bucket) in self.run_ms_buckets.iter().enumerate() {
            run_ms_buckets[i] = bucket.load(Ordering::Relaxed);
        }

        MetricsSummary {
            rooms_loaded: self.rooms_loaded.load(Ordering::Relaxed),
            rooms_rejected: self.rooms_rejected.load(Ordering::Relaxed),
            runs_total: self.runs_total.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            runs_empty: self.runs_empty.load(Ordering::Relaxed),
            samples_total: self.samples_total.load(Ordering::Relaxed),
            samples_filtered: self.samples_filtered.load(Ordering::Relaxed),
            samples_unlocated: self.samples_unlocated.load(Ordering::Relaxed),
            gaps_dropped: self.gaps_dropped.load(Ordering::Relaxed),
            segments_total: self.segments_total.load(Ordering::Relaxed),
            unknown_room_refs: self.unknown_room_refs.load(Ordering::Relaxed),
            run_ms_p50: percentile_from_buckets(&run_ms_buckets, 0.50),
            run_ms_p99: percentile_from_buckets(&run_ms_buckets, 0.99),
            run_ms_max: self.run_ms_max.load(Ordering::Relaxed),
            run_ms_buckets,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    pub rooms_loaded: u64,
    pub rooms_rejected: u64,
    pub runs_total: u64,
    pub runs_failed: u64,
    pub runs_empty: u64,
    pub samples_total: u64,
    pub samples_filtered: u64,
    pub samples_unlocated: u64,
    pub gaps_dropped: u64,
    pub segments_total: u64,
    pub unknown_room_refs: u64,
    /// Bounds: ≤1, ≤2, ≤4, ≤8, ≤16, ≤32, ≤64, ≤128, ≤256, ≤512, >512 ms
    pub run_ms_buckets: [u64; NUM_BUCKETS],
    pub run_ms_p50: u64,
    pub run_ms_p99: u64,
    pub run_ms_max: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            rooms_loaded = %self.rooms_loaded,
            rooms_rejected = %self.rooms_rejected,
            runs_total = %self.runs_total,
            runs_failed = %self.runs_failed,
            runs_empty = %self.runs_empty,
            samples_total = %self.samples_total,
            samples_filtered = %self.samples_filtered,
            samples_unlocated = %self.samples_unlocated,
            gaps_dropped = %self.gaps_dropped,
            segments_total = %self.segments_total,
            unknown_room_refs = %self.unknown_room_refs,
            run_p50_ms = %self.run_ms_p50,
            run_p99_ms = %self.run_ms_p99,
            run_max_ms = %self.run_ms_max,
            "metrics"
        );
    }
}
