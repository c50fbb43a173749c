//! FlowTrack - room-level dwell and flow analysis for indoor trajectories
//!
//! Module structure:
//! - `domain/` - Core types (Room, Sample, StaySegment, Report)
//! - `io/` - JSON input loading and report egress
//! - `services/` - Partitioner, Localizer, SegmentBuilder, Aggregator, Pipeline
//! - `infra/` - Infrastructure (Config, Metrics)

use clap::Parser;
use flowtrack::infra::{Config, Metrics};
use flowtrack::io::{load_floor_map, load_trajectory, Egress};
use flowtrack::services::Pipeline;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// FlowTrack - per-room dwell, visits, and transitions from position traces
#[derive(Parser, Debug)]
#[command(name = "flowtrack", version, about)]
struct Args {
    /// Floor map JSON (rooms with polygon vertices)
    #[arg(short, long)]
    map: PathBuf,

    /// Trajectory documents: sample streams or pre-built segment bundles
    #[arg(required = true)]
    trajectories: Vec<PathBuf>,

    /// Path to TOML configuration file (else CONFIG_FILE, else config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Directory receiving one sub-directory per trajectory
    #[arg(short, long, default_value = "out")]
    output_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    // Default: INFO, use RUST_LOG=debug for per-room detail
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(version = %env!("CARGO_PKG_VERSION"), git_hash = %env!("GIT_HASH"), "flowtrack starting");

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(&std::env::args().collect::<Vec<_>>()),
    };
    info!(
        config_file = %config.config_file(),
        site_id = %config.site_id(),
        max_gap_ms = %config.segmentation().max_gap_ms,
        stickiness_eps_m = %config.segmentation().stickiness_eps_m,
        nearest_fallback_m = ?config.segmentation().nearest_fallback_m,
        output_dir = %args.output_dir.display(),
        "config_loaded"
    );

    let metrics = Arc::new(Metrics::new());
    let pipeline = Pipeline::from_config(&config, metrics.clone());

    let map = load_floor_map(&args.map)?;
    let prepared = pipeline.prepare(map)?;

    let mut inputs = Vec::with_capacity(args.trajectories.len());
    for path in &args.trajectories {
        match load_trajectory(path) {
            Ok(input) => inputs.push(input),
            Err(e) => {
                error!(path = %path.display(), error = %format!("{:#}", e), "trajectory_load_failed");
                metrics.record_run_failed();
            }
        }
    }

    let egress = Egress::new(&args.output_dir, config.report_file(), config.segments_file());
    let mut egress_failures = 0usize;
    for report in pipeline.run_many(&prepared, inputs).into_iter().flatten() {
        let report_ok = egress.write_report(&report);
        let segments_ok = egress.write_segments(&report);
        if !(report_ok && segments_ok) {
            egress_failures += 1;
        }
    }

    let summary = metrics.report();
    summary.log();

    if summary.runs_failed > 0 || egress_failures > 0 {
        anyhow::bail!(
            "{} of {} runs failed, {} reports not fully written",
            summary.runs_failed,
            summary.runs_total,
            egress_failures
        );
    }

    info!("flowtrack complete");
    Ok(())
}
