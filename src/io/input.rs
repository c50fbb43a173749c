//! JSON input loading: floor maps and trajectory documents
//!
//! A trajectory document is either a raw sample stream (`points`) or a
//! pre-built bundle (`stay_segments`). Both may carry descriptive `meta` and
//! transition lists (`rs_aggregated`, or raw `r_transitions`).

use crate::domain::error::PipelineError;
use crate::domain::floor_map::FloorMap;
use crate::domain::types::{RoomSwitch, Sample, SegmentRecord, SourceMeta, TransitionRecord};
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// Load and validate a floor map
pub fn load_floor_map<P: AsRef<Path>>(path: P) -> anyhow::Result<FloorMap> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read floor map {}", path.display()))?;
    let map: FloorMap = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse floor map {}", path.display()))?;
    map.validate().with_context(|| format!("Invalid floor map {}", path.display()))?;

    info!(
        path = %path.display(),
        map_id = %map.map_id.as_deref().unwrap_or("-"),
        rooms = %map.rooms.len(),
        "floor_map_loaded"
    );
    Ok(map)
}

/// Raw on-disk shape of a trajectory document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrajectoryDocument {
    #[serde(default)]
    pub meta: SourceMeta,
    #[serde(default)]
    pub points: Option<Vec<Sample>>,
    #[serde(default)]
    pub stay_segments: Option<Vec<SegmentRecord>>,
    #[serde(default)]
    pub rs_aggregated: Option<Vec<TransitionRecord>>,
    #[serde(default)]
    pub r_transitions: Option<Vec<RoomSwitch>>,
}

/// Where the stay segments of a run come from
#[derive(Debug, Clone, PartialEq)]
pub enum TrajectorySource {
    /// Sample stream to be segmented
    Samples(Vec<Sample>),
    /// Segments computed upstream
    Segments(Vec<SegmentRecord>),
}

/// Transition list supplied alongside a trajectory
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Transitions {
    #[default]
    None,
    Aggregated(Vec<TransitionRecord>),
    Switches(Vec<RoomSwitch>),
}

/// One unit of pipeline work
#[derive(Debug, Clone)]
pub struct TrajectoryInput {
    /// Report label, usually the file stem
    pub label: String,
    pub meta: SourceMeta,
    pub source: TrajectorySource,
    pub transitions: Transitions,
}

impl TrajectoryInput {
    pub fn from_samples(label: impl Into<String>, samples: Vec<Sample>) -> Self {
        Self {
            label: label.into(),
            meta: SourceMeta::default(),
            source: TrajectorySource::Samples(samples),
            transitions: Transitions::None,
        }
    }

    pub fn with_transitions(mut self, transitions: Transitions) -> Self {
        self.transitions = transitions;
        self
    }

    /// Resolve a parsed document. `stay_segments` wins over `points`;
    /// `rs_aggregated` wins over `r_transitions` unless it is empty.
    pub fn from_document(label: impl Into<String>, doc: TrajectoryDocument) -> Result<Self, PipelineError> {
        let source = match (doc.stay_segments, doc.points) {
            (Some(segments), _) => TrajectorySource::Segments(segments),
            (None, Some(points)) => TrajectorySource::Samples(points),
            (None, None) => return Err(PipelineError::MissingTrajectory),
        };

        let transitions = match (doc.rs_aggregated, doc.r_transitions) {
            (Some(records), _) if !records.is_empty() => Transitions::Aggregated(records),
            (_, Some(switches)) if !switches.is_empty() => Transitions::Switches(switches),
            _ => Transitions::None,
        };

        Ok(Self { label: label.into(), meta: doc.meta, source, transitions })
    }
}

/// Load a trajectory document, auto-detecting its kind
pub fn load_trajectory<P: AsRef<Path>>(path: P) -> anyhow::Result<TrajectoryInput> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read trajectory {}", path.display()))?;
    let doc: TrajectoryDocument = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse trajectory {}", path.display()))?;

    let label = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let input = TrajectoryInput::from_document(label, doc)
        .with_context(|| format!("Invalid trajectory {}", path.display()))?;

    let (kind, len) = match &input.source {
        TrajectorySource::Samples(s) => ("points", s.len()),
        TrajectorySource::Segments(s) => ("stay_segments", s.len()),
    };
    info!(path = %path.display(), kind = %kind, records = %len, "trajectory_loaded");
    Ok(input)
}
