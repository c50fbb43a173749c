//! Report egress - writes analysis results to disk
//!
//! Each trajectory gets its own directory under the output root:
//! - `<report_file>`: the full report, pretty JSON
//! - `<segments_file>`: stay segments in JSONL format (one per line)
//!
//! Both files are rewritten on every run, so a rerun never mixes old segments in.

use crate::domain::report::Report;
use crate::domain::types::StaySegment;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use uuid::Uuid;

/// One JSONL line: a segment tagged with the run that produced it
#[derive(Debug, Serialize)]
struct SegmentLine<'a> {
    run_id: Uuid,
    source: &'a str,
    #[serde(flatten)]
    segment: &'a StaySegment,
}

/// Egress writer for reports and segments
pub struct Egress {
    output_dir: PathBuf,
    report_file: String,
    segments_file: String,
}

impl Egress {
    pub fn new<P: AsRef<Path>>(output_dir: P, report_file: &str, segments_file: &str) -> Self {
        let output_dir = output_dir.as_ref().to_path_buf();
        info!(output_dir = %output_dir.display(), "egress_initialized");
        Self {
            output_dir,
            report_file: report_file.to_string(),
            segments_file: segments_file.to_string(),
        }
    }

    /// Directory holding one report's files
    pub fn run_dir(&self, report: &Report) -> PathBuf {
        self.output_dir.join(&report.source)
    }

    pub fn report_path(&self, report: &Report) -> PathBuf {
        self.run_dir(report).join(&self.report_file)
    }

    pub fn segments_path(&self, report: &Report) -> PathBuf {
        self.run_dir(report).join(&self.segments_file)
    }

    /// Write the report, replacing any previous one
    /// Returns true if successful, false otherwise
    pub fn write_report(&self, report: &Report) -> bool {
        let path = self.report_path(report);
        let result = serde_json::to_string_pretty(report)
            .map_err(std::io::Error::from)
            .and_then(|json| write_file(&path, &json));

        match result {
            Ok(()) => {
                info!(
                    run_id = %report.run_id,
                    source = %report.source,
                    rooms = %report.rooms.len(),
                    path = %path.display(),
                    "report_egressed"
                );
                true
            }
            Err(e) => {
                error!(source = %report.source, path = %path.display(), error = %e, "report_egress_failed");
                false
            }
        }
    }

    /// Write the report's segments, one JSON object per line, replacing any previous file
    /// Returns true if successful, false otherwise
    pub fn write_segments(&self, report: &Report) -> bool {
        let path = self.segments_path(report);
        match write_lines(&path, report) {
            Ok(n) => {
                debug!(source = %report.source, lines = %n, path = %path.display(), "segments_egressed");
                true
            }
            Err(e) => {
                error!(source = %report.source, path = %path.display(), error = %e, "segments_egress_failed");
                false
            }
        }
    }
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn write_file(path: &Path, content: &str) -> std::io::Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, content)
}

fn write_lines(path: &Path, report: &Report) -> std::io::Result<usize> {
    ensure_parent(path)?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    for segment in &report.segments {
        let line = SegmentLine { run_id: report.run_id, source: &report.source, segment };
        serde_json::to_writer(&mut writer, &line)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(report.segments.len())
}
