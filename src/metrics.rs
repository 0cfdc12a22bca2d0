//! Pipeline metrics recorded with the `metrics` facade. Per-source series
//! carry the source tag (`csv`, `json`, ...) in the `source` label.
//!
//! The pipeline binary installs a Prometheus recorder and, at the end of a
//! run, writes the rendered exposition text next to the output file so a
//! node_exporter textfile collector can pick it up. Without an installed
//! recorder every call here is a no-op, which is what unit tests rely on.

use crate::error::{EtlError, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::info;

/// Enum representing all metric names used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    PipelineRuns,
    RowsExtracted,
    SourceFailures,
    RowsCleanedIn,
    RowsCleanedOut,
    FeatureAdded,
    FeatureSkipped,
    MergeFailures,
    RowsWritten,
    WriteFailures,
    StageDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::PipelineRuns => "etl_pipeline_runs_total",
            MetricName::RowsExtracted => "etl_rows_extracted_total",
            MetricName::SourceFailures => "etl_source_failures_total",
            MetricName::RowsCleanedIn => "etl_clean_rows_in_total",
            MetricName::RowsCleanedOut => "etl_clean_rows_out_total",
            MetricName::FeatureAdded => "etl_feature_added_total",
            MetricName::FeatureSkipped => "etl_feature_skipped_total",
            MetricName::MergeFailures => "etl_merge_failures_total",
            MetricName::RowsWritten => "etl_rows_written_total",
            MetricName::WriteFailures => "etl_write_failures_total",
            MetricName::StageDuration => "etl_stage_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the global Prometheus recorder. Call at most once per process.
pub fn init() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| EtlError::Config(format!("Failed to install Prometheus recorder: {}", e)))?;
    info!("Metrics recorder installed");
    Ok(handle)
}

/// Write the current exposition text to `path`, replacing any previous file.
pub fn write_snapshot(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("prom.tmp");
    fs::write(&tmp, handle.render())?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub mod extract {
    use super::MetricName;

    pub fn rows_extracted(tag: &str, rows: usize) {
        ::metrics::counter!(MetricName::RowsExtracted.as_str(), "source" => tag.to_string())
            .increment(rows as u64);
    }

    pub fn source_failure(tag: &str) {
        ::metrics::counter!(MetricName::SourceFailures.as_str(), "source" => tag.to_string())
            .increment(1);
    }
}

pub mod clean {
    use super::MetricName;

    pub fn rows_cleaned(tag: &str, rows_in: usize, rows_out: usize) {
        ::metrics::counter!(MetricName::RowsCleanedIn.as_str(), "source" => tag.to_string())
            .increment(rows_in as u64);
        ::metrics::counter!(MetricName::RowsCleanedOut.as_str(), "source" => tag.to_string())
            .increment(rows_out as u64);
    }
}

pub mod enrich {
    use super::MetricName;

    pub fn feature_added(tag: &str) {
        ::metrics::counter!(MetricName::FeatureAdded.as_str(), "source" => tag.to_string())
            .increment(1);
    }

    pub fn feature_skipped(tag: &str) {
        ::metrics::counter!(MetricName::FeatureSkipped.as_str(), "source" => tag.to_string())
            .increment(1);
    }
}

pub mod pipeline {
    use super::MetricName;

    pub fn run_started() {
        ::metrics::counter!(MetricName::PipelineRuns.as_str()).increment(1);
    }

    pub fn stage_duration(stage: &'static str, secs: f64) {
        ::metrics::histogram!(MetricName::StageDuration.as_str(), "stage" => stage).record(secs);
    }

    pub fn merge_failure() {
        ::metrics::counter!(MetricName::MergeFailures.as_str()).increment(1);
    }

    pub fn rows_written(rows: usize) {
        ::metrics::counter!(MetricName::RowsWritten.as_str()).increment(rows as u64);
    }

    pub fn write_failure() {
        ::metrics::counter!(MetricName::WriteFailures.as_str()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prometheus_style() {
        let all = [
            MetricName::PipelineRuns,
            MetricName::RowsExtracted,
            MetricName::SourceFailures,
            MetricName::RowsCleanedIn,
            MetricName::RowsCleanedOut,
            MetricName::FeatureAdded,
            MetricName::FeatureSkipped,
            MetricName::MergeFailures,
            MetricName::RowsWritten,
            MetricName::WriteFailures,
            MetricName::StageDuration,
        ];
        for name in all {
            let s = name.to_string();
            assert!(s.starts_with("etl_"));
            assert!(s.ends_with("_total") || s.ends_with("_seconds"));
        }
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        extract::rows_extracted("csv", 3);
        pipeline::stage_duration("extract", 0.01);
    }
}
