//! Extract → clean → enrich → merge → write, strictly in sequence.
//!
//! Each stage is a function from table(s) to table. Failures are explicit
//! `Result`s inside the stages; this orchestrator is the one place that
//! decides to log them, record them in the run summary and carry on with an
//! empty table.

pub mod clean;
pub mod enrich;
pub mod extract;
pub mod merge;
pub mod write;

use crate::config::PipelineConfig;
use crate::constants::DATE_COLUMN;
use crate::metrics;
use crate::table::Table;
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info, info_span};
use uuid::Uuid;

/// Per-source outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub label: String,
    pub tag: String,
    pub rows_extracted: usize,
    pub rows_cleaned: usize,
    pub score_added: bool,
    pub error: Option<String>,
}

/// Result of a complete pipeline run
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub sources: Vec<SourceSummary>,
    pub merged_rows: usize,
    pub merged_columns: Vec<String>,
    pub output_file: Option<String>,
    pub errors: Vec<String>,
    pub duration_secs: f64,
}

impl PipelineResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct Pipeline;

impl Pipeline {
    /// Run every stage once against the configured sources and write the
    /// merged table to `config.output_path`. Never fails; problems are logged
    /// and listed in the returned summary.
    pub fn run(config: &PipelineConfig) -> PipelineResult {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", %run_id);
        let _enter = span.enter();

        info!("Starting pipeline with {} source(s)", config.sources.len());
        metrics::pipeline::run_started();
        let t_pipeline = Instant::now();
        let mut errors: Vec<String> = Vec::new();

        // Step 1: extract
        let t = Instant::now();
        let mut summaries: Vec<SourceSummary> = Vec::with_capacity(config.sources.len());
        let mut tables: Vec<Table> = Vec::with_capacity(config.sources.len());
        for source in &config.sources {
            let path = config.source_path(source);
            let (table, err) = extract::extract_or_empty(source, &path);
            let error = err.map(|e| {
                let msg = format!("{}: {}", source.label, e);
                errors.push(msg.clone());
                msg
            });
            summaries.push(SourceSummary {
                label: source.label.clone(),
                tag: source.tag.clone(),
                rows_extracted: table.len(),
                rows_cleaned: 0,
                score_added: false,
                error,
            });
            tables.push(table);
        }
        metrics::pipeline::stage_duration("extract", t.elapsed().as_secs_f64());

        // Step 2: clean
        let t = Instant::now();
        let tables: Vec<Table> = tables
            .into_iter()
            .zip(summaries.iter_mut())
            .map(|(table, summary)| {
                let rows_in = table.len();
                let cleaned = clean::clean(table, &summary.label);
                summary.rows_cleaned = cleaned.len();
                metrics::clean::rows_cleaned(&summary.tag, rows_in, cleaned.len());
                cleaned
            })
            .collect();
        metrics::pipeline::stage_duration("clean", t.elapsed().as_secs_f64());

        // Step 3: enrich
        let t = Instant::now();
        let tables: Vec<Table> = tables
            .into_iter()
            .zip(summaries.iter_mut())
            .map(|(table, summary)| {
                summary.score_added = table.missing_columns(&enrich::SCORE_OPERANDS).is_empty();
                if summary.score_added {
                    metrics::enrich::feature_added(&summary.tag);
                } else {
                    metrics::enrich::feature_skipped(&summary.tag);
                }
                enrich::add_weather_impact_score(table, &summary.label)
            })
            .collect();
        metrics::pipeline::stage_duration("enrich", t.elapsed().as_secs_f64());

        // Step 4: merge and fill defaults
        let t = Instant::now();
        let tagged: Vec<(String, Table)> = summaries
            .iter()
            .map(|s| s.tag.clone())
            .zip(tables)
            .collect();
        let merged = match merge::merge_sources(tagged, DATE_COLUMN) {
            Ok(table) => table,
            Err(e) => {
                error!("Could not merge datasets: {}", e);
                metrics::pipeline::merge_failure();
                errors.push(format!("merge: {}", e));
                Table::empty()
            }
        };
        let merged = merge::fill_defaults(merged);
        metrics::pipeline::stage_duration("merge", t.elapsed().as_secs_f64());

        // Step 5: write
        let t = Instant::now();
        let output_file = match write::write_table(&merged, &config.output_path) {
            Ok(path) => {
                info!(
                    outcome = "success",
                    rows = merged.len(),
                    "Final cleaned data saved to: {}",
                    path.display()
                );
                metrics::pipeline::rows_written(merged.len());
                Some(path.to_string_lossy().to_string())
            }
            Err(e) => {
                error!(
                    "Failed to save cleaned data to {}: {}",
                    config.output_path.display(),
                    e
                );
                metrics::pipeline::write_failure();
                errors.push(format!("write: {}", e));
                None
            }
        };
        metrics::pipeline::stage_duration("write", t.elapsed().as_secs_f64());

        let duration_secs = t_pipeline.elapsed().as_secs_f64();
        metrics::pipeline::stage_duration("total", duration_secs);
        info!(
            rows = merged.len(),
            errors = errors.len(),
            "Pipeline finished in {:.3}s",
            duration_secs
        );

        PipelineResult {
            run_id,
            sources: summaries,
            merged_rows: merged.len(),
            merged_columns: merged.columns().to_vec(),
            output_file,
            errors,
            duration_secs,
        }
    }
}
