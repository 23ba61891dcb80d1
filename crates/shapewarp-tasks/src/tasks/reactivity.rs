//! SHAPE reactivity profile analysis.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use shapewarp_jobs::{TaskContext, TaskError, TaskFunction};

use crate::io::{display, ensure, parse_params, read_input, write_table};
use crate::query::{self, QueryEntry};
use crate::stats::{self, Classification, WindowStats};

pub const TASK_TYPE: &str = "reactivity_analysis";

/// Parameters for reactivity analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactivityParams {
    /// Query file with sequences and reactivities.
    pub input_file: String,
    /// Directory for CSV output.
    #[serde(default)]
    pub output_dir: Option<String>,
    /// Min-max normalise reactivities before analysis.
    #[serde(default)]
    pub normalize: bool,
    /// Cap applied before normalisation.
    #[serde(default = "default_max_reactivity")]
    pub max_reactivity: f64,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// `[low, high]` classification thresholds.
    #[serde(default = "default_thresholds")]
    pub thresholds: [f64; 2],
}

fn default_max_reactivity() -> f64 {
    10.0
}

fn default_window_size() -> usize {
    15
}

fn default_thresholds() -> [f64; 2] {
    [0.3, 0.7]
}

impl ReactivityParams {
    fn check(&self) -> Result<(), TaskError> {
        ensure(!self.input_file.trim().is_empty(), "input_file must not be empty")?;
        ensure(self.window_size >= 1, "window_size must be at least 1")?;
        ensure(
            self.max_reactivity > 0.0,
            "max_reactivity must be positive",
        )?;
        let [low, high] = self.thresholds;
        ensure(
            low <= high,
            format!("thresholds must be ordered low <= high (got {} > {})", low, high),
        )
    }
}

/// Summary statistics for one entry.
#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    pub entry_id: String,
    pub sequence_length: usize,
    pub total_measurements: usize,
    pub valid_measurements: usize,
    pub coverage: f64,
    pub mean_reactivity: Option<f64>,
    pub median_reactivity: Option<f64>,
    pub std_reactivity: Option<f64>,
    pub min_reactivity: Option<f64>,
    pub max_reactivity: Option<f64>,
    pub structured_count: usize,
    pub structured_fraction: f64,
    pub intermediate_count: usize,
    pub intermediate_fraction: f64,
    pub flexible_count: usize,
    pub flexible_fraction: f64,
    pub no_data_count: usize,
    pub no_data_fraction: f64,
}

/// Per-nucleotide classification row.
#[derive(Debug, Clone, Serialize)]
pub struct NucleotideRow {
    pub entry_id: String,
    pub position: usize,
    pub nucleotide: char,
    pub reactivity: Option<f64>,
    pub classification: Classification,
}

/// Sliding window row tagged with its entry.
///
/// Fields are spelled out because CSV rows cannot hold flattened maps.
#[derive(Debug, Clone, Serialize)]
pub struct WindowRow {
    pub entry_id: String,
    pub start: usize,
    pub end: usize,
    pub mean_reactivity: Option<f64>,
    pub median_reactivity: Option<f64>,
    pub std_reactivity: Option<f64>,
    pub min_reactivity: Option<f64>,
    pub max_reactivity: Option<f64>,
    pub coverage: f64,
}

impl WindowRow {
    fn new(entry_id: &str, window: WindowStats) -> Self {
        Self {
            entry_id: entry_id.to_string(),
            start: window.start,
            end: window.end,
            mean_reactivity: window.mean_reactivity,
            median_reactivity: window.median_reactivity,
            std_reactivity: window.std_reactivity,
            min_reactivity: window.min_reactivity,
            max_reactivity: window.max_reactivity,
            coverage: window.coverage,
        }
    }
}

fn finite(value: f64) -> Option<f64> {
    if value.is_nan() { None } else { Some(value) }
}

fn summarize_entry(
    entry: &QueryEntry,
    reactivities: &[f64],
    classes: &[Classification],
) -> EntrySummary {
    let total = reactivities.len();
    let valid = stats::valid(reactivities).len();
    let fraction = |n: usize| if total == 0 { 0.0 } else { n as f64 / total as f64 };
    let count = |c: Classification| classes.iter().filter(|x| **x == c).count();

    let structured = count(Classification::Structured);
    let intermediate = count(Classification::Intermediate);
    let flexible = count(Classification::Flexible);
    let no_data = count(Classification::NoData);

    EntrySummary {
        entry_id: entry.id.clone(),
        sequence_length: entry.sequence.chars().count(),
        total_measurements: total,
        valid_measurements: valid,
        coverage: fraction(valid),
        mean_reactivity: stats::mean(reactivities),
        median_reactivity: stats::median(reactivities),
        std_reactivity: stats::population_std(reactivities),
        min_reactivity: stats::min(reactivities),
        max_reactivity: stats::max(reactivities),
        structured_count: structured,
        structured_fraction: fraction(structured),
        intermediate_count: intermediate,
        intermediate_fraction: fraction(intermediate),
        flexible_count: flexible,
        flexible_fraction: fraction(flexible),
        no_data_count: no_data,
        no_data_fraction: fraction(no_data),
    }
}

/// Min, max, mean and median of a column.
fn spread(values: &[f64]) -> Value {
    json!({
        "mean": stats::mean(values),
        "median": stats::median(values),
        "min": stats::min(values),
        "max": stats::max(values),
    })
}

fn analysis_summary(summaries: &[EntrySummary], nucleotides: &[NucleotideRow]) -> Value {
    let reactivities: Vec<f64> = nucleotides.iter().filter_map(|n| n.reactivity).collect();
    let global = if reactivities.is_empty() {
        Value::Null
    } else {
        json!({
            "mean": stats::mean(&reactivities),
            "median": stats::median(&reactivities),
            "std": stats::sample_std(&reactivities),
            "min": stats::min(&reactivities),
            "max": stats::max(&reactivities),
        })
    };

    let mut distribution: BTreeMap<&str, usize> = BTreeMap::new();
    for row in nucleotides {
        *distribution.entry(row.classification.as_str()).or_default() += 1;
    }

    let coverage: Vec<f64> = summaries.iter().map(|s| s.coverage).collect();
    let lengths: Vec<f64> = summaries.iter().map(|s| s.sequence_length as f64).collect();

    json!({
        "total_entries": summaries.len(),
        "total_nucleotides": nucleotides.len(),
        "global_reactivity_stats": global,
        "classification_distribution": distribution,
        "coverage_stats": spread(&coverage),
        "sequence_length_stats": spread(&lengths),
    })
}

/// Per-entry statistics, nucleotide classification and sliding windows over
/// a SHAPE query file.
pub struct ReactivityAnalysisTask;

impl ReactivityAnalysisTask {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReactivityAnalysisTask {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskFunction for ReactivityAnalysisTask {
    fn task_type(&self) -> &str {
        TASK_TYPE
    }

    fn description(&self) -> &str {
        "Analyze SHAPE reactivity profiles: statistics, nucleotide classes, sliding windows"
    }

    fn validate(&self, params: &Value) -> Result<(), TaskError> {
        parse_params::<ReactivityParams>(params)?.check()
    }

    async fn run(&self, params: Value, ctx: TaskContext) -> Result<Value, TaskError> {
        let params: ReactivityParams = parse_params(&params)?;
        params.check()?;

        let content = read_input(&params.input_file).await?;
        let entries = query::parse(&content);
        if entries.is_empty() {
            return Err(TaskError::InvalidInput(
                "No valid entries found in input file".to_string(),
            ));
        }
        let errors = query::validate(&entries);
        if !errors.is_empty() {
            return Err(TaskError::InvalidInput(format!(
                "Input validation failed: {}",
                errors.join("; ")
            )));
        }

        ctx.log(format!("Analyzing {} entries from {}", entries.len(), params.input_file))
            .await;

        let [low, high] = params.thresholds;
        let mut summaries = Vec::with_capacity(entries.len());
        let mut nucleotides = Vec::new();
        let mut windows = Vec::new();

        for (i, entry) in entries.iter().enumerate() {
            ctx.check_cancelled()?;

            let reactivities = if params.normalize {
                stats::normalize(&entry.reactivities, Some(params.max_reactivity))
            } else {
                entry.reactivities.clone()
            };
            let classes: Vec<Classification> = reactivities
                .iter()
                .map(|r| stats::classify(*r, low, high))
                .collect();

            summaries.push(summarize_entry(entry, &reactivities, &classes));

            nucleotides.extend(
                entry
                    .sequence
                    .chars()
                    .zip(reactivities.iter().zip(&classes))
                    .enumerate()
                    .map(|(pos, (nucleotide, (reactivity, class)))| NucleotideRow {
                        entry_id: entry.id.clone(),
                        position: pos + 1,
                        nucleotide,
                        reactivity: finite(*reactivity),
                        classification: *class,
                    }),
            );

            windows.extend(
                stats::sliding_windows(&reactivities, params.window_size)
                    .into_iter()
                    .map(|window| WindowRow::new(&entry.id, window)),
            );

            ctx.log(format!("Analyzed entry {} ({}/{})", entry.id, i + 1, entries.len()))
                .await;
        }

        let mut output_files = BTreeMap::new();
        if let Some(dir) = &params.output_dir {
            let dir = PathBuf::from(dir);

            let summary_file = dir.join("summary_statistics.csv");
            write_table(&summary_file, &summaries, b',').await?;
            output_files.insert("summary_statistics", display(&summary_file));

            let nucleotide_file = dir.join("nucleotide_classifications.csv");
            write_table(&nucleotide_file, &nucleotides, b',').await?;
            output_files.insert("nucleotide_classifications", display(&nucleotide_file));

            let window_file = dir.join("sliding_window_analysis.csv");
            write_table(&window_file, &windows, b',').await?;
            output_files.insert("sliding_window_analysis", display(&window_file));

            ctx.log(format!("Wrote results to {}", display(&dir))).await;
        }

        info!(
            "Reactivity analysis of {} finished: {} entries, {} nucleotides",
            params.input_file,
            entries.len(),
            nucleotides.len()
        );

        Ok(json!({
            "analysis_summary": analysis_summary(&summaries, &nucleotides),
            "summary_stats": summaries,
            "nucleotide_classifications": nucleotides,
            "sliding_window_analysis": windows,
            "output_files": output_files,
            "metadata": {
                "input_file": params.input_file,
                "num_entries": entries.len(),
                "total_nucleotides": nucleotides.len(),
                "config": {
                    "normalize": params.normalize,
                    "max_reactivity": params.max_reactivity,
                    "window_size": params.window_size,
                    "thresholds": params.thresholds,
                },
            },
        }))
    }
}

#[cfg(test)]
#[path = "reactivity_tests.rs"]
mod tests;
