//! Reactivity database conversion and content analysis.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use shapewarp_jobs::{TaskContext, TaskError, TaskFunction};

use crate::io::{display, ensure, parse_params, read_input, write_file, write_json, write_table};
use crate::stats;

pub const TASK_TYPE: &str = "database_conversion";

/// Header of the binary database format.
pub const BINARY_MAGIC: &[u8; 16] = b"SHAPEWARP_DB_V1\0";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Binary,
    Json,
    Csv,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionParams {
    /// XML transcript database.
    pub input_file: String,
    #[serde(default)]
    pub output_file: Option<String>,
    #[serde(default)]
    pub output_format: OutputFormat,
    /// Skip writing the converted database.
    #[serde(default)]
    pub analyze_only: bool,
    /// Write text/CSV/JSON reports next to the output file.
    #[serde(default = "default_generate_reports")]
    pub generate_reports: bool,
}

fn default_generate_reports() -> bool {
    true
}

impl ConversionParams {
    fn check(&self) -> Result<(), TaskError> {
        ensure(!self.input_file.trim().is_empty(), "input_file must not be empty")?;
        if let Some(output) = &self.output_file {
            ensure(!output.trim().is_empty(), "output_file must not be empty")?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct DatabaseXml {
    #[serde(rename = "transcript", default)]
    transcripts: Vec<TranscriptXml>,
}

#[derive(Debug, Deserialize)]
struct TranscriptXml {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(default)]
    sequence: String,
    #[serde(default)]
    organism: String,
    #[serde(default)]
    probe: String,
    #[serde(rename = "reactivity", default)]
    reactivities: Vec<ReactivityXml>,
}

#[derive(Debug, Deserialize)]
struct ReactivityXml {
    #[serde(rename = "@position", default)]
    position: u32,
    #[serde(rename = "@value", default)]
    value: f64,
}

/// One measured position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reactivity {
    pub position: u32,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub id: String,
    pub sequence: String,
    pub length: usize,
    pub organism: String,
    pub probe: String,
    pub reactivities: Vec<Reactivity>,
}

impl Transcript {
    fn values(&self) -> Vec<f64> {
        self.reactivities.iter().map(|r| r.value).collect()
    }
}

/// Parsed transcript database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub transcripts: Vec<Transcript>,
}

/// Parse an XML transcript database.
pub fn parse_database(xml: &str) -> Result<Database, TaskError> {
    let parsed: DatabaseXml = quick_xml::de::from_str(xml)
        .map_err(|e| TaskError::InvalidInput(format!("Malformed database XML: {}", e)))?;

    let transcripts = parsed
        .transcripts
        .into_iter()
        .map(|t| {
            let sequence = t.sequence.trim().to_string();
            Transcript {
                id: t.id,
                length: sequence.chars().count(),
                sequence,
                organism: t.organism.trim().to_string(),
                probe: t.probe.trim().to_string(),
                reactivities: t
                    .reactivities
                    .into_iter()
                    .map(|r| Reactivity {
                        position: r.position,
                        value: r.value,
                    })
                    .collect(),
            }
        })
        .collect();

    Ok(Database { transcripts })
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptStats {
    pub id: String,
    pub sequence_length: usize,
    pub organism: String,
    pub probe: String,
    pub num_reactivities: usize,
    pub coverage: f64,
    pub mean_reactivity: Option<f64>,
    pub median_reactivity: Option<f64>,
    pub std_reactivity: Option<f64>,
    pub min_reactivity: Option<f64>,
    pub max_reactivity: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GlobalStats {
    pub total_reactivities: usize,
    pub mean_reactivity: Option<f64>,
    pub median_reactivity: Option<f64>,
    pub std_reactivity: Option<f64>,
    pub min_reactivity: Option<f64>,
    pub max_reactivity: Option<f64>,
    pub q25_reactivity: Option<f64>,
    pub q75_reactivity: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseSummary {
    pub total_transcripts: usize,
    pub total_sequence_length: usize,
    pub total_reactivities: usize,
    pub average_transcript_length: f64,
    pub average_reactivities_per_transcript: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseAnalysis {
    pub summary: DatabaseSummary,
    pub global_reactivity_stats: GlobalStats,
    pub transcript_stats: Vec<TranscriptStats>,
}

fn transcript_stats(transcript: &Transcript) -> TranscriptStats {
    let values = transcript.values();
    TranscriptStats {
        id: transcript.id.clone(),
        sequence_length: transcript.length,
        organism: transcript.organism.clone(),
        probe: transcript.probe.clone(),
        num_reactivities: values.len(),
        coverage: if transcript.length == 0 {
            0.0
        } else {
            values.len() as f64 / transcript.length as f64
        },
        mean_reactivity: stats::mean(&values),
        median_reactivity: stats::median(&values),
        std_reactivity: stats::population_std(&values),
        min_reactivity: stats::min(&values),
        max_reactivity: stats::max(&values),
    }
}

/// Summary, global and per-transcript statistics.
pub fn analyze(database: &Database) -> DatabaseAnalysis {
    let transcripts = &database.transcripts;
    let count = transcripts.len();
    let total_length: usize = transcripts.iter().map(|t| t.length).sum();
    let values: Vec<f64> = transcripts.iter().flat_map(|t| t.values()).collect();
    let average = |total: usize| if count == 0 { 0.0 } else { total as f64 / count as f64 };

    DatabaseAnalysis {
        summary: DatabaseSummary {
            total_transcripts: count,
            total_sequence_length: total_length,
            total_reactivities: values.len(),
            average_transcript_length: average(total_length),
            average_reactivities_per_transcript: average(values.len()),
        },
        global_reactivity_stats: GlobalStats {
            total_reactivities: values.len(),
            mean_reactivity: stats::mean(&values),
            median_reactivity: stats::median(&values),
            std_reactivity: stats::population_std(&values),
            min_reactivity: stats::min(&values),
            max_reactivity: stats::max(&values),
            q25_reactivity: stats::percentile(&values, 25.0),
            q75_reactivity: stats::percentile(&values, 75.0),
        },
        transcript_stats: transcripts.iter().map(transcript_stats).collect(),
    }
}

fn length_u32(len: usize, what: &str) -> Result<[u8; 4], TaskError> {
    u32::try_from(len)
        .map(u32::to_le_bytes)
        .map_err(|_| {
            TaskError::InvalidInput(format!("{} too large for binary format: {}", what, len))
        })
}

/// Encode the binary database: magic header, transcript count, then per
/// transcript the id (length-prefixed), sequence length and number of
/// reactivities. All integers are little-endian u32.
pub fn encode_binary(database: &Database) -> Result<Vec<u8>, TaskError> {
    let mut out = Vec::with_capacity(BINARY_MAGIC.len() + 4 + database.transcripts.len() * 32);
    out.extend_from_slice(BINARY_MAGIC);
    out.extend_from_slice(&length_u32(database.transcripts.len(), "transcript count")?);

    for transcript in &database.transcripts {
        let id = transcript.id.as_bytes();
        out.extend_from_slice(&length_u32(id.len(), "transcript id")?);
        out.extend_from_slice(id);
        out.extend_from_slice(&length_u32(transcript.length, "sequence")?);
        out.extend_from_slice(&length_u32(transcript.reactivities.len(), "reactivity count")?);
    }

    Ok(out)
}

#[derive(Serialize)]
struct ReactivityRow<'a> {
    transcript_id: &'a str,
    position: u32,
    value: f64,
}

async fn write_database(
    path: &Path,
    database: &Database,
    format: OutputFormat,
) -> Result<(), TaskError> {
    match format {
        OutputFormat::Binary => write_file(path, &encode_binary(database)?).await,
        OutputFormat::Json => write_json(path, database).await,
        OutputFormat::Csv => {
            let rows: Vec<ReactivityRow<'_>> = database
                .transcripts
                .iter()
                .flat_map(|t| {
                    t.reactivities.iter().map(|r| ReactivityRow {
                        transcript_id: &t.id,
                        position: r.position,
                        value: r.value,
                    })
                })
                .collect();
            write_table(path, &rows, b',').await
        }
    }
}

fn fixed(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.3}", v))
}

/// Plain-text analysis report.
pub fn render_report(analysis: &DatabaseAnalysis) -> String {
    let summary = &analysis.summary;
    let global = &analysis.global_reactivity_stats;
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "SHAPEwarp Database Analysis Report");
    let _ = writeln!(out, "{}\n", "=".repeat(40));

    let _ = writeln!(out, "Summary:");
    let _ = writeln!(out, "  Total transcripts: {}", summary.total_transcripts);
    let _ = writeln!(out, "  Total sequence length: {} nt", summary.total_sequence_length);
    let _ = writeln!(out, "  Total reactivities: {}", summary.total_reactivities);
    let _ = writeln!(
        out,
        "  Average transcript length: {:.1} nt",
        summary.average_transcript_length
    );
    let _ = writeln!(
        out,
        "  Average reactivities per transcript: {:.1}\n",
        summary.average_reactivities_per_transcript
    );

    let _ = writeln!(out, "Global Reactivity Statistics:");
    for (label, value) in [
        ("Mean", global.mean_reactivity),
        ("Median", global.median_reactivity),
        ("Std Dev", global.std_reactivity),
        ("Min", global.min_reactivity),
        ("Max", global.max_reactivity),
        ("Q25", global.q25_reactivity),
        ("Q75", global.q75_reactivity),
    ] {
        let _ = writeln!(out, "  {}: {}", label, fixed(value));
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Transcript Details:");
    for t in &analysis.transcript_stats {
        let _ = writeln!(out, "  {}:", t.id);
        let _ = writeln!(out, "    Length: {} nt", t.sequence_length);
        let _ = writeln!(out, "    Organism: {}", t.organism);
        let _ = writeln!(out, "    Probe: {}", t.probe);
        let _ = writeln!(out, "    Reactivities: {}", t.num_reactivities);
        let _ = writeln!(out, "    Coverage: {:.3}", t.coverage);
        if let Some(mean) = t.mean_reactivity {
            let _ = writeln!(out, "    Mean reactivity: {:.3}", mean);
        }
        let _ = writeln!(out);
    }

    out
}

async fn write_reports(
    dir: &Path,
    database: &Database,
    analysis: &DatabaseAnalysis,
) -> Result<serde_json::Map<String, Value>, TaskError> {
    let mut files = serde_json::Map::new();

    let report = dir.join("database_analysis.txt");
    write_file(&report, render_report(analysis).as_bytes()).await?;
    files.insert("analysis_report".to_string(), json!(display(&report)));

    let details = dir.join("transcript_details.csv");
    write_table(&details, &analysis.transcript_stats, b',').await?;
    files.insert("transcript_csv".to_string(), json!(display(&details)));

    let info = dir.join("database_info.json");
    write_json(&info, database).await?;
    files.insert("database_json".to_string(), json!(display(&info)));

    Ok(files)
}

/// Convert an XML transcript database and report on its contents.
pub struct DatabaseConversionTask;

impl DatabaseConversionTask {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DatabaseConversionTask {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskFunction for DatabaseConversionTask {
    fn task_type(&self) -> &str {
        TASK_TYPE
    }

    fn description(&self) -> &str {
        "Convert an XML reactivity database to binary, JSON or CSV and analyze its contents"
    }

    fn validate(&self, params: &Value) -> Result<(), TaskError> {
        parse_params::<ConversionParams>(params)?.check()
    }

    async fn run(&self, params: Value, ctx: TaskContext) -> Result<Value, TaskError> {
        let params: ConversionParams = parse_params(&params)?;
        params.check()?;

        let xml = read_input(&params.input_file).await?;
        let database = parse_database(&xml)?;
        if database.transcripts.is_empty() {
            return Err(TaskError::InvalidInput(
                "No transcripts found in database".to_string(),
            ));
        }
        ctx.log(format!(
            "Parsed {} transcripts from {}",
            database.transcripts.len(),
            params.input_file
        ))
        .await;

        ctx.check_cancelled()?;
        let analysis = analyze(&database);

        let mut output_path = None;
        if let Some(output) = params.output_file.as_deref().filter(|_| !params.analyze_only) {
            ctx.check_cancelled()?;
            let path = PathBuf::from(output);
            write_database(&path, &database, params.output_format).await?;
            ctx.log(format!("Wrote {:?} database to {}", params.output_format, output))
                .await;
            output_path = Some(display(&path));
        }

        let mut report_files = serde_json::Map::new();
        if let Some(output) = params.output_file.as_deref().filter(|_| params.generate_reports) {
            ctx.check_cancelled()?;
            let dir = Path::new(output)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            report_files = write_reports(&dir, &database, &analysis).await?;
            ctx.log(format!("Wrote reports to {}", display(&dir))).await;
        }

        info!(
            "Database conversion of {} finished: {} transcripts",
            params.input_file,
            database.transcripts.len()
        );

        Ok(json!({
            "output_file": output_path,
            "analysis": analysis,
            "report_files": report_files,
            "database_info": database,
            "metadata": {
                "input_file": params.input_file,
                "num_transcripts": database.transcripts.len(),
                "output_format": params.output_format,
                "analyze_only": params.analyze_only,
            },
        }))
    }
}

#[cfg(test)]
#[path = "conversion_tests.rs"]
mod tests;
