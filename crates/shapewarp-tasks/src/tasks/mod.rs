//! Built-in task function implementations.

mod conversion;
mod reactivity;
mod search;

pub use conversion::{
    analyze, encode_binary, parse_database, render_report, Database, DatabaseAnalysis,
    DatabaseConversionTask, OutputFormat, Reactivity, Transcript, BINARY_MAGIC,
};
pub use reactivity::{ReactivityAnalysisTask, ReactivityParams};
pub use search::{SearchHit, SearchParams, ShapeSearchTask, MAX_HITS_PER_QUERY};
