//! SHAPE query file parsing.
//!
//! A query file is a sequence of 4-line blocks:
//!
//! ```text
//! entry_id
//! SEQUENCE
//! reactivity1,reactivity2,...
//! <blank>
//! ```
//!
//! Reactivities that do not parse as numbers are treated as missing (NaN).

use std::collections::BTreeSet;

use serde::Serialize;

/// One query entry.
#[derive(Debug, Clone, Serialize)]
pub struct QueryEntry {
    pub id: String,
    pub sequence: String,
    pub reactivities: Vec<f64>,
}

const VALID_BASES: &str = "ACGTUN";

/// Parse query file content. Blocks with an empty field are skipped.
pub fn parse(content: &str) -> Vec<QueryEntry> {
    let lines: Vec<&str> = content.lines().collect();
    let mut entries = Vec::new();

    for block in lines.chunks(4) {
        if block.len() < 3 {
            break;
        }

        let id = block[0].trim();
        let sequence = block[1].trim();
        let reactivities = block[2].trim();
        if id.is_empty() || sequence.is_empty() || reactivities.is_empty() {
            continue;
        }

        entries.push(QueryEntry {
            id: id.to_string(),
            sequence: sequence.to_string(),
            reactivities: reactivities
                .split(',')
                .map(|r| r.trim().parse::<f64>().unwrap_or(f64::NAN))
                .collect(),
        });
    }

    entries
}

/// Check entries for consistency. Returns one message per problem.
pub fn validate(entries: &[QueryEntry]) -> Vec<String> {
    let mut errors = Vec::new();

    for (i, entry) in entries.iter().enumerate() {
        if entry.id.is_empty() {
            errors.push(format!("Entry {}: Missing or empty ID", i));
        }
        if entry.sequence.is_empty() {
            errors.push(format!("Entry {}: Missing or empty sequence", i));
        }

        let seq_len = entry.sequence.chars().count();
        if seq_len != entry.reactivities.len() {
            errors.push(format!(
                "Entry {} ({}): Sequence length ({}) != reactivity length ({})",
                i,
                entry.id,
                seq_len,
                entry.reactivities.len()
            ));
        }

        let invalid: BTreeSet<char> = entry
            .sequence
            .to_uppercase()
            .chars()
            .filter(|c| !VALID_BASES.contains(*c))
            .collect();
        if !invalid.is_empty() {
            let bases: String = invalid.into_iter().collect();
            errors.push(format!("Entry {} ({}): Invalid bases: {}", i, entry.id, bases));
        }
    }

    errors
}
