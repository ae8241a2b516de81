use std::io::Read;
use std::path::Path;

use concierge_core::config::CorpusConfig;
use concierge_core::error::{ConciergeError, Result};
use concierge_core::types::QaPair;
use tracing::{info, warn};

/// Read question/answer pairs from a CSV file with named header columns.
pub fn load_corpus(config: &CorpusConfig) -> Result<Vec<QaPair>> {
    let file = std::fs::File::open(Path::new(&config.path))
        .map_err(|e| ConciergeError::Corpus(format!("failed to open {}: {e}", config.path)))?;
    let pairs = parse_corpus(file, &config.question_column, &config.answer_column)?;
    info!("[corpus] loaded {} pair(s) from {}", pairs.len(), config.path);
    Ok(pairs)
}

/// Parse corpus CSV. Rows without a question are skipped; an empty result is `EmptyIndex`.
pub fn parse_corpus<R: Read>(reader: R, question_column: &str, answer_column: &str) -> Result<Vec<QaPair>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| ConciergeError::Corpus(format!("failed to read header row: {e}")))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').trim() == name.trim())
            .ok_or_else(|| ConciergeError::Corpus(format!("missing column '{name}'")))
    };
    let q_idx = column(question_column)?;
    let a_idx = column(answer_column)?;

    let mut pairs = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ConciergeError::Corpus(format!("malformed row: {e}")))?;
        let question = record.get(q_idx).unwrap_or("").trim();
        let answer = record.get(a_idx).unwrap_or("").trim();
        if question.is_empty() {
            continue;
        }
        if answer.is_empty() {
            warn!("[corpus] row {} has a question but no answer", row + 2);
        }
        pairs.push(QaPair::new(question, answer));
    }

    if pairs.is_empty() {
        return Err(ConciergeError::EmptyIndex);
    }
    Ok(pairs)
}
