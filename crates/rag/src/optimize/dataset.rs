//! Labeled examples and CSV loading.

use faqbot_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A question with its reference answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub question: String,
    pub response: String,
}

impl Example {
    pub fn new(question: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            response: response.into(),
        }
    }
}

/// Pair questions with responses.
///
/// # Errors
/// `AppError::Validation` when the two lists differ in length.
pub fn prepare_examples(questions: Vec<String>, responses: Vec<String>) -> AppResult<Vec<Example>> {
    if questions.len() != responses.len() {
        return Err(AppError::Validation(format!(
            "Questions and responses must have same length ({} vs {})",
            questions.len(),
            responses.len()
        )));
    }

    let examples: Vec<Example> = questions
        .into_iter()
        .zip(responses)
        .map(|(question, response)| Example { question, response })
        .collect();

    tracing::info!("Prepared {} examples", examples.len());
    Ok(examples)
}

const QUESTION_COLUMNS: [&str; 2] = ["Question", "question"];
const ANSWER_COLUMNS: [&str; 2] = ["Answer", "answer"];

/// Load examples from a CSV with `Question`/`question` and
/// `Answer`/`answer` columns. Values are trimmed; rows missing either
/// value are skipped.
pub fn load_csv_examples(path: &Path) -> AppResult<Vec<Example>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| AppError::Validation(format!("Failed to open CSV {:?}: {}", path, e)))?;

    let headers = reader
        .headers()
        .map_err(|e| AppError::Validation(format!("Failed to read CSV header {:?}: {}", path, e)))?
        .clone();

    let columns = |names: &[&str]| -> Vec<usize> {
        names
            .iter()
            .filter_map(|name| headers.iter().position(|h| h.trim() == *name))
            .collect()
    };
    let question_cols = columns(&QUESTION_COLUMNS[..]);
    let answer_cols = columns(&ANSWER_COLUMNS[..]);

    if question_cols.is_empty() || answer_cols.is_empty() {
        return Err(AppError::Validation(format!(
            "CSV {:?} needs 'question' and 'answer' columns",
            path
        )));
    }

    let mut examples = Vec::new();
    let mut skipped = 0usize;

    for (n, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            AppError::Validation(format!("Bad CSV row {} in {:?}: {}", n + 2, path, e))
        })?;

        // First non-empty column wins
        let pick = |cols: &[usize]| {
            cols.iter()
                .filter_map(|&i| record.get(i))
                .map(str::trim)
                .find(|v| !v.is_empty())
                .map(str::to_string)
        };

        match (pick(&question_cols[..]), pick(&answer_cols[..])) {
            (Some(question), Some(response)) => examples.push(Example { question, response }),
            _ => skipped += 1,
        }
    }

    tracing::info!(
        "Loaded {} examples from {:?} ({} skipped)",
        examples.len(),
        path,
        skipped
    );

    Ok(examples)
}
