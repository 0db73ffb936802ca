//! CSV corpus loading.
//!
//! Corpus files are headerless. Each row carries the question stem and the
//! four options with the correct option first; few-shot rows append the
//! worked reasoning as a sixth field. Every question is shuffled as it is
//! loaded, so the on-disk convention never shows through in prompts.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use rand::Rng;

use virobench_core::error::{CorpusError, Result};

use crate::question::Question;

/// Stem, four options, worked reasoning.
const FEW_SHOT_FIELDS: usize = 6;

/// Stem, four options.
const TEST_FIELDS: usize = 5;

/// Load few-shot examples from a CSV file, shuffling each row's options.
pub fn load_few_shot<P: AsRef<Path>, R: Rng + ?Sized>(
    path: P,
    rng: &mut R,
) -> Result<Vec<Question>> {
    let file = File::open(path).map_err(CorpusError::from)?;
    few_shot_from_reader(file, rng)
}

/// Load test questions from a CSV file, shuffling each row's options.
pub fn load_test_set<P: AsRef<Path>, R: Rng + ?Sized>(
    path: P,
    rng: &mut R,
) -> Result<Vec<Question>> {
    let file = File::open(path).map_err(CorpusError::from)?;
    test_set_from_reader(file, rng)
}

/// Read few-shot examples from any CSV source.
pub fn few_shot_from_reader<S: Read, R: Rng + ?Sized>(
    source: S,
    rng: &mut R,
) -> Result<Vec<Question>> {
    read_questions(source, true, rng)
}

/// Read test questions from any CSV source.
pub fn test_set_from_reader<S: Read, R: Rng + ?Sized>(
    source: S,
    rng: &mut R,
) -> Result<Vec<Question>> {
    read_questions(source, false, rng)
}

fn read_questions<S: Read, R: Rng + ?Sized>(
    source: S,
    with_reason: bool,
    rng: &mut R,
) -> Result<Vec<Question>> {
    let required = if with_reason {
        FEW_SHOT_FIELDS
    } else {
        TEST_FIELDS
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(source);

    let mut questions = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| CorpusError::Record {
            line: e.position().map_or(0, |p| p.line()),
            reason: e.to_string(),
        })?;
        let line = record.position().map_or(0, |p| p.line());

        if record.len() < required {
            return Err(CorpusError::Record {
                line,
                reason: format!("expected at least {required} fields, got {}", record.len()),
            }
            .into());
        }

        let choices: Vec<String> = (1..5).map(|i| record[i].to_string()).collect();
        // The raw row always lists the correct option first.
        let mut question =
            Question::new(&record[0], choices, 0).map_err(|e| CorpusError::Record {
                line,
                reason: e.to_string(),
            })?;
        if with_reason {
            question = question.with_reason(&record[5]);
        }
        questions.push(question.permuted(rng));
    }
    Ok(questions)
}
