use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use virobench_core::error::{QuestionError, Result};

use crate::harness::Harness;
use crate::question::Question;

/// Outcome of one test item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Incorrect,
    /// The response carried no recognizable answer letter.
    Invalid,
}

/// Scored record of one test item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResult {
    pub index: usize,
    pub question: String,
    pub expected: String,
    pub answer: String,
    pub verdict: Verdict,
    pub latency_ms: u64,
}

/// Summary report of an evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    pub model: String,
    pub total: usize,
    pub correct: usize,
    pub invalid: usize,
    pub accuracy: f64,
    pub mean_latency_ms: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub results: Vec<ItemResult>,
}

impl EvalReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs the few-shot exam over a test set, one question at a time.
pub struct EvalRunner {
    harness: Harness,
}

impl EvalRunner {
    pub fn new(harness: Harness) -> Self {
        Self { harness }
    }

    pub fn harness(&self) -> &Harness {
        &self.harness
    }

    /// Ask every test question with the same few-shot examples in front of
    /// it and score the answers.
    ///
    /// A response with no recognizable letter marks its item [`Verdict::Invalid`]
    /// and the run continues; transport, auth, and empty-response failures
    /// abort the run.
    pub async fn run(&self, fewshot: &[Question], tests: &[Question]) -> Result<EvalReport> {
        let started_at = Utc::now();
        let mut results = Vec::with_capacity(tests.len());
        let mut correct = 0usize;
        let mut invalid = 0usize;

        for (index, test) in tests.iter().enumerate() {
            let start = Instant::now();
            let content = self.harness.complete(fewshot, test).await?;
            let latency_ms = start.elapsed().as_millis() as u64;
            debug!(index, content = %content, "model response");

            let answer = test.parse_choice(&content);
            let verdict = match test.measure(&content) {
                Ok(1) => {
                    correct += 1;
                    Verdict::Correct
                }
                Ok(_) => Verdict::Incorrect,
                Err(QuestionError::UnrecognizedAnswer { got }) => {
                    warn!(index, answer = %got, "response carried no recognizable answer letter");
                    invalid += 1;
                    Verdict::Invalid
                }
                Err(e) => return Err(e.into()),
            };

            info!(
                index,
                expected = test.correct_letter(),
                answer = %answer,
                verdict = ?verdict,
                latency_ms,
                "scored test item"
            );

            results.push(ItemResult {
                index,
                question: test.text().to_string(),
                expected: test.correct_letter().to_string(),
                answer,
                verdict,
                latency_ms,
            });
        }

        let total = tests.len();
        let accuracy = if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64
        };
        let mean_latency_ms = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| r.latency_ms as f64).sum::<f64>() / results.len() as f64
        };

        Ok(EvalReport {
            model: self.harness.model_name().to_string(),
            total,
            correct,
            invalid,
            accuracy,
            mean_latency_ms,
            started_at,
            completed_at: Utc::now(),
            results,
        })
    }
}
