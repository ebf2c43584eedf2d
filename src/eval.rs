//! Retrieval accuracy evaluation against a running search endpoint.
//!
//! Each labelled test row is sent as a query; the top prediction's tag and
//! answer are compared to the expected ones. Every row lands in the full
//! trace log, mismatches and request failures also in the mismatch log.

use std::{fmt::Display, io::Write, thread::sleep, time::Duration};

use anyhow::Context;

use crate::{
    config::{AnswerMatch, EvaluationConfig},
    records::QaRecord,
    semantic::SearchResult,
    web::{SearchRequest, SearchResponse},
};

const RULE_WIDTH: usize = 60;

/// Source of predictions for a query.
pub trait SearchClient {
    fn search(&self, query: &str, k: i64) -> anyhow::Result<Vec<SearchResult>>;
}

/// Posts queries to the search endpoint of `faq serve`.
pub struct HttpSearchClient {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpSearchClient {
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;

        Ok(HttpSearchClient {
            client,
            url: url.to_string(),
        })
    }
}

impl SearchClient for HttpSearchClient {
    fn search(&self, query: &str, k: i64) -> anyhow::Result<Vec<SearchResult>> {
        let response: SearchResponse = self
            .client
            .post(&self.url)
            .json(&SearchRequest {
                query: query.to_string(),
                k,
            })
            .send()?
            .error_for_status()?
            .json()?;

        Ok(response.results)
    }
}

/// A test row with the values the prediction is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalCase {
    pub question: String,
    pub expected_tag: String,
    pub expected_answer: String,
}

impl From<QaRecord> for EvalCase {
    fn from(record: QaRecord) -> Self {
        EvalCase {
            question: record.question,
            expected_tag: record.tag,
            expected_answer: record.answer.unwrap_or_default(),
        }
    }
}

/// What happened to one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Scored {
        predicted_tag: String,
        predicted_answer: String,
        score: f32,
        tag_match: bool,
        answer_match: bool,
    },
    /// The endpoint answered with no results.
    Empty,
    /// Transport or decoding failure.
    Failed(String),
}

impl Outcome {
    pub fn tag_match(&self) -> bool {
        matches!(self, Outcome::Scored { tag_match: true, .. })
    }

    pub fn answer_match(&self) -> bool {
        matches!(self, Outcome::Scored { answer_match: true, .. })
    }
}

/// Aggregate counters of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalReport {
    pub total: usize,
    pub tag_matches: usize,
    pub answer_matches: usize,
    pub failures: usize,
}

impl EvalReport {
    pub fn tag_accuracy(&self) -> f64 {
        percent(self.tag_matches, self.total)
    }

    pub fn answer_accuracy(&self) -> f64 {
        percent(self.answer_matches, self.total)
    }
}

fn percent(hits: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64 * 100.0
    }
}

impl Display for EvalReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "\nTotal: {}\nTag Accuracy: {}/{} = {:.2}%\nAnswer Accuracy: {}/{} = {:.2}%",
            self.total,
            self.tag_matches,
            self.total,
            self.tag_accuracy(),
            self.answer_matches,
            self.total,
            self.answer_accuracy()
        )
    }
}

/// Compare two answers under `policy`. Both sides are trimmed first.
pub fn answers_match(policy: AnswerMatch, predicted: &str, expected: &str) -> bool {
    match policy {
        AnswerMatch::Exact => predicted.trim() == expected.trim(),
        AnswerMatch::Normalized => normalize_answer(predicted) == normalize_answer(expected),
    }
}

fn normalize_answer(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_ascii_punctuation())
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Timestamped, human-readable trace sinks.
pub struct RunLog<W: Write> {
    trace: W,
    mismatches: W,
}

#[derive(Debug, Clone, Copy)]
enum Level {
    Info,
    Warning,
    Error,
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Info => write!(f, "INFO"),
            Level::Warning => write!(f, "WARNING"),
            Level::Error => write!(f, "ERROR"),
        }
    }
}

impl RunLog<std::io::BufWriter<std::fs::File>> {
    /// Open (append) the full trace and mismatch log files.
    pub fn open(config: &EvaluationConfig) -> anyhow::Result<Self> {
        let open = |path: &std::path::Path| -> anyhow::Result<_> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log {}", path.display()))?;
            Ok(std::io::BufWriter::new(file))
        };

        Ok(RunLog {
            trace: open(&config.log_path)?,
            mismatches: open(&config.mismatch_log_path)?,
        })
    }
}

impl<W: Write> RunLog<W> {
    #[cfg(test)]
    pub fn new(trace: W, mismatches: W) -> Self {
        RunLog { trace, mismatches }
    }

    fn line(level: Level, message: &str) -> String {
        format!(
            "[{}] {} {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            level,
            message
        )
    }

    fn trace(&mut self, level: Level, message: &str) -> std::io::Result<()> {
        self.trace.write_all(Self::line(level, message).as_bytes())
    }

    fn mismatch(&mut self, level: Level, message: &str) -> std::io::Result<()> {
        self.mismatches.write_all(Self::line(level, message).as_bytes())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.trace.flush()?;
        self.mismatches.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> (W, W) {
        (self.trace, self.mismatches)
    }
}

#[derive(Debug, Clone)]
pub struct EvalOptions {
    pub k: i64,
    pub pause: Duration,
    pub answer_match: AnswerMatch,
}

impl From<&EvaluationConfig> for EvalOptions {
    fn from(config: &EvaluationConfig) -> Self {
        EvalOptions {
            k: config.k,
            pause: Duration::from_millis(config.pause_ms),
            answer_match: config.answer_match,
        }
    }
}

pub struct Evaluator<C, W: Write> {
    client: C,
    log: RunLog<W>,
    options: EvalOptions,
}

impl<C: SearchClient, W: Write> Evaluator<C, W> {
    pub fn new(client: C, log: RunLog<W>, options: EvalOptions) -> Self {
        Evaluator {
            client,
            log,
            options,
        }
    }

    /// Score one case against the client's top prediction.
    pub fn evaluate_case(&self, case: &EvalCase) -> Outcome {
        let results = match self.client.search(&case.question, self.options.k) {
            Ok(results) => results,
            Err(err) => return Outcome::Failed(format!("{err:#}")),
        };

        let Some(top) = results.into_iter().next() else {
            return Outcome::Empty;
        };

        let predicted_tag = top.tag.trim().to_string();
        let predicted_answer = top.answer.trim().to_string();
        let tag_match = predicted_tag == case.expected_tag.trim();
        let answer_match = answers_match(
            self.options.answer_match,
            &predicted_answer,
            &case.expected_answer,
        );

        Outcome::Scored {
            predicted_tag,
            predicted_answer,
            score: top.score,
            tag_match,
            answer_match,
        }
    }

    /// Evaluate every case in order. A failing row never aborts the run.
    pub fn run(&mut self, cases: &[EvalCase]) -> anyhow::Result<EvalReport> {
        let total = cases.len();
        let mut report = EvalReport {
            total,
            ..Default::default()
        };

        for (idx, case) in cases.iter().enumerate() {
            if idx > 0 && !self.options.pause.is_zero() {
                sleep(self.options.pause);
            }

            let id = idx + 1;
            let outcome = self.evaluate_case(case);

            if outcome.tag_match() {
                report.tag_matches += 1;
            }
            if outcome.answer_match() {
                report.answer_matches += 1;
            }

            self.record(id, total, case, &outcome)?;
            if matches!(outcome, Outcome::Failed(_)) {
                report.failures += 1;
            }
        }

        let summary = report.to_string();
        log::info!("{summary}");
        self.log.trace(Level::Info, &summary)?;
        self.log.flush()?;

        Ok(report)
    }

    fn record(
        &mut self,
        id: usize,
        total: usize,
        case: &EvalCase,
        outcome: &Outcome,
    ) -> anyhow::Result<()> {
        let rule = "=".repeat(RULE_WIDTH);

        match outcome {
            Outcome::Scored {
                predicted_tag,
                predicted_answer,
                score,
                tag_match,
                answer_match,
            } => {
                let entry = format!(
                    "\n[ID: {id}/{total}]\nQuestion: {}\nExpected Tag: {}\nPredicted Tag: {predicted_tag} | Tag Match: {tag_match}\nExpected Answer: {}\nPredicted Answer: {predicted_answer} | Answer Match: {answer_match}\nScore: {score:.3}\n{rule}",
                    case.question, case.expected_tag, case.expected_answer,
                );
                log::info!("{entry}");
                self.log.trace(Level::Info, &entry)?;

                if !tag_match || !answer_match {
                    let entry = format!(
                        "\n[MISMATCH] [ID: {id}/{total}]\nQuestion: {}\nExpected Tag: {} | Predicted: {predicted_tag}\nExpected Answer: {}\nPredicted Answer: {predicted_answer}\nScore: {score:.3}\n{rule}",
                        case.question, case.expected_tag, case.expected_answer,
                    );
                    self.log.mismatch(Level::Info, &entry)?;
                }
            }
            Outcome::Empty => {
                let entry = format!("[{id}] Empty 'results' for question: {}", case.question);
                log::warn!("{entry}");
                self.log.trace(Level::Warning, &entry)?;
                self.log.mismatch(
                    Level::Warning,
                    &format!(
                        "\n[MISMATCH] [ID: {id}/{total}]\nQuestion: {}\nExpected Tag: {} | Predicted: \nExpected Answer: {}\nPredicted Answer: \nScore: 0.000\n{rule}",
                        case.question, case.expected_tag, case.expected_answer,
                    ),
                )?;
            }
            Outcome::Failed(err) => {
                log::error!("[{id}] Request failed for question: {}: {err}", case.question);
                let entry = format!(
                    "[ERROR] [{id}] Question: {}\nError: {err}\n{rule}",
                    case.question
                );
                self.log.trace(Level::Error, &entry)?;
                self.log.mismatch(Level::Error, &entry)?;
            }
        }

        Ok(())
    }

    #[cfg(test)]
    pub fn into_log(self) -> RunLog<W> {
        self.log
    }
}
