//! Search service: the immutable context answering FAQ queries.
//!
//! Built once at startup from the training questions and the tag → answer
//! table; every query encodes, normalizes, takes the single nearest
//! neighbour and resolves its tag to the canonical answer.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::records::{QaRecord, TagAnswers};
use crate::semantic::embeddings::{EmbeddingError, Encoder};
use crate::semantic::index::{IndexError, VectorIndex};

/// Errors that can occur during semantic search operations.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Training set is empty")]
    EmptyTrainingSet,
}

/// One answer to a query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub score: f32,
}

pub struct SearchService {
    encoder: Arc<dyn Encoder>,
    index: VectorIndex,
    answers: TagAnswers,
}

impl SearchService {
    /// Encode every training question and build the index.
    pub fn build(
        encoder: Arc<dyn Encoder>,
        training: &[QaRecord],
        answers: TagAnswers,
    ) -> Result<Self, SearchError> {
        if training.is_empty() {
            return Err(SearchError::EmptyTrainingSet);
        }

        let now = Instant::now();
        let questions: Vec<String> = training.iter().map(|r| r.question.clone()).collect();
        let embeddings = encoder.encode(&questions)?;
        if embeddings.len() != training.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: training.len(),
                got: embeddings.len(),
            }
            .into());
        }

        let index = VectorIndex::build(
            encoder.dimensions(),
            training
                .iter()
                .zip(embeddings)
                .map(|(record, embedding)| (record.question.clone(), record.tag.clone(), embedding)),
        )?;

        let unmapped = index
            .iter()
            .filter(|entry| answers.resolve(&entry.tag).is_none())
            .count();
        if unmapped > 0 {
            log::warn!("{unmapped} training questions have a tag without an answer");
        }

        log::info!(
            "indexed {} questions ({} dimensions) in {}ms",
            index.len(),
            index.dimensions(),
            now.elapsed().as_millis()
        );

        Ok(Self {
            encoder,
            index,
            answers,
        })
    }

    /// Answer `query`.
    ///
    /// `k` is accepted for API compatibility but only the best match is
    /// returned, so the result holds exactly one element.
    pub fn search(&self, query: &str, k: i64) -> Result<Vec<SearchResult>, SearchError> {
        log::debug!("search query={query:?} k={k}");

        let mut vectors = self.encoder.encode(&[query.to_string()])?;
        let query_vector = vectors.pop().ok_or(EmbeddingError::CountMismatch {
            expected: 1,
            got: 0,
        })?;

        let results = self
            .index
            .search(&query_vector, 1)?
            .into_iter()
            .map(|hit| {
                log::debug!(
                    "nearest #{} {:?} tag={} score={:.3}",
                    hit.position,
                    hit.entry.question,
                    hit.entry.tag,
                    hit.score
                );

                SearchResult {
                    tag: hit.entry.tag.clone(),
                    answer: self
                        .answers
                        .resolve(&hit.entry.tag)
                        .unwrap_or_default()
                        .to_string(),
                    score: hit.score,
                }
            })
            .collect();

        Ok(results)
    }

    /// Get the number of indexed entries.
    pub fn indexed_count(&self) -> usize {
        self.index.len()
    }

    pub fn dimensions(&self) -> usize {
        self.index.dimensions()
    }
}
