mod eval;
mod search;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;

use crate::records::{QaRecord, TagAnswers};
use crate::semantic::{EmbeddingError, Encoder, SearchService};

/// Bag-of-words encoder: every lowercase word is hashed onto one of
/// `dimensions` axes. Deterministic, so identical text gives identical
/// vectors, and texts sharing words always score above zero.
pub struct WordHashEncoder {
    dimensions: usize,
}

impl WordHashEncoder {
    pub fn new(dimensions: usize) -> Self {
        WordHashEncoder { dimensions }
    }
}

impl Encoder for WordHashEncoder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0; self.dimensions];
                for word in text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                {
                    let mut hasher = DefaultHasher::new();
                    word.to_lowercase().hash(&mut hasher);
                    vector[(hasher.finish() % self.dimensions as u64) as usize] += 1.0;
                }
                vector
            })
            .collect())
    }
}

pub fn record(question: &str, tag: &str) -> QaRecord {
    QaRecord {
        question: question.to_string(),
        tag: tag.to_string(),
        answer: None,
    }
}

/// Small FAQ used across the scenario tests.
pub fn create_service() -> SearchService {
    let training = vec![
        record("reset password", "pw_reset"),
        record("forgot my password", "pw_reset"),
        record("what are your opening hours", "hours"),
        record("when do you open", "hours"),
        record("cancel my subscription", "cancel"),
    ];
    let answers: TagAnswers = [
        ("pw_reset", "Visit account settings."),
        ("hours", "We are open 9 to 5."),
    ]
    .into_iter()
    .collect();

    SearchService::build(Arc::new(WordHashEncoder::new(256)), &training, answers)
        .expect("failed to build search service")
}

pub fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("failed to write fixture");
    path
}
