//! In-memory inner-product index over L2-normalized question embeddings.
//!
//! Each entry keeps the question and tag it was embedded from, so a hit
//! carries its label with it.

/// An entry in the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// The training question that was embedded
    pub question: String,
    /// Tag of the question
    pub tag: String,
    /// Unit-length embedding
    pub embedding: Vec<f32>,
}

/// Flat vector index, built once and searched by exhaustive inner product.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimensions: usize,
}

/// Search hit from the vector index.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor<'a> {
    /// Position of the entry in insertion order
    pub position: usize,
    /// Inner product of the unit query and entry vectors
    pub score: f32,
    pub entry: &'a IndexEntry,
}

/// Scale `v` to unit length in place.
pub fn normalize(v: &mut [f32]) -> Result<(), IndexError> {
    let norm = l2_norm(v);
    if norm < f32::EPSILON {
        return Err(IndexError::ZeroNormVector);
    }
    v.iter_mut().for_each(|x| *x /= norm);
    Ok(())
}

/// Compute L2 norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(a, b)| a * b).sum()
}

impl VectorIndex {
    /// Create a new empty vector index with specified dimensions.
    #[cfg(test)]
    pub fn new(dimensions: usize) -> Self {
        Self {
            entries: Vec::new(),
            dimensions,
        }
    }

    /// Create an index with pre-allocated capacity.
    pub fn with_capacity(dimensions: usize, capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            dimensions,
        }
    }

    /// Get the expected embedding dimensions.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Get the number of entries in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty.
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, position: usize) -> Option<&IndexEntry> {
        self.entries.get(position)
    }

    /// Append an entry, normalizing its embedding.
    ///
    /// Returns an error if the embedding has the wrong length or zero norm.
    pub fn insert(
        &mut self,
        question: impl Into<String>,
        tag: impl Into<String>,
        mut embedding: Vec<f32>,
    ) -> Result<usize, IndexError> {
        if embedding.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: embedding.len(),
            });
        }

        normalize(&mut embedding)?;

        self.entries.push(IndexEntry {
            question: question.into(),
            tag: tag.into(),
            embedding,
        });

        Ok(self.entries.len() - 1)
    }

    /// Build an index from `(question, tag, embedding)` triples.
    pub fn build<I>(dimensions: usize, entries: I) -> Result<Self, IndexError>
    where
        I: IntoIterator<Item = (String, String, Vec<f32>)>,
    {
        let entries = entries.into_iter();
        let mut index = Self::with_capacity(dimensions, entries.size_hint().0);
        for (question, tag, embedding) in entries {
            index.insert(question, tag, embedding)?;
        }
        Ok(index)
    }

    /// Top `top_k` entries by inner product with the normalized `query`.
    ///
    /// Results are sorted by score descending. Equal scores keep insertion
    /// order, which callers should not depend on.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Neighbor<'_>>, IndexError> {
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        let mut query = query.to_vec();
        normalize(&mut query)?;

        let mut results: Vec<Neighbor<'_>> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| Neighbor {
                position,
                score: inner_product(&query, &entry.embedding),
                entry,
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);

        Ok(results)
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot store or search with zero-norm vector")]
    ZeroNormVector,
}
