//! Semantic FAQ lookup.
//!
//! # Architecture
//!
//! - `embeddings`: Wraps fastembed behind the `Encoder` trait
//! - `index`: In-memory inner-product index over normalized vectors
//! - `service`: Builds the index at startup and answers queries

pub mod embeddings;
mod index;
mod service;

#[cfg(test)]
pub use embeddings::EmbeddingError;
pub use embeddings::{EmbeddingModel, Encoder};
#[cfg(test)]
pub use index::normalize;
pub use service::{SearchError, SearchResult, SearchService};

/// Default embedding model name (multilingual, 1024 dimensions)
pub const DEFAULT_MODEL: &str = "multilingual-e5-large";
