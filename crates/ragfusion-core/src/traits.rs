//! Core traits defining the interfaces to remote collaborators.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{IndexRecord, RankedList};

/// Text embedding provider.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Provider name used in logs and errors.
    fn name(&self) -> &str;
}

/// Chat completion provider, used to generate query variants.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Complete a single user prompt.
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String>;

    /// Provider name used in logs and errors.
    fn name(&self) -> &str;
}

/// Remote vector index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace records by id.
    async fn upsert(&self, records: &[IndexRecord]) -> Result<()>;

    /// Return the `top_k` nearest records, best first.
    async fn query(&self, vector: &[f32], top_k: u32) -> Result<RankedList>;

    /// Index name used in logs and errors.
    fn name(&self) -> &str;
}
