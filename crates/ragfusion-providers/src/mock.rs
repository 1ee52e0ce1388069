//! Deterministic in-process providers for tests and local runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use ragfusion_core::{
    CompletionProvider, EmbeddingProvider, FusionError, IndexRecord, RankedList, Result,
    ScoredItem, VectorIndex, TEXT_KEY,
};

/// Mock embedder for testing.
pub struct MockEmbedder {
    dimension: usize,
    max_tokens: usize,
}

impl MockEmbedder {
    /// Create a new mock embedder with default settings.
    pub fn new() -> Self {
        Self {
            dimension: 768,
            max_tokens: 8192,
        }
    }

    /// Create a mock embedder with custom settings.
    pub fn with_config(dimension: usize, max_tokens: usize) -> Self {
        Self {
            dimension,
            max_tokens,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.len() / 4 + 1 > self.max_tokens {
            return Err(FusionError::provider(
                "mock",
                format!("text exceeds {} tokens", self.max_tokens),
            ));
        }

        // Deterministic embedding based on text hash
        let hash = text
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut embedding = vec![0.0f32; self.dimension];
        for (i, v) in embedding.iter_mut().enumerate() {
            *v = (hash.wrapping_mul(i as u64 + 1) % 1000) as f32 / 1000.0 - 0.5;
        }
        // L2 normalize
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }
        Ok(embedding)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Completion provider returning a fixed response.
pub struct MockCompleter {
    response: String,
    prompts: Mutex<Vec<String>>,
}

impl MockCompleter {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionProvider for MockCompleter {
    async fn complete(&self, prompt: &str, _temperature: f32) -> Result<String> {
        self.prompts
            .lock()
            .map_err(|_| FusionError::internal("mock completer lock poisoned"))?
            .push(prompt.to_string());
        Ok(self.response.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// In-memory vector index ranking records by cosine similarity.
pub struct MemoryIndex {
    name: String,
    records: Mutex<Vec<IndexRecord>>,
    upsert_calls: AtomicUsize,
}

impl MemoryIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Mutex::new(Vec::new()),
            upsert_calls: AtomicUsize::new(0),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of upsert calls received.
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<IndexRecord>>> {
        self.records
            .lock()
            .map_err(|_| FusionError::internal("memory index lock poisoned"))
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, records: &[IndexRecord]) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let mut stored = self.lock()?;

        for record in records {
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }

        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: u32) -> Result<RankedList> {
        let stored = self.lock()?;

        let mut scored: Vec<(f32, &IndexRecord)> = stored
            .iter()
            .map(|record| (cosine_similarity(vector, &record.values), record))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(top_k as usize)
            .map(|(score, record)| ScoredItem {
                id: record.id.clone(),
                score,
                content: record
                    .metadata
                    .get(TEXT_KEY)
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                metadata: record.metadata.clone(),
            })
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
