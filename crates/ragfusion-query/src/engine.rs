//! Query engine for multi-query fused search.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::{join_all, try_join_all};
use tracing::{debug, info, warn};

use ragfusion_core::{
    CompletionProvider, EmbeddingProvider, FusionError, FusionResults, IndexRecord, NewDocument,
    RankedList, Result, SearchConfig, UploadSummary, VariantFailure, VectorIndex,
};

use crate::expansion::QueryExpander;
use crate::fusion::{reciprocal_rank_fusion, DEFAULT_RRF_K};

/// Default timeout applied to each remote call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for search queries.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Results fetched from the index per query variant.
    pub top_k: u32,

    /// Number of generated query variants.
    pub num_queries: usize,

    /// RRF constant k.
    pub rrf_k: u32,

    /// Sampling temperature for query generation.
    pub temperature: f32,

    /// Maximum number of fused results to return.
    pub result_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            num_queries: 4,
            rrf_k: DEFAULT_RRF_K,
            temperature: 0.0,
            result_limit: 10,
        }
    }
}

impl From<&SearchConfig> for QueryConfig {
    fn from(config: &SearchConfig) -> Self {
        Self {
            top_k: config.top_k,
            num_queries: config.num_queries,
            rrf_k: config.rrf_k,
            temperature: config.temperature,
            result_limit: config.result_limit,
        }
    }
}

/// RAG-Fusion query engine.
///
/// Expands a query into several variants, searches the vector index once
/// per variant concurrently, and fuses the ranked lists with Reciprocal
/// Rank Fusion (RRF).
pub struct FusionEngine<E, C, V> {
    /// Embedding provider.
    embedder: Arc<E>,

    /// Completion provider for query generation.
    completer: Arc<C>,

    /// Vector index.
    index: Arc<V>,

    /// Timeout for each remote call.
    timeout: Duration,
}

impl<E, C, V> FusionEngine<E, C, V>
where
    E: EmbeddingProvider,
    C: CompletionProvider,
    V: VectorIndex,
{
    /// Create a new engine.
    pub fn new(embedder: Arc<E>, completer: Arc<C>, index: Arc<V>) -> Self {
        Self {
            embedder,
            completer,
            index,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the timeout applied to each remote call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ask the completion provider for alternative queries.
    pub async fn generate_queries(&self, query: &str, config: &QueryConfig) -> Result<Vec<String>> {
        let expander = QueryExpander::new(config.num_queries, config.temperature);
        self.timed(
            "generate queries",
            expander.expand(self.completer.as_ref(), query),
        )
        .await
    }

    /// Embed a query and search the index with it.
    pub async fn vector_search(&self, query: &str, top_k: u32) -> Result<RankedList> {
        let embedding = self.timed("embed query", self.embedder.embed(query)).await?;
        self.timed("vector search", self.index.query(&embedding, top_k))
            .await
    }

    /// Perform a fused search for `query`.
    ///
    /// The original query is always searched first, followed by the
    /// generated variants in generation order. Any failed variant fails the
    /// whole search.
    pub async fn search_with_query(&self, query: &str, config: QueryConfig) -> Result<FusionResults> {
        let start = Instant::now();

        let query = query.trim();
        if query.is_empty() {
            return Err(FusionError::invalid_argument("query must not be empty"));
        }

        info!("Searching for: {:?}", query);

        let generated = self.generate_queries(query, &config).await?;

        let mut variants = Vec::with_capacity(generated.len() + 1);
        variants.push(query.to_string());
        variants.extend(generated);

        debug!("Searching {} query variants", variants.len());

        // join_all preserves input order
        let outcomes = join_all(
            variants
                .iter()
                .map(|variant| self.vector_search(variant, config.top_k)),
        )
        .await;

        let mut result_sets = Vec::with_capacity(variants.len());
        let mut failures = Vec::new();

        for (variant, outcome) in variants.iter().zip(outcomes) {
            match outcome {
                Ok(results) => {
                    debug!("Variant {:?} returned {} results", variant, results.len());
                    result_sets.push(results);
                }
                Err(error) => {
                    warn!("Variant {:?} failed: {}", variant, error);
                    failures.push(VariantFailure {
                        query: variant.clone(),
                        error,
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(FusionError::FanOut {
                failures,
                total: variants.len(),
            });
        }

        let mut results = reciprocal_rank_fusion(result_sets, config.rrf_k);
        results.truncate(config.result_limit);

        let latency_ms = start.elapsed().as_millis() as u64;

        info!(
            "Search completed in {}ms, returned {} results",
            latency_ms,
            results.len()
        );

        Ok(FusionResults {
            query: query.to_string(),
            variants,
            total_results: results.len(),
            latency_ms,
            results,
        })
    }

    /// Embed documents concurrently and write them in one batched upsert.
    ///
    /// Empty documents are skipped. A document without an explicit id is
    /// also skipped when an earlier id-less document has the same text;
    /// documents with their own id are always written.
    pub async fn upload_documents(&self, documents: Vec<NewDocument>) -> Result<UploadSummary> {
        let submitted = documents.len();

        let mut seen_hashes: HashSet<String> = HashSet::new();
        let documents: Vec<NewDocument> = documents
            .into_iter()
            .filter(|doc| !doc.text.trim().is_empty())
            .filter(|doc| doc.id.is_some() || seen_hashes.insert(doc.content_hash()))
            .collect();
        let skipped = submitted - documents.len();

        if documents.is_empty() {
            info!("No documents to upload ({} skipped)", skipped);
            return Ok(UploadSummary {
                submitted,
                upserted: 0,
                skipped,
            });
        }

        let embeddings = try_join_all(
            documents
                .iter()
                .map(|doc| self.timed("embed document", self.embedder.embed(&doc.text))),
        )
        .await?;

        let records: Vec<IndexRecord> = documents
            .into_iter()
            .zip(embeddings)
            .map(|(doc, values)| doc.into_record(values))
            .collect();

        self.timed("upsert", self.index.upsert(&records)).await?;

        info!(
            "Upserted {} records to {} ({} skipped)",
            records.len(),
            self.index.name(),
            skipped
        );

        Ok(UploadSummary {
            submitted,
            upserted: records.len(),
            skipped,
        })
    }

    /// Run a remote call under the engine timeout.
    async fn timed<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(FusionError::timeout(
                operation,
                self.timeout.as_millis() as u64,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use ragfusion_core::ScoredItem;
    use ragfusion_providers::{MemoryIndex, MockCompleter, MockEmbedder};

    /// Embedder that fails for texts containing "bad".
    struct SelectiveEmbedder {
        inner: MockEmbedder,
    }

    #[async_trait]
    impl EmbeddingProvider for SelectiveEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("bad") {
                return Err(FusionError::provider("selective", "refused"));
            }
            self.inner.embed(text).await
        }

        fn name(&self) -> &str {
            "selective"
        }
    }

    /// Embedder that never answers in time.
    struct StalledEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StalledEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![0.0; 4])
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }

    /// Embedder that takes one second per call.
    struct SlowEmbedder {
        inner: MockEmbedder,
        calls: AtomicUsize,
    }

    impl SlowEmbedder {
        fn new() -> Self {
            Self {
                inner: MockEmbedder::with_config(64, 512),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for SlowEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(1)).await;
            self.inner.embed(text).await
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn engine(completion: &str) -> FusionEngine<MockEmbedder, MockCompleter, MemoryIndex> {
        FusionEngine::new(
            Arc::new(MockEmbedder::with_config(64, 512)),
            Arc::new(MockCompleter::new(completion)),
            Arc::new(MemoryIndex::new("test")),
        )
    }

    fn docs() -> Vec<NewDocument> {
        vec![
            NewDocument::new("alpha").with_id("a"),
            NewDocument::new("beta").with_id("b"),
            NewDocument::new("gamma").with_id("g"),
        ]
    }

    #[test]
    fn test_query_config_default() {
        let config = QueryConfig::default();
        assert_eq!(config.top_k, 5);
        assert_eq!(config.rrf_k, 60);
        assert_eq!(config.num_queries, 4);
    }

    #[test]
    fn test_query_config_from_search_config() {
        let search = SearchConfig {
            top_k: 7,
            rrf_k: 20,
            ..SearchConfig::default()
        };
        let config = QueryConfig::from(&search);
        assert_eq!(config.top_k, 7);
        assert_eq!(config.rrf_k, 20);
        assert_eq!(config.result_limit, search.result_limit);
    }

    #[tokio::test]
    async fn test_search_orders_variants_and_fuses() {
        let engine = engine("beta\ngamma");
        engine.upload_documents(docs()).await.unwrap();

        let config = QueryConfig {
            top_k: 1,
            ..QueryConfig::default()
        };
        let results = engine.search_with_query("alpha", config).await.unwrap();

        assert_eq!(results.query, "alpha");
        assert_eq!(results.variants, vec!["alpha", "beta", "gamma"]);
        assert_eq!(results.total_results, 3);

        // Each variant's list holds only its exact match, so all scores tie
        // and first-seen order decides.
        let ids: Vec<&str> = results.results.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["a", "b", "g"]);
        assert_eq!(results.results[0].item.content, "alpha");
    }

    #[tokio::test]
    async fn test_search_without_generated_queries() {
        let completer = Arc::new(MockCompleter::new("beta"));
        let engine = FusionEngine::new(
            Arc::new(MockEmbedder::with_config(64, 512)),
            completer.clone(),
            Arc::new(MemoryIndex::new("test")),
        );
        engine.upload_documents(docs()).await.unwrap();

        let config = QueryConfig {
            top_k: 3,
            num_queries: 0,
            ..QueryConfig::default()
        };
        let results = engine.search_with_query("alpha", config).await.unwrap();

        assert_eq!(results.variants, vec!["alpha"]);
        assert_eq!(results.results.len(), 3);
        assert_eq!(results.results[0].id(), "a");
        assert!(completer.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_search_truncates_to_result_limit() {
        let engine = engine("beta\ngamma");
        engine.upload_documents(docs()).await.unwrap();

        let config = QueryConfig {
            top_k: 3,
            result_limit: 2,
            ..QueryConfig::default()
        };
        let results = engine.search_with_query("alpha", config).await.unwrap();

        assert_eq!(results.results.len(), 2);
        assert_eq!(results.total_results, 2);
    }

    #[tokio::test]
    async fn test_search_rejects_empty_query() {
        let engine = engine("unused");
        let err = engine
            .search_with_query("   ", QueryConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_search_failed_variants_fail_whole_search() {
        let engine = FusionEngine::new(
            Arc::new(SelectiveEmbedder {
                inner: MockEmbedder::with_config(16, 512),
            }),
            Arc::new(MockCompleter::new("good one\nbad two\nbad three")),
            Arc::new(MemoryIndex::new("test")),
        );

        let err = engine
            .search_with_query("fine query", QueryConfig::default())
            .await
            .unwrap_err();

        match err {
            FusionError::FanOut { failures, total } => {
                assert_eq!(total, 4);
                let failed: Vec<&str> = failures.iter().map(|f| f.query.as_str()).collect();
                assert_eq!(failed, vec!["bad two", "bad three"]);
                assert_eq!(failures[0].error.error_code(), "PROVIDER_ERROR");
            }
            other => panic!("expected fan-out error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let engine = FusionEngine::new(
            Arc::new(StalledEmbedder),
            Arc::new(MockCompleter::new("")),
            Arc::new(MemoryIndex::new("test")),
        )
        .with_timeout(Duration::from_millis(50));

        let err = engine.vector_search("anything", 5).await.unwrap_err();
        assert_eq!(err.error_code(), "TIMEOUT");
        assert!(err.to_string().contains("embed query"));

        let err = engine
            .search_with_query("anything", QueryConfig::default())
            .await
            .unwrap_err();
        match err {
            FusionError::FanOut { failures, total } => {
                assert_eq!(total, 1);
                assert_eq!(failures[0].error.error_code(), "TIMEOUT");
            }
            other => panic!("expected fan-out error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_variant_searches_run_concurrently() {
        let embedder = Arc::new(SlowEmbedder::new());
        let engine = FusionEngine::new(
            embedder.clone(),
            Arc::new(MockCompleter::new("one\ntwo\nthree\nfour")),
            Arc::new(MemoryIndex::new("test")),
        );

        let start = tokio::time::Instant::now();
        let results = engine
            .search_with_query("zero", QueryConfig::default())
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(results.variants.len(), 5);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 5);
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_secs(2), "took {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_embeds_concurrently() {
        let embedder = Arc::new(SlowEmbedder::new());
        let index = Arc::new(MemoryIndex::new("test"));
        let engine = FusionEngine::new(
            embedder.clone(),
            Arc::new(MockCompleter::new("")),
            index.clone(),
        );

        let documents: Vec<NewDocument> = ["one", "two", "three", "four", "five"]
            .into_iter()
            .map(NewDocument::new)
            .collect();

        let start = tokio::time::Instant::now();
        let summary = engine.upload_documents(documents).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(summary.upserted, 5);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 5);
        assert_eq!(index.upsert_calls(), 1);
        assert!(elapsed < Duration::from_secs(2), "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_upload_keeps_same_text_under_distinct_ids() {
        let index = Arc::new(MemoryIndex::new("test"));
        let engine = FusionEngine::new(
            Arc::new(MockEmbedder::with_config(16, 512)),
            Arc::new(MockCompleter::new("")),
            index.clone(),
        );

        let summary = engine
            .upload_documents(vec![
                NewDocument::new("same").with_id("x"),
                NewDocument::new("same").with_id("y"),
                NewDocument::new("same"),
            ])
            .await
            .unwrap();

        assert_eq!(
            summary,
            UploadSummary {
                submitted: 3,
                upserted: 3,
                skipped: 0,
            }
        );
        assert_eq!(index.len(), 3);
    }

    #[tokio::test]
    async fn test_upload_skips_empty_and_duplicates() {
        let index = Arc::new(MemoryIndex::new("test"));
        let engine = FusionEngine::new(
            Arc::new(MockEmbedder::with_config(16, 512)),
            Arc::new(MockCompleter::new("")),
            index.clone(),
        );

        let summary = engine
            .upload_documents(vec![
                NewDocument::new("first"),
                NewDocument::new("   "),
                NewDocument::new("second"),
                NewDocument::new("first"),
            ])
            .await
            .unwrap();

        assert_eq!(
            summary,
            UploadSummary {
                submitted: 4,
                upserted: 2,
                skipped: 2,
            }
        );
        assert_eq!(index.len(), 2);
        assert_eq!(index.upsert_calls(), 1);
    }

    #[tokio::test]
    async fn test_upload_empty_batch_makes_no_calls() {
        let index = Arc::new(MemoryIndex::new("test"));
        let engine = FusionEngine::new(
            Arc::new(MockEmbedder::new()),
            Arc::new(MockCompleter::new("")),
            index.clone(),
        );

        let summary = engine.upload_documents(Vec::new()).await.unwrap();

        assert_eq!(summary, UploadSummary::default());
        assert_eq!(index.upsert_calls(), 0);
    }

    #[tokio::test]
    async fn test_uploaded_text_is_returned_as_content() {
        let engine = engine("");
        engine
            .upload_documents(vec![NewDocument::new("stored body").with_id("x")])
            .await
            .unwrap();

        let hits: Vec<ScoredItem> = engine.vector_search("stored body", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "x");
        assert_eq!(hits[0].content, "stored body");
    }
}
