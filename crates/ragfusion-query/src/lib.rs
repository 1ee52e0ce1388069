//! ragfusion-query - Query expansion and rank fusion
//!
//! This crate implements RAG-Fusion: a query is expanded into several
//! variants by a completion model, each variant is searched against a vector
//! index, and the ranked lists are merged with Reciprocal Rank Fusion (RRF).
//!
//! # Features
//!
//! - Pure, deterministic RRF over any number of ranked lists
//! - Query expansion through a [`CompletionProvider`](ragfusion_core::CompletionProvider)
//! - Concurrent per-variant search with a per-call timeout
//! - Batched document upload
//!
//! # Example
//!
//! ```rust,ignore
//! use ragfusion_query::{FusionEngine, QueryConfig};
//! use std::sync::Arc;
//!
//! let engine = FusionEngine::new(Arc::new(embedder), Arc::new(completer), Arc::new(index));
//! let results = engine.search_with_query("What is RAG Fusion?", QueryConfig::default()).await?;
//! ```

mod engine;
mod expansion;
mod fusion;

pub use engine::{FusionEngine, QueryConfig};
pub use expansion::{parse_queries, QueryExpander};
pub use fusion::{reciprocal_rank_fusion, DEFAULT_RRF_K};

// Re-export for convenience
pub use ragfusion_core::{FusedResult, FusionResults, RankedList, ScoredItem};
