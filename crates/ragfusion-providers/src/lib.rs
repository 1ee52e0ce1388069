//! ragfusion-providers - Remote provider clients
//!
//! This crate provides implementations of the ragfusion collaborator traits.
//!
//! # Providers
//!
//! - [`OpenAiClient`]: embeddings and chat completions over an
//!   OpenAI-compatible HTTP API
//! - [`PineconeIndex`]: vector upsert and query against a Pinecone index
//! - [`MockEmbedder`], [`MockCompleter`], [`MemoryIndex`]: deterministic
//!   in-process stand-ins for tests

mod http;
mod mock;
mod openai;
mod pinecone;

pub use mock::{MemoryIndex, MockCompleter, MockEmbedder};
pub use openai::OpenAiClient;
pub use pinecone::PineconeIndex;

// Re-export the provider traits for convenience
pub use ragfusion_core::{CompletionProvider, EmbeddingProvider, VectorIndex};
