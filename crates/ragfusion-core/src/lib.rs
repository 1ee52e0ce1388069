//! ragfusion-core - Core types and traits for RAG-Fusion retrieval
//!
//! This crate provides the foundational types, collaborator traits, error
//! handling and configuration used throughout the ragfusion workspace.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{FusionError, Result, VariantFailure};
pub use traits::*;
pub use types::*;
