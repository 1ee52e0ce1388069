//! Core domain types for ragfusion.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ulid::Ulid;

/// Metadata key holding a record's text payload in the vector index.
pub const TEXT_KEY: &str = "text";

/// Metadata key holding the BLAKE3 hex digest of a record's text.
pub const CONTENT_HASH_KEY: &str = "content_hash";

/// Metadata attached to an index record or search hit.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A metadata value.
///
/// Serialized as plain JSON, so index payloads round-trip without tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    /// Borrow the value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl std::fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => f.write_str(s),
            Self::List(_) | Self::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<serde_json::Value> for MetadataValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// One entry of a ranked search result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    /// Identifier of the document/chunk within its index.
    pub id: String,

    /// Relevance score assigned by the list that produced this item.
    #[serde(default)]
    pub score: f32,

    /// Retrievable text payload.
    #[serde(default)]
    pub content: String,

    /// Opaque metadata carried through fusion.
    #[serde(default)]
    pub metadata: Metadata,
}

impl ScoredItem {
    /// Create an item with empty metadata.
    pub fn new(id: impl Into<String>, score: f32, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            score,
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A ranked list of items; position 0 is the best match.
pub type RankedList = Vec<ScoredItem>;

/// An item after Reciprocal Rank Fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    /// Payload of the first occurrence of this id across the input lists.
    #[serde(flatten)]
    pub item: ScoredItem,

    /// Accumulated RRF score.
    pub fusion_score: f64,
}

impl FusedResult {
    pub fn id(&self) -> &str {
        &self.item.id
    }

    /// Turn the fused result back into a ranked-list item scored by its
    /// fusion score.
    pub fn into_scored_item(self) -> ScoredItem {
        ScoredItem {
            score: self.fusion_score as f32,
            ..self.item
        }
    }
}

/// Results of a fused multi-query search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionResults {
    /// The original query.
    pub query: String,

    /// Every query variant searched, original first.
    pub variants: Vec<String>,

    /// Total results returned.
    pub total_results: usize,

    /// End-to-end latency in milliseconds.
    pub latency_ms: u64,

    /// Fused results, best first.
    pub results: Vec<FusedResult>,
}

/// A vector to write into the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A document submitted for upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    /// Record id; a ULID is generated when absent.
    #[serde(default)]
    pub id: Option<String>,

    /// Text to embed and store.
    pub text: String,

    /// User-provided metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

impl NewDocument {
    /// Create a document without an explicit id.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Set an explicit record id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// BLAKE3 hex digest of the document text.
    pub fn content_hash(&self) -> String {
        hex::encode(blake3::hash(self.text.as_bytes()).as_bytes())
    }

    /// Build the index record for this document from its embedding.
    ///
    /// The text and its hash are stored in metadata so search hits can
    /// return the content.
    pub fn into_record(self, values: Vec<f32>) -> IndexRecord {
        let hash = self.content_hash();
        let id = self.id.unwrap_or_else(|| Ulid::new().to_string());

        let mut metadata = self.metadata;
        metadata.insert(CONTENT_HASH_KEY.to_string(), MetadataValue::String(hash));
        metadata.insert(TEXT_KEY.to_string(), MetadataValue::String(self.text));

        IndexRecord {
            id,
            values,
            metadata,
        }
    }
}

/// Outcome of a document upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    /// Documents handed to the upload.
    pub submitted: usize,

    /// Records written to the index.
    pub upserted: usize,

    /// Documents skipped as empty or duplicate.
    pub skipped: usize,
}

/// Which configured index a command targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexService {
    #[default]
    Primary,
    Secondary,
}

impl std::fmt::Display for IndexService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        };
        write!(f, "{}", s)
    }
}
