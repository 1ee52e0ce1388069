//! Pinecone vector index client (REST data plane).

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ragfusion_core::{
    IndexRecord, Metadata, PineconeConfig, RankedList, Result, ScoredItem, VectorIndex, TEXT_KEY,
};

use crate::http::{decode, read_body, transport};

const PROVIDER: &str = "pinecone";

/// API version sent with every request.
const API_VERSION: &str = "2024-07";

#[derive(Deserialize)]
struct DescribeIndexResponse {
    host: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: u32,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    metadata: Option<Metadata>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [IndexRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

/// A single Pinecone index.
#[derive(Clone)]
pub struct PineconeIndex {
    client: Client,
    api_key: String,
    index_name: String,
    host: String,
    namespace: Option<String>,
}

impl PineconeIndex {
    /// Connect to `index_name`.
    ///
    /// Uses `host` when given, otherwise resolves the data plane host through
    /// the control plane.
    pub async fn connect(config: &PineconeConfig, index_name: &str, host: Option<&str>) -> Result<Self> {
        let client = Client::new();

        let host = match host {
            Some(host) => host.to_string(),
            None => resolve_host(&client, config, index_name).await?,
        };

        info!("Using Pinecone index {:?} at {}", index_name, host);

        Ok(Self::with_host(
            client,
            &config.api_key,
            index_name,
            &host,
            config.namespace.clone(),
        ))
    }

    /// Create an index client for a known data plane host.
    pub fn with_host(
        client: Client,
        api_key: &str,
        index_name: &str,
        host: &str,
        namespace: Option<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            index_name: index_name.to_string(),
            host: normalize_host(host),
            namespace,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn post(&self, path: &str) -> RequestBuilder {
        authorized(self.client.post(format!("{}/{}", self.host, path)), &self.api_key)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, records: &[IndexRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let request = UpsertRequest {
            vectors: records,
            namespace: self.namespace.as_deref(),
        };
        let res = self
            .post("vectors/upsert")
            .json(&request)
            .send()
            .await
            .map_err(transport(PROVIDER, "upsert"))?;
        read_body(PROVIDER, "upsert", res).await?;

        debug!("Upserted {} vectors into {}", records.len(), self.index_name);

        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: u32) -> Result<RankedList> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
            namespace: self.namespace.as_deref(),
        };
        let res = self
            .post("query")
            .json(&request)
            .send()
            .await
            .map_err(transport(PROVIDER, "query"))?;
        let body = read_body(PROVIDER, "query", res).await?;

        let results = parse_matches(&body)?;
        debug!("Query on {} returned {} matches", self.index_name, results.len());

        Ok(results)
    }

    fn name(&self) -> &str {
        &self.index_name
    }
}

fn authorized(builder: RequestBuilder, api_key: &str) -> RequestBuilder {
    builder
        .header("Api-Key", api_key)
        .header("X-Pinecone-API-Version", API_VERSION)
}

async fn resolve_host(client: &Client, config: &PineconeConfig, index_name: &str) -> Result<String> {
    let url = format!(
        "{}/indexes/{}",
        config.controller_url.trim_end_matches('/'),
        index_name
    );
    let res = authorized(client.get(&url), &config.api_key)
        .send()
        .await
        .map_err(transport(PROVIDER, "describe index"))?;
    let body = read_body(PROVIDER, "describe index", res).await?;
    let described: DescribeIndexResponse = decode(PROVIDER, "describe index", &body)?;
    Ok(described.host)
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

fn parse_matches(body: &str) -> Result<RankedList> {
    let response: QueryResponse = decode(PROVIDER, "query", body)?;

    Ok(response
        .matches
        .into_iter()
        .map(|m| {
            let metadata = m.metadata.unwrap_or_default();
            let content = metadata
                .get(TEXT_KEY)
                .map(ToString::to_string)
                .unwrap_or_default();
            ScoredItem {
                id: m.id,
                score: m.score.unwrap_or(0.0),
                content,
                metadata,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragfusion_core::MetadataValue;

    #[test]
    fn test_parse_matches() {
        let body = r#"{
            "matches": [
                {"id": "doc-1", "score": 0.92, "metadata": {"text": "RAG Fusion explained", "page": 2}},
                {"id": "doc-2", "metadata": {"title": "no text"}},
                {"id": "doc-3", "score": 0.5}
            ],
            "namespace": ""
        }"#;

        let results = parse_matches(body).unwrap();
        assert_eq!(results.len(), 3);

        assert_eq!(results[0].id, "doc-1");
        assert!((results[0].score - 0.92).abs() < 1e-6);
        assert_eq!(results[0].content, "RAG Fusion explained");
        assert_eq!(results[0].metadata["page"], MetadataValue::Number(2.0));

        assert_eq!(results[1].score, 0.0);
        assert_eq!(results[1].content, "");
        assert!(results[2].metadata.is_empty());
    }

    #[test]
    fn test_parse_matches_without_matches() {
        assert!(parse_matches(r#"{"namespace": "x"}"#).unwrap().is_empty());
    }

    #[test]
    fn test_query_request_shape() {
        let request = QueryRequest {
            vector: &[0.5, 0.25],
            top_k: 5,
            include_metadata: true,
            include_values: false,
            namespace: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["topK"], 5);
        assert_eq!(json["includeMetadata"], true);
        assert_eq!(json["includeValues"], false);
        assert!(json.get("namespace").is_none());
    }

    #[test]
    fn test_upsert_request_shape() {
        let mut record = IndexRecord {
            id: "a".to_string(),
            values: vec![1.0],
            metadata: Metadata::new(),
        };
        record
            .metadata
            .insert(TEXT_KEY.to_string(), MetadataValue::from("body"));

        let records = [record];
        let request = UpsertRequest {
            vectors: &records,
            namespace: Some("prod"),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["vectors"][0]["id"], "a");
        assert_eq!(json["vectors"][0]["values"][0], 1.0);
        assert_eq!(json["vectors"][0]["metadata"]["text"], "body");
        assert_eq!(json["namespace"], "prod");
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(
            normalize_host("docs-abc123.svc.us-east1-gcp.pinecone.io"),
            "https://docs-abc123.svc.us-east1-gcp.pinecone.io"
        );
        assert_eq!(normalize_host("http://localhost:5080/"), "http://localhost:5080");
    }

    #[test]
    fn test_with_host() {
        let index = PineconeIndex::with_host(Client::new(), "key", "docs", "example.pinecone.io", None);
        assert_eq!(index.host(), "https://example.pinecone.io");
        assert_eq!(index.name(), "docs");
    }
}
