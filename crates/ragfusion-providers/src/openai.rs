//! OpenAI-compatible embedding and chat completion client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ragfusion_core::{
    CompletionProvider, EmbeddingProvider, FusionError, OpenAiConfig, Result,
};

use crate::http::{decode, read_body, transport};

const PROVIDER: &str = "openai";

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for the OpenAI embeddings and chat completions endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    embedding_model: String,
    chat_model: String,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Create a client reusing an existing HTTP client.
    pub fn with_client(client: Client, config: &OpenAiConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            embedding_model: config.embedding_model.clone(),
            chat_model: config.chat_model.clone(),
        }
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, operation: &str, body: &T) -> Result<String> {
        let url = format!("{}/{}", self.base_url, path);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(transport(PROVIDER, operation))?;

        read_body(PROVIDER, operation, res).await
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            input: text,
            model: &self.embedding_model,
        };
        let body = self.post("embeddings", "embed", &request).await?;
        let embedding = parse_embedding(&body)?;

        debug!("Embedded {} chars into {} dims", text.len(), embedding.len());

        Ok(embedding)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
        };
        let body = self.post("chat/completions", "complete", &request).await?;
        parse_completion(&body)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

fn parse_embedding(body: &str) -> Result<Vec<f32>> {
    let response: EmbeddingResponse = decode(PROVIDER, "embed", body)?;
    response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| FusionError::provider(PROVIDER, "embed: response contained no embedding"))
}

fn parse_completion(body: &str) -> Result<String> {
    let response: ChatResponse = decode(PROVIDER, "complete", body)?;
    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.unwrap_or_default())
        .ok_or_else(|| FusionError::provider(PROVIDER, "complete: response contained no choices"))
}
