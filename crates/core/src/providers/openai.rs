use crate::config::{trim_base_url, OpenAiSettings};
use crate::error::ProviderError;
use crate::traits::{Embedder, LanguageModel};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error_for_status;

const PROVIDER: &str = "openai";

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

fn require_key(settings: &OpenAiSettings) -> Result<String, ProviderError> {
    settings
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ProviderError::MissingCredential("OPENAI_API_KEY is not set".to_string())
        })
}

#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    batch_size: usize,
}

impl OpenAiEmbedder {
    pub fn new(client: Client, settings: &OpenAiSettings) -> Result<Self, ProviderError> {
        Ok(Self {
            client,
            base_url: trim_base_url(&settings.base_url),
            api_key: require_key(settings)?,
            model: settings.embedding_model.clone(),
            batch_size: settings.embedding_batch_size.max(1),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;

        let payload: EmbeddingResponse = error_for_status(PROVIDER, response).await?.json().await?;
        ordered_embeddings(payload, texts.len())
    }
}

fn ordered_embeddings(
    payload: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    let mut data = payload.data;
    if data.len() != expected {
        return Err(ProviderError::Parse {
            provider: PROVIDER.to_string(),
            details: format!("expected {expected} embeddings, got {}", data.len()),
        });
    }
    data.sort_by_key(|item| item.index);
    Ok(data.into_iter().map(|item| item.embedding).collect())
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            embeddings.extend(self.embed_batch(batch).await?);
        }
        Ok(embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| ProviderError::Parse {
                provider: PROVIDER.to_string(),
                details: "no embedding returned for query".to_string(),
            })
    }
}

/// Chat-completion model; the prompt is sent as a single user message.
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(client: Client, settings: &OpenAiSettings) -> Result<Self, ProviderError> {
        Ok(Self {
            client,
            base_url: trim_base_url(&settings.base_url),
            api_key: require_key(settings)?,
            model: settings.chat_model.clone(),
            temperature: settings.temperature,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let payload: ChatCompletionResponse =
            error_for_status(PROVIDER, response).await?.json().await?;
        payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::Parse {
                provider: PROVIDER.to_string(),
                details: "chat completion had no choices".to_string(),
            })
    }
}
