use crate::config::{trim_base_url, HuggingFaceSettings};
use crate::embeddings::normalize;
use crate::error::ProviderError;
use crate::traits::{Embedder, LanguageModel};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::{json, Value};

use super::error_for_status;

const PROVIDER: &str = "huggingface";

#[derive(Serialize)]
struct FeatureExtractionRequest {
    inputs: Vec<String>,
    options: Value,
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    inputs: &'a str,
    parameters: GenerationParameters,
    options: Value,
}

#[derive(Serialize)]
struct GenerationParameters {
    temperature: f32,
    max_length: u32,
}

fn with_token(request: RequestBuilder, token: &Option<String>) -> RequestBuilder {
    match token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => request.bearer_auth(token),
        _ => request,
    }
}

/// Instruction-tuned embedding model behind a feature-extraction endpoint.
///
/// Every input is prefixed with an instruction describing whether it is a document
/// or a question, which is how instructor models are meant to be queried.
#[derive(Debug, Clone)]
pub struct InstructEmbedder {
    client: Client,
    endpoint: String,
    token: Option<String>,
    model: String,
    document_instruction: String,
    query_instruction: String,
}

impl InstructEmbedder {
    pub fn new(client: Client, settings: &HuggingFaceSettings) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/pipeline/feature-extraction/{}",
                trim_base_url(&settings.base_url),
                settings.embedding_model
            ),
            token: settings.api_token.clone(),
            model: settings.embedding_model.clone(),
            document_instruction: settings.document_instruction.clone(),
            query_instruction: settings.query_instruction.clone(),
        }
    }

    async fn embed_inputs(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>, ProviderError> {
        let expected = inputs.len();
        let body = FeatureExtractionRequest {
            inputs,
            options: json!({ "wait_for_model": true }),
        };

        let request = with_token(self.client.post(&self.endpoint), &self.token).json(&body);
        let response = request.send().await?;
        let payload: Value = error_for_status(PROVIDER, response).await?.json().await?;

        let vectors = parse_feature_vectors(&payload)?;
        if vectors.len() != expected {
            return Err(ProviderError::Parse {
                provider: PROVIDER.to_string(),
                details: format!("expected {expected} embeddings, got {}", vectors.len()),
            });
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for InstructEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let inputs = texts
            .iter()
            .map(|text| format!("{}{}", self.document_instruction, text))
            .collect();
        self.embed_inputs(inputs).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let input = format!("{}{}", self.query_instruction, text);
        self.embed_inputs(vec![input])
            .await?
            .pop()
            .ok_or_else(|| ProviderError::Parse {
                provider: PROVIDER.to_string(),
                details: "no embedding returned for query".to_string(),
            })
    }
}

/// Accepts one pooled vector per input (`[[f32]]`) or per-token vectors
/// (`[[[f32]]]`), which are mean-pooled and normalized.
fn parse_feature_vectors(payload: &Value) -> Result<Vec<Vec<f32>>, ProviderError> {
    let parse_error = |details: &str| ProviderError::Parse {
        provider: PROVIDER.to_string(),
        details: details.to_string(),
    };

    let rows = payload
        .as_array()
        .ok_or_else(|| parse_error("feature extraction response is not an array"))?;

    rows.iter()
        .map(|row| match row.as_array().and_then(|values| values.first()) {
            Some(Value::Array(_)) => {
                let tokens = row
                    .as_array()
                    .into_iter()
                    .flatten()
                    .map(|token| to_vector(token).ok_or_else(|| parse_error("token vector is not numeric")))
                    .collect::<Result<Vec<_>, _>>()?;
                mean_pool(&tokens).ok_or_else(|| parse_error("token vectors have mixed lengths"))
            }
            _ => to_vector(row).ok_or_else(|| parse_error("embedding is not a numeric array")),
        })
        .collect()
}

fn to_vector(value: &Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|number| number.as_f64().map(|number| number as f32))
        .collect()
}

fn mean_pool(tokens: &[Vec<f32>]) -> Option<Vec<f32>> {
    let width = tokens.first()?.len();
    let mut pooled = vec![0f32; width];
    for token in tokens {
        if token.len() != width {
            return None;
        }
        for (slot, value) in pooled.iter_mut().zip(token) {
            *slot += value;
        }
    }
    for slot in pooled.iter_mut() {
        *slot /= tokens.len() as f32;
    }
    normalize(&mut pooled);
    Some(pooled)
}

/// Hosted text-to-text model with fixed decoding parameters.
#[derive(Debug, Clone)]
pub struct HuggingFaceHubModel {
    client: Client,
    endpoint: String,
    token: Option<String>,
    repo_id: String,
    temperature: f32,
    max_length: u32,
}

impl HuggingFaceHubModel {
    pub fn new(client: Client, settings: &HuggingFaceSettings) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/models/{}",
                trim_base_url(&settings.base_url),
                settings.llm_repo
            ),
            token: settings.api_token.clone(),
            repo_id: settings.llm_repo.clone(),
            temperature: settings.temperature,
            max_length: settings.max_length,
        }
    }

    fn request_body<'a>(&self, prompt: &'a str) -> GenerationRequest<'a> {
        GenerationRequest {
            inputs: prompt,
            parameters: GenerationParameters {
                temperature: self.temperature,
                max_length: self.max_length,
            },
            options: json!({ "wait_for_model": true }),
        }
    }
}

#[async_trait]
impl LanguageModel for HuggingFaceHubModel {
    fn name(&self) -> &str {
        &self.repo_id
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = with_token(self.client.post(&self.endpoint), &self.token)
            .json(&self.request_body(prompt));
        let response = request.send().await?;
        let payload: Value = error_for_status(PROVIDER, response).await?.json().await?;
        parse_generated_text(&payload)
    }
}

fn parse_generated_text(payload: &Value) -> Result<String, ProviderError> {
    let first = match payload {
        Value::Array(items) => items.first(),
        other => Some(other),
    };

    if let Some(error) = first.and_then(|item| item.get("error")).and_then(Value::as_str) {
        return Err(ProviderError::Api {
            provider: PROVIDER.to_string(),
            status: 200,
            message: error.to_string(),
        });
    }

    first
        .and_then(|item| item.get("generated_text"))
        .and_then(Value::as_str)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| ProviderError::Parse {
            provider: PROVIDER.to_string(),
            details: "response has no generated_text".to_string(),
        })
}
