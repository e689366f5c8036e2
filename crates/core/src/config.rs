use crate::chunking::ChunkingConfig;
use crate::error::ProviderError;
use crate::index::DEFAULT_TOP_K;
use std::time::Duration;
use url::Url;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const OPENAI_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

pub const HUGGINGFACE_BASE_URL: &str = "https://api-inference.huggingface.co";
pub const INSTRUCT_EMBEDDING_MODEL: &str = "hkunlp/instructor-xl";
pub const HUGGINGFACE_LLM_REPO: &str = "google/flan-t5-xxl";

pub const DOCUMENT_INSTRUCTION: &str = "Represent the document for retrieval: ";
pub const QUERY_INSTRUCTION: &str = "Represent the question for retrieving supporting documents: ";

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    /// Inputs sent per embeddings request.
    pub embedding_batch_size: usize,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: OPENAI_BASE_URL.to_string(),
            chat_model: OPENAI_CHAT_MODEL.to_string(),
            embedding_model: OPENAI_EMBEDDING_MODEL.to_string(),
            temperature: 0.7,
            embedding_batch_size: 1_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HuggingFaceSettings {
    /// Optional: self-hosted endpoints usually run without a token.
    pub api_token: Option<String>,
    pub base_url: String,
    pub embedding_model: String,
    pub document_instruction: String,
    pub query_instruction: String,
    pub llm_repo: String,
    pub temperature: f32,
    pub max_length: u32,
}

impl Default for HuggingFaceSettings {
    fn default() -> Self {
        Self {
            api_token: None,
            base_url: HUGGINGFACE_BASE_URL.to_string(),
            embedding_model: INSTRUCT_EMBEDDING_MODEL.to_string(),
            document_instruction: DOCUMENT_INSTRUCTION.to_string(),
            query_instruction: QUERY_INSTRUCTION.to_string(),
            llm_repo: HUGGINGFACE_LLM_REPO.to_string(),
            temperature: 0.5,
            max_length: 512,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub openai: OpenAiSettings,
    pub huggingface: HuggingFaceSettings,
    pub chunking: ChunkingConfig,
    pub top_k: usize,
    pub request_timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            openai: OpenAiSettings::default(),
            huggingface: HuggingFaceSettings::default(),
            chunking: ChunkingConfig::default(),
            top_k: DEFAULT_TOP_K,
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl ProviderSettings {
    pub fn validate(&self) -> Result<(), ProviderError> {
        Url::parse(&self.openai.base_url)?;
        Url::parse(&self.huggingface.base_url)?;

        if self.top_k == 0 {
            return Err(ProviderError::Config("top_k must be at least 1".to_string()));
        }
        if self.openai.embedding_batch_size == 0 {
            return Err(ProviderError::Config(
                "embedding batch size must be at least 1".to_string(),
            ));
        }
        self.chunking
            .validate()
            .map_err(|error| ProviderError::Config(error.to_string()))
    }
}

/// Strips trailing slashes so paths can be appended with `format!`.
pub(crate) fn trim_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}
