pub mod huggingface;
pub mod openai;

pub use huggingface::{HuggingFaceHubModel, InstructEmbedder};
pub use openai::{OpenAiChatModel, OpenAiEmbedder};

use crate::config::ProviderSettings;
use crate::error::ProviderError;
use crate::models::ModelChoice;
use crate::traits::{Embedder, LanguageModel};
use reqwest::{Client, Response};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The embedding model and language model that serve one processed index.
///
/// Both halves come from the same backend family; they are chosen together and
/// never swapped independently.
#[derive(Clone)]
pub struct Provider {
    choice: ModelChoice,
    embedder: Arc<dyn Embedder>,
    language_model: Arc<dyn LanguageModel>,
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("choice", &self.choice)
            .field("embedder", &self.embedder.name())
            .field("language_model", &self.language_model.name())
            .finish()
    }
}

impl Provider {
    pub fn new(
        choice: ModelChoice,
        embedder: Arc<dyn Embedder>,
        language_model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            choice,
            embedder,
            language_model,
        }
    }

    /// OpenAI embeddings and chat completions. Fails without an API key.
    pub fn cloud(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let client = http_client(settings.request_timeout)?;
        Ok(Self::new(
            ModelChoice::OpenAi,
            Arc::new(OpenAiEmbedder::new(client.clone(), &settings.openai)?),
            Arc::new(OpenAiChatModel::new(client, &settings.openai)?),
        ))
    }

    /// Instructor embeddings and a hosted open model.
    pub fn local(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let client = http_client(settings.request_timeout)?;
        Ok(Self::new(
            ModelChoice::HuggingFace,
            Arc::new(InstructEmbedder::new(client.clone(), &settings.huggingface)),
            Arc::new(HuggingFaceHubModel::new(client, &settings.huggingface)),
        ))
    }

    pub fn choice(&self) -> ModelChoice {
        self.choice
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn language_model(&self) -> &dyn LanguageModel {
        self.language_model.as_ref()
    }
}

pub trait ProviderResolver: Send + Sync {
    fn resolve(&self, choice: ModelChoice) -> Result<Provider, ProviderError>;
}

impl ProviderResolver for ProviderSettings {
    fn resolve(&self, choice: ModelChoice) -> Result<Provider, ProviderError> {
        self.validate()?;
        match choice {
            ModelChoice::OpenAi => Provider::cloud(self),
            ModelChoice::HuggingFace => Provider::local(self),
        }
    }
}

fn http_client(timeout: Duration) -> Result<Client, ProviderError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Turns a non-success response into `ProviderError::Api` with the body as message.
pub(crate) async fn error_for_status(
    provider: &str,
    response: Response,
) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(ProviderError::Api {
        provider: provider.to_string(),
        status: status.as_u16(),
        message,
    })
}
