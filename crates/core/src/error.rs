use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error in {document}: {reason}")]
    PdfParse { document: String, reason: String },

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("no documents were provided")]
    NoDocuments,
}

/// Failures raised by embedding and language-model backends.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned {status}: {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("invalid response from {provider}: {details}")]
    Parse { provider: String, details: String },

    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("invalid provider configuration: {0}")]
    Config(String),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("document extraction failed: {0}")]
    Extraction(#[from] IngestError),

    #[error("index build failed: {0}")]
    IndexBuild(#[source] ProviderError),

    #[error("conversation failed: {0}")]
    Conversation(#[source] ProviderError),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("question is empty")]
    EmptyQuestion,
}
