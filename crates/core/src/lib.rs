pub mod chunking;
pub mod config;
pub mod conversation;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod models;
pub mod providers;
pub mod session;
pub mod traits;

pub use chunking::{
    build_chunks, split_text, ChunkingConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
    DEFAULT_SEPARATOR,
};
pub use config::{HuggingFaceSettings, OpenAiSettings, ProviderSettings};
pub use conversation::ConversationChain;
pub use embeddings::{cosine_similarity, CharacterNgramEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{IngestError, ProviderError, SessionError};
pub use extractor::{extract_text, LopdfExtractor, PdfExtractor};
pub use index::{VectorIndex, DEFAULT_TOP_K};
pub use ingest::{digest_document, discover_pdf_files, load_documents};
pub use models::{
    Exchange, ModelChoice, PageText, PdfDocument, ProcessReport, RetrievedChunk, Speaker,
    TextChunk, Turn,
};
pub use providers::{Provider, ProviderResolver};
pub use session::{ChatSession, SessionRegistry};
pub use traits::{Embedder, LanguageModel};
