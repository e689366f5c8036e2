use crate::chunking::{build_chunks, ChunkingConfig};
use crate::config::ProviderSettings;
use crate::conversation::ConversationChain;
use crate::error::SessionError;
use crate::extractor::{extract_text, LopdfExtractor, PdfExtractor};
use crate::index::VectorIndex;
use crate::models::{ModelChoice, PdfDocument, ProcessReport, RetrievedChunk, Turn};
use crate::providers::ProviderResolver;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug)]
struct ReadyState {
    chain: ConversationChain,
    history: Vec<Turn>,
    sources: Vec<RetrievedChunk>,
}

#[derive(Debug)]
enum SessionState {
    Uninitialized,
    Ready(ReadyState),
}

/// One user's chat over one set of processed documents.
///
/// `process` binds a fresh index and conversation, `ask` extends the history, and
/// `clear` drops both. Operations take `&mut self`, so callers sharing a session
/// must serialize access (see [`SessionRegistry`]).
pub struct ChatSession {
    id: Uuid,
    resolver: Arc<dyn ProviderResolver>,
    extractor: Box<dyn PdfExtractor + Send + Sync>,
    chunking: ChunkingConfig,
    top_k: usize,
    state: SessionState,
}

impl ChatSession {
    pub fn new(settings: ProviderSettings) -> Self {
        let chunking = settings.chunking.clone();
        let top_k = settings.top_k;
        Self::with_resolver(Arc::new(settings), chunking, top_k)
    }

    pub fn with_resolver(
        resolver: Arc<dyn ProviderResolver>,
        chunking: ChunkingConfig,
        top_k: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            resolver,
            extractor: Box::new(LopdfExtractor),
            chunking,
            top_k,
            state: SessionState::Uninitialized,
        }
    }

    pub fn with_extractor(mut self, extractor: impl PdfExtractor + Send + Sync + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SessionState::Ready(_))
    }

    /// Model family of the bound conversation, if any.
    pub fn model(&self) -> Option<ModelChoice> {
        match &self.state {
            SessionState::Ready(ready) => Some(ready.chain.provider().choice()),
            SessionState::Uninitialized => None,
        }
    }

    pub fn history(&self) -> &[Turn] {
        match &self.state {
            SessionState::Ready(ready) => &ready.history,
            SessionState::Uninitialized => &[],
        }
    }

    /// Chunks that grounded the most recent answer.
    pub fn sources(&self) -> &[RetrievedChunk] {
        match &self.state {
            SessionState::Ready(ready) => &ready.sources,
            SessionState::Uninitialized => &[],
        }
    }

    /// Extracts, chunks, and indexes `documents`, then binds a new conversation.
    ///
    /// Everything is built before the session is touched: on error the previous
    /// conversation (or lack of one) stays exactly as it was. On success the history
    /// starts empty.
    pub async fn process(
        &mut self,
        documents: &[PdfDocument],
        choice: ModelChoice,
    ) -> Result<ProcessReport, SessionError> {
        let result = self.build_chain(documents, choice).await;
        let (chain, report) = match result {
            Ok(built) => built,
            Err(error) => {
                warn!(session = %self.id, %error, "processing failed, keeping previous state");
                return Err(error);
            }
        };

        info!(
            session = %self.id,
            documents = report.documents,
            characters = report.characters,
            chunks = report.chunks,
            model = %report.model,
            "documents processed"
        );

        self.state = SessionState::Ready(ReadyState {
            chain,
            history: Vec::new(),
            sources: Vec::new(),
        });
        Ok(report)
    }

    async fn build_chain(
        &self,
        documents: &[PdfDocument],
        choice: ModelChoice,
    ) -> Result<(ConversationChain, ProcessReport), SessionError> {
        let text = extract_text(documents, &*self.extractor)?;
        let chunks = build_chunks(&text, &self.chunking)?;
        let chunk_count = chunks.len();

        let provider = self
            .resolver
            .resolve(choice)
            .map_err(SessionError::IndexBuild)?;
        let index = VectorIndex::build(chunks, provider.embedder())
            .await
            .map_err(SessionError::IndexBuild)?;

        let report = ProcessReport {
            documents: documents.len(),
            characters: text.chars().count(),
            chunks: chunk_count,
            model: choice,
            processed_at: Utc::now(),
        };
        Ok((ConversationChain::new(index, provider, self.top_k), report))
    }

    /// Asks a question and returns the full history, which now ends with the new
    /// user and assistant turns. On error the history is unchanged.
    pub async fn ask(&mut self, question: &str) -> Result<&[Turn], SessionError> {
        let SessionState::Ready(ready) = &mut self.state else {
            return Err(SessionError::InvalidState(
                "no documents have been processed yet".to_string(),
            ));
        };

        let question = question.trim();
        if question.is_empty() {
            return Err(SessionError::EmptyQuestion);
        }

        let exchange = ready
            .chain
            .ask(&ready.history, question)
            .await
            .map_err(SessionError::Conversation)?;

        ready.history = exchange.history;
        ready.sources = exchange.sources;
        info!(session = %self.id, turns = ready.history.len(), "question answered");
        Ok(&ready.history)
    }

    /// Drops the conversation, its index, and the history.
    pub fn clear(&mut self) {
        if self.is_ready() {
            info!(session = %self.id, "session cleared");
        }
        self.state = SessionState::Uninitialized;
    }
}

type SessionFactory = Box<dyn Fn() -> ChatSession + Send + Sync>;

/// Isolated sessions for hosting many users in one process.
///
/// Each session sits behind its own mutex, so operations on one session run one at a
/// time while different sessions proceed independently.
pub struct SessionRegistry {
    factory: SessionFactory,
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<ChatSession>>>>,
}

impl SessionRegistry {
    pub fn new(factory: impl Fn() -> ChatSession + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_settings(settings: ProviderSettings) -> Self {
        Self::new(move || ChatSession::new(settings.clone()))
    }

    pub async fn create(&self) -> Uuid {
        let session = (self.factory)();
        let id = session.id();
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<Mutex<ChatSession>>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &Uuid) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::fakes::{offline_provider, ScriptedModel};
    use crate::error::{IngestError, ProviderError};
    use crate::models::{PageText, Speaker};
    use crate::providers::Provider;

    /// Treats document bytes as already-extracted UTF-8 text.
    struct PlainTextExtractor;

    impl PdfExtractor for PlainTextExtractor {
        fn extract_pages(&self, document: &PdfDocument) -> Result<Vec<PageText>, IngestError> {
            if document.name.ends_with("broken.pdf") {
                return Err(IngestError::PdfParse {
                    document: document.name.clone(),
                    reason: "startxref not found".to_string(),
                });
            }
            Ok(vec![PageText {
                number: 1,
                text: String::from_utf8_lossy(&document.bytes).to_string(),
            }])
        }
    }

    struct OfflineResolver {
        model: Arc<ScriptedModel>,
        reject: Option<ModelChoice>,
    }

    impl ProviderResolver for OfflineResolver {
        fn resolve(&self, choice: ModelChoice) -> Result<Provider, ProviderError> {
            if self.reject == Some(choice) {
                return Err(ProviderError::MissingCredential("rejected".to_string()));
            }
            Ok(offline_provider(choice, self.model.clone()))
        }
    }

    fn session_with(model: Arc<ScriptedModel>, reject: Option<ModelChoice>) -> ChatSession {
        ChatSession::with_resolver(
            Arc::new(OfflineResolver { model, reject }),
            ChunkingConfig::default(),
            4,
        )
        .with_extractor(PlainTextExtractor)
    }

    fn manual() -> Vec<PdfDocument> {
        vec![
            PdfDocument::new("manual.pdf", b"The pump runs at 40 bar.\nService it yearly.".to_vec()),
            PdfDocument::new("terms.pdf", b"Invoices are due within 30 days.".to_vec()),
        ]
    }

    #[tokio::test]
    async fn asking_before_processing_is_invalid() {
        let mut session = session_with(ScriptedModel::replying(&["unused"]), None);

        let result = session.ask("What is X?").await;

        assert!(matches!(result, Err(SessionError::InvalidState(_))));
        assert!(session.history().is_empty());
        assert!(!session.is_ready());
    }

    #[tokio::test]
    async fn missing_cloud_credential_fails_index_build() {
        let mut session = ChatSession::new(ProviderSettings::default()).with_extractor(PlainTextExtractor);

        let result = session.process(&manual(), ModelChoice::OpenAi).await;

        assert!(matches!(
            result,
            Err(SessionError::IndexBuild(ProviderError::MissingCredential(_)))
        ));
        assert!(!session.is_ready());
        assert_eq!(session.model(), None);
    }

    #[tokio::test]
    async fn each_ask_appends_a_user_and_an_assistant_turn() {
        let model = ScriptedModel::replying(&["40 bar.", "Standalone?", "Yearly."]);
        let mut session = session_with(model, None);
        let report = session.process(&manual(), ModelChoice::OpenAi).await.unwrap();
        assert_eq!(report.documents, 2);
        assert_eq!(report.chunks, 1);

        let history = session.ask("What pressure?").await.unwrap();
        assert_eq!(history.len(), 2);

        let history = session.ask("How often is service?").await.unwrap().to_vec();
        assert_eq!(history.len(), 4);
        let speakers: Vec<Speaker> = history.iter().map(|turn| turn.speaker).collect();
        assert_eq!(
            speakers,
            vec![Speaker::User, Speaker::Assistant, Speaker::User, Speaker::Assistant]
        );
        assert_eq!(history[2].message, "How often is service?");
        assert_eq!(history[3].message, "Yearly.");
        assert!(!session.sources().is_empty());
    }

    #[tokio::test]
    async fn failed_answer_leaves_history_untouched() {
        let model = ScriptedModel::replying(&["40 bar."]);
        let mut session = session_with(model.clone(), None);
        session.process(&manual(), ModelChoice::OpenAi).await.unwrap();
        session.ask("What pressure?").await.unwrap();

        model.push_failure("timeout");
        let result = session.ask("And the terms?").await;

        assert!(matches!(result, Err(SessionError::Conversation(_))));
        assert_eq!(session.history().len(), 2);
        assert!(session.is_ready());
    }

    #[tokio::test]
    async fn blank_question_is_rejected() {
        let mut session = session_with(ScriptedModel::replying(&[]), None);
        session.process(&manual(), ModelChoice::OpenAi).await.unwrap();

        assert!(matches!(
            session.ask("   ").await,
            Err(SessionError::EmptyQuestion)
        ));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn clear_resets_until_the_next_process() {
        let mut session = session_with(ScriptedModel::replying(&["40 bar."]), None);
        session.process(&manual(), ModelChoice::OpenAi).await.unwrap();
        session.ask("What pressure?").await.unwrap();

        session.clear();

        assert!(session.history().is_empty());
        assert!(!session.is_ready());
        assert!(matches!(
            session.ask("What pressure?").await,
            Err(SessionError::InvalidState(_))
        ));

        session.process(&manual(), ModelChoice::OpenAi).await.unwrap();
        assert!(session.ask("What pressure?").await.is_ok());
    }

    #[tokio::test]
    async fn failed_reprocess_keeps_the_previous_conversation() {
        let model = ScriptedModel::replying(&["40 bar."]);
        let mut session = session_with(model, Some(ModelChoice::HuggingFace));
        session.process(&manual(), ModelChoice::OpenAi).await.unwrap();
        session.ask("What pressure?").await.unwrap();

        let switched = session.process(&manual(), ModelChoice::HuggingFace).await;
        assert!(matches!(switched, Err(SessionError::IndexBuild(_))));

        let broken = vec![PdfDocument::new("broken.pdf", Vec::new())];
        let extraction = session.process(&broken, ModelChoice::OpenAi).await;
        assert!(matches!(extraction, Err(SessionError::Extraction(_))));

        assert_eq!(session.model(), Some(ModelChoice::OpenAi));
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn reprocessing_starts_a_fresh_history() {
        let mut session = session_with(ScriptedModel::replying(&["40 bar."]), None);
        session.process(&manual(), ModelChoice::OpenAi).await.unwrap();
        session.ask("What pressure?").await.unwrap();

        session.process(&manual(), ModelChoice::HuggingFace).await.unwrap();

        assert!(session.history().is_empty());
        assert_eq!(session.model(), Some(ModelChoice::HuggingFace));
    }

    #[tokio::test]
    async fn documents_without_text_cannot_be_indexed() {
        let mut session = session_with(ScriptedModel::replying(&[]), None);
        let empty = vec![PdfDocument::new("scan.pdf", b"   ".to_vec())];

        let result = session.process(&empty, ModelChoice::OpenAi).await;
        assert!(matches!(result, Err(SessionError::IndexBuild(_))));
    }

    #[tokio::test]
    async fn registry_keeps_sessions_isolated() {
        let model = ScriptedModel::replying(&["40 bar."]);
        let registry = SessionRegistry::new(move || session_with(model.clone(), None));

        let first = registry.create().await;
        let second = registry.create().await;
        assert_ne!(first, second);
        assert_eq!(registry.len().await, 2);

        {
            let session = registry.get(&first).await.unwrap();
            let mut session = session.lock().await;
            session.process(&manual(), ModelChoice::OpenAi).await.unwrap();
            session.ask("What pressure?").await.unwrap();
        }

        let other = registry.get(&second).await.unwrap();
        assert!(!other.lock().await.is_ready());

        assert!(registry.remove(&first).await);
        assert!(registry.get(&first).await.is_none());
        assert!(!registry.remove(&first).await);
    }

    #[tokio::test]
    async fn registry_from_settings_starts_sessions_uninitialized() {
        let registry = SessionRegistry::from_settings(ProviderSettings::default());
        assert!(registry.is_empty().await);

        let id = registry.create().await;
        let session = registry.get(&id).await.unwrap();
        let session = session.lock().await;
        assert_eq!(session.id(), id);
        assert!(!session.is_ready());
    }
}
