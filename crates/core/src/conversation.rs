use crate::error::ProviderError;
use crate::index::VectorIndex;
use crate::models::{Exchange, RetrievedChunk, Speaker, Turn};
use crate::providers::Provider;
use tracing::debug;

const CONDENSE_QUESTION_PROMPT: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.";

const ANSWER_PROMPT: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Retrieval-augmented question answering over one index.
///
/// The chain holds no history of its own: every call receives the history so far and
/// returns the extended history as part of the [`Exchange`].
#[derive(Debug)]
pub struct ConversationChain {
    index: VectorIndex,
    provider: Provider,
    top_k: usize,
}

impl ConversationChain {
    pub fn new(index: VectorIndex, provider: Provider, top_k: usize) -> Self {
        Self {
            index,
            provider,
            top_k: top_k.max(1),
        }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Answers `question` in the context of `history`.
    ///
    /// Follow-up questions are first rewritten into a standalone question so retrieval
    /// does not depend on earlier turns. `history` itself is left untouched; on error
    /// nothing is appended anywhere.
    pub async fn ask(&self, history: &[Turn], question: &str) -> Result<Exchange, ProviderError> {
        let standalone = if history.is_empty() {
            question.to_string()
        } else {
            let prompt = condense_prompt(history, question);
            self.provider.language_model().generate(&prompt).await?
        };

        let query = self.provider.embedder().embed_query(&standalone).await?;
        let sources = self.index.search(&query, self.top_k);
        debug!(
            standalone = %standalone,
            sources = sources.len(),
            "retrieved context"
        );

        let prompt = answer_prompt(&sources, &standalone);
        let answer = self.provider.language_model().generate(&prompt).await?;

        let mut extended = Vec::with_capacity(history.len() + 2);
        extended.extend_from_slice(history);
        extended.push(Turn::user(question));
        extended.push(Turn::assistant(answer.clone()));

        Ok(Exchange {
            answer,
            history: extended,
            sources,
        })
    }
}

fn format_history(history: &[Turn]) -> String {
    history
        .iter()
        .map(|turn| match turn.speaker {
            Speaker::User => format!("Human: {}", turn.message),
            Speaker::Assistant => format!("Assistant: {}", turn.message),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn condense_prompt(history: &[Turn], question: &str) -> String {
    format!(
        "{CONDENSE_QUESTION_PROMPT}\n\nChat History:\n{}\nFollow Up Input: {question}\nStandalone question:",
        format_history(history)
    )
}

fn answer_prompt(sources: &[RetrievedChunk], question: &str) -> String {
    let context = sources
        .iter()
        .map(|source| source.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{ANSWER_PROMPT}\n\n{context}\n\nQuestion: {question}\nHelpful Answer:")
}

#[cfg(test)]
pub(crate) mod fakes {
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::ProviderError;
    use crate::models::ModelChoice;
    use crate::providers::Provider;
    use crate::traits::LanguageModel;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays scripted replies and records every prompt it receives.
    #[derive(Default)]
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, String>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn replying(replies: &[&str]) -> Arc<Self> {
            let model = Self::default();
            for reply in replies {
                model.push_reply(reply);
            }
            Arc::new(model)
        }

        pub fn push_reply(&self, reply: &str) {
            self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
        }

        pub fn push_failure(&self, message: &str) {
            self.replies
                .lock()
                .unwrap()
                .push_back(Err(message.to_string()));
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.replies.lock().unwrap().pop_front() {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(message)) => Err(ProviderError::Api {
                    provider: "scripted".to_string(),
                    status: 503,
                    message,
                }),
                None => Ok("I don't know.".to_string()),
            }
        }
    }

    pub fn offline_provider(choice: ModelChoice, model: Arc<ScriptedModel>) -> Provider {
        Provider::new(choice, Arc::new(CharacterNgramEmbedder::default()), model)
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::{offline_provider, ScriptedModel};
    use super::*;
    use crate::chunking::{build_chunks, ChunkingConfig};
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::index::DEFAULT_TOP_K;
    use crate::models::ModelChoice;

    async fn chain_with(model: std::sync::Arc<ScriptedModel>) -> ConversationChain {
        let text = "The pump operates at 40 bar.\nThe warranty lasts two years.\nInvoices are due in 30 days.";
        let config = ChunkingConfig {
            separator: "\n".to_string(),
            chunk_size: 40,
            chunk_overlap: 0,
        };
        let chunks = build_chunks(text, &config).unwrap();
        let index = VectorIndex::build(chunks, &CharacterNgramEmbedder::default())
            .await
            .unwrap();
        ConversationChain::new(
            index,
            offline_provider(ModelChoice::OpenAi, model),
            DEFAULT_TOP_K,
        )
    }

    #[tokio::test]
    async fn first_question_goes_straight_to_retrieval() {
        let model = ScriptedModel::replying(&["Two years."]);
        let chain = chain_with(model.clone()).await;

        let exchange = chain.ask(&[], "How long is the warranty?").await.unwrap();

        assert_eq!(exchange.answer, "Two years.");
        assert_eq!(exchange.history.len(), 2);
        assert_eq!(exchange.history[0].speaker, Speaker::User);
        assert_eq!(exchange.history[0].message, "How long is the warranty?");
        assert_eq!(exchange.history[1].speaker, Speaker::Assistant);

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("warranty lasts two years"));
        assert!(prompts[0].ends_with("Question: How long is the warranty?\nHelpful Answer:"));
    }

    #[tokio::test]
    async fn follow_up_is_condensed_with_history() {
        let model = ScriptedModel::replying(&["What pressure does the pump use?", "40 bar."]);
        let chain = chain_with(model.clone()).await;
        let history = vec![Turn::user("Tell me about the pump"), Turn::assistant("It is hydraulic.")];

        let exchange = chain.ask(&history, "What pressure?").await.unwrap();

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("Human: Tell me about the pump\nAssistant: It is hydraulic."));
        assert!(prompts[0].contains("Follow Up Input: What pressure?"));
        assert!(prompts[1].contains("Question: What pressure does the pump use?"));

        assert_eq!(exchange.history.len(), 4);
        assert_eq!(exchange.history[2].message, "What pressure?");
        assert_eq!(exchange.history[3].message, "40 bar.");
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn failed_generation_returns_error_without_history() {
        let model = ScriptedModel::replying(&[]);
        model.push_failure("overloaded");
        let chain = chain_with(model).await;

        let result = chain.ask(&[], "Anything?").await;
        assert!(matches!(result, Err(ProviderError::Api { status: 503, .. })));
    }

    #[test]
    fn context_chunks_are_separated_by_blank_lines() {
        let sources = vec![
            RetrievedChunk {
                chunk: crate::models::TextChunk {
                    chunk_id: "a".to_string(),
                    chunk_index: 0,
                    text: "alpha".to_string(),
                },
                score: 0.9,
            },
            RetrievedChunk {
                chunk: crate::models::TextChunk {
                    chunk_id: "b".to_string(),
                    chunk_index: 1,
                    text: "beta".to_string(),
                },
                score: 0.5,
            },
        ];
        let prompt = answer_prompt(&sources, "q");
        assert!(prompt.contains("\n\nalpha\n\nbeta\n\nQuestion: q"));
    }
}
