use crate::embeddings::cosine_similarity;
use crate::error::ProviderError;
use crate::models::{RetrievedChunk, TextChunk};
use crate::traits::Embedder;
use tracing::debug;

/// Number of chunks handed to the language model per question.
pub const DEFAULT_TOP_K: usize = 4;

#[derive(Debug, Clone)]
struct IndexedChunk {
    chunk: TextChunk,
    embedding: Vec<f32>,
}

/// In-memory similarity index over embedded chunks. Immutable once built.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    entries: Vec<IndexedChunk>,
    dimensions: usize,
}

impl VectorIndex {
    pub async fn build<E>(chunks: Vec<TextChunk>, embedder: &E) -> Result<Self, ProviderError>
    where
        E: Embedder + ?Sized,
    {
        if chunks.is_empty() {
            return Err(ProviderError::Config(
                "no text chunks to index; the documents contained no extractable text"
                    .to_string(),
            ));
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = embedder.embed_documents(&texts).await?;
        let index = Self::from_embeddings(chunks, embeddings, embedder.name())?;

        debug!(
            embedder = embedder.name(),
            chunks = index.len(),
            dimensions = index.dimensions,
            "vector index built"
        );
        Ok(index)
    }

    fn from_embeddings(
        chunks: Vec<TextChunk>,
        embeddings: Vec<Vec<f32>>,
        provider: &str,
    ) -> Result<Self, ProviderError> {
        if chunks.len() != embeddings.len() {
            return Err(ProviderError::Parse {
                provider: provider.to_string(),
                details: format!(
                    "embedding count {} doesn't match chunk count {}",
                    embeddings.len(),
                    chunks.len()
                ),
            });
        }

        let dimensions = embeddings.first().map(Vec::len).unwrap_or_default();
        if dimensions == 0 {
            return Err(ProviderError::Parse {
                provider: provider.to_string(),
                details: "embeddings are empty".to_string(),
            });
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                if embedding.len() != dimensions {
                    return Err(ProviderError::Parse {
                        provider: provider.to_string(),
                        details: format!("embedding dimension {} != {}", embedding.len(), dimensions),
                    });
                }
                Ok(IndexedChunk { chunk, embedding })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            entries,
            dimensions,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn chunks(&self) -> impl Iterator<Item = &TextChunk> {
        self.entries.iter().map(|entry| &entry.chunk)
    }

    /// Returns up to `k` chunks ranked by descending cosine similarity.
    /// Equal scores keep index order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<RetrievedChunk> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, cosine_similarity(query, &entry.embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(position, score)| RetrievedChunk {
                chunk: self.entries[position].chunk.clone(),
                score,
            })
            .collect()
    }
}
