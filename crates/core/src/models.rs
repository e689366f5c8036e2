use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One uploaded PDF, kept as raw bytes until extraction.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl PdfDocument {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextChunk {
    pub chunk_id: String,
    pub chunk_index: u64,
    pub text: String,
}

/// Which backend family embeds the chunks and answers questions.
///
/// Embedding dimensionality and the language model are coupled, so the choice is
/// fixed for the lifetime of one processed index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ModelChoice {
    #[default]
    OpenAi,
    HuggingFace,
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelChoice::OpenAi => f.write_str("OpenAI"),
            ModelChoice::HuggingFace => f.write_str("HuggingFace"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    /// Speaker of the turn at `position` in a well-formed history.
    pub fn at(position: usize) -> Self {
        if position % 2 == 0 {
            Speaker::User
        } else {
            Speaker::Assistant
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub speaker: Speaker,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn assistant(message: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: TextChunk,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessReport {
    pub documents: usize,
    pub characters: usize,
    pub chunks: usize,
    pub model: ModelChoice,
    pub processed_at: DateTime<Utc>,
}

/// Result of one question: the answer plus the full history that now includes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub answer: String,
    pub history: Vec<Turn>,
    pub sources: Vec<RetrievedChunk>,
}
