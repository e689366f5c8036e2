use crate::error::IngestError;
use crate::models::TextChunk;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;

pub const DEFAULT_SEPARATOR: &str = "\n";
pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Lengths are measured in characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub separator: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Splits `text` on the configured separator and greedily merges the pieces into
/// chunks of at most `chunk_size` characters.
///
/// Each new chunk starts with the trailing pieces of the previous one, up to
/// `chunk_overlap` characters. A piece longer than `chunk_size` is cut into
/// fixed windows that step back `chunk_overlap` characters each time.
pub fn split_text(text: &str, config: &ChunkingConfig) -> Result<Vec<String>, IngestError> {
    config.validate()?;

    let pieces: Vec<&str> = if config.separator.is_empty() {
        text.char_indices()
            .map(|(start, ch)| &text[start..start + ch.len_utf8()])
            .collect()
    } else {
        let splitter = Regex::new(&regex::escape(&config.separator))?;
        splitter
            .split(text)
            .filter(|piece| !piece.is_empty())
            .collect()
    };

    Ok(merge_pieces(&pieces, config))
}

fn merge_pieces(pieces: &[&str], config: &ChunkingConfig) -> Vec<String> {
    let separator = config.separator.as_str();
    let separator_len = char_len(separator);
    let joiner_len = |pending: usize| if pending == 0 { 0 } else { separator_len };

    let mut chunks = Vec::new();
    let mut current: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0usize;

    for &piece in pieces {
        let len = char_len(piece);

        if len > config.chunk_size {
            push_joined(&mut chunks, &current, separator);
            current.clear();
            total = 0;
            chunks.extend(window_piece(piece, config));
            continue;
        }

        if total + len + joiner_len(current.len()) > config.chunk_size && !current.is_empty() {
            push_joined(&mut chunks, &current, separator);

            while total > config.chunk_overlap
                || (total > 0 && total + len + joiner_len(current.len()) > config.chunk_size)
            {
                let had_followers = current.len() > 1;
                let Some((_, front_len)) = current.pop_front() else {
                    break;
                };
                let removed = front_len + if had_followers { separator_len } else { 0 };
                total = total.saturating_sub(removed);
            }
        }

        current.push_back((piece, len));
        if current.len() > 1 {
            total += separator_len;
        }
        total += len;
    }

    push_joined(&mut chunks, &current, separator);
    chunks
}

fn push_joined(chunks: &mut Vec<String>, current: &VecDeque<(&str, usize)>, separator: &str) {
    let joined = current
        .iter()
        .map(|(piece, _)| *piece)
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn window_piece(piece: &str, config: &ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = piece.chars().collect();
    let stride = config.chunk_size - config.chunk_overlap;

    let mut windows = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + config.chunk_size).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += stride;
    }
    windows
}

pub fn build_chunks(text: &str, config: &ChunkingConfig) -> Result<Vec<TextChunk>, IngestError> {
    let chunks = split_text(text, config)?
        .into_iter()
        .enumerate()
        .map(|(index, text)| TextChunk {
            chunk_id: make_chunk_id(index as u64, &text),
            chunk_index: index as u64,
            text,
        })
        .collect();
    Ok(chunks)
}

fn make_chunk_id(index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
