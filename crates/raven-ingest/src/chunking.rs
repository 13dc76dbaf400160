//! Token-window chunking over section content.
//!
//! Sections are chunked in token space so embedding inputs stay under the
//! model's context limit regardless of how long a section runs. Consecutive
//! chunks overlap so passages that straddle a window boundary still retrieve.

use serde::{Deserialize, Serialize};
use tiktoken_rs::{cl100k_base, CoreBPE, Rank};
use tracing::debug;

use raven_core::{Error, Result};
use raven_store::Section;

pub const DEFAULT_CHUNK_SIZE: usize = 2000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// One embeddable unit of text, tagged with the section it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Identifier of the originating section.
    pub source: String,
    /// Decoded chunk text.
    pub text: String,
    /// Position of the chunk within its section, starting at 0.
    pub ordinal: usize,
}

/// Sliding token-window chunker over the `cl100k_base` vocabulary.
pub struct TokenChunker {
    bpe: CoreBPE,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TokenChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Ingest("chunk size must be positive".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Ingest(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }
        let bpe = cl100k_base().map_err(|e| Error::Ingest(e.to_string()))?;
        Ok(Self {
            bpe,
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }

    pub fn token_count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Split text into overlapping token windows and decode each back to a
    /// string. Text at or under the chunk size comes back as a single chunk.
    pub fn split(&self, text: &str) -> Result<Vec<String>> {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        if tokens.len() <= self.chunk_size {
            return Ok(vec![text.to_string()]);
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < tokens.len() {
            let end = (start + self.chunk_size).min(tokens.len());
            chunks.push(self.decode_window(&tokens[start..end]));
            if end == tokens.len() {
                break;
            }
            start += step;
        }
        Ok(chunks)
    }

    /// Decode a token window at the byte level.
    ///
    /// A window boundary may fall inside a multi-byte character; strict
    /// decoding would reject the window even though the input text is valid
    /// UTF-8. The partial character becomes a replacement character under
    /// lossy decoding and is trimmed off; the neighboring window carries the
    /// complete character thanks to the overlap.
    fn decode_window(&self, tokens: &[Rank]) -> String {
        let mut bytes = Vec::new();
        for piece in self.bpe._decode_native_and_split(tokens.to_vec()) {
            bytes.extend(piece);
        }
        String::from_utf8_lossy(&bytes)
            .trim_matches(char::REPLACEMENT_CHARACTER)
            .to_string()
    }

    /// Chunk a single section, tagging every chunk with its identifier.
    pub fn chunk_section(&self, section: &Section) -> Result<Vec<Chunk>> {
        let pieces = self.split(&section.content)?;
        Ok(pieces
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| Chunk {
                source: section.identifier.clone(),
                text,
                ordinal,
            })
            .collect())
    }

    /// Chunk a batch of sections, preserving section order.
    pub fn chunk_sections(&self, sections: &[Section]) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        for section in sections {
            chunks.extend(self.chunk_section(section)?);
        }
        debug!("Chunked {} sections into {} chunks", sections.len(), chunks.len());
        Ok(chunks)
    }
}
