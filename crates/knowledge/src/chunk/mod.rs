//! Overlapping text chunking.
//!
//! Long input is cut into [`Segment`]s no longer than a configured maximum.
//! Every segment after the first repeats exactly `overlap` characters of the
//! text before it, so dropping those characters and concatenating the
//! segments in order reproduces the input byte for byte.
//!
//! Splitting happens in two passes:
//! - [`splitters`] cuts the text into contiguous pieces at the highest
//!   priority separator present, recursing with lower priority separators
//!   for pieces that are still too large
//! - [`merging`] packs the pieces greedily into windows and prepends the
//!   overlap
//!
//! All lengths are counted in Unicode scalar values.

mod merging;
mod splitters;

use insight_core::config::{ChunkStrategy, ChunkingConfig};
use insight_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Characters per estimated token for [`ChunkStrategy::Token`].
pub const CHARS_PER_TOKEN: usize = 4;

/// A contiguous slice of a larger text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,

    /// Position in the document (0-indexed)
    pub index: usize,

    /// Character offset of the first character in the original text
    pub source_offset: usize,
}

/// Validated chunker parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkConfig {
    pub strategy: ChunkStrategy,
    /// In characters, or estimated tokens for the token strategy
    pub max_chunk: usize,
    pub overlap: usize,
    pub separators: Vec<String>,
}

impl ChunkConfig {
    pub fn new(
        strategy: ChunkStrategy,
        max_chunk: usize,
        overlap: usize,
        separators: Vec<String>,
    ) -> Self {
        Self {
            strategy,
            max_chunk,
            overlap,
            separators,
        }
    }

    /// Character budgets after applying the strategy's unit.
    fn char_budgets(&self) -> (usize, usize) {
        match self.strategy {
            ChunkStrategy::Token => (
                self.max_chunk.saturating_mul(CHARS_PER_TOKEN),
                self.overlap.saturating_mul(CHARS_PER_TOKEN),
            ),
            ChunkStrategy::Character | ChunkStrategy::Recursive => (self.max_chunk, self.overlap),
        }
    }

    /// Separators the strategy is allowed to use.
    fn active_separators(&self) -> &[String] {
        match self.strategy {
            ChunkStrategy::Character => {
                let end = self.separators.len().min(1);
                &self.separators[..end]
            }
            ChunkStrategy::Recursive | ChunkStrategy::Token => &self.separators,
        }
    }

    fn validate(&self) -> AppResult<()> {
        if self.max_chunk == 0 {
            return Err(AppError::InvalidArgument(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.max_chunk {
            return Err(AppError::InvalidArgument(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.overlap, self.max_chunk
            )));
        }
        Ok(())
    }
}

impl From<&ChunkingConfig> for ChunkConfig {
    fn from(config: &ChunkingConfig) -> Self {
        Self::new(
            config.strategy,
            config.chunk_size,
            config.chunk_overlap,
            config.separators.clone(),
        )
    }
}

/// Splits text into overlapping segments.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkConfig,
    max_chars: usize,
    overlap_chars: usize,
}

impl Chunker {
    /// Validate the configuration once.
    ///
    /// # Errors
    /// `InvalidArgument` when the maximum is zero or the overlap is not
    /// smaller than the maximum.
    pub fn new(config: ChunkConfig) -> AppResult<Self> {
        config.validate()?;
        let (max_chars, overlap_chars) = config.char_budgets();
        Ok(Self {
            config,
            max_chars,
            overlap_chars,
        })
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Maximum segment length in characters.
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    pub fn split(&self, text: &str) -> Vec<Segment> {
        if text.chars().count() <= self.max_chars {
            return vec![Segment {
                text: text.to_string(),
                index: 0,
                source_offset: 0,
            }];
        }

        let fresh_budget = self.max_chars - self.overlap_chars;
        let pieces = splitters::split_pieces(text, fresh_budget, self.config.active_separators());
        let segments = merging::pack_with_overlap(text, &pieces, self.max_chars, self.overlap_chars);

        tracing::debug!(
            strategy = ?self.config.strategy,
            chars = text.chars().count(),
            pieces = pieces.len(),
            segments = segments.len(),
            "Split text into segments"
        );

        segments
    }
}

/// One-shot split with the recursive strategy.
pub fn split(
    text: &str,
    max_chunk_chars: usize,
    overlap_chars: usize,
    separators: &[String],
) -> AppResult<Vec<Segment>> {
    let chunker = Chunker::new(ChunkConfig::new(
        ChunkStrategy::Recursive,
        max_chunk_chars,
        overlap_chars,
        separators.to_vec(),
    ))?;
    Ok(chunker.split(text))
}

/// Reassemble segments produced with the given overlap.
pub fn reassemble(segments: &[Segment], overlap_chars: usize) -> String {
    let mut text = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i == 0 {
            text.push_str(&segment.text);
        } else {
            text.extend(segment.text.chars().skip(overlap_chars));
        }
    }
    text
}
