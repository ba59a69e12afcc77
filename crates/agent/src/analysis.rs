//! Structured insight extraction from a conversation.
//!
//! Long texts are chunked and every segment is analysed independently with
//! bounded concurrency. Segment results are merged in document order; segments
//! whose reply never matches the schema are dropped and reported, never hidden.

use crate::completion::Completion;
use crate::json::parse_reply;
use futures::stream::{self, StreamExt, TryStreamExt};
use insight_core::config::AnalysisConfig;
use insight_core::{AppError, AppResult, ErrorKind};
use insight_knowledge::{Chunker, Segment};
use insight_prompt::{ids, PromptLibrary};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

const STRICT_JSON_REMINDER: &str = "Your previous reply was not valid JSON. Reply with the JSON \
object only, with every field present, and nothing before or after it.";

/// Insight extracted from one conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub requirements: Vec<String>,
    pub recommendations: Vec<String>,
    pub summary: String,
    pub key_points: Vec<String>,
    pub action_items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
}

impl AnalysisResult {
    /// Merge per-segment results given in segment order.
    ///
    /// Lists are concatenated keeping the first of any exact duplicates.
    /// `summary` and `sentiment` come from the last segment that supplied a
    /// non-empty value.
    pub fn merge<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = AnalysisResult>,
    {
        let mut merged = AnalysisResult::default();
        let mut seen: [HashSet<String>; 4] = Default::default();

        for part in parts {
            extend_unique(&mut merged.requirements, &mut seen[0], part.requirements);
            extend_unique(&mut merged.recommendations, &mut seen[1], part.recommendations);
            extend_unique(&mut merged.key_points, &mut seen[2], part.key_points);
            extend_unique(&mut merged.action_items, &mut seen[3], part.action_items);

            if !part.summary.trim().is_empty() {
                merged.summary = part.summary;
            }
            if let Some(sentiment) = part.sentiment.filter(|s| !s.trim().is_empty()) {
                merged.sentiment = Some(sentiment);
            }
        }

        merged
    }
}

fn extend_unique(target: &mut Vec<String>, seen: &mut HashSet<String>, items: Vec<String>) {
    for item in items {
        if seen.insert(item.clone()) {
            target.push(item);
        }
    }
}

/// A segment whose analysis was dropped.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentFailure {
    pub index: usize,
    pub kind: ErrorKind,
    pub message: String,
}

/// The pipeline's report: merged result plus what was dropped.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub result: AnalysisResult,
    pub segment_count: usize,
    pub failures: Vec<SegmentFailure>,
}

impl AnalysisOutcome {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Extracts an [`AnalysisResult`] from free text.
#[derive(Debug, Clone)]
pub struct AnalysisPipeline {
    completion: Completion,
    prompts: Arc<PromptLibrary>,
    chunker: Chunker,
    config: AnalysisConfig,
}

impl AnalysisPipeline {
    pub fn new(
        completion: Completion,
        prompts: Arc<PromptLibrary>,
        chunker: Chunker,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            completion,
            prompts,
            chunker,
            config,
        }
    }

    /// Analyse a conversation.
    ///
    /// `MalformedResponse` when no segment produced a valid result; the first
    /// external-service failure aborts the whole analysis.
    pub async fn analyze(&self, text: &str) -> AppResult<AnalysisOutcome> {
        if text.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "text to analyse must not be empty".to_string(),
            ));
        }

        let segments = if text.chars().count() > self.config.chunk_threshold_chars {
            self.chunker.split(text)
        } else {
            vec![Segment {
                text: text.to_string(),
                index: 0,
                source_offset: 0,
            }]
        };
        let segment_count = segments.len();
        tracing::info!(
            "Analysing {} characters in {} segment(s)",
            text.chars().count(),
            segment_count
        );

        let extracted: Vec<Result<AnalysisResult, SegmentFailure>> =
            stream::iter(segments.iter().map(|s| self.extract_segment(s, segment_count)))
                .buffered(self.config.extraction_concurrency.max(1))
                .try_collect()
                .await?;

        let mut results = Vec::with_capacity(segment_count);
        let mut failures = Vec::new();
        for outcome in extracted {
            match outcome {
                Ok(result) => results.push(result),
                Err(failure) => failures.push(failure),
            }
        }

        if results.is_empty() {
            return Err(AppError::MalformedResponse(format!(
                "none of the {} segment(s) produced a valid analysis",
                segment_count
            )));
        }
        if !failures.is_empty() {
            tracing::warn!(
                "Analysis is partial: {} of {} segment(s) dropped",
                failures.len(),
                segment_count
            );
        }

        Ok(AnalysisOutcome {
            result: AnalysisResult::merge(results),
            segment_count,
            failures,
        })
    }

    /// Analyse one segment, retrying a malformed reply once.
    ///
    /// The outer error aborts the pipeline; the inner one drops the segment.
    async fn extract_segment(
        &self,
        segment: &Segment,
        total: usize,
    ) -> AppResult<Result<AnalysisResult, SegmentFailure>> {
        let label = if total > 1 {
            format!("part {} of {}", segment.index + 1, total)
        } else {
            String::new()
        };

        let first = self.request(segment, &label, "").await?;
        let message = match parse_reply::<AnalysisResult>(&first) {
            Ok(result) => return Ok(Ok(result)),
            Err(e) => e.to_string(),
        };
        tracing::warn!(segment = segment.index, "Retrying malformed analysis: {}", message);

        let second = self.request(segment, &label, STRICT_JSON_REMINDER).await?;
        match parse_reply::<AnalysisResult>(&second) {
            Ok(result) => Ok(Ok(result)),
            Err(e) => {
                tracing::warn!(segment = segment.index, "Dropping segment: {}", e);
                Ok(Err(SegmentFailure {
                    index: segment.index,
                    kind: e.kind(),
                    message: e.to_string(),
                }))
            }
        }
    }

    async fn request(&self, segment: &Segment, label: &str, reminder: &str) -> AppResult<String> {
        let prompt = self.prompts.render(
            ids::ANALYSIS_EXTRACT,
            [
                ("text", segment.text.as_str()),
                ("segment_label", label),
                ("reminder", reminder),
            ],
        )?;
        self.completion.complete(prompt).await
    }
}
