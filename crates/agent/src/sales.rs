//! Sales assistance: requirements in, grounded recommendations out.
//!
//! Four fixed steps: extract requirements, build a search query, retrieve
//! similar past cases, generate recommendations. Only retrieval may fail
//! softly; without precedent the recommendations rely on the requirements.

use crate::completion::Completion;
use crate::json::{parse_reply, preview};
use insight_core::config::SalesConfig;
use insight_core::{AppError, AppResult};
use insight_knowledge::{EmbeddingIndex, EmbeddingProvider, SearchHit};
use insight_prompt::{ids, PromptLibrary};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

const STRICT_JSON_REMINDER: &str =
    "Your previous reply was not valid JSON. Reply with the JSON object only.";

/// What the customer needs, as extracted from the conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequirementSet {
    pub requirements: Vec<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub budget: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub timeline: Option<String>,
}

/// Accept a string, a number or null where free text is expected.
fn scalar_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

impl RequirementSet {
    /// Query used to look up similar cases.
    pub fn search_query(&self, fallback_text: &str) -> String {
        let mut parts = self.requirements.clone();
        if let Some(budget) = &self.budget {
            parts.push(format!("budget {}", budget));
        }
        if parts.is_empty() {
            return preview(fallback_text, 500);
        }
        parts.join("; ")
    }

    // Models write "null", "" or "unknown" for absent values.
    fn normalized(mut self) -> Self {
        let absent = |v: &Option<String>| {
            v.as_deref()
                .map(|s| {
                    let s = s.trim();
                    s.is_empty() || s.eq_ignore_ascii_case("null") || s.eq_ignore_ascii_case("unknown")
                })
                .unwrap_or(true)
        };
        if absent(&self.budget) {
            self.budget = None;
        }
        if absent(&self.timeline) {
            self.timeline = None;
        }
        self.requirements.retain(|r| !r.trim().is_empty());
        self
    }
}

#[derive(Debug, Deserialize)]
struct RecommendationReply {
    recommendations: Vec<String>,
}

/// Result of the sales-assist pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct SalesAssistance {
    pub requirements: RequirementSet,
    pub recommendations: Vec<String>,
    pub similar_case_count: usize,
    /// Retrieval failed or found nothing; recommendations are not grounded in past cases
    pub no_precedent: bool,
}

/// Drafts recommendations for a salesperson from a customer conversation.
pub struct SalesAssistOrchestrator {
    completion: Completion,
    prompts: Arc<PromptLibrary>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn EmbeddingIndex>,
    config: SalesConfig,
}

impl std::fmt::Debug for SalesAssistOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalesAssistOrchestrator")
            .field("completion", &self.completion)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SalesAssistOrchestrator {
    pub fn new(
        completion: Completion,
        prompts: Arc<PromptLibrary>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn EmbeddingIndex>,
        config: SalesConfig,
    ) -> Self {
        Self {
            completion,
            prompts,
            embedder,
            index,
            config,
        }
    }

    /// Run the pipeline.
    ///
    /// `ExtractionFailed` or `RecommendationFailed` name the step that failed;
    /// a failed case search only sets `no_precedent`.
    pub async fn assist(&self, text: &str) -> AppResult<SalesAssistance> {
        if text.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "conversation text must not be empty".to_string(),
            ));
        }

        let requirements = self.extract_requirements(text).await.map_err(|e| {
            tracing::error!(kind = %e.kind(), step = "requirements", "Sales assist failed: {}", e);
            AppError::ExtractionFailed(e.to_string())
        })?;
        tracing::info!("Extracted {} requirement(s)", requirements.requirements.len());

        let query = requirements.search_query(text);
        let cases = match self.find_cases(&query).await {
            Ok(cases) => cases,
            Err(e) => {
                tracing::warn!(kind = %e.kind(), step = "search", "Continuing without precedent: {}", e);
                Vec::new()
            }
        };

        let recommendations = self
            .recommend(text, &requirements, &cases)
            .await
            .map_err(|e| {
                tracing::error!(kind = %e.kind(), step = "recommend", "Sales assist failed: {}", e);
                AppError::RecommendationFailed(e.to_string())
            })?;

        Ok(SalesAssistance {
            requirements,
            recommendations,
            similar_case_count: cases.len(),
            no_precedent: cases.is_empty(),
        })
    }

    async fn extract_requirements(&self, text: &str) -> AppResult<RequirementSet> {
        let reply: RequirementSet = self
            .complete_json(|reminder| {
                self.prompts.render(
                    ids::SALES_REQUIREMENTS,
                    [("text", text), ("reminder", reminder)],
                )
            })
            .await?;
        Ok(reply.normalized())
    }

    async fn find_cases(&self, query: &str) -> AppResult<Vec<SearchHit>> {
        let vector = self.embedder.embed(query).await?;
        self.index.search(&vector, self.config.search_top_k).await
    }

    async fn recommend(
        &self,
        text: &str,
        requirements: &RequirementSet,
        cases: &[SearchHit],
    ) -> AppResult<Vec<String>> {
        let requirement_list = requirements
            .requirements
            .iter()
            .map(|r| format!("- {}", r))
            .collect::<Vec<_>>()
            .join("\n");
        let case_list = cases
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                format!(
                    "Case {} (similarity {:.2}):\n{}",
                    i + 1,
                    hit.score,
                    preview(&hit.record.text, self.config.snippet_chars)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let budget = requirements.budget.clone().unwrap_or_default();
        let timeline = requirements.timeline.clone().unwrap_or_default();

        let reply: RecommendationReply = self
            .complete_json(|reminder| {
                self.prompts.render(
                    ids::SALES_RECOMMEND,
                    [
                        ("requirements", requirement_list.as_str()),
                        ("budget", budget.as_str()),
                        ("timeline", timeline.as_str()),
                        ("cases", case_list.as_str()),
                        ("text", text),
                        ("reminder", reminder),
                    ],
                )
            })
            .await?;

        let recommendations: Vec<String> = reply
            .recommendations
            .into_iter()
            .filter(|r| !r.trim().is_empty())
            .collect();
        if recommendations.is_empty() {
            return Err(AppError::MalformedResponse(
                "reply contained no recommendations".to_string(),
            ));
        }
        Ok(recommendations)
    }

    /// Complete and parse, re-asking once with a stricter reminder when the
    /// reply does not match the schema.
    async fn complete_json<T, F>(&self, render: F) -> AppResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&str) -> AppResult<insight_prompt::BuiltPrompt>,
    {
        let reply = self.completion.complete(render("")?).await?;
        match parse_reply(&reply) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                tracing::warn!("Re-asking after malformed reply: {}", e);
                let reply = self.completion.complete(render(STRICT_JSON_REMINDER)?).await?;
                parse_reply(&reply)
            }
        }
    }
}
