//! Tool-using conversational agent.
//!
//! Each chat turn runs a bounded reasoning loop:
//!
//! ```text
//! Start -> Thinking -> (ToolCall -> Observing -> Thinking)* -> Answering? -> Done
//! ```
//!
//! The only tool searches the knowledge index. The loop makes at most one tool
//! call per iteration and at most `max_iterations` in total; reaching the
//! ceiling forces an answer. Session history changes only once the loop has
//! produced an answer, so a failed turn leaves it untouched.

pub mod parse;
pub mod session;

pub use parse::{parse_step, Decision, Step};
pub use session::{InMemorySessionStore, Role, Session, SessionStore, SqliteSessionStore, Turn};

use crate::completion::Completion;
use crate::json::preview;
use insight_core::config::AgentConfig;
use insight_core::{AppError, AppResult};
use insight_knowledge::{EmbeddingIndex, EmbeddingProvider, SearchHit};
use insight_prompt::{ids, PromptLibrary};
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;

/// Name of the search tool offered to the model.
pub const SEARCH_TOOL: &str = "search_database";

const SEARCH_TOOL_DESCRIPTION: &str =
    "search previously ingested conversations and documents; input is a search query";

const STRICT_FORMAT_REMINDER: &str = "Your previous reply did not follow the format. Reply with \
either an Action and an Action Input line, or a Final Answer line.";

const NO_ANSWER: &str = "I could not produce an answer to that question.";

/// Result of one chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub session_id: String,
    pub answer: String,
    /// Reasoning iterations run, including a forced answer
    pub iterations: usize,
    pub tool_calls: usize,
    /// The tool-call ceiling forced the answer
    pub forced: bool,
    /// The model never followed the reply format; the answer is its raw text
    pub degraded: bool,
    pub history_len: usize,
}

/// A completed tool call, replayed to the model on later iterations.
#[derive(Debug, Clone)]
struct ScratchStep {
    thought: Option<String>,
    tool: String,
    query: String,
    observation: String,
}

#[derive(Debug)]
struct Answer {
    text: String,
    forced: bool,
    degraded: bool,
}

#[derive(Debug)]
enum State {
    Start,
    Thinking,
    ToolCall {
        thought: Option<String>,
        tool: String,
        query: String,
    },
    Observing(ScratchStep),
    Answering,
    Done(Answer),
}

/// What one model call produced.
enum Thought {
    Parsed(Step),
    Degraded(String),
}

/// Per-turn working memory.
struct TurnContext<'a> {
    question: &'a str,
    history: String,
    scratchpad: Vec<ScratchStep>,
    iterations: usize,
    tool_calls: usize,
}

impl TurnContext<'_> {
    fn scratchpad_text(&self) -> String {
        self.scratchpad
            .iter()
            .map(|step| {
                let mut text = String::new();
                if let Some(thought) = &step.thought {
                    text.push_str(&format!("Thought: {}\n", thought));
                }
                text.push_str(&format!(
                    "Action: {}\nAction Input: {}\nObservation: {}",
                    step.tool, step.query, step.observation
                ));
                text
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn render_history(history: &[Turn]) -> String {
    history
        .iter()
        .map(|turn| match turn.role {
            Role::User => format!("User: {}", turn.text),
            Role::Agent => format!("Agent: {}", turn.text),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Answers questions about stored material, remembering each session.
pub struct AgentOrchestrator {
    completion: Completion,
    prompts: Arc<PromptLibrary>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn EmbeddingIndex>,
    sessions: Arc<dyn SessionStore>,
    config: AgentConfig,
}

impl std::fmt::Debug for AgentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentOrchestrator")
            .field("completion", &self.completion)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AgentOrchestrator {
    pub fn new(
        completion: Completion,
        prompts: Arc<PromptLibrary>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn EmbeddingIndex>,
        sessions: Arc<dyn SessionStore>,
        config: AgentConfig,
    ) -> Self {
        Self {
            completion,
            prompts,
            embedder,
            index,
            sessions,
            config,
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Answer one user message within a session.
    ///
    /// `AgentUnavailable` when the reasoning model cannot be reached; the
    /// session is then left exactly as it was.
    pub async fn chat(&self, session_id: &str, message: &str) -> AppResult<ChatReply> {
        if session_id.trim().is_empty() {
            return Err(AppError::InvalidArgument("session id must not be empty".to_string()));
        }
        if message.trim().is_empty() {
            return Err(AppError::InvalidArgument("message must not be empty".to_string()));
        }

        let span = tracing::info_span!("agent_turn", session = %session_id);
        self.run_turn(session_id, message.trim()).instrument(span).await
    }

    /// Forget a session's history.
    pub async fn reset(&self, session_id: &str) -> AppResult<bool> {
        if session_id.trim().is_empty() {
            return Err(AppError::InvalidArgument("session id must not be empty".to_string()));
        }
        let existed = self.sessions.reset(session_id).await?;
        tracing::info!(session = %session_id, existed, "Session reset");
        Ok(existed)
    }

    async fn run_turn(&self, session_id: &str, message: &str) -> AppResult<ChatReply> {
        let mut ctx = TurnContext {
            question: message,
            history: String::new(),
            scratchpad: Vec::new(),
            iterations: 0,
            tool_calls: 0,
        };

        let mut state = State::Start;
        let answer = loop {
            state = match state {
                State::Start => {
                    let history = self.sessions.history(session_id).await?;
                    ctx.history = render_history(&history);
                    State::Thinking
                }
                State::Thinking => {
                    if ctx.tool_calls >= self.config.max_iterations {
                        State::Answering
                    } else {
                        ctx.iterations += 1;
                        match self.think(&ctx).await? {
                            Thought::Parsed(Step {
                                thought,
                                decision: Decision::ToolCall { tool, query },
                            }) => State::ToolCall {
                                thought,
                                tool,
                                query,
                            },
                            Thought::Parsed(Step {
                                decision: Decision::FinalAnswer(text),
                                ..
                            }) => State::Done(Answer {
                                text,
                                forced: false,
                                degraded: false,
                            }),
                            Thought::Degraded(text) => State::Done(Answer {
                                text,
                                forced: false,
                                degraded: true,
                            }),
                        }
                    }
                }
                State::ToolCall {
                    thought,
                    tool,
                    query,
                } => {
                    ctx.tool_calls += 1;
                    let observation = self.run_tool(&tool, &query).await;
                    State::Observing(ScratchStep {
                        thought,
                        tool,
                        query,
                        observation,
                    })
                }
                State::Observing(step) => {
                    ctx.scratchpad.push(step);
                    State::Thinking
                }
                State::Answering => {
                    ctx.iterations += 1;
                    tracing::info!(
                        tool_calls = ctx.tool_calls,
                        "Tool-call ceiling reached, forcing an answer"
                    );
                    State::Done(self.force_answer(&ctx).await?)
                }
                State::Done(answer) => break answer,
            };
        };

        let history_len = self
            .sessions
            .commit_exchange(
                session_id,
                Turn::user(message),
                Turn::agent(answer.text.clone()),
                self.config.history_window,
            )
            .await?;

        tracing::info!(
            iterations = ctx.iterations,
            tool_calls = ctx.tool_calls,
            forced = answer.forced,
            degraded = answer.degraded,
            "Chat turn complete"
        );

        Ok(ChatReply {
            session_id: session_id.to_string(),
            answer: answer.text,
            iterations: ctx.iterations,
            tool_calls: ctx.tool_calls,
            forced: answer.forced,
            degraded: answer.degraded,
            history_len,
        })
    }

    async fn ask_model(&self, prompt_id: &str, ctx: &TurnContext<'_>, reminder: &str) -> AppResult<String> {
        let prompt = self.prompts.render(
            prompt_id,
            [
                ("tool_name", SEARCH_TOOL),
                ("tool_description", SEARCH_TOOL_DESCRIPTION),
                ("history", ctx.history.as_str()),
                ("question", ctx.question),
                ("scratchpad", ctx.scratchpad_text().as_str()),
                ("reminder", reminder),
            ],
        )?;
        self.completion.complete(prompt).await.map_err(|e| {
            tracing::error!(kind = %e.kind(), "Reasoning model failed: {}", e);
            AppError::AgentUnavailable(e.to_string())
        })
    }

    /// One reasoning step, re-asking once when the reply is unparseable.
    async fn think(&self, ctx: &TurnContext<'_>) -> AppResult<Thought> {
        let reply = self.ask_model(ids::AGENT_REACT, ctx, "").await?;
        let err = match parse_step(&reply) {
            Ok(step) => return Ok(Thought::Parsed(step)),
            Err(e) => e,
        };
        tracing::warn!("Re-asking after unparseable reply: {}", err);

        let reply = self.ask_model(ids::AGENT_REACT, ctx, STRICT_FORMAT_REMINDER).await?;
        match parse_step(&reply) {
            Ok(step) => Ok(Thought::Parsed(step)),
            Err(e) => {
                tracing::warn!("Using raw reply as a degraded answer: {}", e);
                let raw = reply.trim();
                Ok(Thought::Degraded(if raw.is_empty() {
                    NO_ANSWER.to_string()
                } else {
                    raw.to_string()
                }))
            }
        }
    }

    async fn force_answer(&self, ctx: &TurnContext<'_>) -> AppResult<Answer> {
        let reply = self.ask_model(ids::AGENT_FORCE_ANSWER, ctx, "").await?;
        if let Ok(Step {
            decision: Decision::FinalAnswer(text),
            ..
        }) = parse_step(&reply)
        {
            return Ok(Answer {
                text,
                forced: true,
                degraded: false,
            });
        }

        tracing::warn!("Forced reply was not a final answer, summarising the last observation");
        let text = match ctx.scratchpad.last() {
            Some(step) => format!(
                "I could not reach a definite answer. The most relevant information found for \"{}\": {}",
                step.query, step.observation
            ),
            None => NO_ANSWER.to_string(),
        };
        Ok(Answer {
            text,
            forced: true,
            degraded: true,
        })
    }

    /// Run a tool call. Failures become the observation, never an error.
    async fn run_tool(&self, tool: &str, query: &str) -> String {
        if !tool.eq_ignore_ascii_case(SEARCH_TOOL) {
            tracing::warn!(tool = %tool, "Model requested an unknown tool");
            return format!(
                "Unknown tool '{}'. The only available tool is {}.",
                tool, SEARCH_TOOL
            );
        }

        match self.search(query).await {
            Ok(hits) if hits.is_empty() => "No matching records found.".to_string(),
            Ok(hits) => self.format_hits(&hits),
            Err(e) => {
                tracing::warn!(kind = %e.kind(), "Search tool failed: {}", e);
                format!("search unavailable: {}", e)
            }
        }
    }

    async fn search(&self, query: &str) -> AppResult<Vec<SearchHit>> {
        let vector = self.embedder.embed(query).await?;
        let hits = self.index.search(&vector, self.config.search_top_k).await?;
        tracing::debug!(query = %query, hits = hits.len(), "Searched knowledge base");
        Ok(hits)
    }

    fn format_hits(&self, hits: &[SearchHit]) -> String {
        hits.iter()
            .enumerate()
            .map(|(i, hit)| {
                let mut line = format!(
                    "[{}] (score {:.2}) {}",
                    i + 1,
                    hit.score,
                    preview(&hit.record.text, self.config.snippet_chars)
                );
                if let Some(summary) = hit
                    .record
                    .metadata
                    .get("summary")
                    .and_then(|s| s.as_str())
                    .filter(|s| !s.is_empty())
                {
                    line.push_str(&format!("\n    Summary: {}", summary));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
