//! Insight orchestration layer.
//!
//! Builds the engine's workflows on top of the knowledge store and the
//! completion contract:
//! - [`AnalysisPipeline`] turns a conversation into an [`AnalysisResult`]
//! - [`AgentOrchestrator`] answers questions with a bounded tool-using loop
//! - [`SalesAssistOrchestrator`] drafts recommendations from similar cases
//! - [`InsightService`] wires them together behind the exposed operations

pub mod agent;
pub mod analysis;
pub mod completion;
pub mod json;
pub mod sales;
pub mod service;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use agent::{
    AgentOrchestrator, ChatReply, InMemorySessionStore, Role, Session, SessionStore,
    SqliteSessionStore, Turn,
};
pub use analysis::{AnalysisOutcome, AnalysisPipeline, AnalysisResult, SegmentFailure};
pub use completion::Completion;
pub use sales::{RequirementSet, SalesAssistOrchestrator, SalesAssistance};
pub use service::{IngestReport, IngestRequest, InsightService, ServiceParts};
