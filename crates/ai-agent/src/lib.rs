//! Multi-stage question answering on top of a chat-style language model.
//!
//! A question is analyzed, broken into a short plan, executed step by step and
//! finally summarized. Every stage degrades to a deterministic fallback when
//! the model call fails, so a run always produces an answer.

pub mod classifier;
pub mod language_model;
pub mod options;
pub mod orchestrator;
pub mod plan;
pub mod prompts;
pub mod summary;

pub use classifier::is_complex;
pub use language_model::{
    ChatTurn, LanguageModelClient, LanguageModelResponse, LanguageModelUsage, Role, StreamDelta,
    StreamingModelClient, TransportError,
};
pub use options::{ModelOptions, DEFAULT_MODEL};
pub use orchestrator::{
    AgentWorkflow, NoopSink, ProgressSink, WorkflowConfig, WorkflowError, WorkflowEvent,
    WorkflowOutcome, WorkflowRun, WorkflowStage, WorkflowState, WORKFLOW_STAGES,
};
pub use plan::{default_plan, parse_plan_steps, PlanStep, StepStatus};
pub use summary::clean_summary;

pub const DEFAULT_MAX_TOKENS: u32 = 4096;
