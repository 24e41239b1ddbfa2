//! Chat runtime that fronts the agent workflow: per-client rate limiting and
//! the choice between a workflow run and a direct model call.

pub mod rate_limit;
pub mod runtime;

pub use rate_limit::{
    ChatClient, LimitScope, RateLimitExceeded, RateLimitStatus, RateLimiter, RateLimits,
};
pub use runtime::{ChatConfig, ChatError, ChatReply, ChatRuntime, ChatRuntimeBuilder};
