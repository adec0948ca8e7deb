//! Conversation side of the assistant.
//!
//! - `conversation` / `summary`: bounded turn history and its keyword summary
//! - `guardrails`: price and cooling interceptors, branch contact cards
//! - `prompt` / `llm`: context selection, system prompt and text generation
//! - `postprocess` / `mentions`: reply cleanup and recommended-product detection
//! - `runtime`: the free-text pipeline tying the above together
//! - `session` / `dispatch`: per-conversation state and intent routing
//!
//! The model only phrases answers. Prices, sizing and product choice in the
//! guided flow are decided by `soldy-core`.

pub mod conversation;
pub mod dispatch;
pub mod guardrails;
pub mod llm;
pub mod mentions;
pub mod postprocess;
pub mod prompt;
pub mod runtime;
pub mod session;
pub mod summary;

pub use dispatch::{DispatchReply, Dispatcher, UserIntent};
pub use llm::{generator_from_config, TextGenerator};
pub use runtime::{AgentError, AgentRuntime, AssistantReply};
pub use session::{ConversationId, Mode, Session};
