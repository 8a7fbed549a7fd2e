//! Agent loop, response parsing, prompt rendering, and session management.

pub mod llm;
pub mod memory;
pub mod parser;
pub mod prompt;
pub mod runtime;
pub mod session;
pub mod tool_registry;

/// Model provider interface and OpenAI-compatible implementation.
pub use llm::{DEFAULT_MODEL, LlmProvider, OpenAiProvider};
/// In-process conversation memory.
pub use memory::ConversationMemory;
/// Completion parser.
pub use parser::parse_response;
/// Deterministic prompt rendering.
pub use prompt::{DEFAULT_PERSONA, PromptBuilder};
/// Main reasoning/acting loop.
pub use runtime::{AgentConfig, AgentLoop, DEGRADED_ANSWER};
/// Sessions and background turns.
pub use session::{Session, SessionManager, TurnHandle};
/// Runtime tool registry.
pub use tool_registry::ToolRegistry;
