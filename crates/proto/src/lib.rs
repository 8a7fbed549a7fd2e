//! Shared protocol types for the assistant runtime, tools, and front-ends.
//!
//! This crate defines serializable conversation/turn structures and
//! strongly-typed error enums shared across the workspace.

pub mod error;
pub mod message;
pub mod turn;

/// Re-export of all protocol error types.
pub use error::*;
/// Re-export of conversation/message identity types.
pub use message::{Message, Role, SessionId};
/// Re-export of per-turn decision, trace, and result types.
pub use turn::{AgentTurnResult, ObservationKind, ParsedDecision, ScratchpadEntry, TerminalReason};
