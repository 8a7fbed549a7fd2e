use proto::{AgentTurnResult, Message};
use tracing::debug;

/// In-process conversation memory for one session
///
/// Messages are appended in order and never edited. `reset` starts over,
/// optionally re-seeding the greeting.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    greeting: Option<String>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Memory that starts (and restarts after `reset`) with an assistant greeting.
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let mut memory = Self {
            messages: Vec::new(),
            greeting: Some(greeting.into()),
        };
        memory.seed();
        memory
    }

    /// Appends the user message and the assistant answer of a completed turn.
    pub fn record_turn(&mut self, user_input: &str, result: &AgentTurnResult) {
        self.messages.push(Message::user(user_input));
        self.messages.push(Message::assistant_with_trace(
            result.answer.clone(),
            result.trace.clone(),
        ));
        debug!(messages = self.messages.len(), "Turn recorded in memory");
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Clears every message.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.seed();
    }

    fn seed(&mut self) {
        if let Some(greeting) = &self.greeting {
            self.messages.push(Message::assistant(greeting.clone()));
        }
    }
}
