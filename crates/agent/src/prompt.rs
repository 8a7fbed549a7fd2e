//! Prompt rendering for one model call.

use proto::{Message, ObservationKind, Role, ScratchpadEntry};

use crate::parser::FINAL_ANSWER_KEY;

/// Persona used when none is configured.
pub const DEFAULT_PERSONA: &str = "You are Maria, a friendly and professional HR assistant. \
You help employees and new hires with onboarding, their HR records, company HR policies, \
vacation requests and scheduling. Answer as helpfully as possible and never invent policy details.";

/// Observations longer than this are cut when rendered.
pub const DEFAULT_MAX_OBSERVATION_CHARS: usize = 4_000;

/// Renders prompts deterministically from the turn's inputs.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    persona: String,
    max_history_messages: Option<usize>,
    max_observation_chars: usize,
}

impl PromptBuilder {
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            max_history_messages: None,
            max_observation_chars: DEFAULT_MAX_OBSERVATION_CHARS,
        }
    }

    /// Keeps at most `limit` prior messages, starting on a user message.
    pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        self.max_history_messages = limit;
        self
    }

    pub fn with_max_observation_chars(mut self, max_chars: usize) -> Self {
        self.max_observation_chars = max_chars;
        self
    }

    /// Builds the full prompt text.
    ///
    /// Identical arguments always produce a byte-identical prompt.
    pub fn build(
        &self,
        tools: &[(&str, &str)],
        history: &[Message],
        input: &str,
        scratchpad: &[ScratchpadEntry],
    ) -> String {
        let mut prompt = String::new();
        prompt.push_str(self.persona.trim());
        prompt.push_str("\n\nTOOLS\n-----\nYou can use the following tools:\n\n");
        for (name, description) in tools {
            prompt.push_str(&format!("{name}: {description}\n"));
        }

        let names = tools.iter().map(|(name, _)| *name).collect::<Vec<_>>().join(", ");
        prompt.push_str(&format!(
            "\nRESPONSE FORMAT\n---------------\n\
             To use a tool, reply in exactly this format:\n\n\
             Thought: what you need to do next\n\
             Action: the tool to use, one of [{names}]\n\
             Action Input: the input to the tool\n\n\
             When you have the answer for the human, reply with only a JSON object:\n\n\
             {{\"{FINAL_ANSWER_KEY}\": \"your answer to the human\"}}\n"
        ));

        prompt.push_str("\nCONVERSATION\n------------\n");
        let history = self.trim_history(history);
        if history.is_empty() {
            prompt.push_str("(no previous messages)\n");
        }
        for message in history {
            let speaker = match message.role {
                Role::User => "Human",
                Role::Assistant => "Assistant",
            };
            prompt.push_str(&format!("{speaker}: {}\n", message.content));
        }

        prompt.push_str(&format!("\nHuman: {input}\n"));
        for entry in scratchpad {
            self.render_entry(&mut prompt, entry);
        }
        prompt.push_str("Thought:");
        prompt
    }

    fn render_entry(&self, prompt: &mut String, entry: &ScratchpadEntry) {
        let observation = truncate_observation(&entry.observation, self.max_observation_chars);
        if entry.kind == ObservationKind::MalformedResponse {
            let raw = truncate_observation(&entry.argument, self.max_observation_chars);
            prompt.push_str(&format!("{}\nObservation: {observation}\n", raw.trim_end()));
            return;
        }
        prompt.push_str(&format!(
            "Action: {}\nAction Input: {}\nObservation: {observation}\n",
            entry.tool_name, entry.argument
        ));
    }

    fn trim_history<'a>(&self, history: &'a [Message]) -> &'a [Message] {
        let Some(limit) = self.max_history_messages else {
            return history;
        };
        if history.len() <= limit {
            return history;
        }
        let start = history.len() - limit;
        // Advance to the next user message so an answer never appears without its question.
        let offset = history[start..]
            .iter()
            .position(|m| m.role == Role::User)
            .unwrap_or(history.len() - start);
        &history[start + offset..]
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PERSONA)
    }
}

fn truncate_observation(output: &str, max_chars: usize) -> String {
    let total_chars = output.chars().count();
    if total_chars <= max_chars {
        return output.to_string();
    }

    let kept = output.chars().take(max_chars).collect::<String>();
    let cut = total_chars - max_chars;
    format!("{kept}\n...[observation truncated: {cut} chars omitted]")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOOLS: &[(&str, &str)] = &[
        ("respond_tool", "reply to the human"),
        ("welcome_email_tool", "send the welcome email"),
    ];

    #[test]
    fn build_is_deterministic() {
        let builder = PromptBuilder::default();
        let history = vec![Message::user("hi"), Message::assistant("hello")];
        let scratchpad = vec![ScratchpadEntry::output("welcome_email_tool", "a@b.com", "sent")];

        let first = builder.build(TOOLS, &history, "send it", &scratchpad);
        let second = builder.build(TOOLS, &history, "send it", &scratchpad);
        assert_eq!(first, second);
    }

    #[test]
    fn build_lists_tools_in_order_and_both_formats() {
        let prompt = PromptBuilder::new("You are a test persona.").build(TOOLS, &[], "hello", &[]);

        assert!(prompt.starts_with("You are a test persona."));
        let respond = prompt.find("respond_tool: reply").expect("respond listed");
        let welcome = prompt.find("welcome_email_tool: send").expect("welcome listed");
        assert!(respond < welcome);
        assert!(prompt.contains("one of [respond_tool, welcome_email_tool]"));
        assert!(prompt.contains("Action Input:"));
        assert!(prompt.contains("\"final_answer\""));
        assert!(prompt.contains("(no previous messages)"));
        assert!(prompt.ends_with("Human: hello\nThought:"));
    }

    #[test]
    fn build_renders_history_and_scratchpad() {
        let history = vec![Message::user("who are you?"), Message::assistant("I am Maria.")];
        let scratchpad = vec![
            ScratchpadEntry::unknown_tool("nonexistent_tool", "x", "not a valid tool"),
            ScratchpadEntry::malformed("I think I should email", "Invalid format"),
        ];
        let prompt = PromptBuilder::default().build(TOOLS, &history, "email a@b.com", &scratchpad);

        assert!(prompt.contains("Human: who are you?\nAssistant: I am Maria.\n"));
        assert!(prompt.contains(
            "Action: nonexistent_tool\nAction Input: x\nObservation: not a valid tool\n"
        ));
        assert!(prompt.contains("I think I should email\nObservation: Invalid format\n"));
    }

    #[test]
    fn history_limit_aligns_to_user_boundary() {
        let history = vec![
            Message::user("u1"),
            Message::assistant("a1"),
            Message::user("u2"),
            Message::assistant("a2"),
        ];
        let builder = PromptBuilder::default().with_history_limit(Some(3));

        let trimmed = builder.trim_history(&history);
        assert_eq!(trimmed.len(), 2);
        assert_eq!(trimmed[0].content, "u2");

        let unlimited = PromptBuilder::default().trim_history(&history);
        assert_eq!(unlimited.len(), 4);
    }

    #[test]
    fn long_observations_are_truncated() {
        let builder = PromptBuilder::default().with_max_observation_chars(10);
        let scratchpad = vec![ScratchpadEntry::output("respond_tool", "x", "a".repeat(25))];
        let prompt = builder.build(TOOLS, &[], "hi", &scratchpad);
        assert!(prompt.contains(&format!("{}\n...[observation truncated: 15 chars omitted]", "a".repeat(10))));
    }

    #[test]
    fn truncate_observation_keeps_short_text() {
        assert_eq!(truncate_observation("short", 10), "short");
    }
}
