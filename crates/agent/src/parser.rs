//! Model completion parsing.
//!
//! Two grammars are recognized. A text action:
//!
//! ```text
//! Thought: the user asked for the onboarding email
//! Action: welcome_email_tool
//! Action Input: jane@company.com
//! ```
//!
//! and a JSON object carrying either a `"final_answer"` key or a
//! tool-call-shaped `"action"` / `"action_input"` pair. A text action wins
//! when both are present.

use std::sync::LazyLock;

use proto::{ParseError, ParsedDecision};
use regex::Regex;
use serde_json::{Map, Value};

/// Key the model uses to hand back its answer to the human.
pub const FINAL_ANSWER_KEY: &str = "final_answer";
const ACTION_KEY: &str = "action";
const ACTION_INPUT_KEY: &str = "action_input";
const FINAL_ANSWER_ACTION: &str = "Final Answer";

static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*Action[ \t]*:[ \t]*([^\n]*)").expect("action regex must compile")
});

static ACTION_INPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*Action[ \t]+Input[ \t]*:").expect("action input regex must compile")
});

/// `Action Input:` written on the same line as the tool name.
static INLINE_INPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bAction[ \t]+Input[ \t]*:").expect("inline input regex must compile")
});

static NEXT_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:Observation|Thought|Action|Action[ \t]+Input|Final[ \t]+Answer)[ \t]*:")
        .expect("keyword regex must compile")
});

enum TextAction {
    Found { tool_name: String, argument: String },
    Incomplete(&'static str),
    Absent,
}

/// Parses a raw completion into the next decision.
///
/// Unknown tool names are returned as-is; resolving them is left to dispatch.
pub fn parse_response(raw: &str) -> Result<ParsedDecision, ParseError> {
    let text_action = find_text_action(raw);
    if let TextAction::Found {
        tool_name,
        argument,
    } = text_action
    {
        return Ok(ParsedDecision::Invoke {
            tool_name,
            argument,
        });
    }

    if let Some(decision) = find_json_decision(raw) {
        return decision;
    }

    let reason = match text_action {
        TextAction::Incomplete(reason) => reason,
        _ if raw.contains(FINAL_ANSWER_KEY) => "the final answer payload is not valid JSON",
        _ => "expected an Action with an Action Input, or a JSON object with a \"final_answer\" key",
    };
    Err(ParseError::malformed(reason, raw))
}

fn find_text_action(raw: &str) -> TextAction {
    let Some(action) = ACTION_RE.captures(raw) else {
        return TextAction::Absent;
    };
    let (Some(whole), Some(line)) = (action.get(0), action.get(1)) else {
        return TextAction::Absent;
    };

    let inline_input = INLINE_INPUT_RE.find(line.as_str());
    let tool_name = inline_input
        .map_or(line.as_str(), |m| &line.as_str()[..m.start()])
        .trim();
    if tool_name.is_empty() {
        return TextAction::Incomplete("the Action line names no tool");
    }

    let rest = match inline_input {
        Some(m) => &raw[line.start() + m.end()..],
        None => {
            let after_action = &raw[whole.end()..];
            let Some(input_marker) = ACTION_INPUT_RE.find(after_action) else {
                return TextAction::Incomplete("found an Action without an Action Input");
            };
            &after_action[input_marker.end()..]
        }
    };

    let end = NEXT_KEYWORD_RE
        .find_iter(rest)
        // A keyword at offset 0 would only be the rest of the marker line.
        .find(|m| m.start() > 0 && rest[..m.start()].contains('\n'))
        .map_or(rest.len(), |m| m.start());

    TextAction::Found {
        tool_name: tool_name.to_string(),
        argument: rest[..end].trim().to_string(),
    }
}

/// Tries every `{` in order; the first object with a recognized key decides.
fn find_json_decision(raw: &str) -> Option<Result<ParsedDecision, ParseError>> {
    for (start, _) in raw.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Value>();
        let Some(Ok(Value::Object(object))) = stream.next() else {
            continue;
        };
        if let Some(decision) = decision_from_object(&object, raw) {
            return Some(decision);
        }
    }
    None
}

fn decision_from_object(
    object: &Map<String, Value>,
    raw: &str,
) -> Option<Result<ParsedDecision, ParseError>> {
    if let Some(action) = object.get(ACTION_KEY) {
        let Value::String(action) = action else {
            return Some(Err(ParseError::malformed("\"action\" must be a string", raw)));
        };
        let Some(Value::String(input)) = object.get(ACTION_INPUT_KEY) else {
            return Some(Err(ParseError::malformed(
                "\"action_input\" must be a string",
                raw,
            )));
        };
        let action = action.trim();
        if action.is_empty() {
            return Some(Err(ParseError::malformed("\"action\" names no tool", raw)));
        }
        if action == FINAL_ANSWER_ACTION {
            return Some(Ok(ParsedDecision::Finish {
                answer_text: input.clone(),
            }));
        }
        return Some(Ok(ParsedDecision::Invoke {
            tool_name: action.to_string(),
            argument: input.clone(),
        }));
    }

    match object.get(FINAL_ANSWER_KEY)? {
        Value::String(answer) => Some(Ok(ParsedDecision::Finish {
            answer_text: answer.clone(),
        })),
        _ => Some(Err(ParseError::malformed(
            "\"final_answer\" must be a string",
            raw,
        ))),
    }
}
