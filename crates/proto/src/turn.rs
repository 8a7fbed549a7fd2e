//! Per-turn decision, trace, and result types.

use serde::{Deserialize, Serialize};

/// What produced the observation of a scratchpad step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    /// The tool ran and returned its output.
    Output,
    /// The model named a tool that is not registered.
    UnknownTool,
    /// The tool body failed; the observation is a sanitized summary.
    ToolError,
    /// The model output could not be parsed; the argument holds the raw text.
    MalformedResponse,
}

impl ObservationKind {
    /// Returns true for every kind except a successful tool output.
    pub fn is_error(self) -> bool {
        !matches!(self, Self::Output)
    }
}

impl std::fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Output => "output",
            Self::UnknownTool => "unknown_tool",
            Self::ToolError => "tool_error",
            Self::MalformedResponse => "malformed_response",
        };
        f.write_str(s)
    }
}

/// One intermediate step of a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScratchpadEntry {
    /// Tool the model asked for. Empty for malformed responses.
    pub tool_name: String,
    /// Argument sent to the tool, or the raw model text for malformed responses.
    pub argument: String,
    /// Text fed back to the model on the next round.
    pub observation: String,
    /// Where the observation came from.
    pub kind: ObservationKind,
}

impl ScratchpadEntry {
    /// Step whose tool ran successfully.
    pub fn output(
        tool_name: impl Into<String>,
        argument: impl Into<String>,
        observation: impl Into<String>,
    ) -> Self {
        Self::with_kind(tool_name, argument, observation, ObservationKind::Output)
    }

    /// Step that named a tool missing from the registry.
    pub fn unknown_tool(
        tool_name: impl Into<String>,
        argument: impl Into<String>,
        observation: impl Into<String>,
    ) -> Self {
        Self::with_kind(tool_name, argument, observation, ObservationKind::UnknownTool)
    }

    /// Step whose tool body failed.
    pub fn tool_error(
        tool_name: impl Into<String>,
        argument: impl Into<String>,
        observation: impl Into<String>,
    ) -> Self {
        Self::with_kind(tool_name, argument, observation, ObservationKind::ToolError)
    }

    /// Step recording an unparsable completion.
    pub fn malformed(raw: impl Into<String>, observation: impl Into<String>) -> Self {
        Self::with_kind(
            String::new(),
            raw,
            observation,
            ObservationKind::MalformedResponse,
        )
    }

    fn with_kind(
        tool_name: impl Into<String>,
        argument: impl Into<String>,
        observation: impl Into<String>,
        kind: ObservationKind,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            argument: argument.into(),
            observation: observation.into(),
            kind,
        }
    }
}

/// What the model decided in one round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedDecision {
    /// Run `tool_name` with `argument`.
    Invoke {
        tool_name: String,
        argument: String,
    },
    /// Stop and answer the human.
    Finish { answer_text: String },
}

/// Why a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// The model produced a final answer or called the terminal tool.
    FinishedNormally,
    /// The configured round limit was hit without a final answer.
    RoundLimitReached,
    /// Too many consecutive completions failed to parse.
    UnrecoverableParseError,
}

impl std::fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::FinishedNormally => "finished_normally",
            Self::RoundLimitReached => "round_limit_reached",
            Self::UnrecoverableParseError => "unrecoverable_parse_error",
        };
        f.write_str(s)
    }
}

/// Outcome of one user turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTurnResult {
    /// Text to show the human. Never blank: an empty model answer is replaced
    /// by the degraded answer.
    pub answer: String,
    /// Every intermediate step, in order.
    pub trace: Vec<ScratchpadEntry>,
    /// Why the turn ended.
    pub terminal_reason: TerminalReason,
    /// Number of model calls made.
    pub rounds: usize,
}

impl AgentTurnResult {
    /// Returns true when the turn was forced to end without a model answer.
    pub fn is_degraded(&self) -> bool {
        self.terminal_reason != TerminalReason::FinishedNormally
    }
}
