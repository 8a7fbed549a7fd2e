//! The reasoning/acting loop that drives one user turn.

use std::sync::Arc;
use std::time::{Duration, Instant};

use proto::{
    AgentError, AgentTurnResult, LlmError, Message, ParseError, ParsedDecision, ScratchpadEntry,
    TerminalReason, ToolError,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    llm::LlmProvider, parser::parse_response, prompt::PromptBuilder, tool_registry::ToolRegistry,
};

/// Answer returned when a turn is forced to end.
pub const DEGRADED_ANSWER: &str = "I wasn't able to complete that - please rephrase your request.";

const MAX_TOOL_ERROR_CHARS: usize = 300;

/// Loop limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Model calls allowed per turn.
    pub max_rounds: usize,
    /// Unparsable completions in a row that end the turn.
    pub max_consecutive_parse_failures: usize,
    /// Per-call limit for the model.
    pub model_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: 8,
            max_consecutive_parse_failures: 2,
            model_timeout: Duration::from_secs(60),
        }
    }
}

/// Where the loop is within a turn.
enum LoopState {
    Prompting,
    Dispatching { tool_name: String, argument: String },
    Finishing { answer: String, reason: TerminalReason },
}

/// Runs user turns against a model and a shared tool registry.
///
/// The loop holds no per-session state: history comes in, an
/// [`AgentTurnResult`] comes out, and recording it is the caller's job.
pub struct AgentLoop {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    prompt: PromptBuilder,
    config: AgentConfig,
}

impl AgentLoop {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        prompt: PromptBuilder,
        config: AgentConfig,
    ) -> Self {
        Self {
            llm,
            tools,
            prompt,
            config,
        }
    }

    /// Runs one turn to completion.
    pub async fn run_turn(
        &self,
        history: &[Message],
        user_input: &str,
    ) -> Result<AgentTurnResult, AgentError> {
        self.run_turn_cancellable(history, user_input, &CancellationToken::new())
            .await
    }

    /// Runs one turn, giving up with [`AgentError::Cancelled`] once `cancel` fires.
    ///
    /// Round limits and repeated parse failures end the turn with a degraded
    /// answer instead of an error. Only model failures and cancellation escape.
    pub async fn run_turn_cancellable(
        &self,
        history: &[Message],
        user_input: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentTurnResult, AgentError> {
        let mut scratchpad: Vec<ScratchpadEntry> = Vec::new();
        let mut round = 0usize;
        let mut model_calls = 0usize;
        let mut parse_failures = 0usize;
        let mut state = LoopState::Prompting;

        loop {
            state = match state {
                LoopState::Prompting => {
                    round += 1;
                    if round > self.config.max_rounds {
                        warn!(
                            max_rounds = self.config.max_rounds,
                            "Round limit reached without a final answer"
                        );
                        LoopState::Finishing {
                            answer: DEGRADED_ANSWER.to_string(),
                            reason: TerminalReason::RoundLimitReached,
                        }
                    } else {
                        let prompt = self.prompt.build(
                            &self.tools.describe_all(),
                            history,
                            user_input,
                            &scratchpad,
                        );
                        let completion = self.await_model(&prompt, round, cancel).await?;
                        model_calls += 1;

                        match parse_response(&completion) {
                            Ok(ParsedDecision::Invoke {
                                tool_name,
                                argument,
                            }) => LoopState::Dispatching {
                                tool_name,
                                argument,
                            },
                            Ok(ParsedDecision::Finish { answer_text }) => LoopState::Finishing {
                                answer: answer_text,
                                reason: TerminalReason::FinishedNormally,
                            },
                            Err(err) => {
                                parse_failures += 1;
                                warn!(round, parse_failures, error = %err, "Malformed model response");
                                scratchpad.push(ScratchpadEntry::malformed(
                                    err.raw(),
                                    corrective_observation(&err),
                                ));
                                if parse_failures >= self.config.max_consecutive_parse_failures {
                                    LoopState::Finishing {
                                        answer: DEGRADED_ANSWER.to_string(),
                                        reason: TerminalReason::UnrecoverableParseError,
                                    }
                                } else {
                                    LoopState::Prompting
                                }
                            }
                        }
                    }
                }

                LoopState::Dispatching {
                    tool_name,
                    argument,
                } => {
                    if cancel.is_cancelled() {
                        return Err(AgentError::Cancelled);
                    }
                    if self.tools.is_terminal(&tool_name) {
                        debug!(tool = %tool_name, "Terminal tool selected");
                        LoopState::Finishing {
                            answer: argument,
                            reason: TerminalReason::FinishedNormally,
                        }
                    } else {
                        let entry = self.dispatch(&tool_name, &argument).await;
                        if !entry.kind.is_error() {
                            parse_failures = 0;
                        }
                        scratchpad.push(entry);
                        LoopState::Prompting
                    }
                }

                LoopState::Finishing { answer, reason } => {
                    let answer = if answer.trim().is_empty() {
                        warn!("Model finished with a blank answer");
                        DEGRADED_ANSWER.to_string()
                    } else {
                        answer
                    };
                    info!(
                        rounds = model_calls,
                        steps = scratchpad.len(),
                        reason = %reason,
                        "Turn finished"
                    );
                    return Ok(AgentTurnResult {
                        answer,
                        trace: scratchpad,
                        terminal_reason: reason,
                        rounds: model_calls,
                    });
                }
            };
        }
    }

    async fn await_model(
        &self,
        prompt: &str,
        round: usize,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        debug!(round, "LLM call");
        let t0 = Instant::now();
        let timeout = self.config.model_timeout;
        let completion = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            result = tokio::time::timeout(timeout, self.llm.complete(prompt)) => {
                result.map_err(|_| LlmError::Timeout(timeout.as_secs()))??
            }
        };
        debug!(round, elapsed_ms = %t0.elapsed().as_millis(), "LLM response received");
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        Ok(completion)
    }

    async fn dispatch(&self, tool_name: &str, argument: &str) -> ScratchpadEntry {
        match self.tools.dispatch(tool_name, argument).await {
            Ok(output) => {
                debug!(tool = %tool_name, output_chars = output.len(), "Tool succeeded");
                ScratchpadEntry::output(tool_name, argument, output)
            }
            Err(ToolError::UnknownTool(_)) => {
                warn!(tool = %tool_name, "Model requested an unknown tool");
                let observation = format!(
                    "{tool_name} is not a valid tool, try one of [{}].",
                    self.tools.tool_names().join(", ")
                );
                ScratchpadEntry::unknown_tool(tool_name, argument, observation)
            }
            Err(err) => {
                warn!(tool = %tool_name, error = %err, "Tool failed");
                ScratchpadEntry::tool_error(tool_name, argument, sanitize_tool_error(&err))
            }
        }
    }
}

fn corrective_observation(err: &ParseError) -> String {
    format!(
        "Invalid format ({err}). To use a tool, reply with an \"Action:\" line followed by an \
         \"Action Input:\" line. To answer the human, reply with a JSON object like \
         {{\"final_answer\": \"...\"}}."
    )
}

/// First line of the error, capped so internals never flood the prompt.
fn sanitize_tool_error(err: &ToolError) -> String {
    let text = err.to_string();
    let first_line = text.lines().next().unwrap_or_default().trim();
    let mut summary: String = first_line.chars().take(MAX_TOOL_ERROR_CHARS).collect();
    if first_line.chars().count() > MAX_TOOL_ERROR_CHARS {
        summary.push_str("...");
    }
    format!("Error: {summary}")
}
