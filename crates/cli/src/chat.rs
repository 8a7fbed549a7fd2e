//! Line-oriented chat front end.

use std::sync::Arc;

use agent::Session;
use proto::{AgentError, ObservationKind, Role, ScratchpadEntry};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// First assistant message of every conversation.
pub const GREETING: &str = "Hi, I am Maria, your personal HR assistant. To get started, can you please provide the following information:\n\
    - First Name\n\
    - Last Name\n\
    - Email Address";

/// Longest message accepted from the user, in whitespace-separated words.
pub const MAX_INPUT_WORDS: usize = 500;

/// What a line typed at the prompt asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Quit,
    Reset,
    ToggleDebug,
    Help,
    Empty,
    Message(String),
}

pub fn parse_input(line: &str) -> ChatCommand {
    let trimmed = line.trim();
    match trimmed {
        "" => ChatCommand::Empty,
        "/quit" | "/exit" => ChatCommand::Quit,
        "/reset" => ChatCommand::Reset,
        "/debug" => ChatCommand::ToggleDebug,
        "/help" => ChatCommand::Help,
        _ => ChatCommand::Message(trimmed.to_string()),
    }
}

/// Rejects messages over [`MAX_INPUT_WORDS`].
pub fn check_word_limit(input: &str) -> Result<(), String> {
    let words = input.split_whitespace().count();
    if words > MAX_INPUT_WORDS {
        return Err(format!(
            "Please keep your message under {MAX_INPUT_WORDS} words ({words} given)."
        ));
    }
    Ok(())
}

/// Renders a turn's steps for debug mode.
pub fn format_trace(trace: &[ScratchpadEntry]) -> String {
    trace
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let step = i + 1;
            match entry.kind {
                ObservationKind::MalformedResponse => format!(
                    "  [{step}] malformed response: {}\n      -> {}",
                    entry.argument.trim(),
                    entry.observation
                ),
                kind => format!(
                    "  [{step}] {}({}) [{kind}]\n      -> {}",
                    entry.tool_name, entry.argument, entry.observation
                ),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn print_help() {
    println!("Commands: /reset (start over), /debug (toggle step display), /quit");
}

/// Runs the interactive loop until `/quit` or end of input.
///
/// Ctrl-C while a turn is running cancels that turn only.
pub async fn run_chat(session: Arc<Session>, mut debug: bool) -> anyhow::Result<()> {
    for message in session.history() {
        if message.role == Role::Assistant {
            println!("Maria: {}\n", message.content);
        }
    }
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let input = match parse_input(&line) {
            ChatCommand::Quit => break,
            ChatCommand::Empty => continue,
            ChatCommand::Help => {
                print_help();
                continue;
            }
            ChatCommand::ToggleDebug => {
                debug = !debug;
                println!("Debug mode {}", if debug { "on" } else { "off" });
                continue;
            }
            ChatCommand::Reset => {
                session.reset();
                println!("Conversation reset.\n\nMaria: {GREETING}\n");
                continue;
            }
            ChatCommand::Message(input) => input,
        };

        if let Err(msg) = check_word_limit(&input) {
            println!("{msg}");
            continue;
        }

        let handle = session.submit(input);
        let canceller = handle.canceller();
        let turn = handle.wait();
        tokio::pin!(turn);
        let outcome = tokio::select! {
            outcome = &mut turn => outcome,
            _ = tokio::signal::ctrl_c() => {
                canceller.cancel();
                turn.await
            }
        };

        match outcome {
            Ok(result) => {
                if debug && !result.trace.is_empty() {
                    println!("{}", format_trace(&result.trace));
                }
                if result.is_degraded() {
                    info!(reason = %result.terminal_reason, "Turn degraded");
                }
                println!("Maria: {}\n", result.answer);
            }
            Err(AgentError::Cancelled) => println!("(cancelled)\n"),
            Err(e) => {
                warn!(error = %e, "Turn failed");
                eprintln!("Error: {e}\n");
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn print_prompt() {
    use std::io::Write as _;
    print!("You: ");
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_input_recognizes_commands() {
        assert_eq!(parse_input("/quit"), ChatCommand::Quit);
        assert_eq!(parse_input("  /reset "), ChatCommand::Reset);
        assert_eq!(parse_input("/debug"), ChatCommand::ToggleDebug);
        assert_eq!(parse_input("   "), ChatCommand::Empty);
        assert_eq!(
            parse_input(" I start on Monday "),
            ChatCommand::Message("I start on Monday".to_string())
        );
    }

    #[test]
    fn word_limit_allows_exactly_the_maximum() {
        let ok = vec!["word"; MAX_INPUT_WORDS].join(" ");
        assert!(check_word_limit(&ok).is_ok());

        let too_long = vec!["word"; MAX_INPUT_WORDS + 1].join(" ");
        let err = check_word_limit(&too_long).expect_err("over limit");
        assert!(err.contains("under 500 words"));
    }

    #[test]
    fn format_trace_shows_each_step() {
        let trace = vec![
            ScratchpadEntry::output("welcome_email_tool", "a@b.com", "An email has been sent to a@b.com"),
            ScratchpadEntry::malformed("hmm", "Invalid format"),
        ];
        let out = format_trace(&trace);
        assert!(out.contains("[1] welcome_email_tool(a@b.com) [output]"));
        assert!(out.contains("-> An email has been sent to a@b.com"));
        assert!(out.contains("[2] malformed response: hmm"));
    }

    #[test]
    fn greeting_asks_for_contact_details() {
        assert!(GREETING.starts_with("Hi, I am Maria"));
        assert!(GREETING.contains("Email Address"));
    }
}
