//! CLI entrypoint and subcommand orchestration.

mod chat;
mod config;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

#[cfg(not(test))]
use agent::{AgentLoop, OpenAiProvider, PromptBuilder, SessionManager};
use agent::ToolRegistry;
use clap::{Parser, Subcommand};
use config::Config;
use tools::{
    CalendarEventTool, CancelTimeOffTool, EmployeeLookupTool, EmployeeRegistrationTool,
    EmployeeUpdateTool, Hris, HrPolicyEmailTool, InMemoryCalendar, InMemoryHris, KeywordIndex,
    OutboxMailer, PolicyQaTool, RespondTool, SlackInviteTool, TimeOffBalanceTool,
    TimeOffRequestTool, WelcomeEmailTool,
};
#[cfg(not(test))]
use tracing::info;
use tracing::warn;
#[cfg(not(test))]
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Top-level command-line arguments for the maria application.
#[derive(Parser)]
#[command(name = "maria")]
#[command(about = "Maria, your personal HR assistant", version = "0.1.0")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Enable debug logging to ~/.maria/logs and show each turn's steps
    #[arg(long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// CLI subcommands available in the application.
#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Start an interactive conversation (default when no subcommand is given)
    Chat,

    /// Send a single message and exit
    Run {
        /// Message to send to the assistant
        #[arg(short = 'e', long)]
        exec: String,
    },
}

#[cfg(not(test))]
#[tokio::main]
/// Program entrypoint.
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Chat);

    // When --debug is passed, write debug-level logs to ~/.maria/logs/debug.YYYY-MM-DD.log
    // using daily rotation so logs accumulate across sessions.
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    // WorkerGuard must outlive main() so buffered file writes are flushed on exit.
    let _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>;

    if cli.debug {
        let log_dir = config::maria_home().join("logs");
        std::fs::create_dir_all(&log_dir).ok();
        let appender = tracing_appender::rolling::daily(&log_dir, "debug.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        _file_guard = Some(guard);

        let console = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter);
        let file = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .with_filter(EnvFilter::new("debug,hyper_util=info,rustls=info,reqwest=info"));
        tracing_subscriber::registry()
            .with(console)
            .with(file)
            .init();
        info!(
            version = env!("CARGO_PKG_VERSION"),
            command = ?command,
            log_level = %cli.log_level,
            "========== maria session start =========="
        );
    } else {
        _file_guard = None;
        fmt()
            .with_env_filter(console_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let config = Config::load(cli.config.as_deref())?;
    let manager = SessionManager::new(build_agent(&config).await?).with_greeting(chat::GREETING);

    match command {
        Commands::Chat => chat::run_chat(manager.create(), cli.debug).await,
        Commands::Run { exec } => cmd_run(&manager, exec, cli.debug).await,
    }
}

#[cfg(not(test))]
/// Sends one message and prints the answer.
async fn cmd_run(manager: &SessionManager, exec: String, debug: bool) -> anyhow::Result<()> {
    chat::check_word_limit(&exec).map_err(|msg| anyhow::anyhow!(msg))?;
    let session = manager.create();
    let result = session.send(exec).await?;
    if debug && !result.trace.is_empty() {
        println!("{}", chat::format_trace(&result.trace));
    }
    println!("{}", result.answer);
    Ok(())
}

#[cfg(not(test))]
/// Creates the agent loop with the configured model and tools.
async fn build_agent(config: &Config) -> proto::Result<Arc<AgentLoop>> {
    let registry = build_registry(config).await?;

    let api_key = config.resolve_api_key()?;
    let model = config.agent.model.as_str();
    let llm: Arc<dyn agent::LlmProvider> = match config.agent.effective_base_url() {
        Some(base_url) => Arc::new(OpenAiProvider::with_base_url(api_key, base_url, model)),
        None => Arc::new(OpenAiProvider::new(api_key, model)),
    };

    let prompt = match &config.agent.persona {
        Some(persona) => PromptBuilder::new(persona.clone()),
        None => PromptBuilder::default(),
    }
    .with_history_limit(config.agent.max_history_messages);

    info!(model = %model, tools = registry.len(), "Agent ready");
    Ok(Arc::new(AgentLoop::new(
        llm,
        Arc::new(registry),
        prompt,
        config.agent.loop_config(),
    )))
}

/// Registers the HR tools enabled by `config`.
///
/// The Slack invite tool needs an invite URL and the policy Q&A tool needs a
/// readable policy document; each is skipped with a warning otherwise.
async fn build_registry(config: &Config) -> proto::Result<ToolRegistry> {
    let mailer = Arc::new(OutboxMailer::new(config.email.sender.clone()));
    let mut registry = ToolRegistry::with_timeout(config.agent.tool_timeout());

    registry.register(RespondTool)?;
    registry.register(WelcomeEmailTool::new(mailer.clone()))?;
    registry.register(HrPolicyEmailTool::new(
        mailer.clone(),
        config.email.policy_attachment.clone(),
    ))?;
    if config.email.slack_invite_url.trim().is_empty() {
        warn!("email.slack_invite_url is not set; slack_invite_tool disabled");
    } else {
        registry.register(SlackInviteTool::new(
            mailer.clone(),
            config.email.slack_invite_url.clone(),
        ))?;
    }
    registry.register(CalendarEventTool::new(Arc::new(InMemoryCalendar::new())))?;

    let hris: Arc<dyn Hris> = Arc::new(InMemoryHris::default());
    registry.register(EmployeeRegistrationTool::new(hris.clone()))?;
    registry.register(EmployeeLookupTool::new(hris.clone()))?;
    registry.register(EmployeeUpdateTool::new(hris.clone()))?;
    registry.register(TimeOffRequestTool::new(hris.clone()))?;
    registry.register(TimeOffBalanceTool::new(hris.clone()))?;
    registry.register(CancelTimeOffTool::new(hris))?;

    match KeywordIndex::load(&config.policies.document).await {
        Ok(index) => {
            registry.register(PolicyQaTool::new(Arc::new(index), config.policies.top_k))?;
        }
        Err(e) => warn!(
            path = %config.policies.document.display(),
            error = %e,
            "Policy document unavailable; hr_policy_qa_tool disabled"
        ),
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_is_the_default_command() {
        let cli = Cli::try_parse_from(["maria"]).expect("parse");
        assert!(cli.command.is_none());
        assert!(!cli.debug);
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn run_takes_the_message() {
        let cli = Cli::try_parse_from(["maria", "--debug", "run", "-e", "How many vacation days do I have?"])
            .expect("parse");
        assert!(cli.debug);
        assert_eq!(
            cli.command,
            Some(Commands::Run {
                exec: "How many vacation days do I have?".to_string()
            })
        );
    }

    #[tokio::test]
    async fn build_registry_registers_optional_tools_when_configured() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let document = tmp.path().join("policies.txt");
        std::fs::write(&document, "Vacation. Employees get twenty five days of paid vacation.")
            .expect("write policies");

        let mut config = Config::default();
        config.policies.document = document;
        config.email.slack_invite_url = "https://join.slack.com/t/acme".to_string();

        let registry = build_registry(&config).await.expect("registry");
        assert_eq!(
            registry.tool_names(),
            vec![
                "respond_tool",
                "welcome_email_tool",
                "HR_policy_email_tool",
                "slack_invite_tool",
                "calendar_event_tool",
                "employee_registration_tool",
                "employee_lookup_tool",
                "employee_update_tool",
                "time_off_request_tool",
                "time_off_balance_tool",
                "cancel_time_off_tool",
                "hr_policy_qa_tool",
            ]
        );
        assert!(registry.is_terminal("respond_tool"));
    }

    #[tokio::test]
    async fn build_registry_skips_unconfigured_tools() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut config = Config::default();
        config.policies.document = tmp.path().join("missing.txt");

        let registry = build_registry(&config).await.expect("registry");
        assert!(!registry.contains("slack_invite_tool"));
        assert!(!registry.contains("hr_policy_qa_tool"));
        assert_eq!(registry.len(), 10);
    }
}
