use proto::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_MAX_ROUNDS: usize = 8;
const DEFAULT_MAX_PARSE_FAILURES: usize = 2;
const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 60;
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_POLICY_TOP_K: usize = 4;

/// Returns `~/.maria`, falling back to `./.maria` without `HOME`.
pub fn maria_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".maria")
}

/// Top-level CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Model and loop settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Outgoing mail settings.
    #[serde(default)]
    pub email: EmailConfig,

    /// Policy document settings.
    #[serde(default)]
    pub policies: PoliciesConfig,
}

/// Agent model and loop config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Chat model id.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key (env overrides applied at load time; see `Config::load`).
    #[serde(default)]
    pub api_key: String,
    /// Explicit API base URL for OpenAI-compatible endpoints.
    pub base_url: Option<String>,
    /// Model calls allowed per turn.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    /// Unparsable completions in a row that end a turn.
    #[serde(default = "default_max_parse_failures")]
    pub max_consecutive_parse_failures: usize,
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// Prior messages rendered into the prompt; all when unset.
    pub max_history_messages: Option<usize>,
    /// Replaces the built-in persona text.
    pub persona: Option<String>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_rounds() -> usize {
    DEFAULT_MAX_ROUNDS
}

fn default_max_parse_failures() -> usize {
    DEFAULT_MAX_PARSE_FAILURES
}

fn default_model_timeout_secs() -> u64 {
    DEFAULT_MODEL_TIMEOUT_SECS
}

fn default_tool_timeout_secs() -> u64 {
    DEFAULT_TOOL_TIMEOUT_SECS
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: String::new(),
            base_url: None,
            max_rounds: default_max_rounds(),
            max_consecutive_parse_failures: default_max_parse_failures(),
            model_timeout_secs: default_model_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            max_history_messages: None,
            persona: None,
        }
    }
}

impl AgentConfig {
    /// Returns the explicit base URL when non-empty.
    pub fn effective_base_url(&self) -> Option<&str> {
        self.base_url.as_deref().filter(|url| !url.is_empty())
    }

    /// Loop limits for the agent runtime.
    pub fn loop_config(&self) -> agent::AgentConfig {
        agent::AgentConfig {
            max_rounds: self.max_rounds,
            max_consecutive_parse_failures: self.max_consecutive_parse_failures,
            model_timeout: Duration::from_secs(self.model_timeout_secs),
        }
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Outgoing mail config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// From address on every email.
    #[serde(default = "default_sender")]
    pub sender: String,
    /// Document attached by `HR_policy_email_tool`.
    #[serde(default = "default_policy_attachment")]
    pub policy_attachment: PathBuf,
    /// Invite link mailed by `slack_invite_tool`; the tool is disabled when empty.
    #[serde(default)]
    pub slack_invite_url: String,
}

fn default_sender() -> String {
    "hr@company.com".to_string()
}

fn default_policy_attachment() -> PathBuf {
    maria_home().join("policies").join("HR_policies.pdf")
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            sender: default_sender(),
            policy_attachment: default_policy_attachment(),
            slack_invite_url: String::new(),
        }
    }
}

/// Policy document config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoliciesConfig {
    /// Plain-text policy document indexed for `hr_policy_qa_tool`.
    #[serde(default = "default_policy_document")]
    pub document: PathBuf,
    /// Passages returned per question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_policy_document() -> PathBuf {
    maria_home().join("policies").join("hr_policies.txt")
}

fn default_top_k() -> usize {
    DEFAULT_POLICY_TOP_K
}

impl Default for PoliciesConfig {
    fn default() -> Self {
        Self {
            document: default_policy_document(),
            top_k: default_top_k(),
        }
    }
}

impl Config {
    /// Loads configuration from explicit path, fallback locations, and env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = path.map(|p| p.to_path_buf()).or_else(|| {
            // Look in current dir, then home dir
            let cwd = std::env::current_dir().ok()?.join("maria.toml");
            if cwd.exists() {
                return Some(cwd);
            }
            let home_config = maria_home().join("config.toml");
            if home_config.exists() {
                return Some(home_config);
            }
            None
        });
        debug!(path = ?config_path, "Config file resolved");

        let mut config = if let Some(path) = config_path {
            let content = std::fs::read_to_string(&path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(|e| ConfigError::Toml(e.to_string()))?
        } else {
            Config::default()
        };

        if let Ok(key) = std::env::var("MARIA_API_KEY") {
            config.agent.api_key = key;
        }
        if let Ok(model) = std::env::var("MARIA_MODEL") {
            config.agent.model = model;
        }
        if let Ok(url) = std::env::var("MARIA_BASE_URL") {
            config.agent.base_url = Some(url);
        }
        if let Ok(rounds) = std::env::var("MARIA_MAX_ROUNDS") {
            config.agent.max_rounds =
                rounds
                    .trim()
                    .parse::<usize>()
                    .map_err(|e| ConfigError::InvalidValue {
                        field: "MARIA_MAX_ROUNDS".to_string(),
                        reason: e.to_string(),
                    })?;
        }

        config.validate()?;
        debug!(
            model = %config.agent.model,
            base_url = ?config.agent.effective_base_url(),
            max_rounds = config.agent.max_rounds,
            "Config loaded"
        );
        Ok(config)
    }

    /// Rejects limits the agent loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("agent.max_rounds", self.agent.max_rounds as u64),
            (
                "agent.max_consecutive_parse_failures",
                self.agent.max_consecutive_parse_failures as u64,
            ),
            ("agent.model_timeout_secs", self.agent.model_timeout_secs),
            ("agent.tool_timeout_secs", self.agent.tool_timeout_secs),
            ("policies.top_k", self.policies.top_k as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.agent.model.trim().is_empty() {
            return Err(ConfigError::MissingField("agent.model".to_string()));
        }
        Ok(())
    }

    /// Resolves the API key.
    ///
    /// Priority:
    /// 1. `agent.api_key` in config file (or `MARIA_API_KEY` applied at load time)
    /// 2. `OPENAI_API_KEY`
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if !self.agent.api_key.is_empty() {
            debug!(source = "config", "API key resolved");
            return Ok(self.agent.api_key.clone());
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY")
            && !key.is_empty()
        {
            debug!(source = "env", env_var = "OPENAI_API_KEY", "API key resolved");
            return Ok(key);
        }
        Err(ConfigError::MissingField(
            "agent.api_key (or MARIA_API_KEY / OPENAI_API_KEY)".to_string(),
        ))
    }
}
