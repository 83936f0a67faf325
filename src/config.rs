//! Startup configuration, parsed once in `main` and passed down explicitly.

use std::path::PathBuf;

use clap::Parser;

use crate::conversation::{ConversationManager, DEFAULT_WINDOW_SIZE};
use crate::error::{ConfigError, SessionError};
use crate::llm::AnthropicModelConfig;
use crate::session::FileSession;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant participating in an agents workshop. \
You help users understand agent concepts and answer their questions clearly.";

/// Chat with a tool-using agent from the terminal.
#[derive(Debug, Clone, Parser)]
#[command(name = "workshop", version, about, long_about = None)]
pub struct WorkshopConfig {
    /// Anthropic API key.
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model id to chat with.
    #[arg(long, env = "ANTHROPIC_MODEL", default_value = "claude-sonnet-4-5")]
    pub model: String,

    /// Alternative API endpoint (proxy or compatible server).
    #[arg(long, env = "ANTHROPIC_BASE_URL")]
    pub base_url: Option<String>,

    /// Maximum output tokens per model call.
    #[arg(long, default_value_t = 4096)]
    pub max_tokens: u32,

    /// Sampling temperature (0.0 to 1.0).
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Instructions prepended to every conversation.
    #[arg(long, default_value = DEFAULT_SYSTEM_PROMPT)]
    pub system_prompt: String,

    /// Persist the conversation under this id and resume it on restart.
    #[arg(long)]
    pub session_id: Option<String>,

    /// Directory holding session files.
    #[arg(long, default_value = "./agent-session")]
    pub storage_dir: PathBuf,

    /// Messages kept in context; 0 keeps everything.
    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
    pub window_size: usize,

    /// Chat without the built-in tools.
    #[arg(long)]
    pub no_tools: bool,

    /// Log more (-v debug for this crate, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl WorkshopConfig {
    pub fn anthropic_config(&self) -> Result<AnthropicModelConfig, ConfigError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err(ConfigError::InvalidTemperature(temperature));
            }
        }

        let mut config = AnthropicModelConfig::new(api_key, self.model.clone());
        config.api_base_url = self.base_url.clone();
        config.max_tokens = self.max_tokens;
        config.temperature = self.temperature;
        Ok(config)
    }

    /// `None` when no session id was given.
    pub fn session(&self) -> Result<Option<FileSession>, SessionError> {
        self.session_id
            .as_ref()
            .map(|id| FileSession::new(id.clone(), &self.storage_dir))
            .transpose()
    }

    pub fn conversation_manager(&self) -> ConversationManager {
        ConversationManager::from_window_size(self.window_size)
    }

    /// Filter used when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info,agent_workshop=debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> WorkshopConfig {
        WorkshopConfig::try_parse_from(std::iter::once("workshop").chain(args.iter().copied()))
            .expect("arguments parse")
    }

    #[test]
    fn explicit_flags_shape_the_model_config() {
        let config = parse(&[
            "--api-key",
            "sk-test",
            "--model",
            "claude-haiku-4-5",
            "--base-url",
            "http://localhost:8080",
            "--max-tokens",
            "512",
            "--temperature",
            "0.2",
        ]);

        let model = config.anthropic_config().expect("valid");
        assert_eq!(model.api_key, "sk-test");
        assert_eq!(model.model, "claude-haiku-4-5");
        assert_eq!(model.api_base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(model.max_tokens, 512);
        assert_eq!(model.temperature, Some(0.2));
    }

    #[test]
    fn blank_api_key_is_missing() {
        let mut config = parse(&[]);
        config.api_key = Some("   ".to_string());
        assert!(matches!(
            config.anthropic_config(),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let config = parse(&["--api-key", "k", "--temperature", "1.5"]);
        assert!(matches!(
            config.anthropic_config(),
            Err(ConfigError::InvalidTemperature(_))
        ));
    }

    #[test]
    fn session_is_opt_in() {
        assert!(parse(&[]).session().expect("no session").is_none());

        let config = parse(&["--session-id", "current_user_session_id", "--storage-dir", "/tmp/s"]);
        let session = config.session().expect("valid id").expect("session");
        assert_eq!(
            session.path(),
            PathBuf::from("/tmp/s/session_current_user_session_id/session.json")
        );
    }

    #[test]
    fn defaults_match_the_workshop() {
        let config = parse(&[]);
        assert_eq!(config.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(config.storage_dir, PathBuf::from("./agent-session"));
        assert_eq!(
            config.conversation_manager(),
            ConversationManager::SlidingWindow { window_size: 40 }
        );
        assert_eq!(parse(&["--window-size", "0"]).conversation_manager(), ConversationManager::Null);
        assert_eq!(parse(&["-vv"]).log_filter(), "trace");
        assert!(!config.no_tools);
    }
}
