//! Command line and settings-file configuration.
//!
//! Precedence: built-in defaults, then the optional JSON settings file, then
//! environment variables and flags.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use agent_core::{ChatConfig, RateLimits};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LOG_FILTER: &str = "info,ai_agent=debug";

#[derive(Debug, Parser)]
#[command(name = "browser-chat", version)]
#[command(about = "Chat relay with a multi-stage agent workflow")]
pub struct Cli {
    /// JSON settings file
    #[arg(long, global = true, env = "BROWSER_CHAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Anthropic API key
    #[arg(long, global = true, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model identifier sent to the API
    #[arg(long, global = true, env = "BROWSER_CHAT_MODEL")]
    pub model: Option<String>,

    /// API origin, e.g. a proxy in front of api.anthropic.com
    #[arg(long, global = true, env = "BROWSER_CHAT_BASE_URL")]
    pub base_url: Option<String>,

    /// Answer every question with a single model call
    #[arg(long, global = true)]
    pub no_agent: bool,

    /// Identify clients by X-Forwarded-For / X-Real-IP (only behind a proxy)
    #[arg(long, global = true)]
    pub trust_proxy: bool,

    /// tracing filter directives (falls back to RUST_LOG)
    #[arg(long, global = true, env = "BROWSER_CHAT_LOG")]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP relay (default)
    Serve {
        #[arg(long, env = "BROWSER_CHAT_LISTEN")]
        listen: Option<SocketAddr>,
    },
    /// Answer one question in the terminal
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Skip the workflow even for complex questions
        #[arg(long)]
        direct: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub listen: SocketAddr,
    pub api_key: Option<String>,
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Rate-limit by proxy headers instead of the socket peer address.
    pub trust_proxy: bool,
    pub chat: ChatConfig,
    pub rate_limits: RateLimits,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 3011)),
            api_key: None,
            base_url: llm_router::DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 120,
            trust_proxy: false,
            chat: ChatConfig::default(),
            rate_limits: RateLimits::default(),
        }
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing settings file {}", path.display()))
    }

    pub fn resolve(cli: &Cli) -> Result<Self> {
        let mut settings = Self::load(cli.config.as_deref())?;
        settings.apply(cli);
        Ok(settings)
    }

    fn apply(&mut self, cli: &Cli) {
        if let Some(key) = &cli.api_key {
            self.api_key = Some(key.clone());
        }
        if let Some(model) = &cli.model {
            self.chat.workflow.model_options.model = model.clone();
        }
        if let Some(base_url) = &cli.base_url {
            self.base_url = base_url.clone();
        }
        if cli.no_agent {
            self.chat.agent_mode = false;
        }
        if cli.trust_proxy {
            self.trust_proxy = true;
        }
        if let Some(Command::Serve {
            listen: Some(listen),
        }) = &cli.command
        {
            self.listen = *listen;
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
