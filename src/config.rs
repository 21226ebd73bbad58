use anyhow::{bail, Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::reply::{Button, ButtonTarget, Formatting};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub welcome: WelcomeConfig,
    #[serde(default)]
    pub replies: RepliesConfig,
    #[serde(default)]
    pub errors: ErrorsConfig,
    #[serde(default)]
    pub referrals: ReferralsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    /// Token used when the environment variable is unset
    #[serde(default)]
    pub bot_token: String,
    /// Name of the environment variable holding the bot token
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Exit cleanly with a logged message when no token is available
    #[serde(default = "default_true")]
    pub require_token: bool,
    /// Publish the command list to the Telegram command menu on startup
    #[serde(default = "default_true")]
    pub register_commands: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            token_env: default_token_env(),
            require_token: true,
            register_commands: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WelcomeConfig {
    /// Reply to /start; `{referral_id}` is replaced with the referral or "none"
    #[serde(default = "default_welcome_text")]
    pub text: String,
    #[serde(default)]
    pub formatting: Option<Formatting>,
    #[serde(default)]
    pub buttons: Vec<ButtonConfig>,
}

impl Default for WelcomeConfig {
    fn default() -> Self {
        Self {
            text: default_welcome_text(),
            formatting: None,
            buttons: Vec::new(),
        }
    }
}

impl WelcomeConfig {
    /// Validated button layout, in configured order
    pub fn buttons(&self) -> Result<Vec<Button>> {
        self.buttons.iter().map(ButtonConfig::to_button).collect()
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ButtonKind {
    #[default]
    Url,
    WebApp,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ButtonConfig {
    pub label: String,
    pub url: String,
    #[serde(default)]
    pub kind: ButtonKind,
}

impl ButtonConfig {
    pub fn to_button(&self) -> Result<Button> {
        let url = Url::parse(&self.url)
            .with_context(|| format!("Invalid URL for button '{}': {}", self.label, self.url))?;
        let target = match self.kind {
            ButtonKind::Url => ButtonTarget::Url(url),
            ButtonKind::WebApp => {
                if url.scheme() != "https" {
                    bail!("Web app button '{}' must use an https URL", self.label);
                }
                ButtonTarget::WebApp(url)
            }
        };
        Ok(Button {
            label: self.label.clone(),
            target,
        })
    }
}

/// How outbound sends are driven
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Await each send and propagate its error
    #[default]
    Awaited,
    /// Spawn each send and only log its outcome
    Detached,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RepliesConfig {
    #[serde(default)]
    pub delivery: Delivery,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ErrorsConfig {
    /// Log handler errors with the offending update and swallow them
    #[serde(default = "default_true")]
    pub report: bool,
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self { report: true }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReferralBackend {
    #[default]
    Log,
    Sqlite,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReferralsConfig {
    #[serde(default)]
    pub store: ReferralBackend,
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,
}

impl Default for ReferralsConfig {
    fn default() -> Self {
        Self {
            store: ReferralBackend::Log,
            database_path: default_db_path(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_token_env() -> String {
    "TOKEN".to_string()
}

fn default_welcome_text() -> String {
    "Welcome! Your referral ID is {referral_id}.".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("referrals.db")
}

impl Config {
    pub const DEFAULT_PATH: &'static str = "config.toml";

    /// Load the config file. A missing file is only tolerated when
    /// `required` is false, in which case defaults are used.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        // Surface bad button URLs at startup rather than on the first /start
        config.welcome.buttons()?;
        Ok(config)
    }

    /// Resolve the bot token from the environment value (if any), falling
    /// back to the config file. Empty values count as absent.
    pub fn bot_token(&self, env_value: Option<String>) -> Option<String> {
        env_value
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .or_else(|| {
                let token = self.telegram.bot_token.trim();
                (!token.is_empty()).then(|| token.to_string())
            })
    }

    /// Token lookup against the real process environment
    pub fn bot_token_from_env(&self) -> Option<String> {
        self.bot_token(std::env::var(&self.telegram.token_env).ok())
    }
}
