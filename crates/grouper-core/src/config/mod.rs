mod defaults;


use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::GrouperError;
use defaults::*;

/// Top-level Grouper configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// General agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Handle people mention in groups, without the leading `@`.
    #[serde(default = "default_handle")]
    pub handle: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            handle: default_handle(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Messaging platform bridge connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_platform_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Long-poll timeout for the event stream.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: default_platform_base_url(),
            api_key: String::new(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

/// One external name service in the resolution chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameServiceConfig {
    pub name: String,
    /// URL with a `{name}` placeholder for the handle.
    pub url_template: String,
    /// JSON field carrying the resolved address.
    #[serde(default = "default_address_field")]
    pub address_field: String,
}

/// Directory / name service chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Tried in order; first positive match wins.
    #[serde(default = "default_name_services")]
    pub services: Vec<NameServiceConfig>,
    /// Suffixes tried for bare handles without a dot (e.g. "bob" → "bob.eth").
    #[serde(default = "default_handle_suffixes")]
    pub handle_suffixes: Vec<String>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            services: default_name_services(),
            handle_suffixes: default_handle_suffixes(),
        }
    }
}

/// Text generator selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider")]
    pub default: String,
    #[serde(default)]
    pub openai: OpenAiConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            default: default_provider(),
            openai: OpenAiConfig::default(),
        }
    }
}

/// OpenAI-compatible provider config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_openai_model(),
            base_url: default_openai_base_url(),
        }
    }
}

/// Handle cache / audit database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Ephemeral per-sender conversation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// State untouched for longer than this is evicted by the sweep.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Recent exchanges kept per sender.
    #[serde(default = "default_history_len")]
    pub history_len: usize,
    /// Pending invitations older than this are dropped by the sweep.
    #[serde(default = "default_invitation_ttl")]
    pub invitation_ttl_secs: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            sweep_interval_secs: default_sweep_interval(),
            history_len: default_history_len(),
            invitation_ttl_secs: default_invitation_ttl(),
        }
    }
}

impl ConversationConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn invitation_ttl(&self) -> Duration {
        Duration::from_secs(self.invitation_ttl_secs)
    }
}

/// Group orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Deadline applied to every remote call.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout(),
        }
    }
}

impl OrchestratorConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.max(1))
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Apply secret overrides from the environment.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(key) = std::env::var("GROUPER_PLATFORM_API_KEY") {
        if !key.is_empty() {
            config.platform.api_key = key;
        }
    }
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.is_empty() {
            config.provider.openai.api_key = key;
        }
    }
}

/// Parse configuration from TOML text.
pub fn parse(content: &str) -> Result<Config, GrouperError> {
    toml::from_str(content).map_err(|e| GrouperError::Config(format!("failed to parse config: {e}")))
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// The file was missing.
    Defaults(PathBuf),
}

impl ConfigSource {
    /// Report the source. Call once the subscriber is installed.
    pub fn log(&self) {
        match self {
            Self::File(path) => tracing::info!("Loaded config from {}", path.display()),
            Self::Defaults(path) => tracing::info!(
                "Config file not found at {}, using defaults",
                path.display()
            ),
        }
    }
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<(Config, ConfigSource), GrouperError> {
    let path = Path::new(path);
    let (mut config, source) = if !path.exists() {
        (Config::default(), ConfigSource::Defaults(path.to_path_buf()))
    } else {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GrouperError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        (parse(&content)?, ConfigSource::File(path.to_path_buf()))
    };

    apply_env_overrides(&mut config);
    Ok((config, source))
}
