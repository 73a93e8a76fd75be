use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::error::{IntelError, Result};
use crate::types::ExecutionMode;

/// Environment variable holding the completion-service API key.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Environment variable holding the backend shared secret.
pub const ENGINE_API_KEY_ENV: &str = "ENGINE_API_KEY";

/// Top-level configuration for partner-intel.
///
/// Loaded from `~/.partner-intel/config.toml` by default. Every section has
/// defaults, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntelConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
}

impl IntelConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: IntelConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration if the file exists.
    ///
    /// `Ok(None)` means there is no file and defaults apply. A file that
    /// exists but cannot be read or parsed is an error, never a silent
    /// switch to the default backend.
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check values that serde cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        self.backend.base_url()?;
        self.backend.execution_mode()?;
        if self.backend.timeout_secs == 0 {
            return Err(IntelError::Config(
                "backend.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.backend.max_quotes == Some(0) {
            return Err(IntelError::Config(
                "backend.max_quotes must be at least 1 when set".to_string(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(IntelError::Config("llm.model must not be empty".to_string()));
        }
        Url::parse(&self.llm.endpoint)
            .map_err(|e| IntelError::Config(format!("llm.endpoint is not a valid URL: {}", e)))?;
        if self.llm.timeout_secs == 0 {
            return Err(IntelError::Config(
                "llm.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.llm.max_tool_rounds == 0 {
            return Err(IntelError::Config(
                "llm.max_tool_rounds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve secrets from the process environment, then the config file.
    pub fn resolve_secrets(&self) -> Result<ResolvedSecrets> {
        self.resolve_secrets_with(|name| std::env::var(name).ok())
    }

    /// Resolve secrets with a custom variable lookup.
    ///
    /// The completion key is required. The engine key falls back to the
    /// completion key when neither source provides one.
    pub fn resolve_secrets_with<F>(&self, lookup: F) -> Result<ResolvedSecrets>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |env_name: &str, file_value: &Option<String>| {
            lookup(env_name)
                .or_else(|| file_value.clone())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let gemini = pick(GEMINI_API_KEY_ENV, &self.secrets.gemini_api_key)
            .ok_or_else(|| IntelError::MissingSecret(GEMINI_API_KEY_ENV.to_string()))?;
        let engine = pick(ENGINE_API_KEY_ENV, &self.secrets.engine_api_key)
            .unwrap_or_else(|| gemini.clone());

        Ok(ResolvedSecrets {
            gemini_api_key: Secret::new(gemini),
            engine_api_key: Secret::new(engine),
        })
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Remote analysis backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL; requests go to `<base_url>/run`.
    pub base_url: String,
    /// Per-request timeout. Free-tier hosts can take over a minute to wake.
    pub timeout_secs: u64,
    /// Execution mode sent when the model does not choose one.
    pub execution_mode: String,
    /// Optional cap on returned quotes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_quotes: Option<u32>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://partner-intelligence-engine.onrender.com".to_string(),
            timeout_secs: 120,
            execution_mode: crate::types::DEFAULT_EXECUTION_MODE.to_string(),
            max_quotes: None,
        }
    }
}

impl BackendConfig {
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(self.base_url.trim()).map_err(|e| {
            IntelError::Config(format!(
                "backend.base_url '{}' is not a valid URL: {}",
                self.base_url, e
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(IntelError::Config(format!(
                "backend.base_url must use http or https, got '{}'",
                url.scheme()
            )));
        }
        Ok(url)
    }

    pub fn execution_mode(&self) -> Result<ExecutionMode> {
        ExecutionMode::parse(&self.execution_mode)
            .map_err(|e| IntelError::Config(format!("backend.execution_mode: {}", e)))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Language-model completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API root, without the `/models/...` suffix.
    pub endpoint: String,
    /// Model identifier.
    pub model: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Upper bound on tool-call rounds within one user turn.
    pub max_tool_rounds: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-flash".to_string(),
            timeout_secs: 60,
            max_tool_rounds: 4,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Outbound rate limiting for backend calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Minimum seconds between two backend calls. Zero disables the limit.
    pub min_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 15,
        }
    }
}

impl RateLimitConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }
}

/// HTTP server settings for `partner-intel serve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3030 }
    }
}

/// Secrets read from the config file. Environment variables take priority.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_api_key: Option<String>,
}

impl fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretsConfig")
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "***"))
            .field("engine_api_key", &self.engine_api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// A credential whose `Debug` output never reveals the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Secrets after environment and file sources have been merged.
#[derive(Debug, Clone)]
pub struct ResolvedSecrets {
    pub gemini_api_key: Secret,
    pub engine_api_key: Secret,
}
