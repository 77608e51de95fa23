//! Configuration — built-in provider defaults overlaid with a user TOML file
//!
//! The result is frozen: it is loaded once at startup, shared behind `Arc`
//! and never mutated on the request path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::providers::ProviderKind;

/// Default configuration shipped with the binary (`consult init` writes it out)
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

pub const DEFAULT_PORT: u16 = 3001;
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const PLACEHOLDER_PREFIX: &str = "YOUR_";

/// Structural configuration problems. Fatal at startup: the process must not
/// serve traffic with a catalog built from a malformed configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Invalid provider '{provider}': {reason}")]
    InvalidProvider { provider: String, reason: String },
    #[error("Duplicate model id '{0}'")]
    DuplicateModel(String),
    #[error("Failed to build HTTP client for provider '{provider}': {reason}")]
    HttpClient { provider: String, reason: String },
}

impl ConfigError {
    pub(crate) fn provider(provider: &str, reason: impl Into<String>) -> Self {
        Self::InvalidProvider {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }
}

/// `[server]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// One `[providers.<id>]` table as written in TOML
#[derive(Debug, Deserialize)]
struct RawProvider {
    #[serde(default = "default_enabled")]
    enabled: bool,
    display_name: Option<String>,
    #[serde(default)]
    kind: ProviderKind,
    api_key: Option<String>,
    api_key_env: Option<String>,
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
    #[serde(default)]
    models: toml::Table,
}

fn default_enabled() -> bool {
    true
}

/// Resolved, validated configuration for a single provider
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub id: String,
    pub display_name: String,
    pub kind: ProviderKind,
    pub api_key: String,
    /// Environment variable the key was (or would have been) read from
    pub api_key_env: String,
    pub endpoint: String,
    pub timeout: Duration,
    /// `(model key, display name)` in configuration order
    pub models: Vec<(String, String)>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("kind", &self.kind)
            .field("api_key", &"[REDACTED]")
            .field("api_key_env", &self.api_key_env)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("models", &self.models)
            .finish()
    }
}

impl ProviderConfig {
    /// Display name configured for `model_key`, if any
    pub fn model_display_name(&self, model_key: &str) -> Option<&str> {
        self.models
            .iter()
            .find(|(key, _)| key == model_key)
            .map(|(_, name)| name.as_str())
    }

    /// True when no real key was supplied (empty or a `YOUR_...` placeholder)
    pub fn has_placeholder_key(&self) -> bool {
        let key = self.api_key.trim();
        key.is_empty() || key.starts_with(PLACEHOLDER_PREFIX)
    }

    fn from_raw<F>(id: &str, raw: RawProvider, env: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if id.trim().is_empty() {
            return Err(ConfigError::provider(id, "provider id must not be empty"));
        }
        if id.contains(':') || id.chars().any(char::is_whitespace) {
            return Err(ConfigError::provider(
                id,
                "provider id must not contain ':' or whitespace",
            ));
        }

        let endpoint = raw
            .endpoint
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ConfigError::provider(id, "missing required field `endpoint`"))?;
        let parsed = url::Url::parse(&endpoint)
            .map_err(|e| ConfigError::provider(id, format!("endpoint is not a valid URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::provider(id, "endpoint must use http or https"));
        }

        let timeout_secs = raw.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::provider(
                id,
                "timeout_secs must be greater than 0",
            ));
        }

        let display_name = raw
            .display_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| capitalize(id));

        let mut models = Vec::with_capacity(raw.models.len());
        for (key, value) in raw.models {
            if key.trim().is_empty() {
                return Err(ConfigError::provider(id, "model keys must not be empty"));
            }
            let name = value
                .as_str()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| {
                    ConfigError::provider(
                        id,
                        format!("model '{key}' must map to a non-empty display name"),
                    )
                })?
                .to_string();
            models.push((key, name));
        }

        let api_key_env = raw
            .api_key_env
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("{}_API_KEY", id.to_uppercase().replace('-', "_")));
        let api_key = raw
            .api_key
            .filter(|key| !key.trim().is_empty())
            .or_else(|| env(&api_key_env).filter(|key| !key.trim().is_empty()))
            .unwrap_or_else(|| format!("{PLACEHOLDER_PREFIX}{api_key_env}"));

        Ok(Self {
            id: id.to_string(),
            display_name,
            kind: raw.kind,
            api_key,
            api_key_env,
            endpoint,
            timeout: Duration::from_secs(timeout_secs),
            models,
        })
    }
}

/// The complete, frozen configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsultConfig {
    pub server: ServerConfig,
    /// Enabled providers in configuration order
    pub providers: Vec<ProviderConfig>,
}

impl ConsultConfig {
    /// Built-in defaults with keys taken from the process environment
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::from_toml_str("")
    }

    /// Defaults overlaid with `overlay`, keys taken from the process environment
    pub fn from_toml_str(overlay: &str) -> Result<Self, ConfigError> {
        Self::from_toml_str_with_env(overlay, |name| std::env::var(name).ok())
    }

    /// Defaults overlaid with `overlay`, resolving environment lookups via `env`
    pub fn from_toml_str_with_env<F>(overlay: &str, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut base: toml::Value = toml::from_str(DEFAULT_CONFIG_TOML)?;
        let overlay: toml::Value = toml::from_str(overlay)?;
        deep_merge(&mut base, &overlay);
        Self::from_value(base, &env)
    }

    /// Load the configuration.
    ///
    /// An explicit `path` must exist. Without one, `~/.consult/config.toml`
    /// is used when present and the built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_config_path(), false),
        };

        if !required && !path.exists() {
            debug!(
                "No config file at {}, using built-in defaults",
                path.display()
            );
            return Self::defaults();
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(
            "Loaded config from {} ({} providers)",
            path.display(),
            config.providers.len()
        );
        Ok(config)
    }

    /// Look up an enabled provider by id
    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    fn from_value<F>(value: toml::Value, env: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let toml::Value::Table(mut table) = value else {
            return Err(ConfigError::Invalid(
                "top level must be a TOML table".to_string(),
            ));
        };

        let mut server: ServerConfig = table
            .remove("server")
            .map(|v| v.try_into::<ServerConfig>())
            .transpose()?
            .unwrap_or_default();
        if let Some(port) = env("PORT").and_then(|p| p.trim().parse::<u16>().ok()) {
            server.port = port;
        }

        let raw_providers = match table.remove("providers") {
            Some(toml::Value::Table(providers)) => providers,
            Some(_) => {
                return Err(ConfigError::Invalid(
                    "[providers] must be a table".to_string(),
                ));
            }
            None => toml::Table::new(),
        };

        let mut providers = Vec::with_capacity(raw_providers.len());
        for (id, raw) in raw_providers {
            let raw: RawProvider = raw
                .try_into()
                .map_err(|e: toml::de::Error| ConfigError::provider(&id, e.message()))?;
            if !raw.enabled {
                debug!("Provider '{}' is disabled", id);
                continue;
            }
            providers.push(ProviderConfig::from_raw(&id, raw, env)?);
        }

        Ok(Self { server, providers })
    }
}

/// Directory holding consult's configuration
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".consult")
}

/// Default location of the configuration file
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Deep merge `overlay` into `base`; tables merge key by key, anything else
/// is replaced by the overlay value.
pub fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// "openai" -> "Openai"; used when no display name is configured
pub(crate) fn capitalize(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn load(overlay: &str) -> Result<ConsultConfig, ConfigError> {
        ConsultConfig::from_toml_str_with_env(overlay, no_env)
    }

    #[test]
    fn test_defaults_provider_order() {
        let config = load("").unwrap();
        let ids: Vec<&str> = config.providers.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["openai", "anthropic", "google", "deepseek", "groq"]);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_defaults_model_order_and_names() {
        let config = load("").unwrap();
        let openai = config.provider("openai").unwrap();
        let keys: Vec<&str> = openai.models.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-3.5-turbo"]);
        assert_eq!(openai.display_name, "OpenAI");
        assert_eq!(openai.model_display_name("gpt-4o-mini"), Some("GPT-4o Mini"));
        assert_eq!(openai.model_display_name("gpt-5"), None);
        assert_eq!(openai.kind, ProviderKind::OpenaiCompatible);

        let google = config.provider("google").unwrap();
        assert_eq!(google.kind, ProviderKind::Google);
        assert!(google.endpoint.ends_with("/models/"));
    }

    #[test]
    fn test_api_key_from_env() {
        let config = ConsultConfig::from_toml_str_with_env("", |name| {
            (name == "ANTHROPIC_API_KEY").then(|| "sk-ant-test".to_string())
        })
        .unwrap();
        let anthropic = config.provider("anthropic").unwrap();
        assert_eq!(anthropic.api_key, "sk-ant-test");
        assert!(!anthropic.has_placeholder_key());
    }

    #[test]
    fn test_missing_key_becomes_placeholder() {
        let config = load("").unwrap();
        let openai = config.provider("openai").unwrap();
        assert_eq!(openai.api_key, "YOUR_OPENAI_API_KEY");
        assert!(openai.has_placeholder_key());
    }

    #[test]
    fn test_explicit_key_wins_over_env() {
        let overlay = r#"
            [providers.groq]
            api_key = "gsk-explicit"
        "#;
        let config = ConsultConfig::from_toml_str_with_env(overlay, |_| {
            Some("from-env".to_string())
        })
        .unwrap();
        assert_eq!(config.provider("groq").unwrap().api_key, "gsk-explicit");
        assert_eq!(config.provider("openai").unwrap().api_key, "from-env");
    }

    #[test]
    fn test_overlay_adds_provider_and_models() {
        let overlay = r#"
            [providers.openai.models]
            "gpt-4.1" = "GPT-4.1"

            [providers.local]
            endpoint = "http://localhost:11434/v1/chat/completions"

            [providers.local.models]
            "llama3" = "Llama 3"
        "#;
        let config = load(overlay).unwrap();
        let openai = config.provider("openai").unwrap();
        assert_eq!(openai.models.last().unwrap().0, "gpt-4.1");
        assert_eq!(openai.models.len(), 5);

        let local = config.providers.last().unwrap();
        assert_eq!(local.id, "local");
        assert_eq!(local.display_name, "Local");
        assert_eq!(local.api_key_env, "LOCAL_API_KEY");
        assert_eq!(local.kind, ProviderKind::OpenaiCompatible);
    }

    #[test]
    fn test_disabled_provider_is_skipped() {
        let config = load("[providers.deepseek]\nenabled = false\n").unwrap();
        assert!(config.provider("deepseek").is_none());
        assert_eq!(config.providers.len(), 4);
    }

    #[test]
    fn test_missing_endpoint_is_fatal() {
        let overlay = r#"
            [providers.mystery.models]
            "m1" = "Model One"
        "#;
        let err = load(overlay).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidProvider { ref provider, ref reason }
            if provider == "mystery" && reason.contains("endpoint")
        ));
    }

    #[test]
    fn test_invalid_endpoint_is_fatal() {
        let err = load("[providers.openai]\nendpoint = \"not a url\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProvider { .. }));

        let err = load("[providers.openai]\nendpoint = \"ftp://example.com/x\"\n").unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn test_provider_id_with_colon_is_fatal() {
        let overlay = r#"
            [providers."a:b"]
            endpoint = "https://example.com/v1/chat/completions"
        "#;
        assert!(matches!(
            load(overlay).unwrap_err(),
            ConfigError::InvalidProvider { .. }
        ));
    }

    #[test]
    fn test_non_string_model_name_is_fatal() {
        let err = load("[providers.openai.models]\n\"gpt-x\" = 42\n").unwrap_err();
        assert!(err.to_string().contains("gpt-x"));
    }

    #[test]
    fn test_zero_timeout_is_fatal() {
        let err = load("[providers.openai]\ntimeout_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_unknown_kind_is_fatal() {
        let err = load("[providers.openai]\nkind = \"smoke-signals\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProvider { .. }));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(load("[server").unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_port_env_override() {
        let config = ConsultConfig::from_toml_str_with_env("", |name| {
            (name == "PORT").then(|| "8080".to_string())
        })
        .unwrap();
        assert_eq!(config.server.port, 8080);

        let config = ConsultConfig::from_toml_str_with_env("", |name| {
            (name == "PORT").then(|| "not-a-port".to_string())
        })
        .unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
    }

    #[test]
    fn test_server_overlay() {
        let config = load("[server]\nhost = \"0.0.0.0\"\nport = 9000\n").unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = load("[providers.openai]\napi_key = \"sk-super-secret\"\n").unwrap();
        let debug = format!("{:?}", config.provider("openai").unwrap());
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-super-secret"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nhost = \"10.0.0.1\"\n").unwrap();
        let config = ConsultConfig::load(Some(&path)).unwrap();
        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.providers.len(), 5);
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let err = ConsultConfig::load(Some(Path::new("/nonexistent/consult.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_deep_merge_scalars() {
        let mut base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\nz = 4\n").unwrap();
        deep_merge(&mut base, &overlay);
        assert_eq!(base["a"]["x"].as_integer(), Some(1));
        assert_eq!(base["a"]["y"].as_integer(), Some(3));
        assert_eq!(base["a"]["z"].as_integer(), Some(4));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("openai"), "Openai");
        assert_eq!(capitalize("x"), "X");
        assert_eq!(capitalize(""), "");
    }
}
