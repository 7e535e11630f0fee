use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::network::RouteTableMode;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub mode: ProviderMode,
    pub base_url: Option<String>,
    pub api_token: Option<SecretString>,
    pub region: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct NetworkConfig {
    pub default_parent_cidr: String,
    pub route_table_mode: RouteTableMode,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderMode {
    /// In-memory provider; provisioning actions are simulated.
    #[default]
    Memory,
    /// HTTP provider; requires `base_url` and `api_token`.
    Http,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub provider_mode: Option<ProviderMode>,
    pub provider_base_url: Option<String>,
    pub provider_api_token: Option<String>,
    pub region: Option<String>,
    pub default_parent_cidr: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig {
                mode: ProviderMode::Memory,
                base_url: None,
                api_token: None,
                region: "us-east-1".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            network: NetworkConfig {
                default_parent_cidr: "10.0.0.0/16".to_string(),
                route_table_mode: RouteTableMode::Shared,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for ProviderMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "http" => Ok(Self::Http),
            other => Err(ConfigError::Validation(format!(
                "unsupported provider mode `{other}` (expected memory|http)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("provy.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(provider) = patch.provider {
            if let Some(mode) = provider.mode {
                self.provider.mode = mode;
            }
            if let Some(base_url) = provider.base_url {
                self.provider.base_url = Some(base_url);
            }
            if let Some(api_token_value) = provider.api_token {
                self.provider.api_token = Some(secret_value(api_token_value));
            }
            if let Some(region) = provider.region {
                self.provider.region = region;
            }
            if let Some(timeout_secs) = provider.timeout_secs {
                self.provider.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = provider.max_retries {
                self.provider.max_retries = max_retries;
            }
        }

        if let Some(network) = patch.network {
            if let Some(default_parent_cidr) = network.default_parent_cidr {
                self.network.default_parent_cidr = default_parent_cidr;
            }
            if let Some(route_table_mode) = network.route_table_mode {
                self.network.route_table_mode = route_table_mode;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PROVY_PROVIDER_MODE") {
            self.provider.mode = value.parse()?;
        }
        if let Some(value) = read_env("PROVY_PROVIDER_BASE_URL") {
            self.provider.base_url = Some(value);
        }
        if let Some(value) = read_env("PROVY_PROVIDER_API_TOKEN") {
            self.provider.api_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("PROVY_PROVIDER_REGION") {
            self.provider.region = value;
        }
        if let Some(value) = read_env("PROVY_PROVIDER_TIMEOUT_SECS") {
            self.provider.timeout_secs = parse_u64("PROVY_PROVIDER_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PROVY_PROVIDER_MAX_RETRIES") {
            self.provider.max_retries = parse_u32("PROVY_PROVIDER_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("PROVY_NETWORK_DEFAULT_PARENT_CIDR") {
            self.network.default_parent_cidr = value;
        }
        if let Some(value) = read_env("PROVY_NETWORK_ROUTE_TABLE_MODE") {
            self.network.route_table_mode =
                value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "PROVY_NETWORK_ROUTE_TABLE_MODE".to_string(),
                    value,
                })?;
        }

        let log_level = read_env("PROVY_LOGGING_LEVEL").or_else(|| read_env("PROVY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("PROVY_LOGGING_FORMAT").or_else(|| read_env("PROVY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(provider_mode) = overrides.provider_mode {
            self.provider.mode = provider_mode;
        }
        if let Some(provider_base_url) = overrides.provider_base_url {
            self.provider.base_url = Some(provider_base_url);
        }
        if let Some(provider_api_token) = overrides.provider_api_token {
            self.provider.api_token = Some(secret_value(provider_api_token));
        }
        if let Some(region) = overrides.region {
            self.provider.region = region;
        }
        if let Some(default_parent_cidr) = overrides.default_parent_cidr {
            self.network.default_parent_cidr = default_parent_cidr;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_provider(&self.provider)?;
        validate_network(&self.network)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("provy.toml"), PathBuf::from("config/provy.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_provider(provider: &ProviderConfig) -> Result<(), ConfigError> {
    if provider.timeout_secs == 0 || provider.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "provider.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if provider.region.trim().is_empty() {
        return Err(ConfigError::Validation("provider.region must not be empty".to_string()));
    }

    if provider.mode == ProviderMode::Http {
        let base_url = provider.base_url.as_deref().unwrap_or("");
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "provider.base_url must start with http:// or https:// when provider.mode is http"
                    .to_string(),
            ));
        }

        let token_missing = provider
            .api_token
            .as_ref()
            .map(|token| token.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if token_missing {
            return Err(ConfigError::Validation(
                "provider.api_token is required when provider.mode is http".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_network(network: &NetworkConfig) -> Result<(), ConfigError> {
    if network.default_parent_cidr.parse::<ipnet::Ipv4Net>().is_err() {
        return Err(ConfigError::Validation(format!(
            "network.default_parent_cidr `{}` is not a valid IPv4 CIDR",
            network.default_parent_cidr
        )));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    provider: Option<ProviderPatch>,
    network: Option<NetworkPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderPatch {
    mode: Option<ProviderMode>,
    base_url: Option<String>,
    api_token: Option<String>,
    region: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct NetworkPatch {
    default_parent_cidr: Option<String>,
    route_table_mode: Option<RouteTableMode>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use crate::domain::network::RouteTableMode;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, ProviderMode};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_use_in_memory_provider() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.provider.mode == ProviderMode::Memory, "default provider is memory")?;
        ensure(config.network.default_parent_cidr == "10.0.0.0/16", "default parent block")?;
        ensure(
            config.network.route_table_mode == RouteTableMode::Shared,
            "default route table mode is shared",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_PROVIDER_TOKEN", "tkn-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("provy.toml");
            fs::write(
                &path,
                r#"
[provider]
mode = "http"
base_url = "https://cloud.example.com"
api_token = "${TEST_PROVIDER_TOKEN}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let token = config
                .provider
                .api_token
                .as_ref()
                .map(|token| token.expose_secret().to_string())
                .unwrap_or_default();
            ensure(token == "tkn-from-env", "api token should come from the environment")
        })();

        clear_vars(&["TEST_PROVIDER_TOKEN"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PROVY_PROVIDER_REGION", "eu-west-1");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("provy.toml");
            fs::write(
                &path,
                r#"
[provider]
region = "us-west-2"

[network]
default_parent_cidr = "10.50.0.0/16"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.provider.region == "eu-west-1", "env region should win over file")?;
            ensure(
                config.network.default_parent_cidr == "10.50.0.0/16",
                "file parent block should win over default",
            )?;
            ensure(config.logging.level == "debug", "override log level should win over file")
        })();

        clear_vars(&["PROVY_PROVIDER_REGION"]);
        result
    }

    #[test]
    fn http_mode_without_token_fails_validation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PROVY_PROVIDER_MODE", "http");
        env::set_var("PROVY_PROVIDER_BASE_URL", "https://cloud.example.com");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("provider.api_token")
            );
            ensure(has_message, "validation failure should mention provider.api_token")
        })();

        clear_vars(&["PROVY_PROVIDER_MODE", "PROVY_PROVIDER_BASE_URL"]);
        result
    }

    #[test]
    fn invalid_parent_cidr_fails_validation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PROVY_NETWORK_DEFAULT_PARENT_CIDR", "not-a-cidr");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected validation failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::Validation(ref message) if message.contains("default_parent_cidr")),
                "validation failure should mention default_parent_cidr",
            )
        })();

        clear_vars(&["PROVY_NETWORK_DEFAULT_PARENT_CIDR"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PROVY_PROVIDER_API_TOKEN", "tkn-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("tkn-secret-value"), "debug output should not contain token")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )
        })();

        clear_vars(&["PROVY_PROVIDER_API_TOKEN"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PROVY_LOG_LEVEL", "warn");
        env::set_var("PROVY_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "log level should come from alias var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "log format should come from alias var",
            )
        })();

        clear_vars(&["PROVY_LOG_LEVEL", "PROVY_LOG_FORMAT"]);
        result
    }
}
