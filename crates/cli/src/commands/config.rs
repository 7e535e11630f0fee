use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use provy_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "provider.mode",
        &format!("{:?}", config.provider.mode).to_ascii_lowercase(),
        field_source(
            "provider.mode",
            Some("PROVY_PROVIDER_MODE"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "provider.base_url",
        config.provider.base_url.as_deref().unwrap_or("<unset>"),
        field_source(
            "provider.base_url",
            Some("PROVY_PROVIDER_BASE_URL"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    let api_token = if config.provider.api_token.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line(
        "provider.api_token",
        api_token,
        field_source(
            "provider.api_token",
            Some("PROVY_PROVIDER_API_TOKEN"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "provider.region",
        &config.provider.region,
        field_source(
            "provider.region",
            Some("PROVY_PROVIDER_REGION"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "provider.timeout_secs",
        &config.provider.timeout_secs.to_string(),
        field_source(
            "provider.timeout_secs",
            Some("PROVY_PROVIDER_TIMEOUT_SECS"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "provider.max_retries",
        &config.provider.max_retries.to_string(),
        field_source(
            "provider.max_retries",
            Some("PROVY_PROVIDER_MAX_RETRIES"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.push(render_line(
        "network.default_parent_cidr",
        &config.network.default_parent_cidr,
        field_source(
            "network.default_parent_cidr",
            Some("PROVY_NETWORK_DEFAULT_PARENT_CIDR"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "network.route_table_mode",
        &format!("{:?}", config.network.route_table_mode).to_ascii_lowercase(),
        field_source(
            "network.route_table_mode",
            Some("PROVY_NETWORK_ROUTE_TABLE_MODE"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        field_source(
            "logging.level",
            Some("PROVY_LOGGING_LEVEL"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format).to_ascii_lowercase(),
        field_source(
            "logging.format",
            Some("PROVY_LOGGING_FORMAT"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("provy.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/provy.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
