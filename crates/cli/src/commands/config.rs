use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use soldy_core::config::{AppConfig, LoadOptions};
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

/// One reported setting: dotted key, rendered value and the env var that can
/// override it.
struct Field {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("config", "config_validation", error.to_string(), EXIT_CONFIG)
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let field =
        |key: &'static str, env_key: &'static str, value: String| Field { key, env_key, value };
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        field("catalog.path", "SOLDY_CATALOG_PATH", config.catalog.path.display().to_string()),
        field("llm.provider", "SOLDY_LLM_PROVIDER", format!("{:?}", config.llm.provider)),
        field("llm.model", "SOLDY_LLM_MODEL", config.llm.model.clone()),
        field(
            "llm.base_url",
            "SOLDY_LLM_BASE_URL",
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        field("llm.api_key", "SOLDY_LLM_API_KEY", api_key),
        field("llm.timeout_secs", "SOLDY_LLM_TIMEOUT_SECS", config.llm.timeout_secs.to_string()),
        field("llm.max_retries", "SOLDY_LLM_MAX_RETRIES", config.llm.max_retries.to_string()),
        field(
            "assistant.history_cap",
            "SOLDY_ASSISTANT_HISTORY_CAP",
            config.assistant.history_cap.to_string(),
        ),
        field("assistant.max_words", "SOLDY_ASSISTANT_MAX_WORDS", config.assistant.max_words.to_string()),
        field(
            "assistant.temperature",
            "SOLDY_ASSISTANT_TEMPERATURE",
            config.assistant.temperature.to_string(),
        ),
        field(
            "assistant.price_interceptor",
            "SOLDY_ASSISTANT_PRICE_INTERCEPTOR",
            config.assistant.price_interceptor.to_string(),
        ),
        field(
            "assistant.cooling_interceptor",
            "SOLDY_ASSISTANT_COOLING_INTERCEPTOR",
            config.assistant.cooling_interceptor.to_string(),
        ),
        field("server.bind_address", "SOLDY_SERVER_BIND_ADDRESS", config.server.bind_address.clone()),
        field("server.port", "SOLDY_SERVER_PORT", config.server.port.to_string()),
        field(
            "server.graceful_shutdown_secs",
            "SOLDY_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs.to_string(),
        ),
        field(
            "server.session_idle_secs",
            "SOLDY_SERVER_SESSION_IDLE_SECS",
            config.server.session_idle_secs.to_string(),
        ),
        field("server.max_sessions", "SOLDY_SERVER_MAX_SESSIONS", config.server.max_sessions.to_string()),
        field("logging.level", "SOLDY_LOGGING_LEVEL", config.logging.level.clone()),
        field("logging.format", "SOLDY_LOGGING_FORMAT", format!("{:?}", config.logging.format)),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("soldy.toml"), PathBuf::from("config/soldy.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
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

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
