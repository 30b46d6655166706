use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use corrubox_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    let mut push = |key_path: &str, value: &str, env_key: &str| {
        lines.push(render_line(
            key_path,
            value,
            field_source(
                key_path,
                Some(env_key),
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        ));
    };

    push("database.url", &config.database.url, "CORRUBOX_DATABASE_URL");
    push(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        "CORRUBOX_DATABASE_MAX_CONNECTIONS",
    );
    push(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        "CORRUBOX_DATABASE_TIMEOUT_SECS",
    );

    push("server.bind_address", &config.server.bind_address, "CORRUBOX_SERVER_BIND_ADDRESS");
    push("server.port", &config.server.port.to_string(), "CORRUBOX_SERVER_PORT");
    push(
        "server.graceful_shutdown_secs",
        &config.server.graceful_shutdown_secs.to_string(),
        "CORRUBOX_SERVER_GRACEFUL_SHUTDOWN_SECS",
    );

    push(
        "quoting.min_dimension_mm",
        &config.quoting.min_dimension_mm.to_string(),
        "CORRUBOX_QUOTING_MIN_DIMENSION_MM",
    );
    push(
        "quoting.max_dimension_mm",
        &config.quoting.max_dimension_mm.to_string(),
        "CORRUBOX_QUOTING_MAX_DIMENSION_MM",
    );
    push(
        "quoting.max_lines_per_quote",
        &config.quoting.max_lines_per_quote.to_string(),
        "CORRUBOX_QUOTING_MAX_LINES_PER_QUOTE",
    );
    push(
        "quoting.max_distance_km",
        &config.quoting.max_distance_km.to_string(),
        "CORRUBOX_QUOTING_MAX_DISTANCE_KM",
    );
    push(
        "quoting.lead_merge_window_hours",
        &config.quoting.lead_merge_window_hours.to_string(),
        "CORRUBOX_QUOTING_LEAD_MERGE_WINDOW_HOURS",
    );
    push(
        "quoting.allow_backward_order_transitions",
        &config.quoting.allow_backward_order_transitions.to_string(),
        "CORRUBOX_QUOTING_ALLOW_BACKWARD_ORDER_TRANSITIONS",
    );

    push(
        "notification.enabled",
        &config.notification.enabled.to_string(),
        "CORRUBOX_NOTIFICATION_ENABLED",
    );
    push(
        "notification.webhook_url",
        config.notification.webhook_url.as_deref().unwrap_or("<unset>"),
        "CORRUBOX_NOTIFICATION_WEBHOOK_URL",
    );
    let webhook_secret = config
        .notification
        .webhook_secret
        .as_ref()
        .map(|secret| redact_secret(secret.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    push(
        "notification.webhook_secret",
        &webhook_secret,
        "CORRUBOX_NOTIFICATION_WEBHOOK_SECRET",
    );
    push(
        "notification.timeout_secs",
        &config.notification.timeout_secs.to_string(),
        "CORRUBOX_NOTIFICATION_TIMEOUT_SECS",
    );

    push("logging.level", &config.logging.level, "CORRUBOX_LOGGING_LEVEL");
    push("logging.format", &format!("{:?}", config.logging.format), "CORRUBOX_LOGGING_FORMAT");

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("corrubox.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/corrubox.toml");
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

fn redact_secret(secret: &str) -> String {
    if secret.trim().is_empty() {
        return "<empty>".to_string();
    }
    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_secret};

    #[test]
    fn nested_keys_are_resolved_in_the_config_document() {
        let doc: toml::Value = r#"
[notification]
webhook_url = "https://hooks.example.com/sales"
"#
        .parse()
        .expect("valid toml");

        assert!(contains_path(&doc, "notification.webhook_url"));
        assert!(!contains_path(&doc, "notification.webhook_secret"));
        assert!(!contains_path(&doc, "database.url"));
    }

    #[test]
    fn secrets_never_render_their_value() {
        assert_eq!(redact_secret("hunter2"), "<redacted>");
        assert_eq!(redact_secret("   "), "<empty>");
    }
}
