use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub quoting: QuotingConfig,
    pub notification: NotificationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

/// Business limits for inbound quote requests. Rates live in the versioned
/// pricing table, not here; these are the structural bounds of a request.
#[derive(Clone, Debug)]
pub struct QuotingConfig {
    pub min_dimension_mm: u32,
    pub max_dimension_mm: u32,
    pub max_lines_per_quote: u32,
    pub max_distance_km: u32,
    pub lead_merge_window_hours: u32,
    pub allow_backward_order_transitions: bool,
}

#[derive(Clone, Debug)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
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
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub notification_enabled: Option<bool>,
    pub notification_webhook_url: Option<String>,
    pub notification_webhook_secret: Option<String>,
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
            database: DatabaseConfig {
                url: "sqlite://corrubox.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            quoting: QuotingConfig::default(),
            notification: NotificationConfig {
                enabled: false,
                webhook_url: None,
                webhook_secret: None,
                timeout_secs: 10,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for QuotingConfig {
    fn default() -> Self {
        Self {
            min_dimension_mm: 50,
            max_dimension_mm: 2000,
            max_lines_per_quote: 20,
            max_distance_km: 500,
            lead_merge_window_hours: 24,
            allow_backward_order_transitions: true,
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("corrubox.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(quoting) = patch.quoting {
            if let Some(min_dimension_mm) = quoting.min_dimension_mm {
                self.quoting.min_dimension_mm = min_dimension_mm;
            }
            if let Some(max_dimension_mm) = quoting.max_dimension_mm {
                self.quoting.max_dimension_mm = max_dimension_mm;
            }
            if let Some(max_lines_per_quote) = quoting.max_lines_per_quote {
                self.quoting.max_lines_per_quote = max_lines_per_quote;
            }
            if let Some(max_distance_km) = quoting.max_distance_km {
                self.quoting.max_distance_km = max_distance_km;
            }
            if let Some(lead_merge_window_hours) = quoting.lead_merge_window_hours {
                self.quoting.lead_merge_window_hours = lead_merge_window_hours;
            }
            if let Some(allow_backward) = quoting.allow_backward_order_transitions {
                self.quoting.allow_backward_order_transitions = allow_backward;
            }
        }

        if let Some(notification) = patch.notification {
            if let Some(enabled) = notification.enabled {
                self.notification.enabled = enabled;
            }
            if let Some(webhook_url) = notification.webhook_url {
                self.notification.webhook_url = Some(webhook_url);
            }
            if let Some(webhook_secret_value) = notification.webhook_secret {
                self.notification.webhook_secret = Some(secret_value(webhook_secret_value));
            }
            if let Some(timeout_secs) = notification.timeout_secs {
                self.notification.timeout_secs = timeout_secs;
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
        if let Some(value) = read_env("CORRUBOX_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CORRUBOX_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("CORRUBOX_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CORRUBOX_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CORRUBOX_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CORRUBOX_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CORRUBOX_SERVER_PORT") {
            self.server.port = parse_u16("CORRUBOX_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CORRUBOX_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CORRUBOX_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("CORRUBOX_QUOTING_MIN_DIMENSION_MM") {
            self.quoting.min_dimension_mm = parse_u32("CORRUBOX_QUOTING_MIN_DIMENSION_MM", &value)?;
        }
        if let Some(value) = read_env("CORRUBOX_QUOTING_MAX_DIMENSION_MM") {
            self.quoting.max_dimension_mm = parse_u32("CORRUBOX_QUOTING_MAX_DIMENSION_MM", &value)?;
        }
        if let Some(value) = read_env("CORRUBOX_QUOTING_MAX_LINES_PER_QUOTE") {
            self.quoting.max_lines_per_quote =
                parse_u32("CORRUBOX_QUOTING_MAX_LINES_PER_QUOTE", &value)?;
        }
        if let Some(value) = read_env("CORRUBOX_QUOTING_MAX_DISTANCE_KM") {
            self.quoting.max_distance_km = parse_u32("CORRUBOX_QUOTING_MAX_DISTANCE_KM", &value)?;
        }
        if let Some(value) = read_env("CORRUBOX_QUOTING_LEAD_MERGE_WINDOW_HOURS") {
            self.quoting.lead_merge_window_hours =
                parse_u32("CORRUBOX_QUOTING_LEAD_MERGE_WINDOW_HOURS", &value)?;
        }
        if let Some(value) = read_env("CORRUBOX_QUOTING_ALLOW_BACKWARD_ORDER_TRANSITIONS") {
            self.quoting.allow_backward_order_transitions =
                parse_bool("CORRUBOX_QUOTING_ALLOW_BACKWARD_ORDER_TRANSITIONS", &value)?;
        }

        if let Some(value) = read_env("CORRUBOX_NOTIFICATION_ENABLED") {
            self.notification.enabled = parse_bool("CORRUBOX_NOTIFICATION_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CORRUBOX_NOTIFICATION_WEBHOOK_URL") {
            self.notification.webhook_url = Some(value);
        }
        if let Some(value) = read_env("CORRUBOX_NOTIFICATION_WEBHOOK_SECRET") {
            self.notification.webhook_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env("CORRUBOX_NOTIFICATION_TIMEOUT_SECS") {
            self.notification.timeout_secs =
                parse_u64("CORRUBOX_NOTIFICATION_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("CORRUBOX_LOGGING_LEVEL").or_else(|| read_env("CORRUBOX_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CORRUBOX_LOGGING_FORMAT").or_else(|| read_env("CORRUBOX_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(enabled) = overrides.notification_enabled {
            self.notification.enabled = enabled;
        }
        if let Some(webhook_url) = overrides.notification_webhook_url {
            self.notification.webhook_url = Some(webhook_url);
        }
        if let Some(webhook_secret) = overrides.notification_webhook_secret {
            self.notification.webhook_secret = Some(secret_value(webhook_secret));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_quoting(&self.quoting)?;
        validate_notification(&self.notification)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("corrubox.toml"), PathBuf::from("config/corrubox.toml")]
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

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_quoting(quoting: &QuotingConfig) -> Result<(), ConfigError> {
    if quoting.min_dimension_mm == 0 {
        return Err(ConfigError::Validation(
            "quoting.min_dimension_mm must be greater than zero".to_string(),
        ));
    }

    if quoting.max_dimension_mm <= quoting.min_dimension_mm {
        return Err(ConfigError::Validation(
            "quoting.max_dimension_mm must exceed quoting.min_dimension_mm".to_string(),
        ));
    }

    if quoting.max_lines_per_quote == 0 {
        return Err(ConfigError::Validation(
            "quoting.max_lines_per_quote must be greater than zero".to_string(),
        ));
    }

    if quoting.max_distance_km == 0 {
        return Err(ConfigError::Validation(
            "quoting.max_distance_km must be greater than zero".to_string(),
        ));
    }

    if quoting.lead_merge_window_hours == 0 || quoting.lead_merge_window_hours > 168 {
        return Err(ConfigError::Validation(
            "quoting.lead_merge_window_hours must be in range 1..=168".to_string(),
        ));
    }

    Ok(())
}

fn validate_notification(notification: &NotificationConfig) -> Result<(), ConfigError> {
    if notification.enabled {
        let url = notification.webhook_url.as_deref().map(str::trim).unwrap_or_default();
        if url.is_empty() {
            return Err(ConfigError::Validation(
                "notification.enabled is true but notification.webhook_url is missing".to_string(),
            ));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "notification.webhook_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if notification.timeout_secs == 0 || notification.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "notification.timeout_secs must be in range 1..=120".to_string(),
        ));
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

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
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

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    quoting: Option<QuotingPatch>,
    notification: Option<NotificationPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct QuotingPatch {
    min_dimension_mm: Option<u32>,
    max_dimension_mm: Option<u32>,
    max_lines_per_quote: Option<u32>,
    max_distance_km: Option<u32>,
    lead_merge_window_hours: Option<u32>,
    allow_backward_order_transitions: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationPatch {
    enabled: Option<bool>,
    webhook_url: Option<String>,
    webhook_secret: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
