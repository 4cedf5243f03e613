//! Typed process settings.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::{ConfigError, ConfigLoader, ConfigValidator, EnvLoader, FileFormat, Result, Validate};

/// Prefix for every settings environment variable.
pub const ENV_PREFIX: &str = "FUSION";

const SMTP_SECURITY_MODES: [&str; 3] = ["tls", "starttls", "none"];

/// Settings shared by the dispatcher process and the services it wires.
///
/// Every field can be set through `FUSION_<FIELD>` environment variables,
/// e.g. `FUSION_SMTP_SERVER`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Deployment environment name.
    pub environment: String,
    /// Log level name (`INFO`, `DEBUG`, ...). When unset the logging
    /// defaults apply, including `FUSION_DEBUG`.
    pub log_level: Option<String>,
    /// Redis URL backing the job store and the notification channel.
    pub redis_url: String,
    /// Redis connection pool size.
    pub redis_pool_size: u32,
    /// SMTP server host.
    pub smtp_server: String,
    /// SMTP server port.
    pub smtp_port: u16,
    /// SMTP username, also the default sender.
    pub smtp_username: String,
    /// SMTP password.
    pub smtp_password: String,
    /// `tls` (implicit TLS), `starttls` or `none`.
    pub smtp_security: String,
    /// Sender mailbox; falls back to `smtp_username`.
    pub mail_from: Option<String>,
    /// Notification channel override; the dispatcher constant is used when unset.
    pub email_channel: Option<String>,
    /// Public base URL used in links inside emails.
    pub app_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: "DEV".to_string(),
            log_level: None,
            redis_url: "redis://localhost:6379/0".to_string(),
            redis_pool_size: 10,
            smtp_server: "localhost".to_string(),
            smtp_port: 465,
            smtp_username: String::new(),
            smtp_password: String::new(),
            smtp_security: "tls".to_string(),
            mail_from: None,
            email_channel: None,
            app_base_url: "http://0.0.0.0:8000".to_string(),
        }
    }
}

impl Settings {
    /// Load settings for the running process.
    ///
    /// Order, later wins: defaults, the file named by `FUSION_CONFIG_FILE`,
    /// a `.env` file in the working directory, process environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok(); // Ignore if .env doesn't exist

        let env = EnvLoader::with_prefix(ENV_PREFIX);
        let mut settings = match env.load_var("CONFIG_FILE") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };

        settings.apply(&env.load()?)?;
        settings.validate()?;

        debug!(environment = %settings.environment, "Settings loaded");
        Ok(settings)
    }

    /// Load settings from a JSON, TOML or `.env` file, without validating.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let loader = ConfigLoader::auto(path)?;
        let value = loader.load_file(path)?;

        if FileFormat::from_extension(
            path.extension().and_then(|e| e.to_str()).unwrap_or_default(),
        ) == Some(FileFormat::Env)
        {
            let vars = value
                .as_object()
                .map(|map| {
                    map.iter()
                        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                        .collect::<HashMap<_, _>>()
                })
                .unwrap_or_default();
            let mut settings = Self::default();
            settings.apply(&vars)?;
            return Ok(settings);
        }

        serde_json::from_value(value).map_err(|e| ConfigError::DeserializationError(e.to_string()))
    }

    /// Apply string overrides keyed by lowercase field name.
    ///
    /// Unknown keys are ignored so unrelated `FUSION_*` variables do not
    /// break startup.
    pub fn apply(&mut self, vars: &HashMap<String, String>) -> Result<()> {
        for (key, value) in vars {
            match key.as_str() {
                "environment" => self.environment = value.clone(),
                "log_level" => self.log_level = non_empty(value),
                "redis_url" => self.redis_url = value.clone(),
                "redis_pool_size" => self.redis_pool_size = parse(key, value)?,
                "smtp_server" => self.smtp_server = value.clone(),
                "smtp_port" => self.smtp_port = parse(key, value)?,
                "smtp_username" => self.smtp_username = value.clone(),
                "smtp_password" => self.smtp_password = value.clone(),
                "smtp_security" => self.smtp_security = value.to_lowercase(),
                "mail_from" => self.mail_from = non_empty(value),
                "email_channel" => self.email_channel = non_empty(value),
                "app_base_url" => self.app_base_url = value.trim_end_matches('/').to_string(),
                _ => {}
            }
        }
        Ok(())
    }

    /// The sender mailbox used for outgoing email.
    pub fn sender(&self) -> &str {
        self.mail_from.as_deref().unwrap_or(&self.smtp_username)
    }

    /// Whether SMTP credentials are configured.
    pub fn has_smtp_credentials(&self) -> bool {
        !self.smtp_username.is_empty() && !self.smtp_password.is_empty()
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        ConfigValidator::is_redis_url(&self.redis_url, "redis_url")?;
        ConfigValidator::in_range(self.redis_pool_size, 1, 1024, "redis_pool_size")?;
        ConfigValidator::not_empty(&self.smtp_server, "smtp_server")?;
        ConfigValidator::is_port(self.smtp_port, "smtp_port")?;
        ConfigValidator::one_of(&self.smtp_security, &SMTP_SECURITY_MODES, "smtp_security")?;
        ConfigValidator::is_url(&self.app_base_url, "app_base_url")?;
        if !self.sender().is_empty() {
            ConfigValidator::is_email(self.sender(), "mail_from")?;
        }
        if let Some(channel) = &self.email_channel {
            ConfigValidator::not_empty(channel, "email_channel")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("environment", &self.environment)
            .field("log_level", &self.log_level)
            .field("redis_url", &self.redis_url)
            .field("redis_pool_size", &self.redis_pool_size)
            .field("smtp_server", &self.smtp_server)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"<redacted>")
            .field("smtp_security", &self.smtp_security)
            .field("mail_from", &self.mail_from)
            .field("email_channel", &self.email_channel)
            .field("app_base_url", &self.app_base_url)
            .finish()
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
