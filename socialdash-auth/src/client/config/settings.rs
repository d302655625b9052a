use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use socialdash_api::BASE_URL;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Defaults to the API host with a websocket scheme.
    #[serde(default)]
    pub socket_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_redirect_delay_ms")]
    pub redirect_delay_ms: u64,
    #[serde(default)]
    pub reconnect: ReconnectSettings,
    /// Defaults to `<cache_dir>/socialdash/session.json`.
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ReconnectSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_delay_max_ms")]
    pub delay_max_ms: u64,
}

fn default_api_base_url() -> String {
    BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_redirect_delay_ms() -> u64 {
    1500
}

fn default_max_attempts() -> u32 {
    5
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_delay_max_ms() -> u64 {
    5000
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            delay_max_ms: default_delay_max_ms(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            socket_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            redirect_delay_ms: default_redirect_delay_ms(),
            reconnect: ReconnectSettings::default(),
            storage_path: None,
        }
    }
}

impl Settings {
    /// `SOCIALDASH_CONFIG` (default `config.toml`), then `SOCIALDASH_*`
    /// environment variables with `__` between nested keys.
    pub fn new() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("SOCIALDASH_CONFIG").unwrap_or_else(|_| "config.toml".to_string());

        let settings = Config::builder()
            .add_source(File::with_name(&config_path).required(false))
            .add_source(Environment::with_prefix("SOCIALDASH").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.api_base_url.is_empty() {
            return Err("api_base_url is required".to_string());
        }
        if !self.api_base_url.starts_with("http") {
            return Err("api_base_url must be a valid HTTP(S) URL".to_string());
        }
        if let Some(socket_url) = &self.socket_url {
            if !socket_url.starts_with("ws") {
                return Err("socket_url must be a ws:// or wss:// URL".to_string());
            }
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be positive".to_string());
        }
        if self.reconnect.max_attempts == 0 {
            return Err("reconnect.max_attempts must be positive".to_string());
        }
        if self.reconnect.delay_ms > self.reconnect.delay_max_ms {
            return Err("reconnect.delay_ms must not exceed reconnect.delay_max_ms".to_string());
        }
        Ok(())
    }

    pub fn socket_url(&self) -> String {
        if let Some(url) = &self.socket_url {
            return url.clone();
        }
        let base = self.api_base_url.trim_end_matches('/');
        let ws = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}/ws", ws)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }
}

impl ReconnectSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn delay_max(&self) -> Duration {
        Duration::from_millis(self.delay_max_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_backend_conventions() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.redirect_delay(), Duration::from_millis(1500));
        assert_eq!(settings.reconnect.max_attempts, 5);
        assert_eq!(settings.reconnect.delay(), Duration::from_secs(1));
        assert_eq!(settings.reconnect.delay_max(), Duration::from_secs(5));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn nested_values_override_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            api_base_url = "http://localhost:5000/"
            redirect_delay_ms = 10

            [reconnect]
            max_attempts = 2
            "#,
        )
        .unwrap();

        assert_eq!(settings.redirect_delay_ms, 10);
        assert_eq!(settings.reconnect.max_attempts, 2);
        assert_eq!(settings.reconnect.delay_ms, 1000);
        assert_eq!(settings.socket_url(), "ws://localhost:5000/ws");
    }

    #[test]
    fn socket_url_follows_api_scheme() {
        let settings = Settings::default();
        assert!(settings.socket_url().starts_with("wss://"));
    }

    #[test]
    fn validate_rejects_bad_urls() {
        let mut settings = Settings {
            api_base_url: "ftp://example.com".into(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        settings.api_base_url = "https://example.com".into();
        settings.socket_url = Some("https://example.com/ws".into());
        assert!(settings.validate().is_err());
    }
}
