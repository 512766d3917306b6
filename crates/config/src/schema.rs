/// Config schema types (credentials, agent behaviour, reconnect policy).
use std::{path::PathBuf, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub credentials: Credentials,
    pub agent: AgentSettings,
    pub reconnect: ReconnectSettings,
}

/// Login credentials for the bot user. Immutable for the process lifetime.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub account_id: String,
    pub username: String,
    pub app_key: Secret<String>,
    pub secret: Secret<String>,
    pub access_token: Secret<String>,
    pub access_token_secret: Secret<String>,
}

impl Credentials {
    /// Names of the credentials that are empty.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("account_id", self.account_id.as_str()),
            ("username", self.username.as_str()),
            ("app_key", self.app_key.expose_secret().as_str()),
            ("secret", self.secret.expose_secret().as_str()),
            ("access_token", self.access_token.expose_secret().as_str()),
            (
                "access_token_secret",
                self.access_token_secret.expose_secret().as_str(),
            ),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("account_id", &self.account_id)
            .field("username", &self.username)
            .field("app_key", &"[REDACTED]")
            .field("secret", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .field("access_token_secret", &"[REDACTED]")
            .finish()
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            username: String::new(),
            app_key: Secret::new(String::new()),
            secret: Secret::new(String::new()),
            access_token: Secret::new(String::new()),
            access_token_secret: Secret::new(String::new()),
        }
    }
}

/// Runtime behaviour of the agent.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Interval between keepalive `GetClock` requests.
    pub keepalive_interval_secs: u64,
    /// Directory downloaded attachments are written to.
    pub download_dir: PathBuf,
    /// Base URL of the directory (CSDS) service.
    pub csds_url: String,
    /// How long a request waits for its response.
    pub request_timeout_secs: u64,
    /// Upper bound for a single attachment download.
    pub download_timeout_secs: u64,
}

impl AgentSettings {
    #[must_use]
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            keepalive_interval_secs: 30,
            download_dir: PathBuf::from("files"),
            csds_url: "https://api.liveperson.net".into(),
            request_timeout_secs: 10,
            download_timeout_secs: 120,
        }
    }
}

/// Backoff applied when the socket closes for a reason other than token expiry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconnectSettings {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Give up after this many consecutive failed reconnects. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            max_attempts: None,
        }
    }
}
