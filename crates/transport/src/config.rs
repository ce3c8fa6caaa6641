use std::path::{Path, PathBuf};
use std::time::Duration;

use agent_chat_session::AGENT_STEP_CHANNEL;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/agent";
pub const DEFAULT_START_PATH: &str = "start";
pub const DEFAULT_STOP_PATH: &str = "stop";
pub const DEFAULT_EVENTS_PATH: &str = "events";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const CONFIG_DIRECTORY_NAME: &str = "agent-chat";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const ENV_PREFIX: &str = "AGENT_CHAT_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_start_path")]
    pub start_path: String,
    #[serde(default = "default_stop_path")]
    pub stop_path: String,
    #[serde(default = "default_events_path")]
    pub events_path: String,
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            start_path: default_start_path(),
            stop_path: default_stop_path(),
            events_path: default_events_path(),
            channel: default_channel(),
            request_timeout_secs: default_request_timeout_secs(),
            access_token: None,
        }
    }
}

impl ClientConfig {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(CONFIG_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".agent-chat"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(CONFIG_FILE_NAME)
    }

    /// Loads defaults, then the JSON file at the default path, then `AGENT_CHAT_*`
    /// environment variables.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::default_config_path())
    }

    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if path.exists() {
            figment = figment.merge(Json::file(path));
        } else {
            tracing::info!("config file not found at {:?}, using defaults", path);
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        let config = figment.extract::<Self>().context(ExtractSnafu {
            stage: "extract-client-config",
            path: path.to_path_buf(),
        })?;
        Ok(config.normalized())
    }

    pub fn normalized(mut self) -> Self {
        self.base_url = non_blank_or(&self.base_url, default_base_url)
            .trim_end_matches('/')
            .to_string();
        self.start_path = normalize_path(&self.start_path, default_start_path);
        self.stop_path = normalize_path(&self.stop_path, default_stop_path);
        self.events_path = normalize_path(&self.events_path, default_events_path);
        self.channel = non_blank_or(&self.channel, default_channel);
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = DEFAULT_REQUEST_TIMEOUT_SECS;
        }
        self.access_token = self
            .access_token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());
        self
    }

    pub fn start_url(&self) -> String {
        self.endpoint(&self.start_path)
    }

    pub fn stop_url(&self) -> String {
        self.endpoint(&self.stop_path)
    }

    pub fn events_url(&self) -> String {
        self.endpoint(&self.events_path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("failed to load client config from {path:?} on `{stage}`: {source}"))]
    Extract {
        stage: &'static str,
        path: PathBuf,
        #[snafu(source(from(figment::Error, Box::new)))]
        source: Box<figment::Error>,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

fn non_blank_or(value: &str, fallback: fn() -> String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_string()
    }
}

fn normalize_path(value: &str, fallback: fn() -> String) -> String {
    let trimmed = value.trim().trim_matches('/');
    if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_string()
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_start_path() -> String {
    DEFAULT_START_PATH.to_string()
}

fn default_stop_path() -> String {
    DEFAULT_STOP_PATH.to_string()
}

fn default_events_path() -> String {
    DEFAULT_EVENTS_PATH.to_string()
}

fn default_channel() -> String {
    AGENT_STEP_CHANNEL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
