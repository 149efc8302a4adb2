use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Remote endpoints. Either may be absent, in which case that half of the
/// sync protocol is simply unavailable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Identity endpoint (`POST {email}`)
    #[serde(default)]
    pub auth_url: Option<String>,
    /// Task store endpoint (`GET`/`POST` with `X-User-Id`)
    #[serde(default)]
    pub tasks_url: Option<String>,
    /// Request timeout; absent means the transport default
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Where the local cache lives. Default: `$XDG_DATA_HOME/twig`
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Wipe the local task cache on logout so the next user starts clean
    #[serde(default)]
    pub clear_cache_on_logout: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
