use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client configuration from `torrent-control.yaml`
///
/// Every field has a default so a partial file (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Opaque engine state blob, loaded at startup and written at shutdown
    #[serde(default = "default_state_file")]
    pub state_file: Utf8PathBuf,

    /// Initial destination directory offered by new add-sessions
    #[serde(default = "default_download_dir")]
    pub download_dir: Utf8PathBuf,

    #[serde(default = "default_log_dir")]
    pub log_dir: Utf8PathBuf,

    #[serde(default)]
    pub debug: bool,

    /// Upper bound on the engine's shutdown routine
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl ClientConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            download_dir: default_download_dir(),
            log_dir: default_log_dir(),
            debug: false,
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

fn default_state_file() -> Utf8PathBuf {
    Utf8PathBuf::from("state.bin")
}

fn default_download_dir() -> Utf8PathBuf {
    std::env::current_dir()
        .ok()
        .and_then(|dir| Utf8PathBuf::try_from(dir).ok())
        .unwrap_or_else(|| Utf8PathBuf::from("."))
}

fn default_log_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("logs")
}

fn default_shutdown_timeout_secs() -> u64 {
    5
}
