use crate::models::ClientConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// File name of the client configuration inside the config directory
pub const CLIENT_CONFIG_FILE: &str = "torrent-control.yaml";

/// Prefix of environment variables that override configuration values,
/// e.g. `TORRENT_CONTROL_DEBUG=true`
pub const ENV_PREFIX: &str = "TORRENT_CONTROL";

/// Configuration manager for loading and saving the client configuration.
///
/// Values are layered: built-in defaults, then `torrent-control.yaml` in the
/// config directory (optional), then `TORRENT_CONTROL_*` environment
/// variables. Only the YAML file is ever written back.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    client_config_path: Utf8PathBuf,
    env_source: Option<config::Map<String, String>>,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory holding `torrent-control.yaml`; created if missing
    ///
    /// # Returns
    /// A new ConfigManager instance
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        // Create config directory if it doesn't exist
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            client_config_path: config_dir.join(CLIENT_CONFIG_FILE),
            config_dir,
            env_source: None,
        })
    }

    /// Read overrides from `vars` instead of the process environment.
    ///
    /// Keys keep their full `TORRENT_CONTROL_` form.
    pub fn with_env_source(mut self, vars: config::Map<String, String>) -> Self {
        self.env_source = Some(vars);
        self
    }

    /// Load the client configuration.
    ///
    /// # Returns
    /// The layered ClientConfig; defaults fill anything neither the file nor
    /// the environment sets
    pub fn load_client_config(&self) -> Result<ClientConfig> {
        if !self.client_config_path.exists() {
            tracing::warn!(
                "Client config file not found at {}, using defaults",
                self.client_config_path
            );
        }

        let settings = config::Config::builder()
            .add_source(
                config::File::new(self.client_config_path.as_str(), config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(self.env_source.clone()),
            )
            .build()
            .with_context(|| format!("Failed to read client config: {}", self.client_config_path))?;

        let config: ClientConfig = settings.try_deserialize().with_context(|| {
            format!("Failed to parse client config: {}", self.client_config_path)
        })?;

        tracing::info!("Loaded client config from {}", self.client_config_path);
        Ok(config)
    }

    /// Save the client configuration file.
    ///
    /// # Arguments
    /// * `config` - The ClientConfig to save
    pub fn save_client_config(&self, config: &ClientConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize client config to YAML")?;

        fs::write(&self.client_config_path, yaml_string).with_context(|| {
            format!("Failed to write client config: {}", self.client_config_path)
        })?;

        tracing::info!("Saved client config to {}", self.client_config_path);
        Ok(())
    }

    /// Resolve a configured path; relative paths are taken from the config directory.
    pub fn resolve(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Get the client configuration file path.
    pub fn client_config_path(&self) -> &Utf8Path {
        &self.client_config_path
    }
}
