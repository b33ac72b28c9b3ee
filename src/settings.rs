use crate::relay_messages::relay_errors::{RelayError, RelayMessages};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "buildsync.toml";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6342;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 300;

// Routes served by the dev server
pub const EVENTS_ROUTE: &str = "/__buildsync/events";
pub const PING_ROUTE: &str = "/__buildsync/ping";
pub const CLIENT_SCRIPT_ROUTE: &str = "/__buildsync/client.js";
pub const PUBLISH_ROUTE: &str = "/__buildsync/publish";

// Published payloads larger than this are rejected before they are read.
pub const MAX_PUBLISH_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub poll_interval_ms: u64,
    pub client: Option<TargetConfig>,
    pub server: Option<TargetConfig>,

    // Relative target paths resolve against the directory holding the config file.
    #[serde(skip)]
    pub project_root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    pub command: String,
    #[serde(default = "default_watch_dir")]
    pub watch: PathBuf,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

fn default_watch_dir() -> PathBuf {
    PathBuf::from(".")
}

impl TargetConfig {
    pub fn new(command: impl Into<String>) -> Self {
        TargetConfig {
            command: command.into(),
            watch: default_watch_dir(),
            output: None,
        }
    }

    pub fn watch_root(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.watch)
    }

    pub fn output_dir(&self, project_root: &Path) -> Option<PathBuf> {
        self.output.as_ref().map(|output| project_root.join(output))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: String::from(DEFAULT_HOST),
            port: DEFAULT_PORT,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            client: None,
            server: None,
            project_root: PathBuf::from("."),
        }
    }
}

/// Values given on the command line. Anything set here wins over the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub poll_interval_ms: Option<u64>,
}

impl Config {
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(host) = &overrides.host {
            self.host = host.to_owned();
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(poll_interval_ms) = overrides.poll_interval_ms {
            self.poll_interval_ms = poll_interval_ms;
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Checks everything `serve` needs before any socket is opened.
    pub fn validate(&self, config_path: &Path) -> Result<(), RelayMessages> {
        let mut messages = RelayMessages::new();

        if self.host.trim().is_empty() {
            messages
                .errors
                .push(RelayError::config_error(config_path, "'host' cannot be empty."));
        }

        if self.poll_interval_ms == 0 {
            messages.errors.push(RelayError::config_error(
                config_path,
                "'poll_interval_ms' must be greater than zero.",
            ));
        }

        for (name, target) in [("client", &self.client), ("server", &self.server)] {
            match target {
                Some(target) if target.command.trim().is_empty() => {
                    messages.errors.push(RelayError::config_error(
                        config_path,
                        format!("[{name}] 'command' cannot be empty."),
                    ));
                }
                Some(target) => {
                    let watch_root = target.watch_root(&self.project_root);
                    if !watch_root.is_dir() {
                        messages.errors.push(RelayError::config_error(
                            config_path,
                            format!(
                                "[{name}] watch directory '{}' does not exist.",
                                watch_root.display()
                            ),
                        ));
                    }
                }
                None => {
                    messages.errors.push(RelayError::config_error(
                        config_path,
                        format!("Missing [{name}] target section."),
                    ));
                }
            }
        }

        if messages.has_errors() {
            return Err(messages);
        }

        Ok(())
    }
}

pub fn parse_config(source: &str, config_path: &Path) -> Result<Config, RelayError> {
    let mut config: Config = toml::from_str(source).map_err(|error| {
        RelayError::config_error(config_path, format!("Failed to parse config: {error}"))
    })?;

    config.project_root = config_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok(config)
}

pub fn load_config(config_path: &Path) -> Result<Config, RelayError> {
    let source = fs::read_to_string(config_path).map_err(|error| {
        RelayError::file_error(config_path, format!("Failed to read config file: {error}"))
    })?;

    parse_config(&source, config_path)
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
