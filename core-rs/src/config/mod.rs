/**
 * config module
 * devport configuration file (YAML or JSON)
 *
 * Format:
 * ```yaml
 * portRangeStart: 13000
 * portRangeEnd: 13099
 * portsFile: /home/me/.cache/devport/ports.json
 * containerRuntime: podman
 * workspaceLabel: devcontainer.local_folder
 * lockStaleSecs: 10
 * lockTimeoutSecs: 50
 * ```
 *
 * Every field is optional. Lookup order for the file itself: explicit path,
 * $DEVPORT_CONFIG, $XDG_CONFIG_HOME/devport/config.yaml,
 * $HOME/.config/devport/config.yaml.
 */

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::errors::{DevportError, Result};
use crate::lock::LockOptions;
use crate::port::{PortRange, DEFAULT_PORT_RANGE_END, DEFAULT_PORT_RANGE_START};
use crate::runtime::DEFAULT_WORKSPACE_LABEL;

/// Overrides the config file location
pub const CONFIG_ENV: &str = "DEVPORT_CONFIG";

/// Overrides `portsFile`
pub const PORTS_FILE_ENV: &str = "DEVPORT_PORTS_FILE";

const APP_DIR: &str = "devport";
const CONFIG_FILE: &str = "config.yaml";
const PORTS_FILE: &str = "ports.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DevportConfig {
    pub port_range_start: u16,
    pub port_range_end: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ports_file: Option<PathBuf>,
    /// `docker`, `podman`, or a path to either
    pub container_runtime: String,
    pub workspace_label: String,
    pub lock_stale_secs: u64,
    pub lock_timeout_secs: u64,
}

impl Default for DevportConfig {
    fn default() -> Self {
        DevportConfig {
            port_range_start: DEFAULT_PORT_RANGE_START,
            port_range_end: DEFAULT_PORT_RANGE_END,
            ports_file: None,
            container_runtime: "docker".to_string(),
            workspace_label: DEFAULT_WORKSPACE_LABEL.to_string(),
            lock_stale_secs: 10,
            lock_timeout_secs: 50,
        }
    }
}

impl DevportConfig {
    /// Load config from `path`; a missing file yields the defaults
    ///
    /// # Example
    /// ```no_run
    /// use devport_core::config::DevportConfig;
    ///
    /// let config = DevportConfig::load("/home/me/.config/devport/config.yaml")?;
    /// println!("range {}", config.port_range()?);
    /// # Ok::<(), devport_core::DevportError>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(DevportError::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Self::parse(&content)
            .map_err(|e| DevportError::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Parse YAML or JSON config text and validate it
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: DevportConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve and load the effective config
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match explicit
            .map(Path::to_path_buf)
            .or_else(|| config_path_from(|k| env::var(k).ok()))
        {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.port_range()?;
        // Zero would make every live lease look abandoned
        if self.lock_stale_secs == 0 {
            return Err(DevportError::Config(
                "lockStaleSecs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn port_range(&self) -> Result<PortRange> {
        PortRange::new(self.port_range_start, self.port_range_end)
    }

    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            max_lease_age: Duration::from_secs(self.lock_stale_secs),
            wait_budget: Duration::from_secs(self.lock_timeout_secs),
            ..LockOptions::default()
        }
    }

    /// Port table location: $DEVPORT_PORTS_FILE, then `portsFile`, then the
    /// user cache directory
    pub fn ports_file(&self) -> Result<PathBuf> {
        self.ports_file_from(|k| env::var(k).ok())
    }

    fn ports_file_from<F>(&self, var: F) -> Result<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = var(PORTS_FILE_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        if let Some(path) = &self.ports_file {
            return Ok(path.clone());
        }

        let cache_dir = var("XDG_CACHE_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| var("HOME").map(|home| PathBuf::from(home).join(".cache")))
            .ok_or_else(|| {
                DevportError::Config(
                    "Cannot locate cache directory: neither XDG_CACHE_HOME nor HOME is set"
                        .to_string(),
                )
            })?;

        Ok(cache_dir.join(APP_DIR).join(PORTS_FILE))
    }
}

fn config_path_from<F>(var: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = var(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(path));
    }
    var("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| var("HOME").map(|home| PathBuf::from(home).join(".config")))
        .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}
