//! Session timing configuration.
//!
//! Defaults are always available. With the `config` feature the same struct can be
//! read from TOML, e.g. `~/.config/phiclear/config.toml`:
//!
//! ```toml
//! idle_timeout_ms = 900000
//! poll_interval_ms = 1000
//! ```

use crate::error::{PhiClearError, Result};
use std::time::Duration;

pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 15 * 60 * 1000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default, deny_unknown_fields))]
pub struct SessionConfig {
    /// Inactivity after which PHI is cleared
    pub idle_timeout_ms: u64,
    /// How often the background watcher checks for expiry
    pub poll_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout_ms = millis_rounded_up(timeout);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = millis_rounded_up(interval);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout_ms == 0 {
            return Err(PhiClearError::config("idle_timeout_ms must be greater than zero"));
        }
        if self.poll_interval_ms == 0 {
            return Err(PhiClearError::config("poll_interval_ms must be greater than zero"));
        }
        if self.poll_interval_ms > self.idle_timeout_ms {
            return Err(PhiClearError::config(format!(
                "poll_interval_ms ({}) must not exceed idle_timeout_ms ({})",
                self.poll_interval_ms, self.idle_timeout_ms
            )));
        }
        Ok(())
    }
}

/// Sub-millisecond remainders round up so a non-zero duration never becomes zero.
fn millis_rounded_up(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

#[cfg(feature = "config")]
mod file {
    use super::SessionConfig;
    use crate::error::{PhiClearError, Result};
    use std::path::{Path, PathBuf};

    impl SessionConfig {
        /// Parse and validate a TOML document
        pub fn from_toml_str(contents: &str) -> Result<Self> {
            let config: SessionConfig =
                toml::from_str(contents).map_err(|e| PhiClearError::config(e.to_string()))?;
            config.validate()?;
            Ok(config)
        }

        pub fn load(path: &Path) -> Result<Self> {
            if !path.exists() {
                return Err(PhiClearError::ConfigNotFound {
                    path: path.to_path_buf(),
                });
            }
            let contents = std::fs::read_to_string(path).map_err(|e| {
                PhiClearError::file_error(format!("reading {}", path.display()), e)
            })?;
            Self::from_toml_str(&contents)
        }

        /// `<config_dir>/phiclear/config.toml`
        pub fn default_path() -> Option<PathBuf> {
            dirs::config_dir().map(|dir| dir.join("phiclear").join("config.toml"))
        }

        /// Load the default file if present, otherwise fall back to defaults
        pub fn load_or_default() -> Result<Self> {
            match Self::default_path() {
                Some(path) if path.exists() => Self::load(&path),
                _ => Ok(Self::default()),
            }
        }

        pub fn to_toml_string(&self) -> Result<String> {
            toml::to_string(self).map_err(|e| PhiClearError::config(e.to_string()))
        }
    }
}
