//! Engine configuration
//!
//! Settings for the execution layer and for result formatting. Values can be
//! built in code through [`EngineConfigBuilder`] or loaded from TOML/YAML files.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for the compute engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Idle time (seconds) after which the reaper terminates a unit
    pub idle_timeout: u64,
    /// Interval (seconds) between reaper passes
    pub cleanup_interval: u64,
    /// Nominal delay (milliseconds) before a cache hit is returned
    pub cache_hit_delay: u64,
    /// Worker threads used by batched invocation
    pub batch_threads: usize,
    /// Pivot magnitude below which a matrix is treated as singular
    pub singular_epsilon: f64,
    /// Decimal places kept in table cells
    pub decimals: u32,
    /// Whether calls use the result cache unless they say otherwise
    pub cache_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            idle_timeout: 300,
            cleanup_interval: 60,
            cache_hit_delay: 10,
            batch_threads: num_cpus::get(),
            singular_epsilon: 1e-10,
            decimals: 3,
            cache_enabled: true,
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a configuration from YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file, choosing the format by extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            other => Err(Error::Config(format!(
                "unsupported configuration format: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }

    /// Loads `<config dir>/statsuite/engine.toml` if present, defaults otherwise
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => {
                log::info!("Loading engine configuration from {}", path.display());
                Self::from_file(path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Location of the per-user configuration file
    pub fn default_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|dir| dir.join("statsuite").join("engine.toml"))
    }

    /// Checks value ranges
    pub fn validate(&self) -> Result<()> {
        if self.decimals > 15 {
            return Err(Error::Config(format!(
                "decimals must be at most 15, got {}",
                self.decimals
            )));
        }
        if !(self.singular_epsilon > 0.0) {
            return Err(Error::Config(format!(
                "singular_epsilon must be positive, got {}",
                self.singular_epsilon
            )));
        }
        if self.batch_threads == 0 {
            return Err(Error::Config("batch_threads must be at least 1".into()));
        }
        if self.cleanup_interval == 0 {
            return Err(Error::Config("cleanup_interval must be at least 1 second".into()));
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval)
    }

    pub fn cache_hit_delay(&self) -> Duration {
        Duration::from_millis(self.cache_hit_delay)
    }
}

/// Builder for EngineConfig
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Creates a new builder
    pub fn new() -> Self {
        EngineConfigBuilder {
            config: EngineConfig::default(),
        }
    }

    /// Sets the idle timeout in seconds
    pub fn idle_timeout(mut self, secs: u64) -> Self {
        self.config.idle_timeout = secs;
        self
    }

    /// Sets the reaper interval in seconds
    pub fn cleanup_interval(mut self, secs: u64) -> Self {
        self.config.cleanup_interval = secs;
        self
    }

    /// Sets the cache hit delay in milliseconds
    pub fn cache_hit_delay(mut self, millis: u64) -> Self {
        self.config.cache_hit_delay = millis;
        self
    }

    /// Sets the number of batch worker threads
    pub fn batch_threads(mut self, threads: usize) -> Self {
        self.config.batch_threads = threads;
        self
    }

    /// Sets the singularity threshold
    pub fn singular_epsilon(mut self, epsilon: f64) -> Self {
        self.config.singular_epsilon = epsilon;
        self
    }

    /// Sets the number of decimals kept in table cells
    pub fn decimals(mut self, decimals: u32) -> Self {
        self.config.decimals = decimals;
        self
    }

    /// Sets whether caching is on by default
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.config.cache_enabled = enabled;
        self
    }

    /// Validates and builds the configuration
    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.decimals, 3);
        assert!(config.cache_enabled);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str("idle_timeout = 5\ndecimals = 4\n").unwrap();
        assert_eq!(config.idle_timeout, 5);
        assert_eq!(config.decimals, 4);
        assert_eq!(config.cleanup_interval, 60);
    }

    #[test]
    fn test_yaml_config() {
        let config = EngineConfig::from_yaml_str("cache_hit_delay: 0\nbatch_threads: 2\n").unwrap();
        assert_eq!(config.cache_hit_delay(), Duration::from_millis(0));
        assert_eq!(config.batch_threads, 2);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(EngineConfig::from_toml_str("decimals = 40").is_err());
        assert!(EngineConfigBuilder::new().batch_threads(0).build().is_err());
        assert!(EngineConfigBuilder::new().singular_epsilon(0.0).build().is_err());
        assert!(matches!(
            EngineConfig::from_toml_str("cleanup_interval = 0"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_from_file_dispatches_on_extension() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "cleanup_interval = 7").unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.cleanup_interval, 7);

        let other = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            EngineConfig::from_file(other.path()),
            Err(Error::Config(_))
        ));
    }
}
