//! Configuration loader with environment variable expansion and overlay

use super::{expand_env_vars, Config, ConfigError};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// Values read from the process environment.
///
/// Every field is optional; a set, non-empty value overrides whatever the
/// configuration file (or the built-in default) provided. Numeric and boolean
/// values are read as text so that `PORT=` counts as unset.
#[derive(Debug, Default, Deserialize)]
pub struct EnvOverrides {
    pub gh_owner: Option<String>,
    pub gh_repo: Option<String>,
    pub gh_branch: Option<String>,
    pub gh_token: Option<String>,
    pub gh_api_url: Option<String>,
    pub port: Option<String>,
    pub metrics_enabled: Option<String>,
    pub metrics_port: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &str, value: Option<String>) -> Result<Option<T>, ConfigError> {
    non_empty(value)
        .map(|v| {
            v.trim().parse::<T>().map_err(|_| {
                ConfigError::ValidationError(format!("Invalid value for {}: '{}'", name, v))
            })
        })
        .transpose()
}

impl EnvOverrides {
    /// Read overrides from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(envy::from_env::<EnvOverrides>()?)
    }

    /// Apply the overrides on top of `config`
    pub fn apply(self, config: &mut Config) -> Result<(), ConfigError> {
        fn set(slot: &mut String, value: Option<String>) {
            if let Some(value) = non_empty(value) {
                *slot = value;
            }
        }

        set(&mut config.github.owner, self.gh_owner);
        set(&mut config.github.repo, self.gh_repo);
        set(&mut config.github.branch, self.gh_branch);
        set(&mut config.github.token, self.gh_token);
        set(&mut config.github.api_url, self.gh_api_url);

        if let Some(port) = parse_var::<u16>("PORT", self.port)? {
            config.server.address = format!("0.0.0.0:{}", port);
        }
        if let Some(enabled) = parse_var::<bool>("METRICS_ENABLED", self.metrics_enabled)? {
            config.metrics.enabled = enabled;
        }
        if let Some(port) = parse_var::<u16>("METRICS_PORT", self.metrics_port)? {
            config.metrics.port = port;
        }

        Ok(())
    }
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file, overlay the environment and validate
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        EnvOverrides::from_env()?.apply(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from defaults plus the environment and validate
    pub fn from_env() -> Result<Config, ConfigError> {
        let mut config = Config::default();
        EnvOverrides::from_env()?.apply(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML content after `${VAR}` expansion, without validating
    pub fn parse(content: &str) -> Result<Config, ConfigError> {
        let expanded = expand_env_vars(content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        Ok(config)
    }
}
