//! Container configuration.
//!
//! Settings can be built in code, read from `MODULAR_DI_*` environment
//! variables, or (with the `config` feature) deserialized from JSON.

use std::env;

#[cfg(feature = "config")]
use serde::Deserialize;

use crate::error::{DiError, DiResult};

/// Prefix of the environment variables read by [`ContainerConfig::from_env`].
pub const ENV_PREFIX: &str = "MODULAR_DI";

/// Settings shared by the scopes a [`ScopeManager`](crate::ScopeManager) builds.
///
/// # Examples
///
/// ```
/// use modular_di::ContainerConfig;
///
/// let config = ContainerConfig::default()
///     .allow_override(false)
///     .max_depth(64)
///     .core_tag("platform");
///
/// assert!(!config.allow_override);
/// assert_eq!(config.inner_tag, "inner");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ContainerConfig {
    /// Re-registering a type before commit replaces it (otherwise `DuplicateRegistration`)
    pub allow_override: bool,
    /// Longest dependency chain a single resolution may walk
    pub max_depth: usize,
    /// The inner scope does not fall back to its parent's bindings
    pub no_parent_binds: bool,
    /// Tag of the infrastructure scope
    pub core_tag: String,
    /// Tag of the application scope
    pub inner_tag: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            allow_override: true,
            max_depth: 1024,
            no_parent_binds: false,
            core_tag: "core".to_string(),
            inner_tag: "inner".to_string(),
        }
    }
}

impl ContainerConfig {
    pub fn allow_override(mut self, allow: bool) -> Self {
        self.allow_override = allow;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn no_parent_binds(mut self, isolated: bool) -> Self {
        self.no_parent_binds = isolated;
        self
    }

    pub fn core_tag(mut self, tag: impl Into<String>) -> Self {
        self.core_tag = tag.into();
        self
    }

    pub fn inner_tag(mut self, tag: impl Into<String>) -> Self {
        self.inner_tag = tag.into();
        self
    }

    /// Defaults overridden by `MODULAR_DI_*` environment variables.
    ///
    /// Recognized: `MODULAR_DI_ALLOW_OVERRIDE`, `MODULAR_DI_MAX_DEPTH`,
    /// `MODULAR_DI_NO_PARENT_BINDS`, `MODULAR_DI_CORE_TAG`,
    /// `MODULAR_DI_INNER_TAG`. Unset variables keep their default; a value
    /// that does not parse is an [`DiError::InvalidConfig`].
    pub fn from_env() -> DiResult<Self> {
        let mut config = Self::default();
        if let Some(value) = env_var("ALLOW_OVERRIDE") {
            config.allow_override = parse_bool("ALLOW_OVERRIDE", &value)?;
        }
        if let Some(value) = env_var("MAX_DEPTH") {
            config.max_depth = value.trim().parse().map_err(|_| invalid("MAX_DEPTH", &value))?;
        }
        if let Some(value) = env_var("NO_PARENT_BINDS") {
            config.no_parent_binds = parse_bool("NO_PARENT_BINDS", &value)?;
        }
        if let Some(value) = env_var("CORE_TAG") {
            config.core_tag = value;
        }
        if let Some(value) = env_var("INNER_TAG") {
            config.inner_tag = value;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parses a JSON object; missing fields keep their defaults.
    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> DiResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|err| DiError::InvalidConfig {
            key: "json".to_string(),
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DiResult<()> {
        if self.max_depth == 0 {
            return Err(invalid("MAX_DEPTH", "0"));
        }
        if self.core_tag == self.inner_tag {
            return Err(DiError::InvalidConfig {
                key: format!("{}_INNER_TAG", ENV_PREFIX),
                message: format!("must differ from core tag '{}'", self.core_tag),
            });
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(format!("{}_{}", ENV_PREFIX, name)).ok()
}

fn parse_bool(name: &str, value: &str) -> DiResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(name, value)),
    }
}

fn invalid(name: &str, value: &str) -> DiError {
    DiError::InvalidConfig {
        key: format!("{}_{}", ENV_PREFIX, name),
        message: format!("unsupported value '{}'", value),
    }
}
