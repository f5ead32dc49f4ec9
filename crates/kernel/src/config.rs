//! Configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result};

/// Kernel configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Fail operations on unregistered entity types instead of returning
    /// empty results (default: true).
    pub strict_entity_types: bool,

    /// Maximum nested dispatch depth of one bus on one thread (default:
    /// unlimited). Also caps nested content lookups.
    pub max_dispatch_depth: Option<usize>,

    /// Plugin keys whose entity types are left out of the registry.
    pub disabled_plugins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strict_entity_types: true,
            max_dispatch_depth: None,
            disabled_plugins: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through a variable lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let strict_entity_types = match lookup("CONTENT_STRICT_TYPES") {
            Some(v) => parse_bool(&v).context("CONTENT_STRICT_TYPES must be a boolean")?,
            None => true,
        };

        let max_dispatch_depth = lookup("EVENT_MAX_DEPTH")
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.trim().parse::<usize>())
            .transpose()
            .context("EVENT_MAX_DEPTH must be a valid usize")?;

        let disabled_plugins = lookup("CONTENT_DISABLED_PLUGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            strict_entity_types,
            max_dispatch_depth,
            disabled_plugins,
        })
    }

    /// Check if a plugin's entity types are excluded from the registry.
    pub fn is_plugin_disabled(&self, plugin_key: &str) -> bool {
        self.disabled_plugins.iter().any(|p| p == plugin_key)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("invalid boolean '{other}'"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert!(config.strict_entity_types);
        assert_eq!(config.max_dispatch_depth, None);
        assert!(config.disabled_plugins.is_empty());
    }

    #[test]
    fn parses_all_variables() {
        let config = load(&[
            ("CONTENT_STRICT_TYPES", "off"),
            ("EVENT_MAX_DEPTH", "16"),
            ("CONTENT_DISABLED_PLUGINS", "photos, ,video"),
        ])
        .unwrap();

        assert!(!config.strict_entity_types);
        assert_eq!(config.max_dispatch_depth, Some(16));
        assert_eq!(config.disabled_plugins, vec!["photos", "video"]);
        assert!(config.is_plugin_disabled("video"));
        assert!(!config.is_plugin_disabled("base"));
    }

    #[test]
    fn rejects_invalid_values() {
        let err = load(&[("EVENT_MAX_DEPTH", "deep")]).unwrap_err();
        assert!(err.to_string().contains("EVENT_MAX_DEPTH"));

        let err = load(&[("CONTENT_STRICT_TYPES", "maybe")]).unwrap_err();
        assert!(err.to_string().contains("CONTENT_STRICT_TYPES"));
    }
}
