use std::path::Path;

use serde::Deserialize;

use crate::errors::ConfigError;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://agentdeck.db?mode=rwc";

/// Knowledge files whose name starts with this prefix are conversation
/// summaries, not knowledge, and are never cloned.
pub const DEFAULT_KNOWLEDGE_EXCLUDE_PREFIX: &str = "Summary";

/// Engine configuration, layered as defaults, then an optional TOML file, then
/// environment variables. The CLI applies its own flags last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub database_url: String,
    /// Apply pending migrations at startup instead of refusing to run.
    pub auto_migrate: bool,
    pub knowledge_exclude_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            auto_migrate: false,
            knowledge_exclude_prefix: DEFAULT_KNOWLEDGE_EXCLUDE_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    database_url: Option<String>,
    auto_migrate: Option<bool>,
    knowledge_exclude_prefix: Option<String>,
}

impl EngineConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = path {
            config.merge_file(path)?;
        }
        config.merge_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml_str(path: &str, raw: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.merge_toml(path, raw)?;
        Ok(config)
    }

    fn merge_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        self.merge_toml(&display, &raw)
    }

    fn merge_toml(&mut self, path: &str, raw: &str) -> Result<(), ConfigError> {
        let file: FileConfig = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;

        if let Some(url) = file.database_url {
            self.database_url = url;
        }
        if let Some(auto_migrate) = file.auto_migrate {
            self.auto_migrate = auto_migrate;
        }
        if let Some(prefix) = file.knowledge_exclude_prefix {
            self.knowledge_exclude_prefix = prefix;
        }
        Ok(())
    }

    fn merge_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("AGENTDECK_DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(raw) = lookup("AGENTDECK_AUTO_MIGRATE") {
            self.auto_migrate = parse_bool("AGENTDECK_AUTO_MIGRATE", &raw)?;
        }
        Ok(())
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_are_used_without_sources() {
        let config = EngineConfig::load(None).unwrap_or_default();
        assert_eq!(config.knowledge_exclude_prefix, "Summary");
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = EngineConfig::from_toml_str(
            "inline",
            "database_url = \"sqlite::memory:\"\nauto_migrate = true\n",
        )
        .unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert!(config.auto_migrate);
        assert_eq!(config.knowledge_exclude_prefix, DEFAULT_KNOWLEDGE_EXCLUDE_PREFIX);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = EngineConfig::from_toml_str("inline", "databse_url = \"x\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database_url = \"sqlite://from-file.db\"").unwrap();

        let mut config = EngineConfig::default();
        config.merge_file(file.path()).unwrap();
        assert_eq!(config.database_url, "sqlite://from-file.db");

        let env: HashMap<&str, &str> = [
            ("AGENTDECK_DATABASE_URL", "sqlite://from-env.db"),
            ("AGENTDECK_AUTO_MIGRATE", "yes"),
        ]
        .into_iter()
        .collect();
        config
            .merge_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database_url, "sqlite://from-env.db");
        assert!(config.auto_migrate);
    }

    #[test]
    fn invalid_bool_is_reported() {
        let mut config = EngineConfig::default();
        let err = config
            .merge_env(|key| (key == "AGENTDECK_AUTO_MIGRATE").then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
