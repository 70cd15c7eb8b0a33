//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::MemoloadConfig;
use std::path::Path;

/// Name of the configuration file looked up in a workspace directory.
pub const CONFIG_FILE: &str = "memoload.toml";

/// Loads and validates `memoload.toml` from `dir`.
///
/// A missing file is not an error: the defaults apply.
pub fn load_config(dir: &Path) -> Result<MemoloadConfig, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    let content = match std::fs::read_to_string(&config_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(MemoloadConfig::default())
        }
        Err(e) => return Err(e.into()),
    };
    load_config_from_str(&content)
}

/// Parses and validates configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<MemoloadConfig, ConfigError> {
    let config: MemoloadConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &MemoloadConfig) -> Result<(), ConfigError> {
    if let Some(shards) = config.cache.shards {
        if shards < 2 || !shards.is_power_of_two() {
            return Err(ConfigError::ValidationError(format!(
                "cache.shards must be a power of two greater than one, got {shards}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Retention;

    #[test]
    fn empty_config_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.cache.retention, Retention::Strong);
        assert_eq!(config.cache.initial_capacity, 0);
        assert!(config.cache.shards.is_none());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[cache]
retention = "weak"
initial_capacity = 4096
shards = 64
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.cache.retention, Retention::Weak);
        assert_eq!(config.cache.initial_capacity, 4096);
        assert_eq!(config.cache.shards, Some(64));
    }

    #[test]
    fn non_power_of_two_shards_rejected() {
        let err = load_config_from_str("[cache]\nshards = 12\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn single_shard_rejected() {
        let err = load_config_from_str("[cache]\nshards = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn unknown_retention_is_parse_error() {
        let err = load_config_from_str("[cache]\nretention = \"soft\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn unknown_key_is_parse_error() {
        let err = load_config_from_str("[cache]\npersist = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[cache]\nretention = \"weak\"\n").unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.cache.retention, Retention::Weak);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.cache.retention, Retention::Strong);
    }
}
