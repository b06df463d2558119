use super::types::*;
use crate::error_handling::types::ConfigError;
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest connection pool accepted for the contract store.
pub const MAX_POOL_SIZE: u32 = 64;

/// Runtime configuration of the contract service.
///
/// Read from a TOML file, every field optional:
///
/// ```toml
/// [database]
/// path = "/var/lib/kosmos/contracts.sqlite3"
/// max_connections = 5
///
/// [system]
/// name = "edge-1"
/// ```
///
/// Command-line flags (or their environment variables, see [`Overrides`])
/// take precedence over the file.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub system: SystemConfig,
}

/// Settings that may be given on the command line or through the environment.
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Path of the SQLite contract database
    #[arg(long, env = "KOSMOS_DATABASE")]
    pub database: Option<PathBuf>,

    /// Name of the local system
    #[arg(long, env = "KOSMOS_SYSTEM")]
    pub system: Option<String>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Config, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))
    }

    /// Reads the file when one is given, applies the overrides and validates
    /// the result.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Config, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(database) = &overrides.database {
            self.database.path = database.clone();
        }
        if let Some(system) = &overrides.system {
            self.system.name = system.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.system.name.trim().is_empty() {
            return Err(ConfigError::MissingValue("system.name".to_string()));
        }
        if !(1..=MAX_POOL_SIZE).contains(&self.database.max_connections) {
            return Err(ConfigError::NotInRange(format!(
                "database.max_connections must be between 1 and {}, got {}",
                MAX_POOL_SIZE, self.database.max_connections
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        overrides: Overrides,
    }

    #[test]
    fn test_from_toml_str() {
        let config = Config::from_toml_str(
            r#"
[database]
path = "/tmp/contracts.sqlite3"
max_connections = 8

[system]
name = "edge-1"
"#,
        )
        .unwrap();
        assert_eq!(config.database.path, PathBuf::from("/tmp/contracts.sqlite3"));
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.system.name, "edge-1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = Config::from_toml_str("[system]\nname = \"edge-1\"\n").unwrap();
        assert_eq!(config.database, DatabaseConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml_str("[database\npath = 1").unwrap_err();
        assert!(matches!(err, ConfigError::TomlError(_)));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        assert!(matches!(config.validate(), Err(ConfigError::MissingValue(_))));

        config.system.name = "edge-1".into();
        config.database.max_connections = 0;
        assert!(matches!(config.validate(), Err(ConfigError::NotInRange(_))));

        config.database.max_connections = MAX_POOL_SIZE + 1;
        assert!(matches!(config.validate(), Err(ConfigError::NotInRange(_))));
    }

    #[test]
    fn test_from_file_and_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[system]\nname = \"from-file\"").unwrap();

        let overrides = Overrides {
            database: Some(PathBuf::from("/tmp/override.sqlite3")),
            system: None,
        };
        let config = Config::load(Some(file.path()), &overrides).unwrap();
        assert_eq!(config.system.name, "from-file");
        assert_eq!(config.database.path, PathBuf::from("/tmp/override.sqlite3"));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/kosmos.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    #[serial]
    fn test_overrides_from_environment() {
        std::env::set_var("KOSMOS_SYSTEM", "env-system");
        std::env::remove_var("KOSMOS_DATABASE");
        let cli = Cli::try_parse_from(["kosmos-contracts"]).unwrap();
        std::env::remove_var("KOSMOS_SYSTEM");

        assert_eq!(cli.overrides.system.as_deref(), Some("env-system"));
        assert_eq!(cli.overrides.database, None);
    }

    #[test]
    #[serial]
    fn test_flag_beats_environment() {
        std::env::set_var("KOSMOS_SYSTEM", "env-system");
        let cli = Cli::try_parse_from(["kosmos-contracts", "--system", "flag-system"]).unwrap();
        std::env::remove_var("KOSMOS_SYSTEM");

        assert_eq!(cli.overrides.system.as_deref(), Some("flag-system"));
    }
}
