//! Database configuration from environment variables.
//!
//! | Variable                         | Default          |
//! |----------------------------------|------------------|
//! | `BACKOFFICE_DB_PATH`             | `backoffice.db`  |
//! | `BACKOFFICE_DB_MAX_CONNECTIONS`  | `5`              |
//! | `BACKOFFICE_DB_RUN_MIGRATIONS`   | `true`           |

use std::env;

use crate::pool::DbConfig;

pub const DB_PATH_VAR: &str = "BACKOFFICE_DB_PATH";
pub const DB_MAX_CONNECTIONS_VAR: &str = "BACKOFFICE_DB_MAX_CONNECTIONS";
pub const DB_RUN_MIGRATIONS_VAR: &str = "BACKOFFICE_DB_RUN_MIGRATIONS";

/// Default database file, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "backoffice.db";

impl DbConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = lookup(DB_PATH_VAR).unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        let max_connections: u32 = lookup(DB_MAX_CONNECTIONS_VAR)
            .unwrap_or_else(|| "5".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue(DB_MAX_CONNECTIONS_VAR.to_string()))?;

        if max_connections == 0 {
            return Err(ConfigError::InvalidValue(DB_MAX_CONNECTIONS_VAR.to_string()));
        }

        let run_migrations: bool = lookup(DB_RUN_MIGRATIONS_VAR)
            .unwrap_or_else(|| "true".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue(DB_RUN_MIGRATIONS_VAR.to_string()))?;

        Ok(DbConfig::new(path)
            .max_connections(max_connections)
            .run_migrations(run_migrations))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DbConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.max_connections, 5);
        assert!(config.run_migrations);
    }

    #[test]
    fn test_overrides() {
        let config = DbConfig::from_lookup(lookup(&[
            (DB_PATH_VAR, "/var/lib/backoffice/data.db"),
            (DB_MAX_CONNECTIONS_VAR, "8"),
            (DB_RUN_MIGRATIONS_VAR, "false"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/var/lib/backoffice/data.db"));
        assert_eq!(config.max_connections, 8);
        assert!(!config.run_migrations);
    }

    #[test]
    fn test_invalid_values() {
        let err = DbConfig::from_lookup(lookup(&[(DB_MAX_CONNECTIONS_VAR, "many")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for BACKOFFICE_DB_MAX_CONNECTIONS");

        assert!(DbConfig::from_lookup(lookup(&[(DB_MAX_CONNECTIONS_VAR, "0")])).is_err());
        assert!(DbConfig::from_lookup(lookup(&[(DB_RUN_MIGRATIONS_VAR, "yes")])).is_err());
    }
}
