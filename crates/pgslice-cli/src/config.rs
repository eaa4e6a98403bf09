use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use pgslice_core::DEFAULT_SCHEMA;
use pgslice_introspect::ConnectionParams;

use crate::errors::{config_error, CliError, CliResult};

/// Settings shared by every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub schema: String,
    pub connection_ttl_minutes: u64,
    pub max_depth: Option<usize>,
    pub log_level: Option<String>,
    pub sql_batch_size: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: String::new(),
            user: String::new(),
            schema: DEFAULT_SCHEMA.to_string(),
            connection_ttl_minutes: 30,
            max_depth: None,
            log_level: None,
            sql_batch_size: 100,
        }
    }
}

/// Values given on the command line; `None` leaves the setting alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub log_level: Option<String>,
}

impl AppConfig {
    /// Defaults, then the optional TOML file, the process environment and
    /// finally `overrides`.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> CliResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_overrides(overrides);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| CliError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> CliResult<()> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(host) = var("DB_HOST") {
            self.host = host;
        }
        if let Some(port) = var("DB_PORT") {
            self.port = parse_env("DB_PORT", &port)?;
        }
        if let Some(database) = var("DB_NAME") {
            self.database = database;
        }
        if let Some(user) = var("DB_USER") {
            self.user = user;
        }
        if let Some(schema) = var("DB_SCHEMA") {
            self.schema = schema;
        }
        if let Some(ttl) = var("CONNECTION_TTL_MINUTES") {
            self.connection_ttl_minutes = parse_env("CONNECTION_TTL_MINUTES", &ttl)?;
        }
        if let Some(depth) = var("MAX_DEPTH") {
            self.max_depth = Some(parse_env("MAX_DEPTH", &depth)?);
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = Some(level);
        }
        if let Some(size) = var("SQL_BATCH_SIZE") {
            self.sql_batch_size = parse_env("SQL_BATCH_SIZE", &size)?;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(host) = &overrides.host {
            self.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(user) = &overrides.user {
            self.user = user.clone();
        }
        if let Some(database) = &overrides.database {
            self.database = database.clone();
        }
        if let Some(schema) = &overrides.schema {
            self.schema = schema.clone();
        }
        if let Some(level) = &overrides.log_level {
            self.log_level = Some(level.clone());
        }
    }

    pub fn connection_ttl(&self) -> Duration {
        Duration::from_secs(self.connection_ttl_minutes.saturating_mul(60))
    }

    /// Connection parameters; host, user and database must all be set.
    pub fn connection_params(&self, password: Option<String>) -> CliResult<ConnectionParams> {
        let missing: Vec<&str> = [
            ("host", &self.host),
            ("user", &self.user),
            ("database", &self.database),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            return Err(config_error(format!(
                "Missing required connection parameters: {}",
                missing.join(", ")
            )));
        }

        Ok(ConnectionParams {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            database: self.database.clone(),
            password,
        })
    }
}

fn parse_env<T: FromStr>(key: &str, raw: &str) -> CliResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| config_error(format!("Invalid value for {key}: {raw:?}")))
}

/// `PGPASSWORD`, else an interactive prompt when stdin is a terminal.
pub fn resolve_password(params_hint: &str) -> CliResult<Option<String>> {
    use std::io::IsTerminal;

    if let Ok(password) = std::env::var("PGPASSWORD") {
        return Ok(Some(password));
    }
    if !std::io::stdin().is_terminal() {
        return Ok(None);
    }
    let password = rpassword::prompt_password(format!("Password for {params_hint}: "))?;
    Ok(Some(password).filter(|password| !password.is_empty()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.schema, "public");
        assert_eq!(config.connection_ttl(), Duration::from_secs(30 * 60));
        assert_eq!(config.max_depth, None);
        assert_eq!(config.sql_batch_size, 100);
    }

    #[test]
    fn environment_overrides_defaults() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("DB_HOST", "db.internal"),
                ("DB_PORT", "6543"),
                ("DB_NAME", "shop"),
                ("DB_USER", "reader"),
                ("MAX_DEPTH", "3"),
                ("SQL_BATCH_SIZE", "0"),
                ("LOG_LEVEL", "debug"),
            ]))
            .unwrap();

        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6543);
        assert_eq!(config.database, "shop");
        assert_eq!(config.user, "reader");
        assert_eq!(config.max_depth, Some(3));
        assert_eq!(config.sql_batch_size, 0);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn unparsable_numbers_name_the_variable() {
        let mut config = AppConfig::default();
        let err = config.apply_env(env(&[("DB_PORT", "fifty")])).unwrap_err();
        assert!(err.to_string().contains("DB_PORT"));
    }

    #[test]
    fn flags_beat_environment_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pgslice.toml");
        std::fs::write(&path, "host = \"file-host\"\nuser = \"file-user\"\nsql_batch_size = 25\n").unwrap();

        let mut config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.sql_batch_size, 25);
        assert_eq!(config.port, 5432);

        config.apply_env(env(&[("DB_USER", "env-user")])).unwrap();
        config.apply_overrides(&ConfigOverrides {
            host: Some("flag-host".to_string()),
            ..ConfigOverrides::default()
        });

        assert_eq!(config.host, "flag-host");
        assert_eq!(config.user, "env-user");
    }

    #[test]
    fn malformed_file_is_reported_with_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "port = \"not a number\"").unwrap();

        let err = AppConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, CliError::ConfigParse { .. }));
    }

    #[test]
    fn missing_connection_settings_are_listed() {
        let err = AppConfig::default().connection_params(None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration error: Missing required connection parameters: user, database"
        );

        let config = AppConfig {
            user: "reader".to_string(),
            database: "shop".to_string(),
            ..AppConfig::default()
        };
        let params = config.connection_params(Some("secret".to_string())).unwrap();
        assert_eq!(params.describe(), "reader@localhost:5432/shop");
    }
}
