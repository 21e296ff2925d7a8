//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use toml::{Table, Value};

use crate::config::schema::{AppConfig, Section, Stage};
use crate::config::validation::ValidationError;

/// Prefix of environment variables that override file values.
pub const ENV_PREFIX: &str = "RONIN__";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing configuration section [{0}]")]
    MissingSection(&'static str),

    #[error("invalid [{section}] section: {source}")]
    Section {
        section: &'static str,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid override {var}: {reason}")]
    Override { var: String, reason: String },

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Parsed configuration document.
///
/// Cheap to clone. Sections are deserialized and validated on demand so each
/// module only depends on the tables it reads.
#[derive(Debug, Clone)]
pub struct Configuration {
    app: AppConfig,
    table: Arc<Table>,
}

impl Configuration {
    pub fn from_table(table: Table) -> Result<Self, ConfigError> {
        let app = match table.get(AppConfig::NAME) {
            Some(value) => decode::<AppConfig>(value)?,
            None => AppConfig::default(),
        };
        let errors = app.validate();
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }
        Ok(Self {
            app,
            table: Arc::new(table),
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Self::from_table(content.parse::<Table>()?)
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    pub fn stage(&self) -> Stage {
        self.app.stage
    }

    /// Deserialize and validate a required section.
    pub fn section<T: Section>(&self) -> Result<T, ConfigError> {
        let value = self.table.get(T::NAME).ok_or(ConfigError::MissingSection(T::NAME))?;
        let section = decode::<T>(value)?;
        let errors = section.validate();
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }
        Ok(section)
    }

    /// Like [`Configuration::section`], but an absent table yields the default.
    pub fn section_or_default<T: Section + Default>(&self) -> Result<T, ConfigError> {
        match self.table.get(T::NAME) {
            Some(_) => self.section(),
            None => Ok(T::default()),
        }
    }
}

fn decode<T: Section>(value: &Value) -> Result<T, ConfigError> {
    value.clone().try_into::<T>().map_err(|source| ConfigError::Section {
        section: T::NAME,
        source,
    })
}

/// Load configuration from a TOML file, then apply `RONIN__<SECTION>__<KEY>`
/// environment overrides.
pub fn load_config(path: &Path) -> Result<Configuration, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut table = content.parse::<Table>()?;
    apply_overrides(&mut table, std::env::vars())?;

    let config = Configuration::from_table(table)?;
    tracing::debug!(path = %path.display(), stage = ?config.stage(), "Configuration loaded");
    Ok(config)
}

/// Apply overrides of the form `RONIN__<SECTION>__<KEY>=value`.
///
/// Values are coerced to the type already present in the file; new keys are
/// parsed as integer, bool or float before falling back to a string.
pub fn apply_overrides<I>(table: &mut Table, vars: I) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (var, raw) in vars {
        let Some(path) = var.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let Some((section, key)) = path.split_once("__") else {
            return Err(ConfigError::Override {
                var,
                reason: "expected RONIN__<SECTION>__<KEY>".to_string(),
            });
        };
        let (section, key) = (section.to_ascii_lowercase(), key.to_ascii_lowercase());

        let entry = table
            .entry(section.clone())
            .or_insert_with(|| Value::Table(Table::new()));
        let Value::Table(section_table) = entry else {
            return Err(ConfigError::Override {
                var,
                reason: format!("`{section}` is not a table"),
            });
        };

        let value = match coerce(section_table.get(&key), &raw) {
            Ok(value) => value,
            Err(reason) => return Err(ConfigError::Override { var, reason }),
        };
        tracing::debug!(section = %section, key = %key, "Applying environment override");
        section_table.insert(key, value);
    }
    Ok(())
}

fn coerce(existing: Option<&Value>, raw: &str) -> Result<Value, String> {
    match existing {
        Some(Value::Integer(_)) => raw
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| format!("expected an integer: {e}")),
        Some(Value::Boolean(_)) => raw
            .parse::<bool>()
            .map(Value::Boolean)
            .map_err(|e| format!("expected a boolean: {e}")),
        Some(Value::Float(_)) => raw
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| format!("expected a float: {e}")),
        Some(Value::String(_)) => Ok(Value::String(raw.to_string())),
        Some(_) => Err("only scalar values can be overridden".to_string()),
        None => Ok(raw
            .parse::<i64>()
            .map(Value::Integer)
            .or_else(|_| raw.parse::<bool>().map(Value::Boolean))
            .or_else(|_| raw.parse::<f64>().map(Value::Float))
            .unwrap_or_else(|_| Value::String(raw.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{DatabaseConfig, HttpConfig, LogConfig};

    const SAMPLE: &str = r#"
        [app]
        name = "ronin"
        stage = "production"

        [http]
        host = ":8080"

        [database]
        host = "localhost"
        port = 5432
        user = "ronin"
        password = "secret"
        name = "ronin"
    "#;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn reads_sections_with_defaults() {
        let config = Configuration::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.app().name, "ronin");
        assert_eq!(config.stage(), Stage::Production);

        let http: HttpConfig = config.section().unwrap();
        assert_eq!(http.host, ":8080");
        assert_eq!(http.protocol, "tcp");
        assert_eq!(http.timeout_secs, 30);
    }

    #[test]
    fn missing_section_is_named() {
        let config = Configuration::from_toml_str(SAMPLE).unwrap();
        let err = config.section::<crate::config::schema::ApiConfig>().unwrap_err();
        assert!(matches!(err, ConfigError::MissingSection("api")));
        assert_eq!(err.to_string(), "missing configuration section [api]");
    }

    #[test]
    fn missing_key_is_named() {
        let config = Configuration::from_toml_str("[http]\nprotocol = \"tcp\"\n").unwrap();
        let err = config.section::<HttpConfig>().unwrap_err();
        assert!(matches!(err, ConfigError::Section { section: "http", .. }));
        assert!(err.to_string().contains("host"), "{err}");
    }

    #[test]
    fn optional_section_falls_back_to_default() {
        let config = Configuration::from_toml_str(SAMPLE).unwrap();
        let log: LogConfig = config.section_or_default().unwrap();
        assert_eq!(log.level, "info");
    }

    #[test]
    fn validation_errors_are_reported() {
        let config = Configuration::from_toml_str("[http]\nhost = \"nowhere\"\nprotocol = \"udp\"\n").unwrap();
        match config.section::<HttpConfig>() {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn oversized_hook_timeout_is_a_config_error() {
        let err = Configuration::from_toml_str("[app]\nstop_timeout_secs = 9999999999\n").unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors[0].field, "stop_timeout_secs"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn overrides_keep_existing_types() {
        let mut table: Table = SAMPLE.parse().unwrap();
        apply_overrides(
            &mut table,
            vars(&[
                ("RONIN__DATABASE__PORT", "6543"),
                ("RONIN__HTTP__HOST", "127.0.0.1:9000"),
                ("RONIN__API__RATE_LIMIT", "true"),
                ("PATH", "/usr/bin"),
            ]),
        )
        .unwrap();

        let config = Configuration::from_table(table).unwrap();
        let database: DatabaseConfig = config.section().unwrap();
        assert_eq!(database.port, 6543);
        let http: HttpConfig = config.section().unwrap();
        assert_eq!(http.host, "127.0.0.1:9000");
        assert_eq!(config.table.get("api").and_then(|t| t.get("rate_limit")), Some(&Value::Boolean(true)));
    }

    #[test]
    fn override_with_wrong_type_is_rejected() {
        let mut table: Table = SAMPLE.parse().unwrap();
        let err = apply_overrides(&mut table, vars(&[("RONIN__DATABASE__PORT", "five")])).unwrap_err();
        assert!(matches!(err, ConfigError::Override { ref var, .. } if var == "RONIN__DATABASE__PORT"));
    }
}
