//! TOML-based configuration for dynaquery.
//!
//! Supports a config file (dynaquery.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! dialect = "tsql"
//! default_schema = "dbo"
//!
//! [naming]
//! pluralization = true
//!
//! [paging]
//! order_fallback = "primary_key"   # or "fail"
//!
//! [sqlite]
//! path = "${DYNAQUERY_DB}"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compiler::{CompilerOptions, OrderFallback};
use crate::schema::NamingPolicy;
use crate::sql::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Target SQL dialect.
    pub dialect: Dialect,

    /// Schema preferred when a table name exists in several schemas.
    pub default_schema: Option<String>,

    pub naming: NamingSettings,

    pub paging: PagingSettings,

    pub sqlite: SqliteSettings,
}

/// Name resolution settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NamingSettings {
    /// Match plural and singular forms of table and column names.
    pub pluralization: bool,
}

impl Default for NamingSettings {
    fn default() -> Self {
        Self {
            pluralization: true,
        }
    }
}

/// Paging settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PagingSettings {
    /// What to order by when a paged query has no OrderBy.
    pub order_fallback: OrderFallback,
}

/// SQLite database used by the command line tool.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SqliteSettings {
    /// Database file (supports ${ENV_VAR} expansion).
    pub path: Option<String>,
}

impl SqliteSettings {
    /// Get the database path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn parse(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `DYNAQUERY_CONFIG`
    /// 2. `./dynaquery.toml`
    /// 3. `~/.config/dynaquery/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("DYNAQUERY_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("dynaquery.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("dynaquery").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if let Some(schema) = &self.default_schema {
            if schema.trim().is_empty() {
                return Err(SettingsError::InvalidConfig(
                    "default_schema must not be empty".to_string(),
                ));
            }
        }
        if let Some(path) = &self.sqlite.path {
            if path.trim().is_empty() {
                return Err(SettingsError::InvalidConfig(
                    "sqlite.path must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn compiler_options(&self) -> CompilerOptions {
        CompilerOptions {
            order_fallback: self.paging.order_fallback,
        }
    }

    pub fn naming_policy(&self) -> NamingPolicy {
        let mut policy = NamingPolicy::default();
        if let Some(schema) = &self.default_schema {
            policy = policy.with_default_schema(schema.clone());
        }
        if !self.naming.pluralization {
            policy = policy.without_pluralization();
        }
        policy
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name = if chars.next_if_eq(&'{').is_some() {
            let mut name = String::new();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                name.push(ch);
            }
            name
        } else {
            // $VAR ends at the first non-alphanumeric/underscore
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
