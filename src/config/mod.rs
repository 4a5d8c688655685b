//! Configuration module for dynaquery.
//!
//! Handles the settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, NamingSettings, PagingSettings, Settings, SettingsError, SqliteSettings,
};
