//! Concrete schema providers and execution sinks.

pub mod sqlite;

pub use sqlite::SqliteProvider;
