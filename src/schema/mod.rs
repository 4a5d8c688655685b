//! Schema model and name resolution.
//!
//! ```text
//! SchemaProvider ──(list_tables, list_columns, ...)──▶ SchemaCache
//!                                                        │ single-flight populate
//!                                                        ▼
//!                                             Arc<DatabaseSchema>
//!                                  find_table / find_column / related_tables
//! ```

pub mod cache;
pub mod inflection;
pub mod naming;
pub mod provider;
pub mod table;

pub use cache::SchemaCache;
pub use inflection::{InflectorPluralizer, Pluralizer};
pub use naming::{homogenize, MatchTier, NamingPolicy, Resolution};
pub use provider::{
    CatalogSnapshot, ColumnInfo, ForeignKeyInfo, ProviderError, ProviderResult, SchemaProvider,
    StaticProvider, TableInfo, TableSnapshot,
};
pub use table::{Column, DatabaseSchema, ForeignKey, Table, TableType};
