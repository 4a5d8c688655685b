//! SchemaProvider trait definition.
//!
//! A schema provider reads raw catalogue rows from a live database. The
//! [`SchemaCache`](super::SchemaCache) turns them into a resolved
//! [`DatabaseSchema`](super::DatabaseSchema).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::table::TableType;

/// Errors reported by a schema provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("catalogue query failed: {0}")]
    Query(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("invalid catalogue snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// A table or view as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub table_type: TableType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>, table_type: TableType) -> Self {
        Self {
            name: name.into(),
            table_type,
            schema: None,
        }
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub is_identity: bool,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_identity: false,
            nullable: true,
        }
    }

    pub fn identity(mut self) -> Self {
        self.is_identity = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// A foreign key as listed by the provider; `table` holds the local
/// (detail) columns, `master_table` the referenced unique columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub table: String,
    pub columns: Vec<String>,
    pub master_table: String,
    pub master_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_schema: Option<String>,
}

/// Source of catalogue information for one database.
///
/// Every listing may legitimately be empty. Tables are addressed by the
/// name (and schema) returned from [`SchemaProvider::list_tables`].
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    async fn list_tables(&self) -> ProviderResult<Vec<TableInfo>>;

    async fn list_columns(&self, table: &TableInfo) -> ProviderResult<Vec<ColumnInfo>>;

    /// Primary key column names in key order.
    async fn list_primary_keys(&self, table: &TableInfo) -> ProviderResult<Vec<String>>;

    async fn list_foreign_keys(&self) -> ProviderResult<Vec<ForeignKeyInfo>>;

    /// Fetch columns and primary keys for many tables concurrently.
    async fn describe_tables(
        &self,
        tables: &[TableInfo],
    ) -> ProviderResult<Vec<(Vec<ColumnInfo>, Vec<String>)>> {
        let futures: Vec<_> = tables
            .iter()
            .map(|table| async move {
                let columns = self.list_columns(table).await?;
                let keys = self.list_primary_keys(table).await?;
                Ok::<_, ProviderError>((columns, keys))
            })
            .collect();

        let results = futures::future::join_all(futures).await;

        results.into_iter().collect()
    }
}

/// A fixed, in-memory provider. Handy for tests and for callers that
/// already hold catalogue data.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    tables: Vec<(TableInfo, Vec<ColumnInfo>, Vec<String>)>,
    foreign_keys: Vec<ForeignKeyInfo>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a base table with columns and primary key.
    pub fn table(mut self, name: &str, columns: Vec<ColumnInfo>, primary_key: &[&str]) -> Self {
        self.tables.push((
            TableInfo::new(name, TableType::BaseTable),
            columns,
            primary_key.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    /// Add a table described by a full [`TableInfo`].
    pub fn table_info(
        mut self,
        info: TableInfo,
        columns: Vec<ColumnInfo>,
        primary_key: &[&str],
    ) -> Self {
        self.tables.push((
            info,
            columns,
            primary_key.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    /// Add a foreign key `table(columns) -> master_table(master_columns)`.
    pub fn foreign_key(
        mut self,
        table: &str,
        columns: &[&str],
        master_table: &str,
        master_columns: &[&str],
    ) -> Self {
        self.foreign_keys.push(ForeignKeyInfo {
            table: table.to_string(),
            columns: columns.iter().map(|s| s.to_string()).collect(),
            master_table: master_table.to_string(),
            master_columns: master_columns.iter().map(|s| s.to_string()).collect(),
            schema: None,
            master_schema: None,
        });
        self
    }

    fn find(&self, table: &TableInfo) -> ProviderResult<&(TableInfo, Vec<ColumnInfo>, Vec<String>)> {
        self.tables
            .iter()
            .find(|(info, _, _)| info.name == table.name && info.schema == table.schema)
            .ok_or_else(|| ProviderError::TableNotFound(table.name.clone()))
    }
}

#[async_trait]
impl SchemaProvider for StaticProvider {
    async fn list_tables(&self) -> ProviderResult<Vec<TableInfo>> {
        Ok(self.tables.iter().map(|(info, _, _)| info.clone()).collect())
    }

    async fn list_columns(&self, table: &TableInfo) -> ProviderResult<Vec<ColumnInfo>> {
        Ok(self.find(table)?.1.clone())
    }

    async fn list_primary_keys(&self, table: &TableInfo) -> ProviderResult<Vec<String>> {
        Ok(self.find(table)?.2.clone())
    }

    async fn list_foreign_keys(&self) -> ProviderResult<Vec<ForeignKeyInfo>> {
        Ok(self.foreign_keys.clone())
    }
}

/// Everything a provider lists, as one serializable document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub tables: Vec<TableSnapshot>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    #[serde(flatten)]
    pub info: TableInfo,
    pub columns: Vec<ColumnInfo>,
    #[serde(default)]
    pub primary_key: Vec<String>,
}

impl CatalogSnapshot {
    /// Read the whole catalogue from `provider`.
    pub async fn capture(provider: &dyn SchemaProvider) -> ProviderResult<Self> {
        let tables = provider.list_tables().await?;
        let described = provider.describe_tables(&tables).await?;
        let foreign_keys = provider.list_foreign_keys().await?;

        let tables = tables
            .into_iter()
            .zip(described)
            .map(|(info, (columns, primary_key))| TableSnapshot {
                info,
                columns,
                primary_key,
            })
            .collect();
        Ok(Self {
            tables,
            foreign_keys,
        })
    }

    pub fn from_json(json: &str) -> ProviderResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> ProviderResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl From<CatalogSnapshot> for StaticProvider {
    fn from(snapshot: CatalogSnapshot) -> Self {
        Self {
            tables: snapshot
                .tables
                .into_iter()
                .map(|t| (t.info, t.columns, t.primary_key))
                .collect(),
            foreign_keys: snapshot.foreign_keys,
        }
    }
}
