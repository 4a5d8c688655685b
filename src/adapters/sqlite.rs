//! SQLite backend over rusqlite.
//!
//! [`SqliteProvider`] reads the catalogue through `sqlite_master` and the
//! `pragma_*` table-valued functions, and runs compiled statements. One
//! connection is shared behind a mutex; every call is synchronous inside
//! the async trait methods.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Connection;
use tracing::trace;

use crate::compiler::Statement;
use crate::execution::{Database, ExecutionError, ExecutionSink, Row};
use crate::model::Value;
use crate::schema::{
    ColumnInfo, ForeignKeyInfo, NamingPolicy, ProviderError, ProviderResult, SchemaCache,
    SchemaProvider, TableInfo, TableType,
};
use crate::sql::Dialect;

pub struct SqliteProvider {
    conn: Mutex<Connection>,
}

impl SqliteProvider {
    pub fn open(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let conn = Connection::open(path).map_err(|e| ProviderError::Connection(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> ProviderResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| ProviderError::Connection(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Run DDL or other parameterless SQL.
    pub fn execute_batch(&self, sql: &str) -> ProviderResult<()> {
        self.lock().execute_batch(sql).map_err(query_error)
    }

    /// A [`Database`] that reads its schema from, and runs statements on,
    /// this connection.
    pub fn into_database(self: Arc<Self>, naming: NamingPolicy) -> Database {
        let cache = SchemaCache::new(self.clone(), naming);
        Database::new(cache, Dialect::Sqlite, self)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn table_info(&self, table: &str) -> ProviderResult<Vec<(String, String, i64, bool)>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT name, type, pk, \"notnull\" FROM pragma_table_info(?1) ORDER BY cid")
            .map_err(query_error)?;
        let rows = stmt
            .query_map([table], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get::<_, i64>(3)? != 0))
            })
            .map_err(query_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_error)
    }
}

fn query_error(e: rusqlite::Error) -> ProviderError {
    ProviderError::Query(e.to_string())
}

#[async_trait]
impl SchemaProvider for SqliteProvider {
    async fn list_tables(&self) -> ProviderResult<Vec<TableInfo>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT name, type FROM sqlite_master \
                 WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .map_err(query_error)?;
        let rows = stmt
            .query_map([], |row| {
                let name: String = row.get(0)?;
                let kind: String = row.get(1)?;
                let table_type = if kind == "view" {
                    TableType::View
                } else {
                    TableType::BaseTable
                };
                Ok(TableInfo::new(name, table_type))
            })
            .map_err(query_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_error)
    }

    async fn list_columns(&self, table: &TableInfo) -> ProviderResult<Vec<ColumnInfo>> {
        let info = self.table_info(&table.name)?;
        if info.is_empty() {
            return Err(ProviderError::TableNotFound(table.name.clone()));
        }
        let key_columns = info.iter().filter(|(_, _, pk, _)| *pk > 0).count();
        Ok(info
            .into_iter()
            .map(|(name, data_type, pk, not_null)| {
                // A lone INTEGER PRIMARY KEY aliases the rowid.
                let identity =
                    key_columns == 1 && pk == 1 && data_type.eq_ignore_ascii_case("integer");
                let mut column = ColumnInfo::new(name, data_type);
                if identity {
                    column = column.identity();
                }
                if not_null {
                    column = column.not_null();
                }
                column
            })
            .collect())
    }

    async fn list_primary_keys(&self, table: &TableInfo) -> ProviderResult<Vec<String>> {
        let mut keys: Vec<(i64, String)> = self
            .table_info(&table.name)?
            .into_iter()
            .filter(|(_, _, pk, _)| *pk > 0)
            .map(|(name, _, pk, _)| (pk, name))
            .collect();
        keys.sort();
        Ok(keys.into_iter().map(|(_, name)| name).collect())
    }

    async fn list_foreign_keys(&self) -> ProviderResult<Vec<ForeignKeyInfo>> {
        let tables = self.list_tables().await?;
        let mut foreign_keys = Vec::new();

        for table in tables.iter().filter(|t| t.table_type == TableType::BaseTable) {
            let rows: Vec<(i64, String, String, Option<String>)> = {
                let conn = self.lock();
                let mut stmt = conn
                    .prepare(
                        "SELECT id, \"table\", \"from\", \"to\" \
                         FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
                    )
                    .map_err(query_error)?;
                let rows = stmt
                    .query_map([&table.name], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                    })
                    .map_err(query_error)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_error)?
            };

            let mut current: Option<(i64, ForeignKeyInfo)> = None;
            for (id, master, from, to) in rows {
                if current.as_ref().map(|(cur, _)| *cur) != Some(id) {
                    foreign_keys.extend(current.take().map(|(_, fk)| fk));
                    current = Some((
                        id,
                        ForeignKeyInfo {
                            table: table.name.clone(),
                            columns: Vec::new(),
                            master_table: master,
                            master_columns: Vec::new(),
                            schema: None,
                            master_schema: None,
                        },
                    ));
                }
                if let Some((_, fk)) = current.as_mut() {
                    fk.columns.push(from);
                    if let Some(to) = to {
                        fk.master_columns.push(to);
                    }
                }
            }
            foreign_keys.extend(current.map(|(_, fk)| fk));
        }

        // `REFERENCES t` without columns points at t's primary key.
        for fk in foreign_keys.iter_mut().filter(|fk| fk.master_columns.is_empty()) {
            let master = TableInfo::new(fk.master_table.clone(), TableType::BaseTable);
            fk.master_columns = self.list_primary_keys(&master).await?;
        }

        Ok(foreign_keys)
    }
}

#[async_trait]
impl ExecutionSink for SqliteProvider {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>, ExecutionError> {
        trace!(sql = %statement.sql, "sqlite execute");
        let backend = |e: rusqlite::Error| ExecutionError::Backend(e.to_string());

        let conn = self.lock();
        let mut stmt = conn.prepare(&statement.sql).map_err(backend)?;

        for (position, parameter) in statement.parameters.iter().enumerate() {
            let index = stmt
                .parameter_index(&format!("@{}", parameter.name))
                .map_err(backend)?
                .unwrap_or(position + 1);
            stmt.raw_bind_parameter(index, to_sql(&parameter.value))
                .map_err(|e| ExecutionError::Bind {
                    name: parameter.name.clone(),
                    message: e.to_string(),
                })?;
        }

        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.raw_query();
        let mut result = Vec::new();
        while let Some(row) = rows.next().map_err(backend)? {
            let mut columns = Vec::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                let value = from_sql(row.get_ref(i).map_err(backend)?);
                columns.push((name.clone(), value));
            }
            result.push(Row::new(columns));
        }
        Ok(result)
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
