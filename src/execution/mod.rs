//! Query execution.
//!
//! A [`Database`] ties together a [`SchemaCache`], a dialect and an
//! [`ExecutionSink`] that actually runs SQL. It compiles queries against
//! the current schema snapshot and turns the sink's rows into results.

mod row;

pub use row::Row;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

pub use crate::model::TotalCount;

use crate::compiler::{CompiledQuery, Compiler, CompilerOptions, DetailCollection, Statement};
use crate::error::Result;
use crate::model::{Query, Value};
use crate::schema::{DatabaseSchema, SchemaCache};
use crate::sql::Dialect;

/// Master keys per detail query.
const DETAIL_BATCH: usize = 500;

/// Errors reported by an execution sink.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("cannot bind parameter {name}: {message}")]
    Bind { name: String, message: String },

    #[error("unexpected result: {0}")]
    UnexpectedResult(String),
}

/// Runs compiled statements against a database.
#[async_trait]
pub trait ExecutionSink: Send + Sync {
    /// Execute one statement and return its rows.
    async fn execute(&self, statement: &Statement) -> std::result::Result<Vec<Row>, ExecutionError>;
}

/// Rows of a materialised query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    /// Unpaged row count, when the query asked for one.
    pub total_count: Option<u64>,
}

/// Schema cache, dialect and sink for one database.
pub struct Database {
    cache: SchemaCache,
    dialect: Dialect,
    sink: Arc<dyn ExecutionSink>,
    options: CompilerOptions,
}

impl Database {
    pub fn new(cache: SchemaCache, dialect: Dialect, sink: Arc<dyn ExecutionSink>) -> Self {
        Self {
            cache,
            dialect,
            sink,
            options: CompilerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// The current schema snapshot, populating the cache if needed.
    pub async fn schema(&self) -> Result<Arc<DatabaseSchema>> {
        self.cache.get().await
    }

    /// Drop the cached schema; the next call repopulates it.
    pub fn reset(&self) {
        self.cache.reset();
    }

    pub async fn compile(&self, query: &Query) -> Result<CompiledQuery> {
        let schema = self.schema().await?;
        self.compiler(&schema).compile(query)
    }

    /// Run `query` and fill its TotalCount handle, if it has one. Detail
    /// collections named by With are loaded and attached to their rows.
    pub async fn all(&self, query: &Query) -> Result<QueryResult> {
        let schema = self.schema().await?;
        let compiler = self.compiler(&schema);
        let compiled = compiler.compile(query)?;
        let mut rows = self.sink.execute(&compiled.statement).await?;

        for collection in &compiled.collections {
            self.load_collection(&compiler, collection, &mut rows).await?;
        }

        let total_count = match &compiled.total_count {
            Some(count) => {
                let total = self.count_of(count).await?;
                if let Some(handle) = query.total_count() {
                    handle.set(total);
                }
                Some(total)
            }
            None => None,
        };

        debug!(rows = rows.len(), ?total_count, "query materialised");
        Ok(QueryResult { rows, total_count })
    }

    /// First row of `query`, if any.
    pub async fn first(&self, query: &Query) -> Result<Option<Row>> {
        let result = self.all(&query.take(1)).await?;
        Ok(result.rows.into_iter().next())
    }

    /// First value of the first row.
    pub async fn scalar(&self, query: &Query) -> Result<Option<Value>> {
        let row = self.first(query).await?;
        Ok(row.and_then(|r| r.into_values().into_iter().next()))
    }

    pub async fn count(&self, query: &Query) -> Result<u64> {
        let schema = self.schema().await?;
        let statement = self.compiler(&schema).compile_count(query)?;
        self.count_of(&statement).await
    }

    pub async fn exists(&self, query: &Query) -> Result<bool> {
        let schema = self.schema().await?;
        let statement = self.compiler(&schema).compile_exists(query)?;
        let rows = self.sink.execute(&statement).await?;
        Ok(!rows.is_empty())
    }

    fn compiler<'s>(&self, schema: &'s DatabaseSchema) -> Compiler<'s> {
        Compiler::new(schema, self.dialect).with_options(self.options)
    }

    async fn load_collection(
        &self,
        compiler: &Compiler<'_>,
        collection: &DetailCollection,
        rows: &mut [Row],
    ) -> Result<()> {
        let master_columns: Vec<&str> = collection.keys.iter().map(|(alias, _)| alias.as_str()).collect();
        let detail_columns: Vec<&str> = collection.keys.iter().map(|(_, column)| column.as_str()).collect();

        let keys: Vec<Option<Vec<Value>>> = rows.iter().map(|row| key_of(row, &master_columns)).collect();
        let mut masters: Vec<Vec<Value>> = Vec::new();
        for key in keys.iter().flatten() {
            if !masters.contains(key) {
                masters.push(key.clone());
            }
        }

        let mut details = Vec::new();
        for chunk in masters.chunks(DETAIL_BATCH) {
            if let Some(query) = collection.query(chunk) {
                let compiled = compiler.compile(&query)?;
                details.extend(self.sink.execute(&compiled.statement).await?);
            }
        }
        debug!(
            collection = %collection.name,
            masters = masters.len(),
            details = details.len(),
            "collection loaded"
        );

        let detail_keys: Vec<Option<Vec<Value>>> =
            details.iter().map(|row| key_of(row, &detail_columns)).collect();
        for (row, key) in rows.iter_mut().zip(keys) {
            let members = match key {
                Some(key) => details
                    .iter()
                    .zip(&detail_keys)
                    .filter(|(_, detail_key)| detail_key.as_ref() == Some(&key))
                    .map(|(detail, _)| detail.clone())
                    .collect(),
                None => Vec::new(),
            };
            row.retain_columns(|name| !master_columns.contains(&name));
            row.attach(&collection.name, members);
        }
        Ok(())
    }

    async fn count_of(&self, statement: &Statement) -> Result<u64> {
        let rows = self.sink.execute(statement).await?;
        let value = rows
            .first()
            .and_then(|row| row.values().next())
            .and_then(Value::as_i64)
            .ok_or_else(|| ExecutionError::UnexpectedResult("count returned no number".into()))?;
        u64::try_from(value)
            .map_err(|_| ExecutionError::UnexpectedResult(format!("negative count {}", value)).into())
    }
}

/// Values of `columns` in `row`; `None` when one is missing or NULL.
fn key_of(row: &Row, columns: &[&str]) -> Option<Vec<Value>> {
    columns
        .iter()
        .map(|column| row.get(column).filter(|v| !v.is_null()).cloned())
        .collect()
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.dialect)
            .field("cache", &self.cache)
            .field("options", &self.options)
            .finish()
    }
}
