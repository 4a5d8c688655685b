//! Resolved schema model: tables, columns and foreign keys.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::naming::{NamingPolicy, Resolution};
use super::provider::{ColumnInfo, ForeignKeyInfo, TableInfo};
use crate::error::{Error, Result};

/// Whether a table is a base table or a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    #[default]
    BaseTable,
    View,
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableType::BaseTable => write!(f, "table"),
            TableType::View => write!(f, "view"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub is_identity: bool,
    pub nullable: bool,
}

impl From<ColumnInfo> for Column {
    fn from(info: ColumnInfo) -> Self {
        Self {
            name: info.name,
            data_type: info.data_type,
            is_identity: info.is_identity,
            nullable: info.nullable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub schema: Option<String>,
    pub table_type: TableType,
    /// Columns in declaration order.
    pub columns: Vec<Column>,
    /// Primary key column names in key order; may be empty.
    pub primary_key: Vec<String>,
}

impl Table {
    pub fn new(info: TableInfo, columns: Vec<ColumnInfo>, primary_key: Vec<String>) -> Self {
        Self {
            name: info.name,
            schema: info.schema,
            table_type: info.table_type,
            columns: columns.into_iter().map(Column::from).collect(),
            primary_key,
        }
    }

    /// `schema.name`, or just `name` for schema-less backends. Unique per database.
    pub fn key(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }

    /// Column with exactly this name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    pub fn identity_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_identity)
    }
}

/// A foreign key: `columns` of `table` reference `master_columns` of
/// `master_table`. Table fields hold [`Table::key`] values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    pub columns: Vec<String>,
    pub master_table: String,
    pub master_columns: Vec<String>,
}

impl ForeignKey {
    /// Whether this key links `a` and `b`, in either direction.
    pub fn links(&self, a: &str, b: &str) -> bool {
        (self.table == a && self.master_table == b) || (self.table == b && self.master_table == a)
    }

    /// Column pairs `(from column, to column)` when walking from table
    /// `from` to its partner.
    pub fn column_pairs(&self, from: &str) -> Vec<(&str, &str)> {
        let pairs = self.columns.iter().zip(&self.master_columns);
        if self.table == from {
            pairs.map(|(d, m)| (d.as_str(), m.as_str())).collect()
        } else {
            pairs.map(|(d, m)| (m.as_str(), d.as_str())).collect()
        }
    }

    /// The table at the other end of the key from `from`.
    pub fn partner(&self, from: &str) -> &str {
        if self.table == from {
            &self.master_table
        } else {
            &self.table
        }
    }
}

/// An immutable snapshot of a database's schema.
#[derive(Debug, Clone)]
pub struct DatabaseSchema {
    tables: Vec<Table>,
    index: HashMap<String, usize>,
    foreign_keys: Vec<ForeignKey>,
    naming: NamingPolicy,
}

impl DatabaseSchema {
    /// Build a snapshot. Foreign keys whose tables are unknown, or whose
    /// column lists differ in length, are dropped.
    pub fn new(tables: Vec<Table>, foreign_keys: Vec<ForeignKeyInfo>, naming: NamingPolicy) -> Self {
        let index: HashMap<String, usize> = tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.key(), i))
            .collect();

        let key_of = |name: &str, schema: &Option<String>| -> Option<String> {
            let key = match schema {
                Some(s) => format!("{}.{}", s, name),
                None => name.to_string(),
            };
            if index.contains_key(&key) {
                return Some(key);
            }
            // Providers that omit FK schemas: fall back to a unique bare-name match.
            let mut matches = tables.iter().filter(|t| t.name == name);
            match (matches.next(), matches.next()) {
                (Some(t), None) => Some(t.key()),
                _ => None,
            }
        };

        let foreign_keys = foreign_keys
            .into_iter()
            .filter(|fk| fk.columns.len() == fk.master_columns.len() && !fk.columns.is_empty())
            .filter_map(|fk| {
                Some(ForeignKey {
                    table: key_of(&fk.table, &fk.schema)?,
                    master_table: key_of(&fk.master_table, &fk.master_schema)?,
                    columns: fk.columns,
                    master_columns: fk.master_columns,
                })
            })
            .collect();

        Self {
            tables,
            index,
            foreign_keys,
            naming,
        }
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    pub fn naming(&self) -> &NamingPolicy {
        &self.naming
    }

    /// Table by its exact [`Table::key`].
    pub fn table(&self, key: &str) -> Option<&Table> {
        self.index.get(key).map(|&i| &self.tables[i])
    }

    /// Resolve a table name (optionally `schema.table`) using the naming tiers.
    pub fn find_table(&self, name: &str) -> Result<&Table> {
        let (schema, table) = match name.split_once('.') {
            Some((schema, table)) => (Some(schema), table),
            None => (None, name),
        };
        let candidates: Vec<&Table> = self
            .tables
            .iter()
            .filter(|t| match schema {
                Some(s) => t.schema.as_deref().is_some_and(|ts| ts.eq_ignore_ascii_case(s)),
                None => true,
            })
            .collect();
        self.resolve_table(name, table, &candidates)
    }

    /// Resolve `name` among a restricted set of tables.
    pub fn find_table_among<'a>(&self, name: &str, candidates: &[&'a Table]) -> Result<&'a Table> {
        self.resolve_table(name, name, candidates)
    }

    fn resolve_table<'a>(
        &self,
        original: &str,
        term: &str,
        candidates: &[&'a Table],
    ) -> Result<&'a Table> {
        let default_schema = self.naming.default_schema.as_deref();
        let resolution = self.naming.resolve(
            term,
            candidates.iter().map(|t| (t.name.as_str(), *t)),
            |hits| {
                let schema = default_schema?;
                let mut preferred = hits
                    .iter()
                    .filter(|(_, t)| t.schema.as_deref() == Some(schema));
                match (preferred.next(), preferred.next()) {
                    (Some((_, t)), None) => Some(*t),
                    _ => None,
                }
            },
        );

        match resolution {
            Resolution::Found(table) => Ok(table),
            Resolution::NotFound => Err(Error::unresolvable(original, "no table matches")),
            Resolution::Ambiguous(names) => Err(Error::unresolvable(
                original,
                format!("ambiguous, matches {}", names.join(", ")),
            )),
        }
    }

    /// Resolve a column of `table` using the naming tiers.
    pub fn resolve_column<'a>(&self, table: &'a Table, name: &str) -> Result<&'a Column> {
        let resolution = self.naming.resolve(
            name,
            table.columns.iter().map(|c| (c.name.as_str(), c)),
            |_| None,
        );
        match resolution {
            Resolution::Found(column) => Ok(column),
            Resolution::NotFound => Err(Error::unresolvable(
                format!("{}.{}", table.name, name),
                "no column matches",
            )),
            Resolution::Ambiguous(names) => Err(Error::unresolvable(
                format!("{}.{}", table.name, name),
                format!("ambiguous, matches {}", names.join(", ")),
            )),
        }
    }

    /// Resolve `table` then `column`, e.g. for upstream dynamic dispatch.
    pub fn find_column(&self, table: &str, column: &str) -> Result<&Column> {
        let table = self.find_table(table)?;
        self.resolve_column(table, column)
    }

    /// Whether any table lives in the schema `name` (case-insensitive).
    pub fn has_schema(&self, name: &str) -> bool {
        self.tables
            .iter()
            .any(|t| t.schema.as_deref().is_some_and(|s| s.eq_ignore_ascii_case(name)))
    }

    /// Foreign keys linking `a` and `b` in either direction.
    pub fn foreign_keys_between(&self, a: &Table, b: &Table) -> Vec<&ForeignKey> {
        let (a, b) = (a.key(), b.key());
        self.foreign_keys.iter().filter(|fk| fk.links(&a, &b)).collect()
    }

    /// Tables reachable from `table` through one foreign key, either direction.
    pub fn related_tables(&self, table: &Table) -> Vec<&Table> {
        let key = table.key();
        let mut related: Vec<&Table> = Vec::new();
        for fk in &self.foreign_keys {
            if fk.table != key && fk.master_table != key {
                continue;
            }
            if let Some(partner) = self.table(fk.partner(&key)) {
                if !related.iter().any(|t| t.key() == partner.key()) {
                    related.push(partner);
                }
            }
        }
        related
    }
}
