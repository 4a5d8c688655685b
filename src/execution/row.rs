//! Result rows.

use crate::model::Value;

const WITH_PREFIX: &str = "__with__";

/// One result row: column names and values in select-list order, plus
/// any detail collections loaded through With.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
    collections: Vec<(String, Vec<Row>)>,
}

impl Row {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self {
            columns,
            collections: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Value of the first column named `name` (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.columns.iter().map(|(_, value)| value)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.columns.into_iter().map(|(_, value)| value).collect()
    }

    /// Columns eagerly loaded through `With(name)`, with their prefix removed.
    ///
    /// Returns `None` when the related row is absent (every loaded column
    /// is NULL, as a LEFT JOIN without a match yields).
    pub fn related(&self, name: &str) -> Option<Row> {
        let prefix = format!("{}{}__", WITH_PREFIX, name);
        let columns: Vec<(String, Value)> = self
            .columns
            .iter()
            .filter_map(|(column, value)| {
                let stripped = strip_prefix_ignore_case(column, &prefix)?;
                Some((stripped.to_string(), value.clone()))
            })
            .collect();
        if columns.is_empty() || columns.iter().all(|(_, v)| v.is_null()) {
            return None;
        }
        Some(Row::new(columns))
    }

    /// Detail rows loaded through `With(name)` for a one-to-many relation.
    /// Empty when the row has none or nothing was loaded under `name`.
    pub fn collection(&self, name: &str) -> &[Row] {
        self.collections
            .iter()
            .find(|(collection, _)| collection.eq_ignore_ascii_case(name))
            .map(|(_, rows)| rows.as_slice())
            .unwrap_or_default()
    }

    pub(crate) fn attach(&mut self, name: &str, rows: Vec<Row>) {
        self.collections.push((name.to_string(), rows));
    }

    pub(crate) fn retain_columns(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.columns.retain(|(name, _)| keep(name));
    }

    /// The row without any eagerly loaded columns.
    pub fn own(&self) -> Row {
        Row::new(
            self.columns
                .iter()
                .filter(|(column, _)| !column.starts_with(WITH_PREFIX))
                .cloned()
                .collect(),
        )
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}
