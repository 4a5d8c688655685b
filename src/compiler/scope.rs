//! Table scope of a query being compiled.
//!
//! The scope maps every reference the query makes onto a table instance.
//! Instance 0 is the subject. Explicit joins are registered as the caller
//! wrote them; dotted paths and references to tables not yet in scope add
//! implicit joins that follow foreign keys. Implicit joins are keyed by
//! their path, so `Customers.Orders` used twice joins `Orders` once.

use std::collections::HashMap;

use tracing::trace;

use crate::error::{Error, Result};
use crate::model::{JoinClause, JoinKind, ObjectReference, SimpleExpression};
use crate::schema::{Column, DatabaseSchema, ForeignKey, Table};

/// One occurrence of a table in the FROM clause.
#[derive(Debug)]
pub(crate) struct Instance<'s> {
    pub table: &'s Table,
    pub alias: Option<String>,
    path: String,
}

impl Instance<'_> {
    /// Identifier parts that qualify this instance's columns.
    pub fn qualifier(&self) -> Vec<String> {
        match &self.alias {
            Some(alias) => vec![alias.clone()],
            None => table_parts(self.table),
        }
    }
}

/// `[schema, name]` or `[name]`.
pub(crate) fn table_parts(table: &Table) -> Vec<String> {
    match &table.schema {
        Some(schema) => vec![schema.clone(), table.name.clone()],
        None => vec![table.name.clone()],
    }
}

/// A column bound to a table instance.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ColumnRef<'s> {
    pub instance: usize,
    pub column: &'s Column,
}

#[derive(Debug, Clone)]
pub(crate) enum JoinCondition {
    /// `(left instance, left column, right instance, right column)` pairs.
    Keys(Vec<(usize, String, usize, String)>),
    Expression(SimpleExpression),
}

#[derive(Debug, Clone)]
pub(crate) struct Join {
    pub instance: usize,
    pub kind: JoinKind,
    pub condition: JoinCondition,
}

#[derive(Debug)]
pub(crate) struct Scope<'s> {
    schema: &'s DatabaseSchema,
    instances: Vec<Instance<'s>>,
    joins: Vec<Join>,
    /// Lower-cased names and aliases the caller may qualify columns with.
    qualifiers: HashMap<String, usize>,
    /// Lower-cased dotted paths of implicitly joined instances.
    paths: HashMap<String, usize>,
}

impl<'s> Scope<'s> {
    /// Start a scope for the query subject.
    pub fn new(schema: &'s DatabaseSchema, subject: &ObjectReference) -> Result<Self> {
        let table = schema.find_table(&subject.path())?;
        let mut scope = Self {
            schema,
            instances: Vec::new(),
            joins: Vec::new(),
            qualifiers: HashMap::new(),
            paths: HashMap::new(),
        };
        let idx = scope.add_instance(
            table,
            subject.alias().map(str::to_string),
            table.key().to_lowercase(),
        );
        scope.register_qualifiers(idx, subject);
        Ok(scope)
    }

    pub fn subject(&self) -> &Instance<'s> {
        &self.instances[0]
    }

    pub fn instance(&self, idx: usize) -> &Instance<'s> {
        &self.instances[idx]
    }

    /// Joins in FROM order.
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Register the table of an explicit join. The join itself is recorded
    /// with [`push_join`](Self::push_join) once its condition is bound.
    pub fn add_explicit_join(&mut self, clause: &JoinClause) -> Result<usize> {
        let table = self.schema.find_table(&clause.table.path())?;
        let alias = clause.table.alias().map(str::to_string);
        if alias.is_none() && self.instances.iter().any(|i| i.table.key() == table.key()) {
            return Err(Error::invalid_state(
                "Join",
                format!("{} is already in the query; give the join an alias", table.name),
            ));
        }
        if let Some(alias) = &alias {
            if self.qualifiers.contains_key(&alias.to_lowercase()) {
                return Err(Error::invalid_state(
                    "Join",
                    format!("alias '{}' is used twice", alias),
                ));
            }
        }
        let idx = self.add_instance(table, alias, clause.qualifier().to_lowercase());
        self.register_qualifiers(idx, &clause.table);
        Ok(idx)
    }

    pub fn push_join(&mut self, instance: usize, kind: JoinKind, condition: JoinCondition) {
        self.joins.push(Join {
            instance,
            kind,
            condition,
        });
    }

    /// Infer the condition of an explicit join that has no `on`: exactly one
    /// foreign key must link it with a table already in scope.
    pub fn infer_condition(&self, instance: usize) -> Result<JoinCondition> {
        let table = self.instances[instance].table;
        let mut candidates = Vec::new();
        for (idx, other) in self.instances.iter().enumerate() {
            if idx == instance || !self.is_joined(idx) {
                continue;
            }
            for fk in self.schema.foreign_keys_between(other.table, table) {
                candidates.push((idx, fk));
            }
        }
        match candidates.as_slice() {
            [(from, fk)] => Ok(self.key_condition(*from, instance, fk)),
            [] => Err(Error::unresolvable(
                table.name.as_str(),
                "no foreign key links it to the query; add an On condition",
            )),
            _ => Err(Error::unresolvable(
                table.name.as_str(),
                "several foreign keys link it to the query; add an On condition",
            )),
        }
    }

    /// Bind a column reference. A reference without an owner is a column of
    /// the subject.
    pub fn resolve_column(&mut self, reference: &ObjectReference) -> Result<ColumnRef<'s>> {
        let instance = match reference.owner() {
            Some(owner) => self.resolve_table(owner, JoinKind::Inner)?,
            None => 0,
        };
        let column = self
            .schema
            .resolve_column(self.instances[instance].table, reference.name())?;
        Ok(ColumnRef { instance, column })
    }

    /// Bind a reference naming a table, joining it in with `kind` when it is
    /// not in scope yet.
    pub fn resolve_table(&mut self, reference: &ObjectReference, kind: JoinKind) -> Result<usize> {
        match reference.owner() {
            None => self.resolve_top(reference, reference.name(), kind),
            Some(owner) if self.is_schema_qualifier(owner) => {
                let name = format!("{}.{}", owner.name(), reference.name());
                self.resolve_top(reference, &name, kind)
            }
            Some(owner) => {
                let parent = self.resolve_table(owner, kind)?;
                self.resolve_child(parent, reference, kind)
            }
        }
    }

    /// `dbo` in `dbo.Users`: a top-level owner naming a schema rather than
    /// a table in scope.
    fn is_schema_qualifier(&self, owner: &ObjectReference) -> bool {
        owner.is_top_level()
            && owner.alias().is_none()
            && !self.qualifiers.contains_key(&owner.name().to_lowercase())
            && self.schema.has_schema(owner.name())
    }

    /// The table a With target names when it is a detail of the subject:
    /// one foreign key on it references the subject, so each subject row
    /// has many of it. Anything else is joined like any other table.
    pub fn subject_detail(
        &self,
        reference: &ObjectReference,
    ) -> Option<(&'s Table, &'s ForeignKey)> {
        let subject = self.instances[0].table;
        let found = match reference.owner() {
            None if self.qualifiers.contains_key(&reference.name().to_lowercase()) => return None,
            None => self.schema.find_table(reference.name()),
            Some(owner) if self.is_schema_qualifier(owner) => self
                .schema
                .find_table(&format!("{}.{}", owner.name(), reference.name())),
            Some(owner)
                if owner.is_top_level()
                    && self.qualifiers.get(&owner.name().to_lowercase()) == Some(&0) =>
            {
                let related = self.schema.related_tables(subject);
                self.schema.find_table_among(reference.name(), &related)
            }
            Some(_) => return None,
        };
        let table = found.ok()?;
        if table.key() == subject.key() {
            return None;
        }
        match self.schema.foreign_keys_between(subject, table).as_slice() {
            [fk] if fk.table == table.key() && fk.master_table == subject.key() => Some((table, *fk)),
            _ => None,
        }
    }

    /// Bind a top-level table reference; `name` may be `schema.table`.
    fn resolve_top(&mut self, reference: &ObjectReference, name: &str, kind: JoinKind) -> Result<usize> {
        if let Some(&idx) = self.qualifiers.get(&name.to_lowercase()) {
            return Ok(idx);
        }

        let table = self.schema.find_table(name)?;
        let mut in_scope = self
            .instances
            .iter()
            .enumerate()
            .filter(|(_, i)| i.alias.is_none() && i.table.key() == table.key());
        if let (Some((idx, _)), None) = (in_scope.next(), in_scope.next()) {
            return Ok(idx);
        }

        let path = table.key().to_lowercase();
        if let Some(&idx) = self.paths.get(&path) {
            return Ok(idx);
        }

        let mut candidates = Vec::new();
        for (idx, other) in self.instances.iter().enumerate() {
            if !self.is_joined(idx) {
                continue;
            }
            for fk in self.schema.foreign_keys_between(other.table, table) {
                candidates.push((idx, fk));
            }
        }
        match candidates.as_slice() {
            [(from, fk)] => {
                let (from, fk) = (*from, *fk);
                Ok(self.join_through(from, table, fk, reference.alias(), path, kind))
            }
            [] => Err(Error::unresolvable(
                name,
                "no foreign key links it to the query",
            )),
            _ => Err(Error::unresolvable(
                name,
                "several foreign keys link it to the query; join it explicitly",
            )),
        }
    }

    fn resolve_child(
        &mut self,
        parent: usize,
        reference: &ObjectReference,
        kind: JoinKind,
    ) -> Result<usize> {
        let path = format!(
            "{}.{}",
            self.instances[parent].path,
            reference.alias().unwrap_or(reference.name()).to_lowercase()
        );
        if let Some(&idx) = self.paths.get(&path) {
            return Ok(idx);
        }

        let parent_table = self.instances[parent].table;
        let related = self.schema.related_tables(parent_table);
        let child = self
            .schema
            .find_table_among(reference.name(), &related)
            .map_err(|e| match e {
                Error::UnresolvableReference { reason, .. } => Error::unresolvable(
                    reference.path(),
                    format!("{} among tables related to {}", reason, parent_table.name),
                ),
                other => other,
            })?;

        let fks = self.schema.foreign_keys_between(parent_table, child);
        match fks.as_slice() {
            [fk] => {
                let fk = *fk;
                Ok(self.join_through(parent, child, fk, reference.alias(), path, kind))
            }
            [] => Err(Error::unresolvable(
                reference.path(),
                format!("no foreign key links {} and {}", parent_table.name, child.name),
            )),
            _ => Err(Error::unresolvable(
                reference.path(),
                format!(
                    "several foreign keys link {} and {}; join it explicitly",
                    parent_table.name, child.name
                ),
            )),
        }
    }

    fn join_through(
        &mut self,
        from: usize,
        table: &'s Table,
        fk: &ForeignKey,
        alias: Option<&str>,
        path: String,
        kind: JoinKind,
    ) -> usize {
        let alias = alias.map(str::to_string).or_else(|| {
            let seen = self
                .instances
                .iter()
                .filter(|i| i.table.key() == table.key())
                .count();
            (seen > 0).then(|| format!("{}_{}", table.name, seen + 1))
        });
        let idx = self.add_instance(table, alias, path.clone());
        if let Some(alias) = &self.instances[idx].alias {
            self.qualifiers.entry(alias.to_lowercase()).or_insert(idx);
        }
        self.paths.insert(path.clone(), idx);
        let condition = self.key_condition(from, idx, fk);
        trace!(table = %table.name, path = %path, ?kind, "implicit join");
        self.push_join(idx, kind, condition);
        idx
    }

    fn key_condition(&self, from: usize, to: usize, fk: &ForeignKey) -> JoinCondition {
        let from_key = self.instances[from].table.key();
        // A self-referencing key walks from the detail side.
        let pairs = fk
            .column_pairs(&from_key)
            .into_iter()
            .map(|(l, r)| (from, l.to_string(), to, r.to_string()))
            .collect();
        JoinCondition::Keys(pairs)
    }

    fn add_instance(&mut self, table: &'s Table, alias: Option<String>, path: String) -> usize {
        self.instances.push(Instance { table, alias, path });
        self.instances.len() - 1
    }

    fn register_qualifiers(&mut self, idx: usize, reference: &ObjectReference) {
        match reference.alias() {
            Some(alias) => {
                self.qualifiers.insert(alias.to_lowercase(), idx);
            }
            None => {
                self.qualifiers.entry(reference.name().to_lowercase()).or_insert(idx);
                let table = self.instances[idx].table;
                self.qualifiers.entry(table.name.to_lowercase()).or_insert(idx);
                if table.schema.is_some() {
                    self.qualifiers.entry(table.key().to_lowercase()).or_insert(idx);
                }
            }
        }
    }

    /// The subject and every instance whose join is already recorded.
    fn is_joined(&self, idx: usize) -> bool {
        idx == 0 || self.joins.iter().any(|j| j.instance == idx)
    }
}
