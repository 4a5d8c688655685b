//! Query compilation.
//!
//! ```text
//! Query ──▶ Scope (bind names, discover joins) ──▶ SelectStatement ──▶ QueryPager ──▶ Statement
//!                                                         └──▶ count_rows ──▶ total-count Statement
//! ```
//!
//! Compilation runs in two passes over the query. The first binds every
//! reference (explicit joins, select list, WHERE, HAVING, ORDER BY, With)
//! so that all implicit joins are known. The second emits tokens; because
//! the FROM clause is emitted before WHERE and HAVING, parameters are
//! numbered in the order they appear in the SQL text.
//!
//! Compiling is pure: the same query against the same schema snapshot and
//! dialect always produces the same SQL and parameters.

mod expr;
pub mod pager;
mod scope;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::model::{Comparable, JoinKind, ObjectReference, OrderDirection, Projection, Query, Value};
use crate::schema::{DatabaseSchema, Table};
use crate::sql::{Dialect, PlaceholderStyle, RowLockStyle, SqlDialect, Token, TokenStream};

use expr::{ExprWriter, Params};
use scope::{table_parts, JoinCondition, Scope};

pub use pager::{
    count_rows, pager_for, LimitOffsetPager, OffsetFetchPager, OrderItem, Page, QueryPager,
    RowNumberPager, SelectColumn, SelectStatement,
};

/// What to order by when a paged query has no OrderBy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderFallback {
    /// The subject's primary key, ascending.
    #[default]
    PrimaryKey,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompilerOptions {
    #[serde(default)]
    pub order_fallback: OrderFallback,
}

/// A named parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
}

/// SQL text and its parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub sql: String,
    pub parameters: Vec<Parameter>,
}

impl Statement {
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

/// Output of [`Compiler::compile`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub dialect: Dialect,
    pub statement: Statement,
    /// `SELECT COUNT(*)` over the unpaged rows, when the query asked for a
    /// total count.
    pub total_count: Option<Statement>,
    /// One-to-many With targets, loaded by a second query per collection.
    pub collections: Vec<DetailCollection>,
}

/// Detail rows to load for each master row of a query.
///
/// The master statement selects the subject's key columns under the
/// aliases in `keys`; the detail rows of a master are those whose detail
/// columns hold the same values.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailCollection {
    /// The With target's name or alias.
    pub name: String,
    /// Detail table, as `schema.table` or `table`.
    pub table: String,
    /// `(master key alias, detail column)` pairs.
    pub keys: Vec<(String, String)>,
}

impl DetailCollection {
    /// The detail rows of the given master keys, each key holding one
    /// value per entry of `keys`. `None` when `masters` is empty.
    pub fn query(&self, masters: &[Vec<Value>]) -> Option<Query> {
        let table = ObjectReference::from_path(&self.table);
        let criteria = match self.keys.as_slice() {
            [(_, column)] if !masters.is_empty() => {
                table.field(column.as_str()).is_in(masters.iter().filter_map(|m| m.first().cloned()))
            }
            _ => masters
                .iter()
                .filter_map(|master| {
                    self.keys
                        .iter()
                        .zip(master)
                        .map(|((_, column), value)| table.field(column.as_str()).equals(value.clone()))
                        .reduce(|a, b| a & b)
                })
                .reduce(|a, b| a | b)?,
        };
        Some(Query::new(table).filter(criteria))
    }
}

impl CompiledQuery {
    /// Join the main and total-count statements into one `;`-separated batch.
    pub fn to_batch(&self) -> Result<Statement> {
        let Some(count) = &self.total_count else {
            return Ok(self.statement.clone());
        };
        if !self.dialect.supports_compound_statements() {
            return Err(Error::unsupported(self.dialect.name(), "compound statements"));
        }
        let mut parameters = self.statement.parameters.clone();
        if self.dialect.placeholder_style() == PlaceholderStyle::Anonymous {
            parameters.extend(count.parameters.iter().cloned());
        }
        Ok(Statement {
            sql: format!("{};\n{}", self.statement.sql, count.sql),
            parameters,
        })
    }
}

/// Compiles queries against one schema snapshot for one dialect.
#[derive(Debug, Clone)]
pub struct Compiler<'s> {
    schema: &'s DatabaseSchema,
    dialect: Dialect,
    options: CompilerOptions,
}

struct Prepared {
    statement: SelectStatement,
    params: Params,
    subject: String,
    fallback_order: Vec<OrderItem>,
    collections: Vec<DetailCollection>,
}

impl<'s> Compiler<'s> {
    pub fn new(schema: &'s DatabaseSchema, dialect: Dialect) -> Self {
        Self {
            schema,
            dialect,
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

    /// Compile `query` to one SELECT statement, plus a total-count statement
    /// when the query carries WithTotalCount.
    pub fn compile(&self, query: &Query) -> Result<CompiledQuery> {
        let page = Page::new(query.skip_count(), query.take_count());
        let mut prepared = self.prepare(query, query.lock())?;

        if page.skip.is_some() && prepared.statement.order_by.is_empty() {
            match self.options.order_fallback {
                OrderFallback::PrimaryKey if !prepared.fallback_order.is_empty() => {
                    warn!(
                        table = %prepared.subject,
                        "paged query has no OrderBy, ordering by primary key"
                    );
                    prepared.statement.order_by = prepared.fallback_order.clone();
                }
                OrderFallback::PrimaryKey => {
                    return Err(Error::invalid_state(
                        "Skip",
                        format!(
                            "{} has no primary key to page by; add an OrderBy",
                            prepared.subject
                        ),
                    ))
                }
                OrderFallback::Fail => {
                    return Err(Error::invalid_state("Skip", "paging requires an OrderBy"))
                }
            }
        }

        let tokens = pager_for(self.dialect).page(&prepared.statement, page, self.dialect)?;
        let statement = self.finish(&tokens, &prepared.params);
        let total_count = match query.total_count() {
            Some(_) => Some(self.compile_count(query)?),
            None => None,
        };

        trace!(
            dialect = %self.dialect,
            sql = %statement.sql,
            parameters = statement.parameters.len(),
            "compiled query"
        );
        Ok(CompiledQuery {
            dialect: self.dialect,
            statement,
            total_count,
            collections: prepared.collections,
        })
    }

    /// `SELECT COUNT(*)` over the rows `query` matches, ignoring order,
    /// paging, With and locks.
    pub fn compile_count(&self, query: &Query) -> Result<Statement> {
        let prepared = self.prepare(&query.clear_with(), None)?;
        let statement = self.finish(&count_rows(&prepared.statement), &prepared.params);
        trace!(dialect = %self.dialect, sql = %statement.sql, "compiled count");
        Ok(statement)
    }

    /// `SELECT 1 ...` limited to one row.
    pub fn compile_exists(&self, query: &Query) -> Result<Statement> {
        let mut prepared = self.prepare(&query.clear_with(), None)?;
        let mut one = TokenStream::new();
        one.push(Token::LitInt(1));
        prepared.statement.columns = vec![SelectColumn {
            expr: one,
            ..Default::default()
        }];
        prepared.statement.order_by.clear();

        let tokens = pager_for(self.dialect).page(
            &prepared.statement,
            Page::new(None, Some(1)),
            self.dialect,
        )?;
        let statement = self.finish(&tokens, &prepared.params);
        trace!(dialect = %self.dialect, sql = %statement.sql, "compiled exists");
        Ok(statement)
    }

    fn finish(&self, tokens: &TokenStream, params: &Params) -> Statement {
        Statement {
            sql: tokens.serialize(self.dialect),
            parameters: params.items().to_vec(),
        }
    }

    /// Bind and emit everything except paging.
    fn prepare(&self, query: &Query, lock: Option<bool>) -> Result<Prepared> {
        let mut scope = Scope::new(self.schema, query.subject())?;

        // Pass 1: bind names so every implicit join is known.
        for join in query.joins() {
            let idx = scope.add_explicit_join(join)?;
            let condition = match &join.on {
                Some(on) => {
                    on.validate()?;
                    expr::bind(&mut scope, on)?;
                    JoinCondition::Expression(on.clone())
                }
                None => scope.infer_condition(idx)?,
            };
            scope.push_join(idx, join.kind, condition);
        }

        for projection in query.selection().unwrap_or_default() {
            match projection {
                Projection::Column(r) => scope.resolve_column(r)?,
                Projection::Aggregate(f) => scope.resolve_column(&f.argument)?,
            };
        }

        let criteria = query.criteria();
        if let Some(criteria) = &criteria {
            criteria.validate()?;
            if criteria.contains_aggregate() {
                return Err(Error::invalid_state(
                    "Where",
                    "aggregate functions belong in Having",
                ));
            }
            expr::bind(&mut scope, criteria)?;
        }

        let having = query.having_criteria();
        if let Some(having) = &having {
            having.validate()?;
            expr::bind(&mut scope, having)?;
        }

        for key in query.order_keys() {
            scope.resolve_column(&key.reference)?;
        }

        let mut eager = Vec::new();
        let mut details = Vec::new();
        for target in query.with_targets() {
            let name = target.alias().unwrap_or(target.name()).to_string();
            match scope.subject_detail(target) {
                Some((table, fk)) => {
                    let pairs: Vec<(String, String)> = fk
                        .column_pairs(&scope.subject().table.key())
                        .into_iter()
                        .map(|(master, detail)| (master.to_string(), detail.to_string()))
                        .collect();
                    details.push((name, table.key(), pairs));
                }
                None => {
                    let idx = scope.resolve_table(target, JoinKind::Left)?;
                    eager.push((name, idx));
                }
            }
        }

        // Pass 2: emit.
        let mut params = Params::default();
        let mut statement = SelectStatement::default();

        match query.selection() {
            Some(selection) => {
                for projection in selection {
                    statement.columns.push(match projection {
                        Projection::Column(r) => {
                            let (token, name) = expr::column_named(&mut scope, r)?;
                            SelectColumn {
                                expr: single(token),
                                alias: r.alias().map(str::to_string),
                                output_name: Some(r.alias().map(str::to_string).unwrap_or(name)),
                                aggregate: false,
                            }
                        }
                        Projection::Aggregate(f) => SelectColumn {
                            expr: expr::function(&mut scope, f)?,
                            alias: f.alias.clone(),
                            output_name: f.alias.clone(),
                            aggregate: true,
                        },
                    });
                }
            }
            None => {
                let subject = scope.subject();
                let qualifier = subject.qualifier();
                for column in &subject.table.columns {
                    statement.columns.push(plain_column(&qualifier, &column.name, None));
                }
            }
        }

        for (name, idx) in &eager {
            let instance = scope.instance(*idx);
            let qualifier = instance.qualifier();
            for column in &instance.table.columns {
                let alias = format!("__with__{}__{}", name, column.name);
                statement
                    .columns
                    .push(plain_column(&qualifier, &column.name, Some(alias)));
            }
        }

        let mut collections = Vec::new();
        let qualifier = scope.subject().qualifier();
        for (name, table, pairs) in details {
            let mut keys = Vec::new();
            for (master, detail) in pairs {
                let alias = format!("__key__{}__{}", name, master);
                statement
                    .columns
                    .push(plain_column(&qualifier, &master, Some(alias.clone())));
                keys.push((alias, detail));
            }
            collections.push(DetailCollection { name, table, keys });
        }

        let grouped = having.is_some() || statement.columns.iter().any(|c| c.aggregate);
        if grouped && !collections.is_empty() {
            return Err(Error::invalid_state(
                "With",
                "detail collections cannot be loaded for grouped rows",
            ));
        }
        if grouped {
            statement.group_by = statement
                .columns
                .iter()
                .filter(|c| !c.aggregate)
                .map(|c| c.expr.clone())
                .collect();
        }

        let subject = scope.subject();
        statement.table = self.table_tokens(subject.table, subject.alias.as_deref());

        if let Some(skip_locked) = lock {
            if grouped {
                return Err(Error::invalid_state(
                    "ForUpdate",
                    "grouped or aggregated rows cannot be locked",
                ));
            }
            match self.dialect.row_lock_style() {
                RowLockStyle::Unsupported => {
                    return Err(Error::unsupported(self.dialect.name(), "row locking"))
                }
                _ if skip_locked && !self.dialect.supports_skip_locked() => {
                    return Err(Error::unsupported(self.dialect.name(), "SKIP LOCKED"))
                }
                RowLockStyle::TableHint => {
                    statement.lock_hint = Some(self.dialect.emit_row_lock(skip_locked))
                }
                RowLockStyle::ForUpdate => {
                    statement.trailing_lock = Some(self.dialect.emit_row_lock(skip_locked))
                }
            }
        }

        let joins: Vec<_> = scope.joins().to_vec();
        for join in &joins {
            let instance = scope.instance(join.instance);
            let table = self.table_tokens(instance.table, instance.alias.as_deref());
            let ts = &mut statement.joins;
            ts.space();
            if join.kind == JoinKind::Left {
                ts.push(Token::Left).space();
            } else {
                ts.push(Token::Inner).space();
            }
            ts.push(Token::Join).space().append(&table).keyword(Token::On);

            match &join.condition {
                JoinCondition::Keys(pairs) => {
                    ts.lparen();
                    for (i, (left, left_col, right, right_col)) in pairs.iter().enumerate() {
                        if i > 0 {
                            ts.keyword(Token::And);
                        }
                        ts.push(qualified(&scope, *left, left_col))
                            .keyword(Token::Eq)
                            .push(qualified(&scope, *right, right_col));
                    }
                    ts.rparen();
                }
                JoinCondition::Expression(on) => {
                    let mut writer = ExprWriter::new(&mut scope, &mut params, "Join");
                    expr::write_condition(&mut writer, on, ts)?;
                }
            }
        }

        if let Some(criteria) = &criteria {
            let mut ts = TokenStream::new();
            ExprWriter::new(&mut scope, &mut params, "Where").write(criteria, &mut ts)?;
            statement.filter = Some(ts);
        }

        if let Some(having) = &having {
            let mut ts = TokenStream::new();
            ExprWriter::new(&mut scope, &mut params, "Having").write(having, &mut ts)?;
            statement.having = Some(ts);
        }

        for key in query.order_keys() {
            statement.order_by.push(OrderItem {
                expr: single(expr::column(&mut scope, &key.reference)?),
                descending: key.direction == OrderDirection::Descending,
            });
        }

        let subject = scope.subject();
        let qualifier = subject.qualifier();
        let fallback_order = subject
            .table
            .primary_key
            .iter()
            .map(|column| OrderItem {
                expr: single(Token::QualifiedIdent(
                    qualifier.iter().cloned().chain([column.clone()]).collect(),
                )),
                descending: false,
            })
            .collect();

        Ok(Prepared {
            statement,
            params,
            subject: subject.table.name.clone(),
            fallback_order,
            collections,
        })
    }

    fn table_tokens(&self, table: &Table, alias: Option<&str>) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::QualifiedIdent(table_parts(table)));
        if let Some(alias) = alias {
            ts.keyword(Token::As).push(Token::Ident(alias.to_string()));
        }
        ts
    }
}

fn single(token: Token) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(token);
    ts
}

fn plain_column(qualifier: &[String], name: &str, alias: Option<String>) -> SelectColumn {
    let mut parts = qualifier.to_vec();
    parts.push(name.to_string());
    SelectColumn {
        expr: single(Token::QualifiedIdent(parts)),
        output_name: Some(alias.clone().unwrap_or_else(|| name.to_string())),
        alias,
        aggregate: false,
    }
}

fn qualified(scope: &Scope<'_>, instance: usize, column: &str) -> Token {
    let mut parts = scope.instance(instance).qualifier();
    parts.push(column.to_string());
    Token::QualifiedIdent(parts)
}
