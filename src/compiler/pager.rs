//! Paging strategies.
//!
//! The compiler hands a pager a structured [`SelectStatement`] rather than
//! SQL text, so the ROW_NUMBER rewrite can rebuild the statement around a
//! windowed subquery without re-parsing anything.
//!
//! ```text
//! LimitOffset   SELECT ... ORDER BY k LIMIT 10 OFFSET 20
//! OffsetFetch   SELECT ... ORDER BY k OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY
//! RowNumber     SELECT [__Data].[a],... FROM (SELECT ..., ROW_NUMBER() OVER (ORDER BY k) AS [_#_] FROM ...) AS [__Data]
//!               WHERE [__Data].[_#_] BETWEEN 21 AND 30 ORDER BY [__Data].[_#_]
//! ```

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::sql::dialect::helpers::row_count;
use crate::sql::{Dialect, LimitStyle, PagingStyle, SqlDialect, Token, TokenStream};

const ROW_NUMBER_ALIAS: &str = "_#_";
const DATA_ALIAS: &str = "__Data";
const COUNT_ALIAS: &str = "__Count";

/// One item of the select list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectColumn {
    pub expr: TokenStream,
    pub alias: Option<String>,
    /// Name of the column in the result set, when one is known.
    pub output_name: Option<String>,
    pub aggregate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: TokenStream,
    pub descending: bool,
}

/// A SELECT statement before paging is applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectStatement {
    pub columns: Vec<SelectColumn>,
    /// The subject table, with its alias.
    pub table: TokenStream,
    /// Lock hint written right after the subject table.
    pub lock_hint: Option<TokenStream>,
    /// `INNER JOIN ... ON ...` items, each starting with a space.
    pub joins: TokenStream,
    pub filter: Option<TokenStream>,
    pub group_by: Vec<TokenStream>,
    pub having: Option<TokenStream>,
    pub order_by: Vec<OrderItem>,
    /// Lock clause written at the very end.
    pub trailing_lock: Option<TokenStream>,
}

/// Rows to skip and take. A skip of zero is no skip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub skip: Option<u64>,
    pub take: Option<u64>,
}

impl Page {
    pub fn new(skip: Option<u64>, take: Option<u64>) -> Self {
        Self {
            skip: skip.filter(|&n| n > 0),
            take,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.skip.is_none() && self.take.is_none()
    }
}

/// Applies a [`Page`] to a statement.
pub trait QueryPager: Send + Sync {
    fn page(&self, statement: &SelectStatement, page: Page, dialect: Dialect) -> Result<TokenStream>;
}

/// Pick the pager for a dialect's [`PagingStyle`].
pub fn pager_for(dialect: Dialect) -> &'static dyn QueryPager {
    match dialect.paging_style() {
        PagingStyle::LimitOffset => &LimitOffsetPager,
        PagingStyle::OffsetFetch => &OffsetFetchPager,
        PagingStyle::RowNumber => &RowNumberPager,
    }
}

/// `LIMIT n OFFSET m`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LimitOffsetPager;

impl QueryPager for LimitOffsetPager {
    fn page(&self, statement: &SelectStatement, page: Page, dialect: Dialect) -> Result<TokenStream> {
        match page {
            Page { skip: None, take: None } => Ok(render(statement, None, None)),
            Page { skip: None, take: Some(take) } => Ok(first_rows(statement, take, dialect)),
            Page { skip, take } => {
                let tail = dialect.emit_limit_offset(take, skip);
                Ok(render(statement, None, Some(&tail)))
            }
        }
    }
}

/// `OFFSET m ROWS FETCH NEXT n ROWS ONLY`; the statement must be ordered.
#[derive(Debug, Clone, Copy, Default)]
pub struct OffsetFetchPager;

impl QueryPager for OffsetFetchPager {
    fn page(&self, statement: &SelectStatement, page: Page, dialect: Dialect) -> Result<TokenStream> {
        match page {
            Page { skip: None, take: None } => Ok(render(statement, None, None)),
            Page { skip: None, take: Some(take) } => Ok(first_rows(statement, take, dialect)),
            Page { skip, take } => {
                require_order(statement, dialect)?;
                let tail = dialect.emit_limit_offset(take, skip);
                Ok(render(statement, None, Some(&tail)))
            }
        }
    }
}

/// Windowed ROW_NUMBER rewrite for dialects without OFFSET.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowNumberPager;

impl QueryPager for RowNumberPager {
    fn page(&self, statement: &SelectStatement, page: Page, dialect: Dialect) -> Result<TokenStream> {
        let skip = match page {
            Page { skip: None, take: None } => return Ok(render(statement, None, None)),
            Page { skip: None, take: Some(take) } => {
                return Ok(first_rows(statement, take, dialect))
            }
            Page { skip: Some(skip), .. } => skip,
        };
        require_order(statement, dialect)?;
        let names = output_names(statement)?;

        let numbered = |ts: &mut TokenStream| {
            ts.push(Token::QualifiedIdent(vec![
                DATA_ALIAS.into(),
                ROW_NUMBER_ALIAS.into(),
            ]));
        };

        let mut ts = TokenStream::new();
        ts.push(Token::Select).space();
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                ts.comma();
            }
            ts.push(Token::QualifiedIdent(vec![DATA_ALIAS.into(), name.clone()]));
        }

        ts.keyword(Token::From).lparen();
        ts.push(Token::Select).space();
        write_columns(&mut ts, &statement.columns);
        ts.comma()
            .push(Token::Raw("ROW_NUMBER()".into()))
            .space()
            .push(Token::Over)
            .space()
            .lparen()
            .push(Token::OrderBy)
            .space();
        write_order(&mut ts, &statement.order_by);
        ts.rparen()
            .keyword(Token::As)
            .push(Token::Ident(ROW_NUMBER_ALIAS.into()));
        write_body(&mut ts, statement, true);
        ts.rparen()
            .keyword(Token::As)
            .push(Token::Ident(DATA_ALIAS.into()));

        ts.keyword(Token::Where);
        numbered(&mut ts);
        match page.take {
            Some(take) => {
                ts.keyword(Token::Between)
                    .push(row_count(skip.saturating_add(1)))
                    .keyword(Token::And)
                    .push(row_count(skip.saturating_add(take)));
            }
            None => {
                ts.keyword(Token::Gt).push(row_count(skip));
            }
        }
        ts.space().push(Token::OrderBy).space();
        numbered(&mut ts);
        Ok(ts)
    }
}

/// `SELECT COUNT(*)` over the rows of `statement`, ignoring order, paging
/// and locks. Grouped statements are counted through a subquery.
pub fn count_rows(statement: &SelectStatement) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::Select)
        .space()
        .push(Token::FunctionName("COUNT".into()))
        .lparen()
        .push(Token::Star)
        .rparen();

    let grouped = !statement.group_by.is_empty()
        || statement.having.is_some()
        || statement.columns.iter().any(|c| c.aggregate);
    if !grouped {
        write_body(&mut ts, statement, false);
        return ts;
    }

    ts.keyword(Token::From).lparen().push(Token::Select).space();
    if statement.group_by.is_empty() {
        // Aggregates without GROUP BY yield one row, or none when HAVING rejects it.
        ts.push(Token::FunctionName("COUNT".into()))
            .lparen()
            .push(Token::Star)
            .rparen()
            .keyword(Token::As)
            .push(Token::Ident("__g0".into()));
    } else {
        for (i, group) in statement.group_by.iter().enumerate() {
            if i > 0 {
                ts.comma();
            }
            ts.append(group)
                .keyword(Token::As)
                .push(Token::Ident(format!("__g{}", i)));
        }
    }
    write_body(&mut ts, statement, false);
    ts.rparen()
        .keyword(Token::As)
        .push(Token::Ident(COUNT_ALIAS.into()));
    ts
}

/// First `take` rows, via TOP or LIMIT.
fn first_rows(statement: &SelectStatement, take: u64, dialect: Dialect) -> TokenStream {
    match dialect.limit_style() {
        LimitStyle::Top => render(statement, Some(&dialect.emit_top(take)), None),
        LimitStyle::Limit => {
            let tail = dialect.emit_limit_offset(Some(take), None);
            render(statement, None, Some(&tail))
        }
    }
}

fn require_order(statement: &SelectStatement, dialect: Dialect) -> Result<()> {
    if statement.order_by.is_empty() {
        return Err(Error::invalid_state(
            "Skip",
            format!("paging on {} requires an OrderBy", dialect.name()),
        ));
    }
    Ok(())
}

/// Output names of the select list; each must be known and unique.
fn output_names(statement: &SelectStatement) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(statement.columns.len());
    for column in &statement.columns {
        let name = column.output_name.clone().ok_or_else(|| {
            Error::invalid_state("Skip", "paged aggregates need an alias")
        })?;
        if !seen.insert(name.to_lowercase()) {
            return Err(Error::invalid_state(
                "Skip",
                format!("column '{}' is selected twice; alias one of them", name),
            ));
        }
        names.push(name);
    }
    Ok(names)
}

/// The full statement: `SELECT [top] cols FROM ... [ORDER BY ...] [tail] [lock]`.
pub(crate) fn render(
    statement: &SelectStatement,
    top: Option<&TokenStream>,
    tail: Option<&TokenStream>,
) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::Select).space();
    if let Some(top) = top {
        ts.append(top).space();
    }
    write_columns(&mut ts, &statement.columns);
    write_body(&mut ts, statement, true);
    if !statement.order_by.is_empty() {
        ts.space().push(Token::OrderBy).space();
        write_order(&mut ts, &statement.order_by);
    }
    if let Some(tail) = tail.filter(|t| !t.is_empty()) {
        ts.space().append(tail);
    }
    if let Some(lock) = &statement.trailing_lock {
        ts.space().append(lock);
    }
    ts
}

fn write_columns(ts: &mut TokenStream, columns: &[SelectColumn]) {
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            ts.comma();
        }
        ts.append(&column.expr);
        if let Some(alias) = &column.alias {
            ts.keyword(Token::As).push(Token::Ident(alias.clone()));
        }
    }
}

/// `FROM` through `HAVING`.
fn write_body(ts: &mut TokenStream, statement: &SelectStatement, with_lock: bool) {
    ts.keyword(Token::From).append(&statement.table);
    if with_lock {
        if let Some(hint) = &statement.lock_hint {
            ts.space().append(hint);
        }
    }
    ts.append(&statement.joins);
    if let Some(filter) = &statement.filter {
        ts.keyword(Token::Where).append(filter);
    }
    if !statement.group_by.is_empty() {
        ts.keyword(Token::GroupBy);
        for (i, group) in statement.group_by.iter().enumerate() {
            if i > 0 {
                ts.comma();
            }
            ts.append(group);
        }
    }
    if let Some(having) = &statement.having {
        ts.keyword(Token::Having).append(having);
    }
}

fn write_order(ts: &mut TokenStream, items: &[OrderItem]) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            ts.comma();
        }
        ts.append(&item.expr);
        if item.descending {
            ts.space().push(Token::Desc);
        }
    }
}
