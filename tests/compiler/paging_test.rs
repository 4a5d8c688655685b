//! Tests for Skip/Take across paging strategies, row locks and total counts.

use insta::assert_snapshot;

use dynaquery::compiler::{Compiler, CompilerOptions, OrderFallback};
use dynaquery::model::{Comparable, ObjectReference, Query};
use dynaquery::schema::{ColumnInfo, DatabaseSchema, NamingPolicy, Table, TableInfo, TableType};
use dynaquery::sql::Dialect;
use dynaquery::Error;

fn schema() -> DatabaseSchema {
    let users = Table::new(
        TableInfo::new("Users", TableType::BaseTable),
        vec![
            ColumnInfo::new("Id", "int"),
            ColumnInfo::new("Name", "text"),
            ColumnInfo::new("Age", "int"),
        ],
        vec!["Id".into()],
    );
    let logs = Table::new(
        TableInfo::new("Logs", TableType::View),
        vec![ColumnInfo::new("Message", "text"), ColumnInfo::new("At", "text")],
        vec![],
    );
    DatabaseSchema::new(vec![users, logs], vec![], NamingPolicy::default())
}

fn users() -> ObjectReference {
    ObjectReference::new("Users")
}

fn page() -> Query {
    Query::table("Users")
        .order_by(users().field("Name"))
        .skip(10)
        .take(10)
}

fn compile(query: &Query, dialect: Dialect) -> Result<String, Error> {
    let schema = schema();
    Compiler::new(&schema, dialect)
        .compile(query)
        .map(|c| c.statement.sql)
}

fn strict() -> CompilerOptions {
    CompilerOptions {
        order_fallback: OrderFallback::Fail,
    }
}

#[test]
fn test_offset_fetch_tsql() {
    let sql = compile(&page(), Dialect::TSql).unwrap();
    assert_snapshot!(sql, @"SELECT [Users].[Id],[Users].[Name],[Users].[Age] FROM [Users] ORDER BY [Users].[Name] OFFSET 10 ROWS FETCH NEXT 10 ROWS ONLY");
}

#[test]
fn test_limit_offset_postgres() {
    let sql = compile(&page(), Dialect::Postgres).unwrap();
    assert_snapshot!(sql, @r#"SELECT "Users"."Id","Users"."Name","Users"."Age" FROM "Users" ORDER BY "Users"."Name" LIMIT 10 OFFSET 10"#);
}

#[test]
fn test_row_number_sqlserver2005() {
    let query = page().filter(users().field("Age").greater_than(30));
    let sql = compile(&query, Dialect::SqlServer2005).unwrap();
    assert_snapshot!(sql, @"SELECT [__Data].[Id],[__Data].[Name],[__Data].[Age] FROM (SELECT [Users].[Id],[Users].[Name],[Users].[Age],ROW_NUMBER() OVER (ORDER BY [Users].[Name]) AS [_#_] FROM [Users] WHERE [Users].[Age] > @p1) AS [__Data] WHERE [__Data].[_#_] BETWEEN 11 AND 20 ORDER BY [__Data].[_#_]");
}

#[test]
fn test_row_number_skip_only() {
    let query = page().clear_take();
    let sql = compile(&query, Dialect::SqlServer2005).unwrap();
    assert!(sql.ends_with("WHERE [__Data].[_#_] > 10 ORDER BY [__Data].[_#_]"));
}

#[test]
fn test_unbounded_take_is_clamped() {
    let query = Query::table("Users").take(u64::MAX);
    let sql = compile(&query, Dialect::TSql).unwrap();
    assert_snapshot!(sql, @"SELECT TOP (9223372036854775807) [Users].[Id],[Users].[Name],[Users].[Age] FROM [Users]");

    let query = page().skip(1).take(u64::MAX);
    let sql = compile(&query, Dialect::SqlServer2005).unwrap();
    assert!(sql.contains("BETWEEN 2 AND 9223372036854775807"));
    let sql = compile(&query, Dialect::Postgres).unwrap();
    assert!(sql.ends_with("LIMIT 9223372036854775807 OFFSET 1"));
}

#[test]
fn test_take_only_uses_top_or_limit() {
    let query = Query::table("Users").take(5);
    let schema = schema();
    for dialect in [Dialect::TSql, Dialect::SqlServer2005, Dialect::SqlCe] {
        let sql = Compiler::new(&schema, dialect)
            .with_options(strict())
            .compile(&query)
            .unwrap()
            .statement
            .sql;
        assert!(sql.starts_with("SELECT TOP (5) [Users].[Id]"), "{:?}: {}", dialect, sql);
    }
    for dialect in [Dialect::Postgres, Dialect::MySql, Dialect::DuckDb, Dialect::Sqlite] {
        let sql = compile(&query, dialect).unwrap();
        assert!(sql.ends_with("LIMIT 5"), "{:?}: {}", dialect, sql);
    }
}

#[test]
fn test_zero_skip_is_no_skip() {
    let schema = schema();
    let query = Query::table("Users").skip(0).take(5);
    let sql = Compiler::new(&schema, Dialect::SqlServer2005)
        .with_options(strict())
        .compile(&query)
        .unwrap()
        .statement
        .sql;
    assert!(sql.starts_with("SELECT TOP (5) "));
    assert!(!sql.contains("ROW_NUMBER"));
}

#[test]
fn test_skip_only_limits() {
    let query = page().clear_take();
    assert!(compile(&query, Dialect::Sqlite)
        .unwrap()
        .ends_with("LIMIT -1 OFFSET 10"));
    assert!(compile(&query, Dialect::MySql)
        .unwrap()
        .ends_with("LIMIT 18446744073709551615 OFFSET 10"));
    assert!(compile(&query, Dialect::Postgres)
        .unwrap()
        .ends_with("ORDER BY \"Users\".\"Name\" OFFSET 10"));
    assert!(compile(&query, Dialect::TSql)
        .unwrap()
        .ends_with("OFFSET 10 ROWS"));
}

#[test]
fn test_skip_without_order_uses_primary_key() {
    let query = Query::table("Users").skip(20).take(10);
    let sql = compile(&query, Dialect::SqlServer2005).unwrap();
    assert!(sql.contains("ROW_NUMBER() OVER (ORDER BY [Users].[Id])"));
    assert!(sql.contains("BETWEEN 21 AND 30"));
}

#[test]
fn test_skip_without_order_fails_when_configured() {
    let schema = schema();
    let query = Query::table("Users").skip(20).take(10);
    let err = Compiler::new(&schema, Dialect::TSql)
        .with_options(strict())
        .compile(&query)
        .unwrap_err();
    assert!(err.is_invalid_state());
    assert!(err.to_string().contains("Skip"));
}

#[test]
fn test_skip_without_order_or_key_fails() {
    let query = Query::table("Logs").skip(5);
    for dialect in [Dialect::TSql, Dialect::SqlServer2005, Dialect::Postgres] {
        let err = compile(&query, dialect).unwrap_err();
        assert!(err.is_invalid_state(), "{:?}", dialect);
    }
}

#[test]
fn test_row_number_needs_unique_output_names() {
    let query = page().select(vec![
        users().field("Name"),
        users().field("Name"),
    ]);
    let err = compile(&query, Dialect::SqlServer2005).unwrap_err();
    assert!(err.is_invalid_state());

    let aliased = page().select(vec![
        users().field("Name"),
        users().field("Name").with_alias("Name2"),
    ]);
    let sql = compile(&aliased, Dialect::SqlServer2005).unwrap();
    assert!(sql.starts_with("SELECT [__Data].[Name],[__Data].[Name2] FROM"));
}

#[test]
fn test_row_lock_placement() {
    let query = Query::table("Users")
        .filter(users().field("Id").equals(1))
        .for_update(false);

    let tsql = compile(&query, Dialect::TSql).unwrap();
    assert_snapshot!(tsql, @"SELECT [Users].[Id],[Users].[Name],[Users].[Age] FROM [Users] WITH (UPDLOCK, ROWLOCK) WHERE [Users].[Id] = @p1");

    let mysql = compile(&query.for_update(true), Dialect::MySql).unwrap();
    assert!(mysql.ends_with("WHERE `Users`.`Id` = ? FOR UPDATE SKIP LOCKED"));

    let paged = compile(&page().for_update(true), Dialect::SqlServer2005).unwrap();
    assert!(paged.contains("FROM [Users] WITH (UPDLOCK, ROWLOCK, READPAST)) AS [__Data]"));

    let pg = compile(&page().for_update(false), Dialect::Postgres).unwrap();
    assert!(pg.ends_with("LIMIT 10 OFFSET 10 FOR UPDATE"));
}

#[test]
fn test_row_lock_unsupported() {
    let query = Query::table("Users").for_update(false);
    for dialect in [Dialect::Sqlite, Dialect::SqlCe, Dialect::DuckDb] {
        let err = compile(&query, dialect).unwrap_err();
        assert!(err.is_unsupported(), "{:?}", dialect);
    }
}

#[test]
fn test_total_count_ignores_paging() {
    let schema = schema();
    let (query, handle) = page()
        .filter(users().field("Age").greater_than(30))
        .with_total_count();
    let compiled = Compiler::new(&schema, Dialect::TSql).compile(&query).unwrap();

    let count = compiled.total_count.as_ref().unwrap();
    assert_snapshot!(count.sql, @"SELECT COUNT(*) FROM [Users] WHERE [Users].[Age] > @p1");
    assert_eq!(count.parameters, compiled.statement.parameters);
    assert_eq!(handle.get(), None);

    let batch = compiled.to_batch().unwrap();
    assert!(batch.sql.starts_with(&compiled.statement.sql));
    assert!(batch.sql.ends_with(&format!(";\n{}", count.sql)));
    assert_eq!(batch.parameters.len(), 1);
}

#[test]
fn test_batch_needs_compound_statements() {
    let schema = schema();
    let (query, _) = page().with_total_count();
    let compiled = Compiler::new(&schema, Dialect::SqlCe).compile(&query).unwrap();
    assert!(compiled.to_batch().unwrap_err().is_unsupported());

    // Without a total count there is nothing to batch.
    let plain = Compiler::new(&schema, Dialect::SqlCe).compile(&page()).unwrap();
    assert_eq!(plain.to_batch().unwrap(), plain.statement);
}
