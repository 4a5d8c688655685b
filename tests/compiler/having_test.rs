//! Tests for aggregates, GROUP BY and HAVING.

use insta::assert_snapshot;

use dynaquery::compiler::Compiler;
use dynaquery::model::{Comparable, ObjectReference, Projection, Query};
use dynaquery::schema::{ColumnInfo, DatabaseSchema, NamingPolicy, Table, TableInfo, TableType};
use dynaquery::sql::Dialect;
use dynaquery::Error;

fn schema() -> DatabaseSchema {
    let orders = Table::new(
        TableInfo::new("Orders", TableType::BaseTable),
        vec![
            ColumnInfo::new("OrderId", "int"),
            ColumnInfo::new("CustomerId", "int"),
            ColumnInfo::new("Total", "real"),
        ],
        vec!["OrderId".into()],
    );
    DatabaseSchema::new(vec![orders], vec![], NamingPolicy::default())
}

fn orders() -> ObjectReference {
    ObjectReference::new("Orders")
}

fn compile(query: &Query, dialect: Dialect) -> Result<String, Error> {
    let schema = schema();
    Compiler::new(&schema, dialect)
        .compile(query)
        .map(|c| c.statement.sql)
}

fn totals_by_customer() -> Query {
    Query::table("Orders").select(vec![
        Projection::from(orders().field("CustomerId")),
        Projection::from(orders().field("Total").sum().with_alias("Sum")),
    ])
}

#[test]
fn test_aggregate_select_groups_other_columns() {
    let sql = compile(&totals_by_customer(), Dialect::TSql).unwrap();
    assert_snapshot!(sql, @"SELECT [Orders].[CustomerId],SUM([Orders].[Total]) AS [Sum] FROM [Orders] GROUP BY [Orders].[CustomerId]");
}

#[test]
fn test_having_follows_where() {
    let query = totals_by_customer()
        .filter(orders().field("Total").greater_than(5))
        .having(orders().field("Total").sum().greater_than(100));
    let sql = compile(&query, Dialect::Postgres).unwrap();
    assert_snapshot!(sql, @r#"SELECT "Orders"."CustomerId",SUM("Orders"."Total") AS "Sum" FROM "Orders" WHERE "Orders"."Total" > $1 GROUP BY "Orders"."CustomerId" HAVING SUM("Orders"."Total") > $2"#);
}

#[test]
fn test_having_alone_groups_default_columns() {
    let query = Query::table("Orders").having(orders().field("OrderId").count().greater_than(1));
    let sql = compile(&query, Dialect::TSql).unwrap();
    assert!(sql.contains(
        "GROUP BY [Orders].[OrderId],[Orders].[CustomerId],[Orders].[Total] HAVING COUNT([Orders].[OrderId]) > @p1"
    ));
}

#[test]
fn test_aggregate_only_select_has_no_group_by() {
    let query = Query::table("Orders").select([orders().field("Total").max().with_alias("Largest")]);
    let sql = compile(&query, Dialect::TSql).unwrap();
    assert_snapshot!(sql, @"SELECT MAX([Orders].[Total]) AS [Largest] FROM [Orders]");
}

#[test]
fn test_aggregates_in_where_are_rejected() {
    let query = Query::table("Orders").filter(orders().field("Total").sum().greater_than(100));
    let err = compile(&query, Dialect::TSql).unwrap_err();
    assert!(err.is_invalid_state());
    assert!(err.to_string().contains("Having"));
}

#[test]
fn test_grouped_rows_cannot_be_locked() {
    let query = totals_by_customer().for_update(false);
    let err = compile(&query, Dialect::TSql).unwrap_err();
    assert!(err.is_invalid_state());
    assert!(err.to_string().contains("ForUpdate"));
}

#[test]
fn test_grouped_total_count_uses_subquery() {
    let schema = schema();
    let (query, _) = totals_by_customer()
        .having(orders().field("Total").sum().greater_than(100))
        .with_total_count();
    let compiled = Compiler::new(&schema, Dialect::TSql).compile(&query).unwrap();
    let count = compiled.total_count.unwrap();
    assert_snapshot!(count.sql, @"SELECT COUNT(*) FROM (SELECT [Orders].[CustomerId] AS [__g0] FROM [Orders] GROUP BY [Orders].[CustomerId] HAVING SUM([Orders].[Total]) > @p1) AS [__Count]");

    let ungrouped = Query::table("Orders").select([orders().field("Total").sum().with_alias("Sum")]);
    let count = Compiler::new(&schema, Dialect::TSql)
        .compile_count(&ungrouped)
        .unwrap();
    assert_eq!(
        count.sql,
        "SELECT COUNT(*) FROM (SELECT COUNT(*) AS [__g0] FROM [Orders]) AS [__Count]"
    );
}

#[test]
fn test_paged_aggregate_needs_alias_for_row_number() {
    let query = Query::table("Orders")
        .select(vec![
            Projection::from(orders().field("CustomerId")),
            Projection::from(orders().field("Total").sum()),
        ])
        .order_by(orders().field("CustomerId"))
        .skip(5)
        .take(5);
    let err = compile(&query, Dialect::SqlServer2005).unwrap_err();
    assert!(err.is_invalid_state());

    // OFFSET paging does not need output names.
    assert!(compile(&query, Dialect::TSql).is_ok());
}
