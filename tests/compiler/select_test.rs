//! Tests for SELECT compilation: projections, WHERE, ORDER BY and parameters.

use insta::assert_snapshot;
use sqlparser::dialect::{MsSqlDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

use dynaquery::compiler::Compiler;
use dynaquery::model::{Comparable, ObjectReference, Query, Value};
use dynaquery::schema::{
    ColumnInfo, DatabaseSchema, ForeignKeyInfo, NamingPolicy, Table, TableInfo, TableType,
};
use dynaquery::sql::Dialect;

fn schema() -> DatabaseSchema {
    let table = |name: &str, cols: &[&str]| {
        Table::new(
            TableInfo::new(name, TableType::BaseTable),
            cols.iter().map(|c| ColumnInfo::new(*c, "int")).collect(),
            vec![cols[0].to_string()],
        )
    };
    DatabaseSchema::new(
        vec![
            table("Customers", &["CustomerId", "Name", "City"]),
            table("Orders", &["OrderId", "CustomerId", "Total"]),
        ],
        vec![ForeignKeyInfo {
            table: "Orders".into(),
            columns: vec!["CustomerId".into()],
            master_table: "Customers".into(),
            master_columns: vec!["CustomerId".into()],
            schema: None,
            master_schema: None,
        }],
        NamingPolicy::default(),
    )
}

fn customers() -> ObjectReference {
    ObjectReference::new("Customers")
}

fn sql(query: &Query, dialect: Dialect) -> String {
    let schema = schema();
    Compiler::new(&schema, dialect)
        .compile(query)
        .unwrap()
        .statement
        .sql
}

/// Parse `sql` with sqlparser after replacing placeholders by literals.
fn validate(sql: &str, dialect: Dialect) {
    let mut text = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        let word = |ch: &char| ch.is_alphanumeric() || *ch == '_';
        match c {
            '@' | '$' if chars.peek().is_some_and(word) => {
                while chars.next_if(word).is_some() {}
                text.push('0');
            }
            '?' => text.push('0'),
            _ => text.push(c),
        }
    }

    let result = match dialect {
        Dialect::Postgres | Dialect::DuckDb => Parser::parse_sql(&PostgreSqlDialect {}, &text),
        Dialect::MySql => Parser::parse_sql(&MySqlDialect {}, &text),
        Dialect::Sqlite => Parser::parse_sql(&SQLiteDialect {}, &text),
        Dialect::TSql | Dialect::SqlServer2005 | Dialect::SqlCe => {
            Parser::parse_sql(&MsSqlDialect {}, &text)
        }
    };
    if let Err(e) = result {
        panic!("invalid SQL for {:?}: {}\n{}", dialect, e, text);
    }
}

#[test]
fn test_default_projection_tsql() {
    let sql = sql(&Query::table("Customers"), Dialect::TSql);
    assert_snapshot!(sql, @"SELECT [Customers].[CustomerId],[Customers].[Name],[Customers].[City] FROM [Customers]");
    validate(&sql, Dialect::TSql);
}

#[test]
fn test_subject_name_is_resolved_fuzzily() {
    let a = sql(&Query::table("customer"), Dialect::TSql);
    let b = sql(&Query::table("CUSTOMERS"), Dialect::TSql);
    assert_eq!(a, b);
}

#[test]
fn test_where_and_order_postgres() {
    let c = ObjectReference::new("customers");
    let query = Query::table("customers")
        .filter(c.field("city").equals("Oslo"))
        .order_by(c.field("name"));
    let sql = sql(&query, Dialect::Postgres);
    assert_snapshot!(sql, @r#"SELECT "Customers"."CustomerId","Customers"."Name","Customers"."City" FROM "Customers" WHERE "Customers"."City" = $1 ORDER BY "Customers"."Name""#);
    validate(&sql, Dialect::Postgres);
}

#[test]
fn test_bare_column_belongs_to_subject() {
    let query = Query::table("Customers").filter(ObjectReference::new("city").equals("Oslo"));
    assert!(sql(&query, Dialect::TSql).ends_with("WHERE [Customers].[City] = @p1"));
}

#[test]
fn test_explicit_projection_with_alias() {
    let query = Query::table("Customers").select([
        customers().field("Name").with_alias("CustomerName"),
        customers().field("City"),
    ]);
    let sql = sql(&query, Dialect::TSql);
    assert_snapshot!(sql, @"SELECT [Customers].[Name] AS [CustomerName],[Customers].[City] FROM [Customers]");
    validate(&sql, Dialect::TSql);
}

#[test]
fn test_in_list_parameters() {
    let schema = schema();
    let query =
        Query::table("Customers").filter(customers().field("Name").equals(vec!["Bob", "Alice"]));
    let compiled = Compiler::new(&schema, Dialect::TSql).compile(&query).unwrap();

    assert!(compiled
        .statement
        .sql
        .ends_with("WHERE [Customers].[Name] IN (@p1_0,@p1_1)"));
    assert_eq!(compiled.statement.parameter("p1_0"), Some(&Value::from("Bob")));
    assert_eq!(compiled.statement.parameter("p1_1"), Some(&Value::from("Alice")));
    validate(&compiled.statement.sql, Dialect::TSql);
}

#[test]
fn test_single_element_list_is_still_in() {
    let query = Query::table("Customers").filter(customers().field("Name").equals(vec!["Bob"]));
    assert!(sql(&query, Dialect::TSql).ends_with("[Customers].[Name] IN (@p1_0)"));

    let query =
        Query::table("Customers").filter(customers().field("Name").not_equals(vec!["Bob"]));
    assert!(sql(&query, Dialect::TSql).ends_with("[Customers].[Name] NOT IN (@p1_0)"));
}

#[test]
fn test_between_and_like() {
    let query = Query::table("Customers")
        .filter(customers().field("CustomerId").equals(10..=20))
        .filter(customers().field("Name").like("A%"));
    let sql = sql(&query, Dialect::TSql);
    assert!(sql.ends_with(
        "WHERE ([Customers].[CustomerId] BETWEEN @p1_start AND @p1_end AND [Customers].[Name] LIKE @p2)"
    ));
    validate(&sql, Dialect::TSql);
}

#[test]
fn test_null_and_negation() {
    let query = Query::table("Customers")
        .filter(customers().field("City").equals(Value::Null))
        .filter(!customers().field("Name").equals("Bob"));
    let sql = sql(&query, Dialect::Sqlite);
    assert_snapshot!(sql, @r#"SELECT "Customers"."CustomerId","Customers"."Name","Customers"."City" FROM "Customers" WHERE ("Customers"."City" IS NULL AND NOT ("Customers"."Name" = @p1))"#);
    validate(&sql, Dialect::Sqlite);
}

#[test]
fn test_mysql_anonymous_placeholders() {
    let query = Query::table("Customers")
        .filter(customers().field("City").equals("Oslo") | customers().field("City").equals("Bergen"));
    let sql = sql(&query, Dialect::MySql);
    assert_snapshot!(sql, @"SELECT `Customers`.`CustomerId`,`Customers`.`Name`,`Customers`.`City` FROM `Customers` WHERE (`Customers`.`City` = ? OR `Customers`.`City` = ?)");
    validate(&sql, Dialect::MySql);
}

#[test]
fn test_order_keys_keep_their_order() {
    let query = Query::table("Customers")
        .order_by(customers().field("City"))
        .order_by_descending(customers().field("Name"));
    assert!(sql(&query, Dialect::TSql)
        .ends_with("ORDER BY [Customers].[City],[Customers].[Name] DESC"));

    let chained = Query::table("Customers")
        .order_by(customers().field("City"))
        .then_by_descending(customers().field("Name"))
        .unwrap();
    assert_eq!(sql(&query, Dialect::TSql), sql(&chained, Dialect::TSql));
}

#[test]
fn test_compiling_twice_is_identical() {
    let schema = schema();
    let query = Query::table("Customers")
        .filter(customers().field("Orders").field("Total").greater_than(100))
        .filter(customers().field("Name").is_in(["A", "B"]))
        .order_by(customers().field("Name"));

    for dialect in Dialect::ALL {
        let compiler = Compiler::new(&schema, dialect);
        let first = compiler.compile(&query).unwrap();
        let second = compiler.compile(&query).unwrap();
        assert_eq!(first, second, "{:?}", dialect);
    }
}

#[test]
fn test_unknown_column_is_unresolvable() {
    let schema = schema();
    let query = Query::table("Customers").filter(customers().field("Email").equals("x"));
    let err = Compiler::new(&schema, Dialect::TSql).compile(&query).unwrap_err();
    assert!(err.is_unresolvable());
    assert!(err.to_string().contains("Email"));
}

#[test]
fn test_empty_in_list_is_invalid() {
    let schema = schema();
    let query = Query::table("Customers")
        .filter(customers().field("Name").is_in(Vec::<String>::new()));
    let err = Compiler::new(&schema, Dialect::TSql).compile(&query).unwrap_err();
    assert!(err.is_invalid_state());
}

#[test]
fn test_exists_and_count() {
    let schema = schema();
    let query = Query::table("Customers")
        .filter(customers().field("City").equals("Oslo"))
        .order_by(customers().field("Name"))
        .take(3);
    let compiler = Compiler::new(&schema, Dialect::TSql);

    let exists = compiler.compile_exists(&query).unwrap();
    assert_snapshot!(exists.sql, @"SELECT TOP (1) 1 FROM [Customers] WHERE [Customers].[City] = @p1");

    let count = compiler.compile_count(&query).unwrap();
    assert_snapshot!(count.sql, @"SELECT COUNT(*) FROM [Customers] WHERE [Customers].[City] = @p1");
    assert_eq!(count.parameter("p1"), Some(&Value::from("Oslo")));
}
