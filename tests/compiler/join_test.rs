//! Tests for explicit joins, implicit joins through foreign keys and With.

use insta::assert_snapshot;

use dynaquery::compiler::Compiler;
use dynaquery::model::{Comparable, ObjectReference, Query, Value};
use dynaquery::schema::{
    ColumnInfo, DatabaseSchema, ForeignKeyInfo, NamingPolicy, Table, TableInfo, TableType,
};
use dynaquery::sql::Dialect;
use dynaquery::Error;

fn schema() -> DatabaseSchema {
    let table = |name: &str, cols: &[&str]| {
        Table::new(
            TableInfo::new(name, TableType::BaseTable),
            cols.iter().map(|c| ColumnInfo::new(*c, "int")).collect(),
            vec![cols[0].to_string()],
        )
    };
    let fk = |table: &str, column: &str, master: &str, master_column: &str| ForeignKeyInfo {
        table: table.into(),
        columns: vec![column.into()],
        master_table: master.into(),
        master_columns: vec![master_column.into()],
        schema: None,
        master_schema: None,
    };
    DatabaseSchema::new(
        vec![
            table("Customers", &["CustomerId", "Name"]),
            table("Orders", &["OrderId", "CustomerId", "Total"]),
            table("Employees", &["EmployeeId", "ManagerId", "Name"]),
            table("Products", &["ProductId", "Name"]),
            table("Shipments", &["ShipmentId", "OrderId", "ReturnOrderId"]),
        ],
        vec![
            fk("Orders", "CustomerId", "Customers", "CustomerId"),
            fk("Employees", "ManagerId", "Employees", "EmployeeId"),
            fk("Shipments", "OrderId", "Orders", "OrderId"),
            fk("Shipments", "ReturnOrderId", "Orders", "OrderId"),
        ],
        NamingPolicy::default(),
    )
}

fn compile(query: &Query) -> Result<String, Error> {
    let schema = schema();
    Compiler::new(&schema, Dialect::TSql)
        .compile(query)
        .map(|c| c.statement.sql)
}

#[test]
fn test_dotted_path_adds_implicit_join() {
    let customers = ObjectReference::new("Customers");
    let query = Query::table("Customers")
        .filter(customers.field("Orders").field("Total").greater_than(100));
    let sql = compile(&query).unwrap();
    assert_snapshot!(sql, @"SELECT [Customers].[CustomerId],[Customers].[Name] FROM [Customers] INNER JOIN [Orders] ON ([Customers].[CustomerId] = [Orders].[CustomerId]) WHERE [Orders].[Total] > @p1");
}

#[test]
fn test_same_path_joins_once() {
    let orders = ObjectReference::from_path("Customers.Orders");
    let query = Query::table("Customers")
        .filter(orders.field("Total").greater_than(100))
        .order_by(ObjectReference::from_path("customers.orders.OrderId"));
    let sql = compile(&query).unwrap();
    assert_eq!(sql.matches("JOIN").count(), 1);
    assert!(sql.ends_with("ORDER BY [Orders].[OrderId]"));
}

#[test]
fn test_top_level_reference_joins_related_table() {
    // "Customer" is not in scope; the one foreign key from Orders is followed.
    let query = Query::table("Orders").filter(ObjectReference::from_path("Customer.Name").equals("Ann"));
    let sql = compile(&query).unwrap();
    assert_snapshot!(sql, @"SELECT [Orders].[OrderId],[Orders].[CustomerId],[Orders].[Total] FROM [Orders] INNER JOIN [Customers] ON ([Orders].[CustomerId] = [Customers].[CustomerId]) WHERE [Customers].[Name] = @p1");
}

#[test]
fn test_unrelated_table_is_unresolvable() {
    let query = Query::table("Customers").filter(ObjectReference::from_path("Products.Name").equals("x"));
    assert!(compile(&query).unwrap_err().is_unresolvable());
}

#[test]
fn test_two_foreign_keys_need_explicit_join() {
    let query = Query::table("Orders")
        .filter(ObjectReference::from_path("Orders.Shipments.ShipmentId").greater_than(1));
    let err = compile(&query).unwrap_err();
    assert!(err.is_unresolvable());
    assert!(err.to_string().contains("several foreign keys link Orders and Shipments"));

    // Unlinked tables are reported as such, not as ambiguous.
    let query = Query::table("Orders")
        .filter(ObjectReference::from_path("Orders.Products.Name").equals("Pen"));
    let err = compile(&query).unwrap_err();
    assert!(err.is_unresolvable());
    assert!(!err.to_string().contains("several"));
}

#[test]
fn test_self_reference_gets_generated_alias() {
    let query = Query::table("Employees")
        .filter(ObjectReference::from_path("Employees.Employees.Name").equals("Ann"));
    let sql = compile(&query).unwrap();
    assert_snapshot!(sql, @"SELECT [Employees].[EmployeeId],[Employees].[ManagerId],[Employees].[Name] FROM [Employees] INNER JOIN [Employees] AS [Employees_2] ON ([Employees].[ManagerId] = [Employees_2].[EmployeeId]) WHERE [Employees_2].[Name] = @p1");
}

#[test]
fn test_explicit_join_with_alias_and_on() {
    let customers = ObjectReference::new("Customers");
    let o = ObjectReference::new("Orders").with_alias("o");
    let query = Query::table("Customers")
        .join(o.clone())
        .on(ObjectReference::new("o").field("CustomerId").equals(customers.field("CustomerId")))
        .unwrap()
        .filter(ObjectReference::new("o").field("Total").greater_than(50));
    let sql = compile(&query).unwrap();
    assert_snapshot!(sql, @"SELECT [Customers].[CustomerId],[Customers].[Name] FROM [Customers] INNER JOIN [Orders] AS [o] ON ([o].[CustomerId] = [Customers].[CustomerId]) WHERE [o].[Total] > @p1");
}

#[test]
fn test_explicit_join_condition_is_inferred() {
    let query = Query::table("Customers").left_join(ObjectReference::new("Orders"));
    let sql = compile(&query).unwrap();
    assert!(sql.ends_with(
        "FROM [Customers] LEFT JOIN [Orders] ON ([Customers].[CustomerId] = [Orders].[CustomerId])"
    ));
}

#[test]
fn test_compound_on_is_parenthesized_once() {
    let o = ObjectReference::new("o");
    let customers = ObjectReference::new("Customers");
    let query = Query::table("Customers").join_on(
        ObjectReference::new("Orders").with_alias("o"),
        o.field("CustomerId").equals(customers.field("CustomerId")) & o.field("Total").greater_than(10),
    );
    let sql = compile(&query).unwrap();
    assert!(sql.contains(
        " ON ([o].[CustomerId] = [Customers].[CustomerId] AND [o].[Total] > @p1)"
    ));
}

#[test]
fn test_join_parameters_come_before_where() {
    let schema = schema();
    let o = ObjectReference::new("o");
    let query = Query::table("Customers")
        .filter(ObjectReference::new("Name").equals("Ann"))
        .join_on(
            ObjectReference::new("Orders").with_alias("o"),
            o.field("Total").greater_than(10),
        );
    let compiled = Compiler::new(&schema, Dialect::Postgres).compile(&query).unwrap();
    let sql = &compiled.statement.sql;

    assert!(sql.contains("ON (\"o\".\"Total\" > $1)"));
    assert!(sql.ends_with("WHERE \"Customers\".\"Name\" = $2"));
    let names: Vec<_> = compiled
        .statement
        .parameters
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(names, ["p1", "p2"]);
}

#[test]
fn test_joining_subject_again_needs_alias() {
    let query = Query::table("Customers").join(ObjectReference::new("Customers"));
    assert!(compile(&query).unwrap_err().is_invalid_state());

    let aliased = Query::table("Employees").join_on(
        ObjectReference::new("Employees").with_alias("m"),
        ObjectReference::new("m")
            .field("EmployeeId")
            .equals(ObjectReference::new("Employees").field("ManagerId")),
    );
    assert!(compile(&aliased)
        .unwrap()
        .contains("INNER JOIN [Employees] AS [m] ON ([m].[EmployeeId] = [Employees].[ManagerId])"));
}

#[test]
fn test_duplicate_alias_is_rejected() {
    let query = Query::table("Customers")
        .join(ObjectReference::new("Orders").with_alias("x"))
        .join(ObjectReference::new("Orders").with_alias("x"));
    assert!(compile(&query).unwrap_err().is_invalid_state());
}

#[test]
fn test_with_left_joins_and_prefixes_columns() {
    let query = Query::table("Orders").with(ObjectReference::new("Customer"));
    let sql = compile(&query).unwrap();
    assert_snapshot!(sql, @"SELECT [Orders].[OrderId],[Orders].[CustomerId],[Orders].[Total],[Customers].[CustomerId] AS [__with__Customer__CustomerId],[Customers].[Name] AS [__with__Customer__Name] FROM [Orders] LEFT JOIN [Customers] ON ([Orders].[CustomerId] = [Customers].[CustomerId])");
}

#[test]
fn test_with_detail_selects_master_key_instead_of_joining() {
    let customers = ObjectReference::new("Customers");
    let (query, _) = Query::table("Customers")
        .with(ObjectReference::new("Orders"))
        .filter(customers.field("Name").equals("Ann"))
        .with_total_count();
    let schema = schema();
    let compiled = Compiler::new(&schema, Dialect::TSql).compile(&query).unwrap();

    assert_snapshot!(compiled.statement.sql, @"SELECT [Customers].[CustomerId],[Customers].[Name],[Customers].[CustomerId] AS [__key__Orders__CustomerId] FROM [Customers] WHERE [Customers].[Name] = @p1");
    assert_snapshot!(compiled.total_count.unwrap().sql, @"SELECT COUNT(*) FROM [Customers] WHERE [Customers].[Name] = @p1");

    let [orders] = compiled.collections.as_slice() else {
        panic!("expected one collection, got {:?}", compiled.collections);
    };
    assert_eq!(orders.name, "Orders");
    assert_eq!(orders.table, "Orders");
    assert_eq!(
        orders.keys,
        [("__key__Orders__CustomerId".to_string(), "CustomerId".to_string())]
    );

    let details = orders
        .query(&[vec![Value::Int(1)], vec![Value::Int(2)]])
        .unwrap();
    let sql = Compiler::new(&schema, Dialect::TSql).compile(&details).unwrap().statement.sql;
    assert_snapshot!(sql, @"SELECT [Orders].[OrderId],[Orders].[CustomerId],[Orders].[Total] FROM [Orders] WHERE [Orders].[CustomerId] IN (@p1_0,@p1_1)");
    assert!(orders.query(&[]).is_none());
}

#[test]
fn test_with_detail_rejects_grouped_rows() {
    let customers = ObjectReference::new("Customers");
    let query = Query::table("Customers")
        .select([customers.field("CustomerId").count()])
        .with(ObjectReference::new("Orders"));
    assert!(compile(&query).unwrap_err().is_invalid_state());
}

#[test]
fn test_with_detail_through_ambiguous_keys_fails() {
    let query = Query::table("Orders").with(ObjectReference::new("Shipments"));
    assert!(compile(&query).unwrap_err().is_unresolvable());
}

fn owned_schema() -> DatabaseSchema {
    let table = |schema: &str, name: &str, cols: &[&str]| {
        Table::new(
            TableInfo::new(name, TableType::BaseTable).in_schema(schema),
            cols.iter().map(|c| ColumnInfo::new(*c, "int")).collect(),
            vec![cols[0].to_string()],
        )
    };
    DatabaseSchema::new(
        vec![
            table("dbo", "Users", &["Id", "Name"]),
            table("dbo", "Orders", &["OrderId", "UserId"]),
            table("sales", "Users", &["Id", "Region"]),
        ],
        vec![ForeignKeyInfo {
            table: "Orders".into(),
            columns: vec!["UserId".into()],
            master_table: "Users".into(),
            master_columns: vec!["Id".into()],
            schema: Some("dbo".into()),
            master_schema: Some("dbo".into()),
        }],
        NamingPolicy::default(),
    )
}

#[test]
fn test_schema_qualified_references() {
    let schema = owned_schema();
    let compile = |query: &Query| {
        Compiler::new(&schema, Dialect::TSql)
            .compile(query)
            .map(|c| c.statement.sql)
    };

    let query = Query::table("dbo.Users")
        .filter(ObjectReference::from_path("dbo.Users.Name").equals("Ann"));
    assert_snapshot!(compile(&query).unwrap(), @"SELECT [dbo].[Users].[Id],[dbo].[Users].[Name] FROM [dbo].[Users] WHERE [dbo].[Users].[Name] = @p1");

    let query = Query::table("sales.Users")
        .filter(ObjectReference::from_path("sales.Users.Region").equals("EU"));
    assert_snapshot!(compile(&query).unwrap(), @"SELECT [sales].[Users].[Id],[sales].[Users].[Region] FROM [sales].[Users] WHERE [sales].[Users].[Region] = @p1");

    let query = Query::table("dbo.Orders")
        .filter(ObjectReference::from_path("dbo.Users.Name").equals("Ann"));
    assert_snapshot!(compile(&query).unwrap(), @"SELECT [dbo].[Orders].[OrderId],[dbo].[Orders].[UserId] FROM [dbo].[Orders] INNER JOIN [dbo].[Users] ON ([dbo].[Orders].[UserId] = [dbo].[Users].[Id]) WHERE [dbo].[Users].[Name] = @p1");
}
