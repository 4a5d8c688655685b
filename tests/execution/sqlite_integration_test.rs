//! End-to-end tests: compile against a live SQLite catalogue and run the SQL.

use std::sync::Arc;

use dynaquery::adapters::SqliteProvider;
use dynaquery::compiler::{CompilerOptions, OrderFallback};
use dynaquery::execution::Database;
use dynaquery::model::{Comparable, ObjectReference, Projection, Query, Value};
use dynaquery::schema::{NamingPolicy, SchemaCache};
use dynaquery::sql::Dialect;

const FIXTURE: &str = "
    CREATE TABLE Users (Id INTEGER PRIMARY KEY, Name TEXT NOT NULL, Age INTEGER);
    CREATE TABLE Orders (
        OrderId INTEGER PRIMARY KEY,
        UserId INTEGER NOT NULL REFERENCES Users (Id),
        Total REAL
    );
    CREATE TABLE Items (Id INTEGER PRIMARY KEY, Label TEXT);

    INSERT INTO Users (Id, Name, Age) VALUES (1, 'Ann', 25), (2, 'Bob', 35), (3, 'Cid', 45);
    INSERT INTO Orders (OrderId, UserId, Total) VALUES
        (1, 1, 50.0), (2, 1, 75.0), (3, 2, 20.0), (4, 3, 300.0);
    INSERT INTO Items (Id, Label)
        WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 100)
        SELECT i, 'item ' || i FROM n;
";

fn provider() -> Arc<SqliteProvider> {
    let provider = SqliteProvider::open_in_memory().unwrap();
    provider.execute_batch(FIXTURE).unwrap();
    Arc::new(provider)
}

fn database() -> Database {
    provider().into_database(NamingPolicy::default())
}

/// A database that compiles for `dialect` but still runs on SQLite.
fn database_as(dialect: Dialect) -> Database {
    let provider = provider();
    let cache = SchemaCache::new(provider.clone(), NamingPolicy::default());
    Database::new(cache, dialect, provider)
}

fn users() -> ObjectReference {
    ObjectReference::new("Users")
}

fn ids(rows: &[dynaquery::Row]) -> Vec<i64> {
    rows.iter()
        .map(|r| r.get("Id").and_then(Value::as_i64).unwrap())
        .collect()
}

#[tokio::test]
async fn test_where_selects_matching_rows() {
    let db = database();
    let query = Query::table("users").filter(users().field("Age").greater_than(30));

    let result = db.all(&query).await.unwrap();

    assert_eq!(result.rows.len(), 2);
    let names: Vec<_> = result
        .rows
        .iter()
        .map(|r| r.get("name").and_then(Value::as_str).unwrap().to_string())
        .collect();
    assert_eq!(names, ["Bob", "Cid"]);
    assert_eq!(result.total_count, None);
}

#[tokio::test]
async fn test_row_number_paging_returns_rows_11_to_20() {
    let db = database_as(Dialect::SqlServer2005);
    let items = ObjectReference::new("Items");
    let query = Query::table("Items").order_by(items.field("Id")).skip(10).take(10);

    let compiled = db.compile(&query).await.unwrap();
    assert!(compiled.statement.sql.contains("ROW_NUMBER() OVER"));

    let result = db.all(&query).await.unwrap();
    assert_eq!(ids(&result.rows), (11..=20).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_paging_strategies_agree() {
    let items = ObjectReference::new("Items");
    let query = Query::table("item")
        .filter(items.field("Id").greater_than(5))
        .order_by_descending(items.field("Id"))
        .skip(3)
        .take(4);

    let native = database().all(&query).await.unwrap();
    let rewritten = database_as(Dialect::SqlServer2005).all(&query).await.unwrap();

    assert_eq!(ids(&native.rows), [97, 96, 95, 94]);
    assert_eq!(ids(&native.rows), ids(&rewritten.rows));
}

#[tokio::test]
async fn test_skip_without_order_pages_by_primary_key() {
    let db = database();
    let result = db.all(&Query::table("Items").skip(10).take(10)).await.unwrap();
    assert_eq!(ids(&result.rows), (11..=20).collect::<Vec<_>>());

    let strict = database().with_options(CompilerOptions {
        order_fallback: OrderFallback::Fail,
    });
    let err = strict
        .all(&Query::table("Items").skip(10).take(10))
        .await
        .unwrap_err();
    assert!(err.is_invalid_state());
}

#[tokio::test]
async fn test_skip_only_on_sqlite() {
    let items = ObjectReference::new("Items");
    let query = Query::table("Items").order_by(items.field("Id")).skip(95);
    let result = database().all(&query).await.unwrap();
    assert_eq!(ids(&result.rows), [96, 97, 98, 99, 100]);
}

#[tokio::test]
async fn test_total_count_is_filled() {
    let db = database();
    let items = ObjectReference::new("Items");
    let (query, total) = Query::table("Items")
        .filter(items.field("Id").less_or_equal(42))
        .order_by(items.field("Id"))
        .skip(40)
        .take(10)
        .with_total_count();

    let result = db.all(&query).await.unwrap();

    assert_eq!(ids(&result.rows), [41, 42]);
    assert_eq!(result.total_count, Some(42));
    assert_eq!(total.get(), Some(42));
}

#[tokio::test]
async fn test_implicit_join_filters_through_foreign_key() {
    let db = database();
    let query = Query::table("Orders")
        .filter(ObjectReference::from_path("User.Name").equals("Ann"))
        .order_by(ObjectReference::from_path("Orders.OrderId"));

    let result = db.all(&query).await.unwrap();

    let order_ids: Vec<_> = result
        .rows
        .iter()
        .map(|r| r.get("OrderId").and_then(Value::as_i64).unwrap())
        .collect();
    assert_eq!(order_ids, [1, 2]);
}

#[tokio::test]
async fn test_in_and_not_in() {
    let db = database();

    let named = Query::table("Users").filter(users().field("Name").equals(vec!["Ann", "Cid"]));
    assert_eq!(ids(&db.all(&named).await.unwrap().rows), [1, 3]);

    let others = Query::table("Users").filter(users().field("Name").not_equals(vec!["Ann"]));
    assert_eq!(ids(&db.all(&others).await.unwrap().rows), [2, 3]);
}

#[tokio::test]
async fn test_having_over_joined_detail() {
    let db = database();
    let spent = ObjectReference::from_path("Users.Orders.Total").sum();
    let query = Query::table("Users")
        .select(vec![
            Projection::from(users().field("Name")),
            Projection::from(spent.with_alias("Spent")),
        ])
        .having(spent.greater_than(100))
        .order_by(users().field("Name"));

    let result = db.all(&query).await.unwrap();

    let rows: Vec<_> = result
        .rows
        .iter()
        .map(|r| {
            (
                r.get("Name").and_then(Value::as_str).unwrap().to_string(),
                r.get("Spent").cloned().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        rows,
        [
            ("Ann".to_string(), Value::Float(125.0)),
            ("Cid".to_string(), Value::Float(300.0)),
        ]
    );
}

#[tokio::test]
async fn test_with_loads_related_row() {
    let db = database();
    let query = Query::table("Orders")
        .with(ObjectReference::new("User"))
        .filter(ObjectReference::from_path("Orders.OrderId").equals(4));

    let row = db.first(&query).await.unwrap().unwrap();

    assert_eq!(row.own().len(), 3);
    let user = row.related("User").unwrap();
    assert_eq!(user.get("Name"), Some(&Value::from("Cid")));
}

#[tokio::test]
async fn test_with_detail_loads_collection_per_master() {
    let db = database();
    let (query, total) = Query::table("Users")
        .with(ObjectReference::new("Orders"))
        .order_by(users().field("Id"))
        .with_total_count();

    let result = db.all(&query).await.unwrap();

    assert_eq!(ids(&result.rows), [1, 2, 3]);
    assert_eq!(result.total_count, Some(3));
    assert_eq!(total.get(), Some(3));
    assert_eq!(db.count(&query).await.unwrap(), 3);

    let sizes: Vec<_> = result.rows.iter().map(|r| r.collection("Orders").len()).collect();
    assert_eq!(sizes, [2, 1, 1]);
    let ann: Vec<_> = result.rows[0]
        .collection("orders")
        .iter()
        .map(|o| o.get("OrderId").and_then(Value::as_i64).unwrap())
        .collect();
    assert_eq!(ann, [1, 2]);
    // Master key columns used for loading are not part of the row.
    assert_eq!(result.rows[0].columns().collect::<Vec<_>>(), ["Id", "Name", "Age"]);
}

#[tokio::test]
async fn test_with_detail_pages_by_master() {
    let db = database_as(Dialect::SqlServer2005);
    let query = Query::table("Users")
        .with(ObjectReference::new("Orders"))
        .order_by(users().field("Id"))
        .skip(1)
        .take(1);

    let result = db.all(&query).await.unwrap();

    assert_eq!(ids(&result.rows), [2]);
    let orders = result.rows[0].collection("Orders");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].get("Total"), Some(&Value::Float(20.0)));
}

#[tokio::test]
async fn test_aggregate_without_group_by_counts_one_row() {
    let db = database();
    let (query, total) = Query::table("Users")
        .select(vec![Projection::from(users().field("Age").max().with_alias("Oldest"))])
        .with_total_count();

    let result = db.all(&query).await.unwrap();

    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].get("Oldest"), Some(&Value::Int(45)));
    assert_eq!(result.total_count, Some(1));
    assert_eq!(total.get(), Some(1));
    assert_eq!(db.count(&query).await.unwrap(), 1);

    let rejected = query.having(users().field("Age").max().greater_than(99));
    assert!(db.all(&rejected).await.unwrap().rows.is_empty());
    assert_eq!(db.count(&rejected).await.unwrap(), 0);
}

#[tokio::test]
async fn test_count_exists_and_scalar() {
    let db = database();
    let adults = Query::table("Users").filter(users().field("Age").greater_or_equal(35));

    assert_eq!(db.count(&adults).await.unwrap(), 2);
    assert!(db.exists(&adults).await.unwrap());
    assert!(!db
        .exists(&Query::table("Users").filter(users().field("Age").greater_than(99)))
        .await
        .unwrap());

    let oldest = Query::table("Users")
        .select([users().field("Name")])
        .order_by_descending(users().field("Age"));
    assert_eq!(db.scalar(&oldest).await.unwrap(), Some(Value::from("Cid")));
}

#[tokio::test]
async fn test_reset_sees_new_tables() {
    let provider = provider();
    let db = provider.clone().into_database(NamingPolicy::default());

    assert!(db.compile(&Query::table("Invoices")).await.unwrap_err().is_unresolvable());

    provider
        .execute_batch("CREATE TABLE Invoices (InvoiceId INTEGER PRIMARY KEY, Amount REAL);")
        .unwrap();
    // The cached schema predates the table.
    assert!(db.compile(&Query::table("invoice")).await.is_err());

    db.reset();
    let compiled = db.compile(&Query::table("invoice")).await.unwrap();
    assert_eq!(
        compiled.statement.sql,
        "SELECT \"Invoices\".\"InvoiceId\",\"Invoices\".\"Amount\" FROM \"Invoices\""
    );
}
