//! dynaquery CLI - inspect a SQLite schema and compile queries against it
//!
//! Usage:
//!   dynaquery tables [--db <file>]
//!   dynaquery resolve <name> [--column <name>]
//!   dynaquery compile <table> [--where <cond>]... [--order-by <col>] [--skip n] [--take n]
//!   dynaquery run <table> [--where <cond>]... [--take n]
//!   dynaquery dump
//!
//! Examples:
//!   dynaquery --db shop.db resolve user_profile
//!   dynaquery --db shop.db compile users --where "Age>30" --order-by Name --skip 10 --take 10 --dialect sqlserver2005
//!   dynaquery --db shop.db run orders --where "Customer.Name=Ann"

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use dynaquery::adapters::SqliteProvider;
use dynaquery::config::Settings;
use dynaquery::model::{Comparable, ObjectReference, Query, SimpleExpression, Value};
use dynaquery::schema::CatalogSnapshot;
use dynaquery::sql::Dialect;
use dynaquery::{Compiler, Database};

#[derive(Parser)]
#[command(name = "dynaquery")]
#[command(about = "dynaquery - schema-aware dynamic SQL for multiple dialects")]
#[command(version)]
struct Cli {
    /// SQLite database file (overrides sqlite.path from the config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file (defaults to DYNAQUERY_CONFIG, ./dynaquery.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tables, keys and foreign keys
    Tables,

    /// Show which table (and optionally column) a name resolves to
    Resolve {
        /// Table name as a caller would write it
        name: String,

        /// Column name to resolve within the table
        #[arg(short, long)]
        column: Option<String>,
    },

    /// Compile a query and print its SQL and parameters
    Compile {
        #[command(flatten)]
        query: QueryArgs,

        /// SQL dialect to generate (defaults to the configured dialect)
        #[arg(short, long)]
        dialect: Option<DialectArg>,

        /// Also emit the total-count statement
        #[arg(long)]
        count: bool,
    },

    /// Run a query against the SQLite database and print the rows
    Run {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Print the catalogue as a JSON snapshot
    Dump,
}

#[derive(Args)]
struct QueryArgs {
    /// Subject table
    table: String,

    /// Filter such as "Age>30" or "Customer.Name=Ann" (repeatable, AND-combined)
    #[arg(short = 'w', long = "where")]
    filters: Vec<String>,

    /// Order by column (repeatable; later keys break ties)
    #[arg(short, long)]
    order_by: Vec<String>,

    /// Sort descending
    #[arg(long)]
    desc: bool,

    #[arg(long)]
    skip: Option<u64>,

    #[arg(long)]
    take: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Tsql,
    Sqlserver2005,
    Sqlce,
    Postgres,
    Mysql,
    Duckdb,
    Sqlite,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Tsql => Dialect::TSql,
            DialectArg::Sqlserver2005 => Dialect::SqlServer2005,
            DialectArg::Sqlce => Dialect::SqlCe,
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Mysql => Dialect::MySql,
            DialectArg::Duckdb => Dialect::DuckDb,
            DialectArg::Sqlite => Dialect::Sqlite,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let provider = match open_provider(cli.db, &settings) {
        Ok(provider) => provider,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };
    let database = provider
        .clone()
        .into_database(settings.naming_policy())
        .with_options(settings.compiler_options());

    let result = match cli.command {
        Commands::Tables => cmd_tables(&database).await,
        Commands::Resolve { name, column } => cmd_resolve(&database, &name, column).await,
        Commands::Compile {
            query,
            dialect,
            count,
        } => {
            let dialect = dialect.map(Dialect::from).unwrap_or(settings.dialect);
            cmd_compile(&database, &settings, query, dialect, count).await
        }
        Commands::Run { query } => cmd_run(&database, query).await,
        Commands::Dump => cmd_dump(&provider).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}

fn open_provider(db: Option<PathBuf>, settings: &Settings) -> Result<Arc<SqliteProvider>, String> {
    let path = match db {
        Some(path) => path,
        None => settings
            .sqlite
            .resolved_path()
            .map_err(|e| format!("Config error: {}", e))?
            .ok_or("No database given: pass --db or set sqlite.path in the config")?,
    };

    let provider = SqliteProvider::open(&path)
        .map_err(|e| format!("Error opening '{}': {}", path.display(), e))?;
    Ok(Arc::new(provider))
}

async fn cmd_tables(database: &Database) -> Result<(), String> {
    let schema = database.schema().await.map_err(|e| e.to_string())?;

    for table in schema.tables() {
        println!("{} ({})", table.key(), table.table_type);
        for column in &table.columns {
            let key = if table.primary_key.contains(&column.name) {
                " PK"
            } else {
                ""
            };
            println!("  - {} {}{}", column.name, column.data_type, key);
        }
    }

    if !schema.foreign_keys().is_empty() {
        println!();
        println!("Foreign keys:");
        for fk in schema.foreign_keys() {
            println!(
                "  - {}({}) -> {}({})",
                fk.table,
                fk.columns.join(", "),
                fk.master_table,
                fk.master_columns.join(", ")
            );
        }
    }
    Ok(())
}

async fn cmd_resolve(database: &Database, name: &str, column: Option<String>) -> Result<(), String> {
    let schema = database.schema().await.map_err(|e| e.to_string())?;
    let table = schema.find_table(name).map_err(|e| e.to_string())?;
    println!("{} -> {}", name, table.key());

    if let Some(column) = column {
        let resolved = schema
            .resolve_column(table, &column)
            .map_err(|e| e.to_string())?;
        println!("{} -> {}.{}", column, table.key(), resolved.name);
    }
    Ok(())
}

async fn cmd_compile(
    database: &Database,
    settings: &Settings,
    args: QueryArgs,
    dialect: Dialect,
    count: bool,
) -> Result<(), String> {
    let mut query = build_query(&args)?;
    if count {
        query = query.with_total_count().0;
    }

    let schema = database.schema().await.map_err(|e| e.to_string())?;
    let compiled = Compiler::new(&schema, dialect)
        .with_options(settings.compiler_options())
        .compile(&query)
        .map_err(|e| format!("Compilation error: {}", e))?;

    println!("-- Dialect: {:?}", compiled.dialect);
    for collection in &compiled.collections {
        let keys: Vec<_> = collection.keys.iter().map(|(_, column)| column.as_str()).collect();
        println!(
            "-- With {}: loaded from {} by {}",
            collection.name,
            collection.table,
            keys.join(",")
        );
    }
    for parameter in &compiled.statement.parameters {
        println!("-- {} = {}", parameter.name, parameter.value);
    }
    println!("{}", compiled.statement.sql);
    if let Some(total) = &compiled.total_count {
        println!();
        println!("{}", total.sql);
    }
    Ok(())
}

async fn cmd_run(database: &Database, args: QueryArgs) -> Result<(), String> {
    let query = build_query(&args)?;
    let result = database
        .all(&query)
        .await
        .map_err(|e| format!("Query failed: {}", e))?;

    if let Some(first) = result.rows.first() {
        println!("{}", first.columns().collect::<Vec<_>>().join("\t"));
    }
    for row in &result.rows {
        let values: Vec<String> = row.values().map(|v| v.to_string()).collect();
        println!("{}", values.join("\t"));
    }
    eprintln!("({} rows)", result.rows.len());
    Ok(())
}

async fn cmd_dump(provider: &SqliteProvider) -> Result<(), String> {
    let snapshot = CatalogSnapshot::capture(provider)
        .await
        .map_err(|e| e.to_string())?;
    println!("{}", snapshot.to_json().map_err(|e| e.to_string())?);
    Ok(())
}

fn build_query(args: &QueryArgs) -> Result<Query, String> {
    let subject = ObjectReference::from_path(&args.table);
    let mut query = Query::new(subject.clone());

    for filter in &args.filters {
        query = query.filter(parse_filter(&subject, filter)?);
    }

    let mut keys = args.order_by.iter();
    if let Some(first) = keys.next() {
        let column = column_of(&subject, first);
        query = if args.desc {
            query.order_by_descending(column)
        } else {
            query.order_by(column)
        };
        for key in keys {
            let column = column_of(&subject, key);
            query = if args.desc {
                query.then_by_descending(column)
            } else {
                query.then_by(column)
            }
            .map_err(|e| e.to_string())?;
        }
    }

    if let Some(skip) = args.skip {
        query = query.skip(skip);
    }
    if let Some(take) = args.take {
        query = query.take(take);
    }
    Ok(query)
}

/// A column of the subject; dotted paths walk foreign keys from it.
fn column_of(subject: &ObjectReference, path: &str) -> ObjectReference {
    path.split('.')
        .fold(subject.clone(), |owner, segment| owner.field(segment))
}

fn parse_filter(subject: &ObjectReference, filter: &str) -> Result<SimpleExpression, String> {
    // Two-character operators first so ">=" is not read as ">".
    const OPERATORS: [&str; 7] = [">=", "<=", "!=", ">", "<", "=", "~"];

    let (position, op) = OPERATORS
        .iter()
        .filter_map(|op| filter.find(op).map(|pos| (pos, *op)))
        .min_by_key(|(pos, op)| (*pos, std::cmp::Reverse(op.len())))
        .ok_or_else(|| format!("Invalid filter '{}': expected column<op>value", filter))?;

    let column = column_of(subject, filter[..position].trim());
    let value = parse_value(filter[position + op.len()..].trim());

    Ok(match op {
        ">=" => column.greater_or_equal(value),
        "<=" => column.less_or_equal(value),
        "!=" => column.not_equals(value),
        ">" => column.greater_than(value),
        "<" => column.less_than(value),
        "~" => column.like(value),
        _ => column.equals(value),
    })
}

fn parse_value(text: &str) -> Value {
    if text.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = text.parse::<f64>() {
        return Value::Float(f);
    }
    Value::Text(text.trim_matches('\'').to_string())
}
