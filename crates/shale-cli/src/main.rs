//! shale CLI
//!
//! Interactive SQL shell plus `-e`/`-f` batch modes over one data
//! directory.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use shale_engine::{Database, QueryResult, Value};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

const HELP: &str = "
Special commands:
  .help             Show this help message
  .tables           List all tables
  .schema <table>   Show schema for a table
  .count <table>    Show row count for a table
  .indexes <table>  Show indexes for a table
  .clear            Clear the screen
  .quit / .exit     Exit the shell

SQL statements:
  CREATE TABLE, DROP TABLE, INSERT INTO, SELECT, UPDATE, DELETE FROM,
  CREATE INDEX, DROP INDEX, SHOW TABLES, DESCRIBE, TRUNCATE TABLE

Example:
  CREATE TABLE users (
    id INTEGER PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    email VARCHAR(255) UNIQUE
  );

  INSERT INTO users VALUES (1, 'Alice', 'alice@example.com');

  SELECT * FROM users WHERE name LIKE 'A%';
";

/// An embeddable file-backed SQL database engine.
#[derive(Parser)]
#[command(name = "shale")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the database files.
    #[arg(short, long, default_value = "./shale_data")]
    data_dir: PathBuf,

    /// Execute one SQL statement and exit.
    #[arg(short, long)]
    execute: Option<String>,

    /// Execute SQL statements from a file and exit.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let db = Database::open(&cli.data_dir)
        .with_context(|| format!("opening database in {}", cli.data_dir.display()))?;

    if let Some(sql) = cli.execute {
        let result = db.execute(&sql)?;
        print_outcome(&result);
        return Ok(());
    }

    if let Some(path) = cli.file {
        let sql =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        for result in db.execute_many(&sql)? {
            print_outcome(&result);
        }
        return Ok(());
    }

    repl(&db)
}

fn repl(db: &Database) -> anyhow::Result<()> {
    println!("shale {}", env!("CARGO_PKG_VERSION"));
    println!("Type .help for commands. Statements end with a semicolon (;).");

    let stdin = io::stdin();
    let mut buffer: Vec<String> = Vec::new();

    loop {
        let prompt = if buffer.is_empty() { "shale> " } else { "  ...> " };
        print!("{prompt}");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        // Dot commands only apply outside a multi-line statement.
        if buffer.is_empty() && line.starts_with('.') {
            if !handle_command(db, line) {
                break;
            }
            continue;
        }

        buffer.push(line.to_string());
        if line.ends_with(';') {
            let statement = buffer.join(" ");
            buffer.clear();
            match db.execute_many(&statement) {
                Ok(results) => {
                    for result in results {
                        print_outcome(&result);
                    }
                }
                Err(err) => println!("Error: {err}"),
            }
        }
    }

    Ok(())
}

/// Handles a dot command; returns false when the shell should exit.
fn handle_command(db: &Database, command: &str) -> bool {
    let mut parts = command.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next().map(str::trim).filter(|arg| !arg.is_empty());

    match name.as_str() {
        ".quit" | ".exit" | ".q" => {
            println!("Goodbye!");
            return false;
        }
        ".help" => println!("{HELP}"),
        ".tables" => show_tables(db),
        ".schema" => match arg {
            Some(table) => show_schema(db, table),
            None => println!("Usage: .schema <table>"),
        },
        ".count" => match arg {
            Some(table) => match db.count(table) {
                Ok(count) => println!("{table}: {count} rows"),
                Err(err) => println!("Error: {err}"),
            },
            None => println!("Usage: .count <table>"),
        },
        ".indexes" => match arg {
            Some(table) => show_indexes(db, table),
            None => println!("Usage: .indexes <table>"),
        },
        ".clear" => print!("\x1b[2J\x1b[H"),
        other => {
            println!("Unknown command: {other}");
            println!("Type .help for available commands.");
        }
    }
    true
}

fn show_tables(db: &Database) {
    let tables = db.tables();
    if tables.is_empty() {
        println!("No tables found.");
        return;
    }
    println!("\nTables:");
    for table in tables {
        match db.count(&table) {
            Ok(count) => println!("  {table} ({count} rows)"),
            Err(_) => println!("  {table}"),
        }
    }
    println!();
}

fn show_schema(db: &Database, table: &str) {
    match db.describe(table) {
        Ok(schema) => {
            println!("\nTable: {}", schema.name);
            println!("{}", "-".repeat(60));
            for column in &schema.columns {
                let mut flags = Vec::new();
                if column.primary_key {
                    flags.push("PRIMARY KEY".to_string());
                }
                if column.unique && !column.primary_key {
                    flags.push("UNIQUE".to_string());
                }
                if column.not_null && !column.primary_key {
                    flags.push("NOT NULL".to_string());
                }
                if let Some(default) = &column.default {
                    flags.push(format!("DEFAULT {default}"));
                }
                println!(
                    "  {:<20} {:<15} {}",
                    column.name,
                    column.col_type.to_string(),
                    flags.join(" ")
                );
            }
            println!();
        }
        Err(err) => println!("Error: {err}"),
    }
}

fn show_indexes(db: &Database, table: &str) {
    let indexes = db.indexes(table);
    if indexes.is_empty() {
        println!("No indexes on {table}");
        return;
    }
    println!("\nIndexes on {table}:");
    for index in indexes {
        let unique = if index.unique { "UNIQUE " } else { "" };
        println!("  {}: {}INDEX on {}", index.name, unique, index.column);
    }
    println!();
}

fn print_outcome(result: &QueryResult) {
    if !result.rows.is_empty() {
        print_table(result);
    } else if !result.columns.is_empty() {
        println!("(0 rows)");
    } else if !result.message.is_empty() {
        println!("{}", result.message);
    }

    if result.affected_rows > 0 {
        println!("({} row(s) affected)", result.affected_rows);
    }
}

/// Renders a result set as a column-aligned table, `NULL` spelled out and
/// cells capped at 40 characters.
fn print_table(result: &QueryResult) {
    const MAX_WIDTH: usize = 40;

    let render = |value: Option<&Value>| match value {
        None | Some(Value::Null) => "NULL".to_string(),
        Some(value) => value.to_string(),
    };

    let mut widths: Vec<usize> = result.columns.iter().map(String::len).collect();
    for row in &result.rows {
        for (i, column) in result.columns.iter().enumerate() {
            widths[i] = widths[i].max(render(row.get(column)).len()).min(MAX_WIDTH);
        }
    }

    let header = result
        .columns
        .iter()
        .zip(&widths)
        .map(|(column, &width)| format!("{column:<width$.width$}"))
        .collect::<Vec<_>>()
        .join(" | ");
    let separator = widths
        .iter()
        .map(|&width| "-".repeat(width))
        .collect::<Vec<_>>()
        .join("-+-");

    println!();
    println!("{header}");
    println!("{separator}");

    for row in &result.rows {
        let cells = result
            .columns
            .iter()
            .zip(&widths)
            .map(|(column, &width)| {
                let text = render(row.get(column));
                format!("{text:<width$.width$}")
            })
            .collect::<Vec<_>>()
            .join(" | ");
        println!("{cells}");
    }

    println!("\n({} row(s))", result.rows.len());
}
