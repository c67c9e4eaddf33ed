mod filter;
mod render;
mod schema;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use vaultdb_core::{Database, DatabaseConfig, DB_FILE_EXTENSION};

use crate::filter::WhereClause;
use crate::render::{render, OutputFormat};
use crate::schema::{parse_columns, parse_row};

#[derive(Parser, Debug)]
#[command(name = "vaultdb", author, version, about = "Encrypted single-file table store", long_about = None)]
struct Cli {
    /// JSON file with KDF cost, password policy and compression settings
    #[arg(long, global = true, env = "VAULTDB_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a database or a table
    Create {
        #[command(subcommand)]
        target: CreateTarget,
    },
    /// Insert one row
    Insert {
        file: PathBuf,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        table: String,
        /// Row as a JSON object, e.g. '{"name": "Alice", "age": 25}'
        #[arg(long)]
        data: String,
    },
    /// Query rows
    Select {
        file: PathBuf,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        table: String,
        /// Comma-separated column list
        #[arg(long)]
        columns: Option<String>,
        /// Filter in the form column=value
        #[arg(long = "where")]
        filter: Option<String>,
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Update rows matching a filter
    Update {
        file: PathBuf,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        table: String,
        #[arg(long)]
        data: String,
        #[arg(long = "where")]
        filter: String,
    },
    /// Delete rows matching a filter
    Delete {
        file: PathBuf,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        table: String,
        #[arg(long = "where")]
        filter: String,
    },
    /// Show database or table information
    Info {
        file: PathBuf,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        table: Option<String>,
    },
    /// Re-encrypt the database under a new password
    Password {
        file: PathBuf,
        #[arg(long)]
        old_password: Option<String>,
        #[arg(long)]
        new_password: Option<String>,
    },
    /// Write an encrypted copy of the database
    Backup {
        file: PathBuf,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        backup_file: PathBuf,
        /// Defaults to the database password
        #[arg(long)]
        backup_password: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum CreateTarget {
    /// Create a new, empty database file
    Database {
        /// Database file name (.pydb is appended when missing)
        file: String,
        #[arg(long)]
        password: Option<String>,
        /// Directory to store the database in
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
    /// Add a table to an existing database
    Table {
        file: PathBuf,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        name: String,
        /// Columns as JSON, e.g. '{"name": "string", "age": {"type": "int", "nullable": false}}'
        #[arg(long)]
        columns: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => DatabaseConfig::from_file(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => DatabaseConfig::default(),
    };

    match cli.command {
        Commands::Create { target } => match target {
            CreateTarget::Database {
                file,
                password,
                path,
            } => {
                let password = password_or_prompt(password, "Database password: ")?;
                let (dir, name) = split_db_target(&path, &file)?;
                let db = Database::create_new_with_config(&name, &password, &dir, config)?;
                println!("Database created: {}", db.file_path().display());
            }
            CreateTarget::Table {
                file,
                password,
                name,
                columns,
            } => {
                let mut db = open(&file, password, config)?;
                let columns = parse_columns(&columns)?;
                let table = db.create_table(&name, columns)?;
                let column_list = table.get_column_names().join(", ");
                db.flush()?;
                println!("Table '{name}' created");
                println!("  Columns: {column_list}");
            }
        },
        Commands::Insert {
            file,
            password,
            table,
            data,
        } => {
            let mut db = open(&file, password, config)?;
            let row = parse_row(&data)?;
            let id = db.get_table_mut(&table)?.insert(row)?;
            db.flush()?;
            println!("Inserted row (id: {id})");
        }
        Commands::Select {
            file,
            password,
            table,
            columns,
            filter,
            format,
        } => {
            let db = open(&file, password, config)?;
            let table = db.get_table(&table)?;
            let columns: Vec<String> = match columns {
                Some(list) => list
                    .split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect(),
                None => table.get_column_names(),
            };
            let column_refs: Vec<&str> = columns.iter().map(String::as_str).collect();
            let rows = match filter {
                Some(expr) => {
                    let predicate = WhereClause::parse(&expr)?.predicate(table)?;
                    table.select(Some(&predicate), Some(&column_refs))?
                }
                None => table.select(None, Some(&column_refs))?,
            };
            print!("{}", render(&rows, &columns, format)?);
            if format == OutputFormat::Table {
                println!("\nTotal: {} row(s)", rows.len());
            }
        }
        Commands::Update {
            file,
            password,
            table,
            data,
            filter,
        } => {
            let mut db = open(&file, password, config)?;
            let changes = parse_row(&data)?;
            let target = db.get_table_mut(&table)?;
            let predicate = WhereClause::parse(&filter)?.predicate(target)?;
            let count = target.update(predicate, changes)?;
            db.flush()?;
            println!("{count} row(s) updated");
        }
        Commands::Delete {
            file,
            password,
            table,
            filter,
        } => {
            let mut db = open(&file, password, config)?;
            let target = db.get_table_mut(&table)?;
            let predicate = WhereClause::parse(&filter)?.predicate(target)?;
            let count = target.delete(predicate);
            db.flush()?;
            println!("{count} row(s) deleted");
        }
        Commands::Info {
            file,
            password,
            table,
        } => {
            let db = open(&file, password, config)?;
            match table {
                Some(name) => {
                    let table = db.get_table(&name)?;
                    let info = table.get_table_info();
                    println!("Table: {name}");
                    println!("  Columns: {}", info.column_count);
                    println!("  Rows: {}", info.data_count);
                    println!("  Created: {}", info.created_at.to_rfc3339());
                    println!("  Column names: {}", table.get_column_names().join(", "));
                }
                None => {
                    let info = db.get_database_info();
                    println!("Database: {}", info.name);
                    println!("  Path: {}", info.file_path.display());
                    println!("  Tables: {}", info.table_count);
                    println!("  Encrypted: {}", info.encrypted);
                    for (name, table) in &info.tables {
                        println!("    - {name}: {} row(s)", table.data_count);
                    }
                }
            }
        }
        Commands::Password {
            file,
            old_password,
            new_password,
        } => {
            let mut db = open(&file, old_password, config)?;
            let new_password = password_or_prompt(new_password, "New password: ")?;
            db.save(&new_password)?;
            info!(path = %file.display(), "password rotated");
            println!("Password changed");
        }
        Commands::Backup {
            file,
            password,
            backup_file,
            backup_password,
        } => {
            let db = open(&file, password, config)?;
            db.backup(&backup_file, backup_password.as_deref())?;
            println!("Backup written: {}", backup_file.display());
        }
    }
    Ok(())
}

fn open(file: &Path, password: Option<String>, config: DatabaseConfig) -> Result<Database> {
    let password = password_or_prompt(password, "Database password: ")?;
    Database::load_from_file_with_config(file, &password, config)
        .with_context(|| format!("open {}", file.display()))
}

fn password_or_prompt(password: Option<String>, prompt: &str) -> Result<String> {
    match password {
        Some(p) => Ok(p),
        None => rpassword::prompt_password(prompt).map_err(|e| anyhow!("read password: {e}")),
    }
}

/// Resolve `--path` plus a file argument into (directory, database name).
fn split_db_target(dir: &Path, file: &str) -> Result<(PathBuf, String)> {
    let full = dir.join(file);
    let name = full
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("invalid database file name '{file}'"))?;
    let suffix = format!(".{DB_FILE_EXTENSION}");
    let name = name.strip_suffix(&suffix).unwrap_or(&name).to_string();
    let parent = full
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((parent, name))
}
