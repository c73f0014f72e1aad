//! Datapyler CLI - load CSV datasets, inspect columns, normalize values

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use datapyler::ui;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "datapyler")]
#[command(version)]
#[command(about = "Load CSV datasets into SQLite, inspect column values and normalize them")]
#[command(long_about = r#"
Datapyler loads CSV files into a local SQLite database, one table per file,
and helps collapse messy column values onto a canonical set.

Example usage:
  datapyler load sales.csv
  datapyler columns sales
  datapyler distinct sales region
  datapyler normalize sales region --map "E=east" --map "East=east"
  datapyler export sales --dir ./out
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON instead of human-readable output
    #[arg(long, global = true)]
    json: bool,

    /// Path to the database file (`:memory:` for a throwaway database)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter datapyler.toml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Load a CSV file into a table named after the file
    Load {
        /// CSV file to load
        file: PathBuf,

        /// Load into this table instead
        #[arg(short, long)]
        table: Option<String>,

        /// Text encoding label (default iso-8859-1)
        #[arg(long)]
        encoding: Option<String>,

        /// Field delimiter (default ',')
        #[arg(long)]
        delimiter: Option<char>,
    },

    /// List loaded tables
    Tables,

    /// List a table's columns in order
    Columns {
        table: String,
    },

    /// List the distinct values of a column
    Distinct {
        table: String,
        column: String,
    },

    /// Show rows of a table
    Show {
        table: String,

        /// Columns to show (comma separated, default all)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Show only the last N rows
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show the most recently inserted row
    Last {
        table: String,

        /// Columns to show (comma separated, default all)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
    },

    /// Replace column values using old=new pairs
    Normalize {
        table: String,
        column: String,

        /// A replacement pair, `old=new` (repeatable)
        #[arg(short, long = "map")]
        map: Vec<String>,

        /// TOML or JSON file of "old" = "new" pairs
        #[arg(long)]
        mapping_file: Option<PathBuf>,
    },

    /// Export a table to a timestamped CSV file
    Export {
        table: String,

        /// Base file name (defaults to the table name)
        #[arg(short, long)]
        output: Option<String>,

        /// Directory to write into
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Execute raw SQL
    Query {
        sql: String,
    },

    /// Show statistics about loaded tables
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(self) -> bool {
        self == OutputMode::Human
    }
}

pub fn emit_success(output_mode: OutputMode, command: &str, data: serde_json::Value) -> anyhow::Result<()> {
    if output_mode == OutputMode::Json {
        let envelope = serde_json::json!({
            "ok": true,
            "command": command,
            "data": data,
        });
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let output_mode = if cli.json { OutputMode::Json } else { OutputMode::Human };

    if let Err(e) = run(cli, output_mode) {
        if output_mode.is_human() {
            ui::error(&format!("{:#}", e));
        } else {
            let envelope = serde_json::json!({ "ok": false, "error": format!("{:#}", e) });
            println!("{}", envelope);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli, output_mode: OutputMode) -> anyhow::Result<()> {
    let Cli { database, config, command, .. } = cli;

    let mut ctx = match command {
        Commands::Init { force } => return commands::run_init(config.as_deref(), force, output_mode),
        _ => commands::Context::open(database.as_deref(), config.as_deref(), output_mode)?,
    };

    match command {
        Commands::Init { .. } => Ok(()),
        Commands::Load { file, table, encoding, delimiter } => {
            commands::run_load(&mut ctx, &file, table, encoding.as_deref(), delimiter)
        }
        Commands::Tables => commands::run_tables(&ctx),
        Commands::Columns { table } => commands::run_columns(&ctx, &table),
        Commands::Distinct { table, column } => commands::run_distinct(&ctx, &table, &column),
        Commands::Show { table, columns, limit } => commands::run_show(&ctx, &table, &columns, limit),
        Commands::Last { table, columns } => commands::run_last(&ctx, &table, &columns),
        Commands::Normalize { table, column, map, mapping_file } => {
            commands::run_normalize(&mut ctx, &table, &column, &map, mapping_file.as_deref())
        }
        Commands::Export { table, output, dir } => {
            commands::run_export(&ctx, &table, output.as_deref(), dir.as_deref())
        }
        Commands::Query { sql } => commands::run_query(&ctx, &sql),
        Commands::Stats => commands::run_stats(&ctx),
    }?;

    ctx.close()
}
