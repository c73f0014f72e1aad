use crate::{OutputMode, emit_success};
use datapyler::config::{self, DatapylerConfig};
use datapyler::export;
use datapyler::ingest;
use datapyler::normalize::{self, ValueMapping};
use datapyler::storage::{value, Location, Row, Store};
use datapyler::ui::{self, Icons, Spinner};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

/// Everything a command needs: the open store and resolved settings
pub struct Context {
    pub store: Store,
    pub config: DatapylerConfig,
    pub output_mode: OutputMode,
}

impl Context {
    /// Resolve the database location (flag, then config, then default) and open it.
    pub fn open(database: Option<&Path>, config_path: Option<&Path>, output_mode: OutputMode) -> anyhow::Result<Self> {
        let config = config::load_config(config_path)?.unwrap_or_default();
        let location = match (database, &config.database) {
            (Some(path), _) => Location::parse(&path.to_string_lossy()),
            (None, Some(configured)) => Location::parse(configured),
            (None, None) => Location::File(config::default_database_path_in(Path::new("."))),
        };
        if let Location::File(path) = &location {
            config::ensure_db_dir(path)?;
        }
        let store = Store::at(location)?;
        Ok(Self { store, config, output_mode })
    }

    pub fn close(mut self) -> anyhow::Result<()> {
        self.store.close()?;
        Ok(())
    }
}

fn rows_to_json(header: &[String], rows: &[Row]) -> serde_json::Value {
    rows.iter()
        .map(|row| {
            header
                .iter()
                .cloned()
                .zip(row.iter().map(value::to_json))
                .collect::<serde_json::Map<_, _>>()
        })
        .map(serde_json::Value::Object)
        .collect()
}

fn selected_header(ctx: &Context, table: &str, columns: &[String]) -> anyhow::Result<Vec<String>> {
    if columns.is_empty() {
        Ok(ctx.store.select_all_column_names(table)?)
    } else {
        Ok(columns.to_vec())
    }
}

pub fn run_init(config_path: Option<&Path>, force: bool, output_mode: OutputMode) -> anyhow::Result<()> {
    let path = config_path.map(Path::to_path_buf).unwrap_or_else(config::default_config_path);
    config::write_config(&path, &DatapylerConfig::starter(), force)?;

    if output_mode.is_human() {
        ui::success(&format!("Wrote {}", path.display()));
    } else {
        emit_success(output_mode, "init", serde_json::json!({ "config": path.display().to_string() }))?;
    }
    Ok(())
}

pub fn run_load(
    ctx: &mut Context,
    file: &Path,
    table: Option<String>,
    encoding: Option<&str>,
    delimiter: Option<char>,
) -> anyhow::Result<()> {
    let mut options = ctx.config.ingest_options()?;
    if let Some(label) = encoding {
        options = options.with_encoding_label(label)?;
    }
    if let Some(delimiter) = delimiter {
        options = options.with_delimiter(delimiter)?;
    }
    if let Some(table) = table {
        options = options.with_table_name(table);
    }

    if ctx.output_mode.is_human() {
        ui::header(&format!("Loading {}", file.display()));
    }
    let spinner = Spinner::new(&format!("Reading {}", file.display()));
    let report = ingest::load(&mut ctx.store, file, &options);
    spinner.finish_and_clear();
    let report = report?;

    if ctx.output_mode.is_human() {
        let verb = if report.created { "Created" } else { "Appended to" };
        ui::success(&format!("{} table {} ({} rows)", verb, ui::ident(&report.table), report.rows_inserted));
        ui::section("Columns");
        for column in &report.columns {
            ui::summary_row(&column.ty.to_string(), &ui::ident(&column.name));
        }
    } else {
        emit_success(ctx.output_mode, "load", serde_json::to_value(&report)?)?;
    }
    Ok(())
}

pub fn run_tables(ctx: &Context) -> anyhow::Result<()> {
    let tables = ctx.store.list_tables()?;

    if ctx.output_mode.is_human() {
        if tables.is_empty() {
            println!("{} No tables loaded.", Icons::EMPTY);
        }
        for table in &tables {
            let rows = ctx.store.row_count(table)?;
            println!("{} {} {}", Icons::TABLE, ui::ident(table), ui::dim(&format!("({} rows)", rows)));
        }
    } else {
        emit_success(ctx.output_mode, "tables", serde_json::json!(tables))?;
    }
    Ok(())
}

pub fn run_columns(ctx: &Context, table: &str) -> anyhow::Result<()> {
    let columns = ctx.store.table_columns(table)?;

    if ctx.output_mode.is_human() {
        for (idx, column) in columns.iter().enumerate() {
            println!(
                "{} {:>3}. {} {}",
                Icons::COLUMN,
                idx + 1,
                ui::ident(&column.name),
                ui::dim(column.ty.as_sql())
            );
        }
    } else {
        emit_success(ctx.output_mode, "columns", serde_json::to_value(&columns)?)?;
    }
    Ok(())
}

pub fn run_distinct(ctx: &Context, table: &str, column: &str) -> anyhow::Result<()> {
    let values = ctx.store.select_distinct_column(column, table)?;

    if ctx.output_mode.is_human() {
        ui::info(&format!("{}.{}", table, column), &format!("{} distinct values", values.len()));
        for v in &values {
            let cell = value::render(v);
            if matches!(v, rusqlite::types::Value::Null) {
                println!("  {}", ui::dim("(null)"));
            } else {
                println!("  {}", cell);
            }
        }
    } else {
        let data: Vec<serde_json::Value> = values.iter().map(value::to_json).collect();
        emit_success(ctx.output_mode, "distinct", serde_json::json!(data))?;
    }
    Ok(())
}

pub fn run_show(ctx: &Context, table: &str, columns: &[String], limit: Option<usize>) -> anyhow::Result<()> {
    let cols: Vec<&str> = columns.iter().map(String::as_str).collect();
    let rows = ctx.store.select(table, &cols, limit)?;
    let header = selected_header(ctx, table, columns)?;

    if ctx.output_mode.is_human() {
        if rows.is_empty() {
            println!("{} No rows.", Icons::EMPTY);
        } else {
            println!("{}", ui::rows_table(&header, &rows));
        }
    } else {
        emit_success(ctx.output_mode, "show", rows_to_json(&header, &rows))?;
    }
    Ok(())
}

pub fn run_last(ctx: &Context, table: &str, columns: &[String]) -> anyhow::Result<()> {
    let cols: Vec<&str> = columns.iter().map(String::as_str).collect();
    let row = ctx.store.select_last(table, &cols)?;
    let header = selected_header(ctx, table, columns)?;
    let rows = vec![row];

    if ctx.output_mode.is_human() {
        println!("{}", ui::rows_table(&header, &rows));
    } else {
        emit_success(ctx.output_mode, "last", rows_to_json(&header, &rows))?;
    }
    Ok(())
}

pub fn run_normalize(
    ctx: &mut Context,
    table: &str,
    column: &str,
    pairs: &[String],
    mapping_file: Option<&Path>,
) -> anyhow::Result<()> {
    let mut mapping = match mapping_file {
        Some(path) => ValueMapping::from_file(path)?,
        None => ValueMapping::new(),
    };
    for pair in pairs {
        let (old, new) = ValueMapping::parse_pair(pair)?;
        mapping.insert(old, new);
    }
    if mapping.is_empty() {
        anyhow::bail!("no mapping given (use --map old=new or --mapping-file)");
    }

    let changed = normalize::apply(&mut ctx.store, table, column, &mapping)?;

    if ctx.output_mode.is_human() {
        for (old, new) in mapping.iter() {
            println!("  {} {} {}", old, "→".style(ui::theme().dim.clone()), new);
        }
        ui::success(&format!("{} rows changed in {}.{}", changed, ui::ident(table), ui::ident(column)));
    } else {
        emit_success(
            ctx.output_mode,
            "normalize",
            serde_json::json!({ "table": table, "column": column, "changed": changed }),
        )?;
    }
    Ok(())
}

pub fn run_export(ctx: &Context, table: &str, output: Option<&str>, dir: Option<&Path>) -> anyhow::Result<()> {
    let dir = dir
        .map(Path::to_path_buf)
        .or_else(|| ctx.config.export_dir.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir)?;

    let path = export::export_table(&ctx.store, table, &dir, output)?;

    if ctx.output_mode.is_human() {
        println!("{} Exported {} to {}", Icons::EXPORT, ui::ident(table), path.display());
    } else {
        emit_success(ctx.output_mode, "export", serde_json::json!({ "path": path.display().to_string() }))?;
    }
    Ok(())
}

pub fn run_query(ctx: &Context, sql: &str) -> anyhow::Result<()> {
    ctx.store.raw_query(sql)?;

    if ctx.output_mode.is_human() {
        ui::success("Query executed");
    } else {
        emit_success(ctx.output_mode, "query", serde_json::Value::Null)?;
    }
    Ok(())
}

pub fn run_stats(ctx: &Context) -> anyhow::Result<()> {
    let stats = ctx.store.stats()?;

    if ctx.output_mode.is_human() {
        println!("{} Datapyler Statistics ({})", Icons::STATS, stats.location);
        let tables = stats.tables.len().to_string();
        let rows = stats.tables.iter().map(|t| t.rows).sum::<usize>().to_string();
        println!("{}", ui::stats_table(&[("Tables", tables.as_str()), ("Rows", rows.as_str())]));
        for t in &stats.tables {
            ui::summary_row(&t.name, &format!("{} rows, {} columns", t.rows, t.columns));
        }
    } else {
        emit_success(ctx.output_mode, "stats", serde_json::to_value(&stats)?)?;
    }
    Ok(())
}
