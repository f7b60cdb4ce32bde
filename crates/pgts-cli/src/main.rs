//! pgts command-line tool
//!
//! Readiness checks, migration artifacts and ad-hoc BM25 search against a
//! PostgreSQL database with `pg_textsearch`.

mod config;

use std::path::{Path, PathBuf};

use clap::Parser;
use pgts::query::{QuerySet, SCORE_ANNOTATION};
use pgts::{Bm25Index, Migration, Operation, TextsearchBackend};
use serde_json::{Map, Value};
use tokio_postgres::Row;
use tracing::info;

use crate::config::{CliConfig, Command};

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level`.
fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pgts={},pgts_cli={}", level, level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Connects using `--database-url` or the `PGTS_PG_*` variables.
async fn connect(config: &CliConfig) -> anyhow::Result<TextsearchBackend> {
    let pg = config.postgres_config()?;
    info!(host = %pg.host, port = pg.port, dbname = %pg.dbname, "Connecting to PostgreSQL");
    Ok(TextsearchBackend::new(pg).await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    match &config.command {
        Command::Check => {
            if !check(&config).await? {
                std::process::exit(1);
            }
        }
        Command::Makemigration {
            table,
            fields,
            index,
            text_config,
            k1,
            b,
            name,
            out,
            no_extension,
        } => {
            let mut bm25 = Bm25Index::new(fields.as_slice(), index.as_str());
            if let Some(text_config) = text_config {
                bm25 = bm25.with_text_config(text_config.as_str());
            }
            if let Some(k1) = k1 {
                bm25 = bm25.with_k1(*k1);
            }
            if let Some(b) = b {
                bm25 = bm25.with_b(*b);
            }
            let migration = build_migration(name, table, bm25, !no_extension)?;
            let path = out
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("{}.json", name)));
            migration.write_to(&path)?;
            println!("Wrote {} ({} operations)", path.display(), migration.operations.len());
            for operation in &migration.operations {
                println!("  - {}", operation.describe());
            }
        }
        Command::Sqlmigrate { path, backwards } => {
            let migration = Migration::load(path)?;
            let statements = if *backwards {
                migration.backwards_sql()?
            } else {
                migration.forwards_sql()?
            };
            for statement in statements {
                println!("{};", statement);
            }
        }
        Command::Migrate { path, revert } => {
            migrate(&config, path, *revert).await?;
        }
        Command::Search {
            query,
            table,
            field,
            index,
            limit,
            threshold,
            columns,
        } => {
            let backend = connect(&config).await?;
            let mut qs = QuerySet::new(table.as_str())
                .only_as_text(columns.as_slice())
                .bm25_search(query, field, index.as_deref(), *limit)?;
            if let (Some(threshold), Some(index)) = (threshold, index) {
                qs = qs.bm25_filter(query, field, index, *threshold)?;
            }

            let rows = backend.fetch(&qs).await?;
            info!(table = %table, results = rows.len(), "Search complete");
            for row in &rows {
                println!("{}", Value::Object(row_to_json(row, columns)?));
            }
        }
    }

    Ok(())
}

/// Prints readiness findings. Returns whether BM25 queries can run.
async fn check(config: &CliConfig) -> anyhow::Result<bool> {
    let backend = connect(config).await?;
    let report = backend.readiness().await?;

    let messages = report.messages();
    if messages.is_empty() {
        println!("System check identified no issues.");
    } else {
        println!("System check identified {} issue(s):", messages.len());
        for message in &messages {
            println!("{}", message);
        }
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(report.is_ready())
}

async fn migrate(config: &CliConfig, path: &Path, revert: bool) -> anyhow::Result<()> {
    let migration = Migration::load(path)?;
    let backend = connect(config).await?;

    if revert {
        backend.unmigrate(&migration).await?;
        println!("Reverted {}", migration.name);
    } else if backend.migrate(&migration).await? {
        println!("Applied {}", migration.name);
    } else {
        println!("{} already applied", migration.name);
    }
    Ok(())
}

/// A migration for one table, optionally enabling the extension first.
fn build_migration(
    name: &str,
    table: &str,
    index: Bm25Index,
    with_extension: bool,
) -> anyhow::Result<Migration> {
    index.check()?;
    let mut migration = Migration::new(name);
    if with_extension {
        migration = migration.with_operation(Operation::create_pg_textsearch_extension());
    }
    Ok(migration.with_operation(Operation::create_bm25_index(table, index)))
}

/// Renders the text-cast columns and the score of a result row.
fn row_to_json(row: &Row, columns: &[String]) -> anyhow::Result<Map<String, Value>> {
    let mut object = Map::new();
    for column in columns {
        let value: Option<String> = row.try_get(column.as_str())?;
        object.insert(column.clone(), value.map(Value::String).unwrap_or(Value::Null));
    }
    let score: Option<f64> = row.try_get(SCORE_ANNOTATION)?;
    object.insert(
        SCORE_ANNOTATION.to_string(),
        score.map(Value::from).unwrap_or(Value::Null),
    );
    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_migration_with_extension() {
        let index = Bm25Index::new(&["content"], "article_bm25_idx").with_text_config("english");
        let migration = build_migration("0001_bm25", "articles", index, true).unwrap();
        let sql = migration.forwards_sql().unwrap();
        assert_eq!(sql.len(), 2);
        assert_eq!(sql[0], "CREATE EXTENSION IF NOT EXISTS \"pg_textsearch\"");
        assert_eq!(
            sql[1],
            "CREATE INDEX \"article_bm25_idx\" ON \"articles\" USING bm25 (\"content\") \
             WITH (text_config = 'english')"
        );
    }

    #[test]
    fn test_build_migration_without_extension() {
        let index = Bm25Index::new(&["content"], "article_bm25_idx");
        let migration = build_migration("0002_bm25", "articles", index, false).unwrap();
        assert_eq!(migration.operations.len(), 1);
        assert_eq!(
            migration.backwards_sql().unwrap(),
            vec!["DROP INDEX IF EXISTS \"article_bm25_idx\"".to_string()]
        );
    }

    #[test]
    fn test_build_migration_rejects_bad_b() {
        let index = Bm25Index::new(&["content"], "article_bm25_idx").with_b(1.5);
        assert!(build_migration("0001_bm25", "articles", index, true).is_err());
    }
}
