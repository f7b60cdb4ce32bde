//! Command-line configuration.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PGTS_DATABASE_URL` | (unset) | `postgres://user:pw@host:port/db`; falls back to `PGTS_PG_*` |
//! | `PGTS_LOG_LEVEL` | info | Log level |

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pgts::PostgresConfig;
use pgts::error::ValidationResult;

/// Log levels accepted by `--log-level`.
const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Top-level arguments.
#[derive(Debug, Clone, Parser)]
#[command(name = "pgts")]
#[command(about = "BM25 search tools for PostgreSQL pg_textsearch")]
pub struct CliConfig {
    /// Database connection string.
    #[arg(long, env = "PGTS_DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "PGTS_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Check PostgreSQL version and pg_textsearch availability.
    Check,

    /// Write a migration artifact creating the extension and a BM25 index.
    Makemigration {
        /// Table to index.
        #[arg(long)]
        table: String,

        /// Comma-separated columns to index.
        #[arg(long, required = true, value_delimiter = ',')]
        fields: Vec<String>,

        /// Index name.
        #[arg(long)]
        index: String,

        /// Text search configuration, e.g. english.
        #[arg(long)]
        text_config: Option<String>,

        /// BM25 k1 parameter.
        #[arg(long)]
        k1: Option<f64>,

        /// BM25 b parameter.
        #[arg(long)]
        b: Option<f64>,

        /// Migration name.
        #[arg(long, default_value = "0001_bm25")]
        name: String,

        /// Output file; defaults to `<name>.json`.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Skip the CREATE EXTENSION operation.
        #[arg(long)]
        no_extension: bool,
    },

    /// Print the SQL of a migration artifact without running it.
    Sqlmigrate {
        /// Migration artifact.
        path: PathBuf,

        /// Print the reverse SQL instead.
        #[arg(long)]
        backwards: bool,
    },

    /// Apply (or revert) a migration artifact.
    Migrate {
        /// Migration artifact.
        path: PathBuf,

        /// Revert instead of apply.
        #[arg(long)]
        revert: bool,
    },

    /// Rank rows of a table by BM25 relevance.
    Search {
        /// Free-text query.
        query: String,

        /// Table to search.
        #[arg(long)]
        table: String,

        /// Column to score.
        #[arg(long)]
        field: String,

        /// BM25 index name.
        #[arg(long)]
        index: Option<String>,

        /// Maximum number of rows.
        #[arg(long)]
        limit: Option<usize>,

        /// Only keep rows scoring below this threshold (requires --index).
        #[arg(long, allow_negative_numbers = true)]
        threshold: Option<f64>,

        /// Comma-separated columns to print.
        #[arg(long, value_delimiter = ',', default_value = "id")]
        columns: Vec<String>,
    },
}

impl CliConfig {
    /// Connection settings from `--database-url`, or `PGTS_PG_*` variables.
    pub fn postgres_config(&self) -> ValidationResult<PostgresConfig> {
        match &self.database_url {
            Some(url) => PostgresConfig::from_connection_string(url),
            None => Ok(PostgresConfig::from_env()),
        }
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            errors.push(format!(
                "Invalid log level '{}', expected one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            ));
        }

        if let Err(e) = self.postgres_config() {
            errors.push(format!("Invalid --database-url: {}", e));
        }

        if let Command::Search {
            index,
            threshold,
            columns,
            ..
        } = &self.command
        {
            if threshold.is_some() && index.is_none() {
                errors.push("--threshold requires --index".to_string());
            }
            if columns.is_empty() {
                errors.push("--columns cannot be empty".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        let config = CliConfig::try_parse_from([
            "pgts",
            "search",
            "postgresql",
            "--table",
            "articles",
            "--field",
            "content",
            "--limit",
            "5",
            "--columns",
            "id,title",
        ])
        .unwrap();
        match config.command {
            Command::Search {
                query,
                limit,
                columns,
                ..
            } => {
                assert_eq!(query, "postgresql");
                assert_eq!(limit, Some(5));
                assert_eq!(columns, vec!["id", "title"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_threshold_requires_index() {
        let config = CliConfig::try_parse_from([
            "pgts",
            "search",
            "q",
            "--table",
            "t",
            "--field",
            "f",
            "--threshold",
            "-0.5",
        ])
        .unwrap();
        let errors = config.validate().unwrap_err();
        assert_eq!(errors, vec!["--threshold requires --index".to_string()]);
    }

    #[test]
    fn test_invalid_log_level() {
        let config =
            CliConfig::try_parse_from(["pgts", "--log-level", "loud", "check"]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_url_overrides_env() {
        let config = CliConfig::try_parse_from([
            "pgts",
            "--database-url",
            "postgres://u:p@db:6543/search",
            "check",
        ])
        .unwrap();
        let pg = config.postgres_config().unwrap();
        assert_eq!(pg.host, "db");
        assert_eq!(pg.port, 6543);
        assert_eq!(pg.dbname, "search");
    }

    #[test]
    fn test_database_url_with_encoded_password() {
        let config = CliConfig::try_parse_from([
            "pgts",
            "--database-url",
            "postgres://u:p%40ss@db/search?sslmode=disable",
            "check",
        ])
        .unwrap();
        assert!(config.validate().is_ok());
        let pg = config.postgres_config().unwrap();
        assert_eq!(pg.password.as_deref(), Some("p@ss"));
        assert_eq!(pg.ssl_mode, pgts::backend::PostgresSslMode::Disable);
    }

    #[test]
    fn test_invalid_database_url() {
        let config = CliConfig::try_parse_from([
            "pgts",
            "--database-url",
            "postgres://u@db:notaport/search",
            "check",
        ])
        .unwrap();
        let errors = config.validate().unwrap_err();
        assert!(errors[0].starts_with("Invalid --database-url"));
    }

    #[test]
    fn test_parse_makemigration_fields() {
        let config = CliConfig::try_parse_from([
            "pgts",
            "makemigration",
            "--table",
            "articles",
            "--fields",
            "title,content",
            "--index",
            "article_bm25_idx",
        ])
        .unwrap();
        assert!(config.validate().is_ok());
        match config.command {
            Command::Makemigration { fields, name, .. } => {
                assert_eq!(fields, vec!["title", "content"]);
                assert_eq!(name, "0001_bm25");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
