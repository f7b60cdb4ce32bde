//! Schema migrations for BM25 indexes.
//!
//! A [`Migration`] is a named, ordered list of [`Operation`]s. It is written
//! once as a JSON artifact and applied at most once per database by the
//! [`Migrator`], which records applied names in `pgts_migrations`.
//!
//! ```
//! use pgts::indexes::Bm25Index;
//! use pgts::migrations::{Migration, Operation};
//!
//! let migration = Migration::new("0001_article_bm25")
//!     .with_operation(Operation::create_pg_textsearch_extension())
//!     .with_operation(Operation::create_bm25_index(
//!         "articles",
//!         Bm25Index::new(&["content"], "article_bm25_idx"),
//!     ));
//!
//! let sql = migration.forwards_sql().unwrap();
//! assert_eq!(sql[0], "CREATE EXTENSION IF NOT EXISTS \"pg_textsearch\"");
//! ```

mod migrator;
mod operations;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MigrationError, StorageResult, ValidationResult};

pub use migrator::Migrator;
pub use operations::{Operation, PG_TEXTSEARCH_EXTENSION};

/// A named list of operations applied together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Migration {
    /// Unique migration name, e.g. `0001_article_bm25`.
    pub name: String,
    /// Operations in application order.
    pub operations: Vec<Operation>,
}

impl Migration {
    /// Creates an empty migration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operations: Vec::new(),
        }
    }

    /// Appends an operation.
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Forward SQL, one statement per operation.
    pub fn forwards_sql(&self) -> ValidationResult<Vec<String>> {
        self.operations.iter().map(Operation::forwards_sql).collect()
    }

    /// Backward SQL in reverse operation order.
    pub fn backwards_sql(&self) -> ValidationResult<Vec<String>> {
        self.operations
            .iter()
            .rev()
            .map(Operation::backwards_sql)
            .collect()
    }

    /// Writes the migration as pretty-printed JSON.
    pub fn write_to(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| MigrationError::Artifact {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Loads a migration artifact written by [`write_to`](Self::write_to).
    pub fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| MigrationError::Artifact {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let migration: Migration =
            serde_json::from_str(&json).map_err(|e| MigrationError::Artifact {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(migration)
    }
}
