//! Schema operations that a migration is made of.

use serde::{Deserialize, Serialize};

use crate::error::ValidationResult;
use crate::indexes::Bm25Index;
use crate::query::fragment::{quote_ident, validate_identifier};

/// Name of the extension providing the `bm25` access method and `<@>`.
pub const PG_TEXTSEARCH_EXTENSION: &str = "pg_textsearch";

/// A single reversible schema change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// `CREATE EXTENSION IF NOT EXISTS`
    CreateExtension {
        /// Extension name.
        name: String,
    },
    /// Creates a BM25 index on `table`.
    CreateBm25Index {
        /// Target table.
        table: String,
        /// Index descriptor.
        index: Bm25Index,
    },
    /// Drops a BM25 index from `table`.
    DropBm25Index {
        /// Target table.
        table: String,
        /// Index descriptor, kept so the drop can be reversed.
        index: Bm25Index,
    },
}

impl Operation {
    /// Enables `pg_textsearch`; must precede any BM25 index.
    pub fn create_pg_textsearch_extension() -> Self {
        Self::create_extension(PG_TEXTSEARCH_EXTENSION)
    }

    /// Enables an extension by name.
    pub fn create_extension(name: impl Into<String>) -> Self {
        Operation::CreateExtension { name: name.into() }
    }

    /// Adds `index` to `table`.
    pub fn create_bm25_index(table: impl Into<String>, index: Bm25Index) -> Self {
        Operation::CreateBm25Index {
            table: table.into(),
            index,
        }
    }

    /// Short human-readable description, as printed by `migrate`.
    pub fn describe(&self) -> String {
        match self {
            Operation::CreateExtension { name } => format!("Creates extension {}", name),
            Operation::CreateBm25Index { table, index } => format!(
                "Create BM25 index {} on field(s) {} of table {}",
                index.name,
                index.fields.join(", "),
                table
            ),
            Operation::DropBm25Index { table, index } => {
                format!("Remove BM25 index {} from table {}", index.name, table)
            }
        }
    }

    /// SQL applying this operation.
    pub fn forwards_sql(&self) -> ValidationResult<String> {
        match self {
            Operation::CreateExtension { name } => {
                validate_identifier("extension", name)?;
                Ok(format!("CREATE EXTENSION IF NOT EXISTS {}", quote_ident(name)))
            }
            Operation::CreateBm25Index { table, index } => index.create_sql(table),
            Operation::DropBm25Index { index, .. } => index.remove_sql(),
        }
    }

    /// SQL undoing this operation.
    pub fn backwards_sql(&self) -> ValidationResult<String> {
        match self {
            Operation::CreateExtension { name } => {
                validate_identifier("extension", name)?;
                Ok(format!("DROP EXTENSION IF EXISTS {}", quote_ident(name)))
            }
            Operation::CreateBm25Index { index, .. } => index.remove_sql(),
            Operation::DropBm25Index { table, index } => index.create_sql(table),
        }
    }
}
