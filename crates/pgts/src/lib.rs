//! BM25 full-text search for PostgreSQL through `pg_textsearch`.
//!
//! This crate exposes the `pg_textsearch` extension's BM25 scoring operator
//! (`<@>`) through a small query builder. Scoring, tokenization and index
//! storage all happen inside the database; the crate only renders SQL,
//! executes it through a pooled connection and maps the results.
//!
//! Requires PostgreSQL 17+ with the `pg_textsearch` extension.
//!
//! # Architecture
//!
//! - [`query`] - BM25 expressions and the [`QuerySet`](query::QuerySet) builder
//! - [`model`] - the [`Model`](model::Model) trait and score-annotated results
//! - [`manager`] - [`Bm25SearchManager`](manager::Bm25SearchManager), a model-bound entry point
//! - [`indexes`] - the [`Bm25Index`](indexes::Bm25Index) descriptor
//! - [`migrations`] - extension/index operations, migration artifacts, the migrator
//! - [`checks`] - advisory version and extension checks
//! - [`backend`] - connection pool configuration and query execution
//! - [`error`] - error types
//!
//! # Search
//!
//! Scores are negative and lower is better, so results are ordered ascending.
//!
//! ```
//! use pgts::query::QuerySet;
//!
//! let qs = QuerySet::new("articles")
//!     .bm25_search("postgresql", "content", Some("article_bm25_idx"), Some(10))
//!     .unwrap();
//!
//! let fragment = qs.to_sql().unwrap().unwrap();
//! assert_eq!(
//!     fragment.sql,
//!     "SELECT *, \"content\" <@> to_bm25query($1, $2) AS \"bm25_score\" \
//!      FROM \"articles\" ORDER BY \"bm25_score\" ASC LIMIT 10"
//! );
//!
//! // An empty query never reaches the database
//! let empty = QuerySet::new("articles").bm25_search("", "content", None, None).unwrap();
//! assert!(empty.to_sql().unwrap().is_none());
//! ```
//!
//! # Filtering
//!
//! A score predicate must name the index it binds to:
//!
//! ```
//! use pgts::query::QuerySet;
//!
//! let qs = QuerySet::new("articles")
//!     .bm25_filter("database", "content", "article_bm25_idx", -0.5)
//!     .unwrap();
//! let fragment = qs.to_sql().unwrap().unwrap();
//! assert!(fragment.sql.ends_with("WHERE \"content\" <@> to_bm25query($1, $2) < $3::float8"));
//!
//! assert!(QuerySet::new("articles").bm25_filter("database", "content", "", -0.5).is_err());
//! ```
//!
//! # Running queries
//!
//! ```no_run
//! use pgts::backend::{PostgresConfig, TextsearchBackend};
//! use pgts::query::QuerySet;
//!
//! # async fn main_example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = TextsearchBackend::new(PostgresConfig::from_env()).await?;
//!
//! if !backend.readiness().await?.is_ready() {
//!     eprintln!("pg_textsearch is not available");
//! }
//!
//! let qs = QuerySet::new("articles").bm25_search("postgresql", "content", None, Some(5))?;
//! for row in backend.fetch(&qs).await? {
//!     let score: f64 = row.get("bm25_score");
//!     println!("{score}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backend;
pub mod checks;
pub mod error;
pub mod indexes;
pub mod manager;
pub mod migrations;
pub mod model;
pub mod query;

pub use backend::{PostgresConfig, TextsearchBackend};
pub use checks::{ReadinessReport, get_postgresql_version, is_pg_textsearch_available};
pub use error::{StorageError, StorageResult};
pub use indexes::Bm25Index;
pub use manager::Bm25SearchManager;
pub use migrations::{Migration, Migrator, Operation};
pub use model::{Model, Scored};
pub use query::{Bm25Match, Bm25Query, Bm25Score, QuerySet};
