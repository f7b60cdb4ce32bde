//! Model-bound entry point for BM25 search.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::backend::TextsearchBackend;
use crate::error::{StorageResult, ValidationResult};
use crate::migrations::{Migration, Operation};
use crate::model::{Model, Scored};
use crate::query::{DEFAULT_THRESHOLD, QuerySet};

/// BM25 search over the table of model `M`.
///
/// The search methods build [`QuerySet`]s; nothing runs until one of the
/// `fetch*`, [`count`](Self::count) or [`exists`](Self::exists) methods is called.
pub struct Bm25SearchManager<M> {
    backend: Arc<TextsearchBackend>,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for Bm25SearchManager<M> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            _model: PhantomData,
        }
    }
}

impl<M> std::fmt::Debug for Bm25SearchManager<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bm25SearchManager")
            .field("model", &std::any::type_name::<M>())
            .finish_non_exhaustive()
    }
}

impl<M: Model> Bm25SearchManager<M> {
    /// Binds the manager to a backend.
    pub fn new(backend: Arc<TextsearchBackend>) -> Self {
        Self {
            backend,
            _model: PhantomData,
        }
    }

    /// The shared backend.
    pub fn backend(&self) -> &Arc<TextsearchBackend> {
        &self.backend
    }

    /// All rows of the model's table, selecting the model's columns.
    pub fn get_queryset(&self) -> QuerySet {
        QuerySet::new(M::TABLE).only(M::COLUMNS)
    }

    /// See [`QuerySet::bm25_search`].
    pub fn bm25_search(
        &self,
        query: &str,
        field: &str,
        index_name: Option<&str>,
        limit: Option<usize>,
    ) -> ValidationResult<QuerySet> {
        self.get_queryset().bm25_search(query, field, index_name, limit)
    }

    /// See [`QuerySet::bm25_filter`].
    pub fn bm25_filter(
        &self,
        query: &str,
        field: &str,
        index_name: &str,
        threshold: Option<f64>,
    ) -> ValidationResult<QuerySet> {
        self.get_queryset().bm25_filter(
            query,
            field,
            index_name,
            threshold.unwrap_or(DEFAULT_THRESHOLD),
        )
    }

    /// Loads the records a query set selects.
    pub async fn fetch(&self, qs: &QuerySet) -> StorageResult<Vec<M>> {
        self.backend.fetch_as(qs).await
    }

    /// Loads records with their `bm25_score`, best match first.
    pub async fn fetch_scored(&self, qs: &QuerySet) -> StorageResult<Vec<Scored<M>>> {
        self.backend.fetch_scored(qs).await
    }

    /// Runs [`bm25_search`](Self::bm25_search) and loads the scored records.
    pub async fn search(
        &self,
        query: &str,
        field: &str,
        index_name: Option<&str>,
        limit: Option<usize>,
    ) -> StorageResult<Vec<Scored<M>>> {
        let qs = self.bm25_search(query, field, index_name, limit)?;
        self.fetch_scored(&qs).await
    }

    /// Counts the rows a query set would return.
    pub async fn count(&self, qs: &QuerySet) -> StorageResult<u64> {
        self.backend.count(qs).await
    }

    /// Whether a query set returns at least one row.
    pub async fn exists(&self, qs: &QuerySet) -> StorageResult<bool> {
        self.backend.exists(qs).await
    }

    /// Builds a migration enabling the extension and creating every index
    /// the model declares.
    pub fn makemigration(name: impl Into<String>) -> Migration {
        M::indexes().into_iter().fold(
            Migration::new(name).with_operation(Operation::create_pg_textsearch_extension()),
            |migration, index| {
                migration.with_operation(Operation::create_bm25_index(M::TABLE, index))
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexes::Bm25Index;

    struct Article;

    impl Model for Article {
        const TABLE: &'static str = "articles";
        const COLUMNS: &'static [&'static str] = &["id", "title", "content"];

        fn from_row(_row: &tokio_postgres::Row) -> Result<Self, tokio_postgres::Error> {
            Ok(Article)
        }

        fn indexes() -> Vec<Bm25Index> {
            vec![
                Bm25Index::new(&["content"], "article_content_bm25"),
                Bm25Index::new(&["title"], "article_title_bm25"),
            ]
        }
    }

    #[test]
    fn test_makemigration_orders_extension_first() {
        let migration = Bm25SearchManager::<Article>::makemigration("0001_article_bm25");
        assert_eq!(migration.operations.len(), 3);
        assert_eq!(
            migration.operations[0],
            Operation::create_pg_textsearch_extension()
        );
        let sql = migration.forwards_sql().unwrap();
        assert_eq!(
            sql[1],
            "CREATE INDEX \"article_content_bm25\" ON \"articles\" USING bm25 (\"content\")"
        );
        assert!(sql[2].contains("\"article_title_bm25\""));
    }
}
