//! Models mapped to a table, and score-annotated results.

use tokio_postgres::Row;

use crate::indexes::Bm25Index;

/// A record type stored in one table.
///
/// ```
/// use pgts::indexes::Bm25Index;
/// use pgts::model::Model;
///
/// struct Article {
///     id: i32,
///     title: String,
///     content: String,
/// }
///
/// impl Model for Article {
///     const TABLE: &'static str = "articles";
///     const COLUMNS: &'static [&'static str] = &["id", "title", "content"];
///
///     fn from_row(row: &tokio_postgres::Row) -> Result<Self, tokio_postgres::Error> {
///         Ok(Self {
///             id: row.try_get("id")?,
///             title: row.try_get("title")?,
///             content: row.try_get("content")?,
///         })
///     }
///
///     fn indexes() -> Vec<Bm25Index> {
///         vec![Bm25Index::new(&["content"], "article_bm25_idx")]
///     }
/// }
/// ```
pub trait Model: Sized {
    /// Table name.
    const TABLE: &'static str;

    /// Columns selected when loading the model.
    const COLUMNS: &'static [&'static str];

    /// Builds the model from a result row.
    fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error>;

    /// BM25 indexes declared on the table.
    fn indexes() -> Vec<Bm25Index> {
        Vec::new()
    }
}

/// A record paired with its BM25 score. Lower scores are better matches.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<M> {
    /// The loaded record.
    pub record: M,
    /// The score computed by `<@>` for this query.
    pub score: f64,
}

impl<M: Model> Scored<M> {
    /// Reads the record and the score column named `alias`.
    pub fn from_row(row: &Row, alias: &str) -> Result<Self, tokio_postgres::Error> {
        Ok(Self {
            record: M::from_row(row)?,
            score: row.try_get(alias)?,
        })
    }
}
