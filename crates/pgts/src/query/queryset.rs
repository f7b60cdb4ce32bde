//! Lazily compiled SELECT statements with BM25 search methods.
//!
//! A [`QuerySet`] never touches the database on its own; it compiles to a
//! [`SqlFragment`] that the backend executes. An empty query set (see
//! [`QuerySet::none`]) compiles to nothing and the backend short-circuits it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationResult;

use super::expressions::{Bm25Match, Bm25Score, Expression};
use super::fragment::{SqlFragment, SqlParam, quote_ident, validate_identifier};

/// Alias of the score column added by [`QuerySet::bm25_search`].
pub const SCORE_ANNOTATION: &str = "bm25_score";

/// Threshold used by [`QuerySet::bm25_filter_default`].
pub const DEFAULT_THRESHOLD: f64 = -1.0;

/// Comparison used by [`QuerySet::filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lookup {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Lookup {
    /// The SQL comparison operator.
    pub fn operator(&self) -> &'static str {
        match self {
            Lookup::Eq => "=",
            Lookup::Ne => "!=",
            Lookup::Lt => "<",
            Lookup::Le => "<=",
            Lookup::Gt => ">",
            Lookup::Ge => ">=",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending; the natural order for BM25 scores.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => write!(f, "ASC"),
            Direction::Desc => write!(f, "DESC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Selection {
    All,
    Columns(Vec<String>),
    TextColumns(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
enum Filter {
    Match(Bm25Match),
    Compare {
        column: String,
        lookup: Lookup,
        value: SqlParam,
    },
}

impl Filter {
    fn validate(&self) -> ValidationResult<()> {
        match self {
            Filter::Match(m) => m.score().validate(),
            Filter::Compare { column, .. } => validate_identifier("column", column),
        }
    }

    fn compile(&self, param_offset: usize) -> SqlFragment {
        match self {
            Filter::Match(m) => m.compile(param_offset),
            Filter::Compare {
                column,
                lookup,
                value,
            } => SqlFragment::with_params(
                format!(
                    "{} {} {}",
                    quote_ident(column),
                    lookup.operator(),
                    value.placeholder(param_offset + 1)
                ),
                vec![value.clone()],
            ),
        }
    }
}

/// A SELECT over one table with optional BM25 annotations and filters.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySet {
    table: String,
    selection: Selection,
    annotations: Vec<(String, Bm25Score)>,
    filters: Vec<Filter>,
    ordering: Vec<(String, Direction)>,
    limit: Option<usize>,
    offset: Option<usize>,
    empty: bool,
}

impl QuerySet {
    /// Selects every column of `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            selection: Selection::All,
            annotations: Vec::new(),
            filters: Vec::new(),
            ordering: Vec::new(),
            limit: None,
            offset: None,
            empty: false,
        }
    }

    /// The queried table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns a query set that yields no rows and is never sent to the database.
    pub fn none(mut self) -> Self {
        self.empty = true;
        self
    }

    /// Whether this query set was emptied by [`none`](Self::none).
    pub fn is_none(&self) -> bool {
        self.empty
    }

    /// Restricts the select list to `columns`.
    pub fn only<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.selection = Selection::Columns(columns.iter().map(|c| c.as_ref().to_string()).collect());
        self
    }

    /// Restricts the select list to `columns`, each cast to `text`.
    pub fn only_as_text<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.selection =
            Selection::TextColumns(columns.iter().map(|c| c.as_ref().to_string()).collect());
        self
    }

    /// Adds a computed score column named `alias`, replacing any annotation
    /// with the same alias.
    pub fn annotate(mut self, alias: impl Into<String>, score: Bm25Score) -> Self {
        let alias = alias.into();
        self.annotations.retain(|(existing, _)| *existing != alias);
        self.annotations.push((alias, score));
        self
    }

    /// Adds `column <op> value` to the WHERE clause.
    pub fn filter(mut self, column: impl Into<String>, lookup: Lookup, value: impl Into<SqlParam>) -> Self {
        self.filters.push(Filter::Compare {
            column: column.into(),
            lookup,
            value: value.into(),
        });
        self
    }

    /// Adds a BM25 score predicate to the WHERE clause.
    pub fn filter_match(mut self, matcher: Bm25Match) -> Self {
        self.filters.push(Filter::Match(matcher));
        self
    }

    /// Replaces the ordering with a single column or annotation alias.
    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.ordering = vec![(column.into(), direction)];
        self
    }

    /// Appends a secondary ordering.
    pub fn then_order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.ordering.push((column.into(), direction));
        self
    }

    /// Caps the number of rows. Limits only ever narrow.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(self.limit.map_or(n, |current| current.min(n)));
        self
    }

    /// Skips the first `n` rows.
    pub fn offset(mut self, n: usize) -> Self {
        self.offset = Some(n);
        self
    }

    /// Ranks rows by BM25 relevance against `field`.
    ///
    /// Annotates each row with [`SCORE_ANNOTATION`] and orders ascending, since
    /// lower scores are better matches. An empty `query` yields [`none`](Self::none).
    /// `limit` of `None` or `Some(0)` leaves the result unbounded.
    pub fn bm25_search(
        self,
        query: &str,
        field: &str,
        index_name: Option<&str>,
        limit: Option<usize>,
    ) -> ValidationResult<Self> {
        if query.is_empty() {
            return Ok(self.none());
        }

        let score = Bm25Score::new(field, query, index_name);
        score.validate()?;

        let mut qs = self
            .annotate(SCORE_ANNOTATION, score)
            .order_by(SCORE_ANNOTATION, Direction::Asc);

        if let Some(n) = limit.filter(|n| *n > 0) {
            qs = qs.limit(n);
        }

        Ok(qs)
    }

    /// Keeps rows whose BM25 score against `field` is below `threshold`.
    ///
    /// The index name is required because the predicate binds to one index;
    /// an empty name is rejected even when `query` is empty.
    pub fn bm25_filter(
        self,
        query: &str,
        field: &str,
        index_name: &str,
        threshold: f64,
    ) -> ValidationResult<Self> {
        let matcher = Bm25Match::new(field, query, index_name, threshold)?;

        if query.is_empty() {
            return Ok(self.none());
        }

        Ok(self.filter_match(matcher))
    }

    /// [`bm25_filter`](Self::bm25_filter) with [`DEFAULT_THRESHOLD`].
    pub fn bm25_filter_default(
        self,
        query: &str,
        field: &str,
        index_name: &str,
    ) -> ValidationResult<Self> {
        self.bm25_filter(query, field, index_name, DEFAULT_THRESHOLD)
    }

    fn validate(&self) -> ValidationResult<()> {
        validate_identifier("table", &self.table)?;
        match &self.selection {
            Selection::All => {}
            Selection::Columns(cols) | Selection::TextColumns(cols) => {
                for col in cols {
                    validate_identifier("column", col)?;
                }
            }
        }
        for (alias, score) in &self.annotations {
            validate_identifier("annotation", alias)?;
            score.validate()?;
        }
        for filter in &self.filters {
            filter.validate()?;
        }
        for (column, _) in &self.ordering {
            validate_identifier("column", column)?;
        }
        Ok(())
    }

    /// Compiles the statement, or `None` for an empty query set.
    pub fn to_sql(&self) -> ValidationResult<Option<SqlFragment>> {
        if self.empty {
            return Ok(None);
        }
        self.validate()?;

        let mut params = Vec::new();

        let mut select: Vec<String> = match &self.selection {
            Selection::All => vec!["*".to_string()],
            Selection::Columns(cols) => cols.iter().map(|c| quote_ident(c)).collect(),
            Selection::TextColumns(cols) => cols
                .iter()
                .map(|c| format!("{}::text AS {}", quote_ident(c), quote_ident(c)))
                .collect(),
        };

        for (alias, score) in &self.annotations {
            let fragment = score.compile(params.len());
            select.push(format!("{} AS {}", fragment.sql, quote_ident(alias)));
            params.extend(fragment.params);
        }

        let mut sql = format!("SELECT {} FROM {}", select.join(", "), quote_ident(&self.table));

        let mut where_clause: Option<SqlFragment> = None;
        for filter in &self.filters {
            let fragment = filter.compile(params.len() + where_clause.as_ref().map_or(0, |w| w.params.len()));
            where_clause = Some(match where_clause {
                Some(existing) => existing.and(fragment),
                None => fragment,
            });
        }
        if let Some(clause) = where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&clause.sql);
            params.extend(clause.params);
        }

        if !self.ordering.is_empty() {
            let order: Vec<String> = self
                .ordering
                .iter()
                .map(|(col, dir)| format!("{} {}", quote_ident(col), dir))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        Ok(Some(SqlFragment::with_params(sql, params)))
    }

    /// Compiles `SELECT COUNT(*)` over this query set, honouring its limit.
    pub fn count_sql(&self) -> ValidationResult<Option<SqlFragment>> {
        Ok(self.to_sql()?.map(|inner| {
            SqlFragment::with_params(
                format!("SELECT COUNT(*) FROM ({}) AS q", inner.sql),
                inner.params,
            )
        }))
    }

    /// Compiles `SELECT EXISTS (...)` over this query set.
    pub fn exists_sql(&self) -> ValidationResult<Option<SqlFragment>> {
        Ok(self.to_sql()?.map(|inner| {
            SqlFragment::with_params(format!("SELECT EXISTS ({})", inner.sql), inner.params)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn test_plain_select() {
        let fragment = QuerySet::new("articles").to_sql().unwrap().unwrap();
        assert_eq!(fragment.sql, "SELECT * FROM \"articles\"");
        assert!(fragment.params.is_empty());
    }

    #[test]
    fn test_bm25_search_shape() {
        let qs = QuerySet::new("articles")
            .bm25_search("postgresql", "content", None, None)
            .unwrap();
        let fragment = qs.to_sql().unwrap().unwrap();
        assert_eq!(
            fragment.sql,
            "SELECT *, \"content\" <@> to_bm25query($1, $2) AS \"bm25_score\" FROM \"articles\" ORDER BY \"bm25_score\" ASC"
        );
        assert_eq!(
            fragment.params,
            vec![SqlParam::text("postgresql"), SqlParam::Null]
        );
    }

    #[test]
    fn test_bm25_search_empty_query_is_none() {
        let qs = QuerySet::new("articles")
            .bm25_search("", "content", None, Some(5))
            .unwrap();
        assert!(qs.is_none());
        assert!(qs.to_sql().unwrap().is_none());
        assert!(qs.count_sql().unwrap().is_none());
    }

    #[test]
    fn test_bm25_search_with_index_and_limit() {
        let qs = QuerySet::new("articles")
            .bm25_search("database", "content", Some("article_bm25_idx"), Some(2))
            .unwrap();
        let fragment = qs.to_sql().unwrap().unwrap();
        assert!(fragment.sql.ends_with("ORDER BY \"bm25_score\" ASC LIMIT 2"));
        assert_eq!(fragment.params[1], SqlParam::text("article_bm25_idx"));
    }

    #[test]
    fn test_bm25_search_zero_limit_is_unbounded() {
        let qs = QuerySet::new("articles")
            .bm25_search("database", "content", None, Some(0))
            .unwrap();
        let fragment = qs.to_sql().unwrap().unwrap();
        assert!(!fragment.sql.contains("LIMIT"));
    }

    #[test]
    fn test_limits_only_narrow() {
        let qs = QuerySet::new("articles").limit(10).limit(3).limit(7);
        let fragment = qs.to_sql().unwrap().unwrap();
        assert!(fragment.sql.ends_with("LIMIT 3"));
    }

    #[test]
    fn test_bm25_filter_shape() {
        let qs = QuerySet::new("articles")
            .bm25_filter("database", "content", "article_content_bm25", -0.5)
            .unwrap();
        let fragment = qs.to_sql().unwrap().unwrap();
        assert_eq!(
            fragment.sql,
            "SELECT * FROM \"articles\" WHERE \"content\" <@> to_bm25query($1, $2) < $3::float8"
        );
        assert_eq!(
            fragment.params,
            vec![
                SqlParam::text("database"),
                SqlParam::text("article_content_bm25"),
                SqlParam::Float(-0.5),
            ]
        );
    }

    #[test]
    fn test_bm25_filter_default_threshold() {
        let qs = QuerySet::new("articles")
            .bm25_filter_default("database", "content", "idx")
            .unwrap();
        let fragment = qs.to_sql().unwrap().unwrap();
        assert_eq!(fragment.params[2], SqlParam::Float(DEFAULT_THRESHOLD));
    }

    #[test]
    fn test_bm25_filter_rejects_missing_index() {
        let err = QuerySet::new("articles")
            .bm25_filter("database", "content", "", -1.0)
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingIndexName { .. }));

        // Still a caller error when the query is empty
        assert!(
            QuerySet::new("articles")
                .bm25_filter("", "content", "", -1.0)
                .is_err()
        );
    }

    #[test]
    fn test_bm25_filter_empty_query_is_none() {
        let qs = QuerySet::new("articles")
            .bm25_filter("", "content", "idx", -1.0)
            .unwrap();
        assert!(qs.is_none());
    }

    #[test]
    fn test_search_then_filter_numbers_placeholders() {
        let qs = QuerySet::new("articles")
            .filter("published", Lookup::Eq, true)
            .bm25_search("postgresql", "content", Some("idx"), Some(10))
            .unwrap()
            .bm25_filter("postgresql", "content", "idx", -0.1)
            .unwrap();
        let fragment = qs.to_sql().unwrap().unwrap();
        assert_eq!(
            fragment.sql,
            "SELECT *, \"content\" <@> to_bm25query($1, $2) AS \"bm25_score\" FROM \"articles\" \
             WHERE (\"published\" = $3::bool) AND (\"content\" <@> to_bm25query($4, $5) < $6::float8) \
             ORDER BY \"bm25_score\" ASC LIMIT 10"
        );
        assert_eq!(fragment.params.len(), 6);
        assert_eq!(fragment.params[2], SqlParam::Bool(true));
        assert_eq!(fragment.params[5], SqlParam::Float(-0.1));
    }

    #[test]
    fn test_annotate_replaces_same_alias() {
        let qs = QuerySet::new("articles")
            .annotate("score", Bm25Score::new("content", "a", None))
            .annotate("score", Bm25Score::new("content", "b", None))
            .order_by("score", Direction::Asc);
        let fragment = qs.to_sql().unwrap().unwrap();
        assert_eq!(fragment.sql.matches("AS \"score\"").count(), 1);
        assert_eq!(fragment.params[0], SqlParam::text("b"));
    }

    #[test]
    fn test_only_as_text_and_offset() {
        let qs = QuerySet::new("articles")
            .only_as_text(&["id", "title"])
            .order_by("id", Direction::Desc)
            .offset(5);
        let fragment = qs.to_sql().unwrap().unwrap();
        assert_eq!(
            fragment.sql,
            "SELECT \"id\"::text AS \"id\", \"title\"::text AS \"title\" FROM \"articles\" ORDER BY \"id\" DESC OFFSET 5"
        );
    }

    #[test]
    fn test_count_sql_wraps_limited_query() {
        let qs = QuerySet::new("articles")
            .bm25_search("database", "content", None, Some(2))
            .unwrap();
        let fragment = qs.count_sql().unwrap().unwrap();
        assert!(fragment.sql.starts_with("SELECT COUNT(*) FROM (SELECT"));
        assert!(fragment.sql.ends_with("LIMIT 2) AS q"));
    }

    #[test]
    fn test_invalid_identifier_fails_compile() {
        let qs = QuerySet::new("articles").filter("", Lookup::Eq, 1i64);
        assert!(qs.to_sql().is_err());
    }
}
