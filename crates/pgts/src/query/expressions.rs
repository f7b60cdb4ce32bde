//! BM25 expressions over the `pg_textsearch` SQL surface.
//!
//! Scores produced by the `<@>` operator are negative; the lower the score,
//! the stronger the match. Each expression renders with `$N` placeholders
//! starting after a caller-supplied offset so it can be embedded anywhere in
//! a larger statement.

use crate::error::{ValidationError, ValidationResult};

use super::fragment::{SqlFragment, SqlParam, quote_ident, validate_identifier};

/// The `pg_textsearch` scoring operator.
pub const BM25_OPERATOR: &str = "<@>";

/// Function that builds a `bm25query` scalar from text and an index name.
pub const TO_BM25QUERY: &str = "to_bm25query";

/// Anything that renders to a SQL fragment.
pub trait Expression {
    /// Renders the expression, numbering placeholders from `param_offset + 1`.
    fn compile(&self, param_offset: usize) -> SqlFragment;
}

/// `to_bm25query(<query>, <index_name_or_null>)`
#[derive(Debug, Clone, PartialEq)]
pub struct Bm25Query {
    query: String,
    index_name: Option<String>,
}

impl Bm25Query {
    /// Creates a query; without an index name the extension picks the index.
    pub fn new(query: impl Into<String>, index_name: Option<&str>) -> Self {
        Self {
            query: query.into(),
            index_name: index_name.map(str::to_string),
        }
    }

    /// The free-text query.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The explicit index name, if one was given.
    pub fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }
}

impl Expression for Bm25Query {
    fn compile(&self, param_offset: usize) -> SqlFragment {
        SqlFragment::with_params(
            format!(
                "{}(${}, ${})",
                TO_BM25QUERY,
                param_offset + 1,
                param_offset + 2
            ),
            vec![
                SqlParam::text(&self.query),
                SqlParam::opt_text(self.index_name.as_deref()),
            ],
        )
    }
}

/// `"field" <@> to_bm25query(...)`, the relevance score of a row.
#[derive(Debug, Clone, PartialEq)]
pub struct Bm25Score {
    field: String,
    query: Bm25Query,
}

impl Bm25Score {
    /// Scores `field` against `query`.
    pub fn new(field: impl Into<String>, query: impl Into<String>, index_name: Option<&str>) -> Self {
        Self {
            field: field.into(),
            query: Bm25Query::new(query, index_name),
        }
    }

    /// Validates the field and optional index identifiers.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_identifier("column", &self.field)?;
        if let Some(index) = self.query.index_name() {
            validate_identifier("index", index)?;
        }
        Ok(())
    }

    /// The scored column.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The BM25 query being scored against.
    pub fn query(&self) -> &Bm25Query {
        &self.query
    }
}

impl Expression for Bm25Score {
    fn compile(&self, param_offset: usize) -> SqlFragment {
        let query = self.query.compile(param_offset);
        SqlFragment::with_params(
            format!("{} {} {}", quote_ident(&self.field), BM25_OPERATOR, query.sql),
            query.params,
        )
    }
}

/// `"field" <@> to_bm25query(<query>, <index>) < <threshold>::float8`
///
/// A WHERE clause has to bind to a specific index, so the index name is
/// mandatory here.
#[derive(Debug, Clone, PartialEq)]
pub struct Bm25Match {
    score: Bm25Score,
    threshold: f64,
}

impl Bm25Match {
    /// Matches rows scoring strictly below `threshold`.
    pub fn new(
        field: impl Into<String>,
        query: impl Into<String>,
        index_name: &str,
        threshold: f64,
    ) -> ValidationResult<Self> {
        let field = field.into();
        if index_name.trim().is_empty() {
            return Err(ValidationError::MissingIndexName { field });
        }
        let score = Bm25Score::new(field, query, Some(index_name));
        score.validate()?;
        Ok(Self { score, threshold })
    }

    /// The underlying score expression.
    pub fn score(&self) -> &Bm25Score {
        &self.score
    }

    /// The exclusive upper bound on the score.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Expression for Bm25Match {
    fn compile(&self, param_offset: usize) -> SqlFragment {
        let score = self.score.compile(param_offset);
        let mut params = score.params;
        let threshold = SqlParam::Float(self.threshold);
        let placeholder = threshold.placeholder(param_offset + params.len() + 1);
        params.push(threshold);
        SqlFragment::with_params(format!("{} < {}", score.sql, placeholder), params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bm25_query_without_index_binds_null() {
        let fragment = Bm25Query::new("postgresql", None).compile(0);
        assert_eq!(fragment.sql, "to_bm25query($1, $2)");
        assert_eq!(
            fragment.params,
            vec![SqlParam::text("postgresql"), SqlParam::Null]
        );
    }

    #[test]
    fn test_bm25_score_renders_operator() {
        let fragment =
            Bm25Score::new("content", "postgresql", Some("article_bm25_idx")).compile(0);
        assert_eq!(fragment.sql, "\"content\" <@> to_bm25query($1, $2)");
        assert_eq!(fragment.params[1], SqlParam::text("article_bm25_idx"));
    }

    #[test]
    fn test_bm25_score_respects_offset() {
        let fragment = Bm25Score::new("content", "q", None).compile(3);
        assert_eq!(fragment.sql, "\"content\" <@> to_bm25query($4, $5)");
    }

    #[test]
    fn test_bm25_match_includes_index_and_threshold() {
        let m = Bm25Match::new("content", "database", "article_bm25_idx", -0.5).unwrap();
        let fragment = m.compile(1);
        assert_eq!(
            fragment.sql,
            "\"content\" <@> to_bm25query($2, $3) < $4::float8"
        );
        assert_eq!(
            fragment.params,
            vec![
                SqlParam::text("database"),
                SqlParam::text("article_bm25_idx"),
                SqlParam::Float(-0.5),
            ]
        );
    }

    #[test]
    fn test_bm25_match_requires_index_name() {
        let err = Bm25Match::new("content", "database", "", -1.0).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingIndexName {
                field: "content".to_string()
            }
        );
        assert!(Bm25Match::new("content", "database", "   ", -1.0).is_err());
    }

    #[test]
    fn test_bm25_score_validate_rejects_empty_field() {
        let score = Bm25Score::new("", "q", None);
        assert_eq!(
            score.validate(),
            Err(ValidationError::EmptyIdentifier { kind: "column" })
        );
    }
}
