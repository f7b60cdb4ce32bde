//! BM25 index descriptor.
//!
//! A [`Bm25Index`] is declared on a model and serialized into a migration
//! artifact. It only produces DDL; the index itself is built and maintained
//! by `pg_textsearch`.

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};
use crate::query::fragment::{quote_ident, quote_literal, validate_identifier};

/// Access method registered by `pg_textsearch`.
pub const BM25_ACCESS_METHOD: &str = "bm25";

/// A `USING bm25` index over one or more text columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bm25Index {
    /// Indexed columns.
    pub fields: Vec<String>,
    /// Index name; also what `to_bm25query` refers to.
    pub name: String,
    /// Operator class per field, or empty for the access method default.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub opclasses: Vec<String>,
    /// Text search configuration used for tokenization (e.g. `english`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_config: Option<String>,
    /// BM25 term frequency saturation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k1: Option<f64>,
    /// BM25 length normalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b: Option<f64>,
}

impl Bm25Index {
    /// Creates an index descriptor.
    pub fn new<S: AsRef<str>>(fields: &[S], name: impl Into<String>) -> Self {
        Self {
            fields: fields.iter().map(|f| f.as_ref().to_string()).collect(),
            name: name.into(),
            opclasses: Vec::new(),
            text_config: None,
            k1: None,
            b: None,
        }
    }

    /// Sets one operator class per field.
    pub fn with_opclasses<S: AsRef<str>>(mut self, opclasses: &[S]) -> Self {
        self.opclasses = opclasses.iter().map(|o| o.as_ref().to_string()).collect();
        self
    }

    /// Sets the text search configuration.
    pub fn with_text_config(mut self, config: impl Into<String>) -> Self {
        self.text_config = Some(config.into());
        self
    }

    /// Sets the `k1` parameter.
    pub fn with_k1(mut self, k1: f64) -> Self {
        self.k1 = Some(k1);
        self
    }

    /// Sets the `b` parameter.
    pub fn with_b(mut self, b: f64) -> Self {
        self.b = Some(b);
        self
    }

    /// Checks the descriptor before any DDL is rendered.
    pub fn check(&self) -> ValidationResult<()> {
        validate_identifier("index", &self.name)?;
        if self.fields.is_empty() {
            return Err(ValidationError::NoIndexFields {
                name: self.name.clone(),
            });
        }
        for field in &self.fields {
            validate_identifier("column", field)?;
        }
        if !self.opclasses.is_empty() && self.opclasses.len() != self.fields.len() {
            return Err(ValidationError::OpclassMismatch {
                name: self.name.clone(),
                fields: self.fields.len(),
                opclasses: self.opclasses.len(),
            });
        }
        for opclass in &self.opclasses {
            validate_identifier("operator class", opclass)?;
        }
        if let Some(config) = &self.text_config {
            validate_identifier("text search configuration", config)?;
        }
        if let Some(k1) = self.k1 {
            if !k1.is_finite() || k1 < 0.0 {
                return Err(ValidationError::InvalidIndexOption {
                    option: "k1",
                    message: format!("{} is not a non-negative number", k1),
                });
            }
        }
        if let Some(b) = self.b {
            if !(0.0..=1.0).contains(&b) {
                return Err(ValidationError::InvalidIndexOption {
                    option: "b",
                    message: format!("{} is outside [0, 1]", b),
                });
            }
        }
        Ok(())
    }

    /// Renders the `WITH (...)` storage parameters, if any were set.
    fn with_clause(&self) -> Option<String> {
        let mut options = Vec::new();
        if let Some(config) = &self.text_config {
            options.push(format!("text_config = {}", quote_literal(config)));
        }
        if let Some(k1) = self.k1 {
            options.push(format!("k1 = {}", k1));
        }
        if let Some(b) = self.b {
            options.push(format!("b = {}", b));
        }
        if options.is_empty() {
            None
        } else {
            Some(format!("WITH ({})", options.join(", ")))
        }
    }

    /// Renders `CREATE INDEX ... USING bm25 (...)` for `table`.
    pub fn create_sql(&self, table: &str) -> ValidationResult<String> {
        validate_identifier("table", table)?;
        self.check()?;

        let columns: Vec<String> = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, field)| match self.opclasses.get(i) {
                Some(opclass) => format!("{} {}", quote_ident(field), quote_ident(opclass)),
                None => quote_ident(field),
            })
            .collect();

        let mut sql = format!(
            "CREATE INDEX {} ON {} USING {} ({})",
            quote_ident(&self.name),
            quote_ident(table),
            BM25_ACCESS_METHOD,
            columns.join(", ")
        );
        if let Some(with) = self.with_clause() {
            sql.push(' ');
            sql.push_str(&with);
        }
        Ok(sql)
    }

    /// Renders `DROP INDEX IF EXISTS ...`.
    pub fn remove_sql(&self) -> ValidationResult<String> {
        validate_identifier("index", &self.name)?;
        Ok(format!("DROP INDEX IF EXISTS {}", quote_ident(&self.name)))
    }
}
