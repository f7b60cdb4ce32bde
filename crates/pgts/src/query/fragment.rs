//! SQL fragments with `$N` placeholders and their bound parameters.

use chrono::{DateTime, Utc};
use tokio_postgres::types::ToSql;

use crate::error::{ValidationError, ValidationResult};

/// PostgreSQL truncates identifiers longer than this (NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// A SQL fragment with associated parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    /// The SQL string with $N placeholders.
    pub sql: String,
    /// The parameter values.
    pub params: Vec<SqlParam>,
}

/// A SQL parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// Text parameter.
    Text(String),
    /// Floating point parameter.
    Float(f64),
    /// Integer parameter.
    Integer(i64),
    /// Boolean parameter.
    Bool(bool),
    /// Timestamp parameter.
    Timestamp(DateTime<Utc>),
    /// Null parameter, bound as a NULL text value.
    Null,
}

impl SqlParam {
    /// Creates a text parameter.
    pub fn text(s: &str) -> Self {
        SqlParam::Text(s.to_string())
    }

    /// Creates a text parameter, or NULL when absent.
    pub fn opt_text(s: Option<&str>) -> Self {
        s.map(SqlParam::text).unwrap_or(SqlParam::Null)
    }

    /// The PostgreSQL type this parameter is bound as.
    pub fn pg_type(&self) -> &'static str {
        match self {
            SqlParam::Text(_) | SqlParam::Null => "text",
            SqlParam::Float(_) => "float8",
            SqlParam::Integer(_) => "int8",
            SqlParam::Bool(_) => "bool",
            SqlParam::Timestamp(_) => "timestamptz",
        }
    }

    /// Renders `$n` with an explicit cast to [`pg_type`](Self::pg_type).
    ///
    /// Without the cast the server infers the parameter type from the other
    /// operand, e.g. `int4` for a SERIAL column, which an `i64` cannot be
    /// bound to.
    pub fn placeholder(&self, n: usize) -> String {
        format!("${}::{}", n, self.pg_type())
    }

    fn boxed(&self) -> Box<dyn ToSql + Sync + Send> {
        match self {
            SqlParam::Text(s) => Box::new(s.clone()),
            SqlParam::Float(f) => Box::new(*f),
            SqlParam::Integer(i) => Box::new(*i),
            SqlParam::Bool(b) => Box::new(*b),
            SqlParam::Timestamp(dt) => Box::new(*dt),
            SqlParam::Null => Box::new(Option::<String>::None),
        }
    }
}

impl From<&str> for SqlParam {
    fn from(s: &str) -> Self {
        SqlParam::text(s)
    }
}

impl From<String> for SqlParam {
    fn from(s: String) -> Self {
        SqlParam::Text(s)
    }
}

impl From<f64> for SqlParam {
    fn from(f: f64) -> Self {
        SqlParam::Float(f)
    }
}

impl From<i64> for SqlParam {
    fn from(i: i64) -> Self {
        SqlParam::Integer(i)
    }
}

impl From<bool> for SqlParam {
    fn from(b: bool) -> Self {
        SqlParam::Bool(b)
    }
}

impl From<DateTime<Utc>> for SqlParam {
    fn from(dt: DateTime<Utc>) -> Self {
        SqlParam::Timestamp(dt)
    }
}

impl SqlFragment {
    /// Creates a fragment with parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Combines two fragments with AND.
    pub fn and(self, other: SqlFragment) -> SqlFragment {
        SqlFragment {
            sql: format!("({}) AND ({})", self.sql, other.sql),
            params: [self.params, other.params].concat(),
        }
    }

    /// Boxes the parameters for a `tokio_postgres` call.
    ///
    /// Borrow the result with [`param_refs`] when executing.
    pub fn boxed_params(&self) -> Vec<Box<dyn ToSql + Sync + Send>> {
        self.params.iter().map(SqlParam::boxed).collect()
    }
}

/// Borrows boxed parameters in the shape `tokio_postgres` expects.
pub fn param_refs(params: &[Box<dyn ToSql + Sync + Send>]) -> Vec<&(dyn ToSql + Sync)> {
    params
        .iter()
        .map(|p| p.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

/// Checks that an identifier is usable before it is quoted into SQL.
pub fn validate_identifier(kind: &'static str, name: &str) -> ValidationResult<()> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyIdentifier { kind });
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::IdentifierTooLong {
            kind,
            name: name.to_string(),
            max: MAX_IDENTIFIER_LEN,
        });
    }
    Ok(())
}

/// Quotes an identifier, doubling embedded quotes.
///
/// `schema.table` style names are quoted per segment.
pub fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Quotes a string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
