//! Query building for BM25 search.
//!
//! Expressions render the `pg_textsearch` operator surface with `$N`
//! placeholders; [`QuerySet`] composes them into a full SELECT.

pub mod expressions;
pub mod fragment;
pub mod queryset;

pub use expressions::{BM25_OPERATOR, Bm25Match, Bm25Query, Bm25Score, Expression, TO_BM25QUERY};
pub use fragment::{SqlFragment, SqlParam, quote_ident, quote_literal};
pub use queryset::{DEFAULT_THRESHOLD, Direction, Lookup, QuerySet, SCORE_ANNOTATION};
