//! Filter compilation seam.
//!
//! The filter predicate language lives outside this crate. The store only
//! depends on the compile contract: a filter tree plus the parameters
//! accumulated so far go in, a SQL boolean expression bound to positional
//! parameters comes out. The expression is spliced into the document query
//! verbatim; the store never interprets it.

use sqlx::postgres::PgArguments;
use sqlx::query::QueryScalar;
use sqlx::Postgres;

use crate::error::Result;

/// Opaque filter expression tree, produced by the caller's filter layer.
pub type FilterNode = serde_json::Value;

/// A parameter value bindable into a query.
#[derive(Debug, Clone)]
pub enum SqlParam {
    Uuid(uuid::Uuid),
    Text(String),
    Int(i64),
    Bool(bool),
    Timestamp(chrono::DateTime<chrono::Utc>),
    Json(serde_json::Value),
}

/// Output of filter compilation.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    /// SQL boolean expression, e.g. `e.meta->>'tag' = $2`.
    pub predicate: String,
    /// Full positional parameter list, accumulated args included.
    pub params: Vec<SqlParam>,
}

/// Compiles a filter tree into a parameterized predicate.
///
/// Positional parameters in the emitted predicate must continue the
/// numbering established by `args` ($1..$n are already taken).
pub trait FilterCompiler: Send + Sync {
    fn compile(&self, filter: &FilterNode, args: Vec<SqlParam>) -> Result<CompiledFilter>;
}

/// Compiler that matches everything. Used by the CLI and by callers that
/// list without a filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl FilterCompiler for AcceptAll {
    fn compile(&self, _filter: &FilterNode, args: Vec<SqlParam>) -> Result<CompiledFilter> {
        Ok(CompiledFilter {
            predicate: "true".to_string(),
            params: args,
        })
    }
}

/// Bind a compiled parameter list onto a scalar query, in order.
pub(crate) fn bind_params<'q, O>(
    query: QueryScalar<'q, Postgres, O, PgArguments>,
    params: &[SqlParam],
) -> QueryScalar<'q, Postgres, O, PgArguments> {
    params.iter().fold(query, |q, p| match p {
        SqlParam::Uuid(v) => q.bind(*v),
        SqlParam::Text(v) => q.bind(v.clone()),
        SqlParam::Int(v) => q.bind(*v),
        SqlParam::Bool(v) => q.bind(*v),
        SqlParam::Timestamp(v) => q.bind(*v),
        SqlParam::Json(v) => q.bind(v.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_all_preserves_accumulated_args() {
        let args = vec![SqlParam::Uuid(uuid::Uuid::new_v4())];
        let compiled = AcceptAll
            .compile(&serde_json::Value::Null, args)
            .unwrap();
        assert_eq!(compiled.predicate, "true");
        assert_eq!(compiled.params.len(), 1);
    }
}
