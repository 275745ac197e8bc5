//! Predicate tree rendering
//!
//! Values never reach the SQL text; every value becomes a `?` and is pushed
//! onto the parameter list in the order it appears.

use super::scope::Scope;
use crate::criteria::{Comparison, ComparisonOp, Predicate};
use crate::errors::{Result, TabulaError};
use crate::relations::RelationGraph;
use crate::types::SqlValue;

pub(crate) struct Rendered {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Render a top-level predicate list as one AND-joined condition
///
/// Returns `None` for an empty list.
pub(crate) fn render_filter(
    scope: &Scope<'_>,
    graph: &RelationGraph,
    predicates: &[Predicate],
) -> Result<Option<Rendered>> {
    if predicates.is_empty() {
        return Ok(None);
    }
    let mut params = Vec::new();
    let parts = predicates
        .iter()
        .map(|p| render(scope, graph, p, &mut params))
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(Rendered {
        sql: parts.join(" AND "),
        params,
    }))
}

fn render(
    scope: &Scope<'_>,
    graph: &RelationGraph,
    predicate: &Predicate,
    params: &mut Vec<SqlValue>,
) -> Result<String> {
    match predicate {
        Predicate::Comparison(c) => render_comparison(scope, graph, c, params),
        Predicate::Conjunction(children) => {
            render_group(scope, graph, children, "AND", "1 = 1", params)
        }
        Predicate::Disjunction(children) => {
            render_group(scope, graph, children, "OR", "1 = 0", params)
        }
        Predicate::Negation(child) => Ok(format!("NOT ({})", render(scope, graph, child, params)?)),
    }
}

fn render_group(
    scope: &Scope<'_>,
    graph: &RelationGraph,
    children: &[Predicate],
    joiner: &str,
    empty: &str,
    params: &mut Vec<SqlValue>,
) -> Result<String> {
    if children.is_empty() {
        return Ok(empty.to_string());
    }
    let parts = children
        .iter()
        .map(|c| render(scope, graph, c, params))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("({})", parts.join(&format!(" {} ", joiner))))
}

fn render_comparison(
    scope: &Scope<'_>,
    graph: &RelationGraph,
    comparison: &Comparison,
    params: &mut Vec<SqlValue>,
) -> Result<String> {
    let arity_error = |expected: &str| TabulaError::WrongArity {
        op: comparison.op.name().to_string(),
        column: comparison.column.clone(),
        expected: expected.to_string(),
        actual: comparison.values.len(),
    };
    let count = comparison.values.len();
    match comparison.op {
        ComparisonOp::IsNull if count != 0 => return Err(arity_error("0")),
        ComparisonOp::Between if count != 2 => return Err(arity_error("2")),
        ComparisonOp::In if count == 0 => return Err(arity_error("at least 1")),
        ComparisonOp::Eq
        | ComparisonOp::Ne
        | ComparisonOp::Lt
        | ComparisonOp::Le
        | ComparisonOp::Gt
        | ComparisonOp::Ge
        | ComparisonOp::Like
            if count != 1 =>
        {
            return Err(arity_error("1"));
        }
        _ => {}
    }

    let column = scope.column(graph, &comparison.column)?;
    let sql = match comparison.op {
        ComparisonOp::Eq => format!("{} = ?", column),
        ComparisonOp::Ne => format!("{} <> ?", column),
        ComparisonOp::Lt => format!("{} < ?", column),
        ComparisonOp::Le => format!("{} <= ?", column),
        ComparisonOp::Gt => format!("{} > ?", column),
        ComparisonOp::Ge => format!("{} >= ?", column),
        ComparisonOp::Like => format!("{} LIKE ?", column),
        ComparisonOp::In => format!("{} IN ({})", column, vec!["?"; count].join(", ")),
        ComparisonOp::Between => format!("{} BETWEEN ? AND ?", column),
        ComparisonOp::IsNull => format!("{} IS NULL", column),
    };
    params.extend(comparison.values.iter().cloned());
    Ok(sql)
}
