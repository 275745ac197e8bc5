use crate::types::SqlValue;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    In,
    Between,
    IsNull,
}

impl ComparisonOp {
    pub fn name(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "eq",
            ComparisonOp::Ne => "ne",
            ComparisonOp::Lt => "lt",
            ComparisonOp::Le => "le",
            ComparisonOp::Gt => "gt",
            ComparisonOp::Ge => "ge",
            ComparisonOp::Like => "like",
            ComparisonOp::In => "in",
            ComparisonOp::Between => "between",
            ComparisonOp::IsNull => "isNull",
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A leaf test against one column
///
/// `column` is `"alias.field"` or a bare `"field"` on the root alias. Arity
/// of `values` is checked at compile time, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub op: ComparisonOp,
    pub column: String,
    pub values: Vec<SqlValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Comparison(Comparison),
    Conjunction(Vec<Predicate>),
    Disjunction(Vec<Predicate>),
    Negation(Box<Predicate>),
}

impl Predicate {
    /// Build a comparison with an arbitrary value list
    pub fn comparison(op: ComparisonOp, column: impl Into<String>, values: Vec<SqlValue>) -> Self {
        Predicate::Comparison(Comparison {
            op,
            column: column.into(),
            values,
        })
    }

    fn binary(op: ComparisonOp, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::comparison(op, column, vec![value.into()])
    }

    pub fn eq(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::binary(ComparisonOp::Eq, column, value)
    }

    pub fn ne(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::binary(ComparisonOp::Ne, column, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::binary(ComparisonOp::Lt, column, value)
    }

    pub fn le(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::binary(ComparisonOp::Le, column, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::binary(ComparisonOp::Gt, column, value)
    }

    pub fn ge(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::binary(ComparisonOp::Ge, column, value)
    }

    /// SQL `LIKE` with `%`/`_` wildcards
    pub fn like(column: impl Into<String>, pattern: impl Into<SqlValue>) -> Self {
        Self::binary(ComparisonOp::Like, column, pattern)
    }

    pub fn in_list<V, I>(column: impl Into<String>, values: I) -> Self
    where
        V: Into<SqlValue>,
        I: IntoIterator<Item = V>,
    {
        Self::comparison(
            ComparisonOp::In,
            column,
            values.into_iter().map(Into::into).collect(),
        )
    }

    /// Inclusive range
    pub fn between(
        column: impl Into<String>,
        low: impl Into<SqlValue>,
        high: impl Into<SqlValue>,
    ) -> Self {
        Self::comparison(ComparisonOp::Between, column, vec![low.into(), high.into()])
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::comparison(ComparisonOp::IsNull, column, Vec::new())
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self::not(Self::is_null(column))
    }

    pub fn and(children: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Conjunction(children.into_iter().collect())
    }

    pub fn or(children: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Disjunction(children.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: Predicate) -> Self {
        Predicate::Negation(Box::new(child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(
            Predicate::eq("name", "john"),
            Predicate::Comparison(Comparison {
                op: ComparisonOp::Eq,
                column: "name".to_string(),
                values: vec![SqlValue::Text("john".to_string())],
            })
        );

        let Predicate::Comparison(c) = Predicate::in_list("id", [1i64, 2, 3]) else {
            panic!("expected comparison");
        };
        assert_eq!(c.values.len(), 3);

        let Predicate::Negation(inner) = Predicate::is_not_null("b.title") else {
            panic!("expected negation");
        };
        assert_eq!(*inner, Predicate::is_null("b.title"));
    }
}
