//! SQL predicate expressions.
//!
//! A compact expression tree for the WHERE clauses the write path emits:
//! comparisons, IN lists, NULL checks, and boolean combinators. Rendering
//! produces dialect-specific SQL plus the bound parameters.

use relwrite_core::{Dialect, Value};

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    const fn as_sql(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

/// A SQL predicate expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column compared against a bound value.
    Binary {
        column: String,
        op: BinaryOp,
        value: Value,
    },

    /// Column IN (values) / NOT IN (values).
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },

    /// Column IS NULL / IS NOT NULL.
    IsNull { column: String, negated: bool },

    /// Both sides must hold.
    And(Box<Expr>, Box<Expr>),

    /// Either side must hold.
    Or(Box<Expr>, Box<Expr>),

    /// Negation.
    Not(Box<Expr>),
}

impl Expr {
    /// `column = value`
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Expr::Binary {
            column: column.into(),
            op: BinaryOp::Eq,
            value: value.into(),
        }
    }

    /// `column <> value`
    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Expr::Binary {
            column: column.into(),
            op: BinaryOp::Ne,
            value: value.into(),
        }
    }

    /// `column < value`
    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Expr::Binary {
            column: column.into(),
            op: BinaryOp::Lt,
            value: value.into(),
        }
    }

    /// `column > value`
    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Expr::Binary {
            column: column.into(),
            op: BinaryOp::Gt,
            value: value.into(),
        }
    }

    /// `column IN (values)`
    pub fn in_values(column: impl Into<String>, values: Vec<Value>) -> Self {
        Expr::In {
            column: column.into(),
            values,
            negated: false,
        }
    }

    /// `column IS NULL`
    pub fn is_null(column: impl Into<String>) -> Self {
        Expr::IsNull {
            column: column.into(),
            negated: false,
        }
    }

    /// Combine with AND.
    #[must_use]
    pub fn and(self, other: Expr) -> Self {
        Expr::And(Box::new(self), Box::new(other))
    }

    /// Combine with OR.
    #[must_use]
    pub fn or(self, other: Expr) -> Self {
        Expr::Or(Box::new(self), Box::new(other))
    }

    /// Negate.
    #[must_use]
    pub fn negate(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Render to SQL with dialect placeholders.
    ///
    /// `param_offset` is the number of parameters already bound by the
    /// surrounding statement; returned placeholders continue from there.
    pub fn render(&self, dialect: Dialect, param_offset: usize) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = self.render_into(dialect, param_offset, &mut params);
        (sql, params)
    }

    fn render_into(
        &self,
        dialect: Dialect,
        param_offset: usize,
        params: &mut Vec<Value>,
    ) -> String {
        match self {
            Expr::Binary { column, op, value } => {
                params.push(value.clone());
                format!(
                    "{} {} {}",
                    dialect.quote_identifier(column),
                    op.as_sql(),
                    dialect.placeholder(param_offset + params.len())
                )
            }
            Expr::In {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    // Empty IN matches nothing; NOT IN () matches everything.
                    return if *negated { "1 = 1" } else { "1 = 0" }.to_string();
                }
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|value| {
                        params.push(value.clone());
                        dialect.placeholder(param_offset + params.len())
                    })
                    .collect();
                format!(
                    "{} {}IN ({})",
                    dialect.quote_identifier(column),
                    if *negated { "NOT " } else { "" },
                    placeholders.join(", ")
                )
            }
            Expr::IsNull { column, negated } => format!(
                "{} IS {}NULL",
                dialect.quote_identifier(column),
                if *negated { "NOT " } else { "" }
            ),
            Expr::And(left, right) => {
                let left_sql = left.render_into(dialect, param_offset, params);
                let right_sql = right.render_into(dialect, param_offset, params);
                format!("({left_sql} AND {right_sql})")
            }
            Expr::Or(left, right) => {
                let left_sql = left.render_into(dialect, param_offset, params);
                let right_sql = right.render_into(dialect, param_offset, params);
                format!("({left_sql} OR {right_sql})")
            }
            Expr::Not(inner) => {
                let inner_sql = inner.render_into(dialect, param_offset, params);
                format!("NOT ({inner_sql})")
            }
        }
    }
}
