//! Predicates for `WHERE` and `ON` clauses.

use crate::ident::{Column, Quoter};
use crate::sql::Sql;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
enum ConditionValue {
    Single(Value),
    Pair(Value, Value),
    List(Vec<Value>),
    None,
}

#[derive(Debug, Clone, PartialEq)]
enum ConditionInner {
    /// Raw SQL predicate. Rendered in parentheses.
    Raw(String),
    Expr {
        column: Column,
        operator: &'static str,
        value: ConditionValue,
    },
    /// `left = right` over two column references.
    ColumnEq { left: Column, right: Column },
}

/// A single predicate. Multiple conditions are joined with `AND`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition(ConditionInner);

impl Condition {
    fn expr(column: impl Into<Column>, operator: &'static str, value: ConditionValue) -> Self {
        Condition(ConditionInner::Expr {
            column: column.into(),
            operator,
            value,
        })
    }

    /// Raw SQL predicate.
    ///
    /// The text is inserted verbatim; never build it from untrusted input.
    pub fn raw(sql: impl Into<String>) -> Self {
        Condition(ConditionInner::Raw(sql.into()))
    }

    pub fn eq(column: impl Into<Column>, value: impl Into<Value>) -> Self {
        Self::expr(column, "=", ConditionValue::Single(value.into()))
    }

    pub fn ne(column: impl Into<Column>, value: impl Into<Value>) -> Self {
        Self::expr(column, "<>", ConditionValue::Single(value.into()))
    }

    pub fn gt(column: impl Into<Column>, value: impl Into<Value>) -> Self {
        Self::expr(column, ">", ConditionValue::Single(value.into()))
    }

    pub fn gte(column: impl Into<Column>, value: impl Into<Value>) -> Self {
        Self::expr(column, ">=", ConditionValue::Single(value.into()))
    }

    pub fn lt(column: impl Into<Column>, value: impl Into<Value>) -> Self {
        Self::expr(column, "<", ConditionValue::Single(value.into()))
    }

    pub fn lte(column: impl Into<Column>, value: impl Into<Value>) -> Self {
        Self::expr(column, "<=", ConditionValue::Single(value.into()))
    }

    pub fn like(column: impl Into<Column>, pattern: impl Into<Value>) -> Self {
        Self::expr(column, "LIKE", ConditionValue::Single(pattern.into()))
    }

    pub fn is_null(column: impl Into<Column>) -> Self {
        Self::expr(column, "IS NULL", ConditionValue::None)
    }

    pub fn is_not_null(column: impl Into<Column>) -> Self {
        Self::expr(column, "IS NOT NULL", ConditionValue::None)
    }

    /// `column IN (...)`. An empty list never matches.
    pub fn in_list<V: Into<Value>>(column: impl Into<Column>, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        Self::expr(column, "IN", ConditionValue::List(values))
    }

    pub fn between(column: impl Into<Column>, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        Self::expr(
            column,
            "BETWEEN",
            ConditionValue::Pair(from.into(), to.into()),
        )
    }

    /// Equality between two columns, e.g. a merge join predicate.
    pub fn column_eq(left: Column, right: Column) -> Self {
        Condition(ConditionInner::ColumnEq { left, right })
    }

    /// Append this condition to `sql`.
    pub fn append_to_sql(&self, quoter: &Quoter, sql: &mut Sql) {
        match &self.0 {
            ConditionInner::Raw(s) => {
                sql.push("(").push(s).push(")");
            }
            ConditionInner::ColumnEq { left, right } => {
                push_column(quoter, sql, left);
                sql.push(" = ");
                push_column(quoter, sql, right);
            }
            ConditionInner::Expr {
                column,
                operator,
                value,
            } => match value {
                ConditionValue::List(values) if values.is_empty() => {
                    sql.push("1 = 0");
                }
                ConditionValue::Single(v) => {
                    push_column(quoter, sql, column);
                    sql.push(" ").push(operator).push(" ").push_bind(v.clone());
                }
                ConditionValue::Pair(a, b) => {
                    push_column(quoter, sql, column);
                    sql.push(" ").push(operator).push(" ");
                    sql.push_bind(a.clone()).push(" AND ").push_bind(b.clone());
                }
                ConditionValue::List(values) => {
                    push_column(quoter, sql, column);
                    sql.push(" ").push(operator).push(" (");
                    sql.push_bind_list(values.iter().cloned()).push(")");
                }
                ConditionValue::None => {
                    push_column(quoter, sql, column);
                    sql.push(" ").push(operator);
                }
            },
        }
    }
}

pub(crate) fn push_column(quoter: &Quoter, sql: &mut Sql, column: &Column) {
    let mut s = String::new();
    column.write_ref(quoter, &mut s);
    sql.push(&s);
}

/// Append `conditions` joined by `AND`.
pub(crate) fn push_conditions_and(quoter: &Quoter, sql: &mut Sql, conditions: &[Condition]) {
    for (i, cond) in conditions.iter().enumerate() {
        if i > 0 {
            sql.push(" AND ");
        }
        cond.append_to_sql(quoter, sql);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DialectConfig;

    fn render(conditions: &[Condition]) -> (String, usize) {
        let quoter = Quoter::new(&DialectConfig::new().with_case_sensitive_naming(true));
        let mut sql = Sql::empty();
        push_conditions_and(&quoter, &mut sql, conditions);
        let rendered = sql.render();
        (rendered.sql, rendered.binds.len())
    }

    #[test]
    fn renders_comparisons() {
        let (sql, binds) = render(&[
            Condition::eq("id", 1),
            Condition::like("name", "a%"),
            Condition::is_null("deleted_at"),
        ]);
        assert_eq!(
            sql,
            r#""id" = :1 AND "name" LIKE :2 AND "deleted_at" IS NULL"#
        );
        assert_eq!(binds, 2);
    }

    #[test]
    fn renders_lists_and_ranges() {
        let (sql, binds) = render(&[
            Condition::in_list("id", [1, 2, 3]),
            Condition::between("age", 18, 65),
        ]);
        assert_eq!(sql, r#""id" IN (:1, :2, :3) AND "age" BETWEEN :4 AND :5"#);
        assert_eq!(binds, 5);

        let (sql, _) = render(&[Condition::in_list("id", Vec::<i64>::new())]);
        assert_eq!(sql, "1 = 0");
    }

    #[test]
    fn raw_conditions_are_parenthesized() {
        let (sql, _) = render(&[Condition::raw("a = 1 OR b = 2"), Condition::eq("c", 3)]);
        assert_eq!(sql, r#"(a = 1 OR b = 2) AND "c" = :1"#);
    }

    #[test]
    fn column_equality() {
        let (sql, binds) = render(&[Condition::column_eq(
            Column::qualified("users", "id"),
            Column::qualified("excluded", "id"),
        )]);
        assert_eq!(sql, r#""users"."id" = "excluded"."id""#);
        assert_eq!(binds, 0);
    }
}
