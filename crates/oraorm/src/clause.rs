//! Named, typed clauses of a statement and their rendering.
//!
//! A [`Statement`](crate::Statement) holds clauses in canonical order (the
//! declaration order of [`ClauseName`]). Each clause renders into its own
//! [`Sql`] fragment; fragments are joined with a single space.

use crate::condition::{Condition, push_column, push_conditions_and};
use crate::config::DialectConfig;
use crate::ident::{Column, Quoter, Table};
use crate::pagination::PaginationSpec;
use crate::returning::ReturningColumn;
use crate::sql::Sql;
use crate::value::Value;

/// Clause names in canonical rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClauseName {
    Select,
    Insert,
    Merge,
    Update,
    Delete,
    From,
    Set,
    Values,
    Where,
    WhenMatched,
    WhenNotMatched,
    OrderBy,
    Limit,
    Returning,
}

impl ClauseName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClauseName::Select => "SELECT",
            ClauseName::Insert => "INSERT",
            ClauseName::Merge => "MERGE",
            ClauseName::Update => "UPDATE",
            ClauseName::Delete => "DELETE",
            ClauseName::From => "FROM",
            ClauseName::Set => "SET",
            ClauseName::Values => "VALUES",
            ClauseName::Where => "WHERE",
            ClauseName::WhenMatched => "WHEN MATCHED",
            ClauseName::WhenNotMatched => "WHEN NOT MATCHED",
            ClauseName::OrderBy => "ORDER BY",
            ClauseName::Limit => "LIMIT",
            ClauseName::Returning => "RETURNING",
        }
    }
}

/// Value side of an assignment or insert column.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlExpr {
    Bind(Value),
    Column(Column),
    /// Inserted verbatim.
    Raw(String),
    /// The `DEFAULT` keyword.
    Default,
}

impl SqlExpr {
    fn append_to_sql(&self, quoter: &Quoter, sql: &mut Sql) {
        match self {
            SqlExpr::Bind(v) => {
                sql.push_bind(v.clone());
            }
            SqlExpr::Column(c) => push_column(quoter, sql, c),
            SqlExpr::Raw(s) => {
                sql.push(s);
            }
            SqlExpr::Default => {
                sql.push("DEFAULT");
            }
        }
    }
}

/// `column = expr`
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: SqlExpr,
}

impl Assignment {
    pub fn new(column: impl Into<String>, value: SqlExpr) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }

    /// Assign a bound value.
    pub fn bind(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, SqlExpr::Bind(value.into()))
    }
}

fn push_assignments(quoter: &Quoter, sql: &mut Sql, set: &[Assignment]) {
    for (i, a) in set.iter().enumerate() {
        if i > 0 {
            sql.push(", ");
        }
        sql.push_ident(quoter, &a.column).push(" = ");
        a.value.append_to_sql(quoter, sql);
    }
}

fn push_column_list(quoter: &Quoter, sql: &mut Sql, columns: &[String]) {
    sql.push("(");
    for (i, c) in columns.iter().enumerate() {
        if i > 0 {
            sql.push(", ");
        }
        sql.push_ident(quoter, c);
    }
    sql.push(")");
}

fn push_expr_list(quoter: &Quoter, sql: &mut Sql, row: &[SqlExpr]) {
    sql.push("(");
    for (i, e) in row.iter().enumerate() {
        if i > 0 {
            sql.push(", ");
        }
        e.append_to_sql(quoter, sql);
    }
    sql.push(")");
}

/// An `ORDER BY` item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderItem {
    Asc(Column),
    Desc(Column),
    /// Inserted verbatim.
    Raw(String),
}

impl OrderItem {
    pub fn asc(column: impl Into<Column>) -> Self {
        OrderItem::Asc(column.into())
    }

    pub fn desc(column: impl Into<Column>) -> Self {
        OrderItem::Desc(column.into())
    }
}

pub(crate) fn push_order_items(quoter: &Quoter, sql: &mut Sql, items: &[OrderItem]) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            sql.push(", ");
        }
        match item {
            OrderItem::Asc(c) => push_column(quoter, sql, c),
            OrderItem::Desc(c) => {
                push_column(quoter, sql, c);
                sql.push(" DESC");
            }
            OrderItem::Raw(s) => {
                sql.push(s);
            }
        }
    }
}

/// Rows for a plain insert.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuesClause {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlExpr>>,
}

/// Literal rows selected from the scratch table as a merge source.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSource {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// `MERGE INTO table USING (source) alias ON (...)`
#[derive(Debug, Clone, PartialEq)]
pub struct MergeClause {
    pub table: String,
    pub source: MergeSource,
    pub alias: String,
    /// Join columns, matched by equality between target and source.
    pub on: Vec<String>,
}

/// `WHEN MATCHED THEN UPDATE SET ...`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhenMatched {
    pub set: Vec<Assignment>,
    /// Optional filter on the update branch.
    pub conditions: Vec<Condition>,
    /// Rows matching these after the update are deleted.
    pub delete_conditions: Vec<Condition>,
}

/// `WHEN NOT MATCHED THEN INSERT (...) VALUES (...)`
#[derive(Debug, Clone, PartialEq)]
pub struct WhenNotMatched {
    pub columns: Vec<String>,
    /// Must hold exactly one row.
    pub rows: Vec<Vec<SqlExpr>>,
    pub conditions: Vec<Condition>,
}

/// A named clause with its typed payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Projected columns. Empty selects `*`.
    Select(Vec<Column>),
    Insert(Table),
    Merge(MergeClause),
    Update(Table),
    Delete(Table),
    From(Table),
    Set(Vec<Assignment>),
    Values(ValuesClause),
    Where(Vec<Condition>),
    WhenMatched(WhenMatched),
    WhenNotMatched(WhenNotMatched),
    OrderBy(Vec<OrderItem>),
    Limit(PaginationSpec),
    Returning(Vec<ReturningColumn>),
}

/// What clause rendering needs from the dialect.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BuildContext<'a> {
    pub quoter: &'a Quoter,
    pub config: &'a DialectConfig,
}

impl Clause {
    pub fn name(&self) -> ClauseName {
        match self {
            Clause::Select(_) => ClauseName::Select,
            Clause::Insert(_) => ClauseName::Insert,
            Clause::Merge(_) => ClauseName::Merge,
            Clause::Update(_) => ClauseName::Update,
            Clause::Delete(_) => ClauseName::Delete,
            Clause::From(_) => ClauseName::From,
            Clause::Set(_) => ClauseName::Set,
            Clause::Values(_) => ClauseName::Values,
            Clause::Where(_) => ClauseName::Where,
            Clause::WhenMatched(_) => ClauseName::WhenMatched,
            Clause::WhenNotMatched(_) => ClauseName::WhenNotMatched,
            Clause::OrderBy(_) => ClauseName::OrderBy,
            Clause::Limit(_) => ClauseName::Limit,
            Clause::Returning(_) => ClauseName::Returning,
        }
    }

    /// Render this clause. `Limit` renders nothing; it is applied by the
    /// pagination rewrite.
    pub(crate) fn build(&self, ctx: &BuildContext<'_>, sql: &mut Sql) {
        let q = ctx.quoter;
        match self {
            Clause::Select(columns) => {
                sql.push("SELECT ");
                if columns.is_empty() {
                    sql.push("*");
                }
                for (i, c) in columns.iter().enumerate() {
                    if i > 0 {
                        sql.push(", ");
                    }
                    let mut s = String::new();
                    c.write_select_item(q, &mut s);
                    sql.push(&s);
                }
            }
            Clause::Insert(table) => {
                sql.push("INSERT INTO ");
                push_table(q, sql, table);
            }
            Clause::Merge(merge) => build_merge(ctx, merge, sql),
            Clause::Update(table) => {
                sql.push("UPDATE ");
                push_table(q, sql, table);
            }
            Clause::Delete(table) => {
                sql.push("DELETE FROM ");
                push_table(q, sql, table);
            }
            Clause::From(table) => {
                sql.push("FROM ");
                push_table(q, sql, table);
            }
            Clause::Set(set) => {
                sql.push("SET ");
                push_assignments(q, sql, set);
            }
            Clause::Values(values) => {
                push_column_list(q, sql, &values.columns);
                sql.push(" VALUES ");
                for (i, row) in values.rows.iter().enumerate() {
                    if i > 0 {
                        sql.push(", ");
                    }
                    push_expr_list(q, sql, row);
                }
            }
            Clause::Where(conditions) => {
                if !conditions.is_empty() {
                    sql.push("WHERE ");
                    push_conditions_and(q, sql, conditions);
                }
            }
            Clause::WhenMatched(matched) => {
                if matched.set.is_empty() {
                    return;
                }
                sql.push("WHEN MATCHED THEN UPDATE SET ");
                push_assignments(q, sql, &matched.set);
                if !matched.conditions.is_empty() {
                    sql.push(" WHERE ");
                    push_conditions_and(q, sql, &matched.conditions);
                }
                if !matched.delete_conditions.is_empty() {
                    sql.push(" DELETE WHERE ");
                    push_conditions_and(q, sql, &matched.delete_conditions);
                }
            }
            Clause::WhenNotMatched(not_matched) => {
                if not_matched.columns.is_empty() {
                    return;
                }
                sql.push("WHEN NOT MATCHED THEN INSERT ");
                push_column_list(q, sql, &not_matched.columns);
                sql.push(" VALUES ");
                for row in &not_matched.rows {
                    push_expr_list(q, sql, row);
                }
                if !not_matched.conditions.is_empty() {
                    sql.push(" WHERE ");
                    push_conditions_and(q, sql, &not_matched.conditions);
                }
            }
            Clause::OrderBy(items) => {
                if !items.is_empty() {
                    sql.push("ORDER BY ");
                    push_order_items(q, sql, items);
                }
            }
            Clause::Limit(_) => {}
            Clause::Returning(columns) => {
                if columns.is_empty() {
                    return;
                }
                sql.push("RETURNING ");
                for (i, c) in columns.iter().enumerate() {
                    if i > 0 {
                        sql.push(", ");
                    }
                    sql.push_ident(q, &c.column);
                }
                sql.push(" INTO ");
                for (i, c) in columns.iter().enumerate() {
                    if i > 0 {
                        sql.push(", ");
                    }
                    sql.push_out(c.clone());
                }
            }
        }
    }
}

fn push_table(quoter: &Quoter, sql: &mut Sql, table: &Table) {
    let mut s = String::new();
    table.write_sql(quoter, &mut s);
    sql.push(&s);
}

fn build_merge(ctx: &BuildContext<'_>, merge: &MergeClause, sql: &mut Sql) {
    let q = ctx.quoter;
    sql.push("MERGE INTO ").push_ident(q, &merge.table).push(" USING (");
    for (i, row) in merge.source.rows.iter().enumerate() {
        if i > 0 {
            sql.push(" UNION ALL ");
        }
        sql.push("SELECT ");
        for (j, (column, value)) in merge.source.columns.iter().zip(row).enumerate() {
            if j > 0 {
                sql.push(", ");
            }
            sql.push_bind(value.clone());
            // aliases only matter on the first row of a UNION ALL
            if i == 0 {
                sql.push(" AS ").push_ident(q, column);
            }
        }
        sql.push(" FROM ").push(&ctx.config.dummy_table);
    }
    sql.push(") ").push_ident(q, &merge.alias).push(" ON (");
    let on: Vec<Condition> = merge
        .on
        .iter()
        .map(|c| {
            Condition::column_eq(
                Column::qualified(merge.table.clone(), c.clone()),
                Column::qualified(merge.alias.clone(), c.clone()),
            )
        })
        .collect();
    push_conditions_and(q, sql, &on);
    sql.push(")");
}
