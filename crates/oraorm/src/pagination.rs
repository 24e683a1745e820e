//! Pagination rewriting.
//!
//! Servers from major version 12 understand `OFFSET n ROWS FETCH NEXT m ROWS
//! ONLY`, which is only well defined under a total order, so a default order
//! is synthesized when the statement has none. Older servers only have the
//! `ROWNUM` pseudo-column, which is assigned before `ORDER BY` runs:
//!
//! - limit and offset: `ROW_NUMBER()` joins the select list and the query is
//!   wrapped and filtered on it,
//! - limit only: `ROWNUM <= limit`,
//! - offset only: `ROWNUM > offset`.
//!
//! `ROWNUM` predicates are merged into the `WHERE` fragment, which always
//! precedes `ORDER BY` in the fragment list. Magnitudes are written as integer
//! literals, so bind order is never affected.

use crate::clause::{ClauseName, OrderItem, push_order_items};
use crate::config::PaginationStrategy;
use crate::ident::Quoter;
use crate::sql::Sql;
use crate::statement::ClausePlan;

/// Alias of the row counter column in wrapped legacy queries.
pub const ROW_NUMBER_ALIAS: &str = "ROW_NUM";

/// Requested window of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationSpec {
    /// Rows to skip.
    pub offset: u64,
    /// Rows to return. `Some(0)` returns nothing, `None` is unbounded.
    pub limit: Option<u64>,
}

impl PaginationSpec {
    pub fn new(offset: u64, limit: Option<u64>) -> Self {
        Self { offset, limit }
    }

    /// Whether the spec restricts anything.
    pub fn is_noop(&self) -> bool {
        self.offset == 0 && self.limit.is_none()
    }
}

/// Inputs to the rewrite besides the fragments themselves.
#[derive(Debug, Clone, Copy)]
pub struct PaginationContext<'a> {
    pub strategy: PaginationStrategy,
    pub quoter: &'a Quoter,
    /// Order items of the statement's `ORDER BY`, if it has one.
    pub existing_order: Option<&'a [OrderItem]>,
    /// Order to synthesize when there is none, usually the primary key.
    pub default_order: Option<&'a OrderItem>,
    pub dummy_table: &'a str,
    /// Table (or alias) qualifying a bare `SELECT *`, which cannot share the
    /// select list with the row counter otherwise.
    pub star_qualifier: Option<&'a str>,
}

impl PaginationContext<'_> {
    fn fallback_order(&self) -> Vec<OrderItem> {
        match self.default_order {
            Some(item) => vec![item.clone()],
            None => vec![OrderItem::Raw(format!(
                "(SELECT NULL FROM {})",
                self.dummy_table
            ))],
        }
    }
}

/// Apply `spec` to the rendered fragments of a `SELECT`.
pub fn rewrite_pagination(plan: &mut ClausePlan, spec: PaginationSpec, ctx: &PaginationContext<'_>) {
    if spec.is_noop() {
        return;
    }
    tracing::trace!(
        target: "oraorm.sql",
        strategy = ?ctx.strategy,
        offset = spec.offset,
        limit = ?spec.limit,
        "rewriting pagination"
    );
    match ctx.strategy {
        PaginationStrategy::OffsetFetch => offset_fetch(plan, spec, ctx),
        PaginationStrategy::RowNum => match (spec.offset, spec.limit) {
            (offset, Some(limit)) if offset > 0 => row_number_window(plan, offset, limit, ctx),
            (_, Some(limit)) => rownum_predicate(plan, &format!("ROWNUM <= {limit}")),
            (offset, None) => rownum_predicate(plan, &format!("ROWNUM > {offset}")),
        },
    }
}

fn offset_fetch(plan: &mut ClausePlan, spec: PaginationSpec, ctx: &PaginationContext<'_>) {
    if !plan.contains(ClauseName::OrderBy) {
        let mut order = Sql::new("ORDER BY ");
        push_order_items(ctx.quoter, &mut order, &ctx.fallback_order());
        plan.push(ClauseName::OrderBy, order);
    }

    let mut window = Vec::new();
    if spec.offset > 0 {
        window.push(format!("OFFSET {} ROWS", spec.offset));
    }
    if let Some(limit) = spec.limit {
        window.push(format!("FETCH NEXT {limit} ROWS ONLY"));
    }
    plan.push(ClauseName::Limit, Sql::new(window.join(" ")));
}

fn rownum_predicate(plan: &mut ClausePlan, predicate: &str) {
    match plan.get_mut(ClauseName::Where) {
        Some(where_sql) => {
            where_sql.push(" AND ").push(predicate);
        }
        None => {
            plan.insert_before(
                ClauseName::OrderBy,
                ClauseName::Where,
                Sql::new(format!("WHERE {predicate}")),
            );
        }
    }
}

fn row_number_window(plan: &mut ClausePlan, offset: u64, limit: u64, ctx: &PaginationContext<'_>) {
    // numbered in the inner select list, where base table columns still resolve
    let over = match ctx.existing_order {
        Some(items) if !items.is_empty() => items.to_vec(),
        _ => ctx.fallback_order(),
    };

    plan.remove(ClauseName::OrderBy);
    let mut number = Sql::empty();
    if let Some(table) = ctx.star_qualifier {
        // `*` cannot be combined with other select items
        number.push("SELECT ").push(&ctx.quoter.quote(table)).push(".*");
        plan.remove(ClauseName::Select);
    }
    number.push(", ROW_NUMBER() OVER (ORDER BY ");
    push_order_items(ctx.quoter, &mut number, &over);
    number.push(&format!(") AS {ROW_NUMBER_ALIAS}"));
    match plan.get_mut(ClauseName::Select) {
        Some(select) => {
            select.push_sql(number);
        }
        None => plan.insert_before(ClauseName::From, ClauseName::Select, number),
    }
    let inner = std::mem::take(plan).into_sql();

    let mut select = Sql::new("SELECT * FROM (");
    select.push_sql(inner);
    select.push(")");
    plan.push(ClauseName::Select, select);

    let first = offset.saturating_add(1);
    let last = offset.saturating_add(limit);
    plan.push(
        ClauseName::Where,
        Sql::new(format!("WHERE {ROW_NUMBER_ALIAS} BETWEEN {first} AND {last}")),
    );
    plan.push(ClauseName::OrderBy, Sql::new(format!("ORDER BY {ROW_NUMBER_ALIAS}")));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DialectConfig;
    use crate::ident::Column;

    fn plan(with_where: bool, with_order: bool) -> ClausePlan {
        let mut plan = ClausePlan::default();
        plan.push(ClauseName::Select, Sql::new("SELECT *"));
        plan.push(ClauseName::From, Sql::new("FROM USERS"));
        if with_where {
            let mut w = Sql::new("WHERE AGE > ");
            w.push_bind(18);
            plan.push(ClauseName::Where, w);
        }
        if with_order {
            plan.push(ClauseName::OrderBy, Sql::new("ORDER BY USERS.NAME"));
        }
        plan
    }

    fn rewrite(
        mut plan: ClausePlan,
        strategy: PaginationStrategy,
        spec: PaginationSpec,
        existing: Option<&[OrderItem]>,
        default: Option<&OrderItem>,
    ) -> (String, usize) {
        let quoter = Quoter::new(&DialectConfig::new());
        let ctx = PaginationContext {
            strategy,
            quoter: &quoter,
            existing_order: existing,
            default_order: default,
            dummy_table: "DUAL",
            star_qualifier: Some("users"),
        };
        rewrite_pagination(&mut plan, spec, &ctx);
        let rendered = plan.into_sql().render();
        (rendered.sql, rendered.binds.len())
    }

    #[test]
    fn modern_synthesizes_primary_key_order() {
        let pk = OrderItem::asc("id");
        let (sql, _) = rewrite(
            plan(false, false),
            PaginationStrategy::OffsetFetch,
            PaginationSpec::new(0, Some(10)),
            None,
            Some(&pk),
        );
        assert_eq!(sql, "SELECT * FROM USERS ORDER BY ID FETCH NEXT 10 ROWS ONLY");
    }

    #[test]
    fn modern_falls_back_to_constant_order() {
        let (sql, _) = rewrite(
            plan(false, false),
            PaginationStrategy::OffsetFetch,
            PaginationSpec::new(5, Some(10)),
            None,
            None,
        );
        assert_eq!(
            sql,
            "SELECT * FROM USERS ORDER BY (SELECT NULL FROM DUAL) OFFSET 5 ROWS FETCH NEXT 10 ROWS ONLY"
        );
    }

    #[test]
    fn modern_keeps_existing_order_and_binds() {
        let (sql, binds) = rewrite(
            plan(true, true),
            PaginationStrategy::OffsetFetch,
            PaginationSpec::new(20, None),
            None,
            None,
        );
        assert_eq!(
            sql,
            "SELECT * FROM USERS WHERE AGE > :1 ORDER BY USERS.NAME OFFSET 20 ROWS"
        );
        assert_eq!(binds, 1);
    }

    #[test]
    fn modern_limit_zero_fetches_none() {
        let (sql, _) = rewrite(
            plan(false, true),
            PaginationStrategy::OffsetFetch,
            PaginationSpec::new(0, Some(0)),
            None,
            None,
        );
        assert!(sql.ends_with("FETCH NEXT 0 ROWS ONLY"));
    }

    #[test]
    fn empty_pagination_changes_nothing() {
        let (sql, _) = rewrite(
            plan(false, false),
            PaginationStrategy::OffsetFetch,
            PaginationSpec::default(),
            None,
            None,
        );
        assert_eq!(sql, "SELECT * FROM USERS");
    }

    #[test]
    fn legacy_limit_merges_into_where_before_order() {
        let (sql, binds) = rewrite(
            plan(true, true),
            PaginationStrategy::RowNum,
            PaginationSpec::new(0, Some(10)),
            None,
            None,
        );
        assert_eq!(
            sql,
            "SELECT * FROM USERS WHERE AGE > :1 AND ROWNUM <= 10 ORDER BY USERS.NAME"
        );
        assert_eq!(binds, 1);
    }

    #[test]
    fn legacy_limit_introduces_where() {
        let (sql, _) = rewrite(
            plan(false, true),
            PaginationStrategy::RowNum,
            PaginationSpec::new(0, Some(10)),
            None,
            None,
        );
        assert_eq!(sql, "SELECT * FROM USERS WHERE ROWNUM <= 10 ORDER BY USERS.NAME");

        let (sql, _) = rewrite(
            plan(false, false),
            PaginationStrategy::RowNum,
            PaginationSpec::new(0, Some(3)),
            None,
            None,
        );
        assert_eq!(sql, "SELECT * FROM USERS WHERE ROWNUM <= 3");
    }

    #[test]
    fn legacy_offset_only() {
        let (sql, _) = rewrite(
            plan(true, false),
            PaginationStrategy::RowNum,
            PaginationSpec::new(7, None),
            None,
            None,
        );
        assert_eq!(sql, "SELECT * FROM USERS WHERE AGE > :1 AND ROWNUM > 7");
    }

    #[test]
    fn legacy_window_wraps_query() {
        let existing = [OrderItem::Asc(Column::qualified("users", "name"))];
        let (sql, binds) = rewrite(
            plan(true, true),
            PaginationStrategy::RowNum,
            PaginationSpec::new(5, Some(10)),
            Some(&existing),
            None,
        );
        assert_eq!(
            sql,
            "SELECT * FROM (SELECT USERS.*, ROW_NUMBER() OVER (ORDER BY USERS.NAME) AS ROW_NUM \
             FROM USERS WHERE AGE > :1) WHERE ROW_NUM BETWEEN 6 AND 15 ORDER BY ROW_NUM"
        );
        assert_eq!(binds, 1);
    }

    #[test]
    fn legacy_window_without_order_uses_row_number() {
        let pk = OrderItem::asc("id");
        let (sql, _) = rewrite(
            plan(false, false),
            PaginationStrategy::RowNum,
            PaginationSpec::new(10, Some(10)),
            None,
            Some(&pk),
        );
        assert_eq!(
            sql,
            "SELECT * FROM (SELECT USERS.*, ROW_NUMBER() OVER (ORDER BY ID) AS ROW_NUM \
             FROM USERS) WHERE ROW_NUM BETWEEN 11 AND 20 ORDER BY ROW_NUM"
        );
    }

    #[test]
    fn legacy_window_numbers_rows_beside_explicit_columns() {
        let mut plan = ClausePlan::default();
        plan.push(ClauseName::Select, Sql::new("SELECT USERS.ID AS \"UID\""));
        plan.push(ClauseName::From, Sql::new("FROM USERS"));
        plan.push(ClauseName::OrderBy, Sql::new("ORDER BY USERS.NAME"));
        let quoter = Quoter::new(&DialectConfig::new());
        let existing = [OrderItem::Asc(Column::qualified("users", "name"))];
        let ctx = PaginationContext {
            strategy: PaginationStrategy::RowNum,
            quoter: &quoter,
            existing_order: Some(&existing),
            default_order: None,
            dummy_table: "DUAL",
            star_qualifier: None,
        };
        rewrite_pagination(&mut plan, PaginationSpec::new(5, Some(5)), &ctx);
        assert_eq!(
            plan.into_sql().render().sql,
            "SELECT * FROM (SELECT USERS.ID AS \"UID\", ROW_NUMBER() OVER (ORDER BY USERS.NAME) AS ROW_NUM \
             FROM USERS) WHERE ROW_NUM BETWEEN 6 AND 10 ORDER BY ROW_NUM"
        );
    }
}
