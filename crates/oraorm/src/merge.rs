//! Upserts compiled to `MERGE`.
//!
//! The server has no `ON CONFLICT`; an upsert becomes
//!
//! ```text
//! MERGE INTO t USING (SELECT :1 AS a, :2 AS b FROM DUAL) excluded
//!   ON (t.a = excluded.a)
//!   WHEN MATCHED THEN UPDATE SET b = excluded.b
//!   WHEN NOT MATCHED THEN INSERT (a, b) VALUES (excluded.a, excluded.b)
//! ```
//!
//! The conflict target is always the full primary key. Rows that do not carry
//! every key column fall back to a plain insert.

use crate::clause::{
    Assignment, Clause, MergeClause, MergeSource, SqlExpr, WhenMatched, WhenNotMatched,
};
use crate::create::RowValues;
use crate::error::{OrmError, OrmResult};
use crate::ident::Column;
use crate::statement::Statement;
use crate::types::Schema;
use crate::value::Value;

/// Alias of the synthetic source row set.
pub const MERGE_SOURCE_ALIAS: &str = "excluded";

/// What to do when a row's primary key already exists.
///
/// # Example
/// ```ignore
/// use oraorm::OnConflict;
///
/// let on_conflict = OnConflict::do_update()
///     .set_excluded("email")
///     .set("updated_by", "sync");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use]
pub struct OnConflict {
    updates: Vec<Assignment>,
    update_all: bool,
}

impl OnConflict {
    /// Keep the existing row.
    pub fn do_nothing() -> Self {
        Self::default()
    }

    /// Update the existing row with the assignments added next.
    pub fn do_update() -> Self {
        Self::default()
    }

    /// Overwrite every non-key column with the incoming values.
    pub fn update_all() -> Self {
        Self {
            updates: Vec::new(),
            update_all: true,
        }
    }

    /// `column = :value`
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.updates.push(Assignment::bind(column, value));
        self
    }

    /// `column = excluded.column`
    pub fn set_excluded(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        let source = Column::qualified(MERGE_SOURCE_ALIAS, column.clone());
        self.updates
            .push(Assignment::new(column, SqlExpr::Column(source)));
        self
    }

    /// `column = <raw sql>`
    pub fn set_raw(mut self, column: impl Into<String>, sql: impl Into<String>) -> Self {
        self.updates
            .push(Assignment::new(column, SqlExpr::Raw(sql.into())));
        self
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.updates
    }

    pub fn is_update_all(&self) -> bool {
        self.update_all
    }
}

/// Everything a `MERGE` statement is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSpec {
    pub table: String,
    pub source: MergeSource,
    /// Join columns (the primary key).
    pub on: Vec<String>,
    /// Update branch. Empty omits `WHEN MATCHED`.
    pub updates: Vec<Assignment>,
    pub insert_columns: Vec<String>,
    pub insert_values: Vec<Vec<SqlExpr>>,
}

impl MergeSpec {
    /// Turn the spec into a statement.
    pub fn into_statement(self, schema: Option<&Schema>) -> Statement<'_> {
        let base = match schema {
            Some(schema) => Statement::for_schema(schema),
            None => Statement::new(),
        };
        let mut stmt = base.with(Clause::Merge(MergeClause {
            table: self.table,
            source: self.source,
            alias: MERGE_SOURCE_ALIAS.to_string(),
            on: self.on,
        }));
        if !self.updates.is_empty() {
            stmt.add_clause(Clause::WhenMatched(WhenMatched {
                set: self.updates,
                ..WhenMatched::default()
            }));
        }
        stmt.add_clause(Clause::WhenNotMatched(WhenNotMatched {
            columns: self.insert_columns,
            rows: self.insert_values,
            conditions: Vec::new(),
        }));
        stmt
    }
}

/// Outcome of upsert planning for one row.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertPlan {
    Merge(MergeSpec),
    /// The row lacks key columns; insert it normally.
    Insert,
}

/// Plan an upsert of `row`.
///
/// Fails when the schema has no primary key or a key value is `NULL`.
pub fn plan_upsert(schema: &Schema, row: &RowValues, on_conflict: &OnConflict) -> OrmResult<UpsertPlan> {
    plan_upsert_rows(schema, std::slice::from_ref(row), on_conflict)
}

/// Plan one `MERGE` fed by a `UNION ALL` of all `rows`.
///
/// Every row must carry the same columns. The server rejects a merge whose
/// source matches one target row twice, so keys must be distinct.
pub fn plan_upsert_rows(
    schema: &Schema,
    rows: &[RowValues],
    on_conflict: &OnConflict,
) -> OrmResult<UpsertPlan> {
    let primary = schema.primary_fields();
    if primary.is_empty() {
        return Err(OrmError::compile(format!(
            "cannot upsert into {}: no primary key",
            schema.table
        )));
    }
    let Some(first) = rows.first() else {
        return Err(OrmError::compile("no rows to upsert"));
    };
    if rows.iter().any(|r| r.fields != first.fields) {
        return Err(OrmError::compile(
            "rows merged in one statement must carry the same columns",
        ));
    }
    if !primary.iter().all(|(id, _)| first.contains(*id)) {
        return Ok(UpsertPlan::Insert);
    }
    for row in rows {
        for (id, field) in &primary {
            if row.value(*id).is_none_or(Value::is_null) {
                return Err(OrmError::compile(format!(
                    "cannot upsert into {}: primary key {} is NULL",
                    schema.table, field.name
                )));
            }
        }
    }

    let columns = first.columns(schema);
    let on: Vec<String> = primary.iter().map(|(_, f)| f.name.clone()).collect();

    let updates = if on_conflict.is_update_all() {
        columns
            .iter()
            .filter(|c| !on.contains(c))
            .map(|c| {
                Assignment::new(
                    c.clone(),
                    SqlExpr::Column(Column::qualified(MERGE_SOURCE_ALIAS, c.clone())),
                )
            })
            .collect()
    } else {
        on_conflict.assignments().to_vec()
    };

    let insert_values = vec![columns
        .iter()
        .map(|c| SqlExpr::Column(Column::qualified(MERGE_SOURCE_ALIAS, c.clone())))
        .collect()];

    Ok(UpsertPlan::Merge(MergeSpec {
        table: schema.table.clone(),
        source: MergeSource {
            columns: columns.clone(),
            rows: rows.iter().map(|r| r.values.clone()).collect(),
        },
        on,
        updates,
        insert_columns: columns,
        insert_values,
    }))
}
