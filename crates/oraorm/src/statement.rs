//! Statements as ordered clause pipelines.
//!
//! A [`Statement`] is a set of named [`Clause`]s kept in canonical order, so
//! the order clauses are added in never affects the output. Compilation
//! renders each clause into a [`Fragment`], lets the pagination rewrite splice
//! the fragment list, then joins everything into one SQL string.

use crate::clause::{Assignment, Clause, ClauseName, OrderItem};
use crate::condition::Condition;
use crate::error::{OrmError, OrmResult};
use crate::ident::{Column, Table};
use crate::pagination::PaginationSpec;
use crate::returning::OutParam;
use crate::sql::Sql;
use crate::types::Schema;
use crate::value::Value;
use std::fmt;

/// Kind of statement, given by its leading clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Merge,
    Update,
    Delete,
}

impl StatementKind {
    fn leading(name: ClauseName) -> Option<Self> {
        match name {
            ClauseName::Select => Some(StatementKind::Select),
            ClauseName::Insert => Some(StatementKind::Insert),
            ClauseName::Merge => Some(StatementKind::Merge),
            ClauseName::Update => Some(StatementKind::Update),
            ClauseName::Delete => Some(StatementKind::Delete),
            _ => None,
        }
    }

    fn allows(&self, name: ClauseName) -> bool {
        use ClauseName as C;
        match self {
            StatementKind::Select => matches!(name, C::Select | C::From | C::Where | C::OrderBy | C::Limit),
            StatementKind::Insert => matches!(name, C::Insert | C::Values | C::Returning),
            StatementKind::Merge => matches!(name, C::Merge | C::WhenMatched | C::WhenNotMatched),
            StatementKind::Update => matches!(name, C::Update | C::Set | C::Where | C::Returning),
            StatementKind::Delete => matches!(name, C::Delete | C::Where | C::Returning),
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Merge => "MERGE",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// A statement under construction.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct Statement<'a> {
    schema: Option<&'a Schema>,
    clauses: Vec<Clause>,
    allow_global_update: bool,
    tag: Option<String>,
}

impl<'a> Statement<'a> {
    /// An empty statement with no schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty statement over `schema`.
    pub fn for_schema(schema: &'a Schema) -> Self {
        Self {
            schema: Some(schema),
            ..Self::default()
        }
    }

    /// `SELECT * FROM <schema table>`
    pub fn select(schema: &'a Schema) -> Self {
        Self::for_schema(schema)
            .with(Clause::Select(Vec::new()))
            .with(Clause::From(Table::new(schema.table.clone())))
    }

    /// `UPDATE <schema table> SET ...`
    pub fn update(schema: &'a Schema, set: Vec<Assignment>) -> Self {
        Self::for_schema(schema)
            .with(Clause::Update(Table::new(schema.table.clone())))
            .with(Clause::Set(set))
    }

    /// `DELETE FROM <schema table>`
    pub fn delete(schema: &'a Schema) -> Self {
        Self::for_schema(schema).with(Clause::Delete(Table::new(schema.table.clone())))
    }

    pub fn schema(&self) -> Option<&'a Schema> {
        self.schema
    }

    /// Clauses in canonical order.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn clause(&self, name: ClauseName) -> Option<&Clause> {
        self.clauses.iter().find(|c| c.name() == name)
    }

    pub fn has_clause(&self, name: ClauseName) -> bool {
        self.clause(name).is_some()
    }

    fn clause_mut(&mut self, name: ClauseName) -> Option<&mut Clause> {
        self.clauses.iter_mut().find(|c| c.name() == name)
    }

    /// Add a clause, replacing any clause with the same name.
    pub fn add_clause(&mut self, clause: Clause) -> &mut Self {
        let name = clause.name();
        match self.clauses.binary_search_by(|c| c.name().cmp(&name)) {
            Ok(i) => self.clauses[i] = clause,
            Err(i) => self.clauses.insert(i, clause),
        }
        self
    }

    /// Add a clause unless one with the same name exists. Returns whether it was added.
    pub fn add_clause_if_absent(&mut self, clause: Clause) -> bool {
        if self.has_clause(clause.name()) {
            return false;
        }
        self.add_clause(clause);
        true
    }

    /// Add a clause (consuming version).
    pub fn with(mut self, clause: Clause) -> Self {
        self.add_clause(clause);
        self
    }

    /// Add a `WHERE` condition, joined with existing ones by `AND`.
    pub fn filter(mut self, condition: Condition) -> Self {
        match self.clause_mut(ClauseName::Where) {
            Some(Clause::Where(conditions)) => conditions.push(condition),
            _ => {
                self.add_clause(Clause::Where(vec![condition]));
            }
        }
        self
    }

    /// Append an `ORDER BY` item.
    pub fn order_by(mut self, item: OrderItem) -> Self {
        match self.clause_mut(ClauseName::OrderBy) {
            Some(Clause::OrderBy(items)) => items.push(item),
            _ => {
                self.add_clause(Clause::OrderBy(vec![item]));
            }
        }
        self
    }

    /// Limit the number of rows returned.
    pub fn limit(mut self, limit: u64) -> Self {
        let mut spec = self.pagination().unwrap_or_default();
        spec.limit = Some(limit);
        self.add_clause(Clause::Limit(spec));
        self
    }

    /// Skip the first `offset` rows.
    pub fn offset(mut self, offset: u64) -> Self {
        let mut spec = self.pagination().unwrap_or_default();
        spec.offset = offset;
        self.add_clause(Clause::Limit(spec));
        self
    }

    /// Requested pagination, if any.
    pub fn pagination(&self) -> Option<PaginationSpec> {
        match self.clause(ClauseName::Limit) {
            Some(Clause::Limit(spec)) => Some(*spec),
            _ => None,
        }
    }

    /// Permit `UPDATE`/`DELETE` without a `WHERE` clause.
    pub fn allow_global_update(mut self) -> Self {
        self.allow_global_update = true;
        self
    }

    /// Tag for monitoring.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn tag_str(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Order used when pagination needs one and none was given.
    ///
    /// The prioritized primary key, or `None` when the schema has none.
    pub(crate) fn default_order(&self) -> Option<OrderItem> {
        self.schema
            .and_then(Schema::prioritized_primary_field)
            .map(|f| OrderItem::Asc(Column::new(f.name.clone())))
    }

    /// Check the clause set and return the statement kind.
    pub fn validate(&self) -> OrmResult<StatementKind> {
        let Some(first) = self.clauses.first() else {
            return Err(OrmError::compile("empty statement"));
        };
        let kind = StatementKind::leading(first.name()).ok_or_else(|| {
            OrmError::compile(format!(
                "statement must start with SELECT, INSERT, MERGE, UPDATE or DELETE, found {}",
                first.name().as_str()
            ))
        })?;

        if let Some(bad) = self.clauses.iter().find(|c| !kind.allows(c.name())) {
            if bad.name() == ClauseName::Returning && kind == StatementKind::Merge {
                return Err(OrmError::compile("RETURNING is not supported on MERGE"));
            }
            return Err(OrmError::compile(format!(
                "{} clause is not valid in a {kind} statement",
                bad.name().as_str()
            )));
        }

        match kind {
            StatementKind::Select => {
                if !self.has_clause(ClauseName::From) {
                    return Err(OrmError::compile("SELECT requires a FROM clause"));
                }
            }
            StatementKind::Insert => self.validate_insert()?,
            StatementKind::Merge => self.validate_merge()?,
            StatementKind::Update => {
                match self.clause(ClauseName::Set) {
                    Some(Clause::Set(set)) if !set.is_empty() => {}
                    _ => return Err(OrmError::compile("UPDATE requires at least one assignment")),
                }
                self.check_missing_where(kind)?;
            }
            StatementKind::Delete => self.check_missing_where(kind)?,
        }
        Ok(kind)
    }

    fn check_missing_where(&self, kind: StatementKind) -> OrmResult<()> {
        if self.allow_global_update {
            return Ok(());
        }
        match self.clause(ClauseName::Where) {
            Some(Clause::Where(conditions)) if !conditions.is_empty() => Ok(()),
            _ => Err(OrmError::compile(format!(
                "{kind} without WHERE conditions; use allow_global_update to permit it"
            ))),
        }
    }

    fn validate_insert(&self) -> OrmResult<()> {
        let Some(Clause::Values(values)) = self.clause(ClauseName::Values) else {
            return Err(OrmError::compile("INSERT requires a VALUES clause"));
        };
        match values.rows.len() {
            0 => return Err(OrmError::compile("INSERT requires one row of values")),
            1 => {}
            n => {
                return Err(OrmError::compile(format!(
                    "cannot insert {n} rows in one VALUES clause; compile one statement per row"
                )));
            }
        }
        if values.rows[0].len() != values.columns.len() {
            return Err(OrmError::compile(format!(
                "VALUES has {} column(s) but {} value(s)",
                values.columns.len(),
                values.rows[0].len()
            )));
        }
        Ok(())
    }

    fn validate_merge(&self) -> OrmResult<()> {
        let Some(Clause::Merge(merge)) = self.clause(ClauseName::Merge) else {
            return Err(OrmError::compile("missing MERGE clause"));
        };
        if merge.source.rows.is_empty() {
            return Err(OrmError::compile("MERGE source has no rows"));
        }
        if let Some(row) = merge
            .source
            .rows
            .iter()
            .find(|r| r.len() != merge.source.columns.len())
        {
            return Err(OrmError::compile(format!(
                "MERGE source has {} column(s) but a row has {} value(s)",
                merge.source.columns.len(),
                row.len()
            )));
        }
        if merge.on.is_empty() {
            return Err(OrmError::compile("MERGE requires join columns"));
        }
        if let Some(missing) = merge.on.iter().find(|c| !merge.source.columns.contains(c)) {
            return Err(OrmError::compile(format!(
                "MERGE join column {missing} is not in the source"
            )));
        }

        let matched = match self.clause(ClauseName::WhenMatched) {
            Some(Clause::WhenMatched(m)) => m.set.as_slice(),
            _ => &[],
        };
        if let Some(a) = matched.iter().find(|a| merge.on.contains(&a.column)) {
            return Err(OrmError::compile(format!(
                "cannot update join column {} in WHEN MATCHED",
                a.column
            )));
        }

        let not_matched = match self.clause(ClauseName::WhenNotMatched) {
            Some(Clause::WhenNotMatched(n)) if !n.columns.is_empty() => Some(n),
            _ => None,
        };
        if let Some(n) = not_matched {
            if n.rows.len() != 1 {
                return Err(OrmError::compile(
                    "cannot insert more than one row in WHEN NOT MATCHED",
                ));
            }
            if n.rows[0].len() != n.columns.len() {
                return Err(OrmError::compile(format!(
                    "WHEN NOT MATCHED has {} column(s) but {} value(s)",
                    n.columns.len(),
                    n.rows[0].len()
                )));
            }
        }

        if matched.is_empty() && not_matched.is_none() {
            return Err(OrmError::compile(
                "MERGE requires a WHEN MATCHED or WHEN NOT MATCHED branch",
            ));
        }
        Ok(())
    }
}

/// A rendered clause, tagged with the clause it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub clause: ClauseName,
    pub sql: Sql,
}

/// Rendered fragments in output order, before final serialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClausePlan {
    fragments: Vec<Fragment>,
}

impl ClausePlan {
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Append a fragment. Empty fragments are dropped.
    pub fn push(&mut self, clause: ClauseName, sql: Sql) {
        if !sql.is_empty() {
            self.fragments.push(Fragment { clause, sql });
        }
    }

    pub fn position(&self, clause: ClauseName) -> Option<usize> {
        self.fragments.iter().position(|f| f.clause == clause)
    }

    pub fn contains(&self, clause: ClauseName) -> bool {
        self.position(clause).is_some()
    }

    pub fn get_mut(&mut self, clause: ClauseName) -> Option<&mut Sql> {
        self.fragments
            .iter_mut()
            .find(|f| f.clause == clause)
            .map(|f| &mut f.sql)
    }

    /// Insert a fragment before the first fragment of `before`, or append it.
    pub fn insert_before(&mut self, before: ClauseName, clause: ClauseName, sql: Sql) {
        let at = self.position(before).unwrap_or(self.fragments.len());
        self.fragments.insert(at, Fragment { clause, sql });
    }

    /// Remove and return the fragment of `clause`.
    pub fn remove(&mut self, clause: ClauseName) -> Option<Sql> {
        let at = self.position(clause)?;
        Some(self.fragments.remove(at).sql)
    }

    /// Join all fragments with single spaces.
    pub fn into_sql(self) -> Sql {
        let mut out = Sql::empty();
        for (i, fragment) in self.fragments.into_iter().enumerate() {
            if i > 0 {
                out.push(" ");
            }
            out.push_sql(fragment.sql);
        }
        out
    }
}

/// A compiled, executable statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub kind: StatementKind,
    pub sql: String,
    /// Input binds in placeholder order, not yet converted.
    pub binds: Vec<Value>,
    pub out_params: Vec<OutParam>,
    pub tag: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::{MergeClause, MergeSource, SqlExpr, ValuesClause, WhenNotMatched};
    use crate::types::{FieldMeta, LogicalType};

    fn users() -> Schema {
        Schema::new("users")
            .field(FieldMeta::new("id", LogicalType::Int).primary_key())
            .field(FieldMeta::new("name", LogicalType::String))
    }

    #[test]
    fn clauses_are_kept_in_canonical_order() {
        let schema = users();
        let mut stmt = Statement::for_schema(&schema);
        stmt.add_clause(Clause::OrderBy(vec![OrderItem::asc("name")]));
        stmt.add_clause(Clause::From(Table::new("users")));
        stmt.add_clause(Clause::Select(Vec::new()));
        let names: Vec<_> = stmt.clauses().iter().map(Clause::name).collect();
        assert_eq!(
            names,
            [ClauseName::Select, ClauseName::From, ClauseName::OrderBy]
        );
    }

    #[test]
    fn add_clause_if_absent_keeps_existing() {
        let schema = users();
        let mut stmt = Statement::select(&schema);
        assert!(!stmt.add_clause_if_absent(Clause::From(Table::new("other"))));
        assert_eq!(
            stmt.clause(ClauseName::From),
            Some(&Clause::From(Table::new("users")))
        );
    }

    #[test]
    fn limit_and_offset_share_one_clause() {
        let schema = users();
        let stmt = Statement::select(&schema).offset(5).limit(10);
        assert_eq!(
            stmt.pagination(),
            Some(PaginationSpec {
                offset: 5,
                limit: Some(10)
            })
        );
    }

    #[test]
    fn rejects_mixed_statement_kinds() {
        let schema = users();
        let stmt = Statement::select(&schema).with(Clause::Set(vec![Assignment::bind("name", "x")]));
        assert!(stmt.validate().unwrap_err().is_compile());
    }

    #[test]
    fn rejects_update_without_where() {
        let schema = users();
        let stmt = Statement::update(&schema, vec![Assignment::bind("name", "x")]);
        let err = stmt.validate().unwrap_err();
        assert!(err.to_string().contains("without WHERE"));
        let global = Statement::update(&schema, vec![Assignment::bind("name", "x")]).allow_global_update();
        assert_eq!(global.validate().unwrap(), StatementKind::Update);
    }

    #[test]
    fn rejects_multi_row_values() {
        let stmt = Statement::new()
            .with(Clause::Insert(Table::new("users")))
            .with(Clause::Values(ValuesClause {
                columns: vec!["name".into()],
                rows: vec![vec![SqlExpr::Bind("a".into())], vec![SqlExpr::Bind("b".into())]],
            }));
        assert!(stmt.validate().unwrap_err().is_compile());
    }

    #[test]
    fn rejects_multi_row_merge_insert() {
        let stmt = Statement::new()
            .with(Clause::Merge(MergeClause {
                table: "users".into(),
                source: MergeSource {
                    columns: vec!["id".into()],
                    rows: vec![vec![1.into()]],
                },
                alias: "excluded".into(),
                on: vec!["id".into()],
            }))
            .with(Clause::WhenNotMatched(WhenNotMatched {
                columns: vec!["id".into()],
                rows: vec![vec![SqlExpr::Bind(1.into())], vec![SqlExpr::Bind(2.into())]],
                conditions: Vec::new(),
            }));
        let err = stmt.validate().unwrap_err();
        assert!(err.to_string().contains("more than one row"));
    }

    #[test]
    fn plan_splices_fragments() {
        let mut plan = ClausePlan::default();
        plan.push(ClauseName::Select, Sql::new("SELECT *"));
        plan.push(ClauseName::From, Sql::new("FROM t"));
        plan.push(ClauseName::Where, Sql::empty());
        plan.insert_before(ClauseName::OrderBy, ClauseName::Where, Sql::new("WHERE x = 1"));
        assert_eq!(plan.into_sql().to_sql(), "SELECT * FROM t WHERE x = 1");
    }
}
