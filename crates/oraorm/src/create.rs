//! Insert planning.
//!
//! Each entity becomes its own statement: a plain `INSERT ... RETURNING ...
//! INTO` or, when an [`OnConflict`] is given and the row carries its whole
//! primary key, a `MERGE`.

use crate::clause::{Clause, SqlExpr, ValuesClause};
use crate::dialect::Dialect;
use crate::entity::{Entity, FieldId};
use crate::error::{OrmError, OrmResult};
use crate::ident::Table;
use crate::merge::{OnConflict, UpsertPlan, plan_upsert};
use crate::returning::returning_columns;
use crate::statement::{CompiledStatement, Statement};
use crate::types::{DefaultValue, Schema};
use crate::value::Value;

/// The columns and values one entity contributes to an insert.
#[derive(Debug, Clone, PartialEq)]
pub struct RowValues {
    pub fields: Vec<FieldId>,
    pub values: Vec<Value>,
}

impl RowValues {
    /// Collect insertable values from `entity`.
    ///
    /// Zero-valued server-computed fields are left out so the server fills
    /// them in. `NULL` fields with a static default are left out as well.
    pub fn collect<E: Entity + ?Sized>(schema: &Schema, entity: &E) -> Self {
        let mut fields = Vec::new();
        let mut values = Vec::new();
        for (id, field) in schema.iter() {
            let value = entity.value(id);
            if field.server_computed() && value.is_zero() {
                continue;
            }
            if value.is_null() && matches!(field.default_value, Some(DefaultValue::Value(_))) {
                continue;
            }
            fields.push(id);
            values.push(value);
        }
        Self { fields, values }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: FieldId) -> bool {
        self.fields.contains(&field)
    }

    pub fn value(&self, field: FieldId) -> Option<&Value> {
        self.fields
            .iter()
            .position(|f| *f == field)
            .map(|i| &self.values[i])
    }

    /// Column names in field order.
    pub fn columns(&self, schema: &Schema) -> Vec<String> {
        self.fields
            .iter()
            .filter_map(|id| schema.get(*id))
            .map(|f| f.name.clone())
            .collect()
    }
}

/// A compiled insert or upsert for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatePlan {
    pub statement: CompiledStatement,
    /// Compiled as a `MERGE`.
    pub upsert: bool,
}

/// `INSERT INTO table (...) VALUES (...) [RETURNING ... INTO ...]`
pub fn insert_statement<'a>(dialect: &Dialect, schema: &'a Schema, row: &RowValues) -> OrmResult<Statement<'a>> {
    let returning = returning_columns(schema, dialect.config());

    let (columns, exprs) = if row.is_empty() {
        // nothing supplied: one column takes its default, preferably a server-computed one
        let field = schema
            .server_computed_fields()
            .into_iter()
            .next()
            .map(|(_, field)| field)
            .or_else(|| schema.fields.first());
        let Some(field) = field else {
            return Err(OrmError::compile(format!(
                "nothing to insert into {}: no fields",
                schema.table
            )));
        };
        (vec![field.name.clone()], vec![SqlExpr::Default])
    } else {
        (
            row.columns(schema),
            row.values.iter().cloned().map(SqlExpr::Bind).collect(),
        )
    };

    let mut stmt = Statement::for_schema(schema)
        .with(Clause::Insert(Table::new(schema.table.clone())))
        .with(Clause::Values(ValuesClause {
            columns,
            rows: vec![exprs],
        }));
    if !returning.is_empty() {
        stmt.add_clause(Clause::Returning(returning));
    }
    Ok(stmt)
}

impl Dialect {
    /// Compile the insert (or upsert) of one entity.
    pub fn plan_create<E: Entity + ?Sized>(
        &self,
        schema: &Schema,
        entity: &E,
        on_conflict: Option<&OnConflict>,
    ) -> OrmResult<CreatePlan> {
        let row = RowValues::collect(schema, entity);

        if let Some(on_conflict) = on_conflict {
            match plan_upsert(schema, &row, on_conflict)? {
                UpsertPlan::Merge(spec) => {
                    if !schema.server_computed_fields().is_empty() {
                        tracing::debug!(
                            target: "oraorm.sql",
                            table = %schema.table,
                            "server-computed columns are not read back from MERGE"
                        );
                    }
                    let statement = self.compile(&spec.into_statement(Some(schema)))?;
                    return Ok(CreatePlan {
                        statement,
                        upsert: true,
                    });
                }
                UpsertPlan::Insert => {
                    tracing::debug!(
                        target: "oraorm.sql",
                        table = %schema.table,
                        "row lacks primary key values, upsert falls back to INSERT"
                    );
                }
            }
        }

        let statement = self.compile(&insert_statement(self, schema, &row)?)?;
        Ok(CreatePlan {
            statement,
            upsert: false,
        })
    }

    /// Compile one statement per entity, in order.
    ///
    /// Any compile error aborts before a statement is produced.
    pub fn compile_create<E: Entity>(
        &self,
        schema: &Schema,
        entities: &[E],
        on_conflict: Option<&OnConflict>,
    ) -> OrmResult<Vec<CreatePlan>> {
        entities
            .iter()
            .map(|e| self.plan_create(schema, e, on_conflict))
            .collect()
    }
}
