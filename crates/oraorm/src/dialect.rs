//! The dialect compiler.

use crate::clause::{BuildContext, Clause, ClauseName};
use crate::config::{DialectConfig, PaginationStrategy};
use crate::error::OrmResult;
use crate::ident::Quoter;
use crate::pagination::{PaginationContext, PaginationSpec, rewrite_pagination};
use crate::sql::Sql;
use crate::statement::{ClausePlan, CompiledStatement, Statement};
use crate::types::{self, FieldMeta};
use crate::value::{self, Value};

/// Compiles statements for one server configuration.
///
/// The configuration is fixed at construction and only read afterwards, so a
/// `Dialect` can be shared freely across tasks.
#[derive(Debug, Clone)]
pub struct Dialect {
    config: DialectConfig,
    quoter: Quoter,
    strategy: PaginationStrategy,
}

impl Default for Dialect {
    fn default() -> Self {
        Self::new(DialectConfig::default())
    }
}

impl Dialect {
    pub fn new(config: DialectConfig) -> Self {
        let quoter = Quoter::new(&config);
        let strategy = config.pagination_strategy();
        tracing::trace!(
            target: "oraorm.sql",
            version = %config.server_version,
            ?strategy,
            "selected pagination strategy"
        );
        Self {
            config,
            quoter,
            strategy,
        }
    }

    pub fn config(&self) -> &DialectConfig {
        &self.config
    }

    pub fn quoter(&self) -> &Quoter {
        &self.quoter
    }

    pub fn pagination_strategy(&self) -> PaginationStrategy {
        self.strategy
    }

    /// Quote an identifier.
    pub fn quote(&self, ident: &str) -> String {
        self.quoter.quote(ident)
    }

    /// Physical column type of a field.
    pub fn physical_type(&self, field: &FieldMeta) -> OrmResult<String> {
        types::physical_type(field, &self.config)
    }

    /// Column type with default and nullability.
    pub fn column_definition(&self, field: &FieldMeta) -> OrmResult<String> {
        types::column_definition(field, &self.config)
    }

    /// Normalize one bind value.
    pub fn convert_value(&self, value: Value) -> OrmResult<Value> {
        value::convert_value(value, self.config.large_string_threshold)
    }

    /// Normalize a positional bind list.
    pub fn convert_binds(&self, binds: Vec<Value>) -> OrmResult<Vec<Value>> {
        binds
            .into_iter()
            .map(|v| self.convert_value(v))
            .collect()
    }

    /// Inline binds into SQL for display.
    pub fn explain(&self, sql: &str, binds: &[Value]) -> String {
        value::explain(sql, binds)
    }

    /// Compile a statement into SQL text, binds and output parameters.
    ///
    /// Binds are returned as given; convert them with
    /// [`convert_binds`](Self::convert_binds) right before execution.
    pub fn compile(&self, stmt: &Statement<'_>) -> OrmResult<CompiledStatement> {
        let kind = stmt.validate()?;
        let ctx = BuildContext {
            quoter: &self.quoter,
            config: &self.config,
        };

        let mut plan = ClausePlan::default();
        for clause in stmt.clauses() {
            let mut sql = Sql::empty();
            clause.build(&ctx, &mut sql);
            plan.push(clause.name(), sql);
        }

        if let Some(spec) = stmt.pagination() {
            self.rewrite_pagination(&mut plan, stmt, spec);
        }

        let rendered = plan.into_sql().render();
        tracing::trace!(
            target: "oraorm.sql",
            %kind,
            sql = %rendered.sql,
            binds = rendered.binds.len(),
            outs = rendered.out_params.len(),
            "compiled statement"
        );
        Ok(CompiledStatement {
            kind,
            sql: rendered.sql,
            binds: rendered.binds,
            out_params: rendered.out_params,
            tag: stmt.tag_str().map(str::to_string),
        })
    }

    /// Apply pagination to rendered fragments of `stmt`.
    pub fn rewrite_pagination(
        &self,
        plan: &mut ClausePlan,
        stmt: &Statement<'_>,
        spec: PaginationSpec,
    ) {
        let existing_order = match stmt.clause(ClauseName::OrderBy) {
            Some(Clause::OrderBy(items)) if !items.is_empty() => Some(items.as_slice()),
            _ => None,
        };
        let default_order = stmt.default_order();
        let star_qualifier = match (stmt.clause(ClauseName::Select), stmt.clause(ClauseName::From)) {
            (Some(Clause::Select(columns)), Some(Clause::From(table))) if columns.is_empty() => {
                Some(table.alias.as_deref().unwrap_or(&table.name))
            }
            _ => None,
        };
        let ctx = PaginationContext {
            strategy: self.strategy,
            quoter: &self.quoter,
            existing_order,
            default_order: default_order.as_ref(),
            dummy_table: &self.config.dummy_table,
            star_qualifier,
        };
        rewrite_pagination(plan, spec, &ctx);
    }
}
