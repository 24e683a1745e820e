//! Executing compiled statements against a [`Connection`].

use crate::config::{DialectConfig, ServerVersion};
use crate::connection::{Connection, ExecContext, ExecOutcome, Row};
use crate::dialect::Dialect;
use crate::entity::Entity;
use crate::error::{OrmError, OrmResult};
use crate::merge::OnConflict;
use crate::monitor::{HookAction, QueryContext, QueryHook, QueryResult, QueryType};
use crate::returning::{OutParam, apply_outputs};
use crate::statement::{CompiledStatement, Statement};
use crate::types::Schema;
use crate::value::Value;
use std::sync::Arc;
use std::time::Instant;

/// Query returning the server version banner, e.g. `19.0.0.0.0`.
pub const VERSION_QUERY: &str = "SELECT VERSION FROM PRODUCT_COMPONENT_VERSION WHERE ROWNUM = 1";

/// Ask the server for its version.
pub async fn detect_server_version<C>(conn: &C, exec: &ExecContext) -> OrmResult<ServerVersion>
where
    C: Connection + ?Sized,
{
    let row = exec.run(conn.query_one(VERSION_QUERY, &[])).await?;
    match row.get_index(0) {
        Some(Value::Text(banner) | Value::Clob(banner)) => Ok(ServerVersion::parse(banner)),
        Some(other) => Err(OrmError::conversion(
            "VERSION",
            format!("expected a version banner, got {other:?}"),
        )),
        None => Err(OrmError::not_found("version query returned an empty row")),
    }
}

/// A connection paired with the dialect that compiles for it.
///
/// Every call runs under the session's [`ExecContext`] and passes through its
/// [`QueryHook`], if any.
pub struct Session<C> {
    conn: C,
    dialect: Dialect,
    exec: ExecContext,
    hook: Option<Arc<dyn QueryHook>>,
}

impl<C: Connection> Session<C> {
    pub fn new(conn: C, dialect: Dialect) -> Self {
        Self {
            conn,
            dialect,
            exec: ExecContext::default(),
            hook: None,
        }
    }

    /// Create a session, detecting the server version when `config` does not
    /// name one.
    pub async fn connect(conn: C, config: DialectConfig) -> OrmResult<Self> {
        let config = if config.server_version.is_known() {
            config
        } else {
            let version = detect_server_version(&conn, &ExecContext::default()).await?;
            tracing::debug!(target: "oraorm.sql", %version, "detected server version");
            config.with_server_version(version)
        };
        Ok(Self::new(conn, Dialect::new(config)))
    }

    pub fn with_hook<H: QueryHook + 'static>(mut self, hook: H) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    pub fn with_hook_arc(mut self, hook: Arc<dyn QueryHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn with_exec_context(mut self, exec: ExecContext) -> Self {
        self.exec = exec;
        self
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn exec_context(&self) -> &ExecContext {
        &self.exec
    }

    pub fn into_inner(self) -> C {
        self.conn
    }

    /// Insert (or upsert) `entities` one statement at a time, in order.
    ///
    /// Server-computed values read back through `RETURNING ... INTO` are
    /// written into zero-valued fields of each entity. Every statement is
    /// compiled before the first one runs, so compile errors leave the
    /// database untouched. Execution stops at the first failing row; when
    /// earlier rows already succeeded the error is
    /// [`OrmError::PartialBatch`] and those rows stay written.
    pub async fn create<E: Entity>(
        &self,
        schema: &Schema,
        entities: &mut [E],
        on_conflict: Option<&OnConflict>,
    ) -> OrmResult<u64> {
        let plans = self.dialect.compile_create(schema, entities, on_conflict)?;

        let mut rows_affected = 0u64;
        for (idx, (plan, entity)) in plans.into_iter().zip(entities.iter_mut()).enumerate() {
            match self.run_compiled(plan.statement, Some(entity)).await {
                Ok(n) => rows_affected += n,
                Err(err) if idx == 0 => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        target: "oraorm.sql",
                        table = %schema.table,
                        failed_row = idx,
                        rows_affected,
                        error = %err,
                        "batch insert stopped, earlier rows remain written"
                    );
                    return Err(OrmError::PartialBatch {
                        rows_affected,
                        failed_row: idx,
                        source: Box::new(err),
                    });
                }
            }
        }
        Ok(rows_affected)
    }

    /// Compile and execute a statement, returning the affected row count.
    ///
    /// Output parameters, if the statement has any, are bound and discarded.
    pub async fn execute(&self, stmt: &Statement<'_>) -> OrmResult<u64> {
        let compiled = self.dialect.compile(stmt)?;
        self.run_compiled::<dyn Entity>(compiled, None).await
    }

    /// Compile and execute a statement with `RETURNING ... INTO`, writing the
    /// returned values into zero-valued fields of `entity`.
    pub async fn execute_returning<E>(&self, stmt: &Statement<'_>, entity: &mut E) -> OrmResult<u64>
    where
        E: Entity + ?Sized,
    {
        let compiled = self.dialect.compile(stmt)?;
        self.run_compiled(compiled, Some(entity)).await
    }

    /// Compile and run a query.
    pub async fn query(&self, stmt: &Statement<'_>) -> OrmResult<Vec<Row>> {
        let compiled = self.dialect.compile(stmt)?;
        let binds = self.dialect.convert_binds(compiled.binds)?;
        let ctx = self.prepare(
            &compiled.sql,
            binds.len(),
            0,
            compiled.kind.into(),
            compiled.tag.as_deref(),
        )?;

        let start = Instant::now();
        let result = self.exec.run(self.conn.query(&ctx.exec_sql, &binds)).await;
        let reported = match &result {
            Ok(rows) => QueryResult::Rows(rows.len()),
            Err(e) => QueryResult::error(e.to_string()),
        };
        self.report(&ctx, start, &reported);
        result
    }

    /// `SAVEPOINT name`
    pub async fn savepoint(&self, name: &str) -> OrmResult<()> {
        let sql = format!("SAVEPOINT {}", self.savepoint_name(name)?);
        self.execute_sql(&sql, &[]).await.map(|_| ())
    }

    /// `ROLLBACK TO SAVEPOINT name`
    pub async fn rollback_to(&self, name: &str) -> OrmResult<()> {
        let sql = format!("ROLLBACK TO SAVEPOINT {}", self.savepoint_name(name)?);
        self.execute_sql(&sql, &[]).await.map(|_| ())
    }

    /// Execute raw SQL. Binds are converted first.
    pub async fn execute_sql(&self, sql: &str, binds: &[Value]) -> OrmResult<u64> {
        let binds = self.dialect.convert_binds(binds.to_vec())?;
        let ctx = self.prepare(sql, binds.len(), 0, QueryType::from_sql(sql), None)?;
        self.run_execute(&ctx, &binds).await
    }

    fn savepoint_name(&self, name: &str) -> OrmResult<String> {
        if name.trim().is_empty() {
            return Err(OrmError::validation("savepoint name must not be empty"));
        }
        Ok(self.dialect.quote(name))
    }

    async fn run_compiled<E>(&self, compiled: CompiledStatement, entity: Option<&mut E>) -> OrmResult<u64>
    where
        E: Entity + ?Sized,
    {
        let CompiledStatement {
            kind,
            sql,
            binds,
            out_params,
            tag,
        } = compiled;
        let binds = self.dialect.convert_binds(binds)?;
        let ctx = self.prepare(&sql, binds.len(), out_params.len(), kind.into(), tag.as_deref())?;

        if out_params.is_empty() {
            return self.run_execute(&ctx, &binds).await;
        }

        let outcome = self.run_returning(&ctx, &binds, &out_params).await?;
        if let Some(entity) = entity {
            let written = apply_outputs(entity, &out_params, outcome.out_values)?;
            tracing::trace!(target: "oraorm.sql", written, "applied output parameters");
        }
        Ok(outcome.rows_affected)
    }

    async fn run_execute(&self, ctx: &QueryContext, binds: &[Value]) -> OrmResult<u64> {
        let start = Instant::now();
        let result = self.exec.run(self.conn.execute(&ctx.exec_sql, binds)).await;
        let reported = match &result {
            Ok(n) => QueryResult::Affected(*n),
            Err(e) => QueryResult::error(e.to_string()),
        };
        self.report(ctx, start, &reported);
        result
    }

    async fn run_returning(
        &self,
        ctx: &QueryContext,
        binds: &[Value],
        outs: &[OutParam],
    ) -> OrmResult<ExecOutcome> {
        let start = Instant::now();
        let result = self
            .exec
            .run(self.conn.execute_returning(&ctx.exec_sql, binds, outs))
            .await;
        let reported = match &result {
            Ok(outcome) => QueryResult::Affected(outcome.rows_affected),
            Err(e) => QueryResult::error(e.to_string()),
        };
        self.report(ctx, start, &reported);
        result
    }

    fn prepare(
        &self,
        sql: &str,
        param_count: usize,
        out_count: usize,
        query_type: QueryType,
        tag: Option<&str>,
    ) -> OrmResult<QueryContext> {
        let mut ctx = QueryContext::new(sql, param_count).with_out_params(out_count);
        ctx.query_type = query_type;
        ctx.tag = tag.map(str::to_string);

        if let Some(hook) = &self.hook {
            match hook.before_query(&ctx) {
                HookAction::Continue => {}
                HookAction::ModifySql {
                    exec_sql,
                    canonical_sql,
                } => {
                    ctx.exec_sql = exec_sql;
                    if let Some(canonical_sql) = canonical_sql {
                        ctx.canonical_sql = canonical_sql;
                    }
                }
                HookAction::Abort(reason) => {
                    return Err(OrmError::validation(format!(
                        "Query aborted by hook: {reason}"
                    )));
                }
            }
        }

        tracing::debug!(
            target: "oraorm.sql",
            query_type = ?ctx.query_type,
            binds = param_count,
            outs = out_count,
            sql = %ctx.exec_sql,
            "executing statement"
        );
        Ok(ctx)
    }

    fn report(&self, ctx: &QueryContext, start: Instant, result: &QueryResult) {
        if let Some(hook) = &self.hook {
            hook.after_query(ctx, start.elapsed(), result);
        }
    }
}
