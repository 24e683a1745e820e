//! A scripted in-memory connection for integration tests.

#![allow(dead_code)]

use oraorm::session::VERSION_QUERY;
use oraorm::{
    Connection, ExecOutcome, FieldMeta, LogicalType, OrmError, OrmResult, OutParam, Row, Schema,
    Value,
};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

/// One call observed by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub sql: String,
    pub binds: Vec<Value>,
    pub outs: Vec<OutParam>,
}

pub struct MockConnection {
    log: Mutex<Vec<Executed>>,
    calls: AtomicUsize,
    next_id: AtomicI64,
    fail_on_call: Option<usize>,
    version: String,
    delay: Option<Duration>,
    rows: Vec<Row>,
}

impl Default for MockConnection {
    fn default() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            next_id: AtomicI64::new(100),
            fail_on_call: None,
            version: "19.0.0.0.0".to_string(),
            delay: None,
            rows: Vec::new(),
        }
    }
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `banner` from the version query.
    pub fn with_version(mut self, banner: &str) -> Self {
        self.version = banner.to_string();
        self
    }

    /// Fail the `n`-th call (0-based) with a driver error.
    pub fn failing_on(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Rows returned by every non-version query.
    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    pub fn executed(&self) -> Vec<Executed> {
        self.log.lock().unwrap().clone()
    }

    pub fn sql_log(&self) -> Vec<String> {
        self.executed().into_iter().map(|e| e.sql).collect()
    }

    async fn record(&self, sql: &str, binds: &[Value], outs: &[OutParam]) -> OrmResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_call == Some(call) {
            return Err(OrmError::execution(std::io::Error::other(
                "ORA-00001: unique constraint violated",
            )));
        }
        self.log.lock().unwrap().push(Executed {
            sql: sql.to_string(),
            binds: binds.to_vec(),
            outs: outs.to_vec(),
        });
        Ok(())
    }

    fn generated(&self, out: &OutParam) -> Value {
        match out.logical_type {
            LogicalType::Int | LogicalType::Uint => {
                Value::Int(self.next_id.fetch_add(1, Ordering::SeqCst))
            }
            _ => Value::Text(format!("generated {}", out.column)),
        }
    }
}

impl Connection for MockConnection {
    async fn execute(&self, sql: &str, binds: &[Value]) -> OrmResult<u64> {
        self.record(sql, binds, &[]).await?;
        Ok(1)
    }

    async fn execute_returning(
        &self,
        sql: &str,
        binds: &[Value],
        outs: &[OutParam],
    ) -> OrmResult<ExecOutcome> {
        self.record(sql, binds, outs).await?;
        Ok(ExecOutcome {
            rows_affected: 1,
            out_values: outs.iter().map(|o| self.generated(o)).collect(),
        })
    }

    async fn query(&self, sql: &str, binds: &[Value]) -> OrmResult<Vec<Row>> {
        if sql == VERSION_QUERY {
            return Ok(vec![Row::new(
                vec!["VERSION".into()],
                vec![Value::Text(self.version.clone())],
            )]);
        }
        self.record(sql, binds, &[]).await?;
        Ok(self.rows.clone())
    }
}

/// `users(id identity pk, name, email)`
pub fn users() -> Schema {
    Schema::new("users")
        .field(FieldMeta::new("id", LogicalType::Int).primary_key().auto_increment())
        .field(FieldMeta::new("name", LogicalType::String).size(100))
        .field(FieldMeta::new("email", LogicalType::String).size(255))
}
