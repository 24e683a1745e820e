//! The connection collaborator and the execution context.

use crate::error::{OrmError, OrmResult};
use crate::returning::OutParam;
use crate::value::Value;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

/// A result row: column names and values in select-list order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of `column`. Names are compared case-insensitively since the
    /// server reports unquoted names upper-cased.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|i| self.values.get(i))
    }

    /// Value at a 0-based position.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Like [`get`](Self::get), but a missing column is an error.
    pub fn try_get(&self, column: &str) -> OrmResult<&Value> {
        self.get(column)
            .ok_or_else(|| OrmError::not_found(format!("column {column} not in row")))
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Result of executing a statement with output parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    /// One value per output parameter, in parameter order.
    pub out_values: Vec<Value>,
}

/// A live connection that runs text SQL with `:n` positional placeholders.
///
/// Binds reach the connection already converted. Driver failures should be
/// wrapped with [`OrmError::execution`] so they surface unchanged.
pub trait Connection: Send + Sync {
    /// Execute a statement and return the affected row count.
    fn execute(
        &self,
        sql: &str,
        binds: &[Value],
    ) -> impl Future<Output = OrmResult<u64>> + Send;

    /// Execute a statement whose trailing placeholders are output parameters.
    ///
    /// `binds` fill the input placeholders; `outs` describe the output
    /// buffers to allocate and read back.
    fn execute_returning(
        &self,
        sql: &str,
        binds: &[Value],
        outs: &[OutParam],
    ) -> impl Future<Output = OrmResult<ExecOutcome>> + Send;

    /// Run a query and return all rows.
    fn query(
        &self,
        sql: &str,
        binds: &[Value],
    ) -> impl Future<Output = OrmResult<Vec<Row>>> + Send;

    /// Run a query and return the first row.
    ///
    /// Returns [`OrmError::NotFound`] when the query yields no rows.
    fn query_one(
        &self,
        sql: &str,
        binds: &[Value],
    ) -> impl Future<Output = OrmResult<Row>> + Send {
        async move {
            self.query(sql, binds)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| OrmError::not_found("query returned no rows"))
        }
    }
}

impl<C: Connection + ?Sized> Connection for &C {
    fn execute(
        &self,
        sql: &str,
        binds: &[Value],
    ) -> impl Future<Output = OrmResult<u64>> + Send {
        (**self).execute(sql, binds)
    }

    fn execute_returning(
        &self,
        sql: &str,
        binds: &[Value],
        outs: &[OutParam],
    ) -> impl Future<Output = OrmResult<ExecOutcome>> + Send {
        (**self).execute_returning(sql, binds, outs)
    }

    fn query(
        &self,
        sql: &str,
        binds: &[Value],
    ) -> impl Future<Output = OrmResult<Vec<Row>>> + Send {
        (**self).query(sql, binds)
    }
}

/// Create a linked cancellation handle and token.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

/// Signals cancellation to every clone of its [`CancelToken`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// A new token observing this handle.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observes a [`CancelHandle`].
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is signalled.
    ///
    /// Never resolves if the handle is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

/// Deadline and cancellation applied to each call against the connection.
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    timeout: Option<Duration>,
    cancel: Option<CancelToken>,
}

impl ExecContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort calls that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Abort calls once `token` is cancelled.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Run `future` under this context.
    ///
    /// The pending call is dropped on expiry or cancellation and the error is
    /// returned; whatever the server already committed stays committed.
    pub async fn run<T, F>(&self, future: F) -> OrmResult<T>
    where
        F: Future<Output = OrmResult<T>> + Send,
    {
        if self.is_cancelled() {
            return Err(OrmError::Cancelled);
        }
        if self.timeout.is_none() && self.cancel.is_none() {
            return future.await;
        }

        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let deadline = async {
            match self.timeout {
                Some(timeout) => {
                    tokio::time::sleep(timeout).await;
                    timeout
                }
                None => std::future::pending().await,
            }
        };

        tokio::pin!(future);
        tokio::select! {
            biased;
            result = &mut future => result,
            _ = cancelled => Err(OrmError::Cancelled),
            timeout = deadline => Err(OrmError::Timeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_lookup_ignores_case() {
        let row = Row::new(vec!["ID".into(), "NAME".into()], vec![Value::Int(1), "a".into()]);
        assert_eq!(row.get("id"), Some(&Value::Int(1)));
        assert_eq!(row.get_index(1), Some(&Value::Text("a".into())));
        assert!(row.try_get("missing").is_err());
    }

    #[tokio::test]
    async fn run_passes_results_through() {
        let ctx = ExecContext::new().with_timeout(Duration::from_secs(5));
        let out = ctx.run(async { Ok(7u64) }).await.unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn run_times_out() {
        let ctx = ExecContext::new().with_timeout(Duration::from_millis(10));
        let err = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn run_observes_cancellation() {
        let (handle, token) = cancel_pair();
        let ctx = ExecContext::new().with_cancel(token);
        let pending = ctx.run(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        });
        handle.cancel();
        assert!(pending.await.unwrap_err().is_cancelled());
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn dropped_handle_never_cancels() {
        let (handle, token) = cancel_pair();
        drop(handle);
        let ctx = ExecContext::new().with_cancel(token);
        assert_eq!(ctx.run(async { Ok(1) }).await.unwrap(), 1);
    }
}
