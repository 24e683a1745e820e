//! # oraorm
//!
//! An SQL dialect compiler for Oracle.
//!
//! Statements are assembled from ordered clauses and compiled into SQL text
//! with `:n` positional placeholders, an ordered bind list and a description
//! of the output parameters to read back.
//!
//! ## Features
//!
//! - **Quoting**: identifiers are quoted or upper-cased and left bare
//!   depending on the configured naming mode; reserved words are always quoted
//! - **Upserts**: `ON CONFLICT` semantics compiled to `MERGE INTO ... USING
//!   (SELECT ... FROM DUAL)`
//! - **Pagination**: `OFFSET/FETCH` on version 12 and later, `ROWNUM` and
//!   `ROW_NUMBER()` rewriting on older servers
//! - **Server-computed values**: identity and default columns read back via
//!   `RETURNING ... INTO` and written into the entity
//! - **Value conversion**: booleans, large strings, soft-delete markers and
//!   JSON normalized right before execution
//! - **Safe defaults**: UPDATE and DELETE require WHERE
//!
//! ```ignore
//! use oraorm::{Condition, Dialect, DialectConfig, Statement};
//!
//! let dialect = Dialect::new(DialectConfig::new().with_version_banner("11.2.0.4.0"));
//! let stmt = Statement::select(&users)
//!     .filter(Condition::eq("status", "active"))
//!     .limit(10)
//!     .offset(20);
//! let compiled = dialect.compile(&stmt)?;
//! ```

pub mod clause;
pub mod condition;
pub mod config;
pub mod connection;
pub mod create;
pub mod dialect;
pub mod entity;
pub mod error;
pub mod ident;
pub mod merge;
pub mod monitor;
pub mod pagination;
pub mod returning;
pub mod session;
pub mod sql;
pub mod statement;
pub mod types;
pub mod value;

pub use clause::{Assignment, Clause, ClauseName, OrderItem, SqlExpr};
pub use condition::Condition;
pub use config::{DialectConfig, PaginationStrategy, ServerVersion};
pub use connection::{
    CancelHandle, CancelToken, Connection, ExecContext, ExecOutcome, Row, cancel_pair,
};
pub use create::{CreatePlan, RowValues};
pub use dialect::Dialect;
pub use entity::{Entity, FieldId, Record};
pub use error::{DriverError, OrmError, OrmResult};
pub use ident::{Column, Quoter, Table, is_reserved_word};
pub use merge::{MERGE_SOURCE_ALIAS, MergeSpec, OnConflict, UpsertPlan};
pub use monitor::{
    CompositeHook, HookAction, QueryContext, QueryHook, QueryResult, QueryType, TracingSqlHook,
};
pub use pagination::PaginationSpec;
pub use returning::{OutParam, ReturningColumn};
pub use session::{Session, detect_server_version};
pub use sql::Sql;
pub use statement::{CompiledStatement, Statement, StatementKind};
pub use types::{DefaultValue, FieldMeta, LogicalType, Schema};
pub use value::{CustomValue, Value};
