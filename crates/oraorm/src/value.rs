//! Bind values and their conversion to driver-native representations.
//!
//! Entities hand the compiler logical [`Value`]s. Before execution every bind is
//! passed through [`convert_value`], which rewrites the types the server has no
//! native notion of:
//!
//! 1. optional wrappers are unwrapped (`None` becomes `NULL`),
//! 2. booleans become `1`/`0`,
//! 3. a cleared soft-delete marker becomes a typed timestamp `NULL`,
//! 4. custom values exposing an instant become timestamps,
//! 5. long strings become CLOBs.
//!
//! Conversion is idempotent: converting an already converted value returns it
//! unchanged.

use crate::error::{OrmError, OrmResult};
use crate::types::LogicalType;
use chrono::{DateTime, FixedOffset, Utc};
use regex::{Captures, Regex};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A user-defined value type.
///
/// Implementations expose whichever capabilities they have; a value with none
/// of them cannot be bound and fails conversion.
pub trait CustomValue: fmt::Debug + Send + Sync {
    /// Type name used in conversion errors.
    fn type_name(&self) -> &str;

    /// Instant capability.
    ///
    /// `Some(Some(t))` is a set instant, `Some(None)` the zero instant, and
    /// `None` means the type is not time-like.
    fn instant(&self) -> Option<Option<DateTime<FixedOffset>>> {
        None
    }

    /// Driver-native scalar for this value, if any.
    fn to_value(&self) -> Option<Value> {
        None
    }

    fn is_zero(&self) -> bool {
        false
    }
}

/// A bind value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    /// `NULL` the driver should bind with a specific type.
    TypedNull(LogicalType),
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    /// Large text streamed as a CLOB.
    Clob(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<FixedOffset>),
    /// Soft-delete marker. `None` means "not deleted".
    SoftDelete(Option<DateTime<FixedOffset>>),
    Optional(Option<Box<Value>>),
    Json(serde_json::Value),
    Custom(Arc<dyn CustomValue>),
}

impl Value {
    /// Whether the value is SQL `NULL`.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null | Value::TypedNull(_) | Value::Optional(None) => true,
            Value::Optional(Some(inner)) => inner.is_null(),
            Value::Json(json) => json.is_null(),
            _ => false,
        }
    }

    /// Whether the value is the zero value of its type.
    ///
    /// Output parameters are only written back into zero-valued fields.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null | Value::TypedNull(_) => true,
            Value::Bool(b) => !*b,
            Value::Int(n) => *n == 0,
            Value::UInt(n) => *n == 0,
            Value::Float(f) => *f == 0.0,
            Value::Text(s) | Value::Clob(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Timestamp(_) => false,
            Value::SoftDelete(t) => t.is_none(),
            Value::Optional(None) => true,
            Value::Optional(Some(inner)) => inner.is_zero(),
            Value::Json(json) => json.is_null(),
            Value::Custom(custom) => custom.is_zero(),
        }
    }

    /// Render the value as a SQL literal.
    ///
    /// Only used for logging and static column defaults, never for execution.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null | Value::TypedNull(_) | Value::SoftDelete(None) | Value::Optional(None) => {
                "NULL".to_string()
            }
            Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
            Value::Int(n) => n.to_string(),
            Value::UInt(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) | Value::Clob(s) => string_literal(s),
            Value::Bytes(bytes) => {
                let mut hex = String::with_capacity(bytes.len() * 2 + 12);
                hex.push_str("HEXTORAW('");
                for b in bytes {
                    hex.push_str(&format!("{b:02X}"));
                }
                hex.push_str("')");
                hex
            }
            Value::Timestamp(t) | Value::SoftDelete(Some(t)) => format!(
                "TIMESTAMP '{}'",
                t.format("%Y-%m-%d %H:%M:%S%.6f %:z")
            ),
            Value::Optional(Some(inner)) => inner.to_sql_literal(),
            Value::Json(json) if json.is_null() => "NULL".to_string(),
            Value::Json(json) => string_literal(&json.to_string()),
            Value::Custom(custom) => match (custom.instant(), custom.to_value()) {
                (Some(Some(t)), _) => Value::Timestamp(t).to_sql_literal(),
                (Some(None), _) => "NULL".to_string(),
                (None, Some(value)) if !matches!(value, Value::Custom(_)) => value.to_sql_literal(),
                _ => format!("<{}>", custom.type_name()),
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (TypedNull(a), TypedNull(b)) => a == b,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (UInt(a), UInt(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Text(a), Text(b)) => a == b,
            (Clob(a), Clob(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Timestamp(a), Timestamp(b)) => a == b,
            (SoftDelete(a), SoftDelete(b)) => a == b,
            (Optional(a), Optional(b)) => a == b,
            (Json(a), Json(b)) => a == b,
            (Custom(a), Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

macro_rules! impl_from_int {
    ($variant:ident => $($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_int!(Int => i8, i16, i32, i64);
impl_from_int!(UInt => u8, u16, u32, u64);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v.fixed_offset())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        Value::Optional(v.map(|inner| Box::new(inner.into())))
    }
}

/// Normalize a bind value for the driver.
///
/// Strings longer than `large_string_threshold` characters are promoted to
/// [`Value::Clob`].
pub fn convert_value(value: Value, large_string_threshold: usize) -> OrmResult<Value> {
    match value {
        Value::Optional(None) => Ok(Value::Null),
        Value::Optional(Some(inner)) => convert_value(*inner, large_string_threshold),
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        Value::SoftDelete(None) => Ok(Value::TypedNull(LogicalType::Time)),
        Value::SoftDelete(Some(t)) => Ok(Value::Timestamp(t)),
        Value::Custom(custom) => convert_custom(custom.as_ref(), large_string_threshold),
        Value::Text(s) if exceeds(&s, large_string_threshold) => Ok(Value::Clob(s)),
        Value::Json(serde_json::Value::Null) => Ok(Value::Null),
        Value::Json(json) => convert_value(Value::Text(json.to_string()), large_string_threshold),
        Value::Float(f) if !f.is_finite() => Err(OrmError::conversion(
            "f64",
            format!("{f} has no NUMBER representation"),
        )),
        other => Ok(other),
    }
}

fn exceeds(s: &str, threshold: usize) -> bool {
    // byte length bounds char count from above
    s.len() > threshold && s.chars().count() > threshold
}

fn convert_custom(custom: &dyn CustomValue, large_string_threshold: usize) -> OrmResult<Value> {
    match custom.instant() {
        Some(Some(t)) => return Ok(Value::Timestamp(t)),
        Some(None) => return Ok(Value::TypedNull(LogicalType::Time)),
        None => {}
    }
    match custom.to_value() {
        Some(Value::Custom(_)) => Err(OrmError::conversion(
            custom.type_name(),
            "custom value converts to another custom value",
        )),
        Some(value) => convert_value(value, large_string_threshold),
        None => Err(OrmError::conversion(
            custom.type_name(),
            "no physical representation",
        )),
    }
}

/// Quote text as a string literal.
///
/// Text containing `'` uses alternative quoting (`q'[...]'`) with the first
/// delimiter pair whose closing form does not occur in the text, falling back
/// to doubling single quotes.
pub fn string_literal(s: &str) -> String {
    if !s.contains('\'') {
        return format!("'{s}'");
    }
    for (open, close) in [('[', ']'), ('{', '}'), ('<', '>'), ('(', ')')] {
        let terminator = format!("{close}'");
        if !s.contains(&terminator) {
            return format!("q'{open}{s}{close}'");
        }
    }
    format!("'{}'", s.replace('\'', "''"))
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r":(\d+)").expect("invalid built-in placeholder regex"))
}

/// Inline bind values into SQL for display.
///
/// Placeholders without a matching bind are left as is.
pub fn explain(sql: &str, binds: &[Value]) -> String {
    placeholder_regex()
        .replace_all(sql, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| binds.get(i))
                .map(Value::to_sql_literal)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
