//! Entity access.
//!
//! The compiler never inspects user structs directly. It reads and writes
//! fields through [`Entity`], addressed by the field's position in the
//! [`Schema`](crate::Schema).

use crate::error::{OrmError, OrmResult};
use crate::types::Schema;
use crate::value::Value;

/// Position of a field within its [`Schema`](crate::Schema).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub usize);

/// Read/write access to an entity's fields.
pub trait Entity {
    /// Current value of a field.
    fn value(&self, field: FieldId) -> Value;

    /// Overwrite a field, e.g. with a server-generated key.
    fn set_value(&mut self, field: FieldId, value: Value) -> OrmResult<()>;
}

/// A schema-shaped row of values.
///
/// Useful when entities are assembled dynamically rather than from structs.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    /// A record with every field set to `NULL`.
    pub fn new(schema: &Schema) -> Self {
        Self {
            values: vec![Value::Null; schema.fields.len()],
        }
    }

    /// Build a record from `(column, value)` pairs. Unlisted fields are `NULL`.
    pub fn from_pairs<I, K, V>(schema: &Schema, pairs: I) -> OrmResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut record = Self::new(schema);
        for (column, value) in pairs {
            let column = column.as_ref();
            let id = schema.field_id(column).ok_or_else(|| {
                OrmError::validation(format!("unknown column {column} for {}", schema.table))
            })?;
            record.values[id.0] = value.into();
        }
        Ok(record)
    }

    /// Value of a field by column name.
    pub fn get(&self, schema: &Schema, column: &str) -> Option<&Value> {
        schema.field_id(column).and_then(|id| self.values.get(id.0))
    }
}

impl Entity for Record {
    fn value(&self, field: FieldId) -> Value {
        self.values.get(field.0).cloned().unwrap_or(Value::Null)
    }

    fn set_value(&mut self, field: FieldId, value: Value) -> OrmResult<()> {
        match self.values.get_mut(field.0) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(OrmError::validation(format!(
                "field {} out of range",
                field.0
            ))),
        }
    }
}
