//! `RETURNING ... INTO` output parameters.
//!
//! Inserts that omit server-computed columns read them back through output
//! binds. The compiler appends one [`ReturningColumn`] slot per column; once
//! rendered, each slot becomes an [`OutParam`] with its placeholder position.
//! After execution [`apply_outputs`] writes the values back into the entity.

use crate::config::DialectConfig;
use crate::entity::{Entity, FieldId};
use crate::error::{OrmError, OrmResult};
use crate::types::{FieldMeta, LogicalType, Schema};
use crate::value::Value;

/// Byte size of numeric output buffers.
const NUMBER_BUFFER_SIZE: u32 = 22;

/// Byte size of `TIMESTAMP WITH TIME ZONE` output buffers.
const TIMESTAMP_TZ_BUFFER_SIZE: u32 = 13;

/// A column read back after execution, before its placeholder is numbered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturningColumn {
    pub field: FieldId,
    pub column: String,
    pub logical_type: LogicalType,
    /// Output buffer size in bytes.
    pub size: u32,
}

impl ReturningColumn {
    /// Describe the output slot for a field.
    pub fn for_field(field: FieldId, meta: &FieldMeta, config: &DialectConfig) -> Self {
        Self {
            field,
            column: meta.name.clone(),
            logical_type: meta.logical_type.clone(),
            size: buffer_size(meta, config),
        }
    }

    pub(crate) fn into_out_param(self, position: usize) -> OutParam {
        OutParam {
            position,
            field: self.field,
            column: self.column,
            logical_type: self.logical_type,
            size: self.size,
        }
    }
}

/// An output parameter bound at a fixed placeholder position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutParam {
    /// 1-based placeholder position (`:position`).
    pub position: usize,
    pub field: FieldId,
    pub column: String,
    pub logical_type: LogicalType,
    pub size: u32,
}

fn buffer_size(meta: &FieldMeta, config: &DialectConfig) -> u32 {
    match meta.logical_type {
        LogicalType::Bool | LogicalType::Int | LogicalType::Uint | LogicalType::Float => {
            NUMBER_BUFFER_SIZE
        }
        LogicalType::Time => TIMESTAMP_TZ_BUFFER_SIZE,
        LogicalType::String | LogicalType::Bytes | LogicalType::Custom(_) => {
            if meta.size > 0 {
                meta.size
            } else {
                config.default_string_size
            }
        }
    }
}

/// Output slots for every server-computed field of `schema`.
pub fn returning_columns(schema: &Schema, config: &DialectConfig) -> Vec<ReturningColumn> {
    schema
        .server_computed_fields()
        .into_iter()
        .map(|(id, meta)| ReturningColumn::for_field(id, meta, config))
        .collect()
}

/// Write output values back into `entity`.
///
/// A field is only written when its current value is zero and the returned
/// value is not `NULL`; explicitly supplied values are never overwritten.
/// Returns the number of fields written.
pub fn apply_outputs<E>(entity: &mut E, params: &[OutParam], values: Vec<Value>) -> OrmResult<usize>
where
    E: Entity + ?Sized,
{
    if params.len() != values.len() {
        return Err(OrmError::validation(format!(
            "expected {} output value(s), got {}",
            params.len(),
            values.len()
        )));
    }

    let mut written = 0;
    for (param, value) in params.iter().zip(values) {
        if value.is_null() || !entity.value(param.field).is_zero() {
            continue;
        }
        entity.set_value(param.field, value)?;
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Record;

    fn schema() -> Schema {
        Schema::new("users")
            .field(FieldMeta::new("id", LogicalType::Int).primary_key().auto_increment())
            .field(FieldMeta::new("name", LogicalType::String).size(50))
            .field(FieldMeta::new("code", LogicalType::String).default_expr("SYS_GUID()"))
    }

    fn params(schema: &Schema) -> Vec<OutParam> {
        returning_columns(schema, &DialectConfig::new())
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.into_out_param(i + 2))
            .collect()
    }

    #[test]
    fn sizes_follow_field_metadata() {
        let schema = schema();
        let cols = returning_columns(&schema, &DialectConfig::new());
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].column, "id");
        assert_eq!(cols[0].size, NUMBER_BUFFER_SIZE);
        assert_eq!(cols[1].column, "code");
        assert_eq!(cols[1].size, 1024);
    }

    #[test]
    fn writes_only_zero_fields() {
        let schema = schema();
        let params = params(&schema);
        let mut record = Record::from_pairs(&schema, [("id", Value::Int(0)), ("name", "a".into())]).unwrap();
        let written = apply_outputs(&mut record, &params, vec![Value::Int(7), "G1".into()]).unwrap();
        assert_eq!(written, 2);
        assert_eq!(record.get(&schema, "id"), Some(&Value::Int(7)));
        assert_eq!(record.get(&schema, "code"), Some(&Value::Text("G1".into())));

        let mut preset = Record::from_pairs(&schema, [("id", 42)]).unwrap();
        apply_outputs(&mut preset, &params, vec![Value::Int(8), Value::Null]).unwrap();
        assert_eq!(preset.get(&schema, "id"), Some(&Value::Int(42)));
        assert_eq!(preset.get(&schema, "code"), Some(&Value::Null));
    }

    #[test]
    fn rejects_mismatched_outputs() {
        let schema = schema();
        let mut record = Record::new(&schema);
        let err = apply_outputs(&mut record, &params(&schema), vec![Value::Int(1)]).unwrap_err();
        assert!(err.to_string().contains("expected 2"));
    }
}
