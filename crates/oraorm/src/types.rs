//! Field metadata and physical column types.
//!
//! Entity metadata is supplied by the caller as a [`Schema`]: a table name plus
//! an ordered list of [`FieldMeta`]. The compiler only reads it.

use crate::config::DialectConfig;
use crate::entity::FieldId;
use crate::error::{OrmError, OrmResult};
use crate::value::Value;

/// Largest `VARCHAR2(n)` emitted when sizes count bytes.
pub const VARCHAR2_MAX_BYTES: u32 = 2000;

/// Largest `VARCHAR2(n CHAR)` emitted when sizes count characters.
pub const VARCHAR2_MAX_CHARS: u32 = 1000;

/// Size inferred for key/default/indexed strings when no default size is configured.
pub const INDEXED_STRING_SIZE: u32 = 191;

/// Marker default meaning "no default" in column definitions.
pub const NO_DEFAULT: &str = "(-)";

/// Logical type of an entity field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogicalType {
    Bool,
    Int,
    Uint,
    Float,
    String,
    Time,
    Bytes,
    /// A caller-declared column type, emitted verbatim.
    Custom(String),
}

impl LogicalType {
    pub fn name(&self) -> &str {
        match self {
            LogicalType::Bool => "bool",
            LogicalType::Int => "int",
            LogicalType::Uint => "uint",
            LogicalType::Float => "float",
            LogicalType::String => "string",
            LogicalType::Time => "time",
            LogicalType::Bytes => "bytes",
            LogicalType::Custom(name) => name,
        }
    }
}

/// Default declared on a field.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// A static value the column defaults to.
    Value(Value),
    /// A server-side expression (`SYSTIMESTAMP`, a sequence, ...).
    Expr(String),
}

/// Metadata for a single entity field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMeta {
    /// Column name.
    pub name: String,
    pub logical_type: LogicalType,
    /// Declared size: bits for integers, length for strings. `0` when undeclared.
    pub size: u32,
    pub primary_key: bool,
    pub auto_increment: bool,
    /// The column has a default (static or server-computed).
    pub has_default: bool,
    pub default_value: Option<DefaultValue>,
    pub not_null: bool,
    /// The column carries an index or unique constraint.
    pub indexed: bool,
}

impl FieldMeta {
    /// Create field metadata with no flags set.
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            size: 0,
            primary_key: false,
            auto_increment: false,
            has_default: false,
            default_value: None,
            not_null: false,
            indexed: false,
        }
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Identity column. Implies a server-computed default.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self.has_default = true;
        self
    }

    /// Server-computed default expression.
    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.has_default = true;
        self.default_value = Some(DefaultValue::Expr(expr.into()));
        self
    }

    /// Static default value.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.has_default = true;
        self.default_value = Some(DefaultValue::Value(value.into()));
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Whether the server computes this column when it is omitted from an insert.
    ///
    /// Such columns are read back through `RETURNING ... INTO`.
    pub fn server_computed(&self) -> bool {
        self.auto_increment
            || (self.has_default && !matches!(self.default_value, Some(DefaultValue::Value(_))))
    }
}

/// Table metadata: name plus ordered fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub table: String,
    pub fields: Vec<FieldMeta>,
}

impl Schema {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field.
    pub fn field(mut self, field: FieldMeta) -> Self {
        self.fields.push(field);
        self
    }

    /// Look up a field by column name.
    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .map(FieldId)
    }

    /// Field metadata by id.
    pub fn get(&self, id: FieldId) -> Option<&FieldMeta> {
        self.fields.get(id.0)
    }

    /// Fields with their ids, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldId, &FieldMeta)> {
        self.fields.iter().enumerate().map(|(i, f)| (FieldId(i), f))
    }

    /// Primary-key fields in declaration order.
    pub fn primary_fields(&self) -> Vec<(FieldId, &FieldMeta)> {
        self.iter().filter(|(_, f)| f.primary_key).collect()
    }

    /// The primary key used for default ordering.
    ///
    /// A single primary key wins; among composite keys a field named `id` is
    /// preferred. Otherwise there is none.
    pub fn prioritized_primary_field(&self) -> Option<&FieldMeta> {
        let primary = self.primary_fields();
        match primary.as_slice() {
            [] => None,
            [(_, only)] => Some(only),
            many => many
                .iter()
                .find(|(_, f)| f.name.eq_ignore_ascii_case("id"))
                .map(|(_, f)| *f),
        }
    }

    /// Fields the server computes on insert.
    pub fn server_computed_fields(&self) -> Vec<(FieldId, &FieldMeta)> {
        self.iter().filter(|(_, f)| f.server_computed()).collect()
    }
}

/// Map a field to its physical column type.
pub fn physical_type(field: &FieldMeta, config: &DialectConfig) -> OrmResult<String> {
    let sql_type = match &field.logical_type {
        LogicalType::Bool => "NUMBER(1)".to_string(),
        LogicalType::Int | LogicalType::Uint => {
            let base = if field.size > 0 && field.size <= 8 {
                "SMALLINT"
            } else {
                "INTEGER"
            };
            if field.auto_increment {
                format!("{base} GENERATED BY DEFAULT AS IDENTITY")
            } else {
                base.to_string()
            }
        }
        LogicalType::Float => "FLOAT".to_string(),
        LogicalType::String => string_type(field, config),
        LogicalType::Time => "TIMESTAMP WITH TIME ZONE".to_string(),
        LogicalType::Bytes => "BLOB".to_string(),
        LogicalType::Custom(name) => {
            let name = name.trim();
            if name.is_empty() {
                return Err(OrmError::compile(format!(
                    "invalid sql type for column {}: no physical type",
                    field.name
                )));
            }
            if name.eq_ignore_ascii_case("text") {
                "CLOB".to_string()
            } else if name.eq_ignore_ascii_case("varchar2") {
                string_type(field, config)
            } else {
                name.to_string()
            }
        }
    };
    Ok(sql_type)
}

fn string_type(field: &FieldMeta, config: &DialectConfig) -> String {
    let mut size = field.size;
    if size == 0 {
        if config.default_string_size > 0 {
            size = config.default_string_size;
        } else if field.primary_key || field.has_default || field.indexed {
            size = INDEXED_STRING_SIZE;
        }
    }

    if config.varchar_size_is_char_length {
        if size > 0 && size <= VARCHAR2_MAX_CHARS {
            return format!("VARCHAR2({size} CHAR)");
        }
    } else if size > 0 && size <= VARCHAR2_MAX_BYTES {
        return format!("VARCHAR2({size})");
    }
    "CLOB".to_string()
}

/// Full column definition: physical type, default and nullability.
pub fn column_definition(field: &FieldMeta, config: &DialectConfig) -> OrmResult<String> {
    let mut sql = physical_type(field, config)?;

    if field.has_default && !field.auto_increment {
        match &field.default_value {
            Some(DefaultValue::Value(value)) => {
                sql.push_str(" DEFAULT ");
                sql.push_str(&value.to_sql_literal());
            }
            Some(DefaultValue::Expr(expr)) if expr != NO_DEFAULT && !expr.is_empty() => {
                sql.push_str(" DEFAULT ");
                sql.push_str(expr);
            }
            _ => {}
        }
    }

    if field.not_null {
        sql.push_str(" NOT NULL");
    }
    Ok(sql)
}

/// Database type names reported interchangeably by the server.
///
/// Returns an empty list for unknown names.
pub fn type_aliases(database_type_name: &str) -> &'static [&'static str] {
    const BLOB: &[&str] = &["blob", "raw", "longraw", "ocibloblocator", "ocifilelocator"];
    const CLOB: &[&str] = &["clob", "nclob", "longvarchar", "ocicloblocator"];
    const CHAR: &[&str] = &["char", "nchar", "varchar", "varchar2", "nvarchar2"];
    const NUMBER: &[&str] = &["number", "integer", "smallint"];
    const DECIMAL: &[&str] = &["decimal", "numeric", "ibfloat", "ibdouble"];
    const TIMESTAMP: &[&str] = &["timestampdty", "timestamp", "date"];
    const TIMESTAMP_TZ: &[&str] = &["timestamptz_dty", "timestamp with time zone"];
    const TIMESTAMP_LTZ: &[&str] = &[
        "timestampltz_dty",
        "timestampeltz",
        "timestamp with local time zone",
    ];

    let name = database_type_name.to_ascii_lowercase();
    [
        BLOB,
        CLOB,
        CHAR,
        NUMBER,
        DECIMAL,
        TIMESTAMP,
        TIMESTAMP_TZ,
        TIMESTAMP_LTZ,
    ]
    .into_iter()
    .find(|group| group.contains(&name.as_str()))
    .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> DialectConfig {
        DialectConfig::new()
    }

    #[test]
    fn maps_scalar_types() {
        let c = cfg();
        let ty = |f: FieldMeta| physical_type(&f, &c).unwrap();
        assert_eq!(ty(FieldMeta::new("a", LogicalType::Bool)), "NUMBER(1)");
        assert_eq!(ty(FieldMeta::new("a", LogicalType::Int)), "INTEGER");
        assert_eq!(ty(FieldMeta::new("a", LogicalType::Int).size(8)), "SMALLINT");
        assert_eq!(ty(FieldMeta::new("a", LogicalType::Uint).size(64)), "INTEGER");
        assert_eq!(ty(FieldMeta::new("a", LogicalType::Float)), "FLOAT");
        assert_eq!(
            ty(FieldMeta::new("a", LogicalType::Time)),
            "TIMESTAMP WITH TIME ZONE"
        );
        assert_eq!(ty(FieldMeta::new("a", LogicalType::Bytes)), "BLOB");
        assert_eq!(
            ty(FieldMeta::new("id", LogicalType::Int).auto_increment()),
            "INTEGER GENERATED BY DEFAULT AS IDENTITY"
        );
    }

    #[test]
    fn maps_strings_by_size() {
        let c = cfg();
        let ty = |f: FieldMeta| physical_type(&f, &c).unwrap();
        assert_eq!(ty(FieldMeta::new("a", LogicalType::String)), "VARCHAR2(1024)");
        assert_eq!(
            ty(FieldMeta::new("a", LogicalType::String).size(100)),
            "VARCHAR2(100)"
        );
        assert_eq!(
            ty(FieldMeta::new("a", LogicalType::String).size(2000)),
            "VARCHAR2(2000)"
        );
        assert_eq!(ty(FieldMeta::new("a", LogicalType::String).size(2001)), "CLOB");
    }

    #[test]
    fn infers_size_for_keyed_strings_without_default_size() {
        let c = cfg().with_default_string_size(0);
        let ty = |f: FieldMeta| physical_type(&f, &c).unwrap();
        assert_eq!(
            ty(FieldMeta::new("code", LogicalType::String).primary_key()),
            "VARCHAR2(191)"
        );
        assert_eq!(
            ty(FieldMeta::new("code", LogicalType::String).indexed()),
            "VARCHAR2(191)"
        );
        assert_eq!(ty(FieldMeta::new("body", LogicalType::String)), "CLOB");
    }

    #[test]
    fn char_sized_strings() {
        let c = cfg().with_varchar_size_is_char_length(true);
        let ty = |f: FieldMeta| physical_type(&f, &c).unwrap();
        assert_eq!(
            ty(FieldMeta::new("a", LogicalType::String).size(200)),
            "VARCHAR2(200 CHAR)"
        );
        assert_eq!(ty(FieldMeta::new("a", LogicalType::String).size(1500)), "CLOB");
    }

    #[test]
    fn custom_types() {
        let c = cfg();
        let custom = |name: &str| physical_type(&FieldMeta::new("a", LogicalType::Custom(name.into())), &c);
        assert_eq!(custom("text").unwrap(), "CLOB");
        assert_eq!(custom("NUMBER(10,2)").unwrap(), "NUMBER(10,2)");
        assert_eq!(custom("varchar2").unwrap(), "VARCHAR2(1024)");
        let sized = FieldMeta::new("a", LogicalType::Custom("VARCHAR2".into())).size(64);
        assert_eq!(physical_type(&sized, &c).unwrap(), "VARCHAR2(64)");
        assert!(custom("").unwrap_err().is_compile());
    }

    #[test]
    fn column_definitions() {
        let c = cfg();
        let def = |f: FieldMeta| column_definition(&f, &c).unwrap();
        assert_eq!(
            def(FieldMeta::new("active", LogicalType::Bool).default_value(true).not_null()),
            "NUMBER(1) DEFAULT 1 NOT NULL"
        );
        assert_eq!(
            def(FieldMeta::new("created_at", LogicalType::Time).default_expr("SYSTIMESTAMP")),
            "TIMESTAMP WITH TIME ZONE DEFAULT SYSTIMESTAMP"
        );
        assert_eq!(
            def(FieldMeta::new("n", LogicalType::Int).default_expr(NO_DEFAULT)),
            "INTEGER"
        );
        assert_eq!(
            def(FieldMeta::new("name", LogicalType::String).default_value("x")),
            "VARCHAR2(1024) DEFAULT 'x'"
        );
    }

    #[test]
    fn prioritized_primary_field() {
        let single = Schema::new("users")
            .field(FieldMeta::new("user_id", LogicalType::Int).primary_key())
            .field(FieldMeta::new("name", LogicalType::String));
        assert_eq!(single.prioritized_primary_field().unwrap().name, "user_id");

        let composite = Schema::new("memberships")
            .field(FieldMeta::new("group_id", LogicalType::Int).primary_key())
            .field(FieldMeta::new("id", LogicalType::Int).primary_key());
        assert_eq!(composite.prioritized_primary_field().unwrap().name, "id");

        let none = Schema::new("logs").field(FieldMeta::new("line", LogicalType::String));
        assert!(none.prioritized_primary_field().is_none());
    }

    #[test]
    fn server_computed_fields() {
        let schema = Schema::new("users")
            .field(FieldMeta::new("id", LogicalType::Int).primary_key().auto_increment())
            .field(FieldMeta::new("created_at", LogicalType::Time).default_expr("SYSTIMESTAMP"))
            .field(FieldMeta::new("active", LogicalType::Bool).default_value(true));
        let names: Vec<_> = schema
            .server_computed_fields()
            .into_iter()
            .map(|(_, f)| f.name.as_str())
            .collect();
        assert_eq!(names, ["id", "created_at"]);
    }

    #[test]
    fn aliases() {
        assert!(type_aliases("VARCHAR2").contains(&"nvarchar2"));
        assert!(type_aliases("clob").contains(&"nclob"));
        assert!(type_aliases("geometry").is_empty());
    }
}
