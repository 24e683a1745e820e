//! Placeholder-tracking SQL buffer.
//!
//! [`Sql`] stores raw text and bind slots separately and numbers the
//! positional placeholders (`:1, :2, ...`) only when rendered, so fragments
//! can be built independently and spliced together in any order.

use crate::ident::Quoter;
use crate::returning::{OutParam, ReturningColumn};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqlPart {
    Raw(String),
    Bind(Value),
    /// Output parameter slot read back after execution.
    Out(ReturningColumn),
}

/// A SQL fragment with unnumbered bind slots.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use]
pub struct Sql {
    parts: Vec<SqlPart>,
}

/// Rendered SQL with its input binds and output parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub sql: String,
    pub binds: Vec<Value>,
    pub out_params: Vec<OutParam>,
}

impl Sql {
    /// Create a fragment with initial raw SQL.
    pub fn new(initial_sql: impl Into<String>) -> Self {
        let initial_sql = initial_sql.into();
        if initial_sql.is_empty() {
            return Self::empty();
        }
        Self {
            parts: vec![SqlPart::Raw(initial_sql)],
        }
    }

    /// Create an empty fragment.
    pub fn empty() -> Self {
        Self { parts: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Append raw SQL.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }
        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => last.push_str(sql),
            _ => self.parts.push(SqlPart::Raw(sql.to_string())),
        }
        self
    }

    /// Append a bind placeholder.
    pub fn push_bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.parts.push(SqlPart::Bind(value.into()));
        self
    }

    /// Append comma-separated placeholders. An empty list appends `NULL`.
    pub fn push_bind_list<I, V>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut iter = values.into_iter();
        let Some(first) = iter.next() else {
            return self.push("NULL");
        };
        self.push_bind(first);
        for v in iter {
            self.push(", ");
            self.push_bind(v);
        }
        self
    }

    /// Append an output parameter placeholder.
    pub fn push_out(&mut self, column: ReturningColumn) -> &mut Self {
        self.parts.push(SqlPart::Out(column));
        self
    }

    /// Append a quoted identifier.
    pub fn push_ident(&mut self, quoter: &Quoter, ident: &str) -> &mut Self {
        let mut s = String::new();
        quoter.write_quoted(&mut s, ident);
        self.push(&s)
    }

    /// Append another fragment, consuming it.
    pub fn push_sql(&mut self, other: Sql) -> &mut Self {
        for part in other.parts {
            match part {
                SqlPart::Raw(s) => {
                    self.push(&s);
                }
                part => self.parts.push(part),
            }
        }
        self
    }

    /// Prepend raw SQL.
    pub fn prepend(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }
        match self.parts.first_mut() {
            Some(SqlPart::Raw(first)) => first.insert_str(0, sql),
            _ => self.parts.insert(0, SqlPart::Raw(sql.to_string())),
        }
        self
    }

    /// Number of input binds.
    pub fn bind_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, SqlPart::Bind(_)))
            .count()
    }

    /// Render the SQL text only.
    pub fn to_sql(&self) -> String {
        self.clone().render().sql
    }

    /// Number placeholders in text order and split out binds.
    pub fn render(self) -> Rendered {
        let mut sql = String::new();
        let mut binds = Vec::new();
        let mut out_params = Vec::new();
        let mut position = 0usize;

        for part in self.parts {
            match part {
                SqlPart::Raw(s) => sql.push_str(&s),
                SqlPart::Bind(value) => {
                    position += 1;
                    sql.push(':');
                    sql.push_str(&position.to_string());
                    binds.push(value);
                }
                SqlPart::Out(column) => {
                    position += 1;
                    sql.push(':');
                    sql.push_str(&position.to_string());
                    out_params.push(column.into_out_param(position));
                }
            }
        }

        Rendered {
            sql,
            binds,
            out_params,
        }
    }
}
