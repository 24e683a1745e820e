//! Identifier quoting.
//!
//! Identifiers arrive as dotted paths (`schema.table.column`), possibly with
//! segments the caller already quoted (`"Mixed"."Case"`). [`Quoter`] normalizes
//! them in a single left-to-right scan:
//!
//! - every unquoted segment is wrapped in `"` (or upper-cased and left bare when
//!   naming is case-insensitive and the segment is a plain, non-reserved word),
//! - quote characters inside a segment are doubled,
//! - segments the caller already quoted are passed through untouched, so quoting
//!   is idempotent,
//! - `*` is never quoted.
//!
//! # Example
//! ```ignore
//! use oraorm::{DialectConfig, Quoter};
//!
//! let q = Quoter::new(&DialectConfig::new().with_case_sensitive_naming(true));
//! assert_eq!(q.quote("users.id"), r#""users"."id""#);
//! ```

use crate::config::DialectConfig;

/// Words that must be quoted to be used as identifiers.
///
/// Sorted for binary search.
const RESERVED_WORDS: &[&str] = &[
    "ACCESS", "ADD", "ALL", "ALTER", "AND", "ANY", "AS", "ASC", //
    "AUDIT", "BETWEEN", "BY", "CHAR", "CHECK", "CLUSTER", "COLUMN", "COMMENT", //
    "COMPRESS", "CONNECT", "CREATE", "CURRENT", "DATE", "DECIMAL", "DEFAULT", "DELETE", //
    "DESC", "DISTINCT", "DROP", "ELSE", "EXCLUSIVE", "EXISTS", "FILE", "FLOAT", //
    "FOR", "FROM", "GRANT", "GROUP", "HAVING", "IDENTIFIED", "IMMEDIATE", "IN", //
    "INCREMENT", "INDEX", "INITIAL", "INSERT", "INTEGER", "INTERSECT", "INTO", "IS", //
    "LEVEL", "LIKE", "LOCK", "LONG", "MAXEXTENTS", "MINUS", "MLSLABEL", "MODE", //
    "MODIFY", "NOAUDIT", "NOCOMPRESS", "NOT", "NOWAIT", "NULL", "NUMBER", "OF", //
    "OFFLINE", "ON", "ONLINE", "OPTION", "OR", "ORDER", "PCTFREE", "PRIOR", //
    "PRIVILEGES", "PUBLIC", "RAW", "RENAME", "RESOURCE", "REVOKE", "ROW", "ROWID", //
    "ROWNUM", "ROWS", "SELECT", "SESSION", "SET", "SHARE", "SIZE", "SMALLINT", //
    "START", "SUCCESSFUL", "SYNONYM", "SYSDATE", "TABLE", "THEN", "TO", "TRIGGER", //
    "UID", "UNION", "UNIQUE", "UPDATE", "USER", "VALIDATE", "VALUES", "VARCHAR", //
    "VARCHAR2", "VIEW", "WHENEVER", "WHERE", "WITH",
];

/// Whether `word` is a reserved word (case-insensitive).
pub fn is_reserved_word(word: &str) -> bool {
    let upper = word.to_ascii_uppercase();
    RESERVED_WORDS.binary_search(&upper.as_str()).is_ok()
}

/// Whether `segment` may appear unquoted: `[A-Za-z][A-Za-z0-9_$#]*`.
fn is_plain_word(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '#'))
}

/// One dotted segment, holding its logical (unescaped) content.
#[derive(Debug, Default, PartialEq, Eq)]
struct Segment {
    text: String,
    /// The caller wrapped this segment in quotes.
    quoted: bool,
}

fn push_quotes(out: &mut String, count: usize) {
    for _ in 0..count {
        out.push('"');
    }
}

/// Split an identifier into segments.
///
/// State carried across the scan:
/// - `at_start`: the previous character was a `.` delimiter (or input start),
/// - `in_quotes`: a caller-quoted segment is open,
/// - `pending`: consecutive `"` characters not yet resolved.
///
/// Inside a caller-quoted segment an even run of quotes is escaped content and
/// an odd run ends the segment; a `.` only splits once the segment is closed.
/// An opening quote that is never closed is content, and the input after it
/// is split again.
fn split_segments(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = Segment::default();
    let mut at_start = true;
    let mut in_quotes = false;
    let mut pending = 0usize;
    let mut open_at = 0usize;

    for (i, ch) in input.char_indices() {
        match ch {
            '"' if at_start => {
                open_at = i;
                in_quotes = true;
                current.quoted = true;
                at_start = false;
            }
            '"' => pending += 1,
            '.' if in_quotes => {
                push_quotes(&mut current.text, pending / 2);
                if pending % 2 == 1 {
                    segments.push(std::mem::take(&mut current));
                    in_quotes = false;
                    at_start = true;
                } else {
                    current.text.push('.');
                }
                pending = 0;
            }
            '.' => {
                push_quotes(&mut current.text, pending);
                pending = 0;
                segments.push(std::mem::take(&mut current));
                at_start = true;
            }
            _ => {
                let literal = if in_quotes {
                    pending.div_ceil(2)
                } else {
                    pending
                };
                push_quotes(&mut current.text, literal);
                pending = 0;
                current.text.push(ch);
                at_start = false;
            }
        }
    }

    if in_quotes && pending % 2 == 0 {
        let mut tail = split_segments(&input[open_at + 1..]);
        if let Some(first) = tail.first_mut() {
            first.text.insert(0, '"');
        }
        segments.extend(tail);
        return segments;
    }

    let trailing = if in_quotes { pending / 2 } else { pending };
    push_quotes(&mut current.text, trailing);
    segments.push(current);
    segments
}

/// Quotes identifiers according to the dialect's naming mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quoter {
    case_sensitive: bool,
}

impl Quoter {
    /// Create a quoter for the given configuration.
    pub fn new(config: &DialectConfig) -> Self {
        Self {
            case_sensitive: config.naming_case_sensitive,
        }
    }

    /// Quote an identifier, returning a new string.
    pub fn quote(&self, ident: &str) -> String {
        let mut out = String::with_capacity(ident.len() + 2);
        self.write_quoted(&mut out, ident);
        out
    }

    /// Append the quoted form of `ident` to `out`.
    ///
    /// An empty identifier writes nothing.
    pub fn write_quoted(&self, out: &mut String, ident: &str) {
        if ident.is_empty() {
            return;
        }
        for (i, segment) in split_segments(ident).into_iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            self.write_segment(out, segment);
        }
    }

    fn write_segment(&self, out: &mut String, segment: Segment) {
        if !segment.quoted && segment.text == "*" {
            out.push('*');
            return;
        }
        if segment.text.is_empty() && !segment.quoted {
            return;
        }
        if segment.quoted || self.case_sensitive {
            write_delimited(out, &segment.text);
            return;
        }

        let upper = segment.text.to_uppercase();
        if is_plain_word(&upper) && !is_reserved_word(&upper) {
            out.push_str(&upper);
        } else {
            write_delimited(out, &upper);
        }
    }
}

fn write_delimited(out: &mut String, text: &str) {
    out.push('"');
    for ch in text.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
}

/// A column reference, optionally qualified by a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub table: Option<String>,
    pub name: String,
    pub alias: Option<String>,
}

impl Column {
    /// An unqualified column.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
            alias: None,
        }
    }

    /// A column qualified by `table`.
    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
            alias: None,
        }
    }

    /// Select this column under another name.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Write the column reference (without alias).
    pub fn write_ref(&self, quoter: &Quoter, out: &mut String) {
        if let Some(table) = &self.table {
            quoter.write_quoted(out, table);
            out.push('.');
        }
        quoter.write_quoted(out, &self.name);
    }

    /// Write the column as a select item (`ref AS alias`).
    pub fn write_select_item(&self, quoter: &Quoter, out: &mut String) {
        self.write_ref(quoter, out);
        if let Some(alias) = &self.alias {
            out.push_str(" AS ");
            quoter.write_quoted(out, alias);
        }
    }
}

impl From<&str> for Column {
    fn from(name: &str) -> Self {
        Column::new(name)
    }
}

impl From<String> for Column {
    fn from(name: String) -> Self {
        Column::new(name)
    }
}

/// A table reference with an optional alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub alias: Option<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Write `name [alias]`. Table aliases take no `AS` keyword.
    pub fn write_sql(&self, quoter: &Quoter, out: &mut String) {
        quoter.write_quoted(out, &self.name);
        if let Some(alias) = &self.alias {
            out.push(' ');
            quoter.write_quoted(out, alias);
        }
    }
}

impl From<&str> for Table {
    fn from(name: &str) -> Self {
        Table::new(name)
    }
}

impl From<String> for Table {
    fn from(name: String) -> Self {
        Table::new(name)
    }
}
