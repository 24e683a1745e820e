//! Dialect configuration.
//!
//! A [`DialectConfig`] is built once (usually after detecting the server version)
//! and passed by reference into every compilation. It is never mutated while a
//! statement is being compiled.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the scratch single-row table.
pub const DEFAULT_DUMMY_TABLE: &str = "DUAL";

/// Default VARCHAR2 size used for strings declared without a size.
pub const DEFAULT_STRING_SIZE: u32 = 1024;

/// Strings longer than this (in chars) are bound as CLOBs.
pub const DEFAULT_LARGE_STRING_THRESHOLD: usize = 2000;

/// First major version supporting `OFFSET ... FETCH NEXT ...`.
pub const MODERN_PAGINATION_MAJOR: u32 = 12;

/// Detected server version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerVersion {
    /// Major version. `0` means unknown.
    pub major: u32,
    pub minor: u32,
}

impl ServerVersion {
    /// Create a version from its major/minor components.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse a version banner such as `19.0.0.0.0` or `11.2.0.4.0`.
    ///
    /// Unparseable input yields the unknown version (`0.0`).
    pub fn parse(banner: &str) -> Self {
        let mut parts = banner.trim().split('.');
        let major = parts
            .next()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .unwrap_or(0);
        let minor = parts
            .next()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .unwrap_or(0);
        Self { major, minor }
    }

    /// Whether the version is known.
    pub fn is_known(&self) -> bool {
        self.major > 0
    }

    /// Whether `OFFSET/FETCH` pagination can be used.
    ///
    /// Unknown versions are treated as modern.
    pub fn supports_offset_fetch(&self) -> bool {
        !self.is_known() || self.major >= MODERN_PAGINATION_MAJOR
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Pagination strategy selected from the server version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStrategy {
    /// `OFFSET n ROWS FETCH NEXT m ROWS ONLY`
    OffsetFetch,
    /// `ROWNUM` predicates and `ROW_NUMBER()` wrapping.
    RowNum,
}

/// Per-dialect configuration, read-only during compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialectConfig {
    /// Detected server version.
    pub server_version: ServerVersion,
    /// Whether identifiers keep their case (every segment is quoted verbatim).
    ///
    /// When `false`, identifiers are upper-cased and only quoted when required.
    pub naming_case_sensitive: bool,
    /// Size given to string fields declared without a size. `0` disables it.
    pub default_string_size: u32,
    /// Whether declared VARCHAR2 sizes count characters rather than bytes.
    pub varchar_size_is_char_length: bool,
    /// String bind values longer than this are promoted to CLOBs.
    pub large_string_threshold: usize,
    /// Scratch single-row table used by synthetic row sources.
    pub dummy_table: String,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self {
            server_version: ServerVersion::default(),
            naming_case_sensitive: false,
            default_string_size: DEFAULT_STRING_SIZE,
            varchar_size_is_char_length: false,
            large_string_threshold: DEFAULT_LARGE_STRING_THRESHOLD,
            dummy_table: DEFAULT_DUMMY_TABLE.to_string(),
        }
    }
}

impl DialectConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server version.
    pub fn with_server_version(mut self, version: ServerVersion) -> Self {
        self.server_version = version;
        self
    }

    /// Set the server version from a version banner.
    pub fn with_version_banner(mut self, banner: &str) -> Self {
        self.server_version = ServerVersion::parse(banner);
        self
    }

    /// Keep identifier case and quote every identifier.
    pub fn with_case_sensitive_naming(mut self, enabled: bool) -> Self {
        self.naming_case_sensitive = enabled;
        self
    }

    /// Set the size used for strings declared without a size.
    pub fn with_default_string_size(mut self, size: u32) -> Self {
        self.default_string_size = size;
        self
    }

    /// Count VARCHAR2 sizes in characters.
    pub fn with_varchar_size_is_char_length(mut self, enabled: bool) -> Self {
        self.varchar_size_is_char_length = enabled;
        self
    }

    /// Set the CLOB promotion threshold for string binds.
    pub fn with_large_string_threshold(mut self, threshold: usize) -> Self {
        self.large_string_threshold = threshold;
        self
    }

    /// Set the scratch single-row table.
    pub fn with_dummy_table(mut self, table: impl Into<String>) -> Self {
        self.dummy_table = table.into();
        self
    }

    /// Pagination strategy for this server.
    pub fn pagination_strategy(&self) -> PaginationStrategy {
        if self.server_version.supports_offset_fetch() {
            PaginationStrategy::OffsetFetch
        } else {
            PaginationStrategy::RowNum
        }
    }
}
