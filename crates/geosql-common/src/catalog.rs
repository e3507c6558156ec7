//! Raw catalog rows, SQL values and SQL errors.
//!
//! These are the shapes the host connection hands back to the adapter: one
//! [`CatalogColumn`] per column reported by the metadata catalog, and a
//! materialized [`Row`] per result-set row.

use std::fmt;

use thiserror::Error;

/// Errors reported by a host connection.
#[derive(Debug, Error)]
pub enum SqlError {
    /// A statement or query failed to execute
    #[error("SQL statement failed: {message}")]
    Statement {
        /// Driver-provided description of the failure
        message: String,
        /// The SQL text that failed, when known
        sql: Option<String>,
    },

    /// The object a DDL statement tried to create already exists
    #[error("Object already exists: {name}")]
    AlreadyExists {
        /// Name of the existing object
        name: String,
    },

    /// The connection itself is unusable (closed, broken pipe, ...)
    #[error("Connection error: {0}")]
    Connection(String),
}

impl SqlError {
    /// Build a [`SqlError::Statement`] for the given SQL text.
    #[must_use]
    pub fn statement(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Statement {
            message: message.into(),
            sql: Some(sql.into()),
        }
    }

    /// Returns `true` when the error reports an object that already exists.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Result type alias for host connection calls.
pub type SqlResult<T> = std::result::Result<T, SqlError>;

/// A single value read from a result-set row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL `NULL`
    Null,
    /// Boolean value
    Bool(bool),
    /// Any integral value
    Int(i64),
    /// Any floating point or decimal value
    Double(f64),
    /// Character data
    Text(String),
    /// Binary data (WKB payloads arrive here)
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Returns `true` for [`SqlValue::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Integral view of the value, converting from doubles and numeric text.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            #[allow(clippy::cast_possible_truncation)]
            SqlValue::Double(v) => Some(*v as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            SqlValue::Bool(b) => Some(i64::from(*b)),
            SqlValue::Null | SqlValue::Bytes(_) => None,
        }
    }

    /// Text view of the value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Binary view of the value.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SqlValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Bool(v) => write!(f, "{v}"),
            SqlValue::Int(v) => write!(f, "{v}"),
            SqlValue::Double(v) => write!(f, "{v}"),
            SqlValue::Text(v) => f.write_str(v),
            SqlValue::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// A materialized result-set row.
///
/// Column lookups by name are case-insensitive, matching how catalog
/// drivers usually report labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Create a row from parallel column labels and values.
    #[must_use]
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Build a row from `(label, value)` pairs.
    #[must_use]
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, SqlValue)>,
        S: Into<String>,
    {
        let (columns, values) = pairs.into_iter().map(|(c, v)| (c.into(), v)).unzip();
        Self { columns, values }
    }

    /// Number of values in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the row carries no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at a zero-based position.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Value for a column label.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|i| self.values.get(i))
    }

    /// Column labels in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// One row of the catalog's column listing.
///
/// Besides the standard metadata fields, OrientDB reports two vendor
/// extensions: `IS_EMBEDDED` and `EMBEDDED_TYPE`, which describe columns that
/// hold embedded documents such as geometries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogColumn {
    /// `COLUMN_NAME`
    pub name: String,
    /// `DATA_TYPE`, a `java.sql.Types`-style code
    pub data_type: i32,
    /// `TYPE_NAME`, the data source dependent type name
    pub type_name: String,
    /// `IS_NULLABLE`: `"YES"`, `"NO"` or empty when unknown
    pub is_nullable: String,
    /// `IS_EMBEDDED` vendor extension (`"YES"`/`"NO"`)
    pub is_embedded: Option<String>,
    /// `EMBEDDED_TYPE` vendor extension, the element type name
    pub embedded_type: Option<String>,
    /// `SOURCE_DATA_TYPE`, the base type of a user defined (distinct) type
    pub source_data_type: Option<i32>,
}

impl CatalogColumn {
    /// Create a plain, nullable column.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: i32, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type,
            type_name: type_name.into(),
            is_nullable: "YES".to_string(),
            is_embedded: Some("NO".to_string()),
            embedded_type: None,
            source_data_type: None,
        }
    }

    /// Mark the column as `NOT NULL`.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.is_nullable = "NO".to_string();
        self
    }

    /// Mark the column as holding an embedded value of the given element type.
    #[must_use]
    pub fn embedded(mut self, element_type: impl Into<String>) -> Self {
        self.is_embedded = Some("YES".to_string());
        self.embedded_type = Some(element_type.into());
        self
    }

    /// Set the base type of a user defined type.
    #[must_use]
    pub fn with_source_data_type(mut self, code: i32) -> Self {
        self.source_data_type = Some(code);
        self
    }

    /// Whether the column allows `NULL` values.
    #[must_use]
    pub fn nullable(&self) -> bool {
        self.is_nullable.eq_ignore_ascii_case("YES")
    }

    /// Whether the column holds an embedded value.
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        self.is_embedded
            .as_deref()
            .is_some_and(|flag| flag.eq_ignore_ascii_case("YES"))
    }
}
