//! Custom error types for `GeoSQL` operations.
//!
//! This module provides structured error handling using `thiserror`. Each
//! failure class of the adapter gets its own enum so callers can tell a
//! catalog failure from a bad geometry or an untranslatable predicate.
//! Recoverable degradations (such as an unmappable column) are not errors at
//! all: they are logged and reflected in the resulting feature type.

use geosql_common::SqlError;
use thiserror::Error;

use crate::types::Srid;

/// Main error type for `GeoSQL` operations.
///
/// It uses `#[error(transparent)]` to delegate display formatting to the
/// underlying error variants.
#[derive(Debug, Error)]
pub enum GeoSqlError {
    /// Catalog or SQL execution failures
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Geometry encoding and decoding errors
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Coordinate reference system errors
    #[error(transparent)]
    Crs(#[from] CrsError),

    /// Predicate translation errors
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Insert/update validation errors
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Catalog and statement errors.
///
/// These wrap a [`SqlError`] raised by the host connection together with a
/// description of what the adapter was doing.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A catalog or SQL statement failed
    #[error("{context}: {source}")]
    Sql {
        /// What the adapter was doing
        context: String,
        /// The underlying connection error
        #[source]
        source: SqlError,
    },

    /// The requested feature type does not exist
    #[error("Feature type '{name}' not found")]
    TypeNotFound {
        /// The requested type name
        name: String,
    },
}

/// Geometry codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A WKB or WKT payload could not be decoded
    #[error("Error decoding {format}: {message}")]
    Decode {
        /// `"WKB"` or `"WKT"`
        format: &'static str,
        /// Description of the decoding problem
        message: String,
    },

    /// A geometry could not be encoded
    #[error("Error encoding {format}: {message}")]
    Encode {
        /// `"WKB"` or `"WKT"`
        format: &'static str,
        /// Description of the encoding problem
        message: String,
    },

    /// Linear rings have no text literal and must be degraded to lines first
    #[error("Linear rings cannot be encoded as WKT; degrade the ring to a line string first")]
    RingLiteral,
}

/// Coordinate reference system errors.
#[derive(Debug, Error)]
pub enum CrsError {
    /// No coordinate operation is registered for the SRID
    #[error("No coordinate operation registered for EPSG:{srid}")]
    UnknownSrid {
        /// The SRID without an operation
        srid: Srid,
    },
}

/// Predicate translation errors.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The predicate kind is outside the dialect's repertoire
    #[error("Unsupported operator: {operator}")]
    UnsupportedOperator {
        /// Name of the predicate kind
        operator: String,
    },

    /// An operand had an unexpected shape
    #[error("Invalid operand for {operator}: {message}")]
    InvalidOperand {
        /// Name of the predicate kind
        operator: String,
        /// What was wrong with the operand
        message: String,
    },
}

/// Write validation errors, raised before any statement is built.
#[derive(Debug, Error)]
pub enum WriteError {
    /// A `NULL` value was supplied for a non-nillable column
    #[error("Cannot set a NULL value on the not null column {column}")]
    NullOnNotNull {
        /// The offending column
        column: String,
    },

    /// The feature type is read only
    #[error("Feature type '{name}' is read only")]
    ReadOnly {
        /// The feature type name
        name: String,
    },

    /// A value does not match the attribute binding
    #[error("Attribute '{column}' expects {expected}, found {found}")]
    TypeMismatch {
        /// The attribute name
        column: String,
        /// Expected binding
        expected: String,
        /// Value kind supplied
        found: String,
    },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid option value
    #[error("Invalid {option} option: {message}")]
    InvalidOption {
        /// The option name
        option: String,
        /// Why it's invalid
        message: String,
    },
}

/// Type alias for Results using `GeoSqlError`.
pub type Result<T> = std::result::Result<T, GeoSqlError>;

impl GeoSqlError {
    /// Get a user-friendly error message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Catalog(e) => e.user_message(),
            Self::Codec(e) => format!("Geometry error: {e}"),
            Self::Crs(e) => format!("Reference system error: {e}"),
            Self::Filter(e) => format!("Filter error: {e}"),
            Self::Write(e) => format!("Write rejected: {e}"),
            Self::Config(e) => format!("Configuration error: {e}"),
        }
    }

    /// Get recovery suggestions if available.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::Catalog(CatalogError::TypeNotFound { .. }) => {
                Some("List the available feature types and check the name.".to_string())
            },
            Self::Crs(CrsError::UnknownSrid { .. }) => {
                Some("Register a coordinate operation for this SRID.".to_string())
            },
            Self::Filter(FilterError::UnsupportedOperator { .. }) => Some(
                "Evaluate this predicate locally; split the filter with the dialect capabilities."
                    .to_string(),
            ),
            Self::Codec(CodecError::RingLiteral) => {
                Some("Degrade the ring to a line string before encoding.".to_string())
            },
            _ => None,
        }
    }

    /// Check if this error is potentially recoverable by the caller.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Filter(FilterError::UnsupportedOperator { .. })
        )
    }
}

impl CatalogError {
    fn user_message(&self) -> String {
        match self {
            Self::Sql { context, source } => format!("Database error while {context}: {source}"),
            Self::TypeNotFound { name } => format!("Feature type not found: {name}"),
        }
    }
}

/// Extension trait for attaching catalog context to host errors.
pub trait SqlErrorExt<T> {
    /// Wrap a [`SqlError`] into a [`CatalogError::Sql`] with context.
    ///
    /// # Errors
    ///
    /// Returns [`GeoSqlError::Catalog`] if the underlying call failed.
    fn with_catalog_context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> SqlErrorExt<T> for std::result::Result<T, SqlError> {
    fn with_catalog_context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|source| {
            GeoSqlError::Catalog(CatalogError::Sql {
                context: context.into(),
                source,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn catalog_context_keeps_source() {
        let result: std::result::Result<(), SqlError> =
            Err(SqlError::Connection("reset by peer".into()));
        let err = result
            .with_catalog_context("building feature type")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "building feature type: Connection error: reset by peer"
        );
        let GeoSqlError::Catalog(inner) = &err else {
            panic!("expected catalog error")
        };
        assert!(inner.source().is_some());
    }

    #[test]
    fn null_on_not_null_message() {
        let err: GeoSqlError = WriteError::NullOnNotNull {
            column: "name".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Cannot set a NULL value on the not null column name"
        );
        assert!(!err.is_recoverable());
    }

    #[test]
    fn unsupported_operator_is_recoverable() {
        let err: GeoSqlError = FilterError::UnsupportedOperator {
            operator: "Touches".into(),
        }
        .into();
        assert!(err.is_recoverable());
        assert!(err.recovery_suggestion().is_some());
    }
}
