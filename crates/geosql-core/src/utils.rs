//! Utility functions and extension traits.
//!
//! This module provides binding formatting for display and the generic SQL
//! literal encoder used for non-geometry values.

use arrow_schema::DataType;

use crate::types::{Binding, Value};

/// Extension trait for formatting bindings into human-readable strings.
///
/// # Examples
///
/// ```
/// use arrow_schema::DataType;
/// use geosql_core::types::{Binding, GeometryKind};
/// use geosql_core::utils::BindingExt;
///
/// assert_eq!(Binding::Scalar(DataType::Utf8).format(), "String");
/// assert_eq!(Binding::Geometry(GeometryKind::Point).format(), "Geometry(POINT)");
/// ```
pub trait BindingExt {
    /// Format the binding into a human-readable string.
    fn format(&self) -> String;
}

impl BindingExt for Binding {
    fn format(&self) -> String {
        match self {
            Binding::Scalar(dt) => format_data_type(dt),
            Binding::Geometry(kind) => format!("Geometry({kind})"),
            Binding::Association => "Association".to_string(),
        }
    }
}

fn format_data_type(data_type: &DataType) -> String {
    match data_type {
        DataType::Boolean => "Boolean".to_string(),
        DataType::Int8 => "Int8".to_string(),
        DataType::Int16 => "Int16".to_string(),
        DataType::Int32 => "Int32".to_string(),
        DataType::Int64 => "Int64".to_string(),
        DataType::Float32 => "Float32".to_string(),
        DataType::Float64 => "Float64".to_string(),
        DataType::Utf8 => "String".to_string(),
        DataType::Binary => "Binary".to_string(),
        DataType::Date32 => "Date".to_string(),
        DataType::Time64(_) => "Time".to_string(),
        DataType::Timestamp(unit, tz) => {
            let tz_str = tz.as_ref().map_or("", |t| t.as_ref());
            format!("Timestamp({unit:?}, {tz_str})")
        },
        DataType::Decimal128(precision, scale) => format!("Decimal({precision}, {scale})"),
        _ => format!("{data_type:?}"),
    }
}

/// Quote a string as a SQL literal, doubling embedded quotes.
#[must_use]
pub fn quote_literal(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

/// Encode a non-geometry value as a SQL literal.
///
/// Geometries are encoded by the filter translator, which owns the
/// reprojection pipeline; passing one here yields `NULL`.
#[must_use]
pub fn encode_scalar(value: &Value) -> String {
    match value {
        Value::Null | Value::Geometry(_) => "null".to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Double(v) => format!("{v:?}"),
        Value::Text(v) => quote_literal(v),
        Value::Bytes(v) => quote_literal(&hex::encode(v)),
    }
}
