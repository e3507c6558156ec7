//! Type mapping registry.
//!
//! Bidirectional maps between feature model bindings and the database's type
//! codes and type names. The registry starts from the JDBC-style defaults every
//! dialect shares and then lets the dialect add or override entries. It is
//! built once per store and never mutated afterwards.

use std::collections::HashMap;

use arrow_schema::{DataType, TimeUnit};
use log::debug;

use crate::dialect::SqlDialect;
use crate::types::Binding;

/// Type codes following the `java.sql.Types` numbering reported by catalogs.
pub mod sql_types {
    pub const BIT: i32 = -7;
    pub const TINYINT: i32 = -6;
    pub const SMALLINT: i32 = 5;
    pub const INTEGER: i32 = 4;
    pub const BIGINT: i32 = -5;
    pub const FLOAT: i32 = 6;
    pub const REAL: i32 = 7;
    pub const DOUBLE: i32 = 8;
    pub const NUMERIC: i32 = 2;
    pub const DECIMAL: i32 = 3;
    pub const CHAR: i32 = 1;
    pub const VARCHAR: i32 = 12;
    pub const LONGVARCHAR: i32 = -1;
    pub const DATE: i32 = 91;
    pub const TIME: i32 = 92;
    pub const TIMESTAMP: i32 = 93;
    pub const BINARY: i32 = -2;
    pub const VARBINARY: i32 = -3;
    pub const LONGVARBINARY: i32 = -4;
    pub const OTHER: i32 = 1111;
    pub const JAVA_OBJECT: i32 = 2000;
    pub const DISTINCT: i32 = 2001;
    pub const BLOB: i32 = 2004;
    pub const CLOB: i32 = 2005;
    pub const BOOLEAN: i32 = 16;
    pub const NCHAR: i32 = -15;
    pub const NVARCHAR: i32 = -9;
}

/// Arrow type used for decimal columns.
pub const DECIMAL_TYPE: DataType = DataType::Decimal128(38, 10);

/// Immutable binding/code/name maps.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    binding_to_code: HashMap<Binding, i32>,
    code_to_binding: HashMap<i32, Binding>,
    name_to_binding: HashMap<String, Binding>,
    binding_to_name: HashMap<Binding, String>,
    code_name_overrides: HashMap<i32, String>,
}

/// Mutable maps handed to a dialect while the registry is assembled.
#[derive(Debug, Default)]
pub struct TypeMappings {
    /// Binding to type code
    pub binding_to_code: HashMap<Binding, i32>,
    /// Type code to binding
    pub code_to_binding: HashMap<i32, Binding>,
    /// Native type name to binding
    pub name_to_binding: HashMap<String, Binding>,
    /// Binding to native type name
    pub binding_to_name: HashMap<Binding, String>,
    /// Type code to type name overrides
    pub code_name_overrides: HashMap<i32, String>,
}

impl TypeMappings {
    /// The defaults shared by every dialect.
    #[must_use]
    pub fn defaults() -> Self {
        use sql_types as t;

        let scalar = |dt: DataType| Binding::Scalar(dt);
        let mut mappings = Self::default();

        for (dt, code) in [
            (DataType::Utf8, t::VARCHAR),
            (DataType::Boolean, t::BOOLEAN),
            (DataType::Int16, t::SMALLINT),
            (DataType::Int32, t::INTEGER),
            (DataType::Int64, t::BIGINT),
            (DataType::Float32, t::REAL),
            (DataType::Float64, t::DOUBLE),
            (DECIMAL_TYPE, t::NUMERIC),
            (DataType::Date32, t::DATE),
            (DataType::Time64(TimeUnit::Microsecond), t::TIME),
            (DataType::Timestamp(TimeUnit::Millisecond, None), t::TIMESTAMP),
            (DataType::Binary, t::LONGVARBINARY),
        ] {
            mappings.binding_to_code.insert(scalar(dt), code);
        }

        for (code, dt) in [
            (t::CHAR, DataType::Utf8),
            (t::VARCHAR, DataType::Utf8),
            (t::LONGVARCHAR, DataType::Utf8),
            (t::NCHAR, DataType::Utf8),
            (t::NVARCHAR, DataType::Utf8),
            (t::CLOB, DataType::Utf8),
            (t::BIT, DataType::Boolean),
            (t::BOOLEAN, DataType::Boolean),
            (t::TINYINT, DataType::Int16),
            (t::SMALLINT, DataType::Int16),
            (t::INTEGER, DataType::Int32),
            (t::BIGINT, DataType::Int64),
            (t::REAL, DataType::Float32),
            (t::FLOAT, DataType::Float64),
            (t::DOUBLE, DataType::Float64),
            (t::NUMERIC, DECIMAL_TYPE),
            (t::DECIMAL, DECIMAL_TYPE),
            (t::DATE, DataType::Date32),
            (t::TIME, DataType::Time64(TimeUnit::Microsecond)),
            (t::TIMESTAMP, DataType::Timestamp(TimeUnit::Millisecond, None)),
            (t::BINARY, DataType::Binary),
            (t::VARBINARY, DataType::Binary),
            (t::LONGVARBINARY, DataType::Binary),
            (t::BLOB, DataType::Binary),
        ] {
            mappings.code_to_binding.insert(code, scalar(dt));
        }

        mappings
    }
}

impl TypeRegistry {
    /// Build the registry for `dialect`.
    #[must_use]
    pub fn new(dialect: &dyn SqlDialect) -> Self {
        let mut mappings = TypeMappings::defaults();
        dialect.register_type_mappings(&mut mappings);
        debug!(
            "Type registry for {}: {} codes, {} names",
            dialect.name(),
            mappings.code_to_binding.len(),
            mappings.name_to_binding.len()
        );

        Self {
            binding_to_code: mappings.binding_to_code,
            code_to_binding: mappings.code_to_binding,
            name_to_binding: mappings
                .name_to_binding
                .into_iter()
                .map(|(name, binding)| (name.to_ascii_uppercase(), binding))
                .collect(),
            binding_to_name: mappings.binding_to_name,
            code_name_overrides: mappings.code_name_overrides,
        }
    }

    /// Binding for a type code.
    #[must_use]
    pub fn binding_for_code(&self, code: i32) -> Option<&Binding> {
        self.code_to_binding.get(&code)
    }

    /// Binding for a native type name, ignoring case.
    #[must_use]
    pub fn binding_for_name(&self, name: &str) -> Option<&Binding> {
        self.name_to_binding.get(&name.to_ascii_uppercase())
    }

    /// Type code for a binding.
    #[must_use]
    pub fn code_for_binding(&self, binding: &Binding) -> Option<i32> {
        self.binding_to_code.get(binding).copied()
    }

    /// Type name override for a code.
    #[must_use]
    pub fn type_name_override(&self, code: i32) -> Option<&str> {
        self.code_name_overrides.get(&code).map(String::as_str)
    }

    /// Native type name for a binding: an explicit name first, else the
    /// override registered for the binding's code.
    #[must_use]
    pub fn native_type_name(&self, binding: &Binding) -> Option<&str> {
        self.binding_to_name.get(binding).map(String::as_str).or_else(|| {
            self.code_for_binding(binding)
                .and_then(|code| self.type_name_override(code))
        })
    }
}
