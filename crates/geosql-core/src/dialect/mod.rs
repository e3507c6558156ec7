//! SQL dialect strategy.
//!
//! A [`SqlDialect`] encapsulates everything that differs between spatial SQL
//! backends: identifier encoding, type registrations, how geometry columns are
//! selected, DDL shapes, paging and the spatial catalog. The rest of the
//! adapter only talks to the database through this trait and the host
//! [`Connection`].

pub mod orientdb;

use std::fmt;

use geosql_common::Connection;

pub use orientdb::OrientDbDialect;

use crate::error::Result;
use crate::filter::FilterCapabilities;
use crate::registry::{TypeMappings, TypeRegistry, sql_types};
use crate::types::{Binding, ColumnMetadata, FeatureType, Srid};

/// Connection-bound state handed to dialect operations that touch the catalog.
pub struct DialectContext<'a> {
    /// The borrowed connection
    pub cx: &'a mut dyn Connection,
    /// Database schema, if any
    pub schema: Option<&'a str>,
    /// The store's type registry
    pub registry: &'a TypeRegistry,
    /// Escapes a name for use as a catalog pattern
    pub escape_name_pattern: &'a dyn Fn(&str) -> String,
}

impl fmt::Debug for DialectContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialectContext")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Backend-specific SQL generation (Strategy pattern).
pub trait SqlDialect: Send + Sync + fmt::Debug {
    /// Dialect identifier (e.g., `"orientdb"`).
    fn name(&self) -> &str;

    /// String wrapped around identifiers.
    fn name_escape(&self) -> &str {
        "\""
    }

    /// Encode a table name.
    fn encode_table_name(&self, raw: &str) -> String {
        let escape = self.name_escape();
        format!("{escape}{raw}{escape}")
    }

    /// Encode a column name, optionally qualified by a table prefix.
    fn encode_column_name(&self, prefix: Option<&str>, raw: &str) -> String {
        let escape = self.name_escape();
        match prefix {
            Some(prefix) => format!("{}.{escape}{raw}{escape}", self.encode_table_name(prefix)),
            None => format!("{escape}{raw}{escape}"),
        }
    }

    /// Encode a schema name.
    fn encode_schema_name(&self, raw: &str) -> String {
        let escape = self.name_escape();
        format!("{escape}{raw}{escape}")
    }

    /// Add or override entries of the type registry.
    fn register_type_mappings(&self, mappings: &mut TypeMappings) {
        let _ = mappings;
    }

    /// Dialect-specific binding for a catalog column, consulted before the
    /// registry lookups.
    fn mapping_for_column(&self, column: &ColumnMetadata) -> Option<Binding> {
        let _ = column;
        None
    }

    /// Replace the code of a user defined (distinct) column by its base type.
    fn handle_user_defined_type(&self, column: &mut ColumnMetadata) {
        if column.type_code == sql_types::DISTINCT {
            if let Some(base) = column.source_data_type {
                column.type_code = base;
            }
        }
    }

    /// Whether a catalog table is published as a feature type.
    fn include_table(&self, schema: Option<&str>, table: &str) -> bool {
        let _ = (schema, table);
        true
    }

    /// Native SRID of a geometry column, `None` when not recorded.
    ///
    /// # Errors
    ///
    /// Returns a catalog error if the lookup query fails.
    fn geometry_srid(
        &self,
        ctx: &mut DialectContext<'_>,
        table: &str,
        column: &str,
    ) -> Result<Option<Srid>>;

    /// Coordinate dimension of a geometry column, `None` when not recorded.
    ///
    /// # Errors
    ///
    /// Returns a catalog error if the lookup query fails.
    fn geometry_dimension(
        &self,
        ctx: &mut DialectContext<'_>,
        table: &str,
        column: &str,
    ) -> Result<Option<u32>>;

    /// Select expression for a geometry column, yielding WKB.
    fn encode_geometry_column(&self, prefix: Option<&str>, column: &str) -> String;

    /// Select expression for the envelope of a geometry column, yielding WKB.
    fn encode_geometry_envelope(&self, table: &str, column: &str) -> String;

    /// SQL expression building a geometry from WKT.
    fn encode_geometry_value(&self, wkt: &str) -> String {
        format!("ST_GeomFromText('{wkt}')")
    }

    /// Keyword(s) opening a CREATE statement for a table.
    fn encode_create_table(&self) -> String {
        "CREATE TABLE ".to_string()
    }

    /// Text appended after the table name of a CREATE statement.
    fn encode_post_create_table(&self, table: &str) -> String {
        let _ = table;
        String::new()
    }

    /// Side effects run after a table was created.
    ///
    /// # Errors
    ///
    /// Returns a catalog error if a statement fails.
    fn post_create_table(&self, ctx: &mut DialectContext<'_>, feature_type: &FeatureType)
    -> Result<()> {
        let _ = (ctx, feature_type);
        Ok(())
    }

    /// Statement dropping a table.
    fn encode_drop_table(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.encode_table_name(table))
    }

    /// Append paging to a SELECT statement.
    fn apply_limit_offset(&self, sql: &mut String, limit: u64, offset: u64);

    /// Drop an index. The connection is closed whether or not the statement
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns a catalog error if dropping or committing fails.
    fn drop_index(
        &self,
        cx: &mut dyn Connection,
        feature_type: &FeatureType,
        schema: Option<&str>,
        index_name: &str,
    ) -> Result<()>;

    /// Query returning the key generated by the last insert, if supported.
    fn last_insert_id_query(&self) -> Option<&str> {
        None
    }

    /// Filter kinds this dialect translates to SQL.
    fn filter_capabilities(&self) -> FilterCapabilities;
}
