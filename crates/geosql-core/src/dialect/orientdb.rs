//! OrientDB SQL dialect.
//!
//! OrientDB stores geometries as embedded documents of its spatial classes
//! (`OPoint`, `OPolygon`, ...) and indexes them with the Lucene spatial
//! engine. Identifiers are not escaped; tables are classes. Native SRIDs are
//! recorded in a `geometry_columns` class maintained by the adapter.

use arrow_schema::{DataType, TimeUnit};
use geosql_common::{Connection, SqlResult, SqlValue, close_quietly};
use log::{debug, info, warn};

use super::{DialectContext, SqlDialect};
use crate::error::{Result, SqlErrorExt};
use crate::filter::{FilterCapabilities, FilterKind};
use crate::registry::{DECIMAL_TYPE, TypeMappings, sql_types};
use crate::types::{Binding, ColumnMetadata, FeatureType, GeometryKind, Srid};
use crate::utils::quote_literal;

/// Class holding the native SRID and dimension of every geometry column.
pub const GEOMETRY_COLUMNS: &str = "geometry_columns";

/// Geometry type codes reported by the OrientDB catalog.
pub mod geometry_codes {
    pub const POINT: i32 = 2001;
    pub const LINESTRING: i32 = 2002;
    pub const POLYGON: i32 = 2003;
    pub const MULTIPOINT: i32 = 2004;
    pub const MULTILINESTRING: i32 = 2005;
    pub const MULTIPOLYGON: i32 = 2006;
    pub const GEOMETRY: i32 = 2007;
    pub const GEOMETRYCOLLECTION: i32 = 2008;
}

/// Type code of a geometry kind.
#[must_use]
pub fn geometry_code(kind: GeometryKind) -> i32 {
    use geometry_codes as c;
    match kind {
        GeometryKind::Point => c::POINT,
        GeometryKind::LineString => c::LINESTRING,
        GeometryKind::Polygon => c::POLYGON,
        GeometryKind::MultiPoint => c::MULTIPOINT,
        GeometryKind::MultiLineString => c::MULTILINESTRING,
        GeometryKind::MultiPolygon => c::MULTIPOLYGON,
        GeometryKind::Geometry => c::GEOMETRY,
        GeometryKind::GeometryCollection => c::GEOMETRYCOLLECTION,
    }
}

/// OrientDB spatial class name of a geometry kind.
#[must_use]
pub fn geometry_class(kind: GeometryKind) -> &'static str {
    match kind {
        GeometryKind::Point => "OPoint",
        GeometryKind::LineString => "OLineString",
        GeometryKind::Polygon => "OPolygon",
        GeometryKind::MultiPoint => "OMultiPoint",
        GeometryKind::MultiLineString => "OMultiLineString",
        GeometryKind::MultiPolygon => "OMultiPolygon",
        GeometryKind::Geometry => "OGeometry",
        GeometryKind::GeometryCollection => "OGeometryCollection",
    }
}

/// OrientDB dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct OrientDbDialect;

impl OrientDbDialect {
    /// Create a new OrientDB dialect instance.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// `WHERE` clause selecting the `geometry_columns` row of a column.
    fn geometry_columns_predicate(&self, schema: Option<&str>, table: &str, column: &str) -> String {
        let schema_test = match schema {
            Some(schema) => format!(" = {}", quote_literal(schema)),
            None => " IS NULL".to_string(),
        };
        format!(
            "{}{schema_test} AND {} = {} AND {} = {}",
            self.encode_column_name(None, "f_table_schema"),
            self.encode_column_name(None, "f_table_name"),
            quote_literal(table),
            self.encode_column_name(None, "f_geometry_column"),
            quote_literal(column),
        )
    }

    fn query_geometry_column(
        &self,
        ctx: &mut DialectContext<'_>,
        field: &str,
        table: &str,
        column: &str,
    ) -> Result<Option<i64>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            self.encode_column_name(None, field),
            self.encode_table_name(GEOMETRY_COLUMNS),
            self.geometry_columns_predicate(ctx.schema, table, column)
        );
        debug!("{sql}");
        let rows = ctx
            .cx
            .query(&sql)
            .with_catalog_context(format!("reading {field} of {table}.{column}"))?;
        Ok(rows
            .first()
            .and_then(|row| row.get(0))
            .and_then(SqlValue::as_i64))
    }

    fn ensure_geometry_columns(&self, ctx: &mut DialectContext<'_>) -> Result<()> {
        let pattern = (ctx.escape_name_pattern)(GEOMETRY_COLUMNS);
        let existing = ctx
            .cx
            .tables(ctx.schema, &pattern, &["TABLE"])
            .with_catalog_context("looking up geometry_columns")?;
        if !existing.is_empty() {
            return Ok(());
        }

        let sql = format!("CREATE CLASS {}", self.encode_table_name(GEOMETRY_COLUMNS));
        debug!("{sql}");
        match ctx.cx.execute(&sql) {
            Err(e) if e.is_already_exists() => {
                debug!("{GEOMETRY_COLUMNS} already exists");
                Ok(())
            },
            other => other.with_catalog_context("creating geometry_columns"),
        }
    }

    fn execute(cx: &mut dyn Connection, sql: &str, context: &str) -> Result<()> {
        debug!("{sql}");
        cx.execute(sql).with_catalog_context(context)
    }
}

impl SqlDialect for OrientDbDialect {
    fn name(&self) -> &str {
        "orientdb"
    }

    fn name_escape(&self) -> &str {
        ""
    }

    fn register_type_mappings(&self, mappings: &mut TypeMappings) {
        for kind in GeometryKind::ALL {
            let binding = Binding::Geometry(kind);
            let code = geometry_code(kind);
            mappings.binding_to_code.insert(binding.clone(), code);
            // Geometry codes shadow the generic DISTINCT/BLOB/CLOB codes.
            mappings.code_to_binding.insert(code, binding.clone());
            mappings
                .name_to_binding
                .insert(geometry_class(kind).to_string(), binding.clone());
            mappings
                .binding_to_name
                .insert(binding, geometry_class(kind).to_string());
        }

        for (name, dt) in [
            ("STRING", DataType::Utf8),
            ("BOOLEAN", DataType::Boolean),
            ("BYTE", DataType::Int8),
            ("SHORT", DataType::Int16),
            ("INTEGER", DataType::Int32),
            ("LONG", DataType::Int64),
            ("FLOAT", DataType::Float32),
            ("DOUBLE", DataType::Float64),
            ("DECIMAL", DECIMAL_TYPE),
            ("DATE", DataType::Date32),
            ("DATETIME", DataType::Timestamp(TimeUnit::Millisecond, None)),
            ("BINARY", DataType::Binary),
        ] {
            mappings
                .name_to_binding
                .insert(name.to_string(), Binding::Scalar(dt));
        }

        mappings
            .code_name_overrides
            .insert(sql_types::BOOLEAN, "BOOL".to_string());
    }

    fn mapping_for_column(&self, column: &ColumnMetadata) -> Option<Binding> {
        GeometryKind::ALL
            .into_iter()
            .find(|kind| geometry_code(*kind) == column.type_code)
            .map(Binding::Geometry)
    }

    fn include_table(&self, _schema: Option<&str>, table: &str) -> bool {
        !table.eq_ignore_ascii_case(GEOMETRY_COLUMNS)
    }

    fn geometry_srid(
        &self,
        ctx: &mut DialectContext<'_>,
        table: &str,
        column: &str,
    ) -> Result<Option<Srid>> {
        let srid = self.query_geometry_column(ctx, "srid", table, column)?;
        Ok(srid.and_then(|v| Srid::try_from(v).ok()))
    }

    fn geometry_dimension(
        &self,
        ctx: &mut DialectContext<'_>,
        table: &str,
        column: &str,
    ) -> Result<Option<u32>> {
        let dimension = self.query_geometry_column(ctx, "coord_dimension", table, column)?;
        Ok(dimension.and_then(|v| u32::try_from(v).ok()))
    }

    fn encode_geometry_column(&self, prefix: Option<&str>, column: &str) -> String {
        format!("ST_AsBinary({})", self.encode_column_name(prefix, column))
    }

    fn encode_geometry_envelope(&self, _table: &str, column: &str) -> String {
        format!(
            "ST_AsBinary(ST_Envelope({}))",
            self.encode_column_name(None, column)
        )
    }

    fn encode_create_table(&self) -> String {
        "CREATE CLASS ".to_string()
    }

    fn post_create_table(
        &self,
        ctx: &mut DialectContext<'_>,
        feature_type: &FeatureType,
    ) -> Result<()> {
        self.ensure_geometry_columns(ctx)?;

        let class = self.encode_table_name(&feature_type.name);
        for attribute in feature_type.geometry_attributes() {
            let Some(geometry) = attribute.as_geometry() else {
                continue;
            };
            let column = self.encode_column_name(None, &attribute.name);
            let type_name = ctx
                .registry
                .native_type_name(&Binding::Geometry(geometry.kind))
                .unwrap_or(geometry_class(GeometryKind::Geometry));

            Self::execute(
                ctx.cx,
                &format!("CREATE PROPERTY {class}.{column} EMBEDDED {type_name}"),
                "creating geometry property",
            )?;
            Self::execute(
                ctx.cx,
                &format!(
                    "CREATE INDEX {class}.{column}_index ON {class} ({column}) SPATIAL ENGINE LUCENE"
                ),
                "creating spatial index",
            )?;

            let srid = geometry.crs.map_or(crate::crs::UNKNOWN_SRID, |crs| crs.srid());
            let columns = [
                "f_table_schema",
                "f_table_name",
                "f_geometry_column",
                "coord_dimension",
                "srid",
                "type",
            ]
            .map(|c| self.encode_column_name(None, c))
            .join(", ");
            let schema = ctx.schema.map_or_else(|| "NULL".to_string(), quote_literal);
            Self::execute(
                ctx.cx,
                &format!(
                    "INSERT INTO {} ({columns})  VALUES ({schema}, {}, {}, {}, {srid}, {})",
                    self.encode_table_name(GEOMETRY_COLUMNS),
                    quote_literal(&feature_type.name),
                    quote_literal(&attribute.name),
                    geometry.dimension,
                    quote_literal(geometry.kind.canonical_name()),
                ),
                "registering geometry column",
            )?;
            info!(
                "Registered geometry column {}.{} ({}, EPSG:{srid})",
                feature_type.name, attribute.name, geometry.kind
            );
        }
        Ok(())
    }

    fn encode_drop_table(&self, table: &str) -> String {
        format!("DROP CLASS {} UNSAFE", self.encode_table_name(table))
    }

    fn apply_limit_offset(&self, sql: &mut String, limit: u64, offset: u64) {
        if offset > 0 {
            sql.push_str(&format!(" SKIP {offset} LIMIT {limit}"));
        } else {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
    }

    fn drop_index(
        &self,
        cx: &mut dyn Connection,
        feature_type: &FeatureType,
        schema: Option<&str>,
        index_name: &str,
    ) -> Result<()> {
        let escape = self.name_escape();
        let qualifier = schema
            .map(|s| format!("{}.", self.encode_schema_name(s)))
            .unwrap_or_default();
        let sql = format!(
            "DROP INDEX {qualifier}{escape}{index_name}{escape} on {qualifier}{}",
            self.encode_table_name(&feature_type.name)
        );
        debug!("{sql}");

        let result = run_and_commit(cx, &sql);
        close_quietly(cx);
        if let Err(e) = &result {
            warn!("Failed to drop index {index_name}: {e}");
        }
        result.with_catalog_context(format!("dropping index {index_name}"))
    }

    fn last_insert_id_query(&self) -> Option<&str> {
        Some("SELECT last_insert_id()")
    }

    fn filter_capabilities(&self) -> FilterCapabilities {
        FilterCapabilities::simple().with([
            FilterKind::BBox,
            FilterKind::Beyond,
            FilterKind::Contains,
            FilterKind::DWithin,
            FilterKind::Disjoint,
            FilterKind::Equals,
            FilterKind::Intersects,
            FilterKind::Overlaps,
            FilterKind::Within,
        ])
    }
}

fn run_and_commit(cx: &mut dyn Connection, sql: &str) -> SqlResult<()> {
    cx.execute(sql)?;
    if !cx.auto_commit() {
        cx.commit()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::Crs;
    use crate::registry::TypeRegistry;
    use crate::types::{AttributeDescriptor, GeometryAttribute};
    use geosql_common::{CatalogColumn, Row, SqlError};

    #[derive(Default)]
    struct ScriptedConnection {
        executed: Vec<String>,
        tables: Vec<String>,
        fail_execute: bool,
        auto_commit: bool,
        commits: usize,
        closed: bool,
        rows: Vec<Row>,
    }

    impl Connection for ScriptedConnection {
        fn execute(&mut self, sql: &str) -> SqlResult<()> {
            self.executed.push(sql.to_string());
            if self.fail_execute {
                return Err(SqlError::statement("boom", sql));
            }
            Ok(())
        }
        fn query(&mut self, sql: &str) -> SqlResult<Vec<Row>> {
            self.executed.push(sql.to_string());
            Ok(self.rows.clone())
        }
        fn columns(&mut self, _: Option<&str>, _: &str) -> SqlResult<Vec<CatalogColumn>> {
            Ok(Vec::new())
        }
        fn tables(&mut self, _: Option<&str>, _: &str, _: &[&str]) -> SqlResult<Vec<String>> {
            Ok(self.tables.clone())
        }
        fn auto_commit(&self) -> bool {
            self.auto_commit
        }
        fn commit(&mut self) -> SqlResult<()> {
            self.commits += 1;
            Ok(())
        }
        fn close(&mut self) -> SqlResult<()> {
            self.closed = true;
            Ok(())
        }
    }

    fn escape(name: &str) -> String {
        name.replace('_', "\\_")
    }

    #[test]
    fn test_limit_offset() {
        let dialect = OrientDbDialect::new();
        let mut sql = "SELECT * FROM roads".to_string();
        dialect.apply_limit_offset(&mut sql, 10, 0);
        assert_eq!(sql, "SELECT * FROM roads LIMIT 10");

        let mut sql = "SELECT * FROM roads".to_string();
        dialect.apply_limit_offset(&mut sql, 10, 20);
        assert_eq!(sql, "SELECT * FROM roads SKIP 20 LIMIT 10");
    }

    #[test]
    fn test_identifiers_are_not_escaped() {
        let dialect = OrientDbDialect::new();
        assert_eq!(dialect.encode_table_name("roads"), "roads");
        assert_eq!(dialect.encode_column_name(Some("r"), "geom"), "r.geom");
        assert_eq!(dialect.encode_drop_table("roads"), "DROP CLASS roads UNSAFE");
        assert_eq!(dialect.encode_geometry_column(None, "geom"), "ST_AsBinary(geom)");
        assert_eq!(
            dialect.encode_geometry_envelope("roads", "geom"),
            "ST_AsBinary(ST_Envelope(geom))"
        );
    }

    #[test]
    fn test_mapping_for_column_uses_geometry_codes() {
        let dialect = OrientDbDialect::new();
        let mut column = ColumnMetadata::from(&CatalogColumn::new("geom", 2003, "EMBEDDED"));
        assert_eq!(
            dialect.mapping_for_column(&column),
            Some(Binding::Geometry(GeometryKind::Polygon))
        );
        column.type_code = sql_types::VARCHAR;
        assert_eq!(dialect.mapping_for_column(&column), None);
    }

    #[test]
    fn test_include_table_hides_geometry_columns() {
        let dialect = OrientDbDialect::new();
        assert!(!dialect.include_table(None, "GEOMETRY_COLUMNS"));
        assert!(dialect.include_table(None, "roads"));
    }

    #[test]
    fn test_geometry_srid_query() {
        let dialect = OrientDbDialect::new();
        let registry = TypeRegistry::new(&dialect);
        let mut cx = ScriptedConnection {
            rows: vec![Row::from_pairs([("srid", SqlValue::Int(27700))])],
            ..Default::default()
        };
        let mut ctx = DialectContext {
            cx: &mut cx,
            schema: None,
            registry: &registry,
            escape_name_pattern: &escape,
        };
        let srid = dialect.geometry_srid(&mut ctx, "roads", "geom").unwrap();
        assert_eq!(srid, Some(27700));
        assert_eq!(
            cx.executed[0],
            "SELECT srid FROM geometry_columns WHERE f_table_schema IS NULL \
             AND f_table_name = 'roads' AND f_geometry_column = 'geom'"
        );
    }

    #[test]
    fn test_post_create_table_statements() {
        let dialect = OrientDbDialect::new();
        let registry = TypeRegistry::new(&dialect);
        let mut cx = ScriptedConnection::default();
        let ft = FeatureType::new("places").with_attribute(AttributeDescriptor::geometry(
            "location",
            GeometryAttribute::new(GeometryKind::Point, Some(4326)),
        ));
        let mut ctx = DialectContext {
            cx: &mut cx,
            schema: Some("public"),
            registry: &registry,
            escape_name_pattern: &escape,
        };
        dialect.post_create_table(&mut ctx, &ft).unwrap();

        assert_eq!(cx.executed[0], "CREATE CLASS geometry_columns");
        assert_eq!(cx.executed[1], "CREATE PROPERTY places.location EMBEDDED OPoint");
        assert_eq!(
            cx.executed[2],
            "CREATE INDEX places.location_index ON places (location) SPATIAL ENGINE LUCENE"
        );
        assert!(cx.executed[3].starts_with("INSERT INTO geometry_columns (f_table_schema"));
        assert!(cx.executed[3].ends_with("VALUES ('public', 'places', 'location', 2, 4326, 'POINT')"));
        assert_eq!(Crs::from_srid(Some(4326)), ft.attributes[0].as_geometry().unwrap().crs);
    }

    #[test]
    fn test_post_create_table_skips_existing_registry() {
        let dialect = OrientDbDialect::new();
        let registry = TypeRegistry::new(&dialect);
        let mut cx = ScriptedConnection {
            tables: vec![GEOMETRY_COLUMNS.to_string()],
            ..Default::default()
        };
        let ft = FeatureType::new("lines").with_attribute(AttributeDescriptor::geometry(
            "geom",
            GeometryAttribute::new(GeometryKind::LineString, None),
        ));
        let mut ctx = DialectContext {
            cx: &mut cx,
            schema: None,
            registry: &registry,
            escape_name_pattern: &escape,
        };
        dialect.post_create_table(&mut ctx, &ft).unwrap();
        assert_eq!(cx.executed[0], "CREATE PROPERTY lines.geom EMBEDDED OLineString");
        assert!(cx.executed[2].ends_with("VALUES (NULL, 'lines', 'geom', 2, -1, 'LINESTRING')"));
    }

    #[test]
    fn test_drop_index_commits_and_closes() {
        let dialect = OrientDbDialect::new();
        let ft = FeatureType::new("roads");
        let mut cx = ScriptedConnection::default();
        dialect.drop_index(&mut cx, &ft, Some("db"), "roads.geom_index").unwrap();
        assert_eq!(cx.executed[0], "DROP INDEX db.roads.geom_index on db.roads");
        assert_eq!(cx.commits, 1);
        assert!(cx.closed);
    }

    #[test]
    fn test_drop_index_closes_on_failure() {
        let dialect = OrientDbDialect::new();
        let ft = FeatureType::new("roads");
        let mut cx = ScriptedConnection {
            fail_execute: true,
            auto_commit: true,
            ..Default::default()
        };
        assert!(dialect.drop_index(&mut cx, &ft, None, "idx").is_err());
        assert_eq!(cx.executed[0], "DROP INDEX idx on roads");
        assert_eq!(cx.commits, 0);
        assert!(cx.closed);
    }

    #[test]
    fn test_capabilities_exclude_crosses_and_touches() {
        let caps = OrientDbDialect::new().filter_capabilities();
        assert!(caps.supports_kind(FilterKind::DWithin));
        assert!(!caps.supports_kind(FilterKind::Crosses));
        assert!(!caps.supports_kind(FilterKind::Touches));
    }
}
