//! Statement generation.
//!
//! Builds the fixed repertoire of statements the store issues: CREATE and
//! DROP of a feature class, INSERT of one feature, the feature SELECT with
//! paging, and the envelope query used for bounds. Key handling on insert is
//! delegated to a [`KeysFetcher`].

use geosql_common::{Connection, SqlValue};
use log::debug;

use crate::dialect::{DialectContext, SqlDialect};
use crate::error::{Result, SqlErrorExt, WriteError};
use crate::filter::Filter;
use crate::translate::FilterToSql;
use crate::types::{AttributeKind, Feature, FeatureType, PrimaryKey, Value};
use crate::utils::{encode_scalar, quote_literal};

/// Class recording which columns reference other feature types.
pub const RELATIONSHIP_TABLE: &str = "feature_relationships";

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Smallest first
    #[default]
    Ascending,
    /// Largest first
    Descending,
}

impl SortOrder {
    fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortBy {
    /// Property to sort on
    pub property: String,
    /// Direction
    pub order: SortOrder,
}

impl SortBy {
    /// Sort ascending on `property`.
    #[must_use]
    pub fn ascending(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            order: SortOrder::Ascending,
        }
    }

    /// Sort descending on `property`.
    #[must_use]
    pub fn descending(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            order: SortOrder::Descending,
        }
    }
}

/// A feature query: predicate, ordering and paging.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Predicate
    pub filter: Filter,
    /// Ordering
    pub sort_by: Vec<SortBy>,
    /// Number of features to skip
    pub start_index: Option<u64>,
    /// Maximum number of features to return
    pub max_features: Option<u64>,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            filter: Filter::Include,
            sort_by: Vec::new(),
            start_index: None,
            max_features: None,
        }
    }
}

impl Query {
    /// Query every feature.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Query the features matching `filter`.
    #[must_use]
    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Add an ordering term.
    #[must_use]
    pub fn with_sort(mut self, sort: SortBy) -> Self {
        self.sort_by.push(sort);
        self
    }

    /// Skip the first `start` features.
    #[must_use]
    pub fn with_start_index(mut self, start: u64) -> Self {
        self.start_index = Some(start);
        self
    }

    /// Return at most `max` features.
    #[must_use]
    pub fn with_max_features(mut self, max: u64) -> Self {
        self.max_features = Some(max);
        self
    }
}

/// Supplies the key columns and values of an inserted feature.
pub trait KeysFetcher {
    /// Whether `column` is managed by this fetcher.
    fn is_key(&self, column: &str) -> bool;

    /// Key columns written by the INSERT, as `(column, encoded value)`
    /// pairs. Empty when the database generates the key.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be produced.
    fn key_values(&self) -> Result<Vec<(String, String)>>;

    /// Called after the INSERT ran; returns the key of the new row, if one
    /// can be determined.
    ///
    /// # Errors
    ///
    /// Returns a catalog error if the key lookup fails.
    fn post_insert(
        &self,
        dialect: &dyn SqlDialect,
        cx: &mut dyn Connection,
    ) -> Result<Option<String>>;
}

/// Key values supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvidedKeys {
    values: Vec<(String, Value)>,
}

impl ProvidedKeys {
    /// Use `values`, in key order, as the new row's key.
    #[must_use]
    pub fn new(values: Vec<(String, Value)>) -> Self {
        Self { values }
    }
}

impl KeysFetcher for ProvidedKeys {
    fn is_key(&self, column: &str) -> bool {
        self.values.iter().any(|(c, _)| c.eq_ignore_ascii_case(column))
    }

    fn key_values(&self) -> Result<Vec<(String, String)>> {
        self.values
            .iter()
            .map(|(column, value)| {
                if value.is_null() {
                    return Err(WriteError::NullOnNotNull {
                        column: column.clone(),
                    }
                    .into());
                }
                Ok((column.clone(), encode_scalar(value)))
            })
            .collect()
    }

    fn post_insert(
        &self,
        _dialect: &dyn SqlDialect,
        _cx: &mut dyn Connection,
    ) -> Result<Option<String>> {
        let parts: Vec<String> = self
            .values
            .iter()
            .map(|(_, value)| match value {
                Value::Text(s) => s.clone(),
                other => encode_scalar(other),
            })
            .collect();
        Ok(Some(parts.join(".")))
    }
}

/// Key generated by the database; read back after the insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedKeys {
    key: String,
}

impl GeneratedKeys {
    /// Let the database generate `key`.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl KeysFetcher for GeneratedKeys {
    fn is_key(&self, column: &str) -> bool {
        self.key.eq_ignore_ascii_case(column)
    }

    fn key_values(&self) -> Result<Vec<(String, String)>> {
        Ok(Vec::new())
    }

    fn post_insert(
        &self,
        dialect: &dyn SqlDialect,
        cx: &mut dyn Connection,
    ) -> Result<Option<String>> {
        let Some(sql) = dialect.last_insert_id_query() else {
            return Ok(None);
        };
        debug!("{sql}");
        let rows = cx
            .query(sql)
            .with_catalog_context(format!("reading the generated value of {}", self.key))?;
        Ok(rows
            .first()
            .and_then(|row| row.get(0))
            .filter(|v| !v.is_null())
            .map(SqlValue::to_string))
    }
}

/// `CREATE` statement for a feature type.
#[must_use]
pub fn create_table_sql(dialect: &dyn SqlDialect, feature_type: &FeatureType) -> String {
    let mut sql = dialect.encode_create_table();
    sql.push_str(&dialect.encode_table_name(&feature_type.name));
    sql.push_str(&dialect.encode_post_create_table(&feature_type.name));
    sql
}

/// `DROP` statement for a feature type.
#[must_use]
pub fn drop_table_sql(dialect: &dyn SqlDialect, table: &str) -> String {
    dialect.encode_drop_table(table)
}

/// `INSERT` statement for one feature.
///
/// Attributes missing from `feature` are written as `null`.
///
/// # Errors
///
/// Returns [`WriteError::ReadOnly`] for read-only types,
/// [`WriteError::NullOnNotNull`] when a non-nullable attribute has no value
/// and [`WriteError::TypeMismatch`] when a geometry attribute holds a scalar.
/// No SQL is produced in any of these cases.
pub fn insert_sql(
    dialect: &dyn SqlDialect,
    translator: &FilterToSql<'_>,
    feature_type: &FeatureType,
    feature: &Feature,
    keys: &dyn KeysFetcher,
) -> Result<String> {
    if feature_type.read_only {
        return Err(WriteError::ReadOnly {
            name: feature_type.name.clone(),
        }
        .into());
    }

    let mut columns = Vec::new();
    let mut values = Vec::new();
    for attribute in &feature_type.attributes {
        if keys.is_key(&attribute.name) {
            continue;
        }
        let value = feature.get(&attribute.name).unwrap_or(&Value::Null);
        if value.is_null() && !attribute.nullable {
            return Err(WriteError::NullOnNotNull {
                column: attribute.name.clone(),
            }
            .into());
        }

        let encoded = match (&attribute.kind, value) {
            (_, Value::Null) => "null".to_string(),
            (AttributeKind::Geometry(geometry), Value::Geometry(g)) => {
                translator.encode_geometry_literal(g, geometry.srid)?
            },
            (AttributeKind::Geometry(_), other) => {
                return Err(WriteError::TypeMismatch {
                    column: attribute.name.clone(),
                    expected: "geometry".into(),
                    found: other.kind_name().into(),
                }
                .into());
            },
            (_, Value::Geometry(_)) => {
                return Err(WriteError::TypeMismatch {
                    column: attribute.name.clone(),
                    expected: "scalar".into(),
                    found: "geometry".into(),
                }
                .into());
            },
            (_, other) => encode_scalar(other),
        };
        columns.push(dialect.encode_column_name(None, &attribute.name));
        values.push(encoded);
    }

    for (column, value) in keys.key_values()? {
        columns.push(dialect.encode_column_name(None, &column));
        values.push(value);
    }

    Ok(format!(
        "INSERT INTO {} ( {} ) VALUES ( {})",
        dialect.encode_table_name(&feature_type.name),
        columns.join(","),
        values.join(",")
    ))
}

/// Columns returned by [`select_sql`], in result order: key columns first,
/// then the non-key attributes.
#[must_use]
pub fn selected_columns(feature_type: &FeatureType) -> Vec<String> {
    let key = &feature_type.primary_key;
    key.columns()
        .iter()
        .map(|c| c.name.clone())
        .chain(
            feature_type
                .attributes
                .iter()
                .filter(|a| !key.contains(&a.name))
                .map(|a| a.name.clone()),
        )
        .collect()
}

/// `SELECT` statement for a query.
///
/// Paging is applied when a maximum is given or the offset is positive; an
/// offset without a maximum pages with `max_page_size`.
///
/// # Errors
///
/// Returns filter, CRS or codec errors from the `WHERE` clause.
pub fn select_sql(
    dialect: &dyn SqlDialect,
    translator: &FilterToSql<'_>,
    feature_type: &FeatureType,
    query: &Query,
    max_page_size: u64,
) -> Result<String> {
    let key = &feature_type.primary_key;
    let mut columns: Vec<String> = key
        .columns()
        .iter()
        .map(|c| dialect.encode_column_name(None, &c.name))
        .collect();
    for attribute in &feature_type.attributes {
        if key.contains(&attribute.name) {
            continue;
        }
        let column = if attribute.as_geometry().is_some() {
            format!(
                "{} as {}",
                dialect.encode_geometry_column(None, &attribute.name),
                dialect.encode_column_name(None, &attribute.name)
            )
        } else {
            dialect.encode_column_name(None, &attribute.name)
        };
        columns.push(column);
    }

    let mut sql = format!(
        "SELECT {} FROM {}",
        columns.join(","),
        dialect.encode_table_name(&feature_type.name)
    );
    sql.push_str(&translator.encode_where(&query.filter)?);

    if !query.sort_by.is_empty() {
        let terms: Vec<String> = query
            .sort_by
            .iter()
            .map(|s| {
                format!(
                    "{} {}",
                    dialect.encode_column_name(None, &s.property),
                    s.order.as_sql()
                )
            })
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&terms.join(", "));
    }

    let offset = query.start_index.unwrap_or(0);
    if query.max_features.is_some() || offset > 0 {
        let limit = query.max_features.unwrap_or(max_page_size);
        dialect.apply_limit_offset(&mut sql, limit, offset);
    }
    Ok(sql)
}

/// Envelope query over the default geometry, `None` for types without one.
///
/// # Errors
///
/// Returns filter, CRS or codec errors from the `WHERE` clause.
pub fn bounds_sql(
    dialect: &dyn SqlDialect,
    translator: &FilterToSql<'_>,
    feature_type: &FeatureType,
    filter: &Filter,
) -> Result<Option<String>> {
    let Some(geometry) = feature_type.default_geometry() else {
        return Ok(None);
    };
    let mut sql = format!(
        "SELECT {} FROM {}",
        dialect.encode_geometry_envelope(&feature_type.name, &geometry.name),
        dialect.encode_table_name(&feature_type.name)
    );
    sql.push_str(&translator.encode_where(filter)?);
    Ok(Some(sql))
}

/// Feature id of a row key: `Type.<values joined by '.'>`.
///
/// Returns `None` for keyless types and when a key value is null.
#[must_use]
pub fn feature_id(feature_type: &FeatureType, key_values: &[SqlValue]) -> Option<String> {
    if matches!(feature_type.primary_key, PrimaryKey::Null) || key_values.is_empty() {
        return None;
    }
    if key_values.iter().any(SqlValue::is_null) {
        return None;
    }
    let parts: Vec<String> = key_values.iter().map(SqlValue::to_string).collect();
    Some(format!("{}.{}", feature_type.name, parts.join(".")))
}

/// Create the relationship class unless it exists.
///
/// # Errors
///
/// Returns a catalog error if listing or creating the class fails.
pub fn ensure_relationship_table(
    dialect: &dyn SqlDialect,
    ctx: &mut DialectContext<'_>,
) -> Result<()> {
    let pattern = (ctx.escape_name_pattern)(RELATIONSHIP_TABLE);
    let existing = ctx
        .cx
        .tables(ctx.schema, &pattern, &["TABLE"])
        .with_catalog_context("looking up the relationship table")?;
    if !existing.is_empty() {
        return Ok(());
    }

    let sql = format!(
        "{}{}",
        dialect.encode_create_table(),
        dialect.encode_table_name(RELATIONSHIP_TABLE)
    );
    debug!("{sql}");
    match ctx.cx.execute(&sql) {
        Err(e) if e.is_already_exists() => Ok(()),
        other => other.with_catalog_context("creating the relationship table"),
    }
}

/// Whether a relationship row exists for `table.column`.
///
/// # Errors
///
/// Returns a catalog error if the lookup fails.
pub fn relationship_exists(
    dialect: &dyn SqlDialect,
    ctx: &mut DialectContext<'_>,
    table: &str,
    column: &str,
) -> Result<bool> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = {} AND {} = {}",
        dialect.encode_column_name(None, "related_table"),
        dialect.encode_table_name(RELATIONSHIP_TABLE),
        dialect.encode_column_name(None, "table_name"),
        quote_literal(table),
        dialect.encode_column_name(None, "column_name"),
        quote_literal(column),
    );
    debug!("{sql}");
    let rows = ctx
        .cx
        .query(&sql)
        .with_catalog_context(format!("looking up relationships of {table}.{column}"))?;
    Ok(!rows.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::{ClampPolicy, CoordinateOperations};
    use crate::dialect::OrientDbDialect;
    use crate::geometry::GeometryValue;
    use crate::types::{AttributeDescriptor, GeometryAttribute, GeometryKind, PrimaryKeyColumn};
    use arrow_schema::DataType;
    use geo_types::Point;

    fn roads() -> FeatureType {
        FeatureType::new("roads")
            .with_primary_key(PrimaryKey::new(
                "roads",
                vec![PrimaryKeyColumn::new("fid", DataType::Int64)],
            ))
            .with_attribute(AttributeDescriptor::scalar("name", DataType::Utf8).with_nullable(false))
            .with_attribute(AttributeDescriptor::scalar("lanes", DataType::Int32))
            .with_attribute(AttributeDescriptor::geometry(
                "geom",
                GeometryAttribute::new(GeometryKind::Point, Some(4326)),
            ))
    }

    macro_rules! translator {
        ($dialect:ident, $t:ident) => {
            let $dialect = OrientDbDialect::new();
            let operations = CoordinateOperations::default();
            let clamp = ClampPolicy::default();
            let $t = FilterToSql::new(&$dialect, &operations, &clamp);
        };
    }

    #[test]
    fn test_create_and_drop() {
        let dialect = OrientDbDialect::new();
        assert_eq!(create_table_sql(&dialect, &roads()), "CREATE CLASS roads");
        assert_eq!(drop_table_sql(&dialect, "roads"), "DROP CLASS roads UNSAFE");
    }

    #[test]
    fn test_insert_with_provided_key() {
        translator!(dialect, t);
        let feature = Feature::new()
            .with_value("name", "it's")
            .with_value("geom", GeometryValue::new(Point::new(1.0, 2.0)));
        let keys = ProvidedKeys::new(vec![("fid".into(), Value::Int(7))]);
        let sql = insert_sql(&dialect, &t, &roads(), &feature, &keys).unwrap();
        assert!(sql.starts_with(
            "INSERT INTO roads ( name,lanes,geom,fid ) VALUES ( 'it''s',null,ST_GeomFromText('POINT"
        ));
        assert!(sql.ends_with("'),7)"));
    }

    #[test]
    fn test_insert_into_key_only_type() {
        translator!(dialect, t);
        let tags = FeatureType::new("tags").with_primary_key(PrimaryKey::new(
            "tags",
            vec![PrimaryKeyColumn::new("fid", DataType::Int64)],
        ));
        let keys = ProvidedKeys::new(vec![("fid".into(), Value::Int(7))]);
        let sql = insert_sql(&dialect, &t, &tags, &Feature::new(), &keys).unwrap();
        assert_eq!(sql, "INSERT INTO tags ( fid ) VALUES ( 7)");
    }

    #[test]
    fn test_insert_null_provided_key() {
        translator!(dialect, t);
        let feature = Feature::new().with_value("name", "x");
        let keys = ProvidedKeys::new(vec![("fid".into(), Value::Null)]);
        let err = insert_sql(&dialect, &t, &roads(), &feature, &keys).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot set a NULL value on the not null column fid"
        );
    }

    #[test]
    fn test_insert_null_on_not_null() {
        translator!(dialect, t);
        let feature = Feature::new().with_value("lanes", 2_i64);
        let err = insert_sql(&dialect, &t, &roads(), &feature, &GeneratedKeys::new("fid"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot set a NULL value on the not null column name"
        );
    }

    #[test]
    fn test_insert_rejects_read_only_and_mismatch() {
        translator!(dialect, t);
        let mut read_only = roads();
        read_only.read_only = true;
        let feature = Feature::new().with_value("name", "a");
        assert!(insert_sql(&dialect, &t, &read_only, &feature, &GeneratedKeys::new("fid")).is_err());

        let feature = Feature::new().with_value("name", "a").with_value("geom", 3_i64);
        let err = insert_sql(&dialect, &t, &roads(), &feature, &GeneratedKeys::new("fid"))
            .unwrap_err();
        assert!(err.to_string().contains("geom"));
    }

    #[test]
    fn test_select_shape() {
        translator!(dialect, t);
        let ft = roads();
        let t = t.with_feature_type(&ft);
        let query =
            Query::filtered(Filter::equals("lanes", 2_i64)).with_sort(SortBy::descending("name"));
        let sql = select_sql(&dialect, &t, &ft, &query, 100).unwrap();
        assert_eq!(
            sql,
            "SELECT fid,name,lanes,ST_AsBinary(geom) as geom FROM roads WHERE lanes = 2 \
             ORDER BY name DESC"
        );
        assert_eq!(selected_columns(&ft), ["fid", "name", "lanes", "geom"]);
    }

    #[test]
    fn test_select_paging() {
        translator!(dialect, t);
        let ft = roads();
        let sql = select_sql(&dialect, &t, &ft, &Query::all().with_max_features(10), 100).unwrap();
        assert!(sql.ends_with("FROM roads LIMIT 10"));

        let sql = select_sql(&dialect, &t, &ft, &Query::all().with_start_index(5), 100).unwrap();
        assert!(sql.ends_with(" SKIP 5 LIMIT 100"));

        let sql = select_sql(&dialect, &t, &ft, &Query::all(), 100).unwrap();
        assert!(sql.ends_with("FROM roads"));
    }

    #[test]
    fn test_bounds_sql() {
        translator!(dialect, t);
        let sql = bounds_sql(&dialect, &t, &roads(), &Filter::Include).unwrap();
        assert_eq!(
            sql.as_deref(),
            Some("SELECT ST_AsBinary(ST_Envelope(geom)) FROM roads")
        );
        let plain = FeatureType::new("plain");
        assert!(bounds_sql(&dialect, &t, &plain, &Filter::Include).unwrap().is_none());
    }

    #[test]
    fn test_feature_id() {
        let ft = roads();
        assert_eq!(
            feature_id(&ft, &[SqlValue::Int(3)]).as_deref(),
            Some("roads.3")
        );
        assert!(feature_id(&ft, &[SqlValue::Null]).is_none());
        assert!(feature_id(&FeatureType::new("x"), &[]).is_none());
    }
}
