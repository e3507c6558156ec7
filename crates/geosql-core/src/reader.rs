//! Feature reader.
//!
//! Turns the rows of a [`crate::sql::select_sql`] query back into features.
//! Rows are positional: key columns first, then the non-key attributes in
//! feature type order.

use arrow_schema::DataType;
use geosql_common::{Row, SqlValue};
use log::trace;

use crate::codec;
use crate::crs::CoordinateOperations;
use crate::error::{CodecError, Result};
use crate::geometry::GeometryValue;
use crate::sql;
use crate::types::{AttributeKind, Feature, FeatureType, GeometryAttribute, Value};

/// Decode a WKB row value into the attribute's native reference system.
///
/// Stored coordinates are canonical (EPSG:4326); they are reprojected into
/// the attribute's SRID and tagged with it. Attributes without a known SRID
/// keep the stored coordinates untagged.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] on malformed WKB and
/// [`crate::error::CrsError::UnknownSrid`] for an unregistered SRID.
pub fn decode_geometry_value(
    attribute: &GeometryAttribute,
    bytes: &[u8],
    operations: &CoordinateOperations,
) -> Result<GeometryValue> {
    let mut value = GeometryValue::new(codec::decode_wkb(bytes)?);
    operations.from_canonical(&mut value, attribute.srid)?;
    if let Some(crs) = &attribute.crs {
        value.srid = Some(crs.srid());
    }
    Ok(value)
}

/// Decodes rows of one feature type.
#[derive(Debug, Clone, Copy)]
pub struct FeatureReader<'a> {
    feature_type: &'a FeatureType,
    operations: &'a CoordinateOperations,
}

impl<'a> FeatureReader<'a> {
    /// Create a reader for `feature_type`.
    #[must_use]
    pub fn new(feature_type: &'a FeatureType, operations: &'a CoordinateOperations) -> Self {
        Self {
            feature_type,
            operations,
        }
    }

    /// Decode every row, skipping rows whose key is null.
    ///
    /// # Errors
    ///
    /// Fails on the first value that cannot be decoded.
    pub fn read_all(&self, rows: &[Row]) -> Result<Vec<Feature>> {
        let mut features = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(feature) = self.read(row)? {
                features.push(feature);
            }
        }
        Ok(features)
    }

    /// Decode one row. Returns `None` when a key value is null.
    ///
    /// # Errors
    ///
    /// Returns a codec or CRS error if a geometry cannot be decoded.
    pub fn read(&self, row: &Row) -> Result<Option<Feature>> {
        let key = &self.feature_type.primary_key;
        let key_len = key.columns().len();
        let key_values: Vec<SqlValue> = (0..key_len)
            .map(|i| row.get(i).cloned().unwrap_or(SqlValue::Null))
            .collect();
        if key_values.iter().any(SqlValue::is_null) {
            trace!("Skipping a {} row with a null key", self.feature_type.name);
            return Ok(None);
        }

        let mut feature = Feature::new();
        feature.id = sql::feature_id(self.feature_type, &key_values);

        let attributes = self
            .feature_type
            .attributes
            .iter()
            .filter(|a| !key.contains(&a.name));
        for (offset, attribute) in attributes.enumerate() {
            let raw = row.get(key_len + offset).unwrap_or(&SqlValue::Null);
            let value = match (&attribute.kind, raw) {
                (_, SqlValue::Null) => Value::Null,
                (AttributeKind::Geometry(geometry), SqlValue::Bytes(bytes)) => {
                    Value::Geometry(decode_geometry_value(geometry, bytes, self.operations)?)
                },
                (AttributeKind::Geometry(_), other) => {
                    return Err(CodecError::Decode {
                        format: "WKB",
                        message: format!("{} is not a binary value: {other}", attribute.name),
                    }
                    .into());
                },
                (AttributeKind::Scalar(dt), value) => coerce(dt, value),
                (AttributeKind::Association, value) => coerce(&DataType::Utf8, value),
            };
            feature.values.push((attribute.name.clone(), value));
        }

        // Exposed key columns are read from the key prefix of the row.
        for (i, column) in key.columns().iter().enumerate() {
            if let Some(attribute) = self.feature_type.attribute(&column.name) {
                let value = match &attribute.kind {
                    AttributeKind::Scalar(dt) => coerce(dt, &key_values[i]),
                    _ => coerce(&DataType::Utf8, &key_values[i]),
                };
                feature.values.insert(i, (attribute.name.clone(), value));
            }
        }
        Ok(Some(feature))
    }
}

/// Convert a SQL value to the attribute's binding.
fn coerce(data_type: &DataType, value: &SqlValue) -> Value {
    match (data_type, value) {
        (_, SqlValue::Null) => Value::Null,
        (DataType::Boolean, SqlValue::Bool(b)) => Value::Bool(*b),
        (DataType::Boolean, SqlValue::Int(i)) => Value::Bool(*i != 0),
        (DataType::Boolean, SqlValue::Text(s)) => match s.to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Value::Bool(true),
            "false" | "f" | "0" => Value::Bool(false),
            _ => Value::Text(s.clone()),
        },
        (DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64, v) => {
            v.as_i64().map_or_else(|| passthrough(v), Value::Int)
        },
        (DataType::Float32 | DataType::Float64 | DataType::Decimal128(..), SqlValue::Int(i)) => {
            #[allow(clippy::cast_precision_loss)]
            Value::Double(*i as f64)
        },
        (DataType::Float32 | DataType::Float64 | DataType::Decimal128(..), SqlValue::Text(s)) => s
            .trim()
            .parse()
            .map_or_else(|_| Value::Text(s.clone()), Value::Double),
        (DataType::Utf8, SqlValue::Bytes(b)) => Value::Text(String::from_utf8_lossy(b).into()),
        (DataType::Utf8, v) if !matches!(v, SqlValue::Text(_)) => Value::Text(v.to_string()),
        (_, v) => passthrough(v),
    }
}

fn passthrough(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Bool(*b),
        SqlValue::Int(i) => Value::Int(*i),
        SqlValue::Double(d) => Value::Double(*d),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Bytes(b) => Value::Bytes(b.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::{BRITISH_NATIONAL_GRID, UNKNOWN_SRID};
    use crate::geometry::Shape;
    use crate::types::{AttributeDescriptor, GeometryKind, PrimaryKey, PrimaryKeyColumn};
    use geo_types::{Geometry, Point};

    fn wkb(x: f64, y: f64) -> Vec<u8> {
        codec::encode_wkb(&Point::new(x, y).into()).unwrap()
    }

    fn sites(srid: Option<i32>) -> FeatureType {
        FeatureType::new("sites")
            .with_primary_key(PrimaryKey::new(
                "sites",
                vec![PrimaryKeyColumn::new("fid", DataType::Int64)],
            ))
            .with_attribute(AttributeDescriptor::scalar("name", DataType::Utf8))
            .with_attribute(AttributeDescriptor::scalar("open", DataType::Boolean))
            .with_attribute(AttributeDescriptor::geometry(
                "geom",
                GeometryAttribute::new(GeometryKind::Point, srid),
            ))
    }

    fn point(value: &Value) -> Point<f64> {
        match value {
            Value::Geometry(GeometryValue {
                shape: Shape::Geometry(Geometry::Point(p)),
                ..
            }) => *p,
            other => panic!("expected a point, got {other:?}"),
        }
    }

    #[test]
    fn test_read_row() {
        let ft = sites(Some(4326));
        let operations = CoordinateOperations::default();
        let reader = FeatureReader::new(&ft, &operations);
        let row = Row::new(
            vec!["fid".into(), "name".into(), "open".into(), "geom".into()],
            vec![
                SqlValue::Int(12),
                SqlValue::Text("Kew".into()),
                SqlValue::Int(1),
                SqlValue::Bytes(wkb(-0.29, 51.48)),
            ],
        );
        let feature = reader.read(&row).unwrap().unwrap();
        assert_eq!(feature.id.as_deref(), Some("sites.12"));
        assert_eq!(feature.get("name"), Some(&Value::Text("Kew".into())));
        assert_eq!(feature.get("open"), Some(&Value::Bool(true)));
        assert_eq!(point(feature.get("geom").unwrap()), Point::new(-0.29, 51.48));
        assert!(feature.get("fid").is_none());
    }

    #[test]
    fn test_null_key_skips_row() {
        let ft = sites(None);
        let operations = CoordinateOperations::default();
        let rows = vec![
            Row::new(vec![], vec![SqlValue::Null, SqlValue::Null, SqlValue::Null, SqlValue::Null]),
            Row::new(vec![], vec![SqlValue::Int(1), SqlValue::Null, SqlValue::Null, SqlValue::Null]),
        ];
        let features = FeatureReader::new(&ft, &operations).read_all(&rows).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].get("geom"), Some(&Value::Null));
    }

    #[test]
    fn test_geometry_reprojected_to_native_srid() {
        let operations = CoordinateOperations::default();
        let mut stored = GeometryValue::new(Point::new(651_409.903, 313_177.270));
        operations
            .to_canonical(&mut stored, Some(BRITISH_NATIONAL_GRID))
            .unwrap();
        let Shape::Geometry(canonical) = &stored.shape else {
            panic!("expected a geometry");
        };
        let bytes = codec::encode_wkb(canonical).unwrap();

        let attribute = GeometryAttribute::new(GeometryKind::Point, Some(BRITISH_NATIONAL_GRID));
        let value = decode_geometry_value(&attribute, &bytes, &operations).unwrap();
        assert_eq!(value.srid, Some(BRITISH_NATIONAL_GRID));
        let p = point(&Value::Geometry(value));
        assert!((p.x() - 651_409.903).abs() < 1.0, "easting {}", p.x());
        assert!((p.y() - 313_177.270).abs() < 1.0, "northing {}", p.y());
    }

    #[test]
    fn test_unknown_srid_is_left_untagged() {
        let operations = CoordinateOperations::default();
        let attribute = GeometryAttribute::new(GeometryKind::Point, Some(UNKNOWN_SRID));
        let value = decode_geometry_value(&attribute, &wkb(3.0, 4.0), &operations).unwrap();
        assert!(value.srid.is_none());
    }

    #[test]
    fn test_malformed_geometry() {
        let ft = sites(None);
        let operations = CoordinateOperations::default();
        let row = Row::new(
            vec![],
            vec![SqlValue::Int(1), SqlValue::Null, SqlValue::Null, SqlValue::Bytes(vec![1, 2])],
        );
        assert!(FeatureReader::new(&ft, &operations).read(&row).is_err());
    }

    #[test]
    fn test_coerce() {
        assert_eq!(coerce(&DataType::Int32, &SqlValue::Text("7".into())), Value::Int(7));
        assert_eq!(coerce(&DataType::Float64, &SqlValue::Int(2)), Value::Double(2.0));
        assert_eq!(coerce(&DataType::Utf8, &SqlValue::Int(2)), Value::Text("2".into()));
        assert_eq!(coerce(&DataType::Binary, &SqlValue::Bytes(vec![1])), Value::Bytes(vec![1]));
    }
}
