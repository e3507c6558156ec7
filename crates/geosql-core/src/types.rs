//! Feature model types.
//!
//! This module defines the in-memory vector feature model the adapter maps to
//! and from SQL: feature types with their attribute descriptors, primary keys,
//! virtual tables, feature values and the per-table content entry that caches
//! a built feature type.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use arrow_schema::DataType;
use geo_types::Geometry;
use geosql_common::CatalogColumn;

use crate::crs::Crs;
use crate::geometry::GeometryValue;

/// Spatial reference identifier (an EPSG code). `-1` means unknown.
pub type Srid = i32;

/// Closed set of geometry kinds a column can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeometryKind {
    /// A single point
    Point,
    /// A line string
    LineString,
    /// A polygon with optional holes
    Polygon,
    /// A collection of points
    MultiPoint,
    /// A collection of line strings
    MultiLineString,
    /// A collection of polygons
    MultiPolygon,
    /// Any geometry
    Geometry,
    /// A heterogeneous collection
    GeometryCollection,
}

impl GeometryKind {
    /// Every geometry kind, in type code order.
    pub const ALL: [GeometryKind; 8] = [
        GeometryKind::Point,
        GeometryKind::LineString,
        GeometryKind::Polygon,
        GeometryKind::MultiPoint,
        GeometryKind::MultiLineString,
        GeometryKind::MultiPolygon,
        GeometryKind::Geometry,
        GeometryKind::GeometryCollection,
    ];

    /// Upper-case name stored in the `type` column of `geometry_columns`.
    #[must_use]
    pub fn canonical_name(self) -> &'static str {
        match self {
            GeometryKind::Point => "POINT",
            GeometryKind::LineString => "LINESTRING",
            GeometryKind::Polygon => "POLYGON",
            GeometryKind::MultiPoint => "MULTIPOINT",
            GeometryKind::MultiLineString => "MULTILINESTRING",
            GeometryKind::MultiPolygon => "MULTIPOLYGON",
            GeometryKind::Geometry => "GEOMETRY",
            GeometryKind::GeometryCollection => "GEOMETRYCOLLECTION",
        }
    }

    /// Parse a canonical name, ignoring case.
    #[must_use]
    pub fn from_canonical_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.canonical_name().eq_ignore_ascii_case(name))
    }

    /// Kind of a concrete geometry. Rings, rectangles and triangles are
    /// reported as the kind they are written as.
    #[must_use]
    pub fn of(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::Line(_) | Geometry::LineString(_) => GeometryKind::LineString,
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
                GeometryKind::Polygon
            },
            Geometry::MultiPoint(_) => GeometryKind::MultiPoint,
            Geometry::MultiLineString(_) => GeometryKind::MultiLineString,
            Geometry::MultiPolygon(_) => GeometryKind::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryKind::GeometryCollection,
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// What an attribute is bound to in the feature model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Binding {
    /// A scalar value, expressed with the Arrow type vocabulary
    Scalar(DataType),
    /// A geometry of the given kind
    Geometry(GeometryKind),
    /// A reference to another feature
    Association,
}

impl Binding {
    /// Returns `true` for geometry bindings.
    #[must_use]
    pub fn is_geometry(&self) -> bool {
        matches!(self, Binding::Geometry(_))
    }
}

/// Geometry-specific part of an attribute descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryAttribute {
    /// Geometry kind the column holds
    pub kind: GeometryKind,
    /// Native SRID of the column, `None` when unknown
    pub srid: Option<Srid>,
    /// Reference system derived from the SRID
    pub crs: Option<Crs>,
    /// Coordinate dimension
    pub dimension: u32,
}

impl GeometryAttribute {
    /// Create a two dimensional geometry attribute of the given kind.
    #[must_use]
    pub fn new(kind: GeometryKind, srid: Option<Srid>) -> Self {
        Self {
            kind,
            srid,
            crs: Crs::from_srid(srid),
            dimension: 2,
        }
    }

    /// Set the coordinate dimension.
    #[must_use]
    pub fn with_dimension(mut self, dimension: u32) -> Self {
        self.dimension = dimension;
        self
    }
}

/// Kind of an attribute descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeKind {
    /// A scalar column
    Scalar(DataType),
    /// A geometry column
    Geometry(GeometryAttribute),
    /// A column referencing another feature
    Association,
}

/// One attribute of a feature type.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDescriptor {
    /// Attribute (column) name
    pub name: String,
    /// Whether the attribute accepts `NULL`
    pub nullable: bool,
    /// Binding of the attribute
    pub kind: AttributeKind,
    /// Native type name reported by the catalog
    pub native_type_name: Option<String>,
    /// Whether the attribute is part of the primary key
    pub is_key: bool,
}

impl AttributeDescriptor {
    /// Create a nullable scalar attribute.
    #[must_use]
    pub fn scalar(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, AttributeKind::Scalar(data_type))
    }

    /// Create a nullable geometry attribute.
    #[must_use]
    pub fn geometry(name: impl Into<String>, geometry: GeometryAttribute) -> Self {
        Self::new(name, AttributeKind::Geometry(geometry))
    }

    /// Create a nullable association attribute.
    #[must_use]
    pub fn association(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Association)
    }

    fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            nullable: true,
            kind,
            native_type_name: None,
            is_key: false,
        }
    }

    /// Set nullability.
    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Record the native type name.
    #[must_use]
    pub fn with_native_type(mut self, name: impl Into<String>) -> Self {
        self.native_type_name = Some(name.into());
        self
    }

    /// Geometry part of the descriptor, if it is a geometry attribute.
    #[must_use]
    pub fn as_geometry(&self) -> Option<&GeometryAttribute> {
        match &self.kind {
            AttributeKind::Geometry(g) => Some(g),
            AttributeKind::Scalar(_) | AttributeKind::Association => None,
        }
    }

    /// Binding of the descriptor.
    #[must_use]
    pub fn binding(&self) -> Binding {
        match &self.kind {
            AttributeKind::Scalar(dt) => Binding::Scalar(dt.clone()),
            AttributeKind::Geometry(g) => Binding::Geometry(g.kind),
            AttributeKind::Association => Binding::Association,
        }
    }
}

/// One column of a primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKeyColumn {
    /// Column name
    pub name: String,
    /// Bound type, `None` while unknown (view-backed keys learn it from the
    /// column binding during introspection)
    pub data_type: Option<DataType>,
}

impl PrimaryKeyColumn {
    /// Create a key column with a known type.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type: Some(data_type),
        }
    }

    /// Create a key column whose type is not known yet.
    #[must_use]
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: None,
        }
    }
}

/// Primary key of a table.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PrimaryKey {
    /// A usable key made of one or more columns
    Keyed {
        /// Table the key belongs to
        table: String,
        /// Key columns, in key order
        columns: Vec<PrimaryKeyColumn>,
    },
    /// No usable key; features of the table cannot be written
    #[default]
    Null,
}

impl PrimaryKey {
    /// Create a key over `columns`.
    #[must_use]
    pub fn new(table: impl Into<String>, columns: Vec<PrimaryKeyColumn>) -> Self {
        PrimaryKey::Keyed {
            table: table.into(),
            columns,
        }
    }

    /// Key columns; empty for [`PrimaryKey::Null`].
    #[must_use]
    pub fn columns(&self) -> &[PrimaryKeyColumn] {
        match self {
            PrimaryKey::Keyed { columns, .. } => columns,
            PrimaryKey::Null => &[],
        }
    }

    /// Returns `true` if `name` is a key column.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.columns().iter().any(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Returns `true` for [`PrimaryKey::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, PrimaryKey::Null)
    }

    /// Give an untyped key column its type. Typed columns are left alone.
    pub fn learn_type(&mut self, name: &str, data_type: &DataType) {
        if let PrimaryKey::Keyed { columns, .. } = self {
            for column in columns.iter_mut() {
                if column.data_type.is_none() && column.name.eq_ignore_ascii_case(name) {
                    column.data_type = Some(data_type.clone());
                }
            }
        }
    }
}

/// Geometry declaration of a virtual table column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualGeometry {
    /// Declared kind
    pub kind: GeometryKind,
    /// Declared SRID
    pub srid: Option<Srid>,
    /// Declared dimension
    pub dimension: u32,
}

/// A feature type defined by a SQL query instead of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualTable {
    /// Name the feature type is published under
    pub name: String,
    /// Defining query
    pub sql: String,
    /// Geometry declarations keyed by column name
    pub geometries: HashMap<String, VirtualGeometry>,
    /// Declared key columns
    pub primary_key_columns: Vec<String>,
}

impl VirtualTable {
    /// Create a virtual table over `sql`.
    #[must_use]
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            geometries: HashMap::new(),
            primary_key_columns: Vec::new(),
        }
    }

    /// Declare a geometry column.
    #[must_use]
    pub fn with_geometry(
        mut self,
        column: impl Into<String>,
        kind: GeometryKind,
        srid: Option<Srid>,
        dimension: u32,
    ) -> Self {
        self.geometries.insert(
            column.into(),
            VirtualGeometry {
                kind,
                srid,
                dimension,
            },
        );
        self
    }

    /// Declare the key columns.
    #[must_use]
    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key_columns = columns.iter().map(ToString::to_string).collect();
        self
    }

    /// Declared SRID of a geometry column.
    #[must_use]
    pub fn native_srid(&self, column: &str) -> Option<Srid> {
        self.geometries.get(column).and_then(|g| g.srid)
    }

    /// Declared dimension of a geometry column.
    #[must_use]
    pub fn dimension(&self, column: &str) -> Option<u32> {
        self.geometries.get(column).map(|g| g.dimension)
    }
}

/// Raw column metadata plus the binding resolved for it.
///
/// Only lives for the duration of an introspection.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMetadata {
    /// Column name
    pub name: String,
    /// Native type name
    pub type_name: String,
    /// Native type code
    pub type_code: i32,
    /// Whether `NULL` is allowed
    pub nullable: bool,
    /// Resolved binding, `None` when unmappable
    pub binding: Option<Binding>,
    /// Whether the column holds an embedded value
    pub embedded: bool,
    /// Element type name of the embedded value
    pub embedded_type: Option<String>,
    /// Base type of a user defined type
    pub source_data_type: Option<i32>,
}

impl From<&CatalogColumn> for ColumnMetadata {
    fn from(column: &CatalogColumn) -> Self {
        Self {
            name: column.name.clone(),
            type_name: column.type_name.clone(),
            type_code: column.data_type,
            nullable: column.nullable(),
            binding: None,
            embedded: column.is_embedded(),
            embedded_type: column.embedded_type.clone(),
            source_data_type: column.source_data_type,
        }
    }
}

/// A feature type: an ordered set of attribute descriptors.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureType {
    /// Type (table) name
    pub name: String,
    /// Namespace URI, if any
    pub namespace: Option<String>,
    /// Attributes in column order
    pub attributes: Vec<AttributeDescriptor>,
    /// Primary key of the backing table
    pub primary_key: PrimaryKey,
    /// Whether features of this type cannot be written
    pub read_only: bool,
}

impl FeatureType {
    /// Create an empty, writable feature type.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            attributes: Vec::new(),
            primary_key: PrimaryKey::Null,
            read_only: false,
        }
    }

    /// Append an attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Set the primary key.
    #[must_use]
    pub fn with_primary_key(mut self, key: PrimaryKey) -> Self {
        self.primary_key = key;
        self
    }

    /// Look up an attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Geometry attributes in column order.
    pub fn geometry_attributes(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes.iter().filter(|a| a.as_geometry().is_some())
    }

    /// The first geometry attribute.
    #[must_use]
    pub fn default_geometry(&self) -> Option<&AttributeDescriptor> {
        self.geometry_attributes().next()
    }
}

/// Value of one feature attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value
    Null,
    /// Boolean
    Bool(bool),
    /// Integral number
    Int(i64),
    /// Floating point number
    Double(f64),
    /// Text
    Text(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// Geometry
    Geometry(GeometryValue),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the value kind, for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Double(_) => "double",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Geometry(_) => "geometry",
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<GeometryValue> for Value {
    fn from(v: GeometryValue) -> Self {
        Value::Geometry(v)
    }
}

/// A feature: an identifier plus attribute values in feature type order.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Feature identifier (`TypeName.<key>`), if known
    pub id: Option<String>,
    /// Attribute values keyed by name, in order
    pub values: Vec<(String, Value)>,
}

impl Feature {
    /// Create a feature without an identifier.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: None,
            values: Vec::new(),
        }
    }

    /// Set an attribute value.
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((name.into(), value.into()));
        self
    }

    /// Value of an attribute; absent attributes read as `None`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

impl Default for Feature {
    fn default() -> Self {
        Self::new()
    }
}

/// State the store keeps for one published feature type.
///
/// The built feature type is cached here until [`ContentEntry::invalidate`]
/// is called.
#[derive(Debug)]
pub struct ContentEntry {
    /// Type (table) name
    pub type_name: String,
    /// Database schema, if any
    pub schema: Option<String>,
    cache: Mutex<Option<Arc<FeatureType>>>,
}

impl ContentEntry {
    /// Create an entry for a table.
    #[must_use]
    pub fn new(type_name: impl Into<String>, schema: Option<String>) -> Self {
        Self {
            type_name: type_name.into(),
            schema,
            cache: Mutex::new(None),
        }
    }

    /// The cached feature type, if one was built.
    #[must_use]
    pub fn cached(&self) -> Option<Arc<FeatureType>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Cache a built feature type.
    pub fn store(&self, feature_type: Arc<FeatureType>) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(feature_type);
    }

    /// Drop the cached feature type so the next access rebuilds it.
    pub fn invalidate(&self) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
