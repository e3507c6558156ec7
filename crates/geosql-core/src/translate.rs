//! Filter to SQL translation.
//!
//! [`FilterToSql`] renders a [`Filter`] as a SQL predicate. Geometry literals
//! go through a fixed pipeline before being embedded as WKT:
//!
//! 1. clamp to the bounds of the current SRID
//! 2. reproject from the current SRID into EPSG:4326
//! 3. clamp to the EPSG:4326 bounds
//! 4. degrade linear rings to line strings
//!
//! The current SRID is the literal's own tag or, when untagged, the native
//! SRID of the attribute on the other side of the predicate.

use log::debug;

use crate::codec;
use crate::crs::{ClampPolicy, CoordinateOperations, WGS84};
use crate::dialect::SqlDialect;
use crate::error::{FilterError, Result};
use crate::filter::{Expression, Filter, SpatialFilter, SpatialOp};
use crate::geometry::GeometryValue;
use crate::types::{FeatureType, Srid, Value};
use crate::utils::encode_scalar;

/// Renders filters for one feature type.
#[derive(Debug, Clone, Copy)]
pub struct FilterToSql<'a> {
    dialect: &'a dyn SqlDialect,
    operations: &'a CoordinateOperations,
    clamp: &'a ClampPolicy,
    feature_type: Option<&'a FeatureType>,
}

impl<'a> FilterToSql<'a> {
    /// Create a translator without a feature type.
    #[must_use]
    pub fn new(
        dialect: &'a dyn SqlDialect,
        operations: &'a CoordinateOperations,
        clamp: &'a ClampPolicy,
    ) -> Self {
        Self {
            dialect,
            operations,
            clamp,
            feature_type: None,
        }
    }

    /// Resolve properties against `feature_type`.
    #[must_use]
    pub fn with_feature_type(mut self, feature_type: &'a FeatureType) -> Self {
        self.feature_type = Some(feature_type);
        self
    }

    /// Render `filter` as a SQL predicate.
    ///
    /// The whole tree is checked against the dialect capabilities first, so
    /// no SQL is produced for a filter containing an unsupported operator.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::UnsupportedOperator`] for operators outside the
    /// dialect's repertoire, and CRS or codec errors from literal emission.
    pub fn encode(&self, filter: &Filter) -> Result<String> {
        if let Some(kind) = self.dialect.filter_capabilities().first_unsupported(filter) {
            return Err(FilterError::UnsupportedOperator {
                operator: kind.to_string(),
            }
            .into());
        }
        let sql = self.visit(filter)?;
        debug!("Encoded filter: {sql}");
        Ok(sql)
    }

    /// Render a `WHERE` clause, or nothing for `Include`.
    ///
    /// # Errors
    ///
    /// Same as [`FilterToSql::encode`].
    pub fn encode_where(&self, filter: &Filter) -> Result<String> {
        if *filter == Filter::Include {
            return Ok(String::new());
        }
        Ok(format!(" WHERE {}", self.encode(filter)?))
    }

    /// Render a geometry literal through the clamp/reproject pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CrsError::UnknownSrid`] if the current SRID
    /// has no coordinate operation.
    pub fn encode_geometry_literal(
        &self,
        value: &GeometryValue,
        context_srid: Option<Srid>,
    ) -> Result<String> {
        let current = value.srid.or(context_srid);
        let mut g = value.clone();
        self.clamp.clamp(&mut g, current);
        self.operations.to_canonical(&mut g, current)?;
        self.clamp.clamp(&mut g, Some(WGS84));
        let wkt = codec::encode_wkt(&g.degrade_ring())?;
        Ok(self.dialect.encode_geometry_value(&wkt))
    }

    fn visit(&self, filter: &Filter) -> Result<String> {
        match filter {
            Filter::Include => Ok("1 = 1".to_string()),
            Filter::Exclude => Ok("0 = 1".to_string()),
            Filter::And(children) => self.visit_logical(children, " AND ", "1 = 1"),
            Filter::Or(children) => self.visit_logical(children, " OR ", "0 = 1"),
            Filter::Not(child) => Ok(format!("NOT ({})", self.visit(child)?)),
            Filter::Compare { op, left, right } => {
                let srid = self.context_srid(left).or_else(|| self.context_srid(right));
                Ok(format!(
                    "{} {} {}",
                    self.visit_expression(left, srid)?,
                    op.as_sql(),
                    self.visit_expression(right, srid)?
                ))
            },
            Filter::Between { expr, lower, upper } => Ok(format!(
                "{} BETWEEN {} AND {}",
                self.visit_expression(expr, None)?,
                self.visit_expression(lower, None)?,
                self.visit_expression(upper, None)?
            )),
            Filter::Like { expr, pattern } => Ok(format!(
                "{} LIKE {}",
                self.visit_expression(expr, None)?,
                encode_scalar(&Value::Text(pattern.clone()))
            )),
            Filter::IsNull(expr) => Ok(format!("{} IS NULL", self.visit_expression(expr, None)?)),
            Filter::Id(ids) => self.visit_id(ids),
            Filter::Spatial(spatial) => self.visit_spatial(spatial),
        }
    }

    fn visit_logical(&self, children: &[Filter], joiner: &str, empty: &str) -> Result<String> {
        if children.is_empty() {
            return Ok(empty.to_string());
        }
        let parts = children
            .iter()
            .map(|child| self.visit(child))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("({})", parts.join(joiner)))
    }

    fn visit_id(&self, ids: &[String]) -> Result<String> {
        let Some(feature_type) = self.feature_type else {
            return Err(invalid("Id", "feature id filters need a feature type"));
        };
        let [key] = feature_type.primary_key.columns() else {
            return Err(invalid("Id", "feature id filters need a single column key"));
        };
        if ids.is_empty() {
            return Ok("0 = 1".to_string());
        }
        let column = self.dialect.encode_column_name(None, &key.name);
        let prefix = format!("{}.", feature_type.name);
        let parts: Vec<String> = ids
            .iter()
            .map(|id| {
                let raw = id.strip_prefix(&prefix).unwrap_or(id);
                let value = raw
                    .parse::<i64>()
                    .map_or_else(|_| Value::Text(raw.to_string()), Value::Int);
                format!("{column} = {}", encode_scalar(&value))
            })
            .collect();
        Ok(format!("({})", parts.join(" OR ")))
    }

    fn visit_spatial(&self, filter: &SpatialFilter) -> Result<String> {
        // Normalize to (property, other) and remember whether the operands
        // were given the other way round.
        let (e1, e2, swapped) = match (&filter.left, &filter.right) {
            (Expression::Literal(_), Expression::Property(_)) => (&filter.right, &filter.left, true),
            _ => (&filter.left, &filter.right, false),
        };
        let srid = self.context_srid(e1).or_else(|| self.context_srid(e2));
        let a = self.visit_expression(e1, srid)?;
        let b = self.visit_expression(e2, srid)?;

        let function = match filter.op {
            SpatialOp::DWithin { distance } => {
                check_distance("DWithin", distance)?;
                return Ok(format!("ST_Distance({a}, {b})<{distance}"));
            },
            SpatialOp::Beyond { distance } => {
                check_distance("Beyond", distance)?;
                return Ok(format!("ST_Distance({a}, {b})>{distance}"));
            },
            SpatialOp::BBox => return Ok(format!("ST_Intersects({a},{b}) = true")),
            SpatialOp::Contains => "ST_Contains",
            SpatialOp::Disjoint => "ST_Disjoint",
            SpatialOp::Equals => "ST_Equals",
            SpatialOp::Intersects => "ST_Intersects",
            SpatialOp::Overlaps => "ST_Overlaps",
            SpatialOp::Within => "ST_Within",
            SpatialOp::Crosses | SpatialOp::Touches => {
                return Err(FilterError::UnsupportedOperator {
                    operator: filter.op.kind().to_string(),
                }
                .into());
            },
        };
        if swapped {
            Ok(format!("{function}({b}, {a}) = true"))
        } else {
            Ok(format!("{function}({a}, {b}) = true"))
        }
    }

    fn visit_expression(&self, expr: &Expression, context_srid: Option<Srid>) -> Result<String> {
        match expr {
            Expression::Property(name) => Ok(self.dialect.encode_column_name(None, name)),
            Expression::Literal(Value::Geometry(g)) => self.encode_geometry_literal(g, context_srid),
            Expression::Literal(value) => Ok(encode_scalar(value)),
        }
    }

    /// Native SRID of the attribute a property expression refers to.
    fn context_srid(&self, expr: &Expression) -> Option<Srid> {
        let name = expr.as_property()?;
        self.feature_type?
            .attribute(name)?
            .as_geometry()
            .and_then(|g| g.srid)
    }
}

fn check_distance(operator: &str, distance: f64) -> Result<()> {
    if distance.is_finite() {
        Ok(())
    } else {
        Err(invalid(operator, &format!("distance must be finite, got {distance}")))
    }
}

fn invalid(operator: &str, message: &str) -> crate::error::GeoSqlError {
    FilterError::InvalidOperand {
        operator: operator.to_string(),
        message: message.to_string(),
    }
    .into()
}
