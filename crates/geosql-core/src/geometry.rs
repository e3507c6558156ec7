//! Geometry values carried through the adapter.
//!
//! `geo_types` has no linear ring type, so a closed line string that was
//! produced as a ring is kept apart from ordinary geometries. Rings have no
//! text literal; [`GeometryValue::degrade_ring`] turns them into line strings
//! sharing the same coordinate sequence.

use geo_types::{Geometry, LineString};

use crate::types::{GeometryKind, Srid};

/// The shape of a geometry value.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Any ordinary geometry
    Geometry(Geometry<f64>),
    /// A closed ring
    LinearRing(LineString<f64>),
}

/// A geometry plus its SRID tag.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryValue {
    /// The shape
    pub shape: Shape,
    /// SRID the coordinates are expressed in, if known
    pub srid: Option<Srid>,
}

impl GeometryValue {
    /// Wrap a geometry with no SRID tag.
    #[must_use]
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            shape: Shape::Geometry(geometry.into()),
            srid: None,
        }
    }

    /// Wrap a linear ring. The ring is closed if it isn't already.
    #[must_use]
    pub fn ring(mut ring: LineString<f64>) -> Self {
        ring.close();
        Self {
            shape: Shape::LinearRing(ring),
            srid: None,
        }
    }

    /// Tag the value with an SRID.
    #[must_use]
    pub fn with_srid(mut self, srid: Srid) -> Self {
        self.srid = Some(srid);
        self
    }

    /// Returns `true` if the shape is a linear ring.
    #[must_use]
    pub fn is_ring(&self) -> bool {
        matches!(self.shape, Shape::LinearRing(_))
    }

    /// Geometry kind of the value. Rings report as line strings.
    #[must_use]
    pub fn kind(&self) -> GeometryKind {
        match &self.shape {
            Shape::Geometry(g) => GeometryKind::of(g),
            Shape::LinearRing(_) => GeometryKind::LineString,
        }
    }

    /// Replace a ring by a line string over the same coordinates.
    ///
    /// Ordinary geometries pass through unchanged.
    #[must_use]
    pub fn degrade_ring(self) -> Self {
        match self.shape {
            Shape::LinearRing(ring) => Self {
                shape: Shape::Geometry(Geometry::LineString(ring)),
                srid: self.srid,
            },
            Shape::Geometry(_) => self,
        }
    }

    /// Mutable access to the coordinates, as a geometry.
    pub(crate) fn geometry_mut(&mut self) -> GeometryMut<'_> {
        match &mut self.shape {
            Shape::Geometry(g) => GeometryMut::Geometry(g),
            Shape::LinearRing(r) => GeometryMut::Ring(r),
        }
    }
}

impl From<Geometry<f64>> for GeometryValue {
    fn from(geometry: Geometry<f64>) -> Self {
        Self::new(geometry)
    }
}

/// Borrowed coordinates of a [`GeometryValue`].
pub(crate) enum GeometryMut<'a> {
    Geometry(&'a mut Geometry<f64>),
    Ring(&'a mut LineString<f64>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{Point, line_string};

    #[test]
    fn test_degrade_ring_keeps_coordinates() {
        let ring = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        let value = GeometryValue::ring(ring).with_srid(4326);
        assert!(value.is_ring());

        let degraded = value.degrade_ring();
        assert!(!degraded.is_ring());
        assert_eq!(degraded.srid, Some(4326));
        let Shape::Geometry(Geometry::LineString(line)) = degraded.shape else {
            panic!("expected a line string")
        };
        assert_eq!(line.0.len(), 4);
        assert_eq!(line.0.first(), line.0.last());
    }

    #[test]
    fn test_degrade_ring_passes_other_geometries() {
        let value = GeometryValue::new(Point::new(3.0, 4.0));
        assert_eq!(value.clone().degrade_ring(), value);
        assert_eq!(value.kind(), GeometryKind::Point);
    }
}
