//! Geometry codec: WKB and WKT conversion.
//!
//! Result rows carry geometries as WKB (selected through `ST_AsBinary`) and
//! SQL literals embed them as WKT (`ST_GeomFromText('...')`). Both directions
//! go through `geozero`.

use geo::BoundingRect;
use geo_types::{Geometry, Rect};
use geozero::wkb::Wkb;
use geozero::wkt::Wkt;
use geozero::{CoordDimensions, ToGeo, ToWkb, ToWkt};

use crate::error::CodecError;
use crate::geometry::{GeometryValue, Shape};

/// Decode a WKB payload.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if the bytes are not valid WKB.
pub fn decode_wkb(bytes: &[u8]) -> Result<Geometry<f64>, CodecError> {
    Wkb(bytes.to_vec()).to_geo().map_err(|e| CodecError::Decode {
        format: "WKB",
        message: e.to_string(),
    })
}

/// Encode a geometry as two dimensional WKB.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if the geometry cannot be written.
pub fn encode_wkb(geometry: &Geometry<f64>) -> Result<Vec<u8>, CodecError> {
    geometry
        .to_wkb(CoordDimensions::xy())
        .map_err(|e| CodecError::Encode {
            format: "WKB",
            message: e.to_string(),
        })
}

/// Parse a WKT string.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if the text is not valid WKT.
pub fn decode_wkt(text: &str) -> Result<Geometry<f64>, CodecError> {
    Wkt(text.to_string()).to_geo().map_err(|e| CodecError::Decode {
        format: "WKT",
        message: e.to_string(),
    })
}

/// Render a geometry value as WKT.
///
/// # Errors
///
/// Returns [`CodecError::RingLiteral`] for linear rings, which have no text
/// form, and [`CodecError::Encode`] if the geometry cannot be written.
pub fn encode_wkt(value: &GeometryValue) -> Result<String, CodecError> {
    match &value.shape {
        Shape::Geometry(geometry) => geometry_to_wkt(geometry),
        Shape::LinearRing(_) => Err(CodecError::RingLiteral),
    }
}

/// Render a plain geometry as WKT.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if the geometry cannot be written.
pub fn geometry_to_wkt(geometry: &Geometry<f64>) -> Result<String, CodecError> {
    geometry.to_wkt().map_err(|e| CodecError::Encode {
        format: "WKT",
        message: e.to_string(),
    })
}

/// Decode a WKB payload and keep only its bounding rectangle.
///
/// Empty geometries have no envelope and yield `Ok(None)`.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if the bytes are not valid WKB.
pub fn decode_envelope(bytes: &[u8]) -> Result<Option<Rect<f64>>, CodecError> {
    Ok(decode_wkb(bytes)?.bounding_rect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{LineString, Point, Polygon, line_string, polygon};

    #[test]
    fn test_point_round_trip() {
        let point: Geometry<f64> = Point::new(-0.1276, 51.5072).into();
        let wkb = encode_wkb(&point).unwrap();
        assert_eq!(decode_wkb(&wkb).unwrap(), point);
    }

    #[test]
    fn test_line_round_trip() {
        let line: Geometry<f64> =
            line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 5.0), (x: 20.0, y: 0.0)].into();
        let wkb = encode_wkb(&line).unwrap();
        assert_eq!(decode_wkb(&wkb).unwrap(), line);
    }

    #[test]
    fn test_polygon_wkt_round_trip() {
        let poly: Geometry<f64> = polygon![
            (x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0), (x: 0.0, y: 0.0)
        ]
        .into();
        let text = encode_wkt(&GeometryValue::new(poly.clone())).unwrap();
        assert!(text.starts_with("POLYGON"));
        assert_eq!(decode_wkt(&text).unwrap(), poly);
    }

    #[test]
    fn test_ring_is_rejected() {
        let ring = GeometryValue::ring(LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]));
        assert!(matches!(encode_wkt(&ring), Err(CodecError::RingLiteral)));

        let text = encode_wkt(&ring.degrade_ring()).unwrap();
        assert!(text.starts_with("LINESTRING"));
    }

    #[test]
    fn test_envelope_of_polygon() {
        let poly: Geometry<f64> = Polygon::new(
            LineString::from(vec![(1.0, 2.0), (5.0, 2.0), (5.0, 7.0), (1.0, 2.0)]),
            vec![],
        )
        .into();
        let envelope = decode_envelope(&encode_wkb(&poly).unwrap()).unwrap().unwrap();
        assert_eq!(envelope.min().x, 1.0);
        assert_eq!(envelope.min().y, 2.0);
        assert_eq!(envelope.max().x, 5.0);
        assert_eq!(envelope.max().y, 7.0);
    }

    #[test]
    fn test_malformed_wkb_fails() {
        let err = decode_envelope(&[0x01, 0x02, 0x03]).unwrap_err();
        assert!(matches!(err, CodecError::Decode { format: "WKB", .. }));
        assert!(decode_wkt("POINT (nope)").is_err());
    }
}
