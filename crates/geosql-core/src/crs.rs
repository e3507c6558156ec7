//! Coordinate reference system support.
//!
//! Geometries are stored in EPSG:4326. This module provides the pieces needed
//! to move literals and row values between that canonical system and a
//! column's native SRID:
//!
//! - [`Crs`]: the reference system tag attached to geometry attributes
//! - [`ClampPolicy`]: per-SRID coordinate bounds applied to literals
//! - [`CoordinateOperation`]: a reprojection to and from EPSG:4326
//! - [`CoordinateOperations`]: the SRID-keyed lookup of operations
//!
//! Two operations are built in: spherical Web Mercator (EPSG:3857) and the
//! British National Grid (EPSG:27700, OSGB36 with a Helmert datum shift).

use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use std::fmt;
use std::sync::Arc;

use geo::MapCoordsInPlace;
use geo_types::{Coord, Rect, coord};
use log::debug;

use crate::error::CrsError;
use crate::geometry::{GeometryMut, GeometryValue};
use crate::types::Srid;

/// The canonical geographic system geometries are stored in.
pub const WGS84: Srid = 4326;
/// SRID value meaning "unknown", disables reprojection.
pub const UNKNOWN_SRID: Srid = -1;
/// OSGB 1936 / British National Grid.
pub const BRITISH_NATIONAL_GRID: Srid = 27700;
/// WGS 84 / Pseudo-Mercator.
pub const WEB_MERCATOR: Srid = 3857;

/// A coordinate reference system, identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crs {
    srid: Srid,
}

impl Crs {
    /// Tag for `srid`; unknown and absent SRIDs have no tag.
    #[must_use]
    pub fn from_srid(srid: Option<Srid>) -> Option<Self> {
        match srid {
            Some(srid) if srid != UNKNOWN_SRID => Some(Self { srid }),
            _ => None,
        }
    }

    /// Parse an `EPSG:<code>` identifier.
    #[must_use]
    pub fn parse(code: &str) -> Option<Self> {
        let (authority, srid) = code.split_once(':')?;
        if !authority.trim().eq_ignore_ascii_case("EPSG") {
            return None;
        }
        Self::from_srid(srid.trim().parse().ok())
    }

    /// EPSG code of the system.
    #[must_use]
    pub fn srid(&self) -> Srid {
        self.srid
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.srid)
    }
}

/// Coordinate bounds applied to geometry literals, keyed by SRID.
///
/// Each coordinate is clamped independently into the rectangle registered for
/// the SRID the geometry is expressed in. SRIDs without bounds are left alone.
#[derive(Debug, Clone, PartialEq)]
pub struct ClampPolicy {
    bounds: HashMap<Srid, Rect<f64>>,
}

impl Default for ClampPolicy {
    fn default() -> Self {
        Self::empty()
            .with_bounds(
                WGS84,
                Rect::new(coord! { x: -180.0, y: -90.0 }, coord! { x: 180.0, y: 90.0 }),
            )
            .with_bounds(
                BRITISH_NATIONAL_GRID,
                Rect::new(
                    coord! { x: -84_702.619_147_361_08, y: -9_272.577_651_805_477 },
                    coord! { x: 676_223.724_190_000_9, y: 1_242_876.667_023_777 },
                ),
            )
    }
}

impl ClampPolicy {
    /// A policy that clamps nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            bounds: HashMap::new(),
        }
    }

    /// Register (or replace) the bounds for `srid`.
    #[must_use]
    pub fn with_bounds(mut self, srid: Srid, bounds: Rect<f64>) -> Self {
        self.bounds.insert(srid, bounds);
        self
    }

    /// Remove the bounds for `srid`.
    #[must_use]
    pub fn without(mut self, srid: Srid) -> Self {
        self.bounds.remove(&srid);
        self
    }

    /// Bounds registered for `srid`.
    #[must_use]
    pub fn bounds_for(&self, srid: Srid) -> Option<Rect<f64>> {
        self.bounds.get(&srid).copied()
    }

    /// Clamp every coordinate of `value` into the bounds of `srid`.
    pub fn clamp(&self, value: &mut GeometryValue, srid: Option<Srid>) {
        let Some(bounds) = srid.and_then(|srid| self.bounds_for(srid)) else {
            return;
        };
        let (min, max) = (bounds.min(), bounds.max());
        let clamp = |c: Coord<f64>| coord! { x: c.x.clamp(min.x, max.x), y: c.y.clamp(min.y, max.y) };
        match value.geometry_mut() {
            GeometryMut::Geometry(g) => g.map_coords_in_place(clamp),
            GeometryMut::Ring(r) => r.map_coords_in_place(clamp),
        }
    }
}

/// A reprojection between one SRID and EPSG:4326.
///
/// Canonical coordinates are `x` = longitude, `y` = latitude, in degrees.
pub trait CoordinateOperation: Send + Sync + fmt::Debug {
    /// The SRID this operation converts from and to.
    fn srid(&self) -> Srid;

    /// Convert a native coordinate to EPSG:4326.
    fn to_canonical(&self, c: Coord<f64>) -> Coord<f64>;

    /// Convert an EPSG:4326 coordinate to the native system.
    fn from_canonical(&self, c: Coord<f64>) -> Coord<f64>;
}

/// Spherical Web Mercator (EPSG:3857).
#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercator;

const MERCATOR_RADIUS: f64 = 6_378_137.0;

impl CoordinateOperation for WebMercator {
    fn srid(&self) -> Srid {
        WEB_MERCATOR
    }

    fn to_canonical(&self, c: Coord<f64>) -> Coord<f64> {
        let lon = (c.x / MERCATOR_RADIUS).to_degrees();
        let lat = (2.0 * (c.y / MERCATOR_RADIUS).exp().atan() - FRAC_PI_2).to_degrees();
        coord! { x: lon, y: lat }
    }

    fn from_canonical(&self, c: Coord<f64>) -> Coord<f64> {
        let x = MERCATOR_RADIUS * c.x.to_radians();
        let y = MERCATOR_RADIUS * (FRAC_PI_4 + c.y.to_radians() / 2.0).tan().ln();
        coord! { x: x, y: y }
    }
}

/// Reference ellipsoid, semi-major and semi-minor axes in metres.
#[derive(Debug, Clone, Copy)]
struct Ellipsoid {
    a: f64,
    b: f64,
}

impl Ellipsoid {
    const AIRY_1830: Ellipsoid = Ellipsoid {
        a: 6_377_563.396,
        b: 6_356_256.909,
    };
    const GRS80: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        b: 6_356_752.3142,
    };

    fn e2(self) -> f64 {
        1.0 - (self.b * self.b) / (self.a * self.a)
    }

    /// Geodetic latitude/longitude (radians, height 0) to cartesian.
    fn to_cartesian(self, lat: f64, lon: f64) -> [f64; 3] {
        let e2 = self.e2();
        let nu = self.a / (1.0 - e2 * lat.sin().powi(2)).sqrt();
        [
            nu * lat.cos() * lon.cos(),
            nu * lat.cos() * lon.sin(),
            (1.0 - e2) * nu * lat.sin(),
        ]
    }

    /// Cartesian to geodetic latitude/longitude (radians).
    fn to_geodetic(self, [x, y, z]: [f64; 3]) -> (f64, f64) {
        let e2 = self.e2();
        let p = x.hypot(y);
        let mut lat = z.atan2(p * (1.0 - e2));
        let tolerance = 4.0 / self.a;
        for _ in 0..16 {
            let nu = self.a / (1.0 - e2 * lat.sin().powi(2)).sqrt();
            let next = (z + e2 * nu * lat.sin()).atan2(p);
            let done = (next - lat).abs() < tolerance;
            lat = next;
            if done {
                break;
            }
        }
        (lat, y.atan2(x))
    }
}

/// Seven-parameter Helmert transformation.
#[derive(Debug, Clone, Copy)]
struct Helmert {
    tx: f64,
    ty: f64,
    tz: f64,
    /// Scale in ppm
    s: f64,
    /// Rotations in arc seconds
    rx: f64,
    ry: f64,
    rz: f64,
}

impl Helmert {
    const OSGB36_TO_WGS84: Helmert = Helmert {
        tx: 446.448,
        ty: -125.157,
        tz: 542.060,
        s: -20.4894,
        rx: 0.1502,
        ry: 0.2470,
        rz: 0.8421,
    };

    fn inverse(self) -> Self {
        Helmert {
            tx: -self.tx,
            ty: -self.ty,
            tz: -self.tz,
            s: -self.s,
            rx: -self.rx,
            ry: -self.ry,
            rz: -self.rz,
        }
    }

    fn apply(self, [x, y, z]: [f64; 3]) -> [f64; 3] {
        let s1 = 1.0 + self.s * 1e-6;
        let rx = (self.rx / 3600.0).to_radians();
        let ry = (self.ry / 3600.0).to_radians();
        let rz = (self.rz / 3600.0).to_radians();
        [
            self.tx + x * s1 - y * rz + z * ry,
            self.ty + x * rz + y * s1 - z * rx,
            self.tz - x * ry + y * rx + z * s1,
        ]
    }
}

/// OSGB 1936 / British National Grid (EPSG:27700).
///
/// Transverse Mercator on the Airy 1830 ellipsoid, with a Helmert shift
/// between OSGB36 and WGS84. Accurate to a few metres.
#[derive(Debug, Clone, Copy, Default)]
pub struct BritishNationalGrid;

const BNG_F0: f64 = 0.999_601_271_7;
const BNG_LAT0: f64 = 49.0;
const BNG_LON0: f64 = -2.0;
const BNG_E0: f64 = 400_000.0;
const BNG_N0: f64 = -100_000.0;

impl BritishNationalGrid {
    /// Meridional arc from the true origin to `lat` (radians).
    fn meridional_arc(lat: f64) -> f64 {
        let Ellipsoid { a, b } = Ellipsoid::AIRY_1830;
        let n = (a - b) / (a + b);
        let (n2, n3) = (n * n, n * n * n);
        let lat0 = BNG_LAT0.to_radians();
        let (d, s) = (lat - lat0, lat + lat0);
        b * BNG_F0
            * ((1.0 + n + 1.25 * n2 + 1.25 * n3) * d
                - (3.0 * n + 3.0 * n2 + 21.0 / 8.0 * n3) * d.sin() * s.cos()
                + (15.0 / 8.0 * n2 + 15.0 / 8.0 * n3) * (2.0 * d).sin() * (2.0 * s).cos()
                - 35.0 / 24.0 * n3 * (3.0 * d).sin() * (3.0 * s).cos())
    }

    /// Radii of curvature `(nu, rho, eta2)` at `lat` (radians).
    fn curvature(lat: f64) -> (f64, f64, f64) {
        let ellipsoid = Ellipsoid::AIRY_1830;
        let e2 = ellipsoid.e2();
        let aa = ellipsoid.a * BNG_F0;
        let k = 1.0 - e2 * lat.sin().powi(2);
        let nu = aa / k.sqrt();
        let rho = aa * (1.0 - e2) / k.powf(1.5);
        (nu, rho, nu / rho - 1.0)
    }

    /// OSGB36 latitude/longitude (radians) to easting/northing.
    fn project(lat: f64, lon: f64) -> Coord<f64> {
        let (nu, rho, eta2) = Self::curvature(lat);
        let (sin, cos, tan) = (lat.sin(), lat.cos(), lat.tan());
        let tan2 = tan * tan;
        let tan4 = tan2 * tan2;

        let i = Self::meridional_arc(lat) + BNG_N0;
        let ii = nu / 2.0 * sin * cos;
        let iii = nu / 24.0 * sin * cos.powi(3) * (5.0 - tan2 + 9.0 * eta2);
        let iiia = nu / 720.0 * sin * cos.powi(5) * (61.0 - 58.0 * tan2 + tan4);
        let iv = nu * cos;
        let v = nu / 6.0 * cos.powi(3) * (nu / rho - tan2);
        let vi = nu / 120.0
            * cos.powi(5)
            * (5.0 - 18.0 * tan2 + tan4 + 14.0 * eta2 - 58.0 * tan2 * eta2);

        let dl = lon - BNG_LON0.to_radians();
        let northing = i + ii * dl.powi(2) + iii * dl.powi(4) + iiia * dl.powi(6);
        let easting = BNG_E0 + iv * dl + v * dl.powi(3) + vi * dl.powi(5);
        coord! { x: easting, y: northing }
    }

    /// Easting/northing to OSGB36 latitude/longitude (radians).
    fn unproject(c: Coord<f64>) -> (f64, f64) {
        let aa = Ellipsoid::AIRY_1830.a * BNG_F0;
        let mut lat = BNG_LAT0.to_radians();
        let mut m = 0.0;
        for _ in 0..32 {
            lat += (c.y - BNG_N0 - m) / aa;
            m = Self::meridional_arc(lat);
            if (c.y - BNG_N0 - m).abs() < 1e-5 {
                break;
            }
        }

        let (nu, rho, eta2) = Self::curvature(lat);
        let tan = lat.tan();
        let (tan2, tan4) = (tan * tan, tan.powi(4));
        let sec = 1.0 / lat.cos();

        let vii = tan / (2.0 * rho * nu);
        let viii = tan / (24.0 * rho * nu.powi(3)) * (5.0 + 3.0 * tan2 + eta2 - 9.0 * tan2 * eta2);
        let ix = tan / (720.0 * rho * nu.powi(5)) * (61.0 + 90.0 * tan2 + 45.0 * tan4);
        let x = sec / nu;
        let xi = sec / (6.0 * nu.powi(3)) * (nu / rho + 2.0 * tan2);
        let xii = sec / (120.0 * nu.powi(5)) * (5.0 + 28.0 * tan2 + 24.0 * tan4);
        let xiia = sec / (5040.0 * nu.powi(7))
            * (61.0 + 662.0 * tan2 + 1320.0 * tan4 + 720.0 * tan.powi(6));

        let de = c.x - BNG_E0;
        let lat = lat - vii * de.powi(2) + viii * de.powi(4) - ix * de.powi(6);
        let lon = BNG_LON0.to_radians() + x * de - xi * de.powi(3) + xii * de.powi(5)
            - xiia * de.powi(7);
        (lat, lon)
    }
}

impl CoordinateOperation for BritishNationalGrid {
    fn srid(&self) -> Srid {
        BRITISH_NATIONAL_GRID
    }

    fn to_canonical(&self, c: Coord<f64>) -> Coord<f64> {
        let (lat, lon) = Self::unproject(c);
        let cartesian = Ellipsoid::AIRY_1830.to_cartesian(lat, lon);
        let shifted = Helmert::OSGB36_TO_WGS84.apply(cartesian);
        let (lat, lon) = Ellipsoid::GRS80.to_geodetic(shifted);
        coord! { x: lon.to_degrees(), y: lat.to_degrees() }
    }

    fn from_canonical(&self, c: Coord<f64>) -> Coord<f64> {
        let cartesian = Ellipsoid::GRS80.to_cartesian(c.y.to_radians(), c.x.to_radians());
        let shifted = Helmert::OSGB36_TO_WGS84.inverse().apply(cartesian);
        let (lat, lon) = Ellipsoid::AIRY_1830.to_geodetic(shifted);
        Self::project(lat, lon)
    }
}

/// SRID-keyed lookup of coordinate operations.
#[derive(Debug, Clone)]
pub struct CoordinateOperations {
    operations: HashMap<Srid, Arc<dyn CoordinateOperation>>,
}

impl Default for CoordinateOperations {
    fn default() -> Self {
        Self::empty()
            .with_operation(Arc::new(WebMercator))
            .with_operation(Arc::new(BritishNationalGrid))
    }
}

impl CoordinateOperations {
    /// A lookup with no operations registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            operations: HashMap::new(),
        }
    }

    /// Register an operation under its SRID.
    #[must_use]
    pub fn with_operation(mut self, operation: Arc<dyn CoordinateOperation>) -> Self {
        self.operations.insert(operation.srid(), operation);
        self
    }

    /// SRIDs with a registered operation, sorted.
    #[must_use]
    pub fn srids(&self) -> Vec<Srid> {
        let mut srids: Vec<Srid> = self.operations.keys().copied().collect();
        srids.sort_unstable();
        srids
    }

    /// The operation for `srid`.
    ///
    /// Returns `Ok(None)` when no conversion is needed: absent, unknown and
    /// canonical SRIDs.
    ///
    /// # Errors
    ///
    /// Returns [`CrsError::UnknownSrid`] when no operation is registered.
    pub fn lookup(&self, srid: Option<Srid>) -> Result<Option<&dyn CoordinateOperation>, CrsError> {
        match srid {
            None | Some(UNKNOWN_SRID | WGS84) => Ok(None),
            Some(srid) => self
                .operations
                .get(&srid)
                .map(|op| Some(op.as_ref()))
                .ok_or(CrsError::UnknownSrid { srid }),
        }
    }

    /// Reproject `value` from `srid` into EPSG:4326.
    ///
    /// # Errors
    ///
    /// Returns [`CrsError::UnknownSrid`] when no operation is registered.
    pub fn to_canonical(&self, value: &mut GeometryValue, srid: Option<Srid>) -> Result<(), CrsError> {
        if let Some(op) = self.lookup(srid)? {
            debug!("Reprojecting geometry from EPSG:{} to EPSG:{WGS84}", op.srid());
            transform(value, |c| op.to_canonical(c));
            value.srid = Some(WGS84);
        }
        Ok(())
    }

    /// Reproject `value` from EPSG:4326 into `srid`.
    ///
    /// # Errors
    ///
    /// Returns [`CrsError::UnknownSrid`] when no operation is registered.
    pub fn from_canonical(
        &self,
        value: &mut GeometryValue,
        srid: Option<Srid>,
    ) -> Result<(), CrsError> {
        if let Some(op) = self.lookup(srid)? {
            debug!("Reprojecting geometry from EPSG:{WGS84} to EPSG:{}", op.srid());
            transform(value, |c| op.from_canonical(c));
            value.srid = Some(op.srid());
        }
        Ok(())
    }
}

fn transform(value: &mut GeometryValue, f: impl Fn(Coord<f64>) -> Coord<f64> + Copy) {
    match value.geometry_mut() {
        GeometryMut::Geometry(g) => g.map_coords_in_place(f),
        GeometryMut::Ring(r) => r.map_coords_in_place(f),
    }
}
