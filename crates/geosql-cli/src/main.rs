//! Command-line interface for `GeoSQL`, a spatial SQL dialect adapter.
//!
//! This binary exposes the offline parts of the [`geosql_core`] library:
//! the driver registry, the filter capabilities of each dialect, the WKB
//! codec with reprojection, and the translation of spatial predicates and
//! paging clauses into dialect SQL. Nothing here opens a database
//! connection.
//!
//! # Available Commands
//!
//! - `drivers` - List the SQL backends and what the adapter can do with them
//! - `capabilities` - List the filter operators a dialect can translate
//! - `decode` - Decode a WKB payload to WKT, optionally into a native SRID
//! - `envelope` - Print the bounding rectangle of a WKB payload
//! - `translate` - Render a spatial predicate as a SQL `WHERE` clause
//! - `limit` - Apply a dialect's paging clause to a statement

mod display;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use geo_types::{Rect, coord};
use tracing::{Level, debug, info};
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

use geosql_core::codec;
use geosql_core::crs::{ClampPolicy, CoordinateOperations};
use geosql_core::dialect::SqlDialect;
use geosql_core::drivers::{self, get_available_drivers};
use geosql_core::filter::{Filter, SpatialOp};
use geosql_core::geometry::GeometryValue;
use geosql_core::translate::FilterToSql;
use geosql_core::types::Srid;

use crate::display::{display_capabilities, display_drivers};

#[derive(Parser)]
#[command(
    name = "geosql",
    version,
    about = "Spatial SQL dialect adapter",
    long_about = "GeoSQL maps vector features, geometries and spatial predicates onto the SQL of \
                  databases without native spatial types.\n\
                  These commands exercise the codec and translator offline."
)]
/// Command-line arguments and options for the `GeoSQL` CLI.
struct Cli {
    /// Enable verbose (INFO level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug (DEBUG level) logging output with detailed diagnostics.
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where a WKB payload comes from.
#[derive(clap::Args, Debug)]
#[group(required = true, multiple = false)]
struct WkbInput {
    /// WKB payload as a hex string.
    #[arg(long, value_name = "HEX")]
    hex: Option<String>,

    /// File holding a raw WKB payload.
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,
}

/// Spatial operators accepted by `translate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OperatorArg {
    Bbox,
    Beyond,
    Contains,
    Crosses,
    Dwithin,
    Disjoint,
    Equals,
    Intersects,
    Overlaps,
    Touches,
    Within,
}

/// Available subcommands for the `GeoSQL` CLI.
#[derive(Subcommand)]
enum Commands {
    /// Lists the SQL backends and their capabilities.
    Drivers,

    /// Lists the filter operators a dialect can translate.
    Capabilities {
        /// Driver short name or database id.
        #[arg(long, default_value = "OrientDB", value_name = "DRIVER")]
        driver: String,
    },

    /// Decodes a WKB payload to WKT.
    ///
    /// Stored geometries are in EPSG:4326; `--srid` reprojects the decoded
    /// value into a native reference system the way features are read.
    Decode {
        #[command(flatten)]
        input: WkbInput,

        /// Native SRID to reproject into.
        #[arg(long, value_name = "SRID")]
        srid: Option<Srid>,
    },

    /// Prints the bounding rectangle of a WKB payload.
    Envelope {
        #[command(flatten)]
        input: WkbInput,
    },

    /// Renders a spatial predicate against a geometry property.
    Translate {
        /// Geometry property name.
        #[arg(long, default_value = "geom", value_name = "NAME")]
        property: String,

        /// Spatial operator.
        #[arg(long, value_enum)]
        op: OperatorArg,

        /// Literal geometry as WKT. Not used with `bbox`.
        #[arg(long, value_name = "WKT", required_unless_present = "bounds")]
        wkt: Option<String>,

        /// Box as `minx,miny,maxx,maxy` for the `bbox` operator.
        #[arg(long, value_name = "BOX", value_delimiter = ',', allow_hyphen_values = true)]
        bounds: Option<Vec<f64>>,

        /// SRID of the literal coordinates.
        #[arg(long, value_name = "SRID")]
        srid: Option<Srid>,

        /// Distance for `dwithin` and `beyond`.
        #[arg(long)]
        distance: Option<f64>,

        /// Driver short name or database id.
        #[arg(long, default_value = "OrientDB", value_name = "DRIVER")]
        driver: String,
    },

    /// Applies a dialect's paging clause to a statement.
    Limit {
        /// Maximum number of rows.
        #[arg(long)]
        limit: u64,

        /// Rows to skip.
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Statement to page.
        #[arg(long, default_value = "SELECT * FROM features", value_name = "SQL")]
        sql: String,

        /// Driver short name or database id.
        #[arg(long, default_value = "OrientDB", value_name = "DRIVER")]
        driver: String,
    },
}

/// Entry point for the `GeoSQL` command-line interface.
///
/// # Errors
///
/// Returns an error if command execution fails or if the logging system cannot be initialized.
fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    // Bridge logs from the `log` crate to the `tracing` ecosystem.
    LogTracer::init()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Drivers => handle_drivers(),
        Commands::Capabilities { driver } => handle_capabilities(&driver),
        Commands::Decode { input, srid } => {
            let wkt = handle_decode(&read_wkb(&input)?, srid)?;
            println!("{wkt}");
            Ok(())
        },
        Commands::Envelope { input } => {
            println!("{}", handle_envelope(&read_wkb(&input)?)?);
            Ok(())
        },
        Commands::Translate {
            property,
            op,
            wkt,
            bounds,
            srid,
            distance,
            driver,
        } => {
            let filter = build_filter(&property, op, wkt.as_deref(), bounds.as_deref(), srid, distance)?;
            println!("{}", handle_translate(&driver, &filter)?);
            Ok(())
        },
        Commands::Limit {
            limit,
            offset,
            sql,
            driver,
        } => {
            println!("{}", handle_limit(&driver, &sql, limit, offset)?);
            Ok(())
        },
    }
}

fn dialect(driver_name: &str) -> Result<std::sync::Arc<dyn SqlDialect>> {
    let driver = drivers::find_driver(driver_name)
        .ok_or_else(|| anyhow!("Driver '{driver_name}' not found."))?;
    drivers::dialect_for(driver.short_name)
        .ok_or_else(|| anyhow!("Driver '{}' has no SQL dialect yet.", driver.short_name))
}

fn read_wkb(input: &WkbInput) -> Result<Vec<u8>> {
    match (&input.hex, &input.file) {
        (Some(hex), _) => {
            hex::decode(hex.trim()).with_context(|| "WKB payload is not valid hex".to_string())
        },
        (None, Some(path)) => {
            info!("Reading WKB from {}", path.display());
            fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
        },
        (None, None) => bail!("Either --hex or --file is required."),
    }
}

#[allow(clippy::unnecessary_wraps)]
fn handle_drivers() -> Result<()> {
    let drivers = get_available_drivers();
    display_drivers(&drivers);
    Ok(())
}

fn handle_capabilities(driver_name: &str) -> Result<()> {
    let dialect = dialect(driver_name)?;
    let kinds: Vec<_> = dialect.filter_capabilities().kinds().collect();
    display_capabilities(dialect.name(), &kinds);
    Ok(())
}

fn handle_decode(bytes: &[u8], srid: Option<Srid>) -> Result<String> {
    let mut value = GeometryValue::new(codec::decode_wkb(bytes)?);
    CoordinateOperations::default().from_canonical(&mut value, srid)?;
    debug!("Decoded {:?} geometry", value.kind());
    Ok(codec::encode_wkt(&value)?)
}

fn handle_envelope(bytes: &[u8]) -> Result<String> {
    Ok(match codec::decode_envelope(bytes)? {
        Some(rect) => format!(
            "{} {} {} {}",
            rect.min().x,
            rect.min().y,
            rect.max().x,
            rect.max().y
        ),
        None => "EMPTY".to_string(),
    })
}

fn build_filter(
    property: &str,
    op: OperatorArg,
    wkt: Option<&str>,
    bounds: Option<&[f64]>,
    srid: Option<Srid>,
    distance: Option<f64>,
) -> Result<Filter> {
    if op == OperatorArg::Bbox {
        let Some(&[min_x, min_y, max_x, max_y]) = bounds else {
            bail!("The bbox operator needs --bounds minx,miny,maxx,maxy.");
        };
        let rect = Rect::new(coord! { x: min_x, y: min_y }, coord! { x: max_x, y: max_y });
        return Ok(Filter::bbox(property, rect, srid));
    }

    let wkt = wkt.ok_or_else(|| anyhow!("The {op:?} operator needs --wkt."))?;
    let mut literal = GeometryValue::new(codec::decode_wkt(wkt)?);
    literal.srid = srid;

    let distance = || distance.ok_or_else(|| anyhow!("The {op:?} operator needs --distance."));
    let op = match op {
        OperatorArg::Bbox => SpatialOp::BBox,
        OperatorArg::Beyond => SpatialOp::Beyond {
            distance: distance()?,
        },
        OperatorArg::Contains => SpatialOp::Contains,
        OperatorArg::Crosses => SpatialOp::Crosses,
        OperatorArg::Dwithin => SpatialOp::DWithin {
            distance: distance()?,
        },
        OperatorArg::Disjoint => SpatialOp::Disjoint,
        OperatorArg::Equals => SpatialOp::Equals,
        OperatorArg::Intersects => SpatialOp::Intersects,
        OperatorArg::Overlaps => SpatialOp::Overlaps,
        OperatorArg::Touches => SpatialOp::Touches,
        OperatorArg::Within => SpatialOp::Within,
    };
    Ok(Filter::spatial(op, property, literal))
}

fn handle_translate(driver_name: &str, filter: &Filter) -> Result<String> {
    let dialect = dialect(driver_name)?;
    let operations = CoordinateOperations::default();
    let clamp = ClampPolicy::default();
    let translator = FilterToSql::new(dialect.as_ref(), &operations, &clamp);
    Ok(translator.encode_where(filter)?.trim_start().to_string())
}

fn handle_limit(driver_name: &str, sql: &str, limit: u64, offset: u64) -> Result<String> {
    let dialect = dialect(driver_name)?;
    let mut sql = sql.to_string();
    dialect.apply_limit_offset(&mut sql, limit, offset);
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    // POINT(1 2), little endian
    const POINT_WKB: &str = "0101000000000000000000f03f0000000000000040";

    #[test]
    fn test_handle_drivers() -> Result<()> {
        handle_drivers()
    }

    #[test]
    fn test_unknown_driver() {
        let result = handle_capabilities("NonExistentDriver");
        assert_eq!(
            result.unwrap_err().to_string(),
            "Driver 'NonExistentDriver' not found."
        );
    }

    #[test]
    fn test_handle_decode() -> Result<()> {
        let wkt = handle_decode(&hex::decode(POINT_WKB)?, None)?;
        assert!(wkt.starts_with("POINT"));
        assert!(wkt.contains('1') && wkt.contains('2'));
        Ok(())
    }

    #[test]
    fn test_handle_decode_unknown_srid() -> Result<()> {
        let result = handle_decode(&hex::decode(POINT_WKB)?, Some(2154));
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_handle_envelope() -> Result<()> {
        assert_eq!(handle_envelope(&hex::decode(POINT_WKB)?)?, "1 2 1 2");
        Ok(())
    }

    #[test]
    fn test_handle_envelope_malformed() {
        assert!(handle_envelope(&[0x01, 0x02]).is_err());
    }

    #[test]
    fn test_translate_intersects() -> Result<()> {
        let filter = build_filter("geom", OperatorArg::Intersects, Some("POINT(1 2)"), None, None, None)?;
        let sql = handle_translate("OrientDB", &filter)?;
        assert!(sql.starts_with("WHERE ST_Intersects(geom, ST_GeomFromText('POINT"));
        assert!(sql.ends_with(") = true"));
        Ok(())
    }

    #[test]
    fn test_translate_dwithin_requires_distance() {
        let result = build_filter("geom", OperatorArg::Dwithin, Some("POINT(1 2)"), None, None, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_translate_dwithin() -> Result<()> {
        let filter = build_filter(
            "geom",
            OperatorArg::Dwithin,
            Some("POINT(1 2)"),
            None,
            None,
            Some(5.0),
        )?;
        let sql = handle_translate("orient", &filter)?;
        assert!(sql.starts_with("WHERE ST_Distance(geom, "));
        assert!(sql.ends_with(")<5"));
        Ok(())
    }

    #[test]
    fn test_translate_bbox() -> Result<()> {
        let filter = build_filter("geom", OperatorArg::Bbox, None, Some(&[0.0, 0.0, 1.0, 1.0]), None, None)?;
        let sql = handle_translate("OrientDB", &filter)?;
        assert!(sql.starts_with("WHERE ST_Intersects(geom,ST_GeomFromText('POLYGON"));
        Ok(())
    }

    #[test]
    fn test_translate_touches_is_unsupported() -> Result<()> {
        let filter = build_filter("geom", OperatorArg::Touches, Some("POINT(1 2)"), None, None, None)?;
        assert!(handle_translate("OrientDB", &filter).is_err());
        Ok(())
    }

    #[test]
    fn test_handle_limit() -> Result<()> {
        assert_eq!(
            handle_limit("OrientDB", "SELECT * FROM roads", 10, 0)?,
            "SELECT * FROM roads LIMIT 10"
        );
        assert_eq!(
            handle_limit("OrientDB", "SELECT * FROM roads", 10, 20)?,
            "SELECT * FROM roads SKIP 20 LIMIT 10"
        );
        Ok(())
    }
}
