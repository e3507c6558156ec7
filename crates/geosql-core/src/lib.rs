//! `geosql-core` is a spatial SQL dialect adapter.
//!
//! It maps a vector feature model (typed attributes, geometries, reference
//! systems, spatial predicates) onto the SQL of a database with no native
//! notion of either, and rebuilds that model from the database catalog.
//!
//! This crate includes:
//! - **Codec**: WKB/WKT conversion and envelope extraction.
//! - **CRS support**: SRID tags, clamp policies and reprojection to and from
//!   EPSG:4326.
//! - **Type registry**: bindings between catalog type codes/names and
//!   attribute types.
//! - **Introspection**: feature types built from the metadata catalog.
//! - **Filter translation**: predicate trees rendered as SQL.
//! - **Statement generation**: CREATE, DROP, INSERT, SELECT and index DDL.
//! - **Store**: the composition of all of the above over a host database.
//!
//! The OrientDB dialect is the one shipped; the `drivers` module lists it
//! with the backends that are planned.

pub mod codec;
pub mod config;
pub mod crs;
pub mod dialect;
pub mod drivers;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod introspect;
pub mod reader;
pub mod registry;
pub mod sql;
pub mod store;
pub mod translate;
pub mod types;
pub mod utils;

pub use config::StoreConfig;
pub use error::{GeoSqlError, Result};
pub use store::{DataStoreHost, SpatialStore};
