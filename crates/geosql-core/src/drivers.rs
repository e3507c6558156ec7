//! Dialect driver registry.
//!
//! A static list of the SQL backends the adapter ships a dialect for, and
//! what it can do with each: introspect the catalog, translate and read
//! queries, and write schemas and features.
//!
//! # Examples
//!
//! ```
//! use geosql_core::drivers::{find_driver, get_available_drivers};
//!
//! let orientdb = find_driver("orientdb").expect("OrientDB driver should exist");
//! assert!(orientdb.capabilities.read.is_supported());
//!
//! for driver in get_available_drivers() {
//!     println!("{}: {}", driver.short_name, driver.long_name);
//! }
//! ```

use std::sync::Arc;

pub use geosql_common::{Driver, DriverCapabilities, SupportStatus};

use crate::dialect::{OrientDbDialect, SqlDialect};

/// Returns every driver in the registry, regardless of support status.
#[must_use]
pub fn get_drivers() -> Vec<Driver> {
    use SupportStatus::Supported;

    vec![Driver::new(
        "OrientDB",
        "OrientDB multi-model database (spatial module)",
        "orient",
        Supported,
        Supported,
        Supported,
    )]
}

/// Returns the drivers with at least one fully supported operation.
#[must_use]
pub fn get_available_drivers() -> Vec<Driver> {
    get_drivers()
        .into_iter()
        .filter(|d| d.capabilities.has_supported_operation())
        .collect()
}

/// Finds a driver by short name or database id (case-insensitive).
///
/// ```
/// use geosql_core::drivers::find_driver;
///
/// assert_eq!(find_driver("orient").map(|d| d.short_name), Some("OrientDB"));
/// assert!(find_driver("InvalidDriver").is_none());
/// ```
#[must_use]
pub fn find_driver(name: &str) -> Option<Driver> {
    get_drivers().into_iter().find(|d| {
        d.short_name.eq_ignore_ascii_case(name) || d.database_id.eq_ignore_ascii_case(name)
    })
}

/// Returns all driver short names, sorted.
#[must_use]
pub fn get_driver_names() -> Vec<&'static str> {
    let mut names: Vec<_> = get_drivers().iter().map(|d| d.short_name).collect();
    names.sort_unstable();
    names
}

/// The dialect implementing a driver, if the adapter ships one.
#[must_use]
pub fn dialect_for(name: &str) -> Option<Arc<dyn SqlDialect>> {
    match find_driver(name)?.short_name {
        "OrientDB" => Some(Arc::new(OrientDbDialect::new())),
        _ => None,
    }
}
