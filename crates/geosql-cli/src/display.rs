//! Display utilities for formatting CLI output.
//!
//! Table row structures and formatting functions for presenting the driver
//! registry and dialect capabilities in a human-readable format.

use tabled::{Table, Tabled};

use geosql_core::drivers::Driver;
use geosql_core::filter::FilterKind;

/// Table row representation for displaying driver information.
#[derive(Tabled)]
pub struct DriverRow {
    /// Short identifier for the driver (e.g., `OrientDB`).
    #[tabled(rename = "Short Name")]
    pub short_name: String,
    /// Full descriptive name of the backend.
    #[tabled(rename = "Long Name")]
    pub long_name: String,
    /// Identifier used in connection URLs.
    #[tabled(rename = "Database")]
    pub database_id: String,
    /// Support status for catalog introspection.
    #[tabled(rename = "Introspect")]
    pub introspect: String,
    /// Support status for query translation and reading.
    #[tabled(rename = "Read")]
    pub read: String,
    /// Support status for schema creation and inserts.
    #[tabled(rename = "Write")]
    pub write: String,
}

impl From<&Driver> for DriverRow {
    fn from(d: &Driver) -> Self {
        Self {
            short_name: d.short_name.to_string(),
            long_name: d.long_name.to_string(),
            database_id: d.database_id.to_string(),
            introspect: d.capabilities.introspect.as_str().to_string(),
            read: d.capabilities.read.as_str().to_string(),
            write: d.capabilities.write.as_str().to_string(),
        }
    }
}

/// Table row representation for a filter operator.
#[derive(Tabled)]
pub struct CapabilityRow {
    /// Operator name.
    #[tabled(rename = "Operator")]
    pub operator: String,
    /// `Spatial` or `Scalar`.
    #[tabled(rename = "Kind")]
    pub kind: String,
}

/// Render drivers as a table.
pub fn drivers_table(drivers: &[Driver]) -> String {
    let rows: Vec<DriverRow> = drivers.iter().map(DriverRow::from).collect();
    Table::new(rows).to_string()
}

/// Display a formatted table of drivers on standard output.
pub fn display_drivers(drivers: &[Driver]) {
    println!("\nDrivers ({} total):\n", drivers.len());
    println!("{}", drivers_table(drivers));
}

/// Render filter kinds as a table, spatial operators last.
pub fn capabilities_table(kinds: &[FilterKind]) -> String {
    let mut rows: Vec<(bool, CapabilityRow)> = kinds
        .iter()
        .map(|k| {
            let spatial = k.is_spatial();
            (
                spatial,
                CapabilityRow {
                    operator: k.as_str().to_string(),
                    kind: if spatial { "Spatial" } else { "Scalar" }.to_string(),
                },
            )
        })
        .collect();
    rows.sort_by_key(|(spatial, _)| *spatial);
    Table::new(rows.into_iter().map(|(_, row)| row)).to_string()
}

/// Display the filter capabilities of a dialect on standard output.
pub fn display_capabilities(dialect: &str, kinds: &[FilterKind]) {
    println!("\nFilter capabilities of {dialect} ({} operators):\n", kinds.len());
    println!("{}", capabilities_table(kinds));
}
