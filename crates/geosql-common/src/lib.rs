//! Common types and traits shared across `GeoSQL` crates.
//!
//! This crate holds the boundary between the dialect adapter and the host data
//! store: the connection and catalog surface the adapter consumes, the raw SQL
//! values it reads back, and the driver capability types used by the dialect
//! registry. Keeping them here lets hosts implement the traits without
//! depending on `geosql-core`.

pub mod catalog;
pub mod connection;
pub mod drivers;

// Re-export commonly used types
pub use catalog::{CatalogColumn, Row, SqlError, SqlResult, SqlValue};
pub use connection::{Connection, ConnectionLease, ConnectionSource, close_quietly};
pub use drivers::{Driver, DriverCapabilities, SupportStatus};
