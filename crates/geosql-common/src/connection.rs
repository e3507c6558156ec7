//! Connection traits for talking to the host database.
//!
//! This module defines the seams the host data store implements: a blocking
//! [`Connection`] exposing statement execution and the metadata catalog, and a
//! [`ConnectionSource`] that lends connections out. Borrowed connections are
//! wrapped in a [`ConnectionLease`] which hands them back on every exit path.

use std::ops::{Deref, DerefMut};

use log::{debug, warn};

use crate::catalog::{CatalogColumn, Row, SqlResult};

/// A blocking connection to the host database.
///
/// Result cursors are materialized into [`Row`] vectors, so a cursor never
/// outlives the call that produced it.
pub trait Connection: Send {
    /// Execute a statement that returns no rows.
    fn execute(&mut self, sql: &str) -> SqlResult<()>;

    /// Execute a query and collect its rows.
    fn query(&mut self, sql: &str) -> SqlResult<Vec<Row>>;

    /// List the columns of the tables matching `table_pattern`.
    ///
    /// # Arguments
    ///
    /// * `schema` - Schema pattern, `None` for the default schema
    /// * `table_pattern` - Escaped table name pattern
    fn columns(&mut self, schema: Option<&str>, table_pattern: &str)
    -> SqlResult<Vec<CatalogColumn>>;

    /// List table names matching `table_pattern` whose type is one of `types`.
    fn tables(
        &mut self,
        schema: Option<&str>,
        table_pattern: &str,
        types: &[&str],
    ) -> SqlResult<Vec<String>>;

    /// Whether statements commit automatically.
    fn auto_commit(&self) -> bool {
        true
    }

    /// Commit the current transaction.
    fn commit(&mut self) -> SqlResult<()> {
        Ok(())
    }

    /// Close the connection.
    fn close(&mut self) -> SqlResult<()> {
        Ok(())
    }
}

/// Lends connections to the adapter.
///
/// Pooling and transaction state belong to the implementor; the adapter only
/// borrows one connection per unit of work and always gives it back.
pub trait ConnectionSource: Send + Sync {
    /// Borrow a connection.
    fn get_connection(&self) -> SqlResult<Box<dyn Connection>>;

    /// Return a borrowed connection.
    fn release_connection(&self, cx: Box<dyn Connection>);

    /// Escape `%` and `_` so `name` matches literally in a catalog pattern.
    fn escape_name_pattern(&self, name: &str) -> String {
        let mut escaped = String::with_capacity(name.len());
        for ch in name.chars() {
            if matches!(ch, '%' | '_' | '\\') {
                escaped.push('\\');
            }
            escaped.push(ch);
        }
        escaped
    }
}

/// A connection borrowed from a [`ConnectionSource`].
///
/// The connection is released when the lease is dropped, so early returns
/// and `?` propagation never leak it.
pub struct ConnectionLease<'a, S: ConnectionSource + ?Sized> {
    source: &'a S,
    cx: Option<Box<dyn Connection>>,
}

impl<'a, S: ConnectionSource + ?Sized> ConnectionLease<'a, S> {
    /// Borrow a connection from `source`.
    ///
    /// # Errors
    ///
    /// Returns the source's error if no connection can be obtained.
    pub fn acquire(source: &'a S) -> SqlResult<Self> {
        let cx = source.get_connection()?;
        debug!("Connection borrowed");
        Ok(Self {
            source,
            cx: Some(cx),
        })
    }

    /// Take the connection out of the lease without releasing it.
    ///
    /// Used by operations that must close the connection themselves.
    #[must_use]
    pub fn detach(mut self) -> Box<dyn Connection> {
        match self.cx.take() {
            Some(cx) => cx,
            None => unreachable!("connection lease already released"),
        }
    }
}

impl<S: ConnectionSource + ?Sized> Deref for ConnectionLease<'_, S> {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        match self.cx.as_deref() {
            Some(cx) => cx,
            None => unreachable!("connection lease already released"),
        }
    }
}

impl<S: ConnectionSource + ?Sized> DerefMut for ConnectionLease<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.cx.as_deref_mut() {
            Some(cx) => cx,
            None => unreachable!("connection lease already released"),
        }
    }
}

impl<S: ConnectionSource + ?Sized> Drop for ConnectionLease<'_, S> {
    fn drop(&mut self) {
        if let Some(cx) = self.cx.take() {
            self.source.release_connection(cx);
            debug!("Connection released");
        }
    }
}

/// Close a connection, logging instead of propagating a close failure.
pub fn close_quietly(cx: &mut dyn Connection) {
    if let Err(err) = cx.close() {
        warn!("Failed to close connection: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct NullConnection;

    impl Connection for NullConnection {
        fn execute(&mut self, _sql: &str) -> SqlResult<()> {
            Ok(())
        }
        fn query(&mut self, _sql: &str) -> SqlResult<Vec<Row>> {
            Ok(Vec::new())
        }
        fn columns(&mut self, _: Option<&str>, _: &str) -> SqlResult<Vec<CatalogColumn>> {
            Ok(Vec::new())
        }
        fn tables(&mut self, _: Option<&str>, _: &str, _: &[&str]) -> SqlResult<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct CountingSource {
        borrowed: Mutex<usize>,
        released: Mutex<usize>,
    }

    impl ConnectionSource for CountingSource {
        fn get_connection(&self) -> SqlResult<Box<dyn Connection>> {
            *self.borrowed.lock().unwrap() += 1;
            Ok(Box::new(NullConnection))
        }
        fn release_connection(&self, _cx: Box<dyn Connection>) {
            *self.released.lock().unwrap() += 1;
        }
    }

    fn failing_unit_of_work(source: &CountingSource) -> SqlResult<()> {
        let mut cx = ConnectionLease::acquire(source)?;
        cx.execute("SELECT 1")?;
        Err(crate::SqlError::Connection("boom".into()))
    }

    #[test]
    fn lease_releases_on_error_path() {
        let source = CountingSource::default();
        assert!(failing_unit_of_work(&source).is_err());
        assert_eq!(*source.borrowed.lock().unwrap(), 1);
        assert_eq!(*source.released.lock().unwrap(), 1);
    }

    #[test]
    fn detached_connection_is_not_released() {
        let source = CountingSource::default();
        let lease = ConnectionLease::acquire(&source).unwrap();
        let _cx = lease.detach();
        assert_eq!(*source.released.lock().unwrap(), 0);
    }

    #[test]
    fn escape_name_pattern_escapes_wildcards() {
        let source = CountingSource::default();
        assert_eq!(source.escape_name_pattern("geometry_columns"), "geometry\\_columns");
        assert_eq!(source.escape_name_pattern("a%b"), "a\\%b");
    }
}
