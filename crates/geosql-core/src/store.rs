//! The spatial data store.
//!
//! [`SpatialStore`] composes the host collaborator, the store configuration,
//! the dialect and the type registry. Every public operation borrows one
//! connection through a [`ConnectionLease`] and gives it back on every exit
//! path.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use geo::{BoundingRect, Rect};
use geo_types::coord;
use geosql_common::{CatalogColumn, Connection, ConnectionLease, ConnectionSource, SqlResult};
use log::{debug, info};

use crate::codec;
use crate::config::StoreConfig;
use crate::crs::CoordinateOperations;
use crate::dialect::{DialectContext, OrientDbDialect, SqlDialect};
use crate::error::{Result, SqlErrorExt};
use crate::filter::Filter;
use crate::geometry::{GeometryValue, Shape};
use crate::introspect::Introspector;
use crate::reader::FeatureReader;
use crate::registry::TypeRegistry;
use crate::sql::{self, KeysFetcher, Query, RELATIONSHIP_TABLE};
use crate::translate::FilterToSql;
use crate::types::{ContentEntry, Feature, FeatureType, PrimaryKey, VirtualTable};

/// The host data store the adapter plugs into.
///
/// Besides lending connections, the host knows the primary keys of its tables
/// and the virtual tables (named queries) it publishes.
pub trait DataStoreHost: ConnectionSource {
    /// Primary key of `table`, [`PrimaryKey::Null`] when it has none.
    ///
    /// # Errors
    ///
    /// Returns the connection's error if the catalog lookup fails.
    fn primary_key(
        &self,
        cx: &mut dyn Connection,
        schema: Option<&str>,
        table: &str,
    ) -> SqlResult<PrimaryKey>;

    /// Virtual tables published next to the physical ones.
    fn virtual_tables(&self) -> &[VirtualTable] {
        &[]
    }

    /// Columns produced by the query of a virtual table.
    ///
    /// # Errors
    ///
    /// Returns the connection's error if the query cannot be described.
    fn virtual_table_columns(
        &self,
        cx: &mut dyn Connection,
        table: &VirtualTable,
    ) -> SqlResult<Vec<CatalogColumn>> {
        let _ = (cx, table);
        Ok(Vec::new())
    }
}

/// A spatial data store backed by a SQL database.
pub struct SpatialStore<H: DataStoreHost> {
    host: H,
    config: StoreConfig,
    dialect: Arc<dyn SqlDialect>,
    registry: Arc<TypeRegistry>,
    operations: Arc<CoordinateOperations>,
    entries: Mutex<HashMap<String, Arc<ContentEntry>>>,
}

impl<H: DataStoreHost> std::fmt::Debug for SpatialStore<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialStore")
            .field("config", &self.config)
            .field("dialect", &self.dialect.name())
            .finish_non_exhaustive()
    }
}

impl<H: DataStoreHost> SpatialStore<H> {
    /// Create a store over `host` using the OrientDB dialect.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ConfigError`] if `config` is invalid.
    pub fn new(host: H, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let dialect: Arc<dyn SqlDialect> = Arc::new(OrientDbDialect::new());
        let registry = Arc::new(TypeRegistry::new(dialect.as_ref()));
        Ok(Self {
            host,
            config,
            dialect,
            registry,
            operations: Arc::new(CoordinateOperations::default()),
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Use another dialect. The type registry is rebuilt for it.
    #[must_use]
    pub fn with_dialect(mut self, dialect: Arc<dyn SqlDialect>) -> Self {
        self.registry = Arc::new(TypeRegistry::new(dialect.as_ref()));
        self.dialect = dialect;
        self.entries_mut().clear();
        self
    }

    /// Use another set of coordinate operations.
    #[must_use]
    pub fn with_operations(mut self, operations: CoordinateOperations) -> Self {
        self.operations = Arc::new(operations);
        self
    }

    /// The host collaborator.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The dialect.
    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    /// The type registry.
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    fn entries_mut(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<ContentEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schema(&self) -> Option<&str> {
        self.config.schema.as_deref()
    }

    /// Names of the published feature types: the catalog tables the dialect
    /// includes, then the virtual tables.
    ///
    /// # Errors
    ///
    /// Returns a catalog error if the tables cannot be listed.
    pub fn type_names(&self) -> Result<Vec<String>> {
        let mut cx = ConnectionLease::acquire(&self.host)
            .with_catalog_context("borrowing a connection to list tables")?;
        let tables = cx
            .tables(self.schema(), "%", &["TABLE", "VIEW"])
            .with_catalog_context("listing tables")?;
        let mut names: Vec<String> = tables
            .into_iter()
            .filter(|t| self.dialect.include_table(self.schema(), t))
            .filter(|t| !t.eq_ignore_ascii_case(RELATIONSHIP_TABLE))
            .collect();
        names.extend(self.host.virtual_tables().iter().map(|vt| vt.name.clone()));
        Ok(names)
    }

    /// The content entry of a type, created on first use.
    pub fn entry(&self, type_name: &str) -> Arc<ContentEntry> {
        self.entries_mut()
            .entry(type_name.to_string())
            .or_insert_with(|| {
                Arc::new(ContentEntry::new(type_name, self.config.schema.clone()))
            })
            .clone()
    }

    /// The feature type of `type_name`, built on first access and cached on
    /// its entry until invalidated.
    ///
    /// # Errors
    ///
    /// Returns a catalog error if introspection fails.
    pub fn feature_type(&self, type_name: &str) -> Result<Arc<FeatureType>> {
        let entry = self.entry(type_name);
        if let Some(cached) = entry.cached() {
            return Ok(cached);
        }
        let built = Arc::new(
            Introspector::new(&self.host, self.dialect(), &self.registry, &self.config)
                .build_feature_type(&entry)?,
        );
        entry.store(Arc::clone(&built));
        Ok(built)
    }

    /// A filter translator bound to `feature_type`.
    pub fn translator<'a>(&'a self, feature_type: &'a FeatureType) -> FilterToSql<'a> {
        FilterToSql::new(self.dialect(), &self.operations, &self.config.clamp)
            .with_feature_type(feature_type)
    }

    /// Create the class of `feature_type` and run the dialect's post-create
    /// side effects.
    ///
    /// # Errors
    ///
    /// Returns a catalog error if a statement fails.
    pub fn create_schema(&self, feature_type: &FeatureType) -> Result<()> {
        let mut cx = ConnectionLease::acquire(&self.host)
            .with_catalog_context("borrowing a connection to create a schema")?;
        let sql = sql::create_table_sql(self.dialect(), feature_type);
        debug!("{sql}");
        cx.execute(&sql)
            .with_catalog_context(format!("creating {}", feature_type.name))?;

        let escape = |name: &str| self.host.escape_name_pattern(name);
        let mut ctx = DialectContext {
            cx: &mut *cx,
            schema: self.schema(),
            registry: &self.registry,
            escape_name_pattern: &escape,
        };
        self.dialect.post_create_table(&mut ctx, feature_type)?;
        self.entry(&feature_type.name).invalidate();
        info!("Created feature type {}", feature_type.name);
        Ok(())
    }

    /// Drop the class of `type_name`.
    ///
    /// # Errors
    ///
    /// Returns a catalog error if the statement fails.
    pub fn remove_schema(&self, type_name: &str) -> Result<()> {
        let mut cx = ConnectionLease::acquire(&self.host)
            .with_catalog_context("borrowing a connection to drop a schema")?;
        let sql = sql::drop_table_sql(self.dialect(), type_name);
        debug!("{sql}");
        cx.execute(&sql)
            .with_catalog_context(format!("dropping {type_name}"))?;
        if let Some(entry) = self.entries_mut().remove(type_name) {
            entry.invalidate();
        }
        info!("Removed feature type {type_name}");
        Ok(())
    }

    /// Insert one feature and return its identifier, if one can be known.
    ///
    /// # Errors
    ///
    /// Returns write errors before any statement runs, and catalog errors if
    /// the insert fails.
    pub fn insert(
        &self,
        type_name: &str,
        feature: &Feature,
        keys: &dyn KeysFetcher,
    ) -> Result<Option<String>> {
        let feature_type = self.feature_type(type_name)?;
        let sql = sql::insert_sql(
            self.dialect(),
            &self.translator(&feature_type),
            &feature_type,
            feature,
            keys,
        )?;
        let mut cx = ConnectionLease::acquire(&self.host)
            .with_catalog_context("borrowing a connection to insert")?;
        debug!("{sql}");
        cx.execute(&sql)
            .with_catalog_context(format!("inserting into {type_name}"))?;
        let key = keys.post_insert(self.dialect(), &mut *cx)?;
        Ok(key.map(|k| format!("{type_name}.{k}")))
    }

    /// Run a query and decode its rows.
    ///
    /// # Errors
    ///
    /// Returns filter errors before any statement runs, catalog errors if the
    /// query fails and codec errors for undecodable values.
    pub fn query(&self, type_name: &str, query: &Query) -> Result<Vec<Feature>> {
        let feature_type = self.feature_type(type_name)?;
        let sql = sql::select_sql(
            self.dialect(),
            &self.translator(&feature_type),
            &feature_type,
            query,
            self.config.max_page_size,
        )?;
        let mut cx = ConnectionLease::acquire(&self.host)
            .with_catalog_context("borrowing a connection to query")?;
        debug!("{sql}");
        let rows = cx
            .query(&sql)
            .with_catalog_context(format!("querying {type_name}"))?;
        FeatureReader::new(&feature_type, &self.operations).read_all(&rows)
    }

    /// Bounds of the default geometry of the features matching `filter`, in
    /// the attribute's native reference system.
    ///
    /// Returns `None` for types without geometry or without matching rows.
    ///
    /// # Errors
    ///
    /// Returns a catalog error if the query fails and a codec error for an
    /// undecodable envelope.
    pub fn bounds(&self, type_name: &str, filter: &Filter) -> Result<Option<Rect<f64>>> {
        let feature_type = self.feature_type(type_name)?;
        let Some(sql) = sql::bounds_sql(
            self.dialect(),
            &self.translator(&feature_type),
            &feature_type,
            filter,
        )?
        else {
            return Ok(None);
        };
        let srid = feature_type
            .default_geometry()
            .and_then(|a| a.as_geometry())
            .and_then(|g| g.srid);

        let mut cx = ConnectionLease::acquire(&self.host)
            .with_catalog_context("borrowing a connection to compute bounds")?;
        debug!("{sql}");
        let rows = cx
            .query(&sql)
            .with_catalog_context(format!("computing the bounds of {type_name}"))?;

        let mut bounds: Option<Rect<f64>> = None;
        for bytes in rows.iter().filter_map(|row| row.get(0)?.as_bytes()) {
            let Some(envelope) = codec::decode_envelope(bytes)? else {
                continue;
            };
            let mut value = GeometryValue::new(envelope.to_polygon());
            self.operations.from_canonical(&mut value, srid)?;
            let Shape::Geometry(native) = &value.shape else {
                continue;
            };
            let Some(rect) = native.bounding_rect() else {
                continue;
            };
            bounds = Some(match bounds {
                Some(b) => union(b, rect),
                None => rect,
            });
        }
        Ok(bounds)
    }

    /// Drop an index of `type_name`. The borrowed connection is closed
    /// rather than returned, whether or not the statement succeeds.
    ///
    /// # Errors
    ///
    /// Returns a catalog error if dropping the index fails.
    pub fn drop_index(&self, type_name: &str, index_name: &str) -> Result<()> {
        let feature_type = self.feature_type(type_name)?;
        let lease = ConnectionLease::acquire(&self.host)
            .with_catalog_context("borrowing a connection to drop an index")?;
        let mut cx = lease.detach();
        self.dialect
            .drop_index(cx.as_mut(), &feature_type, self.schema(), index_name)
    }
}

fn union(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
        coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
    )
}
