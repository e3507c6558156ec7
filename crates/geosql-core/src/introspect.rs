//! Schema introspection.
//!
//! Rebuilds a [`FeatureType`] from the database's metadata catalog. Columns
//! whose type cannot be resolved are dropped and the resulting type is marked
//! read only instead of failing the whole build.

use geosql_common::{CatalogColumn, ConnectionLease};
use log::{debug, warn};

use crate::config::StoreConfig;
use crate::dialect::{DialectContext, SqlDialect};
use crate::error::{CatalogError, Result, SqlErrorExt};
use crate::registry::TypeRegistry;
use crate::sql;
use crate::store::DataStoreHost;
use crate::types::{
    AttributeDescriptor, AttributeKind, Binding, ColumnMetadata, ContentEntry, FeatureType,
    GeometryAttribute, PrimaryKey, PrimaryKeyColumn, VirtualTable,
};

/// Resolve the binding of a catalog column.
///
/// Lookups, in order: the dialect's own mapping, the native type name, the
/// type code and, for embedded columns, the embedded element type name.
#[must_use]
pub fn resolve_binding(
    dialect: &dyn SqlDialect,
    registry: &TypeRegistry,
    column: &ColumnMetadata,
) -> Option<Binding> {
    dialect
        .mapping_for_column(column)
        .or_else(|| registry.binding_for_name(&column.type_name).cloned())
        .or_else(|| registry.binding_for_code(column.type_code).cloned())
        .or_else(|| {
            if column.embedded {
                column
                    .embedded_type
                    .as_deref()
                    .and_then(|name| registry.binding_for_name(name))
                    .cloned()
            } else {
                None
            }
        })
}

/// Builds feature types for the tables of one host.
pub struct Introspector<'a, H: DataStoreHost + ?Sized> {
    host: &'a H,
    dialect: &'a dyn SqlDialect,
    registry: &'a TypeRegistry,
    config: &'a StoreConfig,
}

impl<'a, H: DataStoreHost + ?Sized> Introspector<'a, H> {
    /// Create an introspector.
    #[must_use]
    pub fn new(
        host: &'a H,
        dialect: &'a dyn SqlDialect,
        registry: &'a TypeRegistry,
        config: &'a StoreConfig,
    ) -> Self {
        Self {
            host,
            dialect,
            registry,
            config,
        }
    }

    /// Build the feature type of `entry`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Sql`] if a catalog query fails and
    /// [`CatalogError::TypeNotFound`] if the table reports no columns. The
    /// borrowed connection is released on every path.
    #[allow(clippy::too_many_lines)]
    pub fn build_feature_type(&self, entry: &ContentEntry) -> Result<FeatureType> {
        let table = entry.type_name.as_str();
        let schema = entry.schema.as_deref().or(self.config.schema.as_deref());
        let virtual_table = self
            .host
            .virtual_tables()
            .iter()
            .find(|vt| vt.name == table);

        let mut cx = ConnectionLease::acquire(self.host)
            .with_catalog_context(format!("borrowing a connection for {table}"))?;

        // primary key
        let mut key = match virtual_table {
            Some(vt) if vt.primary_key_columns.is_empty() => PrimaryKey::Null,
            Some(vt) => PrimaryKey::new(
                table,
                vt.primary_key_columns
                    .iter()
                    .map(PrimaryKeyColumn::untyped)
                    .collect(),
            ),
            None => self
                .host
                .primary_key(&mut *cx, schema, table)
                .with_catalog_context(format!("looking up the primary key of {table}"))?,
        };
        let mut read_only = false;
        if key.is_null() {
            debug!("{table} has no usable primary key, marking it read only");
            read_only = true;
        }
        if virtual_table.is_some() {
            read_only = true;
        }

        // raw column metadata
        let columns: Vec<CatalogColumn> = match virtual_table {
            Some(vt) => self
                .host
                .virtual_table_columns(&mut *cx, vt)
                .with_catalog_context(format!("describing virtual table {table}"))?,
            None => cx
                .columns(schema, &self.host.escape_name_pattern(table))
                .with_catalog_context(format!("listing the columns of {table}"))?,
        };
        if columns.is_empty() {
            return Err(CatalogError::TypeNotFound {
                name: table.to_string(),
            }
            .into());
        }

        let escape = |name: &str| self.host.escape_name_pattern(name);
        if self.config.associations {
            let mut ctx = DialectContext {
                cx: &mut *cx,
                schema,
                registry: self.registry,
                escape_name_pattern: &escape,
            };
            sql::ensure_relationship_table(self.dialect, &mut ctx)?;
        }

        let mut feature_type = FeatureType::new(table);
        feature_type.namespace.clone_from(&self.config.namespace);

        for raw in &columns {
            let mut column = ColumnMetadata::from(raw);
            let is_key = key.contains(&column.name);

            if is_key && !self.config.expose_primary_keys {
                // hidden key columns only contribute their type to the key
                self.dialect.handle_user_defined_type(&mut column);
                match resolve_binding(self.dialect, self.registry, &column) {
                    Some(Binding::Scalar(dt)) => key.learn_type(&column.name, &dt),
                    _ => debug!("Key column {table}.{} keeps its declared type", column.name),
                }
                continue;
            }

            if self.config.associations && !is_key {
                let mut ctx = DialectContext {
                    cx: &mut *cx,
                    schema,
                    registry: self.registry,
                    escape_name_pattern: &escape,
                };
                if sql::relationship_exists(self.dialect, &mut ctx, table, &column.name)? {
                    debug!("{table}.{} is an association", column.name);
                    feature_type.attributes.push(
                        AttributeDescriptor::association(&column.name)
                            .with_nullable(column.nullable)
                            .with_native_type(&column.type_name),
                    );
                    continue;
                }
            }

            self.dialect.handle_user_defined_type(&mut column);
            column.binding = resolve_binding(self.dialect, self.registry, &column);
            let Some(binding) = column.binding.clone() else {
                warn!(
                    "Could not find mapping for '{}' ({}, code {}), ignoring the column and \
                     setting the feature type {table} read only",
                    column.name, column.type_name, column.type_code
                );
                read_only = true;
                continue;
            };

            if is_key {
                if let Binding::Scalar(dt) = &binding {
                    key.learn_type(&column.name, dt);
                }
            }

            let native_type_name = match (&binding, column.embedded_type.as_deref()) {
                (Binding::Geometry(_), Some(element)) if column.embedded => element.to_string(),
                _ => column.type_name.clone(),
            };

            let kind = match binding {
                Binding::Scalar(dt) => AttributeKind::Scalar(dt),
                Binding::Association => AttributeKind::Association,
                Binding::Geometry(kind) => {
                    let mut ctx = DialectContext {
                        cx: &mut *cx,
                        schema,
                        registry: self.registry,
                        escape_name_pattern: &escape,
                    };
                    let srid = self.native_srid(&mut ctx, virtual_table, table, &column.name);
                    let dimension = self.dimension(&mut ctx, virtual_table, table, &column.name);
                    AttributeKind::Geometry(
                        GeometryAttribute::new(kind, srid).with_dimension(dimension),
                    )
                },
            };

            let mut attribute = AttributeDescriptor {
                name: column.name.clone(),
                nullable: column.nullable,
                kind,
                native_type_name: None,
                is_key: false,
            }
            .with_native_type(native_type_name);
            attribute.is_key = is_key;
            feature_type.attributes.push(attribute);
        }

        feature_type.primary_key = key;
        feature_type.read_only = read_only;
        debug!(
            "Built feature type {table}: {} attributes, read only: {read_only}",
            feature_type.attributes.len()
        );
        Ok(feature_type)
    }

    fn native_srid(
        &self,
        ctx: &mut DialectContext<'_>,
        virtual_table: Option<&VirtualTable>,
        table: &str,
        column: &str,
    ) -> Option<i32> {
        if let Some(vt) = virtual_table {
            return vt.native_srid(column);
        }
        match self.dialect.geometry_srid(ctx, table, column) {
            Ok(srid) => srid,
            Err(e) => {
                warn!("Failed to retrieve information about {table}.{column} from the geometry_columns table: {e}");
                None
            },
        }
    }

    fn dimension(
        &self,
        ctx: &mut DialectContext<'_>,
        virtual_table: Option<&VirtualTable>,
        table: &str,
        column: &str,
    ) -> u32 {
        if let Some(vt) = virtual_table {
            return vt.dimension(column).unwrap_or(2);
        }
        match self.dialect.geometry_dimension(ctx, table, column) {
            Ok(dimension) => dimension.unwrap_or(2),
            Err(e) => {
                warn!("Failed to retrieve the dimension of {table}.{column}: {e}");
                2
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::OrientDbDialect;
    use crate::registry::sql_types;
    use crate::types::GeometryKind;
    use arrow_schema::DataType;

    fn resolve(column: &CatalogColumn) -> Option<Binding> {
        let dialect = OrientDbDialect::new();
        let registry = TypeRegistry::new(&dialect);
        let mut meta = ColumnMetadata::from(column);
        dialect.handle_user_defined_type(&mut meta);
        resolve_binding(&dialect, &registry, &meta)
    }

    #[test]
    fn test_resolve_by_dialect_code() {
        let column = CatalogColumn::new("geom", 2001, "EMBEDDED");
        assert_eq!(resolve(&column), Some(Binding::Geometry(GeometryKind::Point)));
    }

    #[test]
    fn test_resolve_by_name_then_code() {
        assert_eq!(
            resolve(&CatalogColumn::new("name", sql_types::OTHER, "STRING")),
            Some(Binding::Scalar(DataType::Utf8))
        );
        assert_eq!(
            resolve(&CatalogColumn::new("lanes", sql_types::INTEGER, "INT4")),
            Some(Binding::Scalar(DataType::Int32))
        );
    }

    #[test]
    fn test_resolve_by_embedded_type() {
        let column =
            CatalogColumn::new("area", sql_types::OTHER, "EMBEDDED").embedded("OMultiPolygon");
        assert_eq!(
            resolve(&column),
            Some(Binding::Geometry(GeometryKind::MultiPolygon))
        );
    }

    #[test]
    fn test_unresolvable_column() {
        assert_eq!(resolve(&CatalogColumn::new("blob", sql_types::OTHER, "CUSTOM")), None);
        let not_embedded = CatalogColumn {
            embedded_type: Some("OPoint".into()),
            ..CatalogColumn::new("x", sql_types::OTHER, "CUSTOM")
        };
        assert_eq!(resolve(&not_embedded), None);
    }

    #[test]
    fn test_user_defined_type_uses_base_code() {
        let column = CatalogColumn::new("code", sql_types::DISTINCT, "POSTCODE")
            .with_source_data_type(sql_types::VARCHAR);
        assert_eq!(resolve(&column), Some(Binding::Scalar(DataType::Utf8)));
    }
}
