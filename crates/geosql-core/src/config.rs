//! Store configuration.

use crate::crs::ClampPolicy;
use crate::error::{ConfigError, Result};

/// Options controlling how a [`crate::store::SpatialStore`] maps tables.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Database schema tables live in
    pub schema: Option<String>,
    /// Namespace URI stamped on built feature types
    pub namespace: Option<String>,
    /// Publish primary key columns as attributes
    pub expose_primary_keys: bool,
    /// Type columns listed in the relationship table as associations
    pub associations: bool,
    /// Coordinate bounds applied to geometry literals
    pub clamp: ClampPolicy,
    /// Page size used when no limit is given but an offset is
    pub max_page_size: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            schema: None,
            namespace: None,
            expose_primary_keys: false,
            associations: false,
            clamp: ClampPolicy::default(),
            max_page_size: i32::MAX as u64,
        }
    }
}

impl StoreConfig {
    /// Create new store options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the database schema
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set the namespace URI
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set whether primary key columns are published as attributes
    #[must_use]
    pub fn with_expose_primary_keys(mut self, expose: bool) -> Self {
        self.expose_primary_keys = expose;
        self
    }

    /// Set whether association columns are recognized
    #[must_use]
    pub fn with_associations(mut self, associations: bool) -> Self {
        self.associations = associations;
        self
    }

    /// Set the clamp policy
    #[must_use]
    pub fn with_clamp_policy(mut self, clamp: ClampPolicy) -> Self {
        self.clamp = clamp;
        self
    }

    /// Set the page size used for offset-only queries
    #[must_use]
    pub fn with_max_page_size(mut self, size: u64) -> Self {
        self.max_page_size = size;
        self
    }

    /// Check the options for inconsistencies.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] for a blank schema or a zero
    /// page size.
    pub fn validate(&self) -> Result<()> {
        if self.schema.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(ConfigError::InvalidOption {
                option: "schema".into(),
                message: "schema name cannot be blank".into(),
            }
            .into());
        }
        if self.max_page_size == 0 {
            return Err(ConfigError::InvalidOption {
                option: "max_page_size".into(),
                message: "page size must be positive".into(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::{BRITISH_NATIONAL_GRID, WGS84};

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert!(config.schema.is_none());
        assert!(!config.expose_primary_keys);
        assert!(!config.associations);
        assert!(config.clamp.bounds_for(BRITISH_NATIONAL_GRID).is_some());
        assert_eq!(config.max_page_size, 2_147_483_647);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = StoreConfig::new()
            .with_schema("gis")
            .with_namespace("http://example.com/gis")
            .with_expose_primary_keys(true)
            .with_associations(true)
            .with_clamp_policy(ClampPolicy::empty());
        assert_eq!(config.schema.as_deref(), Some("gis"));
        assert!(config.expose_primary_keys);
        assert!(config.clamp.bounds_for(WGS84).is_none());
    }

    #[test]
    fn test_validate_rejects_blank_schema() {
        let err = StoreConfig::new().with_schema("  ").validate().unwrap_err();
        assert!(err.to_string().contains("schema"));
        assert!(StoreConfig::new().with_max_page_size(0).validate().is_err());
    }
}
