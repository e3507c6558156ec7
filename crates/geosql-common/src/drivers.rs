//! Capability types for the SQL dialect registry.
//!
//! A dialect driver advertises, per operation, whether the adapter can
//! introspect its catalog, translate queries against it, and write to it.

/// Support status for a specific driver operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportStatus {
    /// The operation is fully supported and implemented.
    Supported,
    /// The operation is not supported by the driver.
    NotSupported,
    /// The operation is planned for future implementation.
    Planned,
}

impl SupportStatus {
    /// Returns `true` if the operation is fully supported and implemented.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        matches!(self, SupportStatus::Supported)
    }

    /// Returns `true` if the operation is supported or planned.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self, SupportStatus::NotSupported)
    }

    /// Returns the string representation of this support status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            SupportStatus::Supported => "Supported",
            SupportStatus::NotSupported => "Not Supported",
            SupportStatus::Planned => "Planned",
        }
    }
}

/// Operations a dialect driver supports.
#[derive(Debug, Clone, Copy)]
pub struct DriverCapabilities {
    /// Rebuilding feature types from the metadata catalog.
    pub introspect: SupportStatus,
    /// Translating queries and reading features.
    pub read: SupportStatus,
    /// Creating schemas and inserting features.
    pub write: SupportStatus,
}

impl DriverCapabilities {
    /// Returns `true` if at least one operation is supported or planned.
    #[must_use]
    pub fn has_any_support(&self) -> bool {
        self.introspect.is_available() || self.read.is_available() || self.write.is_available()
    }

    /// Returns `true` if at least one operation is fully supported.
    #[must_use]
    pub fn has_supported_operation(&self) -> bool {
        self.introspect.is_supported() || self.read.is_supported() || self.write.is_supported()
    }
}

/// A SQL backend the adapter knows about.
#[derive(Debug, Clone)]
pub struct Driver {
    /// Short name used on the command line (e.g., `"OrientDB"`).
    pub short_name: &'static str,
    /// Long descriptive name for display purposes.
    pub long_name: &'static str,
    /// Database identifier used in connection URLs (e.g., `"orient"`).
    pub database_id: &'static str,
    /// Operations supported by this driver.
    pub capabilities: DriverCapabilities,
}

impl Driver {
    /// Creates a new driver definition with specified capabilities.
    #[must_use]
    pub const fn new(
        short_name: &'static str,
        long_name: &'static str,
        database_id: &'static str,
        introspect: SupportStatus,
        read: SupportStatus,
        write: SupportStatus,
    ) -> Self {
        Self {
            short_name,
            long_name,
            database_id,
            capabilities: DriverCapabilities {
                introspect,
                read,
                write,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn support_status_predicates() {
        assert!(SupportStatus::Supported.is_supported());
        assert!(SupportStatus::Planned.is_available());
        assert!(!SupportStatus::NotSupported.is_available());
        assert_eq!(SupportStatus::NotSupported.as_str(), "Not Supported");
    }

    #[test]
    fn capabilities_summary() {
        let caps = DriverCapabilities {
            introspect: SupportStatus::Planned,
            read: SupportStatus::NotSupported,
            write: SupportStatus::NotSupported,
        };
        assert!(caps.has_any_support());
        assert!(!caps.has_supported_operation());
    }
}
