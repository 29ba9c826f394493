//! Schema version tracking.

use std::sync::atomic::{AtomicU64, Ordering};

use tessera_types::SchemaVersion;
use tracing::info;

/// Source of the current schema version.
///
/// Cursors snapshot the version when they are initialized and stop as soon
/// as it changes.
pub trait SchemaVersionSource: Send + Sync {
    fn current(&self) -> SchemaVersion;
}

/// Atomic schema version counter.
#[derive(Debug, Default)]
pub struct SchemaClock {
    version: AtomicU64,
}

impl SchemaClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the schema version and returns the new value.
    pub fn bump(&self) -> SchemaVersion {
        let version = SchemaVersion::new(self.version.fetch_add(1, Ordering::AcqRel) + 1);
        info!(version = %version, "schema version bumped");
        version
    }
}

impl SchemaVersionSource for SchemaClock {
    fn current(&self) -> SchemaVersion {
        SchemaVersion::new(self.version.load(Ordering::Acquire))
    }
}
