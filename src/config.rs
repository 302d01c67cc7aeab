use std::path::PathBuf;

/// Configuration for the schema catalog
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Create a storage group when a timeseries is created outside of any
    /// (default: true)
    pub auto_create_schema: bool,

    /// Depth of auto-created storage groups; 1 means `root.<name>` (default: 1)
    pub default_storage_group_level: usize,

    /// Deepest level listed with a single prefix scan; deeper levels fan out
    /// from their parents (default: 5)
    pub deep_level_threshold: usize,

    /// Worker threads used by the deep-level fan-out (default: 4)
    pub scan_parallelism: usize,

    /// Number of lock stripes serializing node creation (default: 64)
    pub lock_stripes: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            auto_create_schema: true,
            default_storage_group_level: 1,
            deep_level_threshold: 5,
            scan_parallelism: 4,
            lock_stripes: 64,
        }
    }
}

impl CatalogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable storage group auto-creation
    pub fn auto_create_schema(mut self, enabled: bool) -> Self {
        self.auto_create_schema = enabled;
        self
    }

    /// Set the depth of auto-created storage groups
    pub fn default_storage_group_level(mut self, level: usize) -> Self {
        self.default_storage_group_level = level;
        self
    }

    /// Set the deepest level served by a direct prefix scan
    pub fn deep_level_threshold(mut self, level: usize) -> Self {
        self.deep_level_threshold = level;
        self
    }

    /// Set the number of fan-out workers
    pub fn scan_parallelism(mut self, workers: usize) -> Self {
        self.scan_parallelism = workers.max(1);
        self
    }

    /// Set the number of creation lock stripes
    pub fn lock_stripes(mut self, stripes: usize) -> Self {
        self.lock_stripes = stripes.max(1);
        self
    }
}

/// Configuration for the persistent fjall engine
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory path for the keyspace
    pub dir: PathBuf,

    /// Journal fsync interval in milliseconds (default: fjall's)
    pub fsync_ms: Option<u16>,

    /// Leave journal persistence to explicit `persist` calls (default: false)
    pub manual_journal_persist: bool,
}

impl StoreConfig {
    /// Create a new config with the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            fsync_ms: None,
            manual_journal_persist: false,
        }
    }

    /// Set journal fsync interval
    pub fn fsync_ms(mut self, ms: u16) -> Self {
        self.fsync_ms = Some(ms);
        self
    }

    /// Enable manual journal persistence
    pub fn manual_journal_persist(mut self, enabled: bool) -> Self {
        self.manual_journal_persist = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CatalogConfig::default();
        assert!(config.auto_create_schema);
        assert_eq!(config.default_storage_group_level, 1);
        assert_eq!(config.deep_level_threshold, 5);
        assert_eq!(config.scan_parallelism, 4);
        assert_eq!(config.lock_stripes, 64);
    }

    #[test]
    fn test_config_builder() {
        let config = CatalogConfig::new()
            .auto_create_schema(false)
            .default_storage_group_level(2)
            .deep_level_threshold(3)
            .scan_parallelism(0)
            .lock_stripes(8);

        assert!(!config.auto_create_schema);
        assert_eq!(config.default_storage_group_level, 2);
        assert_eq!(config.deep_level_threshold, 3);
        // Clamped to at least one worker
        assert_eq!(config.scan_parallelism, 1);
        assert_eq!(config.lock_stripes, 8);
    }

    #[test]
    fn test_store_config_builder() {
        let config = StoreConfig::new("/tmp/catalog")
            .fsync_ms(100)
            .manual_journal_persist(true);
        assert_eq!(config.dir, PathBuf::from("/tmp/catalog"));
        assert_eq!(config.fsync_ms, Some(100));
        assert!(config.manual_journal_persist);
    }
}
