/// Maximum weight, in bytes, of each dimension cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSizes {
    pub schema_url: u64,
    pub operation: u64,
    pub instrumentation_lib: u64,
    pub tag: u64,
}

impl CacheSizes {
    pub const DEFAULT_SCHEMA_URL: u64 = 1024 * 1024;
    pub const DEFAULT_OPERATION: u64 = 1024 * 1024;
    pub const DEFAULT_INSTRUMENTATION_LIB: u64 = 1024 * 1024;
    /// Tags are by far the most numerous dimension.
    pub const DEFAULT_TAG: u64 = 8 * 1024 * 1024;
}

impl Default for CacheSizes {
    fn default() -> Self {
        Self {
            schema_url: Self::DEFAULT_SCHEMA_URL,
            operation: Self::DEFAULT_OPERATION,
            instrumentation_lib: Self::DEFAULT_INSTRUMENTATION_LIB,
            tag: Self::DEFAULT_TAG,
        }
    }
}
