//! Dimension cache sizing.
use trace_intern::CacheSizes;

fn default_size(bytes: u64) -> &'static str {
    Box::leak(Box::new(bytes.to_string()))
}

/// CLI config for the sizes of the dimension caches, in bytes.
#[derive(Debug, Clone, Copy, clap::Parser)]
pub struct DimensionCacheConfig {
    /// Maximum size of the schema URL cache.
    #[clap(
        long = "schema-url-cache-size",
        env = "TRACE_INTERN_SCHEMA_URL_CACHE_SIZE",
        default_value = default_size(CacheSizes::DEFAULT_SCHEMA_URL),
        action
    )]
    pub schema_url_cache_size: u64,

    /// Maximum size of the operation cache.
    #[clap(
        long = "operation-cache-size",
        env = "TRACE_INTERN_OPERATION_CACHE_SIZE",
        default_value = default_size(CacheSizes::DEFAULT_OPERATION),
        action
    )]
    pub operation_cache_size: u64,

    /// Maximum size of the instrumentation library cache.
    #[clap(
        long = "instrumentation-lib-cache-size",
        env = "TRACE_INTERN_INSTRUMENTATION_LIB_CACHE_SIZE",
        default_value = default_size(CacheSizes::DEFAULT_INSTRUMENTATION_LIB),
        action
    )]
    pub instrumentation_lib_cache_size: u64,

    /// Maximum size of the tag cache.
    #[clap(
        long = "tag-cache-size",
        env = "TRACE_INTERN_TAG_CACHE_SIZE",
        default_value = default_size(CacheSizes::DEFAULT_TAG),
        action
    )]
    pub tag_cache_size: u64,
}

impl DimensionCacheConfig {
    pub fn cache_sizes(&self) -> CacheSizes {
        CacheSizes {
            schema_url: self.schema_url_cache_size,
            operation: self.operation_cache_size,
            instrumentation_lib: self.instrumentation_lib_cache_size,
            tag: self.tag_cache_size,
        }
    }
}

impl From<DimensionCacheConfig> for CacheSizes {
    fn from(config: DimensionCacheConfig) -> Self {
        config.cache_sizes()
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn defaults() {
        let config = DimensionCacheConfig::try_parse_from(["my_binary"]).unwrap();
        assert_eq!(config.cache_sizes(), CacheSizes::default());
    }

    #[test]
    fn overrides() {
        let config = DimensionCacheConfig::try_parse_from([
            "my_binary",
            "--tag-cache-size",
            "1024",
            "--operation-cache-size",
            "64",
        ])
        .unwrap();

        assert_eq!(
            CacheSizes::from(config),
            CacheSizes {
                operation: 64,
                tag: 1024,
                ..CacheSizes::default()
            }
        );
    }

    #[test]
    fn rejects_non_numeric_size() {
        assert!(
            DimensionCacheConfig::try_parse_from(["my_binary", "--tag-cache-size", "lots"])
                .is_err()
        );
    }
}
