//! Building blocks for [`clap`]-driven configuration of trace dimension interning.
//!
//! Every flag can also be set through a `TRACE_INTERN_*` environment variable.
pub mod dimension_cache;
pub mod store_dsn;
