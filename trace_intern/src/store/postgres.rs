//! A Postgres backed [`DimensionStore`].
//!
//! The statements call the `put_*` functions of the trace schema, which insert the dimension if
//! it is missing and return its identifier either way. A whole batch is sent as one query.
use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use sqlx::{
    PgPool, Row,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{BatchResults, BufferedResults, DimensionStore, Statement, StoreError};

/// Postgres connection options.
#[derive(Debug, Clone)]
pub struct PostgresConnectionOptions {
    /// Application name.
    ///
    /// This will be reported to postgres.
    pub app_name: String,

    /// Schema holding the `put_*` functions and the `tag_type` domain.
    pub schema_name: String,

    /// DSN.
    pub dsn: String,

    /// Maximum number of concurrent connections.
    pub max_conns: u32,

    /// Set the amount of time to attempt connecting to the database.
    pub connect_timeout: Duration,

    /// Set a maximum idle duration for individual connections.
    pub idle_timeout: Duration,
}

impl PostgresConnectionOptions {
    /// Default value for [`schema_name`](Self::schema_name).
    pub const DEFAULT_SCHEMA_NAME: &'static str = "ps_trace";

    /// Default value for [`max_conns`](Self::max_conns).
    pub const DEFAULT_MAX_CONNS: u32 = 10;

    /// Default value for [`connect_timeout`](Self::connect_timeout).
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

    /// Default value for [`idle_timeout`](Self::idle_timeout).
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);
}

impl Default for PostgresConnectionOptions {
    fn default() -> Self {
        Self {
            app_name: String::from("trace_intern"),
            schema_name: String::from(Self::DEFAULT_SCHEMA_NAME),
            dsn: String::new(),
            max_conns: Self::DEFAULT_MAX_CONNS,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            idle_timeout: Self::DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Executes every batch as a single query.
///
/// The statements of a batch are bound column-wise as arrays and unnested in submission order,
/// so a batch costs one round trip and either yields all of its rows or fails as a whole.
#[derive(Debug)]
pub struct PostgresDimensionStore {
    pool: PgPool,
    schema_name: String,
}

impl PostgresDimensionStore {
    /// Connect to the store.
    pub async fn connect(options: &PostgresConnectionOptions) -> Result<Self, StoreError> {
        let connect_options =
            PgConnectOptions::from_str(&options.dsn)?.application_name(&options.app_name);

        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(options.max_conns)
            .acquire_timeout(options.connect_timeout)
            .idle_timeout(options.idle_timeout)
            .test_before_acquire(true)
            .connect_with(connect_options)
            .await?;

        info!(application_name=%options.app_name, "connected to trace dimension store");

        Ok(Self::new(pool, options.schema_name.clone()))
    }

    /// Use an existing pool.
    pub fn new(pool: PgPool, schema_name: impl Into<String>) -> Self {
        Self {
            pool,
            schema_name: schema_name.into(),
        }
    }

    async fn execute(&self, statements: &[Statement]) -> Result<Vec<Option<i64>>, StoreError> {
        let args = BatchArgs::new(statements);
        let sql = batch_sql(&self.schema_name);

        let rows = sqlx::query(&sql)
            .bind(&args.kinds) // $1
            .bind(&args.first) // $2
            .bind(&args.second) // $3
            .bind(&args.third) // $4
            .bind(&args.schema_url_ids) // $5
            .bind(&args.tag_types) // $6
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<Option<i64>, _>(0).map_err(StoreError::from))
            .collect()
    }
}

#[async_trait]
impl DimensionStore for PostgresDimensionStore {
    async fn send_batch(
        &self,
        cancel: &CancellationToken,
        statements: Vec<Statement>,
    ) -> Result<Box<dyn BatchResults>, StoreError> {
        let rows = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StoreError::Cancelled),
            rows = self.execute(&statements) => rows?,
        };
        debug!(statements = statements.len(), "executed postgres batch");

        Ok(Box::new(BufferedResults::new(rows)))
    }
}

const KIND_SCHEMA_URL: i16 = 1;
const KIND_OPERATION: i16 = 2;
const KIND_INSTRUMENTATION_LIB: i16 = 3;
const KIND_TAG_KEY: i16 = 4;
const KIND_TAG: i16 = 5;

/// One `put_*` call per unnested row, returned in submission order.
///
/// The rows are unnested, and so the calls take their row locks, in the order the batch was
/// submitted in.
fn batch_sql(schema: &str) -> String {
    format!(
        r#"
SELECT CASE s.kind
    WHEN {KIND_SCHEMA_URL} THEN {schema}.put_schema_url(s.first)
    WHEN {KIND_OPERATION} THEN {schema}.put_operation(s.first, s.second, s.third)
    WHEN {KIND_INSTRUMENTATION_LIB} THEN {schema}.put_instrumentation_lib(s.first, s.second, s.schema_url_id)
    WHEN {KIND_TAG_KEY} THEN {schema}.put_tag_key(s.first, s.tag_type::{schema}.tag_type)
    WHEN {KIND_TAG} THEN {schema}.put_tag(s.first, s.second::jsonb, s.tag_type::{schema}.tag_type)
END AS id
FROM UNNEST($1::int2[], $2::text[], $3::text[], $4::text[], $5::int8[], $6::int2[])
    WITH ORDINALITY AS s(kind, first, second, third, schema_url_id, tag_type, ord)
ORDER BY s.ord;
"#
    )
}

/// Column-wise arguments of a batch, one element per statement.
///
/// Columns a statement kind does not use hold an empty string, NULL or 0.
#[derive(Debug, Default, PartialEq, Eq)]
struct BatchArgs<'a> {
    kinds: Vec<i16>,
    first: Vec<&'a str>,
    second: Vec<&'a str>,
    third: Vec<&'a str>,
    schema_url_ids: Vec<Option<i64>>,
    tag_types: Vec<i16>,
}

impl<'a> BatchArgs<'a> {
    fn new(statements: &'a [Statement]) -> Self {
        let mut args = Self {
            kinds: Vec::with_capacity(statements.len()),
            first: Vec::with_capacity(statements.len()),
            second: Vec::with_capacity(statements.len()),
            third: Vec::with_capacity(statements.len()),
            schema_url_ids: Vec::with_capacity(statements.len()),
            tag_types: Vec::with_capacity(statements.len()),
        };

        for statement in statements {
            let (kind, first, second, third, schema_url_id, tag_type) = match statement {
                Statement::PutSchemaUrl { url } => (KIND_SCHEMA_URL, url.as_str(), "", "", None, 0),
                Statement::PutOperation {
                    service_name,
                    span_name,
                    span_kind,
                } => (
                    KIND_OPERATION,
                    service_name.as_str(),
                    span_name.as_str(),
                    span_kind.as_str(),
                    None,
                    0,
                ),
                Statement::PutInstrumentationLib {
                    name,
                    version,
                    schema_url_id,
                } => (
                    KIND_INSTRUMENTATION_LIB,
                    name.as_str(),
                    version.as_str(),
                    "",
                    *schema_url_id,
                    0,
                ),
                Statement::PutTagKey { key, tag_type } => {
                    (KIND_TAG_KEY, key.as_str(), "", "", None, tag_type.bits())
                }
                Statement::PutTag {
                    key,
                    value,
                    tag_type,
                } => (
                    KIND_TAG,
                    key.as_str(),
                    value.as_str(),
                    "",
                    None,
                    tag_type.bits(),
                ),
            };
            args.kinds.push(kind);
            args.first.push(first);
            args.second.push(second);
            args.third.push(third);
            args.schema_url_ids.push(schema_url_id);
            args.tag_types.push(tag_type);
        }

        args
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::tag::TagType;

    #[test]
    fn batch_calls_schema_functions_in_submission_order() {
        let sql = batch_sql(PostgresConnectionOptions::DEFAULT_SCHEMA_NAME);

        for call in [
            "ps_trace.put_schema_url(s.first)",
            "ps_trace.put_operation(s.first, s.second, s.third)",
            "ps_trace.put_instrumentation_lib(s.first, s.second, s.schema_url_id)",
            "ps_trace.put_tag_key(s.first, s.tag_type::ps_trace.tag_type)",
            "ps_trace.put_tag(s.first, s.second::jsonb, s.tag_type::ps_trace.tag_type)",
        ] {
            assert!(sql.contains(call), "{call} missing from {sql}");
        }
        assert!(sql.contains("WITH ORDINALITY"));
        assert!(sql.trim_end().ends_with("ORDER BY s.ord;"));
    }

    #[test]
    fn statements_bind_column_wise() {
        let statements = [
            Statement::PutSchemaUrl {
                url: "u".to_string(),
            },
            Statement::PutOperation {
                service_name: "s".to_string(),
                span_name: "n".to_string(),
                span_kind: "k".to_string(),
            },
            Statement::PutInstrumentationLib {
                name: "lib".to_string(),
                version: "1.0".to_string(),
                schema_url_id: Some(7),
            },
            Statement::PutTagKey {
                key: "a".to_string(),
                tag_type: TagType::RESOURCE,
            },
            Statement::PutTag {
                key: "a".to_string(),
                value: "\"v\"".to_string(),
                tag_type: TagType::RESOURCE,
            },
        ];

        assert_eq!(
            BatchArgs::new(&statements),
            BatchArgs {
                kinds: vec![
                    KIND_SCHEMA_URL,
                    KIND_OPERATION,
                    KIND_INSTRUMENTATION_LIB,
                    KIND_TAG_KEY,
                    KIND_TAG,
                ],
                first: vec!["u", "s", "lib", "a", "a"],
                second: vec!["", "n", "1.0", "", "\"v\""],
                third: vec!["", "k", "", "", ""],
                schema_url_ids: vec![None, None, Some(7), None, None],
                tag_types: vec![0, 0, 0, 2, 2],
            }
        );
    }

    #[test]
    fn empty_batch_binds_empty_arrays() {
        assert_eq!(BatchArgs::new(&[]), BatchArgs::default());
    }

    #[test]
    fn default_options() {
        let options = PostgresConnectionOptions::default();
        assert_eq!(options.schema_name, "ps_trace");
        assert_eq!(options.max_conns, 10);
        assert!(options.dsn.is_empty());
    }
}
