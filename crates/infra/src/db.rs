//! Postgres collaborator shared by every repository.
//!
//! One [`Database`] is built at startup (`Database::connect`) and handed to the
//! repositories; it owns the process-wide pool.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | PersistenceError |
//! |------------|----------------------|------------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (foreign key violation) | `23503` | `ForeignKeyViolation` |
//! | Database (other) | Any other | `Query` |
//! | PoolClosed / PoolTimedOut / Io | N/A | `Connection` |
//! | Other | N/A | `Query` |
//!
//! Every failure is logged with its statement and parameters before it is returned.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{error, instrument};
use uuid::Uuid;

use cook_core::{PageRequest, PagedCollection, PersistenceError};

use crate::config::DatabaseConfig;

/// A bind parameter, kept around so failures can be logged with their inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Uuid(Uuid),
    Text(String),
    NullableText(Option<String>),
    Int(i64),
    Decimal(Decimal),
    Timestamp(DateTime<Utc>),
}

impl From<Uuid> for SqlParam {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Option<String>> for SqlParam {
    fn from(v: Option<String>) -> Self {
        Self::NullableText(v)
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<Decimal> for SqlParam {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<DateTime<Utc>> for SqlParam {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

/// Attach `params` to `query` as `$1..$n`, in order.
pub(crate) fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[SqlParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlParam::Uuid(v) => query.bind(*v),
            SqlParam::Text(v) => query.bind(v.clone()),
            SqlParam::NullableText(v) => query.bind(v.clone()),
            SqlParam::Int(v) => query.bind(*v),
            SqlParam::Decimal(v) => query.bind(*v),
            SqlParam::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

/// A paginated statement: the base `SELECT` (no LIMIT/OFFSET) plus its parameters.
#[derive(Debug, Clone)]
pub struct PageQuery<'a> {
    pub statement: &'a str,
    pub params: Vec<SqlParam>,
    pub page: PageRequest,
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS product (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        name TEXT NOT NULL,
        category TEXT NOT NULL,
        price NUMERIC(10, 2) NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id UUID PRIMARY KEY,
        sequence TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS order_product (
        order_id UUID NOT NULL REFERENCES orders (id),
        position INTEGER NOT NULL,
        product_id UUID NOT NULL REFERENCES product (id),
        customization TEXT,
        PRIMARY KEY (order_id, position)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_product_category_status ON product (category, status)",
];

#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, PersistenceError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Create the tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), PersistenceError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| fail("migrate", statement, &[], e))?;
        }
        Ok(())
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, PersistenceError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))
    }

    /// Run a parameterized statement.
    ///
    /// Returns `None` when the statement yields no rows (write statements use
    /// `RETURNING` so "nothing affected" also comes back as `None`).
    #[instrument(skip(self, statement, params), err)]
    pub async fn query(
        &self,
        operation: &'static str,
        statement: &str,
        params: &[SqlParam],
    ) -> Result<Option<Vec<PgRow>>, PersistenceError> {
        let rows = bind_params(sqlx::query(statement), params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| fail(operation, statement, params, e))?;

        Ok(if rows.is_empty() { None } else { Some(rows) })
    }

    /// Count the rows `query.statement` matches, then fetch one page of them.
    ///
    /// The count wraps the same statement and parameters, so it always reflects the
    /// same filter as the page.
    #[instrument(
        skip(self, query),
        fields(page = query.page.page(), size = query.page.size()),
        err
    )]
    pub async fn query_paginate(
        &self,
        operation: &'static str,
        query: PageQuery<'_>,
    ) -> Result<PagedCollection<PgRow>, PersistenceError> {
        let count_statement = format!("SELECT COUNT(*) FROM ({}) AS count_query", query.statement);
        let total: i64 = bind_params(sqlx::query(&count_statement), &query.params)
            .fetch_one(&self.pool)
            .await
            .and_then(|row| row.try_get(0))
            .map_err(|e| fail(operation, &count_statement, &query.params, e))?;

        let page = query.page;
        if total <= 0 {
            return Ok(PagedCollection::empty(page.page(), page.size()));
        }

        let n = query.params.len();
        let page_statement = format!("{} LIMIT ${} OFFSET ${}", query.statement, n + 1, n + 2);
        let mut params = query.params;
        params.push(SqlParam::Int(bigint(page.size())));
        params.push(SqlParam::Int(bigint(page.offset())));

        let rows = bind_params(sqlx::query(&page_statement), &params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| fail(operation, &page_statement, &params, e))?;

        Ok(PagedCollection::new(rows, total as u64, page.page(), page.size()))
    }
}

/// LIMIT/OFFSET are BIGINT; anything larger means "all rows" / "past the end".
fn bigint(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Log the failing statement with its parameters, then map the driver error.
pub(crate) fn fail(
    operation: &str,
    statement: &str,
    params: &[SqlParam],
    err: sqlx::Error,
) -> PersistenceError {
    error!(
        operation,
        statement = statement.trim(),
        params = ?params,
        error = %err,
        "database statement failed"
    );
    map_sqlx_error(operation, err)
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> PersistenceError {
    match err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_string();
            match db_err.code().as_deref() {
                Some("23505") => PersistenceError::UniqueViolation {
                    operation: operation.to_string(),
                    message,
                },
                Some("23503") => PersistenceError::ForeignKeyViolation {
                    operation: operation.to_string(),
                    message,
                },
                _ => PersistenceError::Query {
                    operation: operation.to_string(),
                    message,
                },
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            PersistenceError::Connection(format!("{operation}: {err}"))
        }
        other => PersistenceError::Query {
            operation: operation.to_string(),
            message: other.to_string(),
        },
    }
}
