//! Administrative operations: create, drop and look up databases.
//!
//! `DatabaseAdmin` is derived from a [`Fixture`](crate::Fixture) and borrows
//! its connection, so it can never outlive it.

use anyhow::Result;
use serde::Serialize;
use tokio_postgres::error::SqlState;
use tokio_postgres::Client;

use crate::config::FixtureConfig;
use crate::redact::redact_statement;
use crate::session::Session;
use crate::sql::quote_ident;

/// Result of a strict drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropOutcome {
    Dropped,
    NotFound,
}

/// SQLSTATE of a service error, if `err` wraps one.
pub fn sql_state(err: &anyhow::Error) -> Option<&SqlState> {
    err.downcast_ref::<tokio_postgres::Error>()
        .and_then(|e| e.code())
}

/// True if `err` is the service reporting that a database does not exist.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    sql_state(err) == Some(&SqlState::INVALID_CATALOG_NAME)
}

pub struct DatabaseAdmin<'f> {
    client: &'f Client,
    config: &'f FixtureConfig,
}

impl<'f> DatabaseAdmin<'f> {
    pub(crate) fn new(client: &'f Client, config: &'f FixtureConfig) -> Self {
        Self { client, config }
    }

    /// Create database `name` and apply `ddl` to it, in order.
    ///
    /// Returns once every statement has been applied. Statements are sent one
    /// at a time, outside any transaction, and the first failure stops the
    /// list. Whatever was created before it, the database included, is left
    /// behind for the caller to drop.
    pub async fn create_database<I, S>(&self, name: &str, ddl: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.create_empty_database(name).await?;
        self.apply_ddl(name, ddl).await
    }

    /// `CREATE DATABASE` alone. Fails if `name` is taken.
    pub(crate) async fn create_empty_database(&self, name: &str) -> Result<()> {
        tracing::info!(
            database = name,
            instance = %self.config.instance_id,
            "creating database"
        );
        let create_sql = format!("CREATE DATABASE {}", quote_ident(name));
        self.client.batch_execute(&create_sql).await?;
        Ok(())
    }

    /// Run `ddl` in order against the existing database `name`.
    pub(crate) async fn apply_ddl<I, S>(&self, name: &str, ddl: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let statements: Vec<S> = ddl.into_iter().collect();
        if statements.is_empty() {
            return Ok(());
        }

        let session = Session::connect(&self.config.database_pg_config(name)?).await?;
        let applied = run_statements(session.client(), &statements).await;
        session.close().await;
        applied?;

        tracing::info!(
            database = name,
            statements = statements.len(),
            "schema applied"
        );
        Ok(())
    }

    /// Drop database `name`, ignoring every failure.
    ///
    /// A missing database is a no-op. Other errors are swallowed too but
    /// logged at `warn`; use [`try_drop_database`](Self::try_drop_database)
    /// to see them.
    pub async fn drop_database(&self, name: &str) {
        match self.try_drop_database(name).await {
            Ok(DropOutcome::Dropped) => {}
            Ok(DropOutcome::NotFound) => {
                tracing::debug!(database = name, "database does not exist, nothing to drop");
            }
            Err(e) => {
                tracing::warn!(database = name, error = %format!("{e:#}"), "ignoring drop failure");
            }
        }
    }

    /// Drop database `name`; only "does not exist" is treated as success.
    pub async fn try_drop_database(&self, name: &str) -> Result<DropOutcome> {
        drop_database_with(self.client, name).await
    }

    pub async fn database_exists(&self, name: &str) -> Result<bool> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1) AS exists",
                &[&name],
            )
            .await?;
        Ok(row.get("exists"))
    }
}

async fn run_statements<S: AsRef<str>>(client: &Client, statements: &[S]) -> Result<()> {
    for stmt in statements {
        tracing::debug!(statement = %redact_statement(stmt.as_ref()), "applying DDL");
        client.batch_execute(stmt.as_ref()).await?;
    }
    Ok(())
}

/// Drop `name` using an already open administrative connection.
pub(crate) async fn drop_database_with(client: &Client, name: &str) -> Result<DropOutcome> {
    // Open sessions (e.g. live batch clients) would block the drop
    if let Err(e) = client
        .execute(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
             WHERE datname = $1 AND pid <> pg_backend_pid()",
            &[&name],
        )
        .await
    {
        tracing::debug!(database = name, error = %e, "could not terminate sessions");
    }

    let drop_sql = format!("DROP DATABASE {}", quote_ident(name));
    match client.batch_execute(&drop_sql).await {
        Ok(()) => {
            tracing::info!(database = name, "database dropped");
            Ok(DropOutcome::Dropped)
        }
        Err(e) if e.code() == Some(&SqlState::INVALID_CATALOG_NAME) => Ok(DropOutcome::NotFound),
        Err(e) => Err(e.into()),
    }
}
