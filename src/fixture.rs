//! The database test fixture.
//!
//! A [`Fixture`] owns one administrative connection to the service for the
//! duration of a test run. Everything it hands out (the admin sub-client,
//! batch clients, scratch databases) borrows it, so none of it can outlive
//! the connection.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use dbfixture::{Fixture, FixtureConfig};
//!
//! let fixture = Fixture::setup(FixtureConfig::default()).await?;
//! fixture
//!     .create_database("d1", ["CREATE TABLE t (id BIGINT PRIMARY KEY)"])
//!     .await?;
//! let rows = fixture.batch_client("d1").query("SELECT id FROM t", &[]).await?;
//! assert!(rows.is_empty());
//! fixture.drop_database("d1").await;
//! fixture.teardown().await;
//! # Ok(())
//! # }
//! ```
//!
//! Dropping a fixture releases its connection just like `teardown`, so an
//! early `?` return or a panic never leaks it.

use anyhow::Result;

use crate::admin::{DatabaseAdmin, DropOutcome};
use crate::batch::BatchClient;
use crate::config::FixtureConfig;
use crate::database_id::DatabaseId;
use crate::scratch::ScratchDatabase;
use crate::session::Session;

pub struct Fixture {
    config: FixtureConfig,
    admin_pg: tokio_postgres::Config,
    session: Session,
}

impl Fixture {
    /// Open the administrative connection. Connection errors propagate; no retry.
    pub async fn setup(config: FixtureConfig) -> Result<Self> {
        let admin_pg = config.admin_pg_config()?;

        tracing::info!(
            project = %config.project_id,
            instance = %config.instance_id,
            host = %config.redacted_host(),
            "connecting to service"
        );
        let session = Session::connect(&admin_pg).await?;

        Ok(Self {
            config,
            admin_pg,
            session,
        })
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    /// Admin sub-client for create/drop.
    pub fn admin(&self) -> DatabaseAdmin<'_> {
        DatabaseAdmin::new(self.session.client(), &self.config)
    }

    /// Identifier of database `name` in the configured project and instance.
    pub fn database_id(&self, name: &str) -> DatabaseId {
        DatabaseId::new(&self.config.project_id, &self.config.instance_id, name)
    }

    /// Create database `name` with the ordered `ddl`, waiting for completion.
    ///
    /// Service errors (duplicate database, bad DDL) come back unchanged;
    /// see [`crate::admin::sql_state`]. Nothing is cleaned up on failure.
    pub async fn create_database<I, S>(&self, name: &str, ddl: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.admin().create_database(name, ddl).await
    }

    /// Drop database `name`. Never fails; see [`DatabaseAdmin::drop_database`].
    pub async fn drop_database(&self, name: &str) {
        self.admin().drop_database(name).await
    }

    pub async fn try_drop_database(&self, name: &str) -> Result<DropOutcome> {
        self.admin().try_drop_database(name).await
    }

    pub async fn database_exists(&self, name: &str) -> Result<bool> {
        self.admin().database_exists(name).await
    }

    /// Query client for database `name`. Does no I/O and doesn't check that
    /// the database exists; a fresh client is returned on every call.
    pub fn batch_client(&self, name: &str) -> BatchClient<'_> {
        let mut pg = self.admin_pg.clone();
        pg.dbname(name);
        BatchClient::new(self.database_id(name), pg)
    }

    /// Create a uniquely named database with `ddl`, dropped when the guard is.
    pub async fn scratch_database<I, S>(&self, ddl: I) -> Result<ScratchDatabase<'_>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = crate::scratch::unique_name(&self.config.scratch_prefix);
        self.scratch_database_named(&name, ddl).await
    }

    /// Like [`scratch_database`](Self::scratch_database) with a caller-chosen
    /// name. If `name` is already taken the existing database is left alone.
    pub async fn scratch_database_named<I, S>(
        &self,
        name: &str,
        ddl: I,
    ) -> Result<ScratchDatabase<'_>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let admin = self.admin();
        admin.create_empty_database(name).await?;

        // From here on the database is ours; don't leave a half-built one behind
        if let Err(e) = admin.apply_ddl(name, ddl).await {
            admin.drop_database(name).await;
            return Err(e);
        }
        Ok(ScratchDatabase::new(self, name.to_string(), self.admin_pg.clone()))
    }

    /// Close the administrative connection and wait for it to shut down.
    pub async fn teardown(self) {
        tracing::info!(instance = %self.config.instance_id, "closing service connection");
        self.session.close().await;
    }
}
