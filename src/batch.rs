//! Read-only query client bound to one database.

use anyhow::Result;
use std::marker::PhantomData;
use tokio::sync::OnceCell;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Config, Row};

use crate::database_id::DatabaseId;
use crate::fixture::Fixture;
use crate::session::Session;

/// Query client for the database named by its [`DatabaseId`].
///
/// Creating one does no I/O. The connection is opened on the first query, so
/// a missing or unreachable database only shows up then. Sessions are
/// read-only (`default_transaction_read_only=on`).
///
/// Borrows the fixture it came from and must be dropped before it.
pub struct BatchClient<'f> {
    id: DatabaseId,
    pg: Config,
    session: OnceCell<Session>,
    _fixture: PhantomData<&'f Fixture>,
}

impl<'f> BatchClient<'f> {
    pub(crate) fn new(id: DatabaseId, mut pg: Config) -> Self {
        let options = read_only_options(pg.get_options());
        pg.options(&options);
        Self {
            id,
            pg,
            session: OnceCell::new(),
            _fixture: PhantomData,
        }
    }

    pub fn id(&self) -> &DatabaseId {
        &self.id
    }

    /// Whether the first query has already opened a connection.
    pub fn is_connected(&self) -> bool {
        self.session.initialized()
    }

    pub async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>> {
        let session = self.session().await?;
        Ok(session.client().query(sql, params).await?)
    }

    pub async fn query_one(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Row> {
        let session = self.session().await?;
        Ok(session.client().query_one(sql, params).await?)
    }

    async fn session(&self) -> Result<&Session> {
        self.session
            .get_or_try_init(|| async {
                tracing::debug!(database = %self.id, "opening batch client session");
                Session::connect(&self.pg).await
            })
            .await
    }
}

/// Startup options forcing read-only sessions, keeping any already set.
fn read_only_options(existing: Option<&str>) -> String {
    const READ_ONLY: &str = "-c default_transaction_read_only=on";
    match existing.map(str::trim) {
        Some(options) if !options.is_empty() => format!("{} {}", options, READ_ONLY),
        _ => READ_ONLY.to_string(),
    }
}
