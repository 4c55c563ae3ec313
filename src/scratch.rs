//! Uniquely named databases that clean up after themselves.

use anyhow::Result;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use crate::admin::{drop_database_with, DropOutcome};
use crate::batch::BatchClient;
use crate::database_id::DatabaseId;
use crate::fixture::Fixture;
use crate::session::Session;

static SCRATCH_COUNTER: AtomicU32 = AtomicU32::new(0);
static RUN_STAMP: OnceLock<String> = OnceLock::new();

/// Start of this run in milliseconds, base 36. Separates runs that reuse a pid.
fn run_stamp() -> &'static str {
    RUN_STAMP.get_or_init(|| {
        let mut millis = chrono::Utc::now().timestamp_millis().unsigned_abs();
        let mut digits = Vec::new();
        loop {
            digits.push(std::char::from_digit((millis % 36) as u32, 36).unwrap_or('0'));
            millis /= 36;
            if millis == 0 {
                break;
            }
        }
        digits.iter().rev().collect()
    })
}

/// `{prefix}_{pid}_{run}_{n}`. The pid and run stamp tell concurrent and
/// successive runs apart; the counter tells names within a run apart.
/// Creating a database under a name that is still taken fails rather than
/// touching the existing one.
pub fn unique_name(prefix: &str) -> String {
    let count = SCRATCH_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}_{}_{}_{}", prefix, std::process::id(), run_stamp(), count)
}

/// A database created by [`Fixture::scratch_database`] or
/// [`Fixture::scratch_database_named`].
///
/// Call [`release`](Self::release) to drop it and see the outcome. If the
/// guard is simply dropped, the database is dropped best-effort and errors
/// are ignored.
pub struct ScratchDatabase<'f> {
    fixture: &'f Fixture,
    name: String,
    admin_pg: tokio_postgres::Config,
    released: bool,
}

impl<'f> ScratchDatabase<'f> {
    pub(crate) fn new(fixture: &'f Fixture, name: String, admin_pg: tokio_postgres::Config) -> Self {
        Self {
            fixture,
            name,
            admin_pg,
            released: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> DatabaseId {
        self.fixture.database_id(&self.name)
    }

    pub fn batch_client(&self) -> BatchClient<'f> {
        self.fixture.batch_client(&self.name)
    }

    /// Drop the database now, reporting any failure other than "not found".
    pub async fn release(mut self) -> Result<DropOutcome> {
        self.released = true;
        self.fixture.try_drop_database(&self.name).await
    }
}

impl Drop for ScratchDatabase<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Drop can't await, so run the cleanup on its own runtime and thread
        let name = std::mem::take(&mut self.name);
        let admin_pg = self.admin_pg.clone();

        std::thread::spawn(move || {
            let Ok(runtime) = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            else {
                return;
            };
            runtime.block_on(async move {
                let session = match Session::connect(&admin_pg).await {
                    Ok(session) => session,
                    Err(e) => {
                        tracing::warn!(database = %name, error = %e, "scratch cleanup could not connect");
                        return;
                    }
                };
                // Give batch clients dropped just before us a moment to disconnect
                tokio::time::sleep(Duration::from_millis(50)).await;
                if let Err(e) = drop_database_with(session.client(), &name).await {
                    tracing::warn!(database = %name, error = %format!("{e:#}"), "scratch cleanup failed");
                }
                session.close().await;
            });
        })
        .join()
        .ok();
    }
}
