//! Owned connections to the service.
//!
//! A `Session` owns a tokio_postgres `Client` together with the spawned task
//! that drives its connection. Dropping the session stops that task; `close`
//! does the same and waits for the task to finish.

use anyhow::Result;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, Config, NoTls};

pub struct Session {
    client: Client,
    /// Signals the connection task to stop (fires on drop)
    shutdown_tx: oneshot::Sender<()>,
    connection_task: JoinHandle<()>,
}

impl Session {
    /// Connect with `pg`. Errors are the service's own, without added context.
    pub async fn connect(pg: &Config) -> Result<Self> {
        let (client, connection) = pg.connect(NoTls).await?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        // Exits when the client goes away, the server hangs up, or on shutdown
        let connection_task = tokio::spawn(async move {
            tokio::select! {
                result = connection => {
                    if let Err(e) = result {
                        tracing::debug!(error = %e, "connection closed with error");
                    }
                }
                _ = shutdown_rx => {}
            }
        });

        Ok(Self {
            client,
            shutdown_tx,
            connection_task,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Close the connection and wait for its task to exit.
    pub async fn close(self) {
        let Session {
            client,
            shutdown_tx,
            connection_task,
        } = self;
        drop(client);
        let _ = shutdown_tx.send(());
        let _ = connection_task.await;
    }
}
