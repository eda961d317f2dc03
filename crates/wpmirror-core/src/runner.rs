//! Process schedules
//!
//! Wires the sync engine and the WebSocket server together. The server's
//! accept loop runs as its own task; the sync loop runs rounds back to back,
//! broadcasting after each one and sleeping in between:
//!
//! - `update_period` once the mirror holds every remote post,
//! - `retry_delay` while it is still catching up.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info};

use crate::config::Config;
use crate::server::{Broadcaster, Server};
use crate::store::PostStore;
use crate::sync::{ContentFetcher, HttpFetcher, RoundReport, SyncEngine};

/// Sync loop: round, broadcast, sleep
pub struct SyncLoop<F> {
    engine: SyncEngine<F>,
    broadcaster: Broadcaster,
    update_period: Duration,
    retry_delay: Duration,
    ready: bool,
}

impl<F: ContentFetcher> SyncLoop<F> {
    pub fn new(engine: SyncEngine<F>, broadcaster: Broadcaster, config: &Config) -> Self {
        Self {
            engine,
            broadcaster,
            update_period: config.update_period(),
            retry_delay: config.retry_delay(),
            ready: false,
        }
    }

    pub fn engine(&self) -> &SyncEngine<F> {
        &self.engine
    }

    /// Run one round and broadcast; returns the report and how long to sleep
    pub async fn tick(&mut self) -> (RoundReport, Duration) {
        let report = self.engine.run_round().await;
        log_report(&report);

        let ledger = self.broadcaster.broadcast_changes();
        debug!("Broadcast to {} client(s)", ledger.clients);

        let ready = self.engine.is_ready();
        if ready && !self.ready {
            info!(
                "Mirror caught up: {} post(s) stored",
                self.engine.store().count()
            );
        }
        self.ready = ready;

        let pause = if ready {
            self.update_period
        } else {
            self.retry_delay
        };
        (report, pause)
    }

    /// Loop until `shutdown` completes
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        loop {
            let (_, pause) = tokio::select! {
                result = self.tick() => result,
                _ = &mut shutdown => break,
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = &mut shutdown => break,
            }
        }

        info!("Sync loop stopped");
    }
}

fn log_report(report: &RoundReport) {
    info!(
        "Round: {} task(s), {} ok, {} failed, {} upserted, {} purged in {:?}{}",
        report.dispatched,
        report.succeeded,
        report.failed,
        report.upserted,
        report.purged,
        report.elapsed,
        if report.pass_complete {
            ", pass complete"
        } else {
            ""
        }
    );
}

/// Bind the server, start both schedules and run until `shutdown` completes
pub async fn serve(config: &Config, shutdown: impl Future<Output = ()>) -> Result<()> {
    let store = PostStore::new();
    let server = Server::bind(config, store.clone()).await?;
    let broadcaster = server.broadcaster();

    let fetcher = HttpFetcher::new(config)?;
    info!(
        "Mirroring {} ({} per page, {} worker(s))",
        fetcher.url(),
        config.per_page,
        config.workers
    );

    let engine = SyncEngine::new(fetcher, store, config);
    let accept = tokio::spawn(server.serve());

    SyncLoop::new(engine, broadcaster, config).run(shutdown).await;

    accept.abort();
    Ok(())
}
