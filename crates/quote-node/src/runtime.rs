//! Wiring of one cluster member

use crate::config::NodeConfig;
use anyhow::{Context, Result};
use axum::Router;
use quote_cluster::{election_router, ElectionEngine, NodeIdentity};
use quote_ingest::{
    create_fetcher, create_store, quote_router, HttpQuoteRelay, QuotePipeline, QuoteProducer,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info};

const RELAY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct QuoteNode {
    config: NodeConfig,
    engine: ElectionEngine,
    pipeline: QuotePipeline,
    relay: HttpQuoteRelay,
    producer: Arc<QuoteProducer>,
}

impl QuoteNode {
    pub fn build(config: NodeConfig) -> Result<Self> {
        let identity = NodeIdentity::capture(config.cluster.node_id.clone());
        info!(
            "Node {} born at {} with peers {:?}",
            identity.id(),
            identity.birth_time(),
            config.cluster.peers
        );

        let store = create_store(&config.ingest.storage).context("Failed to open quote store")?;
        let fetcher = create_fetcher(&config.ingest).context("Failed to create quote fetcher")?;
        let engine =
            ElectionEngine::with_http(identity, &config.cluster).context("Failed to create election engine")?;

        let pipeline = QuotePipeline::new(Arc::new(engine.clone()), store);
        let relay = HttpQuoteRelay::new(engine.clone(), config.ingest.queue.clone(), RELAY_TIMEOUT)
            .context("Failed to create quote relay")?;
        let producer = Arc::new(QuoteProducer::new(
            engine.clone(),
            fetcher,
            Arc::new(relay.clone()),
            config.ingest.ticker.clone(),
        ));

        Ok(Self {
            config,
            engine,
            pipeline,
            relay,
            producer,
        })
    }

    pub fn engine(&self) -> &ElectionEngine {
        &self.engine
    }

    /// Status, election and quote routes of this node
    pub fn router(&self) -> Router {
        election_router(&self.engine).merge(quote_router(self.pipeline.clone()))
    }

    /// Start the producer, relay and leader ping loops
    pub fn spawn_background(&self) -> Vec<JoinHandle<()>> {
        let producer = Arc::clone(&self.producer);
        let initial_delay = self.config.ingest.initial_fetch_delay();
        let fetch_interval = self.config.ingest.fetch_interval();
        let producer_task = tokio::spawn(async move {
            producer.run(initial_delay, fetch_interval).await;
        });

        let relay = self.relay.clone();
        let relay_task = tokio::spawn(async move {
            relay.run().await;
        });

        let engine = self.engine.clone();
        let period = self.config.cluster.ping_interval();
        let ping_task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if let Some(outcome) = engine.ping_leader().await {
                    debug!("Liveness ping of {} ended in {:?}", engine.my_id(), outcome);
                }
            }
        });

        vec![producer_task, relay_task, ping_task]
    }

    /// Serve until `shutdown` resolves, then stop every background task
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let bind_address = self.config.server.bind_address.clone();
        let listener = TcpListener::bind(&bind_address)
            .await
            .with_context(|| format!("Failed to bind {}", bind_address))?;
        info!("Node {} listening on {}", self.engine.my_id(), bind_address);

        let app = self.router();
        self.engine.start();
        let tasks = self.spawn_background();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server failed")?;

        info!("Stopping node {}", self.engine.my_id());
        self.engine.shutdown();
        self.relay.outbox().close();
        for task in tasks {
            task.abort();
        }
        Ok(())
    }
}
