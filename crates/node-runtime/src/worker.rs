//! # Inbound Worker
//!
//! Funnels submissions from any number of network tasks into one task that
//! owns the write side of the engine. Callers get the outcome back on a
//! oneshot channel. The engine itself is synchronous and runs on the
//! blocking pool, one submission at a time.

use ds_consensus::{ConsensusApi, SubmitOutcome};
use shared_types::{Block, BlockHeader, PeerId};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info};

/// A submission waiting for the engine.
#[derive(Debug)]
pub enum Inbound {
    Header {
        header: BlockHeader,
        peer: PeerId,
        reply: oneshot::Sender<SubmitOutcome>,
    },
    Block {
        block: Block,
        peer: PeerId,
        reply: oneshot::Sender<SubmitOutcome>,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("inbound worker has stopped")]
    Stopped,
}

/// Cloneable sender side of the worker.
#[derive(Clone)]
pub struct InboundHandle {
    tx: mpsc::Sender<Inbound>,
}

impl InboundHandle {
    pub async fn submit_header(
        &self,
        header: BlockHeader,
        peer: PeerId,
    ) -> Result<SubmitOutcome, WorkerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Inbound::Header {
                header,
                peer,
                reply,
            })
            .await
            .map_err(|_| WorkerError::Stopped)?;
        rx.await.map_err(|_| WorkerError::Stopped)
    }

    pub async fn submit_block(&self, block: Block, peer: PeerId) -> Result<SubmitOutcome, WorkerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Inbound::Block { block, peer, reply })
            .await
            .map_err(|_| WorkerError::Stopped)?;
        rx.await.map_err(|_| WorkerError::Stopped)
    }
}

/// Single consumer of the inbound queue.
pub struct InboundWorker<A: ConsensusApi> {
    engine: Arc<A>,
    rx: mpsc::Receiver<Inbound>,
}

impl<A: ConsensusApi + 'static> InboundWorker<A> {
    /// Create a worker with a queue of `capacity` pending submissions.
    pub fn new(engine: Arc<A>, capacity: usize) -> (Self, InboundHandle) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { engine, rx }, InboundHandle { tx })
    }

    /// Process submissions until every handle is dropped or `shutdown`
    /// flips to true. Returns the number of submissions handled.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> u64 {
        info!("Inbound worker started");
        let mut handled = 0u64;

        loop {
            tokio::select! {
                message = self.rx.recv() => {
                    let Some(message) = message else { break };
                    self.handle(message).await;
                    handled += 1;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Inbound worker shutdown signal received");
                        break;
                    }
                }
            }
        }

        info!(handled, "Inbound worker stopped");
        handled
    }

    async fn handle(&self, message: Inbound) {
        let engine = Arc::clone(&self.engine);
        let (outcome, reply) = match message {
            Inbound::Header {
                header,
                peer,
                reply,
            } => (
                tokio::task::spawn_blocking(move || engine.submit_header(header, &peer)).await,
                reply,
            ),
            Inbound::Block { block, peer, reply } => (
                tokio::task::spawn_blocking(move || engine.submit_block(block, &peer)).await,
                reply,
            ),
        };

        match outcome {
            Ok(outcome) => {
                if reply.send(outcome).is_err() {
                    debug!("Submitter went away before the outcome was ready");
                }
            }
            // dropping `reply` reports the worker as stopped to the submitter
            Err(e) => error!(error = %e, "Engine task failed"),
        }
    }
}
