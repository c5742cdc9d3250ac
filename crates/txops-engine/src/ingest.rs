//! Bounded ingest: state machine in front, sharded workers behind.
//!
//! Facts are sharded to workers by user id. A shard's queue slot is reserved
//! before the state machine runs, so a full queue rejects the event without
//! touching any state, and a user's facts are queued in apply order.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use txops_core::{TransactionEvent, TransactionStatusChanged, UserId};
use txops_lifecycle::TransactionStateMachine;
use txops_risk::validate_event_score;
use txops_telemetry::Metrics;

use crate::error::{IngestError, IngestResult};
use crate::stages::FanOut;

pub(crate) enum WorkItem {
    Fact(Box<TransactionStatusChanged>),
    /// Completed once every item queued before it has been processed.
    Barrier(oneshot::Sender<()>),
}

pub struct IngestPipeline {
    machine: Arc<TransactionStateMachine>,
    shards: Vec<Mutex<mpsc::Sender<WorkItem>>>,
    capacity: usize,
}

impl IngestPipeline {
    /// Spawn `workers` tasks, each draining a queue of `capacity` items.
    pub fn spawn(
        machine: Arc<TransactionStateMachine>,
        fan_out: Arc<FanOut>,
        workers: usize,
        capacity: usize,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let workers = workers.max(1);
        let capacity = capacity.max(1);
        let mut shards = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for worker in 0..workers {
            let (tx, rx) = mpsc::channel(capacity);
            shards.push(Mutex::new(tx));
            handles.push(tokio::spawn(run_worker(worker, rx, Arc::clone(&fan_out))));
        }
        info!(workers, capacity, "Ingest pipeline started");

        (
            Self {
                machine,
                shards,
                capacity,
            },
            handles,
        )
    }

    pub fn machine(&self) -> &Arc<TransactionStateMachine> {
        &self.machine
    }

    pub fn workers(&self) -> usize {
        self.shards.len()
    }

    fn shard_for(&self, user_id: UserId) -> usize {
        (user_id.get() % self.shards.len() as u64) as usize
    }

    /// Validate, apply and enqueue one lifecycle event.
    ///
    /// Re-delivery of a status the transaction already holds is accepted as a
    /// no-op. Any error leaves the state machine untouched.
    pub fn submit_transaction_event(&self, event: TransactionEvent) -> IngestResult<()> {
        match self.try_submit(&event) {
            Ok(()) => {
                Metrics::ingest_accepted(event.status.as_str());
                Ok(())
            }
            Err(IngestError::Validation(e)) if e.is_duplicate() => {
                Metrics::stage_duplicate("ingest");
                debug!(id = %event.id, status = %event.status, "Duplicate terminal event ignored");
                Ok(())
            }
            Err(e) => {
                Metrics::ingest_rejected(e.reason());
                debug!(id = %event.id, error = %e, "Event rejected");
                Err(e)
            }
        }
    }

    fn try_submit(&self, event: &TransactionEvent) -> IngestResult<()> {
        validate_event_score(event)?;

        let worker = self.shard_for(event.user_id);
        let sender = self.shards[worker].lock();
        let permit = match sender.try_reserve() {
            Ok(permit) => permit,
            Err(TrySendError::Full(())) => {
                return Err(IngestError::Capacity {
                    worker,
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Closed(())) => return Err(IngestError::Stopped),
        };

        // An error here drops the permit unused.
        let transition = self.machine.apply(event)?;
        if let Some(fact) = transition.fact {
            permit.send(WorkItem::Fact(Box::new(fact)));
        }
        Metrics::queue_depth(worker, sender.max_capacity() - sender.capacity());
        Ok(())
    }

    /// Wait until every fact queued before this call has been processed.
    pub async fn flush(&self) -> IngestResult<()> {
        let mut pending = Vec::with_capacity(self.shards.len());
        for shard in &self.shards {
            let sender = shard.lock().clone();
            let (done_tx, done_rx) = oneshot::channel();
            sender
                .send(WorkItem::Barrier(done_tx))
                .await
                .map_err(|_| IngestError::Stopped)?;
            pending.push(done_rx);
        }
        for done in pending {
            done.await.map_err(|_| IngestError::Stopped)?;
        }
        Ok(())
    }
}

async fn run_worker(worker: usize, mut rx: mpsc::Receiver<WorkItem>, fan_out: Arc<FanOut>) {
    debug!(worker, "Ingest worker started");
    while let Some(item) = rx.recv().await {
        match item {
            WorkItem::Fact(fact) => fan_out.apply(&fact).await,
            WorkItem::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!(worker, "Ingest worker stopped");
}
