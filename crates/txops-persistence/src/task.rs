//! Dedicated writer task owning the [`JsonLinesLog`].

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use txops_core::TransactionStatusChanged;
use txops_telemetry::Metrics;

use crate::error::{PersistenceError, PersistenceResult};
use crate::record::LogRecord;
use crate::writer::JsonLinesLog;

enum LogCommand {
    Append(Box<LogRecord>),
    Flush(oneshot::Sender<PersistenceResult<()>>),
}

/// Cheap, cloneable sender side of the writer task.
///
/// Appends from one sender are written in send order, so a worker that logs
/// its facts in apply order keeps per-entity order on disk.
#[derive(Clone)]
pub struct LogHandle {
    tx: mpsc::Sender<LogCommand>,
}

impl LogHandle {
    /// Queue a fact for writing. Waits while the writer queue is full.
    pub async fn append(&self, fact: TransactionStatusChanged) -> PersistenceResult<()> {
        self.tx
            .send(LogCommand::Append(Box::new(LogRecord::new(fact))))
            .await
            .map_err(|_| PersistenceError::WriterClosed)
    }

    /// Flush everything queued before this call to disk.
    pub async fn flush(&self) -> PersistenceResult<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(LogCommand::Flush(reply_tx))
            .await
            .map_err(|_| PersistenceError::WriterClosed)?;
        reply_rx.await.map_err(|_| PersistenceError::WriterClosed)?
    }
}

fn flush_and_count(log: &mut JsonLinesLog) -> PersistenceResult<()> {
    let pending = log.pending();
    if pending == 0 {
        return Ok(());
    }
    let result = log.flush();
    Metrics::log_append(result.is_ok());
    result
}

/// Spawn the writer task.
///
/// The task flushes on every `flush_interval` tick and closes the log once all
/// handles are dropped.
pub fn spawn_log_writer(
    mut log: JsonLinesLog,
    capacity: usize,
    flush_interval: Duration,
) -> (LogHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<LogCommand>(capacity.max(1));

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(flush_interval);
        info!(dir = %log.base_dir().display(), "Fact log writer started");

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(LogCommand::Append(record)) => {
                        if let Err(e) = log.add_record(*record) {
                            Metrics::log_append(false);
                            warn!(?e, pending = log.pending(), "Fact log write failed, will retry");
                        }
                    }
                    Some(LogCommand::Flush(reply)) => {
                        let _ = reply.send(flush_and_count(&mut log));
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if let Err(e) = flush_and_count(&mut log) {
                        warn!(?e, pending = log.pending(), "Periodic fact log flush failed");
                    }
                }
            }
        }

        if let Err(e) = log.close() {
            warn!(?e, "Failed to close fact log");
        }
        info!("Fact log writer stopped");
    });

    (LogHandle { tx }, handle)
}
