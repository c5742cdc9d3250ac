//! Main application orchestration.
//!
//! Wires the components together and owns the background tasks:
//! - ingest workers (fan-out to aggregators and the fraud stage)
//! - fact log writer, with replay at startup
//! - review dispatcher
//! - threshold reload, timeout sweep, retention pruning
//! - periodic telemetry summary and the query server

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval};
use tracing::{error, info, warn};

use txops_aggregator::{HourlyAggregator, UserStatsAggregator};
use txops_core::TransactionEvent;
use txops_detector::BottleneckClassifier;
use txops_lifecycle::TransactionStateMachine;
use txops_persistence::{replay, spawn_log_writer, JsonLinesLog, LogHandle};
use txops_query::{run_server, QueryFacade};
use txops_registry::{ConfigRegistry, ConfigSnapshot};
use txops_risk::{ChannelReviewSink, FraudStage, ReviewRequest};
use txops_telemetry::{Metrics, SummaryReporter};

use crate::config::AppConfig;
use crate::error::{EngineResult, IngestResult};
use crate::ingest::IngestPipeline;
use crate::stages::FanOut;

/// Terminal records are kept this long for duplicate detection.
const TERMINAL_RECORD_TTL_HOURS: i64 = 24;

/// Daily spend is kept for the current and the previous day.
const DAILY_SPEND_KEEP_DAYS: i64 = 1;

/// Outcome of a threshold reload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Applied,
    Unchanged,
    /// Reload failed; the last-known-good snapshot stays in place.
    Failed,
}

impl ReloadOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Unchanged => "unchanged",
            Self::Failed => "failed",
        }
    }
}

/// Main application.
pub struct Application {
    config: AppConfig,
    registry: Arc<ConfigRegistry>,
    users: Arc<UserStatsAggregator>,
    hourly: Arc<HourlyAggregator>,
    classifier: Arc<BottleneckClassifier>,
    fraud: Arc<FraudStage>,
    pipeline: IngestPipeline,
    workers: Vec<JoinHandle<()>>,
    log: Option<LogHandle>,
    log_task: Option<JoinHandle<()>>,
    review_task: JoinHandle<()>,
    summary: SummaryReporter,
}

impl Application {
    /// Build every component, replay the fact log and start the workers.
    pub async fn start(config: AppConfig) -> EngineResult<Self> {
        config.validate()?;

        let registry = Arc::new(match &config.registry.threshold_file {
            Some(path) => ConfigRegistry::load(path)?,
            None => {
                info!("No threshold file configured, using built-in thresholds");
                ConfigRegistry::with_defaults()
            }
        });
        Metrics::config_version(registry.version());

        let classifier = Arc::new(BottleneckClassifier::new(config.classifier)?);
        let hourly = Arc::new(HourlyAggregator::new(config.aggregator.retention_hours));
        let users = Arc::new(UserStatsAggregator::new());
        let machine = Arc::new(TransactionStateMachine::new());

        let (sink, review_rx) = ChannelReviewSink::channel(config.review.queue_capacity);
        let fraud = Arc::new(FraudStage::new(Arc::new(sink)));
        let review_task = spawn_review_dispatcher(review_rx);

        let (log, log_task) = if config.persistence.enabled {
            let writer = JsonLinesLog::new(&config.persistence.data_dir, config.persistence.buffer_size)?;
            let (handle, task) = spawn_log_writer(
                writer,
                config.persistence.queue_capacity,
                Duration::from_millis(config.persistence.flush_interval_ms),
            );
            (Some(handle), Some(task))
        } else {
            (None, None)
        };

        let fan_out = Arc::new(FanOut::new(
            Arc::clone(&registry),
            Arc::clone(&users),
            Arc::clone(&hourly),
            Arc::clone(&fraud),
            Arc::clone(&classifier),
            log.clone(),
        ));

        if config.persistence.enabled && config.persistence.replay_on_start {
            let report = replay(&config.persistence.data_dir)?;
            let mut applied = 0usize;
            for record in &report.records {
                // Facts that do not move a record forward were already seen.
                if machine.restore(&record.fact) {
                    fan_out.restore(&record.fact);
                    applied += 1;
                }
            }
            info!(
                files = report.files,
                records = report.records.len(),
                applied,
                corrupt_lines = report.corrupt_lines,
                open = machine.open_count(),
                "Fact log replayed"
            );
        }
        Metrics::open_transactions(machine.open_count());
        Metrics::active_buckets(hourly.len());

        let (pipeline, workers) = IngestPipeline::spawn(
            machine,
            fan_out,
            config.ingest.workers,
            config.ingest.queue_capacity,
        );

        info!(
            workers = config.ingest.workers,
            thresholds_version = registry.version(),
            persistence = config.persistence.enabled,
            "Application started"
        );

        Ok(Self {
            config,
            registry,
            users,
            hourly,
            classifier,
            fraud,
            pipeline,
            workers,
            log,
            log_task,
            review_task,
            summary: SummaryReporter::new(),
        })
    }

    pub fn submit_transaction_event(&self, event: TransactionEvent) -> IngestResult<()> {
        self.pipeline.submit_transaction_event(event)
    }

    pub fn query(&self) -> QueryFacade {
        QueryFacade::new(
            Arc::clone(&self.hourly),
            Arc::clone(&self.users),
            Arc::clone(&self.classifier),
            ChronoDuration::hours(self.config.query.max_window_hours),
        )
    }

    pub fn registry(&self) -> &Arc<ConfigRegistry> {
        &self.registry
    }

    pub fn machine(&self) -> &Arc<TransactionStateMachine> {
        self.pipeline.machine()
    }

    pub fn fraud(&self) -> &Arc<FraudStage> {
        &self.fraud
    }

    /// Wait for queued facts to be processed and logged.
    pub async fn flush(&self) -> EngineResult<()> {
        self.pipeline.flush().await?;
        if let Some(log) = &self.log {
            log.flush().await?;
        }
        Ok(())
    }

    /// Fail open transactions older than the configured timeout.
    ///
    /// The synthetic events go through normal ingest; any that are rejected
    /// (e.g. queue full) are picked up by the next sweep.
    pub fn sweep_timeouts(&self, now: DateTime<Utc>) -> usize {
        let timeout = ChronoDuration::seconds(self.registry.snapshot().transaction_timeout_seconds());
        let mut swept = 0usize;
        for event in self.machine().sweep_timeouts(now, timeout) {
            let id = event.id;
            match self.submit_transaction_event(event) {
                Ok(()) => swept += 1,
                Err(e) => warn!(%id, error = %e, "Timeout event not accepted"),
            }
        }
        Metrics::timeouts_swept(swept);
        Metrics::open_transactions(self.machine().open_count());
        swept
    }

    /// Drop expired buckets, old terminal records and stale daily spend.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let buckets = self.hourly.prune(now);
        Metrics::buckets_pruned(buckets);
        Metrics::active_buckets(self.hourly.len());

        let records = self
            .machine()
            .prune_terminal(now - ChronoDuration::hours(TERMINAL_RECORD_TTL_HOURS));
        let risk = self
            .fraud
            .prune((now - ChronoDuration::days(DAILY_SPEND_KEEP_DAYS)).date_naive());
        if records > 0 || risk > 0 {
            info!(records, risk_entries = risk, "Pruned lifecycle state");
        }
        buckets
    }

    /// Re-read the threshold file. A bad file keeps the current snapshot.
    pub fn reload_thresholds(&self) -> (ReloadOutcome, Arc<ConfigSnapshot>) {
        let before = self.registry.version();
        let (outcome, snapshot) = match self.registry.try_reload() {
            Ok(snapshot) if snapshot.version == before => (ReloadOutcome::Unchanged, snapshot),
            Ok(snapshot) => (ReloadOutcome::Applied, snapshot),
            Err(e) => {
                let current = self.registry.snapshot();
                warn!(
                    error = %e,
                    version = current.version,
                    "Threshold reload failed, keeping last-known-good snapshot"
                );
                (ReloadOutcome::Failed, current)
            }
        };
        Metrics::config_reload(outcome.as_str());
        Metrics::config_version(snapshot.version);
        (outcome, snapshot)
    }

    /// Run the periodic tasks until ctrl-c, then shut down.
    pub async fn run(self) -> EngineResult<()> {
        let query_task = self.config.query.enabled.then(|| {
            let facade = self.query();
            let query_config = self.config.query.clone();
            tokio::spawn(async move {
                if let Err(e) = run_server(facade, query_config).await {
                    error!(error = %e, "Query server failed");
                }
            })
        });

        let reload_enabled =
            self.config.registry.reload_interval_secs > 0 && self.registry.source().is_some();
        let mut reload_interval = every(self.config.registry.reload_interval_secs);
        let mut sweep_interval = every(self.config.aggregator.sweep_interval_secs);
        let mut prune_interval = every(self.config.aggregator.prune_interval_secs);
        let mut summary_interval = every(self.config.telemetry.summary_interval_secs);

        info!("Entering main loop");
        loop {
            tokio::select! {
                _ = reload_interval.tick(), if reload_enabled => {
                    self.reload_thresholds();
                }
                _ = sweep_interval.tick() => {
                    self.sweep_timeouts(Utc::now());
                }
                _ = prune_interval.tick() => {
                    self.prune(Utc::now());
                }
                _ = summary_interval.tick() => {
                    self.summary.output_summary();
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        if let Some(task) = query_task {
            task.abort();
        }
        self.shutdown().await
    }

    /// Drain the workers, close the fact log and stop the review dispatcher.
    pub async fn shutdown(self) -> EngineResult<()> {
        let Self {
            pipeline,
            workers,
            log,
            log_task,
            review_task,
            fraud,
            summary,
            ..
        } = self;

        // Dropping the senders ends each worker once its queue is drained.
        drop(pipeline);
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(?e, "Ingest worker ended abnormally");
            }
        }

        drop(log);
        if let Some(task) = log_task {
            if let Err(e) = task.await {
                warn!(?e, "Fact log writer ended abnormally");
            }
        }

        drop(fraud);
        if let Err(e) = review_task.await {
            warn!(?e, "Review dispatcher ended abnormally");
        }

        info!("Final statistics summary:");
        summary.output_summary();
        Ok(())
    }
}

fn every(secs: u64) -> Interval {
    let period = Duration::from_secs(secs.max(1));
    interval_at(Instant::now() + period, period)
}

/// Hand review requests to the validation collaborator.
///
/// The collaborator is external; requests are logged for it to pick up.
fn spawn_review_dispatcher(mut rx: mpsc::Receiver<ReviewRequest>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            info!(
                id = %request.transaction_id,
                reason = %request.reason,
                requested_at = %request.requested_at,
                "Review requested"
            );
        }
    })
}
