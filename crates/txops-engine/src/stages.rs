//! Fan-out of status-change facts to the consumers.
//!
//! Each consumer is idempotent on its own (keyed by transaction id), so a
//! fact delivered twice changes nothing the second time.

use std::sync::Arc;
use tracing::{debug, warn};

use txops_aggregator::{HourlyAggregator, TransactionOutcome, UserStatsAggregator};
use txops_core::TransactionStatusChanged;
use txops_detector::BottleneckClassifier;
use txops_persistence::LogHandle;
use txops_registry::{ConfigRegistry, ConfigSnapshot};
use txops_risk::FraudStage;
use txops_telemetry::Metrics;

const USER_STATS: &str = "user_stats";
const HOURLY: &str = "hourly";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Live,
    Replay,
}

pub struct FanOut {
    registry: Arc<ConfigRegistry>,
    users: Arc<UserStatsAggregator>,
    hourly: Arc<HourlyAggregator>,
    fraud: Arc<FraudStage>,
    classifier: Arc<BottleneckClassifier>,
    log: Option<LogHandle>,
}

impl FanOut {
    pub fn new(
        registry: Arc<ConfigRegistry>,
        users: Arc<UserStatsAggregator>,
        hourly: Arc<HourlyAggregator>,
        fraud: Arc<FraudStage>,
        classifier: Arc<BottleneckClassifier>,
        log: Option<LogHandle>,
    ) -> Self {
        Self {
            registry,
            users,
            hourly,
            fraud,
            classifier,
            log,
        }
    }

    /// Log the fact, then update every consumer.
    ///
    /// The whole fact is processed against one registry snapshot.
    pub async fn apply(&self, fact: &TransactionStatusChanged) {
        if let Some(log) = &self.log {
            if let Err(e) = log.append(fact.clone()).await {
                Metrics::log_append(false);
                warn!(id = %fact.transaction_id, ?e, "Fact not logged");
            }
        }
        let snapshot = self.registry.snapshot();
        self.dispatch(fact, &snapshot, Mode::Live);
    }

    /// Rebuild consumer state from a replayed fact. Nothing is logged and no
    /// review is requested.
    pub fn restore(&self, fact: &TransactionStatusChanged) {
        let snapshot = self.registry.snapshot();
        self.dispatch(fact, &snapshot, Mode::Replay);
    }

    fn dispatch(&self, fact: &TransactionStatusChanged, snapshot: &ConfigSnapshot, mode: Mode) {
        let assessment = match mode {
            Mode::Live => self.fraud.process(fact, snapshot),
            Mode::Replay => self.fraud.restore(fact, snapshot),
        };
        let flagged = match assessment {
            Ok(assessment) => assessment.flagged,
            Err(e) => {
                // Scores are checked at ingest; a logged fact can still carry
                // one from before a validation change.
                warn!(id = %fact.transaction_id, error = %e, "Fraud assessment failed");
                false
            }
        };

        if fact.is_first_success() {
            let day_of = fact.completed_at.unwrap_or(fact.started_at);
            match self
                .users
                .apply_success(fact.transaction_id, fact.user_id, fact.amount_usd, day_of)
            {
                Ok(true) => Metrics::stage_applied(USER_STATS),
                Ok(false) => Metrics::stage_duplicate(USER_STATS),
                Err(e) => {
                    Metrics::stage_error(USER_STATS);
                    warn!(id = %fact.transaction_id, error = %e, "User stats update rejected");
                }
            }
        }

        if fact.is_terminal() {
            self.record_outcome(fact, snapshot, flagged, mode);
        }
    }

    fn record_outcome(
        &self,
        fact: &TransactionStatusChanged,
        snapshot: &ConfigSnapshot,
        flagged: bool,
        mode: Mode,
    ) {
        let outcome = match TransactionOutcome::from_fact(
            fact,
            flagged,
            snapshot.transaction_timeout_seconds(),
        ) {
            Ok(outcome) => outcome,
            Err(e) => {
                Metrics::stage_error(HOURLY);
                warn!(error = %e, "Outcome not recorded");
                return;
            }
        };

        let key = fact.bucket_key();
        if !self.hourly.record(key, &outcome) {
            Metrics::stage_duplicate(HOURLY);
            return;
        }
        Metrics::stage_applied(HOURLY);

        if mode == Mode::Live {
            if let Some(secs) = outcome.processing_time_seconds {
                Metrics::processing_time(fact.status.as_str(), secs as f64);
            }
            if let Some(bucket) = self.hourly.get(key) {
                // Counted by the classifier when the label is computed.
                let label = self.classifier.classify_in(&self.hourly, &bucket);
                debug!(bucket = %key, classification = %label.as_str(), "Bucket updated");
            }
            Metrics::active_buckets(self.hourly.len());
        }
    }
}
