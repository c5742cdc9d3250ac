//! Fraud fan-out stage.
//!
//! Runs on every status-change fact:
//! - scores and flags the transaction (the verdict feeds the hourly aggregate)
//! - routes a transaction to the validation collaborator the first time it
//!   is flagged, and again the first time it is marked for manual review
//! - on the first success, charges the user's daily spend and checks the fee

use chrono::NaiveDate;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

use txops_core::{TransactionId, TransactionStatusChanged, UserId};
use txops_registry::ConfigSnapshot;
use txops_telemetry::Metrics;

use crate::commission::check_fee;
use crate::daily_limit::DailyLimitTracker;
use crate::error::RiskResult;
use crate::review::{ReviewReason, ReviewSink};
use crate::scoring::{assess, FraudAssessment};

const STAGE: &str = "fraud";

/// Review reasons already routed for one transaction.
#[derive(Debug, Clone, Copy)]
struct Routed {
    flagged: bool,
    manual: bool,
    /// Latest fact day, used for pruning.
    last_seen: NaiveDate,
}

pub struct FraudStage {
    sink: Arc<dyn ReviewSink>,
    limits: DailyLimitTracker,
    routed: DashMap<TransactionId, Routed>,
}

impl FraudStage {
    pub fn new(sink: Arc<dyn ReviewSink>) -> Self {
        Self {
            sink,
            limits: DailyLimitTracker::new(),
            routed: DashMap::new(),
        }
    }

    /// Process one fact against the thresholds of `snapshot`.
    ///
    /// Side effects (review requests, spend tracking) only happen once per
    /// transaction, so re-delivered facts are harmless.
    pub fn process(
        &self,
        fact: &TransactionStatusChanged,
        snapshot: &ConfigSnapshot,
    ) -> RiskResult<FraudAssessment> {
        self.run(fact, snapshot, true)
    }

    /// Rebuild spend and review routing from a replayed fact without contacting the
    /// validation collaborator again.
    pub fn restore(
        &self,
        fact: &TransactionStatusChanged,
        snapshot: &ConfigSnapshot,
    ) -> RiskResult<FraudAssessment> {
        self.run(fact, snapshot, false)
    }

    fn run(
        &self,
        fact: &TransactionStatusChanged,
        snapshot: &ConfigSnapshot,
        notify: bool,
    ) -> RiskResult<FraudAssessment> {
        let tier = fact.tier.unwrap_or_default();
        let daily_limit = snapshot.daily_limit(tier);

        let assessment = match assess(fact, snapshot.fraud_threshold(), daily_limit) {
            Ok(assessment) => assessment,
            Err(e) => {
                Metrics::stage_error(STAGE);
                return Err(e);
            }
        };

        self.route_reviews(fact, &assessment, notify);

        if fact.is_first_success() {
            let day = fact.completed_at.unwrap_or(fact.started_at).date_naive();
            let breach = self
                .limits
                .record(fact.user_id, day, tier, fact.amount_usd, daily_limit);
            if let Some(breach) = breach.filter(|_| notify) {
                Metrics::daily_limit_exceeded(tier.as_str());
                warn!(
                    user = %breach.user_id,
                    day = %breach.day,
                    tier = %breach.tier,
                    spent = %breach.spent_usd,
                    limit = %breach.limit_usd,
                    "Daily limit exceeded"
                );
                self.sink
                    .submit_for_review(fact.transaction_id, ReviewReason::DailyLimitExceeded);
            }

            if let Some(mismatch) = check_fee(fact, snapshot).filter(|_| notify) {
                Metrics::fee_mismatch(mismatch.operation.as_str());
                warn!(
                    id = %mismatch.transaction_id,
                    operation = %mismatch.operation,
                    expected = %mismatch.expected_usd,
                    charged = %mismatch.charged_usd,
                    "Fee does not match commission rate"
                );
            }
        }

        Metrics::stage_applied(STAGE);
        Ok(assessment)
    }

    /// Request review on the first fact that flags the transaction and on the
    /// first that marks it for manual review. Replay only records what was
    /// already routed.
    fn route_reviews(
        &self,
        fact: &TransactionStatusChanged,
        assessment: &FraudAssessment,
        notify: bool,
    ) {
        let day = fact.completed_at.unwrap_or(fact.started_at).date_naive();
        let (newly_flagged, newly_manual) = {
            let mut routed = self.routed.entry(fact.transaction_id).or_insert(Routed {
                flagged: false,
                manual: false,
                last_seen: day,
            });
            let newly_flagged = assessment.flagged && !routed.flagged;
            let newly_manual = fact.manual_review && !routed.manual;
            routed.flagged |= assessment.flagged;
            routed.manual |= fact.manual_review;
            routed.last_seen = routed.last_seen.max(day);
            (newly_flagged, newly_manual)
        };
        if !notify {
            return;
        }

        if newly_flagged {
            Metrics::fraud_flagged();
            debug!(
                id = %fact.transaction_id,
                status = %fact.status,
                score = assessment.score,
                source = ?assessment.source,
                "Transaction flagged"
            );
            self.sink
                .submit_for_review(fact.transaction_id, ReviewReason::FraudFlagged);
        }
        if newly_manual {
            self.sink
                .submit_for_review(fact.transaction_id, ReviewReason::ManualReviewRequested);
        }
    }

    pub fn spent_on(&self, user_id: UserId, day: NaiveDate) -> Decimal {
        self.limits.spent(user_id, day)
    }

    /// Forget spend for days before `before`, and review routing for
    /// transactions not seen since then.
    pub fn prune(&self, before: NaiveDate) -> usize {
        let routed = self.routed.len();
        self.routed.retain(|_, r| r.last_seen >= before);
        self.limits.prune(before) + routed.saturating_sub(self.routed.len())
    }
}
